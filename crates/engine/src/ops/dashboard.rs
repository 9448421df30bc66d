use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Expense, MoneyCents, RangeToken, ResultEngine, expenses,
    recurrence::days_in_month,
};

use super::{Engine, payments::settled_by_expense};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LateExpense {
    pub expense_id: Uuid,
    pub name: String,
    pub cost: MoneyCents,
    /// Unsettled occurrences before today, oldest first.
    pub late_dates: Vec<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpcomingOccurrence {
    pub expense_id: Uuid,
    pub name: String,
    pub cost: MoneyCents,
    pub due_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub expense_id: Uuid,
    pub name: String,
    pub cost: MoneyCents,
    /// Paid or skipped.
    pub settled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub entries: Vec<CalendarEntry>,
}

impl Engine {
    /// Active expenses of the user with the due dates already settled for
    /// each of them.
    async fn active_expenses_with_settlements(
        &self,
        user_id: &str,
    ) -> ResultEngine<(Vec<Expense>, HashMap<Uuid, HashSet<NaiveDate>>)> {
        let expenses = expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(user_id))
            .filter(expenses::Column::Active.eq(true))
            .order_by_asc(expenses::Column::Name)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        let ids: Vec<Uuid> = expenses.iter().map(|expense| expense.id).collect();
        let settled = settled_by_expense(&self.database, &ids).await?;
        Ok((expenses, settled))
    }

    /// Active expenses with unsettled occurrences before `today`.
    pub async fn late_expenses(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> ResultEngine<Vec<LateExpense>> {
        let Some(yesterday) = today.pred_opt() else {
            return Ok(Vec::new());
        };
        let (expenses, settled) = self.active_expenses_with_settlements(user_id).await?;
        let empty = HashSet::new();

        Ok(expenses
            .into_iter()
            .filter_map(|expense| {
                let settled = settled.get(&expense.id).unwrap_or(&empty);
                let late_dates = expense.schedule.outstanding_until(yesterday, settled);
                (!late_dates.is_empty()).then(|| LateExpense {
                    expense_id: expense.id,
                    name: expense.name,
                    cost: expense.cost,
                    late_dates,
                })
            })
            .collect())
    }

    /// Unsettled occurrences from `today` to the end of `range`, by date.
    ///
    /// `all-time` has no end and is rejected.
    pub async fn upcoming_expenses(
        &self,
        user_id: &str,
        today: NaiveDate,
        range: RangeToken,
    ) -> ResultEngine<Vec<UpcomingOccurrence>> {
        let Some((_, end)) = range.resolve(today).bounds() else {
            return Err(EngineError::validation(
                "range",
                format!("{} has no end date", range.as_str()),
            ));
        };
        let (expenses, settled) = self.active_expenses_with_settlements(user_id).await?;
        let empty = HashSet::new();

        let mut upcoming: Vec<UpcomingOccurrence> = expenses
            .iter()
            .flat_map(|expense| {
                let settled = settled.get(&expense.id).unwrap_or(&empty);
                expense
                    .schedule
                    .occurrences_between(today, end)
                    .filter(|date| !settled.contains(date))
                    .map(|due_date| UpcomingOccurrence {
                        expense_id: expense.id,
                        name: expense.name.clone(),
                        cost: expense.cost,
                        due_date,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        upcoming.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.name.cmp(&b.name)));
        Ok(upcoming)
    }

    /// Every day of a month with the active expenses due on it.
    pub async fn calendar(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
    ) -> ResultEngine<Vec<CalendarDay>> {
        let invalid_month =
            || EngineError::validation("month", format!("{year}-{month} is not a month"));
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid_month)?;
        let last = first
            .with_day(days_in_month(year, month))
            .ok_or_else(invalid_month)?;

        let (expenses, settled) = self.active_expenses_with_settlements(user_id).await?;
        let empty = HashSet::new();

        let mut days: Vec<CalendarDay> = first
            .iter_days()
            .take_while(|date| *date <= last)
            .map(|date| CalendarDay {
                date,
                entries: Vec::new(),
            })
            .collect();

        for expense in &expenses {
            let settled = settled.get(&expense.id).unwrap_or(&empty);
            for date in expense.schedule.occurrences_between(first, last) {
                let index = (date - first).num_days() as usize;
                if let Some(day) = days.get_mut(index) {
                    day.entries.push(CalendarEntry {
                        expense_id: expense.id,
                        name: expense.name.clone(),
                        cost: expense.cost,
                        settled: settled.contains(&date),
                    });
                }
            }
        }
        Ok(days)
    }
}
