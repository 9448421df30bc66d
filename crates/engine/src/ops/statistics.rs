use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use sea_orm::{QueryFilter, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, RangeToken, ResolvedRange, ResultEngine, categories, expenses,
    payments,
};

use super::Engine;

/// Money paid for one category. `category_id` is `None` for expenses without
/// a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub total: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub year: i32,
    pub category_id: Option<Uuid>,
    /// January first.
    pub months: [MoneyCents; 12],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub total: MoneyCents,
    /// Total divided by the elapsed months of the year.
    pub monthly_average: MoneyCents,
}

/// A non-skipped payment with the category of its expense.
struct PaidRow {
    category_id: Option<Uuid>,
    payment_date: NaiveDate,
    cost: MoneyCents,
}

fn year_bounds(year: i32) -> ResultEngine<(NaiveDate, NaiveDate)> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .zip(NaiveDate::from_ymd_opt(year, 12, 31))
        .ok_or_else(|| EngineError::validation("year", format!("{year} is out of range")))
}

/// Sums costs per category, ordered by descending total then name.
fn group_by_category(
    rows: &[PaidRow],
    names: &HashMap<Uuid, String>,
) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<Option<Uuid>, MoneyCents> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.category_id).or_default() += row.cost;
    }
    let mut grouped: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category_id, total)| CategoryTotal {
            category_id,
            category_name: category_id.and_then(|id| names.get(&id).cloned()),
            total,
        })
        .collect();
    grouped.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
    grouped
}

impl Engine {
    /// Non-skipped payments of the user with `payment_date` inside `range`.
    async fn paid_rows(&self, user_id: &str, range: ResolvedRange) -> ResultEngine<Vec<PaidRow>> {
        let mut query = payments::Entity::find()
            .find_also_related(expenses::Entity)
            .filter(expenses::Column::UserId.eq(user_id))
            .filter(payments::Column::Skipped.eq(false))
            .filter(payments::Column::PaymentDate.is_not_null());
        if let Some((start, end)) = range.bounds() {
            query = query.filter(payments::Column::PaymentDate.between(start, end));
        }

        let rows = query.all(&self.database).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(payment, expense)| {
                let expense = expense?;
                Some(PaidRow {
                    category_id: expense.category_id,
                    payment_date: payment.payment_date?,
                    cost: MoneyCents::new(payment.cost_minor),
                })
            })
            .collect())
    }

    async fn category_names(&self, user_id: &str) -> ResultEngine<HashMap<Uuid, String>> {
        Ok(categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect())
    }

    /// Paid totals per category for payments made inside `range`.
    pub async fn category_totals(
        &self,
        user_id: &str,
        range: RangeToken,
        today: NaiveDate,
    ) -> ResultEngine<Vec<CategoryTotal>> {
        let rows = self.paid_rows(user_id, range.resolve(today)).await?;
        let names = self.category_names(user_id).await?;
        Ok(group_by_category(&rows, &names))
    }

    /// Paid totals for each month of `year`, optionally for one category.
    pub async fn monthly_totals(
        &self,
        user_id: &str,
        year: i32,
        category_id: Option<Uuid>,
    ) -> ResultEngine<MonthlyTotals> {
        let (start, end) = year_bounds(year)?;
        let rows = self
            .paid_rows(user_id, ResolvedRange::Bounded { start, end })
            .await?;

        let mut months = [MoneyCents::ZERO; 12];
        for row in rows
            .iter()
            .filter(|row| category_id.is_none() || row.category_id == category_id)
        {
            months[row.payment_date.month0() as usize] += row.cost;
        }
        Ok(MonthlyTotals {
            year,
            category_id,
            months,
        })
    }

    /// Per-category monthly average for `year`. The current year divides by
    /// the months elapsed so far, past years by twelve.
    pub async fn average_spent_by_category(
        &self,
        user_id: &str,
        year: i32,
        today: NaiveDate,
    ) -> ResultEngine<Vec<CategoryAverage>> {
        let elapsed_months = match year.cmp(&today.year()) {
            std::cmp::Ordering::Less => 12,
            std::cmp::Ordering::Equal => i64::from(today.month()),
            std::cmp::Ordering::Greater => {
                return Err(EngineError::validation("year", format!("{year} has not started")));
            }
        };

        let (start, end) = year_bounds(year)?;
        let rows = self
            .paid_rows(user_id, ResolvedRange::Bounded { start, end })
            .await?;
        let names = self.category_names(user_id).await?;

        Ok(group_by_category(&rows, &names)
            .into_iter()
            .map(|total| CategoryAverage {
                monthly_average: total.total.div_round(elapsed_months),
                category_id: total.category_id,
                category_name: total.category_name,
                total: total.total,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(category_id: Option<Uuid>, cents: i64) -> PaidRow {
        PaidRow {
            category_id,
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            cost: MoneyCents::new(cents),
        }
    }

    #[test]
    fn groups_by_category_with_uncategorized_bucket() {
        let food = Uuid::new_v4();
        let names = HashMap::from([(food, "Food".to_string())]);
        let rows = vec![row(Some(food), 1000), row(None, 300), row(Some(food), 550)];

        let grouped = group_by_category(&rows, &names);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].category_name.as_deref(), Some("Food"));
        assert_eq!(grouped[0].total, MoneyCents::new(1550));
        assert_eq!(grouped[1].category_id, None);
        assert_eq!(grouped[1].total, MoneyCents::new(300));
    }

    #[test]
    fn year_bounds_cover_the_whole_year() {
        let (start, end) = year_bounds(2024).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }
}
