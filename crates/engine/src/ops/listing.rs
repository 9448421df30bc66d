use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sea_orm::{JoinType, QueryFilter, QuerySelect, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ApplyQueryPlan, Expense, ExpenseTable, Payment, PaymentTable, ResultEngine, TableQuery,
    categories, credit_cards, expenses, payments,
};

use super::{Engine, payments::settled_by_expense};

/// Actions a client may offer on an expense row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseAction {
    Edit,
    Delete,
    Pay,
    Skip,
    PayToNow,
    Activate,
    Deactivate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentAction {
    Unpay,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRow {
    pub expense: Expense,
    pub category_name: Option<String>,
    /// First unsettled occurrence on or after today.
    pub next_due_date: Option<NaiveDate>,
    /// Unsettled occurrences before today.
    pub late_count: usize,
    pub active: bool,
    pub actions: BTreeMap<ExpenseAction, bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRow {
    pub payment: Payment,
    pub expense_name: String,
    pub category_name: Option<String>,
    pub credit_card_company: Option<String>,
    pub actions: BTreeMap<PaymentAction, bool>,
}

fn expense_actions(
    active: bool,
    next_due_date: Option<NaiveDate>,
    late_count: usize,
) -> BTreeMap<ExpenseAction, bool> {
    let payable = active && (late_count > 0 || next_due_date.is_some());
    BTreeMap::from([
        (ExpenseAction::Edit, true),
        (ExpenseAction::Delete, true),
        (ExpenseAction::Pay, payable),
        (ExpenseAction::Skip, payable),
        (ExpenseAction::PayToNow, active && late_count > 0),
        (ExpenseAction::Activate, !active),
        (ExpenseAction::Deactivate, active),
    ])
}

impl Engine {
    /// Lists the user's expenses for a table query, with due-date state
    /// computed against `today`.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        query: &TableQuery<ExpenseTable>,
        today: NaiveDate,
    ) -> ResultEngine<Vec<ExpenseRow>> {
        let plan = query.compile()?;
        let rows = expenses::Entity::find()
            .find_also_related(categories::Entity)
            .filter(expenses::Column::UserId.eq(user_id))
            .apply_plan(&plan)?
            .all(&self.database)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|(expense, _)| expense.id).collect();
        let settled = settled_by_expense(&self.database, &ids).await?;
        let empty = Default::default();

        rows.into_iter()
            .map(|(model, category)| -> ResultEngine<ExpenseRow> {
                let expense = Expense::try_from(model)?;
                let settled = settled.get(&expense.id).unwrap_or(&empty);
                let late_count = today
                    .pred_opt()
                    .map(|yesterday| expense.schedule.outstanding_until(yesterday, settled).len())
                    .unwrap_or(0);
                let next_due_date = expense.schedule.next_unsettled_from(today, settled);
                Ok(ExpenseRow {
                    actions: expense_actions(expense.active, next_due_date, late_count),
                    active: expense.active,
                    category_name: category.map(|category| category.name),
                    next_due_date,
                    late_count,
                    expense,
                })
            })
            .collect()
    }

    /// Lists the payments of the user's expenses for a table query.
    pub async fn list_payments(
        &self,
        user_id: &str,
        query: &TableQuery<PaymentTable>,
    ) -> ResultEngine<Vec<PaymentRow>> {
        let plan = query.compile()?;
        let rows = payments::Entity::find()
            .find_also_related(expenses::Entity)
            .join(JoinType::LeftJoin, expenses::Relation::Category.def())
            .join(JoinType::LeftJoin, payments::Relation::CreditCard.def())
            .filter(expenses::Column::UserId.eq(user_id))
            .apply_plan(&plan)?
            .all(&self.database)
            .await?;

        let category_names: HashMap<Uuid, String> = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();
        let card_companies: HashMap<Uuid, String> = credit_cards::Entity::find()
            .filter(credit_cards::Column::UserId.eq(user_id))
            .all(&self.database)
            .await?
            .into_iter()
            .map(|card| (card.id, card.company))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|(payment, expense)| expense.map(|expense| (payment, expense)))
            .map(|(payment, expense)| {
                let payment = Payment::from(payment);
                PaymentRow {
                    expense_name: expense.name,
                    category_name: expense
                        .category_id
                        .and_then(|id| category_names.get(&id).cloned()),
                    credit_card_company: payment
                        .credit_card_id
                        .and_then(|id| card_companies.get(&id).cloned()),
                    actions: BTreeMap::from([(PaymentAction::Unpay, true)]),
                    payment,
                }
            })
            .collect())
    }
}
