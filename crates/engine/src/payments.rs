//! Payment ledger rows.
//!
//! A `Payment` settles one occurrence of an expense, either with money
//! (optionally charged to a credit card) or by skipping it. Rows are inserted
//! and deleted, never updated.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub cost: MoneyCents,
    /// When money moved; `None` for skipped occurrences.
    pub payment_date: Option<NaiveDate>,
    /// The occurrence this row settles.
    pub due_date_paid: NaiveDate,
    pub skipped: bool,
    pub credit_card_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// The amount charged to the attributed card, if any.
    pub fn card_charge(&self) -> Option<(Uuid, MoneyCents)> {
        match (self.skipped, self.credit_card_id) {
            (false, Some(card_id)) => Some((card_id, self.cost)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_id: Uuid,
    pub cost_minor: i64,
    pub payment_date: Option<Date>,
    pub due_date_paid: Date,
    pub skipped: bool,
    pub credit_card_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expense,
    #[sea_orm(
        belongs_to = "super::credit_cards::Entity",
        from = "Column::CreditCardId",
        to = "super::credit_cards::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    CreditCard,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expense.def()
    }
}

impl Related<super::credit_cards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditCard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id),
            expense_id: ActiveValue::Set(payment.expense_id),
            cost_minor: ActiveValue::Set(payment.cost.cents()),
            payment_date: ActiveValue::Set(payment.payment_date),
            due_date_paid: ActiveValue::Set(payment.due_date_paid),
            skipped: ActiveValue::Set(payment.skipped),
            credit_card_id: ActiveValue::Set(payment.credit_card_id),
            created_at: ActiveValue::Set(payment.created_at),
        }
    }
}

impl From<Model> for Payment {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            expense_id: model.expense_id,
            cost: MoneyCents::new(model.cost_minor),
            payment_date: model.payment_date,
            due_date_paid: model.due_date_paid,
            skipped: model.skipped,
            credit_card_id: model.credit_card_id,
            created_at: model.created_at,
        }
    }
}
