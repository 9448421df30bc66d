//! Expense primitives.
//!
//! An `Expense` is a recurring (or one-off) cost owned by a user. Its
//! occurrences are never stored: they are derived from the [`Schedule`].

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, RecurrenceRate, ResultEngine, Schedule, util::search_key};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub cost: MoneyCents,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub category_id: Option<Uuid>,
    pub active: bool,
    pub automatic_payments: bool,
    pub automatic_payment_credit_card_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or editing an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseInput {
    pub name: String,
    pub cost: MoneyCents,
    pub description: Option<String>,
    pub recurrence_rate: RecurrenceRate,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub due_end_of_month: bool,
    pub category_id: Option<Uuid>,
    pub automatic_payments: bool,
    pub automatic_payment_credit_card_id: Option<Uuid>,
}

impl Expense {
    pub(crate) fn new(user_id: &str, input: ExpenseInput, now: DateTime<Utc>) -> ResultEngine<Self> {
        let schedule = Schedule::new(
            input.recurrence_rate,
            input.start_date,
            input.end_date,
            input.due_end_of_month,
        )?;
        if input.cost.is_negative() {
            return Err(EngineError::validation("cost", "cost must be >= 0"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: input.name,
            cost: input.cost,
            description: input.description,
            schedule,
            category_id: input.category_id,
            active: true,
            automatic_payments: input.automatic_payments,
            automatic_payment_credit_card_id: input.automatic_payment_credit_card_id,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    /// Folded `name` matched by text filters.
    pub name_search: String,
    pub cost_minor: i64,
    pub description: Option<String>,
    pub description_search: Option<String>,
    pub recurrence_rate: String,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub due_end_of_month: bool,
    pub category_id: Option<Uuid>,
    pub active: bool,
    pub automatic_payments: bool,
    pub automatic_payment_credit_card_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id),
            user_id: ActiveValue::Set(expense.user_id.clone()),
            name: ActiveValue::Set(expense.name.clone()),
            name_search: ActiveValue::Set(search_key(&expense.name)),
            cost_minor: ActiveValue::Set(expense.cost.cents()),
            description: ActiveValue::Set(expense.description.clone()),
            description_search: ActiveValue::Set(expense.description.as_deref().map(search_key)),
            recurrence_rate: ActiveValue::Set(expense.schedule.rate.as_str().to_string()),
            start_date: ActiveValue::Set(expense.schedule.start_date),
            end_date: ActiveValue::Set(expense.schedule.end_date),
            due_end_of_month: ActiveValue::Set(expense.schedule.due_end_of_month),
            category_id: ActiveValue::Set(expense.category_id),
            active: ActiveValue::Set(expense.active),
            automatic_payments: ActiveValue::Set(expense.automatic_payments),
            automatic_payment_credit_card_id: ActiveValue::Set(
                expense.automatic_payment_credit_card_id,
            ),
            created_at: ActiveValue::Set(expense.created_at),
            updated_at: ActiveValue::Set(expense.updated_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let rate = RecurrenceRate::try_from(model.recurrence_rate.as_str())?;
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            cost: MoneyCents::new(model.cost_minor),
            description: model.description,
            schedule: Schedule {
                rate,
                start_date: model.start_date,
                end_date: model.end_date,
                due_end_of_month: model.due_end_of_month,
            },
            category_id: model.category_id,
            active: model.active,
            automatic_payments: model.automatic_payments,
            automatic_payment_credit_card_id: model.automatic_payment_credit_card_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
