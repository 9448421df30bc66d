//! Immutable balance payments made towards a credit card.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::MoneyCents;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardPayment {
    pub id: Uuid,
    pub credit_card_id: Uuid,
    pub amount: MoneyCents,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "credit_card_payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub credit_card_id: Uuid,
    pub amount_minor: i64,
    pub payment_date: Date,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::credit_cards::Entity",
        from = "Column::CreditCardId",
        to = "super::credit_cards::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    CreditCard,
}

impl Related<super::credit_cards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditCard.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CreditCardPayment> for ActiveModel {
    fn from(payment: &CreditCardPayment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id),
            credit_card_id: ActiveValue::Set(payment.credit_card_id),
            amount_minor: ActiveValue::Set(payment.amount.cents()),
            payment_date: ActiveValue::Set(payment.payment_date),
            created_at: ActiveValue::Set(payment.created_at),
        }
    }
}

impl From<Model> for CreditCardPayment {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            credit_card_id: model.credit_card_id,
            amount: MoneyCents::new(model.amount_minor),
            payment_date: model.payment_date,
            created_at: model.created_at,
        }
    }
}
