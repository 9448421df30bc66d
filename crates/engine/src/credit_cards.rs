//! Credit cards and their cached running balance.
//!
//! The `running_balance_minor` column is a denormalized cache of the card
//! ledger (charged payments minus balance payments). It is only mutated
//! through the ledger helpers in `ops::credit_cards`, always inside the
//! caller's transaction.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{MoneyCents, util::search_key};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: Uuid,
    pub user_id: String,
    pub company: String,
    pub running_balance: MoneyCents,
    pub created_at: DateTime<Utc>,
}

impl CreditCard {
    pub(crate) fn new(user_id: &str, company: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            company,
            running_balance: MoneyCents::ZERO,
            created_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "credit_cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub company: String,
    pub company_search: String,
    pub running_balance_minor: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::credit_card_payments::Entity")]
    BalancePayments,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::credit_card_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BalancePayments.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&CreditCard> for ActiveModel {
    fn from(card: &CreditCard) -> Self {
        Self {
            id: ActiveValue::Set(card.id),
            user_id: ActiveValue::Set(card.user_id.clone()),
            company: ActiveValue::Set(card.company.clone()),
            company_search: ActiveValue::Set(search_key(&card.company)),
            running_balance_minor: ActiveValue::Set(card.running_balance.cents()),
            created_at: ActiveValue::Set(card.created_at),
        }
    }
}

impl From<Model> for CreditCard {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            company: model.company,
            running_balance: MoneyCents::new(model.running_balance_minor),
            created_at: model.created_at,
        }
    }
}
