use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, Statement,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CreditCard, CreditCardPayment, EngineError, MoneyCents, ResultEngine, credit_card_payments,
    credit_cards, util::normalize_required_name,
};

use super::{Engine, with_tx};

/// Outcome of a balance payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub credit_card_id: Uuid,
    pub payment_id: Uuid,
    pub balance: MoneyCents,
    /// The card now owes less than zero.
    pub overpaid: bool,
}

/// Cached card balance compared with the balance derived from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub credit_card_id: Uuid,
    pub cached: MoneyCents,
    pub derived: MoneyCents,
    pub repaired: bool,
}

impl Reconciliation {
    pub fn drift(&self) -> MoneyCents {
        self.cached - self.derived
    }
}

/// Adds `delta` to the cached balance of a card and returns the new balance.
///
/// Runs inside the caller's transaction and never commits.
async fn adjust_balance(
    db_tx: &DatabaseTransaction,
    card_id: Uuid,
    delta: MoneyCents,
) -> ResultEngine<MoneyCents> {
    let updated = credit_cards::Entity::update_many()
        .col_expr(
            credit_cards::Column::RunningBalanceMinor,
            Expr::col(credit_cards::Column::RunningBalanceMinor).add(delta.cents()),
        )
        .filter(credit_cards::Column::Id.eq(card_id))
        .exec(db_tx)
        .await?;
    if updated.rows_affected == 0 {
        return Err(EngineError::NotFound(format!("credit card {card_id}")));
    }

    let card = credit_cards::Entity::find_by_id(card_id)
        .one(db_tx)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("credit card {card_id}")))?;
    Ok(MoneyCents::new(card.running_balance_minor))
}

/// Charges `amount` to a card within the caller's unit of work.
pub(super) async fn charge(
    db_tx: &DatabaseTransaction,
    card_id: Uuid,
    amount: MoneyCents,
) -> ResultEngine<MoneyCents> {
    let balance = adjust_balance(db_tx, card_id, amount).await?;
    tracing::info!(%card_id, %amount, %balance, "credit card charged");
    Ok(balance)
}

/// Reverses a previous [`charge`] within the caller's unit of work.
pub(super) async fn refund_charge(
    db_tx: &DatabaseTransaction,
    card_id: Uuid,
    amount: MoneyCents,
) -> ResultEngine<MoneyCents> {
    let balance = adjust_balance(db_tx, card_id, -amount).await?;
    tracing::info!(%card_id, %amount, %balance, "credit card charge reversed");
    Ok(balance)
}

/// Balance derived from the two ledgers: paid card payments minus balance
/// payments.
async fn derived_balance<C: ConnectionTrait>(db: &C, card_id: Uuid) -> ResultEngine<MoneyCents> {
    let backend = db.get_database_backend();
    let card_bytes: Vec<u8> = card_id.as_bytes().to_vec();

    let charged: i64 = {
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(cost_minor), 0) AS sum \
             FROM payments \
             WHERE credit_card_id = ? AND skipped = ?",
            vec![card_bytes.clone().into(), false.into()],
        );
        let row = db.query_one(stmt).await?;
        row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
    };

    let paid: i64 = {
        let stmt = Statement::from_sql_and_values(
            backend,
            "SELECT COALESCE(SUM(amount_minor), 0) AS sum \
             FROM credit_card_payments \
             WHERE credit_card_id = ?",
            vec![card_bytes.into()],
        );
        let row = db.query_one(stmt).await?;
        row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0)
    };

    Ok(MoneyCents::new(charged - paid))
}

impl Engine {
    pub async fn new_credit_card(&self, user_id: &str, company: &str) -> ResultEngine<CreditCard> {
        let company = normalize_required_name(company, "company")?;
        self.require_user(&self.database, user_id).await?;
        let card = CreditCard::new(user_id, company, Utc::now());
        credit_cards::ActiveModel::from(&card)
            .insert(&self.database)
            .await?;
        tracing::info!(card_id = %card.id, company = %card.company, "credit card created");
        Ok(card)
    }

    pub async fn credit_card(&self, user_id: &str, card_id: Uuid) -> ResultEngine<CreditCard> {
        let model = self
            .require_credit_card(&self.database, user_id, card_id)
            .await?;
        Ok(model.into())
    }

    pub async fn list_credit_cards(&self, user_id: &str) -> ResultEngine<Vec<CreditCard>> {
        let models = credit_cards::Entity::find()
            .filter(credit_cards::Column::UserId.eq(user_id))
            .order_by_asc(credit_cards::Column::Company)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(CreditCard::from).collect())
    }

    /// Balance payments of a card, most recent first.
    pub async fn list_credit_card_payments(
        &self,
        user_id: &str,
        card_id: Uuid,
    ) -> ResultEngine<Vec<CreditCardPayment>> {
        self.require_credit_card(&self.database, user_id, card_id)
            .await?;
        let models = credit_card_payments::Entity::find()
            .filter(credit_card_payments::Column::CreditCardId.eq(card_id))
            .order_by_desc(credit_card_payments::Column::PaymentDate)
            .order_by_desc(credit_card_payments::Column::CreatedAt)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(CreditCardPayment::from).collect())
    }

    /// Pays `amount` towards a card balance.
    ///
    /// Paying more than is owed is allowed: the balance goes negative and the
    /// result is flagged as overpaid.
    pub async fn pay_credit_card_balance(
        &self,
        user_id: &str,
        card_id: Uuid,
        amount: MoneyCents,
        payment_date: NaiveDate,
    ) -> ResultEngine<BalanceUpdate> {
        if !amount.is_positive() {
            return Err(EngineError::validation("amount", "amount must be > 0"));
        }

        with_tx!(self, |db_tx| {
            self.require_credit_card(&db_tx, user_id, card_id).await?;

            let payment = CreditCardPayment {
                id: Uuid::new_v4(),
                credit_card_id: card_id,
                amount,
                payment_date,
                created_at: Utc::now(),
            };
            credit_card_payments::ActiveModel::from(&payment)
                .insert(&db_tx)
                .await?;
            let balance = adjust_balance(&db_tx, card_id, -amount).await?;

            let overpaid = balance.is_negative();
            if overpaid {
                tracing::warn!(%card_id, %balance, "credit card overpaid");
            }
            tracing::info!(%card_id, %amount, %balance, "credit card balance paid");
            Ok(BalanceUpdate {
                credit_card_id: card_id,
                payment_id: payment.id,
                balance,
                overpaid,
            })
        })
    }

    /// Re-derives a card balance from the ledgers.
    ///
    /// With `repair`, a drifted cached balance is overwritten with the
    /// derived one.
    pub async fn reconcile_credit_card(
        &self,
        user_id: &str,
        card_id: Uuid,
        repair: bool,
    ) -> ResultEngine<Reconciliation> {
        with_tx!(self, |db_tx| {
            let card = self.require_credit_card(&db_tx, user_id, card_id).await?;
            let cached = MoneyCents::new(card.running_balance_minor);
            let derived = derived_balance(&db_tx, card_id).await?;

            let mut repaired = false;
            if cached != derived {
                tracing::warn!(%card_id, %cached, %derived, "credit card balance drift");
                if repair {
                    let active = credit_cards::ActiveModel {
                        id: ActiveValue::Set(card_id),
                        running_balance_minor: ActiveValue::Set(derived.cents()),
                        ..Default::default()
                    };
                    active.update(&db_tx).await?;
                    repaired = true;
                }
            }

            Ok(Reconciliation {
                credit_card_id: card_id,
                cached,
                derived,
                repaired,
            })
        })
    }
}
