use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Expense, MoneyCents, Payment, ResultEngine, expenses, payments};

use super::{
    Engine,
    credit_cards::{charge, refund_charge},
    with_tx,
};

/// Request to settle one or more occurrences of an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayDueDates {
    pub expense_id: Uuid,
    pub due_dates: Vec<NaiveDate>,
    /// Defaults to today. Ignored when skipping.
    pub date_paid: Option<NaiveDate>,
    pub is_skipped: bool,
    /// Card charged with the cost. Ignored when skipping.
    pub credit_card_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub expense_id: Uuid,
    pub payment_ids: Vec<Uuid>,
    /// Occurrences settled, parallel to `payment_ids`.
    pub due_dates: Vec<NaiveDate>,
    /// Balance of the charged card after the payment.
    pub credit_card_balance: Option<MoneyCents>,
    pub overpaid: bool,
}

/// Occurrences settled by one automatic payment run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPayment {
    pub expense_id: Uuid,
    pub expense_name: String,
    pub paid: Vec<NaiveDate>,
}

struct Settlement<'a> {
    expense: &'a Expense,
    due_dates: &'a [NaiveDate],
    payment_date: Option<NaiveDate>,
    credit_card_id: Option<Uuid>,
}

impl Engine {
    /// Pays (or skips) the given occurrences of an expense.
    pub async fn pay_due_dates(
        &self,
        user_id: &str,
        request: PayDueDates,
    ) -> ResultEngine<PaymentReceipt> {
        let PayDueDates {
            expense_id,
            due_dates,
            date_paid,
            is_skipped,
            credit_card_id,
        } = request;

        with_tx!(self, |db_tx| {
            let expense = Expense::try_from(
                self.require_expense(&db_tx, user_id, expense_id).await?,
            )?;
            let (payment_date, credit_card_id) = if is_skipped {
                (None, None)
            } else {
                self.require_optional_card(&db_tx, user_id, credit_card_id)
                    .await?;
                (
                    Some(date_paid.unwrap_or_else(|| Utc::now().date_naive())),
                    credit_card_id,
                )
            };
            self.settle(
                &db_tx,
                Settlement {
                    expense: &expense,
                    due_dates: &due_dates,
                    payment_date,
                    credit_card_id,
                },
            )
            .await
        })
    }

    /// Removes payments of an expense, reversing their card charges.
    ///
    /// Every id must belong to `expense_id`; otherwise nothing is removed.
    pub async fn unpay_due_dates(
        &self,
        user_id: &str,
        expense_id: Uuid,
        payment_ids: &[Uuid],
    ) -> ResultEngine<Vec<Payment>> {
        with_tx!(self, |db_tx| {
            self.require_expense(&db_tx, user_id, expense_id).await?;

            let mut removed = Vec::with_capacity(payment_ids.len());
            for payment_id in payment_ids {
                let model = payments::Entity::find_by_id(*payment_id)
                    .filter(payments::Column::ExpenseId.eq(expense_id))
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("payment {payment_id}")))?;
                let payment = Payment::from(model);
                if let Some((card_id, amount)) = payment.card_charge() {
                    refund_charge(&db_tx, card_id, amount).await?;
                }
                payments::Entity::delete_by_id(payment.id)
                    .exec(&db_tx)
                    .await?;
                removed.push(payment);
            }

            tracing::info!(
                %expense_id,
                count = removed.len(),
                "payments removed"
            );
            Ok(removed)
        })
    }

    /// Pays every unsettled occurrence in `[start_date, today]` at once.
    pub async fn pay_all_overdue_dates(
        &self,
        user_id: &str,
        expense_id: Uuid,
        credit_card_id: Option<Uuid>,
        today: NaiveDate,
    ) -> ResultEngine<PaymentReceipt> {
        with_tx!(self, |db_tx| {
            let expense = Expense::try_from(
                self.require_expense(&db_tx, user_id, expense_id).await?,
            )?;
            self.require_optional_card(&db_tx, user_id, credit_card_id)
                .await?;
            self.pay_overdue_in(&db_tx, &expense, credit_card_id, today)
                .await
        })
    }

    /// Pays overdue occurrences of every active expense flagged for
    /// automatic payments, each expense in its own transaction.
    ///
    /// An expense whose run fails is rolled back and logged; the others still
    /// proceed.
    pub async fn run_automatic_payments(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> ResultEngine<Vec<AutoPayment>> {
        let models = expenses::Entity::find()
            .filter(expenses::Column::UserId.eq(user_id))
            .filter(expenses::Column::Active.eq(true))
            .filter(expenses::Column::AutomaticPayments.eq(true))
            .order_by_asc(expenses::Column::Name)
            .all(&self.database)
            .await?;

        let mut outcomes = Vec::new();
        for model in models {
            let expense_id = model.id;
            let expense = match Expense::try_from(model) {
                Ok(expense) => expense,
                Err(err) => {
                    tracing::warn!(%expense_id, error = %err, "skipping unreadable expense");
                    continue;
                }
            };
            let card_id = expense.automatic_payment_credit_card_id;
            let result: ResultEngine<Vec<NaiveDate>> = with_tx!(self, |db_tx| {
                let receipt = self
                    .pay_overdue_in(&db_tx, &expense, card_id, today)
                    .await?;
                Ok(receipt.due_dates)
            });
            match result {
                Ok(paid) if paid.is_empty() => {}
                Ok(paid) => outcomes.push(AutoPayment {
                    expense_id: expense.id,
                    expense_name: expense.name.clone(),
                    paid,
                }),
                Err(err) => {
                    tracing::warn!(
                        expense_id = %expense.id,
                        error = %err,
                        "automatic payment failed"
                    );
                }
            }
        }
        Ok(outcomes)
    }

    async fn pay_overdue_in(
        &self,
        db_tx: &DatabaseTransaction,
        expense: &Expense,
        credit_card_id: Option<Uuid>,
        today: NaiveDate,
    ) -> ResultEngine<PaymentReceipt> {
        let settled = settled_dates(db_tx, expense.id).await?;
        let overdue = expense.schedule.outstanding_until(today, &settled);
        if overdue.is_empty() {
            return Ok(PaymentReceipt {
                expense_id: expense.id,
                payment_ids: Vec::new(),
                due_dates: Vec::new(),
                credit_card_balance: None,
                overpaid: false,
            });
        }
        self.settle(
            db_tx,
            Settlement {
                expense,
                due_dates: &overdue,
                payment_date: Some(today),
                credit_card_id,
            },
        )
        .await
    }

    /// Inserts one payment row per due date and charges the card once with
    /// the total. Skipped rows already present for a date are replaced.
    async fn settle(
        &self,
        db_tx: &DatabaseTransaction,
        settlement: Settlement<'_>,
    ) -> ResultEngine<PaymentReceipt> {
        let Settlement {
            expense,
            due_dates,
            payment_date,
            credit_card_id,
        } = settlement;
        let skipped = payment_date.is_none();

        if due_dates.is_empty() {
            return Err(EngineError::validation(
                "due_dates",
                "at least one due date is required",
            ));
        }
        let mut requested = HashSet::with_capacity(due_dates.len());
        for date in due_dates {
            if !requested.insert(*date) {
                return Err(EngineError::DuplicatePayment(format!(
                    "{} on {date} requested twice",
                    expense.name
                )));
            }
            if !expense.schedule.occurs_on(*date) {
                return Err(EngineError::validation(
                    "due_dates",
                    format!("{date} is not a due date of {}", expense.name),
                ));
            }
        }

        let existing = payments::Entity::find()
            .filter(payments::Column::ExpenseId.eq(expense.id))
            .filter(payments::Column::DueDatePaid.is_in(due_dates.iter().copied()))
            .all(db_tx)
            .await?;
        for row in existing {
            if !row.skipped {
                return Err(EngineError::DuplicatePayment(format!(
                    "{} on {}",
                    expense.name, row.due_date_paid
                )));
            }
            payments::Entity::delete_by_id(row.id).exec(db_tx).await?;
        }

        let now = Utc::now();
        let mut payment_ids = Vec::with_capacity(due_dates.len());
        for date in due_dates {
            let payment = Payment {
                id: Uuid::new_v4(),
                expense_id: expense.id,
                cost: expense.cost,
                payment_date,
                due_date_paid: *date,
                skipped,
                credit_card_id,
                created_at: now,
            };
            payments::ActiveModel::from(&payment).insert(db_tx).await?;
            payment_ids.push(payment.id);
        }

        let mut credit_card_balance = None;
        let mut overpaid = false;
        if let Some(card_id) = credit_card_id
            && !skipped
        {
            let total: MoneyCents = due_dates.iter().map(|_| expense.cost).sum();
            let balance = charge(db_tx, card_id, total).await?;
            overpaid = balance.is_negative();
            if overpaid {
                tracing::warn!(%card_id, %balance, "credit card overpaid");
            }
            credit_card_balance = Some(balance);
        }

        tracing::info!(
            expense_id = %expense.id,
            count = payment_ids.len(),
            skipped,
            "occurrences settled"
        );
        Ok(PaymentReceipt {
            expense_id: expense.id,
            payment_ids,
            due_dates: due_dates.to_vec(),
            credit_card_balance,
            overpaid,
        })
    }
}

/// Due dates that already carry a payment row, paid or skipped.
pub(super) async fn settled_dates<C: ConnectionTrait>(
    db: &C,
    expense_id: Uuid,
) -> ResultEngine<HashSet<NaiveDate>> {
    let rows = payments::Entity::find()
        .filter(payments::Column::ExpenseId.eq(expense_id))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|row| row.due_date_paid).collect())
}

/// [`settled_dates`] for many expenses in one query.
pub(super) async fn settled_by_expense<C: ConnectionTrait>(
    db: &C,
    expense_ids: &[Uuid],
) -> ResultEngine<HashMap<Uuid, HashSet<NaiveDate>>> {
    let mut settled: HashMap<Uuid, HashSet<NaiveDate>> = HashMap::new();
    if expense_ids.is_empty() {
        return Ok(settled);
    }
    let rows = payments::Entity::find()
        .filter(payments::Column::ExpenseId.is_in(expense_ids.iter().copied()))
        .all(db)
        .await?;
    for row in rows {
        settled
            .entry(row.expense_id)
            .or_default()
            .insert(row.due_date_paid);
    }
    Ok(settled)
}
