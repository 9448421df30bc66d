use std::future::Future;

use sea_orm::DatabaseConnection;

use crate::ResultEngine;

mod access;
mod categories;
mod credit_cards;
mod dashboard;
mod expenses;
mod listing;
mod payments;
mod statistics;

pub use credit_cards::{BalanceUpdate, Reconciliation};
pub use dashboard::{CalendarDay, CalendarEntry, LateExpense, UpcomingOccurrence};
pub use listing::{ExpenseAction, ExpenseRow, PaymentAction, PaymentRow};
pub use payments::{AutoPayment, PayDueDates, PaymentReceipt};
pub use statistics::{CategoryAverage, CategoryTotal, MonthlyTotals};

/// Run a block inside a DB transaction, committing on success and rolling
/// back on error before the error propagates.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $crate::ops::unit_of_work(async { $body }).await;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

/// Pins the output of a `with_tx!` body so `?` inside it converts into
/// [`crate::EngineError`].
pub(crate) async fn unit_of_work<T, F>(body: F) -> ResultEngine<T>
where
    F: Future<Output = ResultEngine<T>>,
{
    body.await
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
