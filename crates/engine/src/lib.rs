//! Core of a recurring expense tracker.
//!
//! The engine derives expense occurrences from their schedule, settles them
//! in a payment ledger, keeps credit-card balances in step with that ledger
//! and compiles client table queries into parameterized SQL. Every operation
//! lives on [`Engine`] and takes the owning user id explicitly.

pub use categories::Category;
pub use credit_card_payments::CreditCardPayment;
pub use credit_cards::CreditCard;
pub use error::EngineError;
pub use expenses::{Expense, ExpenseInput};
pub use money::MoneyCents;
pub use ops::{
    AutoPayment, BalanceUpdate, CalendarDay, CalendarEntry, CategoryAverage, CategoryTotal,
    Engine, EngineBuilder, ExpenseAction, ExpenseRow, LateExpense, MonthlyTotals, PayDueDates,
    PaymentAction, PaymentReceipt, PaymentRow, Reconciliation, UpcomingOccurrence,
};
pub use payments::Payment;
pub use query::{
    ApplyQueryPlan, ColumnRef, ExpenseFilterOption, ExpenseSearchColumn, ExpenseSortColumn,
    ExpenseTable, FilterOption, FilterType, PaymentFilterOption, PaymentSearchColumn,
    PaymentSortColumn, PaymentTable, Predicate, QueryParam, QueryPlan, RawFilter, RawTableQuery,
    SortDirection, TableColumn, TableQuery, TableShape,
};
pub use ranges::{RangeToken, ResolvedRange};
pub use recurrence::{
    Occurrences, RecurrenceRate, Schedule, next_due_date_on_or_after,
    next_due_date_on_or_after_today,
};

mod categories;
mod credit_card_payments;
mod credit_cards;
mod error;
mod expenses;
mod money;
mod ops;
mod payments;
mod query;
mod ranges;
mod recurrence;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
