#![allow(dead_code)]

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, ExpenseInput, MoneyCents, RecurrenceRate};
use migration::MigratorTrait;
use uuid::Uuid;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

pub async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for user in [ALICE, BOB] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, password) VALUES (?, ?)",
            vec![user.into(), "password".into()],
        ))
        .await
        .unwrap();
    }
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn expense_input(name: &str, cents: i64, rate: RecurrenceRate, start: NaiveDate) -> ExpenseInput {
    ExpenseInput {
        name: name.to_string(),
        cost: MoneyCents::new(cents),
        description: None,
        recurrence_rate: rate,
        start_date: start,
        end_date: None,
        due_end_of_month: false,
        category_id: None,
        automatic_payments: false,
        automatic_payment_credit_card_id: None,
    }
}

pub async fn count(db: &DatabaseConnection, sql: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

pub async fn payment_count(db: &DatabaseConnection, expense_id: Uuid) -> i64 {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM payments WHERE expense_id = ?",
            vec![expense_id.as_bytes().to_vec().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}
