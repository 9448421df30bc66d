//! Initial schema migration.
//!
//! It creates the complete schema for Billfold:
//!
//! - `users`: authentication (owned by the outer auth layer)
//! - `categories`: user-defined expense groups
//! - `credit_cards`: cards with a cached running balance
//! - `expenses`: recurring expenses and their cadence
//! - `payments`: settled (paid or skipped) expense occurrences
//! - `credit_card_payments`: balance payments made towards a card

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Users {
    Table,
    Username,
    Password,
}

#[derive(Iden)]
enum Categories {
    Table,
    Id,
    UserId,
    Name,
    NameNorm,
    NameSearch,
    Active,
}

#[derive(Iden)]
enum CreditCards {
    Table,
    Id,
    UserId,
    Company,
    CompanySearch,
    RunningBalanceMinor,
    CreatedAt,
}

#[derive(Iden)]
enum Expenses {
    Table,
    Id,
    UserId,
    Name,
    NameSearch,
    CostMinor,
    Description,
    DescriptionSearch,
    RecurrenceRate,
    StartDate,
    EndDate,
    DueEndOfMonth,
    CategoryId,
    Active,
    AutomaticPayments,
    AutomaticPaymentCreditCardId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Payments {
    Table,
    Id,
    ExpenseId,
    CostMinor,
    PaymentDate,
    DueDatePaid,
    Skipped,
    CreditCardId,
    CreatedAt,
}

#[derive(Iden)]
enum CreditCardPayments {
    Table,
    Id,
    CreditCardId,
    AmountMinor,
    PaymentDate,
    CreatedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Users
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Username)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Password).string().not_null())
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Categories
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::UserId).string().not_null())
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::NameNorm).string().not_null())
                    .col(ColumnDef::new(Categories::NameSearch).string().not_null())
                    .col(
                        ColumnDef::new(Categories::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-categories-user_id")
                            .from(Categories::Table, Categories::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-categories-user_id-name_norm-unique")
                    .table(Categories::Table)
                    .col(Categories::UserId)
                    .col(Categories::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Credit cards
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CreditCards::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditCards::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CreditCards::UserId).string().not_null())
                    .col(ColumnDef::new(CreditCards::Company).string().not_null())
                    .col(ColumnDef::new(CreditCards::CompanySearch).string().not_null())
                    .col(
                        ColumnDef::new(CreditCards::RunningBalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CreditCards::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credit_cards-user_id")
                            .from(CreditCards::Table, CreditCards::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Expenses
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Expenses::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Expenses::UserId).string().not_null())
                    .col(ColumnDef::new(Expenses::Name).string().not_null())
                    .col(ColumnDef::new(Expenses::NameSearch).string().not_null())
                    .col(ColumnDef::new(Expenses::CostMinor).big_integer().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .col(ColumnDef::new(Expenses::DescriptionSearch).string())
                    .col(ColumnDef::new(Expenses::RecurrenceRate).string().not_null())
                    .col(ColumnDef::new(Expenses::StartDate).date().not_null())
                    .col(ColumnDef::new(Expenses::EndDate).date())
                    .col(
                        ColumnDef::new(Expenses::DueEndOfMonth)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Expenses::CategoryId).blob())
                    .col(
                        ColumnDef::new(Expenses::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Expenses::AutomaticPayments)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Expenses::AutomaticPaymentCreditCardId).blob())
                    .col(ColumnDef::new(Expenses::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Expenses::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-user_id")
                            .from(Expenses::Table, Expenses::UserId)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-category_id")
                            .from(Expenses::Table, Expenses::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-expenses-automatic_payment_credit_card_id")
                            .from(Expenses::Table, Expenses::AutomaticPaymentCreditCardId)
                            .to(CreditCards::Table, CreditCards::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-expenses-user_id")
                    .table(Expenses::Table)
                    .col(Expenses::UserId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Payments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Payments::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Payments::ExpenseId).blob().not_null())
                    .col(ColumnDef::new(Payments::CostMinor).big_integer().not_null())
                    .col(ColumnDef::new(Payments::PaymentDate).date())
                    .col(ColumnDef::new(Payments::DueDatePaid).date().not_null())
                    .col(
                        ColumnDef::new(Payments::Skipped)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Payments::CreditCardId).blob())
                    .col(ColumnDef::new(Payments::CreatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-expense_id")
                            .from(Payments::Table, Payments::ExpenseId)
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payments-credit_card_id")
                            .from(Payments::Table, Payments::CreditCardId)
                            .to(CreditCards::Table, CreditCards::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One ledger row per occurrence; skipped rows are replaced, never duplicated.
        manager
            .create_index(
                Index::create()
                    .name("idx-payments-expense_id-due_date_paid-unique")
                    .table(Payments::Table)
                    .col(Payments::ExpenseId)
                    .col(Payments::DueDatePaid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-payments-credit_card_id")
                    .table(Payments::Table)
                    .col(Payments::CreditCardId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Credit card payments
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(CreditCardPayments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CreditCardPayments::Id)
                            .blob()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CreditCardPayments::CreditCardId)
                            .blob()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditCardPayments::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditCardPayments::PaymentDate)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CreditCardPayments::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-credit_card_payments-credit_card_id")
                            .from(CreditCardPayments::Table, CreditCardPayments::CreditCardId)
                            .to(CreditCards::Table, CreditCards::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(CreditCardPayments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CreditCards::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
