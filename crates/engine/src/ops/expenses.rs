use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, TransactionTrait, prelude::*, sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ExpenseInput, Payment, ResultEngine, expenses, payments,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, credit_cards::refund_charge, with_tx};

impl Engine {
    /// Trims text fields and checks that referenced rows belong to the user.
    async fn prepare_expense_input<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        mut input: ExpenseInput,
    ) -> ResultEngine<ExpenseInput> {
        self.require_user(db, user_id).await?;
        input.name = normalize_required_name(&input.name, "name")?;
        input.description = normalize_optional_text(input.description.as_deref());
        if let Some(category_id) = input.category_id {
            self.require_category(db, user_id, category_id).await?;
        }
        self.require_optional_card(db, user_id, input.automatic_payment_credit_card_id)
            .await?;
        Ok(input)
    }

    pub async fn new_expense(&self, user_id: &str, input: ExpenseInput) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let input = self.prepare_expense_input(&db_tx, user_id, input).await?;
            let expense = Expense::new(user_id, input, Utc::now())?;
            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            tracing::info!(expense_id = %expense.id, name = %expense.name, "expense created");
            Ok(expense)
        })
    }

    pub async fn expense(&self, user_id: &str, expense_id: Uuid) -> ResultEngine<Expense> {
        let model = self
            .require_expense(&self.database, user_id, expense_id)
            .await?;
        Expense::try_from(model)
    }

    /// Replaces the editable fields of an expense. Recorded payments are kept
    /// as they are.
    pub async fn update_expense(
        &self,
        user_id: &str,
        expense_id: Uuid,
        input: ExpenseInput,
    ) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let current = Expense::try_from(
                self.require_expense(&db_tx, user_id, expense_id).await?,
            )?;
            let input = self.prepare_expense_input(&db_tx, user_id, input).await?;

            let mut expense = Expense::new(user_id, input, current.created_at)?;
            expense.id = current.id;
            expense.active = current.active;
            expense.updated_at = Utc::now();

            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            tracing::info!(expense_id = %expense.id, "expense updated");
            Ok(expense)
        })
    }

    pub async fn set_expense_active(
        &self,
        user_id: &str,
        expense_id: Uuid,
        active: bool,
    ) -> ResultEngine<Expense> {
        let model = self
            .require_expense(&self.database, user_id, expense_id)
            .await?;
        let update = expenses::ActiveModel {
            id: ActiveValue::Set(model.id),
            active: ActiveValue::Set(active),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        let model = update.update(&self.database).await?;
        tracing::info!(%expense_id, active, "expense activation changed");
        Expense::try_from(model)
    }

    /// Moves a batch of expenses to `category_id` (or detaches them with
    /// `None`). Returns the number of expenses changed.
    pub async fn set_expenses_category(
        &self,
        user_id: &str,
        expense_ids: &[Uuid],
        category_id: Option<Uuid>,
    ) -> ResultEngine<u64> {
        if expense_ids.is_empty() {
            return Ok(0);
        }

        with_tx!(self, |db_tx| {
            if let Some(category_id) = category_id {
                self.require_category(&db_tx, user_id, category_id).await?;
            }
            for expense_id in expense_ids {
                self.require_expense(&db_tx, user_id, *expense_id).await?;
            }

            let updated = expenses::Entity::update_many()
                .col_expr(expenses::Column::CategoryId, Expr::value(category_id))
                .col_expr(expenses::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(expenses::Column::UserId.eq(user_id))
                .filter(expenses::Column::Id.is_in(expense_ids.iter().copied()))
                .exec(&db_tx)
                .await?;
            tracing::info!(
                count = updated.rows_affected,
                category_id = ?category_id,
                "expenses recategorized"
            );
            Ok(updated.rows_affected)
        })
    }

    /// Deletes an expense with its payments, reversing the card charges those
    /// payments carried.
    pub async fn delete_expense(&self, user_id: &str, expense_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_expense(&db_tx, user_id, expense_id).await?;

            let rows = payments::Entity::find()
                .filter(payments::Column::ExpenseId.eq(expense_id))
                .all(&db_tx)
                .await?;
            for payment in rows.into_iter().map(Payment::from) {
                if let Some((card_id, amount)) = payment.card_charge() {
                    refund_charge(&db_tx, card_id, amount).await?;
                }
            }
            payments::Entity::delete_many()
                .filter(payments::Column::ExpenseId.eq(expense_id))
                .exec(&db_tx)
                .await?;

            let deleted = expenses::Entity::delete_by_id(expense_id)
                .exec(&db_tx)
                .await?;
            if deleted.rows_affected == 0 {
                return Err(EngineError::NotFound(format!("expense {expense_id}")));
            }
            tracing::info!(%expense_id, "expense deleted");
            Ok(())
        })
    }
}
