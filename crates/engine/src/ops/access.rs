//! Owner-scoped lookups. A row that exists but belongs to another user is
//! reported exactly like a missing one.

use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, categories, credit_cards, expenses, users};

use super::Engine;

/// Generates a `require_*` method that loads one row owned by `user_id`.
macro_rules! impl_owned_lookup {
    ($require_fn:ident, $entity:path, $model:path, $user_col:expr, $label:literal) => {
        pub(super) async fn $require_fn<C: ConnectionTrait>(
            &self,
            db: &C,
            user_id: &str,
            id: Uuid,
        ) -> ResultEngine<$model> {
            <$entity>::find_by_id(id)
                .filter($user_col.eq(user_id))
                .one(db)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("{} {id}", $label)))
        }
    };
}

impl Engine {
    /// Rows are only created for registered users.
    pub(super) async fn require_user<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("user {user_id}")))
    }

    impl_owned_lookup!(
        require_expense,
        expenses::Entity,
        expenses::Model,
        expenses::Column::UserId,
        "expense"
    );

    impl_owned_lookup!(
        require_credit_card,
        credit_cards::Entity,
        credit_cards::Model,
        credit_cards::Column::UserId,
        "credit card"
    );

    impl_owned_lookup!(
        require_category,
        categories::Entity,
        categories::Model,
        categories::Column::UserId,
        "category"
    );

    /// Checks an optional card reference without loading the row.
    pub(super) async fn require_optional_card<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        card_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        if let Some(card_id) = card_id {
            self.require_credit_card(db, user_id, card_id).await?;
        }
        Ok(())
    }
}
