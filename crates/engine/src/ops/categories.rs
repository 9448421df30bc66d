use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    Category, EngineError, ResultEngine, categories, expenses,
    util::{normalize_category_key, normalize_required_name, search_key},
};

use super::{Engine, with_tx};

impl Engine {
    /// Fails when another category of the user already folds to `name_norm`.
    async fn ensure_category_name_free<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: &str,
        name_norm: &str,
        except: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut query = categories::Entity::find()
            .filter(categories::Column::UserId.eq(user_id))
            .filter(categories::Column::NameNorm.eq(name_norm));
        if let Some(id) = except {
            query = query.filter(categories::Column::Id.ne(id));
        }
        if let Some(existing) = query.one(db).await? {
            return Err(EngineError::validation(
                "category",
                format!("'{}' already exists", existing.name),
            ));
        }
        Ok(())
    }

    pub async fn new_category(&self, user_id: &str, name: &str) -> ResultEngine<Category> {
        let name = normalize_required_name(name, "category")?;
        let name_norm = normalize_category_key(&name)?;

        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;
            self.ensure_category_name_free(&db_tx, user_id, &name_norm, None)
                .await?;
            let active = categories::ActiveModel {
                id: ActiveValue::Set(Uuid::new_v4()),
                user_id: ActiveValue::Set(user_id.to_string()),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
                name_search: ActiveValue::Set(search_key(&name)),
                active: ActiveValue::Set(true),
            };
            let model = active.insert(&db_tx).await?;
            tracing::info!(category_id = %model.id, name = %model.name, "category created");
            Ok(Category::from(model))
        })
    }

    pub async fn rename_category(
        &self,
        user_id: &str,
        category_id: Uuid,
        name: &str,
    ) -> ResultEngine<Category> {
        let name = normalize_required_name(name, "category")?;
        let name_norm = normalize_category_key(&name)?;

        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;
            self.ensure_category_name_free(&db_tx, user_id, &name_norm, Some(category_id))
                .await?;
            let active = categories::ActiveModel {
                id: ActiveValue::Set(category_id),
                name: ActiveValue::Set(name.clone()),
                name_norm: ActiveValue::Set(name_norm.clone()),
                name_search: ActiveValue::Set(search_key(&name)),
                ..Default::default()
            };
            let model = active.update(&db_tx).await?;
            tracing::info!(category_id = %model.id, name = %model.name, "category renamed");
            Ok(Category::from(model))
        })
    }

    /// Inactive categories stay attached to their expenses.
    pub async fn set_category_active(
        &self,
        user_id: &str,
        category_id: Uuid,
        active: bool,
    ) -> ResultEngine<Category> {
        self.require_category(&self.database, user_id, category_id)
            .await?;
        let update = categories::ActiveModel {
            id: ActiveValue::Set(category_id),
            active: ActiveValue::Set(active),
            ..Default::default()
        };
        let model = update.update(&self.database).await?;
        tracing::info!(category_id = %model.id, active, "category visibility changed");
        Ok(Category::from(model))
    }

    pub async fn list_categories(
        &self,
        user_id: &str,
        include_inactive: bool,
    ) -> ResultEngine<Vec<Category>> {
        let mut query = categories::Entity::find().filter(categories::Column::UserId.eq(user_id));
        if !include_inactive {
            query = query.filter(categories::Column::Active.eq(true));
        }
        let models = query
            .order_by_asc(categories::Column::NameNorm)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Category::from).collect())
    }

    /// Deletes a category. Its expenses are detached, never deleted.
    pub async fn delete_category(&self, user_id: &str, category_id: Uuid) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_category(&db_tx, user_id, category_id).await?;
            let detached = expenses::Entity::update_many()
                .col_expr(expenses::Column::CategoryId, Expr::value(Option::<Uuid>::None))
                .filter(expenses::Column::UserId.eq(user_id))
                .filter(expenses::Column::CategoryId.eq(category_id))
                .exec(&db_tx)
                .await?;
            categories::Entity::delete_by_id(category_id)
                .exec(&db_tx)
                .await?;
            tracing::info!(
                %category_id,
                detached = detached.rows_affected,
                "category deleted"
            );
            Ok(())
        })
    }
}
