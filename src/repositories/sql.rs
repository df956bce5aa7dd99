use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    car_already_exists, car_conflicts, category_path_taken, CarChanges, CarRepository,
    CategoryChanges, CategoryRepository, NewCar, NewCategory, NewProduct, ProductChanges,
    ProductRepository,
};
use crate::entities::{car, category, product, StringList, YearList};
use crate::errors::ServiceError;

/// sea-orm backed store for all three collections.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: Arc<DatabaseConnection>,
}

impl SqlStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Maps a unique-index violation on `categories.path` to the collision error.
fn map_category_write_error(err: DbErr) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => category_path_taken(),
        _ => ServiceError::DatabaseError(err),
    }
}

/// Holds a Postgres transaction-scoped advisory lock on `brand`/`model`, so
/// concurrent writers of the same pair run their overlap check one at a time.
/// SQLite transactions already hold the database write lock.
async fn lock_car_identity<C: ConnectionTrait>(
    conn: &C,
    brand: &str,
    model: &str,
) -> Result<(), ServiceError> {
    if conn.get_database_backend() != DbBackend::Postgres {
        return Ok(());
    }
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        [format!("car:{brand}:{model}").into()],
    ))
    .await?;
    debug!(brand, model, "car identity locked");
    Ok(())
}

async fn ensure_no_car_conflict<C: ConnectionTrait>(
    conn: &C,
    brand: &str,
    model: &str,
    years: &YearList,
    exclude: Option<Uuid>,
) -> Result<(), ServiceError> {
    lock_car_identity(conn, brand, model).await?;
    let same_model = car::Entity::find()
        .filter(car::Column::Brand.eq(brand))
        .filter(car::Column::Model.eq(model))
        .all(conn)
        .await?;

    if same_model
        .iter()
        .any(|existing| car_conflicts(existing, brand, model, years, exclude))
    {
        return Err(car_already_exists());
    }
    Ok(())
}

#[async_trait]
impl CategoryRepository for SqlStore {
    async fn list_active(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .filter(category::Column::IsActive.eq(true))
            .order_by_desc(category::Column::CreatedAt)
            .all(self.get_db())
            .await?)
    }

    async fn find_active_by_path(
        &self,
        path: &str,
    ) -> Result<Option<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .filter(category::Column::Path.eq(path))
            .filter(category::Column::IsActive.eq(true))
            .one(self.get_db())
            .await?)
    }

    #[instrument(skip(self, new), fields(path = %new.path))]
    async fn insert(&self, new: NewCategory) -> Result<category::Model, ServiceError> {
        let txn = self.get_db().begin().await?;

        let taken = category::Entity::find()
            .filter(category::Column::Path.eq(new.path.as_str()))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(category_path_taken());
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            text: Set(new.text),
            path: Set(new.path),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(map_category_write_error)?;

        txn.commit().await.map_err(map_category_write_error)?;
        debug!(category_id = %model.id, "category inserted");
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> Result<Option<category::Model>, ServiceError> {
        let txn = self.get_db().begin().await?;

        let Some(current) = category::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        if let Some(path) = &changes.path {
            let taken = category::Entity::find()
                .filter(category::Column::Path.eq(path.as_str()))
                .filter(category::Column::Id.ne(id))
                .one(&txn)
                .await?;
            if taken.is_some() {
                return Err(category_path_taken());
            }
        }

        let mut active: category::ActiveModel = current.into();
        if let Some(text) = changes.text {
            active.text = Set(text);
        }
        if let Some(path) = changes.path {
            active.path = Set(path);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let model = active
            .update(&txn)
            .await
            .map_err(map_category_write_error)?;
        txn.commit().await.map_err(map_category_write_error)?;
        Ok(Some(model))
    }
}

#[async_trait]
impl CarRepository for SqlStore {
    async fn list(&self) -> Result<Vec<car::Model>, ServiceError> {
        Ok(car::Entity::find()
            .order_by_desc(car::Column::CreatedAt)
            .all(self.get_db())
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<car::Model>, ServiceError> {
        Ok(car::Entity::find_by_id(id).one(self.get_db()).await?)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<car::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(car::Entity::find()
            .filter(car::Column::Id.is_in(ids.iter().copied()))
            .all(self.get_db())
            .await?)
    }

    #[instrument(skip(self, new), fields(brand = %new.brand, model = %new.model))]
    async fn insert(&self, new: NewCar) -> Result<car::Model, ServiceError> {
        let txn = self.get_db().begin().await?;
        ensure_no_car_conflict(&txn, &new.brand, &new.model, &new.production_years, None).await?;

        let now = Utc::now();
        let model = car::ActiveModel {
            id: Set(Uuid::new_v4()),
            brand: Set(new.brand),
            model: Set(new.model),
            production_years: Set(new.production_years),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(model)
    }

    #[instrument(skip(self, changes))]
    async fn update(
        &self,
        id: Uuid,
        changes: CarChanges,
    ) -> Result<Option<car::Model>, ServiceError> {
        let txn = self.get_db().begin().await?;
        let Some(current) = car::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let brand = changes.brand.unwrap_or_else(|| current.brand.clone());
        let model = changes.model.unwrap_or_else(|| current.model.clone());
        let years = changes
            .production_years
            .unwrap_or_else(|| current.production_years.clone());
        ensure_no_car_conflict(&txn, &brand, &model, &years, Some(id)).await?;

        let mut active: car::ActiveModel = current.into();
        active.brand = Set(brand);
        active.model = Set(model);
        active.production_years = Set(years);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&txn).await?;
        txn.commit().await?;
        Ok(Some(updated))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<Option<u64>, ServiceError> {
        let txn = self.get_db().begin().await?;

        let deleted = car::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Ok(None);
        }

        let detached = product::Entity::update_many()
            .col_expr(product::Column::CarId, Expr::value(Option::<Uuid>::None))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::CarId.eq(id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(Some(detached.rows_affected))
    }
}

#[async_trait]
impl ProductRepository for SqlStore {
    async fn list(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_desc(product::Column::CreatedAt)
            .all(self.get_db())
            .await?)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(product::Entity::find_by_id(id).one(self.get_db()).await?)
    }

    async fn insert(&self, new: NewProduct) -> Result<product::Model, ServiceError> {
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            description: Set(StringList(new.description)),
            category: Set(new.category),
            price: Set(new.price),
            offer_price: Set(new.offer_price),
            image: Set(StringList(new.image)),
            in_stock: Set(new.in_stock),
            car_id: Set(new.car_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.get_db())
        .await?;
        Ok(model)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<product::Model>, ServiceError> {
        let Some(current) = product::Entity::find_by_id(id).one(self.get_db()).await? else {
            return Ok(None);
        };

        let mut active: product::ActiveModel = current.into();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(StringList(description));
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(price) = changes.price {
            active.price = Set(price);
        }
        if let Some(offer_price) = changes.offer_price {
            active.offer_price = Set(offer_price);
        }
        if let Some(image) = changes.image {
            active.image = Set(StringList(image));
        }
        if let Some(in_stock) = changes.in_stock {
            active.in_stock = Set(in_stock);
        }
        if let Some(car_id) = changes.car_id {
            active.car_id = Set(car_id);
        }
        active.updated_at = Set(Utc::now());

        Ok(Some(active.update(self.get_db()).await?))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = product::Entity::delete_by_id(id)
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        crate::db::check_connection(self.get_db()).await
    }
}
