//! Persistence ports for categories, cars and products.
//!
//! Uniqueness rules (category path, car brand/model/years) are enforced by
//! the store implementations so that the check and the write happen
//! atomically.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::{car, category, product, YearList};
use crate::errors::ServiceError;

pub mod memory;
pub mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

pub const CATEGORY_PATH_TAKEN: &str = "Category with this path already exists";
pub const CAR_ALREADY_EXISTS: &str =
    "A car with the same brand, model, and production years already exists";

#[derive(Clone, Debug)]
pub struct NewCategory {
    pub text: String,
    pub path: String,
}

#[derive(Clone, Debug, Default)]
pub struct CategoryChanges {
    pub text: Option<String>,
    pub path: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug)]
pub struct NewCar {
    pub brand: String,
    pub model: String,
    pub production_years: YearList,
}

#[derive(Clone, Debug, Default)]
pub struct CarChanges {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub production_years: Option<YearList>,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub description: Vec<String>,
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
    pub image: Vec<String>,
    pub in_stock: bool,
    pub car_id: Option<Uuid>,
}

/// Partial product update. `car_id: Some(None)` clears the car reference.
#[derive(Clone, Debug, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<Vec<String>>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub image: Option<Vec<String>>,
    pub in_stock: Option<bool>,
    pub car_id: Option<Option<Uuid>>,
}

impl ProductChanges {
    pub fn in_stock(in_stock: bool) -> Self {
        Self {
            in_stock: Some(in_stock),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Active categories, newest first.
    async fn list_active(&self) -> Result<Vec<category::Model>, ServiceError>;

    async fn find_active_by_path(&self, path: &str)
        -> Result<Option<category::Model>, ServiceError>;

    /// Fails with [`CATEGORY_PATH_TAKEN`] when any category, active or not,
    /// already uses the path.
    async fn insert(&self, new: NewCategory) -> Result<category::Model, ServiceError>;

    /// Returns `None` when the category does not exist.
    async fn update(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> Result<Option<category::Model>, ServiceError>;
}

#[async_trait]
pub trait CarRepository: Send + Sync {
    /// All cars, newest first.
    async fn list(&self) -> Result<Vec<car::Model>, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<car::Model>, ServiceError>;

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<car::Model>, ServiceError>;

    /// Fails with [`CAR_ALREADY_EXISTS`] on a brand/model/years overlap.
    async fn insert(&self, new: NewCar) -> Result<car::Model, ServiceError>;

    async fn update(
        &self,
        id: Uuid,
        changes: CarChanges,
    ) -> Result<Option<car::Model>, ServiceError>;

    /// Removes the car and clears it from every product referencing it.
    /// Returns the number of detached products, or `None` if the car is absent.
    async fn delete(&self, id: Uuid) -> Result<Option<u64>, ServiceError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// All products, newest first.
    async fn list(&self) -> Result<Vec<product::Model>, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError>;

    async fn insert(&self, new: NewProduct) -> Result<product::Model, ServiceError>;

    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<product::Model>, ServiceError>;

    /// Returns `false` when nothing was deleted.
    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// True when `candidate` would duplicate `existing` under the car uniqueness rule.
pub(crate) fn car_conflicts(
    existing: &car::Model,
    brand: &str,
    model: &str,
    years: &YearList,
    exclude: Option<Uuid>,
) -> bool {
    Some(existing.id) != exclude
        && existing.brand == brand
        && existing.model == model
        && existing.production_years.overlaps(years)
}

pub(crate) fn category_path_taken() -> ServiceError {
    ServiceError::validation(CATEGORY_PATH_TAKEN)
}

pub(crate) fn car_already_exists() -> ServiceError {
    ServiceError::validation(CAR_ALREADY_EXISTS)
}
