use std::sync::Arc;

use crate::errors::ServiceError;
use crate::repositories::{CarRepository, CategoryRepository, ProductRepository};
use crate::services::{CarService, CategoryService, ProductService};
use crate::storage::ImageStore;

pub mod cars;
pub mod categories;
pub mod common;
pub mod products;
pub mod seller;

/// Services shared by all handlers.
#[derive(Clone)]
pub struct AppServices {
    pub categories: CategoryService,
    pub cars: CarService,
    pub products: ProductService,
    store: Arc<dyn ProductRepository>,
}

impl AppServices {
    /// Wires every service onto one store implementing all repositories.
    pub fn new<S>(store: Arc<S>, images: Arc<dyn ImageStore>) -> Self
    where
        S: CategoryRepository + CarRepository + ProductRepository + 'static,
    {
        let categories: Arc<dyn CategoryRepository> = store.clone();
        let cars: Arc<dyn CarRepository> = store.clone();
        let products: Arc<dyn ProductRepository> = store;

        Self {
            categories: CategoryService::new(categories),
            cars: CarService::new(cars.clone()),
            products: ProductService::new(products.clone(), cars, images),
            store: products,
        }
    }

    /// Store connectivity check.
    pub async fn ping(&self) -> Result<(), ServiceError> {
        self.store.ping().await
    }
}
