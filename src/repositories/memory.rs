use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    car_already_exists, car_conflicts, category_path_taken, CarChanges, CarRepository,
    CategoryChanges, CategoryRepository, NewCar, NewCategory, NewProduct, ProductChanges,
    ProductRepository,
};
use crate::entities::{car, category, product, StringList};
use crate::errors::ServiceError;

/// In-process store. Records are kept in insertion order so listings can
/// return newest first without relying on timestamp resolution.
#[derive(Debug, Default)]
pub struct MemoryStore {
    categories: RwLock<Vec<category::Model>>,
    cars: RwLock<Vec<car::Model>>,
    products: RwLock<Vec<product::Model>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every category regardless of the active flag.
    pub async fn all_categories(&self) -> Vec<category::Model> {
        self.categories.read().await.clone()
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list_active(&self) -> Result<Vec<category::Model>, ServiceError> {
        let categories = self.categories.read().await;
        Ok(categories
            .iter()
            .rev()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn find_active_by_path(
        &self,
        path: &str,
    ) -> Result<Option<category::Model>, ServiceError> {
        let categories = self.categories.read().await;
        Ok(categories
            .iter()
            .find(|c| c.is_active && c.path == path)
            .cloned())
    }

    async fn insert(&self, new: NewCategory) -> Result<category::Model, ServiceError> {
        let mut categories = self.categories.write().await;
        if categories.iter().any(|c| c.path == new.path) {
            return Err(category_path_taken());
        }

        let now = Utc::now();
        let model = category::Model {
            id: Uuid::new_v4(),
            text: new.text,
            path: new.path,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        categories.push(model.clone());
        Ok(model)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> Result<Option<category::Model>, ServiceError> {
        let mut categories = self.categories.write().await;

        if let Some(path) = &changes.path {
            if categories.iter().any(|c| c.id != id && &c.path == path) {
                return Err(category_path_taken());
            }
        }

        let Some(existing) = categories.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        if let Some(text) = changes.text {
            existing.text = text;
        }
        if let Some(path) = changes.path {
            existing.path = path;
        }
        if let Some(is_active) = changes.is_active {
            existing.is_active = is_active;
        }
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }
}

#[async_trait]
impl CarRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<car::Model>, ServiceError> {
        let cars = self.cars.read().await;
        Ok(cars.iter().rev().cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<car::Model>, ServiceError> {
        let cars = self.cars.read().await;
        Ok(cars.iter().find(|c| c.id == id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<car::Model>, ServiceError> {
        let cars = self.cars.read().await;
        Ok(cars.iter().filter(|c| ids.contains(&c.id)).cloned().collect())
    }

    async fn insert(&self, new: NewCar) -> Result<car::Model, ServiceError> {
        let mut cars = self.cars.write().await;
        if cars
            .iter()
            .any(|c| car_conflicts(c, &new.brand, &new.model, &new.production_years, None))
        {
            return Err(car_already_exists());
        }

        let now = Utc::now();
        let model = car::Model {
            id: Uuid::new_v4(),
            brand: new.brand,
            model: new.model,
            production_years: new.production_years,
            created_at: now,
            updated_at: now,
        };
        cars.push(model.clone());
        Ok(model)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: CarChanges,
    ) -> Result<Option<car::Model>, ServiceError> {
        let mut cars = self.cars.write().await;
        let Some(current) = cars.iter().find(|c| c.id == id).cloned() else {
            return Ok(None);
        };

        let brand = changes.brand.unwrap_or(current.brand);
        let model = changes.model.unwrap_or(current.model);
        let years = changes.production_years.unwrap_or(current.production_years);
        if cars
            .iter()
            .any(|c| car_conflicts(c, &brand, &model, &years, Some(id)))
        {
            return Err(car_already_exists());
        }

        let Some(existing) = cars.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        existing.brand = brand;
        existing.model = model;
        existing.production_years = years;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<Option<u64>, ServiceError> {
        let mut cars = self.cars.write().await;
        let before = cars.len();
        cars.retain(|c| c.id != id);
        if cars.len() == before {
            return Ok(None);
        }

        // Held together with the cars lock so no product can pick up the id meanwhile.
        let mut products = self.products.write().await;
        let mut detached = 0;
        for product in products.iter_mut().filter(|p| p.car_id == Some(id)) {
            product.car_id = None;
            product.updated_at = Utc::now();
            detached += 1;
        }
        Ok(Some(detached))
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn list(&self) -> Result<Vec<product::Model>, ServiceError> {
        let products = self.products.read().await;
        Ok(products.iter().rev().cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, new: NewProduct) -> Result<product::Model, ServiceError> {
        let now = Utc::now();
        let model = product::Model {
            id: Uuid::new_v4(),
            name: new.name,
            description: StringList(new.description),
            category: new.category,
            price: new.price,
            offer_price: new.offer_price,
            image: StringList(new.image),
            in_stock: new.in_stock,
            car_id: new.car_id,
            created_at: now,
            updated_at: now,
        };
        self.products.write().await.push(model.clone());
        Ok(model)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: ProductChanges,
    ) -> Result<Option<product::Model>, ServiceError> {
        let mut products = self.products.write().await;
        let Some(existing) = products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            existing.name = name;
        }
        if let Some(description) = changes.description {
            existing.description = StringList(description);
        }
        if let Some(category) = changes.category {
            existing.category = category;
        }
        if let Some(price) = changes.price {
            existing.price = price;
        }
        if let Some(offer_price) = changes.offer_price {
            existing.offer_price = offer_price;
        }
        if let Some(image) = changes.image {
            existing.image = StringList(image);
        }
        if let Some(in_stock) = changes.in_stock {
            existing.in_stock = in_stock;
        }
        if let Some(car_id) = changes.car_id {
            existing.car_id = car_id;
        }
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, ServiceError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|p| p.id != id);
        Ok(products.len() != before)
    }
}
