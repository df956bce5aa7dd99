use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{car, YearList};
use crate::errors::ServiceError;
use crate::repositories::{CarChanges, CarRepository, NewCar};

pub const YEARS_REQUIRED: &str = "At least one production year is required";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCarInput {
    #[validate(length(min = 1, message = "Car brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "Car model is required"))]
    pub model: String,
    #[serde(default)]
    pub production_years: Vec<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCarInput {
    #[validate(length(min = 1, message = "Car brand cannot be empty"))]
    pub brand: Option<String>,
    #[validate(length(min = 1, message = "Car model cannot be empty"))]
    pub model: Option<String>,
    pub production_years: Option<Vec<i32>>,
}

fn years(values: Vec<i32>) -> Result<YearList, ServiceError> {
    if values.is_empty() {
        return Err(ServiceError::validation(YEARS_REQUIRED));
    }
    Ok(YearList::normalized(values))
}

#[derive(Clone)]
pub struct CarService {
    repo: Arc<dyn CarRepository>,
}

impl CarService {
    pub fn new(repo: Arc<dyn CarRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<car::Model>, ServiceError> {
        self.repo.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<car::Model, ServiceError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Car"))
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateCarInput) -> Result<car::Model, ServiceError> {
        let input = CreateCarInput {
            brand: input.brand.trim().to_string(),
            model: input.model.trim().to_string(),
            production_years: input.production_years,
        };
        input.validate()?;

        let car = self
            .repo
            .insert(NewCar {
                brand: input.brand,
                model: input.model,
                production_years: years(input.production_years)?,
            })
            .await?;
        info!(car_id = %car.id, brand = %car.brand, model = %car.model, "Created car");
        Ok(car)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: Uuid, input: UpdateCarInput) -> Result<car::Model, ServiceError> {
        let input = UpdateCarInput {
            brand: input.brand.map(|b| b.trim().to_string()),
            model: input.model.map(|m| m.trim().to_string()),
            production_years: input.production_years,
        };
        input.validate()?;

        let changes = CarChanges {
            brand: input.brand,
            model: input.model,
            production_years: input.production_years.map(years).transpose()?,
        };
        let car = self
            .repo
            .update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("Car"))?;
        info!(car_id = %id, "Updated car");
        Ok(car)
    }

    /// Hard delete; products that referenced the car lose the reference.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let detached = self
            .repo
            .delete(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Car"))?;
        info!(car_id = %id, detached_products = detached, "Deleted car");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryStore;
    use assert_matches::assert_matches;

    fn toyota(years: Vec<i32>) -> CreateCarInput {
        CreateCarInput {
            brand: "Toyota".into(),
            model: "Corolla".into(),
            production_years: years,
        }
    }

    #[tokio::test]
    async fn overlapping_years_collide() {
        let svc = CarService::new(Arc::new(MemoryStore::new()));
        svc.create(toyota(vec![2010, 2011])).await.unwrap();

        let err = svc.create(toyota(vec![2011, 2012])).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "A car with the same brand, model, and production years already exists"
        );

        // disjoint years are a separate generation
        svc.create(toyota(vec![2013])).await.unwrap();
        assert_eq!(svc.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn years_are_required_and_normalized() {
        let svc = CarService::new(Arc::new(MemoryStore::new()));
        let err = svc.create(toyota(vec![])).await.unwrap_err();
        assert_eq!(err.to_string(), YEARS_REQUIRED);

        let car = svc.create(toyota(vec![2012, 2010, 2012])).await.unwrap();
        assert_eq!(car.production_years.0, vec![2010, 2012]);

        let err = svc
            .update(
                car.id,
                UpdateCarInput {
                    production_years: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn delete_missing_car_is_not_found() {
        let svc = CarService::new(Arc::new(MemoryStore::new()));
        assert_matches!(
            svc.delete(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(msg)) if msg == "Car not found"
        );
    }
}
