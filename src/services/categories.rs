use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::category;
use crate::errors::ServiceError;
use crate::repositories::{CategoryChanges, CategoryRepository, NewCategory};

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    #[validate(length(min = 1, message = "Category text is required"))]
    pub text: String,
    #[validate(length(min = 1, message = "Category path is required"))]
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    #[validate(length(min = 1, message = "Category text cannot be empty"))]
    pub text: Option<String>,
    #[validate(length(min = 1, message = "Category path cannot be empty"))]
    pub path: Option<String>,
    pub is_active: Option<bool>,
}

/// Category management. Deletion is logical: the record stays and keeps
/// its path reserved.
#[derive(Clone)]
pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<category::Model>, ServiceError> {
        self.repo.list_active().await
    }

    pub async fn get_by_path(&self, path: &str) -> Result<category::Model, ServiceError> {
        self.repo
            .find_active_by_path(path.trim())
            .await?
            .ok_or_else(|| ServiceError::not_found("Category"))
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let input = CreateCategoryInput {
            text: input.text.trim().to_string(),
            path: input.path.trim().to_string(),
        };
        input.validate()?;

        let category = self
            .repo
            .insert(NewCategory {
                text: input.text,
                path: input.path,
            })
            .await?;
        info!(category_id = %category.id, path = %category.path, "Created category");
        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let input = UpdateCategoryInput {
            text: input.text.map(|t| t.trim().to_string()),
            path: input.path.map(|p| p.trim().to_string()),
            is_active: input.is_active,
        };
        input.validate()?;

        let changes = CategoryChanges {
            text: input.text,
            path: input.path,
            is_active: input.is_active,
        };
        let category = self
            .repo
            .update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category"))?;
        info!(category_id = %id, "Updated category");
        Ok(category)
    }

    /// Soft delete.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let changes = CategoryChanges {
            is_active: Some(false),
            ..Default::default()
        };
        self.repo
            .update(id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category"))?;
        info!(category_id = %id, "Deactivated category");
        Ok(())
    }
}
