use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::images::{
    ensure_retained_subset, images_to_delete, purge_images, upload_in_order, CleanupReport,
    FailedUpload,
};
use crate::entities::{car, product};
use crate::errors::ServiceError;
use crate::repositories::{CarRepository, NewProduct, ProductChanges, ProductRepository};
use crate::storage::{ImageStore, ImageUpload};

/// Description as sent by the seller panel: either a list of lines or one
/// newline separated block.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DescriptionInput {
    Lines(Vec<String>),
    Text(String),
}

impl Default for DescriptionInput {
    fn default() -> Self {
        DescriptionInput::Lines(Vec::new())
    }
}

impl DescriptionInput {
    /// Trimmed, non-empty lines.
    pub fn into_lines(self) -> Vec<String> {
        let lines: Vec<String> = match self {
            DescriptionInput::Lines(lines) => lines,
            DescriptionInput::Text(text) => text.lines().map(str::to_string).collect(),
        };
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Present-but-empty (`null` or `""`) clears the car; a value sets it.
fn car_reference<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Some(None)),
        Some(id) => Uuid::parse_str(id)
            .map(|id| Some(Some(id)))
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    pub name: String,
    #[serde(default)]
    pub description: DescriptionInput,
    pub category: String,
    pub price: Decimal,
    pub offer_price: Decimal,
    #[serde(default, deserialize_with = "car_reference")]
    pub car: Option<Option<Uuid>>,
    #[serde(default)]
    pub in_stock: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<DescriptionInput>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    #[serde(default, deserialize_with = "car_reference")]
    pub car: Option<Option<Uuid>>,
    pub in_stock: Option<bool>,
}

/// Catalog query. All filters are optional and combined with AND.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

/// Product with its compatible car populated.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: Vec<String>,
    pub category: String,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub price: Decimal,
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub offer_price: Decimal,
    pub image: Vec<String>,
    pub in_stock: bool,
    pub car: Option<car::Model>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    fn new(model: product::Model, car: Option<car::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description.0,
            category: model.category,
            price: model.price,
            offer_price: model.offer_price,
            image: model.image.0,
            in_stock: model.in_stock,
            car,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Options for the storefront's brand/model/year pickers.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CarFacets {
    pub brands: Vec<String>,
    pub models: Vec<String>,
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub products: Vec<ProductView>,
    pub car_filters: CarFacets,
}

fn required_text(value: String, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("Product {field} is required")));
    }
    Ok(trimmed.to_string())
}

fn non_negative(value: Decimal, field: &str) -> Result<Decimal, ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::validation(format!(
            "Product {field} cannot be negative"
        )));
    }
    Ok(value)
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Product catalog and image lifecycle.
#[derive(Clone)]
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    cars: Arc<dyn CarRepository>,
    images: Arc<dyn ImageStore>,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        cars: Arc<dyn CarRepository>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            products,
            cars,
            images,
        }
    }

    async fn ensure_car_exists(&self, car_id: Option<Uuid>) -> Result<Option<car::Model>, ServiceError> {
        let Some(id) = car_id else {
            return Ok(None);
        };
        match self.cars.find_by_id(id).await? {
            Some(car) => Ok(Some(car)),
            None => Err(ServiceError::validation("Car not found")),
        }
    }

    async fn populate(&self, model: product::Model) -> Result<ProductView, ServiceError> {
        let car = match model.car_id {
            Some(id) => self.cars.find_by_id(id).await?,
            None => None,
        };
        Ok(ProductView::new(model, car))
    }

    async fn populate_all(
        &self,
        models: Vec<product::Model>,
    ) -> Result<Vec<ProductView>, ServiceError> {
        let ids: Vec<Uuid> = models
            .iter()
            .filter_map(|p| p.car_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let cars: HashMap<Uuid, car::Model> = self
            .cars
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|car| (car.id, car))
            .collect();

        Ok(models
            .into_iter()
            .map(|model| {
                let car = model.car_id.and_then(|id| cars.get(&id).cloned());
                ProductView::new(model, car)
            })
            .collect())
    }

    /// Creates a product from its fields and uploaded images. Either every
    /// image is stored and the product persisted, or the request fails and
    /// the images that did upload are removed again.
    #[instrument(skip(self, input, files), fields(files = files.len()))]
    pub async fn create(
        &self,
        input: CreateProductInput,
        files: Vec<ImageUpload>,
    ) -> Result<ProductView, ServiceError> {
        let name = required_text(input.name, "name")?;
        let category = required_text(input.category, "category")?;
        let price = non_negative(input.price, "price")?;
        let offer_price = non_negative(input.offer_price, "offer price")?;
        let car_id = input.car.flatten();
        let car = self.ensure_car_exists(car_id).await?;

        let mut urls = Vec::with_capacity(files.len());
        let mut first_error = None;
        for (file_name, result) in upload_in_order(self.images.as_ref(), files).await {
            match result {
                Ok(url) => urls.push(url),
                Err(err) => {
                    warn!(file = %file_name, error = %err, "image upload failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            let report = purge_images(self.images.as_ref(), &urls).await;
            if !report.is_clean() {
                warn!(failed = report.failed(), "orphaned uploads could not be removed");
            }
            return Err(err.into());
        }

        let new = NewProduct {
            name,
            description: input.description.into_lines(),
            category,
            price,
            offer_price,
            image: urls.clone(),
            in_stock: input.in_stock.unwrap_or(true),
            car_id,
        };
        let model = match self.products.insert(new).await {
            Ok(model) => model,
            Err(err) => {
                purge_images(self.images.as_ref(), &urls).await;
                return Err(err);
            }
        };

        info!(product_id = %model.id, images = model.image.0.len(), "Created product");
        Ok(ProductView::new(model, car))
    }

    /// Updates fields and reconciles the image list: `retained` (client
    /// order) followed by the newly uploaded files. Remote cleanup and
    /// upload failures are reported, not raised.
    #[instrument(skip(self, input, retained, files), fields(files = files.len()))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProductInput,
        retained: Vec<String>,
        files: Vec<ImageUpload>,
    ) -> Result<(ProductView, CleanupReport), ServiceError> {
        let current = self
            .products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        ensure_retained_subset(&current.image.0, &retained)?;

        let mut changes = ProductChanges {
            name: input.name.map(|n| required_text(n, "name")).transpose()?,
            description: input.description.map(DescriptionInput::into_lines),
            category: input
                .category
                .map(|c| required_text(c, "category"))
                .transpose()?,
            price: input.price.map(|p| non_negative(p, "price")).transpose()?,
            offer_price: input
                .offer_price
                .map(|p| non_negative(p, "offer price"))
                .transpose()?,
            image: None,
            in_stock: input.in_stock,
            car_id: input.car,
        };
        if let Some(car_id) = changes.car_id {
            self.ensure_car_exists(car_id).await?;
        }

        let keep: HashSet<String> = retained.iter().cloned().collect();
        let to_delete = images_to_delete(&current.image.0, &keep);

        let mut failed_uploads = Vec::new();
        let mut uploaded = Vec::new();
        for (file_name, result) in upload_in_order(self.images.as_ref(), files).await {
            match result {
                Ok(url) => uploaded.push(url),
                Err(err) => {
                    warn!(product_id = %id, file = %file_name, error = %err, "image upload failed");
                    failed_uploads.push(FailedUpload {
                        file_name,
                        error: err.to_string(),
                    });
                }
            }
        }

        let mut image = retained;
        image.extend(uploaded.iter().cloned());
        changes.image = Some(image);

        // Persist before touching the dropped images so a failed write
        // leaves the stored record pointing at live objects.
        let saved = match self.products.update(id, changes).await {
            Ok(Some(model)) => model,
            Ok(None) => {
                purge_images(self.images.as_ref(), &uploaded).await;
                return Err(ServiceError::not_found("Product"));
            }
            Err(err) => {
                purge_images(self.images.as_ref(), &uploaded).await;
                return Err(err);
            }
        };

        let mut report = purge_images(self.images.as_ref(), &to_delete).await;
        report.failed_uploads = failed_uploads;

        info!(
            product_id = %id,
            removed = report.attempted(),
            cleanup_failures = report.failed(),
            images = saved.image.0.len(),
            "Updated product"
        );
        Ok((self.populate(saved).await?, report))
    }

    pub async fn set_stock(&self, id: Uuid, in_stock: bool) -> Result<ProductView, ServiceError> {
        let model = self
            .products
            .update(id, ProductChanges::in_stock(in_stock))
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;
        info!(product_id = %id, in_stock, "Updated stock");
        self.populate(model).await
    }

    /// Removes the product, then its stored images on a best-effort basis.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<CleanupReport, ServiceError> {
        let current = self
            .products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;

        if !self.products.delete(id).await? {
            return Err(ServiceError::not_found("Product"));
        }

        let report = purge_images(self.images.as_ref(), &current.image.0).await;
        info!(
            product_id = %id,
            removed = report.attempted(),
            cleanup_failures = report.failed(),
            "Deleted product"
        );
        Ok(report)
    }

    pub async fn get(&self, id: Uuid) -> Result<ProductView, ServiceError> {
        let model = self
            .products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product"))?;
        self.populate(model).await
    }

    /// Newest first. Facets are computed over the products matching the
    /// text and category filters, before the car filters narrow them down.
    pub async fn list(&self, filter: ProductFilter) -> Result<ProductListing, ServiceError> {
        let year = match blank_to_none(&filter.year) {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                ServiceError::validation(format!("Invalid year filter: {raw}"))
            })?),
            None => None,
        };
        let search = blank_to_none(&filter.search).map(str::to_lowercase);
        let category = blank_to_none(&filter.category);
        let brand = blank_to_none(&filter.brand);
        let model = blank_to_none(&filter.model);

        let views = self.populate_all(self.products.list().await?).await?;
        let base: Vec<ProductView> = views
            .into_iter()
            .filter(|p| {
                search
                    .as_deref()
                    .map_or(true, |s| p.name.to_lowercase().contains(s))
            })
            .filter(|p| category.map_or(true, |c| p.category == c))
            .collect();

        let car_filters = facets(&base, brand, model);

        let products = base
            .into_iter()
            .filter(|p| {
                if brand.is_none() && model.is_none() && year.is_none() {
                    return true;
                }
                let Some(car) = &p.car else {
                    return false;
                };
                brand.map_or(true, |b| eq_ignore_case(&car.brand, b))
                    && model.map_or(true, |m| eq_ignore_case(&car.model, m))
                    && year.map_or(true, |y| car.production_years.contains(y))
            })
            .collect();

        Ok(ProductListing {
            products,
            car_filters,
        })
    }
}

fn facets(products: &[ProductView], brand: Option<&str>, model: Option<&str>) -> CarFacets {
    let cars: Vec<&car::Model> = products.iter().filter_map(|p| p.car.as_ref()).collect();

    let brands: BTreeSet<String> = cars.iter().map(|c| c.brand.clone()).collect();

    let Some(brand) = brand else {
        return CarFacets {
            brands: brands.into_iter().collect(),
            ..Default::default()
        };
    };
    let of_brand: Vec<&&car::Model> = cars
        .iter()
        .filter(|c| eq_ignore_case(&c.brand, brand))
        .collect();
    let models: BTreeSet<String> = of_brand.iter().map(|c| c.model.clone()).collect();

    let years: BTreeSet<i32> = match model {
        Some(model) => of_brand
            .iter()
            .filter(|c| eq_ignore_case(&c.model, model))
            .flat_map(|c| c.production_years.0.iter().copied())
            .collect(),
        None => BTreeSet::new(),
    };

    CarFacets {
        brands: brands.into_iter().collect(),
        models: models.into_iter().collect(),
        years: years.into_iter().collect(),
    }
}
