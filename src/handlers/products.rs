use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{SellerIdentity, SellerRouterExt};
use crate::errors::ServiceError;
use crate::handlers::common::{parse_id, success_response, ApiJson, ApiResult};
use crate::services::images::CleanupReport;
use crate::services::products::{
    CreateProductInput, ProductFilter, ProductView, UpdateProductInput,
};
use crate::storage::ImageUpload;
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
struct ProductPayload {
    product: ProductView,
}

#[derive(Debug, Serialize)]
struct UpdatedProductPayload {
    product: ProductView,
    cleanup: CleanupReport,
}

#[derive(Debug, Serialize)]
struct DeletedProductPayload {
    cleanup: CleanupReport,
}

#[derive(Debug, Deserialize)]
pub struct ProductIdRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRequest {
    pub id: String,
    pub in_stock: bool,
}

/// Multipart submission of the seller product form.
#[derive(Debug, Default)]
pub struct ProductForm {
    pub id: Option<String>,
    pub product_data: Option<String>,
    pub existing_images: Option<String>,
    pub images: Vec<ImageUpload>,
}

impl ProductForm {
    pub async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ServiceError> {
        let mut multipart = multipart.map_err(|e| ServiceError::validation(e.body_text()))?;
        let mut form = ProductForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServiceError::validation(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "images" | "images[]" => {
                    let file_name = field.file_name().unwrap_or("image").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServiceError::validation(e.body_text()))?;
                    form.images
                        .push(ImageUpload::new(file_name, content_type, bytes));
                }
                "id" | "productData" | "existingImages" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ServiceError::validation(e.body_text()))?;
                    match name.as_str() {
                        "id" => form.id = Some(text),
                        "productData" => form.product_data = Some(text),
                        _ => form.existing_images = Some(text),
                    }
                }
                other => debug!(field = other, "ignoring unexpected form field"),
            }
        }

        Ok(form)
    }

    fn retained_images(&self) -> Result<Vec<String>, ServiceError> {
        match self.existing_images.as_deref().map(str::trim) {
            None | Some("") => Ok(Vec::new()),
            Some(raw) => Ok(serde_json::from_str(raw)?),
        }
    }
}

/// Creates the router for product endpoints
pub fn product_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/add", post(add_product))
        .route("/update", post(update_product))
        .route("/stock", post(change_stock))
        .route("/delete", post(delete_product))
        .with_seller_auth();

    Router::new()
        .route("/list", get(list_products))
        .route("/id", post(product_by_id))
        .route("/:id", get(get_product))
        .merge(protected)
}

async fn add_product(
    State(state): State<AppState>,
    Extension(seller): Extension<SellerIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let form = ProductForm::read(multipart).await?;
    let raw = form
        .product_data
        .as_deref()
        .ok_or_else(|| ServiceError::validation("productData is required"))?;
    let input: CreateProductInput = serde_json::from_str(raw)?;

    let product = state.services.products.create(input, form.images).await?;
    info!(seller = %seller.email, product_id = %product.id, "seller added product");
    Ok(success_response(ApiResponse::with_message(
        "Product Added",
        ProductPayload { product },
    )))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(seller): Extension<SellerIdentity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult {
    let mut form = ProductForm::read(multipart).await?;
    let id = form
        .id
        .as_deref()
        .ok_or_else(|| ServiceError::validation("Product id is required"))?;
    let id = parse_id(id, "product")?;

    let input: UpdateProductInput = match form.product_data.as_deref().map(str::trim) {
        None | Some("") => UpdateProductInput::default(),
        Some(raw) => serde_json::from_str(raw)?,
    };
    let retained = form.retained_images()?;
    let files = std::mem::take(&mut form.images);

    let (product, cleanup) = state
        .services
        .products
        .update(id, input, retained, files)
        .await?;
    info!(seller = %seller.email, product_id = %id, "seller updated product");
    Ok(success_response(ApiResponse::with_message(
        "Product Updated",
        UpdatedProductPayload { product, cleanup },
    )))
}

async fn change_stock(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<StockRequest>,
) -> ApiResult {
    let id = parse_id(&body.id, "product")?;
    let product = state.services.products.set_stock(id, body.in_stock).await?;
    Ok(success_response(ApiResponse::with_message(
        "Stock Updated",
        ProductPayload { product },
    )))
}

async fn delete_product(
    State(state): State<AppState>,
    Extension(seller): Extension<SellerIdentity>,
    ApiJson(body): ApiJson<ProductIdRequest>,
) -> ApiResult {
    let id = parse_id(&body.id, "product")?;
    let cleanup = state.services.products.delete(id).await?;
    info!(seller = %seller.email, product_id = %id, "seller deleted product");
    Ok(success_response(ApiResponse::with_message(
        "Product Deleted",
        DeletedProductPayload { cleanup },
    )))
}

async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult {
    let listing = state.services.products.list(filter).await?;
    Ok(success_response(ApiResponse::success(listing)))
}

async fn product_by_id(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ProductIdRequest>,
) -> ApiResult {
    let product = state
        .services
        .products
        .get(parse_id(&body.id, "product")?)
        .await?;
    Ok(success_response(ApiResponse::success(ProductPayload {
        product,
    })))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let product = state
        .services
        .products
        .get(parse_id(&id, "product")?)
        .await?;
    Ok(success_response(ApiResponse::success(ProductPayload {
        product,
    })))
}
