use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;

use crate::auth::SellerRouterExt;
use crate::entities::category;
use crate::handlers::common::{created_response, parse_id, success_response, ApiJson, ApiResult};
use crate::services::categories::{CreateCategoryInput, UpdateCategoryInput};
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
struct CategoryPayload {
    category: category::Model,
}

#[derive(Debug, Serialize)]
struct CategoriesPayload {
    categories: Vec<category::Model>,
}

/// Creates the router for category endpoints. Reads address categories by
/// path, writes by id, so both share one segment.
pub fn category_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(create_category))
        .route("/:key", put(update_category).delete(delete_category))
        .with_seller_auth();

    Router::new()
        .route("/", get(list_categories))
        .route("/:key", get(get_category))
        .merge(protected)
}

async fn list_categories(State(state): State<AppState>) -> ApiResult {
    let categories = state.services.categories.list().await?;
    Ok(success_response(ApiResponse::success(CategoriesPayload {
        categories,
    })))
}

async fn get_category(State(state): State<AppState>, Path(path): Path<String>) -> ApiResult {
    let category = state.services.categories.get_by_path(&path).await?;
    Ok(success_response(ApiResponse::success(CategoryPayload {
        category,
    })))
}

async fn create_category(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateCategoryInput>,
) -> ApiResult {
    let category = state.services.categories.create(input).await?;
    Ok(created_response(ApiResponse::success(CategoryPayload {
        category,
    })))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateCategoryInput>,
) -> ApiResult {
    let id = parse_id(&id, "category")?;
    let category = state.services.categories.update(id, input).await?;
    Ok(success_response(ApiResponse::success(CategoryPayload {
        category,
    })))
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let id = parse_id(&id, "category")?;
    state.services.categories.delete(id).await?;
    Ok(success_response(ApiResponse::message(
        "Category deleted successfully",
    )))
}
