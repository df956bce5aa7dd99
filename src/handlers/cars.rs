use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;

use crate::auth::SellerRouterExt;
use crate::entities::car;
use crate::handlers::common::{created_response, parse_id, success_response, ApiJson, ApiResult};
use crate::services::cars::{CreateCarInput, UpdateCarInput};
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
struct CarPayload {
    car: car::Model,
}

#[derive(Debug, Serialize)]
struct CarsPayload {
    cars: Vec<car::Model>,
}

/// Creates the router for car endpoints
pub fn car_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/", post(create_car))
        .route("/:id", put(update_car).delete(delete_car))
        .with_seller_auth();

    Router::new()
        .route("/", get(list_cars))
        .route("/:id", get(get_car))
        .merge(protected)
}

async fn list_cars(State(state): State<AppState>) -> ApiResult {
    let cars = state.services.cars.list().await?;
    Ok(success_response(ApiResponse::success(CarsPayload { cars })))
}

async fn get_car(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let car = state.services.cars.get(parse_id(&id, "car")?).await?;
    Ok(success_response(ApiResponse::success(CarPayload { car })))
}

async fn create_car(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateCarInput>,
) -> ApiResult {
    let car = state.services.cars.create(input).await?;
    Ok(created_response(ApiResponse::success(CarPayload { car })))
}

async fn update_car(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateCarInput>,
) -> ApiResult {
    let car = state
        .services
        .cars
        .update(parse_id(&id, "car")?, input)
        .await?;
    Ok(success_response(ApiResponse::success(CarPayload { car })))
}

async fn delete_car(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.services.cars.delete(parse_id(&id, "car")?).await?;
    Ok(success_response(ApiResponse::message(
        "Car deleted successfully",
    )))
}
