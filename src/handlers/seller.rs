use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{cookie_header, SellerRouterExt};
use crate::errors::ServiceError;
use crate::handlers::common::{success_response, ApiJson, ApiResult};
use crate::{ApiResponse, AppState, NoPayload};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct LoginPayload {
    token: String,
}

/// Creates the router for the seller session endpoints
pub fn seller_routes() -> Router<AppState> {
    let protected = Router::new()
        .route("/is-auth", get(is_auth))
        .with_seller_auth();

    Router::new()
        .route("/login", post(login))
        .route("/logout", get(logout))
        .merge(protected)
}

async fn login(State(state): State<AppState>, ApiJson(body): ApiJson<LoginRequest>) -> ApiResult {
    if !state
        .seller_auth
        .verify_credentials(&body.email, &body.password)
    {
        warn!("seller login rejected");
        return Err(ServiceError::Unauthorized(
            "Invalid Credentials".to_string(),
        ));
    }

    let token = state.seller_auth.issue_token()?;
    let cookie = cookie_header(&state.seller_auth.session_cookie(&token))?;
    info!("seller logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        success_response(ApiResponse::with_message(
            "Logged In",
            LoginPayload { token },
        )),
    )
        .into_response())
}

async fn is_auth() -> ApiResult {
    Ok(success_response(ApiResponse::success(NoPayload {})))
}

async fn logout(State(state): State<AppState>) -> ApiResult {
    let cookie = cookie_header(&state.seller_auth.cleared_cookie())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        success_response(ApiResponse::message("Logged Out")),
    )
        .into_response())
}
