use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, HeaderName},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use rideshare_data_management::DataManagerError;
use rideshare_lib::{
    page::{Page, PageSelector},
    ride::{RideDetails, RideForm},
    rules::SignupDenial,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::{auth::CurrentUser, config::SignupDeniedPolicy, error::AppError, server_state::ServerState};

/// Where every successful mutation sends the client.
pub const HOME: &str = "/";

pub const FLASH_MESSAGE: HeaderName = HeaderName::from_static("x-flash-message");
pub const SIGNUP_FLASH: &str = "An email was just sent. Please check your inbox";

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(list_rides))
        .route("/rides", get(list_rides).post(create_ride))
        .route("/rides/{ride_id}", get(get_ride).put(update_ride).delete(delete_ride))
        .route("/rides/{ride_id}/signup", get(signup_form).post(sign_up))
        .route("/users/{username}/rides", get(list_user_rides))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The `{ride_id}` path segment. Anything that is not a valid id cannot name a ride, so it is a 404.
struct RideId(i64);

impl<S: Send + Sync> FromRequestParts<S> for RideId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state).await
            .map_err(|_| AppError::NotFound("ride".to_string()))?;

        raw.parse()
            .map(RideId)
            .map_err(|_| AppError::NotFound(format!("ride {raw:?}")))
    }
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn selector(&self) -> Result<PageSelector, AppError> {
        match self.page.as_deref() {
            Some(page) => Ok(page.parse()?),
            None => Ok(PageSelector::default()),
        }
    }
}

async fn list_rides(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<RideDetails>>, AppError> {
    let page = state.data_manager.list_rides(query.selector()?).await?;
    Ok(Json(page))
}

async fn list_user_rides(
    State(state): State<Arc<ServerState>>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<RideDetails>>, AppError> {
    let page = state.data_manager.list_driver_rides(&username, query.selector()?).await?;
    Ok(Json(page))
}

async fn get_ride(
    State(state): State<Arc<ServerState>>,
    RideId(ride_id): RideId,
) -> Result<Json<RideDetails>, AppError> {
    Ok(Json(state.data_manager.get_ride(ride_id).await?))
}

async fn create_ride(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    Json(form): Json<RideForm>,
) -> Result<Redirect, AppError> {
    state.data_manager.create_ride(&user, &form).await?;
    Ok(Redirect::to(HOME))
}

async fn update_ride(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    RideId(ride_id): RideId,
    Json(form): Json<RideForm>,
) -> Result<Redirect, AppError> {
    state.data_manager.update_ride(&user, ride_id, &form).await?;
    Ok(Redirect::to(HOME))
}

async fn delete_ride(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    RideId(ride_id): RideId,
) -> Result<Redirect, AppError> {
    state.data_manager.delete_ride(&user, ride_id).await?;
    Ok(Redirect::to(HOME))
}

/// The confirmation step before signing up, only shown to users who could actually sign up.
async fn signup_form(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    RideId(ride_id): RideId,
) -> Result<Response, AppError> {
    match state.data_manager.check_signup(&user, ride_id).await {
        Ok(details) => Ok(Json(details).into_response()),
        Err(DataManagerError::SignupDenied(denial)) => Ok(refuse_signup(&state, denial)),
        Err(err) => Err(err.into()),
    }
}

async fn sign_up(
    State(state): State<Arc<ServerState>>,
    CurrentUser(user): CurrentUser,
    RideId(ride_id): RideId,
) -> Result<Response, AppError> {
    match state.data_manager.sign_up(&user, ride_id).await {
        Ok(signup) => {
            state.notifier.notify_signup(&user, &signup);
            Ok(([(FLASH_MESSAGE, SIGNUP_FLASH)], Redirect::to(HOME)).into_response())
        }
        Err(DataManagerError::SignupDenied(denial)) => Ok(refuse_signup(&state, denial)),
        Err(err) => Err(err.into()),
    }
}

fn refuse_signup(state: &ServerState, denial: SignupDenial) -> Response {
    match state.config.signup_denied {
        SignupDeniedPolicy::Forbidden => AppError::SignupDenied(denial).into_response(),
        SignupDeniedPolicy::Redirect => Redirect::to(HOME).into_response(),
    }
}

async fn health(State(state): State<Arc<ServerState>>) -> Result<Json<Value>, AppError> {
    state.data_manager.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}
