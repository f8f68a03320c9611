use std::sync::Arc;

use axum::{extract::FromRequestParts, http::{header::AUTHORIZATION, request::Parts}};
use rideshare_lib::user::User;

use crate::{error::AppError, server_state::ServerState};

/// The acting user, resolved from an `Authorization: Bearer <api token>` header.
/// Handlers that take this reject anonymous requests with 401.
pub struct CurrentUser(pub User);

impl FromRequestParts<Arc<ServerState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ServerState>) -> Result<Self, Self::Rejection> {
        let token = parts.headers.get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized)?;

        match state.data_manager.authenticate(token).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!("Rejected request with unknown api token");
                Err(AppError::Unauthorized)
            }
        }
    }
}
