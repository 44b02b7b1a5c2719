pub mod jwt;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::typed_header::TypedHeaderRejectionReason;
use axum_extra::TypedHeader;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AppError, state::AppState};

/// The caller identity vouched for by the external identity provider.
///
/// Every workspace operation is scoped to `owner_id`; nothing else about the
/// caller is known to this service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub owner_id: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = match TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
        {
            Ok(TypedHeader(Authorization(bearer))) => bearer,
            Err(rejection) if matches!(rejection.reason(), TypedHeaderRejectionReason::Missing) => {
                return Err(AppError::unauthorized("missing bearer token"));
            }
            Err(rejection) => {
                debug!(error = %rejection, "malformed authorization header");
                return Err(AppError::unauthorized(
                    "authorization header must use the Bearer scheme",
                ));
            }
        };

        let claims = state.jwt.verify_token(bearer.token()).map_err(|err| {
            debug!(error = %err, "rejected identity token");
            rejection_for(&err)
        })?;

        Ok(AuthenticatedUser {
            owner_id: claims.sub,
        })
    }
}

fn rejection_for(err: &anyhow::Error) -> AppError {
    match err.downcast_ref::<JwtError>().map(JwtError::kind) {
        Some(JwtErrorKind::ExpiredSignature) => AppError::unauthorized("token has expired"),
        _ => AppError::unauthorized("invalid token"),
    }
}
