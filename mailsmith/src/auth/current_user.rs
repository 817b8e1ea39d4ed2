use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::identity::IdentityProvider,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Read the token from an `Authorization: Bearer <token>` header.
///
/// Returns:
/// - None: No Authorization header, or not a Bearer token
/// - Some(Ok(token)): A bearer token is present
/// - Some(Err(error)): The header is not valid UTF-8
pub fn bearer_token(headers: &HeaderMap) -> Option<Result<&str>> {
    let auth_header = headers.get(header::AUTHORIZATION)?;

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    auth_str.strip_prefix("Bearer ").map(|token| Ok(token.trim()))
}

/// Extract user from a bearer session token if present and valid
/// Returns:
/// - None: No bearer token present
/// - Some(Ok(user)): Valid token found and verified
/// - Some(Err(error)): Token present but invalid, expired or malformed
#[instrument(skip_all)]
async fn try_bearer_auth(parts: &Parts, identity: &dyn IdentityProvider) -> Option<Result<CurrentUser>> {
    let token = match bearer_token(&parts.headers)? {
        Ok(token) => token,
        Err(e) => return Some(Err(e)),
    };

    Some(identity.resolve(token).await)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_bearer_auth(parts, state.identity.as_ref()).await {
            Some(Ok(user)) => {
                debug!("Found session authenticated user: {}", user.id);
                Ok(user)
            }
            Some(Err(e)) => {
                trace!("Session authentication failed: {:?}", e);
                Err(Error::Unauthenticated { message: None })
            }
            None => {
                trace!("No authentication credentials found in request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
