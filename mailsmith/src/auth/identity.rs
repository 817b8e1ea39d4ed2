//! Identity resolution for bearer tokens.

use async_trait::async_trait;

use crate::{api::models::users::CurrentUser, auth::session, config::Config, errors::Result};

/// Verifies a bearer token and returns who it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<CurrentUser>;
}

/// Resolves the HS256 session tokens issued by the login endpoint.
pub struct SessionIdentityProvider {
    config: Config,
}

impl SessionIdentityProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<CurrentUser> {
        session::verify_session_token(token, &self.config)
    }
}
