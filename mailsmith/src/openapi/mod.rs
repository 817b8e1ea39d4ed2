//! OpenAPI documentation for the public API.
//!
//! [`ApiDoc`] is served as JSON at `/api-docs/openapi.json` and rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, errors};

/// Security scheme for session tokens.
struct SessionSecurityAddon;

impl Modify for SessionSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by `POST /api/login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SessionSecurityAddon),
    paths(
        api::handlers::generate::generate_email,
        api::handlers::auth::signup,
        api::handlers::auth::login,
        api::handlers::history::list_history,
        api::handlers::history::delete_history,
        api::handlers::credits::get_credits,
    ),
    components(
        schemas(
            api::models::generate::GenerateEmailRequest,
            api::models::generate::GenerateEmailResponse,
            api::models::generate::UsageResponse,
            api::models::auth::SignupRequest,
            api::models::auth::SignupResponse,
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::users::UserResponse,
            api::models::history::HistoryResponse,
            api::models::credits::CreditsResponse,
            errors::ErrorBody,
        )
    ),
    tags(
        (name = "generation", description = "Generate emails from a short prompt.

Signed-in callers spend one credit per email and the result is saved to their history. Anonymous callers still receive the email but nothing is charged or saved."),
        (name = "authentication", description = "Create an account and sign in to receive a session token."),
        (name = "history", description = "The signed-in user's saved emails."),
        (name = "credits", description = "The signed-in user's remaining credits."),
    ),
    info(
        title = "Mailsmith API",
        version = "1.0.0",
        description = "Credit-gated email generation with a personal email history.

## Errors

Errors are returned as JSON with an `error` field, plus optional `details` and `message`:

```json
{ \"error\": \"No remaining credits\", \"message\": \"You have used all your credits\" }
```",
    ),
)]
pub struct ApiDoc;
