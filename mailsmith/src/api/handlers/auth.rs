use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, LoginResponse, SignupRequest, SignupResponse},
        users::{CurrentUser, UserResponse},
    },
    auth::{password, session},
    config::SignupConfig,
    db::{
        errors::DbError,
        models::{signup_logs::SignupLogCreateDBRequest, users::UserCreateDBRequest},
    },
    errors::{Error, ErrorBody, Result},
    types::{abbrev_uuid, mask_email},
};
use axum::{extract::State, http::HeaderMap, response::Json};
use tracing::{error, info, warn};

/// Address recorded when the configured header is absent.
const UNKNOWN_ADDRESS: &str = "unknown-ip";

/// Check the email against the allowed signup domains.
fn check_email_domain(email: &str, config: &SignupConfig) -> Result<()> {
    let email = email.to_ascii_lowercase();
    let allowed = config
        .allowed_email_domains
        .iter()
        .any(|domain| email.ends_with(&format!("@{}", domain.to_ascii_lowercase())));
    if allowed {
        return Ok(());
    }

    let message = match config.allowed_email_domains.as_slice() {
        [only] if only.eq_ignore_ascii_case("gmail.com") => "Only Gmail addresses are allowed".to_string(),
        domains => format!("Only addresses at {} are allowed", domains.join(", ")),
    };
    Err(Error::BadRequest { message })
}

/// First entry of the configured forwarding header, or [`UNKNOWN_ADDRESS`].
fn client_address(headers: &HeaderMap, config: &SignupConfig) -> String {
    headers
        .get(config.address_header.as_str())
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .unwrap_or(UNKNOWN_ADDRESS)
        .to_string()
}

/// Create an account
#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignupRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Account created", body = SignupResponse),
        (status = 400, description = "Email domain not allowed, weak password, or already registered", body = ErrorBody),
        (status = 500, description = "Account could not be created", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<SignupRequest>) -> Result<Json<SignupResponse>> {
    let signup_config = &state.config.auth.signup;
    let email = request.email.trim().to_string();

    check_email_domain(&email, signup_config)?;
    password::validate_password(&request.password, &state.config.auth.password)?;

    let address = client_address(&headers, signup_config);
    let accounts = &state.stores.accounts;

    if signup_config.one_per_address {
        let seen = accounts.signup_address_exists(&address).await.map_err(|e| {
            error!("Failed to look up signup address: {:#}", e);
            Error::ServerError {
                message: "Failed to verify IP address".to_string(),
            }
        })?;
        if seen {
            return Err(Error::BadRequest {
                message: "Signup from this IP is already registered".to_string(),
            });
        }
    }

    if accounts.get_user_by_email(&email).await?.is_some() {
        return Err(Error::BadRequest {
            message: "Email already registered".to_string(),
        });
    }

    // Hash password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let user = accounts
        .create_user(&UserCreateDBRequest {
            email: email.clone(),
            password_hash,
        })
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent signup for the same email
            DbError::UniqueViolation { .. } => Error::BadRequest {
                message: "Email already registered".to_string(),
            },
            other => {
                error!("Failed to create user: {:#}", other);
                Error::ServerError {
                    message: "Failed to create user".to_string(),
                }
            }
        })?;

    let initial_credits = state.config.credits.initial_credits;
    if let Err(e) = state.stores.credits.provision(user.id, initial_credits).await {
        warn!(user_id = %abbrev_uuid(&user.id), "Failed to provision initial credits: {:#}", e);
    }

    if let Err(e) = accounts
        .record_signup(&SignupLogCreateDBRequest {
            ip_address: address,
            email: email.clone(),
        })
        .await
    {
        warn!(email = %mask_email(&email), "Failed to record signup address: {:#}", e);
    }

    info!(user_id = %abbrev_uuid(&user.id), email = %mask_email(&email), "User registered");

    Ok(Json(SignupResponse {
        success: true,
        message: format!("User registered successfully with {initial_credits} credits"),
        user: UserResponse::from(user),
    }))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let invalid = || Error::Unauthenticated {
        message: Some("Invalid email or password".to_string()),
    };

    let user = state
        .stores
        .accounts
        .get_user_by_email(request.email.trim())
        .await?
        .ok_or_else(invalid)?;

    // Verify password on a blocking thread to avoid blocking async runtime
    let password = request.password;
    let hash = user.password_hash.clone();
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return Err(invalid());
    }

    let token = session::create_session_token(&CurrentUser::from(&user), &state.config)?;
    info!(user_id = %abbrev_uuid(&user.id), "User signed in");

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_server, create_test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    fn signup_body(email: &str) -> serde_json::Value {
        json!({ "email": email, "password": "correct-horse" })
    }

    #[test]
    fn test_email_domain_check() {
        let config = SignupConfig::default();
        assert!(check_email_domain("someone@gmail.com", &config).is_ok());
        assert!(check_email_domain("Someone@GMAIL.com", &config).is_ok());

        let err = check_email_domain("someone@example.com", &config).unwrap_err();
        assert_eq!(err.to_string(), "Only Gmail addresses are allowed");

        // Suffix must follow the '@'
        assert!(check_email_domain("someone@notgmail.com", &config).is_err());

        let config = SignupConfig {
            allowed_email_domains: vec!["gmail.com".to_string(), "example.org".to_string()],
            ..Default::default()
        };
        assert!(check_email_domain("a@example.org", &config).is_ok());
        let err = check_email_domain("a@example.com", &config).unwrap_err();
        assert_eq!(err.to_string(), "Only addresses at gmail.com, example.org are allowed");
    }

    #[test]
    fn test_client_address_uses_first_forwarded_entry() {
        let config = SignupConfig::default();
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers, &config), "unknown-ip");

        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_address(&headers, &config), "203.0.113.7");
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_success_provisions_credits() {
        let state = create_test_state(None);
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/signup")
            .add_header("x-forwarded-for", "203.0.113.7")
            .json(&signup_body("new@gmail.com"))
            .await;

        response.assert_status_ok();
        let body: SignupResponse = response.json();
        assert!(body.success);
        assert_eq!(body.message, "User registered successfully with 3 credits");
        assert_eq!(body.user.email, "new@gmail.com");

        assert_eq!(state.stores.credits.balance(body.user.id).await.unwrap(), Some(3));
        assert!(state.stores.accounts.signup_address_exists("203.0.113.7").await.unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_rejects_other_domains() {
        let server = create_test_server(create_test_state(None));

        let response = server.post("/api/signup").json(&signup_body("someone@example.com")).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Only Gmail addresses are allowed" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_rejects_short_password() {
        let server = create_test_server(create_test_state(None));

        let response = server
            .post("/api/signup")
            .json(&json!({ "email": "short@gmail.com", "password": "abc" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Password must be at least 6 characters long" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_once_per_address() {
        let server = create_test_server(create_test_state(None));

        server
            .post("/api/signup")
            .add_header("x-forwarded-for", "198.51.100.1")
            .json(&signup_body("first@gmail.com"))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/signup")
            .add_header("x-forwarded-for", "198.51.100.1")
            .json(&signup_body("second@gmail.com"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Signup from this IP is already registered" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_address_limit_can_be_disabled() {
        let mut state = create_test_state(None);
        state.config.auth.signup.one_per_address = false;
        let server = create_test_server(state);

        for email in ["one@gmail.com", "two@gmail.com"] {
            server
                .post("/api/signup")
                .add_header("x-forwarded-for", "198.51.100.2")
                .json(&signup_body(email))
                .await
                .assert_status_ok();
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_duplicate_email() {
        let server = create_test_server(create_test_state(None));

        server
            .post("/api/signup")
            .add_header("x-forwarded-for", "192.0.2.1")
            .json(&signup_body("dup@gmail.com"))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/signup")
            .add_header("x-forwarded-for", "192.0.2.2")
            .json(&signup_body("dup@gmail.com"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Email already registered" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_login_round_trip() {
        let state = create_test_state(None);
        let server = create_test_server(state.clone());

        server
            .post("/api/signup")
            .json(&signup_body("login@gmail.com"))
            .await
            .assert_status_ok();

        let response = server.post("/api/login").json(&signup_body("login@gmail.com")).await;
        response.assert_status_ok();
        let body: LoginResponse = response.json();
        assert_eq!(body.user.email, "login@gmail.com");

        let user = session::verify_session_token(&body.token, &state.config).unwrap();
        assert_eq!(user.id, body.user.id);

        // The issued token works against authenticated endpoints
        server
            .get("/api/credits")
            .authorization_bearer(body.token)
            .await
            .assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_login_rejects_bad_credentials() {
        let server = create_test_server(create_test_state(None));

        server
            .post("/api/signup")
            .json(&signup_body("guarded@gmail.com"))
            .await
            .assert_status_ok();

        let wrong_password = server
            .post("/api/login")
            .json(&json!({ "email": "guarded@gmail.com", "password": "not-the-password" }))
            .await;
        wrong_password.assert_status(StatusCode::UNAUTHORIZED);
        wrong_password.assert_json(&json!({ "error": "Invalid email or password" }));

        let unknown = server.post("/api/login").json(&signup_body("nobody@gmail.com")).await;
        unknown.assert_status(StatusCode::UNAUTHORIZED);
        unknown.assert_json(&json!({ "error": "Invalid email or password" }));
    }
}
