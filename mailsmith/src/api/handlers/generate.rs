use crate::{
    AppState,
    api::models::generate::{GenerateEmailRequest, GenerateEmailResponse},
    auth::current_user::bearer_token,
    errors::{ErrorBody, Result},
};
use axum::{extract::State, http::HeaderMap, response::Json};
use tracing::debug;

/// Generate an email from a prompt
///
/// Signed-in callers pay one credit per email and get it saved to their history. Callers without
/// a valid session still receive the generated email, but nothing is charged or saved.
#[utoipa::path(
    post,
    path = "/api/generate-email",
    request_body = GenerateEmailRequest,
    tag = "generation",
    responses(
        (status = 200, description = "Generated email", body = GenerateEmailResponse),
        (status = 400, description = "Missing prompt", body = ErrorBody),
        (status = 401, description = "The generation backend rejected the configured key", body = ErrorBody),
        (status = 403, description = "No remaining credits", body = ErrorBody),
        (status = 500, description = "Backend not configured or failed", body = ErrorBody),
    ),
    security((), ("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn generate_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateEmailRequest>,
) -> Result<Json<GenerateEmailResponse>> {
    let body_token = request.auth_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
    // An unreadable Authorization header is treated like a missing one
    let token = body_token.or_else(|| bearer_token(&headers).and_then(|t| t.ok()).filter(|t| !t.is_empty()));
    debug!(has_token = token.is_some(), "Generating email");

    let result = state.workflow.generate(&request.prompt, token).await?;
    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use crate::generation::{BackendError, GenerationBackend};
    use crate::test_utils::{
        StubBackend, create_test_backend, create_test_server, create_test_state, create_user_with_credits, mock_chat_completion_body,
    };

    #[test_log::test(tokio::test)]
    async fn test_signed_in_generation_is_charged_and_saved() {
        let backend = Arc::new(StubBackend::ok("Dear team, ..."));
        let state = create_test_state(Some(backend.clone()));
        let (user, token) = create_user_with_credits(&state, "writer@gmail.com", 3).await;
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/generate-email")
            .json(&json!({ "prompt": "Thank the team for the launch", "authToken": token }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "Dear team, ...");
        assert_eq!(body["saved"], true);
        assert_eq!(body["credits_remaining"], 2);
        assert!(body.get("message").is_none());

        let history = state.stores.history.list(user.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].prompt, "Thank the team for the launch");
        assert_eq!(state.stores.credits.balance(user.id).await.unwrap(), Some(2));
    }

    #[test_log::test(tokio::test)]
    async fn test_bearer_header_is_accepted() {
        let state = create_test_state(Some(Arc::new(StubBackend::ok("Hello"))));
        let (user, token) = create_user_with_credits(&state, "header@gmail.com", 1).await;
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/generate-email")
            .authorization_bearer(token)
            .json(&json!({ "prompt": "Say hello" }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["saved"], true);
        assert_eq!(body["credits_remaining"], 0);
        assert_eq!(state.stores.credits.balance(user.id).await.unwrap(), Some(0));
    }

    #[test_log::test(tokio::test)]
    async fn test_no_credits_returns_403_and_saves_nothing() {
        let backend = Arc::new(StubBackend::ok("unused"));
        let state = create_test_state(Some(backend.clone()));
        let (user, token) = create_user_with_credits(&state, "broke@gmail.com", 0).await;
        let server = create_test_server(state.clone());

        let response = server
            .post("/api/generate-email")
            .json(&json!({ "prompt": "Ask for a refund", "authToken": token }))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "No remaining credits");
        assert!(state.stores.history.list(user.id).await.unwrap().is_empty());
        assert_eq!(state.stores.credits.balance(user.id).await.unwrap(), Some(0));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_prompt_returns_400_without_calling_backend() {
        let backend = Arc::new(StubBackend::ok("unused"));
        let server = create_test_server(create_test_state(Some(backend.clone())));

        let response = server.post("/api/generate-email").json(&json!({ "prompt": "" })).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "A prompt is required" }));
        assert_eq!(backend.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_anonymous_generation_is_returned_unsaved() {
        let server = create_test_server(create_test_state(Some(Arc::new(StubBackend::ok("Hi there")))));

        let response = server.post("/api/generate-email").json(&json!({ "prompt": "Greet a friend" })).await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "Hi there");
        assert_eq!(body["saved"], false);
        assert_eq!(body["message"], "User not authenticated");
        assert!(body.get("credits_remaining").is_none());
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_token_is_treated_as_anonymous() {
        let server = create_test_server(create_test_state(Some(Arc::new(StubBackend::ok("Hi there")))));

        let response = server
            .post("/api/generate-email")
            .json(&json!({ "prompt": "Greet a friend", "authToken": "not-a-token" }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["saved"], false);
        assert_eq!(body["message"], "User not authenticated");
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_backend_key_returns_500() {
        let server = create_test_server(create_test_state(None));

        let response = server.post("/api/generate-email").json(&json!({ "prompt": "Anything" })).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&json!({ "error": "OpenAI API key is not configured" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_upstream_key_rejection_returns_401() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided: sk-test.",
                    "type": "invalid_request_error",
                    "code": "invalid_api_key"
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let backend: Arc<dyn GenerationBackend> = Arc::new(create_test_backend(&mock_server.uri()));
        let server = create_test_server(create_test_state(Some(backend)));

        let response = server.post("/api/generate-email").json(&json!({ "prompt": "Anything" })).await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Invalid or expired OpenAI API key");
        assert_eq!(body["details"], "Incorrect API key provided: sk-test.");
    }

    #[test_log::test(tokio::test)]
    async fn test_generation_through_http_backend() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_completion_body("Dear Sam,\n\nThanks!")))
            .mount(&mock_server)
            .await;

        let backend: Arc<dyn GenerationBackend> = Arc::new(create_test_backend(&mock_server.uri()));
        let state = create_test_state(Some(backend));
        let (_, token) = create_user_with_credits(&state, "http@gmail.com", 3).await;
        let server = create_test_server(state);

        let response = server
            .post("/api/generate-email")
            .json(&json!({ "prompt": "Thank Sam", "authToken": token }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["email"], "Dear Sam,\n\nThanks!");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["usage"], json!({ "promptTokens": 10, "completionTokens": 20, "totalTokens": 30 }));
        assert_eq!(body["credits_remaining"], 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_upstream_status_is_passed_through() {
        let backend = Arc::new(StubBackend::failing(|| BackendError::Api {
            status: 429,
            code: Some("rate_limit_exceeded".to_string()),
            kind: Some("requests".to_string()),
            message: "Rate limit reached".to_string(),
        }));
        let server = create_test_server(create_test_state(Some(backend)));

        let response = server.post("/api/generate-email").json(&json!({ "prompt": "Anything" })).await;

        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Rate limit reached");
        assert_eq!(body["code"], "rate_limit_exceeded");
    }
}
