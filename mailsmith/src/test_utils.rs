//! Test utilities shared by the unit and handler tests.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::{identity::IdentityProvider, session},
    config::{Config, DatabaseConfig, GenerationConfig},
    create_app_state,
    db::models::users::{UserCreateDBRequest, UserDBResponse},
    errors::{Error, Result},
    generation::{BackendError, Completion, GenerationBackend, OpenAiBackend, Usage},
    store::Stores,
};

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.auth.jwt_expiry = Duration::from_secs(3600);
    config
}

/// An HTTP backend pointed at `base_url`, usually a wiremock server.
pub fn create_test_backend(base_url: &str) -> OpenAiBackend {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = GenerationConfig {
        api_key: Some("sk-test".to_string()),
        base_url: base_url.parse().expect("valid test base URL"),
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    OpenAiBackend::from_config(&config)
        .expect("Failed to build test backend")
        .expect("test backend has an API key")
}

/// A successful chat completion response body containing `content`.
pub fn mock_chat_completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-3.5-turbo",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
    })
}

type ErrorFactory = Box<dyn Fn() -> BackendError + Send + Sync>;

/// In-process backend returning a canned completion or error.
pub struct StubBackend {
    outcome: std::result::Result<Completion, ErrorFactory>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn ok(text: &str) -> Self {
        Self::with_completion(Completion {
            text: text.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            usage: Usage {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            },
        })
    }

    pub fn with_completion(completion: Completion) -> Self {
        Self {
            outcome: Ok(completion),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: impl Fn() -> BackendError + Send + Sync + 'static) -> Self {
        Self {
            outcome: Err(Box::new(error)),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn complete(&self, prompt: &str) -> std::result::Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.outcome {
            Ok(completion) => Ok(completion.clone()),
            Err(make_error) => Err(make_error()),
        }
    }
}

/// Identity provider that recognizes exactly one token.
pub struct StaticIdentityProvider {
    token: String,
    user: CurrentUser,
}

impl StaticIdentityProvider {
    pub fn new(token: &str, user: CurrentUser) -> Self {
        Self {
            token: token.to_string(),
            user,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<CurrentUser> {
        if token == self.token {
            Ok(self.user.clone())
        } else {
            Err(Error::Unauthenticated { message: None })
        }
    }
}

/// App state over a fresh in-memory store.
pub fn create_test_state(backend: Option<Arc<dyn GenerationBackend>>) -> AppState {
    create_app_state(create_test_config(), Stores::memory(), backend)
}

pub fn create_test_server(state: AppState) -> TestServer {
    let router = crate::build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Create an account with `credits` and return it with a session token.
///
/// Skips password hashing; the stored hash is not a valid Argon2 hash.
pub async fn create_user_with_credits(state: &AppState, email: &str, credits: i64) -> (UserDBResponse, String) {
    let user = state
        .stores
        .accounts
        .create_user(&UserCreateDBRequest {
            email: email.to_string(),
            password_hash: "unused".to_string(),
        })
        .await
        .expect("Failed to create test user");
    state
        .stores
        .credits
        .provision(user.id, credits)
        .await
        .expect("Failed to provision test credits");

    let token = session::create_session_token(&CurrentUser::from(&user), &state.config).expect("Failed to create session token");
    (user, token)
}
