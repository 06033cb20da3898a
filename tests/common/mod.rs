use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use reviews_rs::{
    auth::{CodeDelivery, TokenIssuer},
    create_app,
    repositories::InMemoryStore,
    services::UserServiceSettings,
    AppState, Metrics, Repositories,
};

/// Captures confirmation codes instead of sending them
#[derive(Default)]
pub struct CapturedCodes {
    codes: std::sync::Mutex<Vec<(String, String)>>,
}

impl CapturedCodes {
    pub fn latest_for(&self, user_id: &str) -> Option<String> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(user, _)| user == user_id)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait::async_trait]
impl CodeDelivery for CapturedCodes {
    async fn deliver(&self, user_id: &str, code: &str) -> anyhow::Result<()> {
        self.codes
            .lock()
            .unwrap()
            .push((user_id.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct TestEnvironment {
    pub client: Client,
    pub base_url: String,
    pub codes: Arc<CapturedCodes>,
}

impl TestEnvironment {
    /// The real router over an in-memory store, on a random local port
    pub async fn new() -> Self {
        let codes = Arc::new(CapturedCodes::default());
        let state = AppState::new(
            Repositories::in_memory(Arc::new(InMemoryStore::new())),
            Arc::new(TokenIssuer::new(
                b"integration-secret-integration-secret",
                Duration::from_secs(600),
            )),
            codes.clone(),
            UserServiceSettings {
                password_hash_cost: 4,
                require_confirmation: true,
            },
            Arc::new(Metrics::new().expect("Failed to create metrics")),
        );
        let app = create_app(state, Duration::from_secs(10), 1024 * 1024);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to get local address");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Failed to serve app");
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            client: Client::new(),
            base_url,
            codes,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to send request")
    }

    /// Register, confirm and log in; returns the bearer token
    pub async fn signed_in_user(&self, user_id: &str) -> String {
        let credentials = json!({"UserId": user_id, "Password": "long enough password"});

        let response = self.post("/users/register", None, credentials.clone()).await;
        assert_eq!(response.status().as_u16(), 201);

        let code = self
            .codes
            .latest_for(user_id)
            .expect("No confirmation code captured");
        let response = self
            .post(
                "/users/registerconfirm",
                None,
                json!({"UserId": user_id, "code": code}),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200);

        let response = self.post("/users/login", None, credentials).await;
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.expect("Failed to parse login");
        body["token"]
            .as_str()
            .expect("Login returned no token")
            .to_string()
    }
}
