//! Fixtures shared by service and route tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use heartline_shared::middleware::TokenVerifier;

use crate::config::AppConfig;
use crate::domain::geo::GeoPoint;
use crate::models::{Message, User};
use crate::realtime::{FanoutHealth, MessageFanout};
use crate::storage::DiskStorage;
use crate::store::{MemoryStore, Store};
use crate::AppState;

#[derive(Default)]
pub struct RecordingFanout {
    pub published: Mutex<Vec<(String, Message)>>,
    pub fail: bool,
}

#[async_trait]
impl MessageFanout for RecordingFanout {
    async fn publish(&self, room_id: &str, message: &Message) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("broker unavailable");
        }
        self.published
            .lock()
            .unwrap()
            .push((room_id.to_string(), message.clone()));
        Ok(())
    }
}

#[async_trait]
impl FanoutHealth for RecordingFanout {
    async fn check(&self) -> Result<(), String> {
        if self.fail {
            Err("message relay is not subscribed".into())
        } else {
            Ok(())
        }
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub fanout: Arc<RecordingFanout>,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_fanout(RecordingFanout::default())
    }

    pub fn with_fanout(fanout: RecordingFanout) -> Self {
        Self::build(fanout, false)
    }

    /// Fan-out that also reports broker health, as the Redis one does.
    pub fn with_brokered_fanout(fanout: RecordingFanout) -> Self {
        Self::build(fanout, true)
    }

    fn build(fanout: RecordingFanout, brokered: bool) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        let fanout = Arc::new(fanout);
        let fanout_health = brokered.then(|| fanout.clone() as Arc<dyn FanoutHealth>);
        let config = AppConfig {
            upload_dir: uploads.path().display().to_string(),
            ..AppConfig::default()
        };
        let state = Arc::new(AppState {
            verifier: TokenVerifier::new(config.jwt_secret.clone(), None, 3600),
            config,
            store: Arc::new(MemoryStore::new()),
            photos: Arc::new(DiskStorage::new(uploads.path())),
            fanout: fanout.clone(),
            fanout_health,
        });
        Self { state, fanout, uploads }
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    pub async fn user(&self, subject: &str) -> User {
        self.store().provision_user(subject, None).await.unwrap().0
    }

    pub async fn user_at(&self, subject: &str, lat: f64, lng: f64) -> User {
        let user = self.user(subject).await;
        self.store()
            .set_position(user.id, GeoPoint::new(lat, lng).unwrap(), None)
            .await
            .unwrap()
            .unwrap()
    }

    pub fn token(&self, subject: &str) -> String {
        self.state.verifier.issue(subject, None).unwrap().access_token
    }
}

/// Drive one request through the full router; non-JSON bodies read as null.
pub async fn send_request(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = crate::routes::router(app.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn call(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    send_request(app, builder.body(body).unwrap()).await
}

pub fn auth(subject: &str) -> heartline_shared::types::AuthUser {
    heartline_shared::types::AuthUser {
        subject: subject.to_string(),
        email: None,
    }
}
