use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;

use wayfare::auth::TokenService;
use wayfare::config::Config;
use wayfare::state::{AppState, DbPool};
use wayfare::storage::{ArtifactStore, StorageError};
use wayfare::{db, routes};

/// Artifact store fake that records calls and optionally fails every one.
pub struct FakeArtifactStore {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeArtifactStore {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifactStore {
    async fn delete_artifact(&self, _: &str, _: &str) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(StorageError::Status(500))
        } else {
            Ok(())
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub artifacts: Arc<FakeArtifactStore>,
}

pub fn test_app(failing_artifacts: bool) -> TestApp {
    let pool = db::create_test_pool();
    db::run_migrations(&pool).unwrap();

    let artifacts = FakeArtifactStore::new(failing_artifacts);
    let state = AppState {
        db: pool.clone(),
        config: Config::default(),
        tokens: TokenService::new("integration-test-secret"),
        artifacts: artifacts.clone(),
    };

    let router = Router::new()
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::follows::router())
        .merge(routes::posts::router())
        .merge(routes::likes::router())
        .with_state(state);

    TestApp {
        router,
        pool,
        artifacts,
    }
}

pub async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a user through the API and return their id.
pub async fn register_user(app: &TestApp, username: &str) -> i64 {
    let response = send(
        app,
        "POST",
        "/api/users",
        None,
        Some(serde_json::json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["user"]["user_id"].as_i64().unwrap()
}

/// Log a registered user in and return their bearer token.
pub async fn login(app: &TestApp, username: &str) -> String {
    let response = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(serde_json::json!({
            "username": username,
            "password": "hunter2hunter2",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["token"].as_str().unwrap().to_string()
}

/// Promote a user to Admin directly in the database; there is no admin to
/// bootstrap from in a fresh schema.
pub fn promote_to_admin(app: &TestApp, user_id: i64) {
    let conn = app.pool.get().unwrap();
    conn.execute(
        "UPDATE users SET role = 'Admin' WHERE user_id = ?1",
        rusqlite::params![user_id],
    )
    .unwrap();
}
