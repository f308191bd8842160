use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use epic_api::{
    auth::generate_jwt_token, create_api_router, password::hash_password, ApiConfig, AppState,
    AuthConfig,
};
use epic_core::EpicUser;
use epic_storage::{EpicStore, InMemoryStore};
use epic_test_utils::fixtures::{admin_user, load_organization, organization_with_members, DomainFixture};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "test-secret-key-that-is-long-enough-for-tests";

/// A router over an in-memory store with a seeded catalog.
///
/// Luke is a plain member and Leia an advisor of the Rebel Alliance. Zelda
/// belongs to Deltares. Luke's password is "luke".
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub auth: AuthConfig,
    pub domain: DomainFixture,
    pub admin: EpicUser,
    pub luke: EpicUser,
    pub leia: EpicUser,
    pub zelda: EpicUser,
}

pub async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let domain = DomainFixture::new();
    domain.load(store.as_ref()).await.expect("load domain");

    let (rebels, mut rebel_members) = organization_with_members("Rebel Alliance", &["luke", "leia"]);
    rebel_members[0].password_hash = hash_password("luke").expect("hash password");
    rebel_members[1].is_advisor = true;
    load_organization(store.as_ref(), &rebels, &rebel_members)
        .await
        .expect("load rebels");

    let (deltares, deltares_members) = organization_with_members("Deltares", &["zelda"]);
    load_organization(store.as_ref(), &deltares, &deltares_members)
        .await
        .expect("load deltares");

    let admin = admin_user();
    store.user_insert(&admin).await.expect("insert admin");

    let auth = AuthConfig::with_secret(TEST_SECRET);
    let state = AppState::new(store.clone(), auth.clone(), ApiConfig::default());
    let router = create_api_router(state).expect("build router");

    let mut rebel_members = rebel_members.into_iter();
    TestApp {
        router,
        store,
        auth,
        domain,
        admin,
        luke: rebel_members.next().expect("luke"),
        leia: rebel_members.next().expect("leia"),
        zelda: deltares_members.into_iter().next().expect("zelda"),
    }
}

impl TestApp {
    pub fn token(&self, user: &EpicUser) -> String {
        generate_jwt_token(&self.auth, user).expect("generate token")
    }

    /// Send a request and return the status, headers and raw body.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        user: Option<&EpicUser>,
        body: Option<Value>,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        (status, headers, bytes.to_vec())
    }

    /// Send a request and parse the body as JSON, `Null` when empty.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&EpicUser>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, _, bytes) = self.send_raw(method, uri, user, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, user: &EpicUser) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }
}
