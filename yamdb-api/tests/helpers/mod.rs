//! Shared fixtures for the HTTP integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::util::ServiceExt; // for `oneshot` method
use yamdb_api::{build_router, AppState};
use yamdb_common::auth::TokenSigner;
use yamdb_common::config::TomlConfig;
use yamdb_common::db::init_memory_database;
use yamdb_common::db::users::{self, NewUser};
use yamdb_common::mail::MemoryMailer;

/// Router plus handles the tests inspect directly
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: MemoryMailer,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut config = TomlConfig::default();
        config.page_size = 2;

        let db = init_memory_database().await.expect("Should create in-memory database");
        let mailer = MemoryMailer::new();
        let signer = TokenSigner::new(b"integration-test-secret", 60);
        let state = AppState::new(db, config, Arc::new(mailer.clone()), signer);

        Self {
            router: build_router(state.clone()),
            state,
            mailer,
        }
    }

    /// Create an account with `role` and return a valid token for it
    pub async fn user_token(&self, username: &str, role: &str) -> String {
        let user = users::create_user(
            &self.state.db,
            NewUser {
                username: Some(username.to_string()),
                email: Some(format!("{}@example.com", username)),
                role: Some(role.to_string()),
                ..NewUser::default()
            },
        )
        .await
        .expect("Should create user");

        self.state.signer.issue(&user).expect("Should issue token")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("PATCH", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("DELETE", uri, token, None).await
    }

    /// Seed a category, two genres and one title; returns the title id
    pub async fn seed_title(&self, admin: &str) -> i64 {
        for (uri, name, slug) in [
            ("/api/v1/categories/", "Films", "films"),
            ("/api/v1/genres/", "Drama", "drama"),
            ("/api/v1/genres/", "Comedy", "comedy"),
        ] {
            let (status, _) = self
                .post(uri, Some(admin), serde_json::json!({"name": name, "slug": slug}))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = self
            .post(
                "/api/v1/titles/",
                Some(admin),
                serde_json::json!({
                    "name": "Stalker",
                    "year": 1979,
                    "description": "A guide leads two men through the Zone",
                    "genre": ["drama"],
                    "category": "films"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_i64().unwrap()
    }
}
