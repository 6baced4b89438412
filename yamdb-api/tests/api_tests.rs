//! Integration tests for the yamdb-api HTTP surface
//!
//! Tests cover:
//! - Health endpoint
//! - Signup and token exchange
//! - Bearer token handling
//! - Category, genre and title administration
//! - User management and own profile

mod helpers;

use axum::http::StatusCode;
use serde_json::json;
use yamdb_common::db::users;

use helpers::TestApp;

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "yamdb-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

// =============================================================================
// Signup / token
// =============================================================================

fn mailed_code(app: &TestApp, email: &str) -> String {
    let message = app.mailer.last_to(email).expect("confirmation mail sent");
    message
        .body
        .lines()
        .next()
        .and_then(|line| line.split(": ").nth(1))
        .expect("code in first line")
        .to_string()
}

#[tokio::test]
async fn test_signup_then_token_then_profile() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/v1/auth/signup/",
            None,
            json!({"username": "reader", "email": "reader@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"username": "reader", "email": "reader@example.com"}));

    let code = mailed_code(&app, "reader@example.com");
    let (status, body) = app
        .post(
            "/api/v1/auth/token/",
            None,
            json!({"username": "reader", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "reader");
    assert_eq!(body["role"], "user");
    assert!(body.get("confirmation_code_hash").is_none());

    // The code is single use
    let (status, body) = app
        .post(
            "/api/v1/auth/token/",
            None,
            json!({"username": "reader", "confirmation_code": code}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["confirmation_code"].is_array());
}

#[tokio::test]
async fn test_token_errors() {
    let app = TestApp::new().await;
    app.post(
        "/api/v1/auth/signup",
        None,
        json!({"username": "reader", "email": "reader@example.com"}),
    )
    .await;

    let (status, body) = app
        .post("/api/v1/auth/token/", None, json!({"confirmation_code": "x"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["username"].is_array());

    let (status, _) = app
        .post(
            "/api/v1/auth/token/",
            None,
            json!({"username": "ghost", "confirmation_code": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            "/api/v1/auth/token/",
            None,
            json!({"username": "reader", "confirmation_code": "wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_signup_validation_and_conflicts() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/api/v1/auth/signup/", None, json!({"username": "me", "email": "bad"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["username"].is_array());
    assert!(body["error"]["fields"]["email"].is_array());

    app.post(
        "/api/v1/auth/signup/",
        None,
        json!({"username": "alice", "email": "alice@example.com"}),
    )
    .await;
    let (status, body) = app
        .post(
            "/api/v1/auth/signup/",
            None,
            json!({"username": "alice", "email": "other@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["username"].is_array());
    assert!(body["error"]["fields"].get("email").is_none());

    // Exact repeat re-issues a code
    let (status, _) = app
        .post(
            "/api/v1/auth/signup/",
            None,
            json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mailer.sent().len(), 2);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .send("POST", "/api/v1/auth/signup/", None, Some(json!("not an object")))
        .await;
    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// Bearer tokens
// =============================================================================

#[tokio::test]
async fn test_invalid_token_rejected_even_on_public_routes() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/v1/categories/", Some("garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_token_of_deleted_user_rejected() {
    let app = TestApp::new().await;
    let token = app.user_token("leaving", "user").await;

    let user = users::get_by_username(&app.state.db, "leaving").await.unwrap();
    users::delete_user(&app.state.db, &user).await.unwrap();

    let (status, _) = app.get("/api/v1/users/me/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anonymous_profile_is_unauthorized() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/api/v1/users/me/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Categories, genres, titles
// =============================================================================

#[tokio::test]
async fn test_category_write_permissions() {
    let app = TestApp::new().await;
    let user = app.user_token("user", "user").await;
    let moderator = app.user_token("moderator", "moderator").await;
    let admin = app.user_token("admin", "admin").await;
    let body = json!({"name": "Films", "slug": "films"});

    let (status, _) = app.post("/api/v1/categories/", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/v1/categories/", Some(&user), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/v1/categories/", Some(&moderator), body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = app.post("/api/v1/categories/", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created, json!({"name": "Films", "slug": "films"}));

    let (status, error) = app.post("/api/v1/categories/", Some(&admin), body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"]["fields"]["slug"].is_array());
}

#[tokio::test]
async fn test_category_listing_search_and_pages() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;

    for (name, slug) in [("Films", "films"), ("Books", "books"), ("Music", "music")] {
        app.post("/api/v1/genres/", Some(&admin), json!({"name": name, "slug": slug}))
            .await;
    }

    // page_size is 2 in the test app
    let (status, body) = app.get("/api/v1/genres", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["total_pages"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["slug"], "books");

    let (_, body) = app.get("/api/v1/genres/?page=2", None).await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["results"][0]["slug"], "music");

    let (_, body) = app.get("/api/v1/genres/?search=fil", None).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["name"], "Films");
}

#[tokio::test]
async fn test_category_rename_and_delete() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    app.post("/api/v1/categories/", Some(&admin), json!({"name": "Films", "slug": "films"}))
        .await;

    let (status, body) = app
        .patch("/api/v1/categories/films/", Some(&admin), json!({"name": "Movies"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"name": "Movies", "slug": "films"}));

    let (status, _) = app.delete("/api/v1/categories/films/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.delete("/api/v1/categories/films/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_title_crud_and_filters() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let title_id = app.seed_title(&admin).await;

    let (status, title) = app.get(&format!("/api/v1/titles/{}/", title_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(title["name"], "Stalker");
    assert!(title["rating"].is_null());
    assert_eq!(title["category"], json!({"name": "Films", "slug": "films"}));
    assert_eq!(title["genre"], json!([{"name": "Drama", "slug": "drama"}]));

    let (status, updated) = app
        .patch(
            &format!("/api/v1/titles/{}", title_id),
            Some(&admin),
            json!({"genre": ["drama", "comedy"]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["genre"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/v1/titles/?genre=comedy&year=1979", None).await;
    assert_eq!(body["count"], 1);
    let (_, body) = app.get("/api/v1/titles/?name=STALK", None).await;
    assert_eq!(body["count"], 1);
    let (_, body) = app.get("/api/v1/titles/?category=books", None).await;
    assert_eq!(body["count"], 0);

    let (status, _) = app.delete(&format!("/api/v1/titles/{}/", title_id), Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/api/v1/titles/{}/", title_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_title_validation() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;

    let (status, body) = app
        .post(
            "/api/v1/titles/",
            Some(&admin),
            json!({"name": "Future", "year": 3000, "genre": [], "category": "none"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["error"]["fields"];
    assert!(fields["year"].is_array());
    assert!(fields["genre"].is_array());
    assert!(fields["category"].is_array());
}

#[tokio::test]
async fn test_title_query_empty_values_and_search() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    app.seed_title(&admin).await;

    let (status, body) = app.get("/api/v1/titles/?year=&name=&genre=", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (_, body) = app.get("/api/v1/titles/?search=stalk", None).await;
    assert_eq!(body["count"], 1);
    let (_, body) = app.get("/api/v1/titles/?search=solaris", None).await;
    assert_eq!(body["count"], 0);

    let (status, body) = app.get("/api/v1/titles/?year=nineteen", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["year"].is_array());
}

#[tokio::test]
async fn test_non_numeric_path_id_is_json_bad_request() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let title_id = app.seed_title(&admin).await;

    for uri in [
        "/api/v1/titles/abc/".to_string(),
        "/api/v1/titles/abc/reviews/".to_string(),
        format!("/api/v1/titles/{}/reviews/xyz/", title_id),
        format!("/api/v1/titles/{}/reviews/1/comments/zzz/", title_id),
    ] {
        let (status, body) = app.get(&uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"]["code"], "BAD_REQUEST", "{}", uri);
        assert!(body["error"]["message"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_put_is_not_routed() {
    let app = TestApp::new().await;
    let admin = app.user_token("admin", "admin").await;
    let title_id = app.seed_title(&admin).await;

    let (status, _) = app
        .send(
            "PUT",
            &format!("/api/v1/titles/{}/", title_id),
            Some(&admin),
            Some(json!({"name": "Other"})),
        )
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Users
// =============================================================================

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let app = TestApp::new().await;
    let user = app.user_token("plain", "user").await;
    let moderator = app.user_token("moderator", "moderator").await;
    let admin = app.user_token("admin", "admin").await;

    let (status, _) = app.get("/api/v1/users/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/v1/users/", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/", Some(&moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/v1/users/?search=mod", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["username"], "moderator");

    let (status, created) = app
        .post(
            "/api/v1/users/",
            Some(&admin),
            json!({"username": "newbie", "email": "newbie@example.com", "role": "moderator"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["role"], "moderator");

    let (status, patched) = app
        .patch("/api/v1/users/newbie/", Some(&admin), json!({"bio": "Film buff"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["bio"], "Film buff");

    let (status, _) = app.delete("/api/v1/users/newbie/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/v1/users/newbie/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_own_role_is_read_only() {
    let app = TestApp::new().await;
    let token = app.user_token("climber", "user").await;

    let (status, body) = app
        .patch(
            "/api/v1/users/me/",
            Some(&token),
            json!({"role": "admin", "first_name": "Ann"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["first_name"], "Ann");

    let (status, _) = app.get("/api/v1/users/", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
