//! Request handling that never reaches the store.

use std::{path::PathBuf, sync::Arc, time::Duration};

use cookbook_sdk::{
    jwt::{sign_jwt_session, JwtSessionData},
    routes::{service, Context},
    Config,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use warp::http::StatusCode;

const SECRET: &str = "http-test-secret";

fn context() -> Context {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://cookbook@127.0.0.1:1/offline")
        .expect("lazy pool accepts any well-formed url");
    let config = Config {
        database_url: "postgres://cookbook@127.0.0.1:1/offline".into(),
        database_max_connections: 1,
        port: 8000,
        jwt_secret: Arc::new(SECRET.into()),
        session_hours: 1,
        media_root: PathBuf::from("media"),
        media_url: "/media/".into(),
        public_scheme: "http".into(),
    };

    Context::new(pool, config)
}

fn token(user_id: i32) -> String {
    let claims = JwtSessionData::new(user_id, "someone@example.com".into(), chrono::Duration::hours(1));
    sign_jwt_session(&claims, SECRET.as_bytes())
        .ok()
        .expect("token should be signed")
}

fn body<B: AsRef<[u8]>>(response: &warp::http::Response<B>) -> Value {
    serde_json::from_slice(response.body().as_ref()).expect("body is json")
}

#[tokio::test]
async fn anonymous_favorite_is_unauthorized() {
    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/1/favorite/")
        .reply(&service(context()))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body(&response)["detail"].is_string());
}

#[tokio::test]
async fn subscribing_to_yourself_is_a_bad_request() {
    let response = warp::test::request()
        .method("POST")
        .path("/api/users/7/subscribe/")
        .header("authorization", format!("Token {}", token(7)))
        .reply(&service(context()))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body(&response),
        json!({ "errors": "You cannot subscribe to yourself" })
    );
}

#[tokio::test]
async fn invalid_recipe_payload_reports_every_field() {
    let response = warp::test::request()
        .method("POST")
        .path("/api/recipes/")
        .header("authorization", format!("Bearer {}", token(3)))
        .json(&json!({
            "name": "Pancakes",
            "text": "Mix and fry.",
            "cooking_time": 0,
            "image": "data:image/png;base64,aGVsbG8=",
            "tags": [],
            "ingredients": [{ "id": 5, "amount": 10 }, { "id": 5, "amount": 20 }]
        }))
        .reply(&service(context()))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let errors = body(&response);
    assert!(errors["cooking_time"].is_array());
    assert!(errors["tags"].is_array());
    assert!(errors["ingredients"].is_array());
}

#[tokio::test]
async fn unknown_paths_and_methods() {
    let missing = warp::test::request()
        .path("/api/nothing-here/")
        .reply(&service(context()))
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let put = warp::test::request()
        .method("PUT")
        .path("/api/recipes/1/")
        .reply(&service(context()))
        .await;
    assert_eq!(put.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn wrong_method_on_a_relation_is_not_allowed_even_anonymously() {
    let response = warp::test::request()
        .method("GET")
        .path("/api/recipes/1/favorite/")
        .reply(&service(context()))
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
