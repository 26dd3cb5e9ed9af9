use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::constants::SESSION_COOKIE;

use super::jwt::{verify_jwt_session, SessionData};

#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

fn strip_scheme(header: &str) -> Option<&str> {
    header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Raw session token, from the `Authorization` header or the session cookie.
fn session_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>(SESSION_COOKIE))
        .map(|header: Option<String>, cookie: Option<String>| {
            header
                .as_deref()
                .and_then(strip_scheme)
                .map(str::to_owned)
                .or(cookie)
        })
}

fn resolve(token: Option<String>, secret: &str) -> Option<SessionData> {
    token
        .and_then(|token| verify_jwt_session(&token, secret.as_bytes()).ok())
        .map(|data| data.into())
}

pub fn with_session(
    secret: Arc<String>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    session_token().and_then(move |token: Option<String>| {
        let secret = secret.clone();
        async move { resolve(token, &secret).ok_or_else(|| reject::custom(Unauthorized)) }
    })
}

/// Like [`with_session`], but an absent or invalid token yields an anonymous viewer.
pub fn with_possible_session(
    secret: Arc<String>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    session_token().map(move |token: Option<String>| resolve(token, &secret))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::jwt::{sign_jwt_session, JwtSessionData};

    const SECRET: &str = "middleware-secret";

    fn token() -> String {
        let claims = JwtSessionData::new(3, "bob@example.com".into(), Duration::hours(1));
        sign_jwt_session(&claims, SECRET.as_bytes())
            .ok()
            .expect("token should be signed")
    }

    #[tokio::test]
    async fn reads_token_from_authorization_header() {
        let session = warp::test::request()
            .header("authorization", format!("Token {}", token()))
            .filter(&with_session(Arc::new(SECRET.into())))
            .await
            .expect("session should resolve");

        assert_eq!(session.user_id, 3);
    }

    #[tokio::test]
    async fn reads_token_from_cookie() {
        let session = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}={}", token()))
            .filter(&with_possible_session(Arc::new(SECRET.into())))
            .await
            .expect("filter never rejects");

        assert_eq!(session.map(|s| s.user_id), Some(3));
    }

    #[tokio::test]
    async fn missing_token_is_anonymous_or_rejected() {
        let anonymous = warp::test::request()
            .filter(&with_possible_session(Arc::new(SECRET.into())))
            .await
            .expect("filter never rejects");
        assert!(anonymous.is_none());

        let rejected = warp::test::request()
            .header("authorization", "Token garbage")
            .filter(&with_session(Arc::new(SECRET.into())))
            .await;
        assert!(rejected.is_err());
    }
}
