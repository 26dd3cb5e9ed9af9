use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: i32,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: i32, email: String, lifetime: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: i32,
    pub email: String,
}

impl Into<SessionData> for JwtSessionData {
    fn into(self) -> SessionData {
        SessionData {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

fn signing_key(secret: &[u8]) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret).map_err(|_| {
        log::error!("> Session key rejected by HMAC");
        HtmlError::InternalServerError.new("Invalid session key")
    })
}

pub fn sign_jwt_session(claims: &JwtSessionData, secret: &[u8]) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;

    claims
        .sign_with_key(&key)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn generate_jwt_session(
    user: &User,
    secret: &[u8],
    lifetime: Duration,
) -> Result<String, potion::Error> {
    let claims = JwtSessionData::new(user.id, user.email.to_owned(), lifetime);

    sign_jwt_session(&claims, secret)
}

pub fn verify_jwt_session(token: &str, secret: &[u8]) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))
        .and_then(|session: JwtSessionData| {
            if session.is_expired() {
                return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
            }
            Ok(session)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn user() -> User {
        User {
            id: 7,
            email: "ann@example.com".into(),
            username: "ann".into(),
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            password: String::new(),
            avatar: None,
        }
    }

    #[test]
    fn issued_session_verifies() {
        let token = generate_jwt_session(&user(), SECRET, Duration::hours(1))
            .ok()
            .expect("token should be signed");

        let session: SessionData = verify_jwt_session(&token, SECRET)
            .ok()
            .expect("token should verify")
            .into();

        assert_eq!(
            session,
            SessionData {
                user_id: 7,
                email: "ann@example.com".into()
            }
        );
    }

    #[test]
    fn session_signed_with_another_key_is_rejected() {
        let token = generate_jwt_session(&user(), b"other-secret", Duration::hours(1))
            .ok()
            .expect("token should be signed");

        assert!(verify_jwt_session(&token, SECRET).is_err());
    }

    #[test]
    fn expired_session_is_rejected() {
        let claims = JwtSessionData::new(7, "ann@example.com".into(), Duration::hours(-1));
        let token = sign_jwt_session(&claims, SECRET)
            .ok()
            .expect("token should be signed");

        assert!(claims.is_expired());
        assert!(verify_jwt_session(&token, SECRET).is_err());
    }
}
