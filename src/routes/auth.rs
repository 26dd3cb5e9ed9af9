use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Reply};

use crate::{
    actions::login_user, constants::SESSION_COOKIE, jwt::SessionData, middleware::with_session,
};

use super::{error_reply, json_body, string_fields, with_context, Context};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(ctx.secret()))
        .and_then(logout);

    login.or(logout).unify().boxed()
}

fn session_cookie(token: &str, max_age: i64) -> String {
    format!("{SESSION_COOKIE}={token}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax")
}

async fn login(body: Value, ctx: Context) -> Result<Response, Infallible> {
    let fields = match string_fields(body, ["email", "password"]) {
        Ok(fields) => fields,
        Err(e) => return Ok(error_reply(e.into())),
    };

    let lifetime = ctx.config.session_lifetime();
    let token = match login_user(
        &fields[0],
        &fields[1],
        &ctx.config.jwt_secret,
        lifetime,
        &ctx.pool,
    )
    .await
    {
        Ok(token) => token,
        Err(e) => return Ok(error_reply(e)),
    };

    let cookie = session_cookie(&token, lifetime.num_seconds());
    let reply = warp::reply::json(&json!({ "auth_token": token }));

    Ok(warp::reply::with_header(reply, "set-cookie", cookie).into_response())
}

async fn logout(session: SessionData) -> Result<Response, Infallible> {
    log::trace!("> User {} logged out", session.user_id);

    Ok(warp::reply::with_header(
        StatusCode::NO_CONTENT,
        "set-cookie",
        session_cookie("", 0),
    )
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logout_cookie_expires_immediately() {
        assert_eq!(
            session_cookie("", 0),
            "session=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[tokio::test]
    async fn logout_without_a_session_is_rejected() {
        let secret = std::sync::Arc::new(String::from("auth-route-secret"));
        let filter = warp::path!("api" / "auth" / "token" / "logout")
            .and(warp::post())
            .and(with_session(secret))
            .and_then(logout);

        let rejected = warp::test::request()
            .method("POST")
            .path("/api/auth/token/logout/")
            .filter(&filter)
            .await;

        assert!(rejected.is_err());
    }
}
