use std::convert::Infallible;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter, Reply};

use crate::actions::{recipe_location, resolve_short_link};

use super::{error_reply, host, with_context, Context};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    warp::path!("s" / String)
        .and(warp::get())
        .and(host())
        .and(with_context(ctx))
        .and_then(follow)
        .boxed()
}

/// Redirects a short link to the recipe page it points at.
async fn follow(token: String, host: Option<String>, ctx: Context) -> Result<Response, Infallible> {
    match resolve_short_link(&token, &ctx.pool).await {
        Ok(recipe_id) => {
            let location = recipe_location(&ctx.origin(host.as_deref()), recipe_id);
            Ok(warp::reply::with_header(StatusCode::FOUND, "location", location).into_response())
        }
        Err(e) => Ok(error_reply(e)),
    }
}
