use std::convert::Infallible;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter};

use crate::{
    actions::{get_tag, list_tags},
    schema::Uuid,
};

use super::{respond, with_context, Context};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(|ctx: Context| async move {
            Ok::<_, Infallible>(respond(list_tags(&ctx.pool).await, StatusCode::OK))
        });

    let detail = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(|id: Uuid, ctx: Context| async move {
            Ok::<_, Infallible>(respond(get_tag(id, &ctx.pool).await, StatusCode::OK))
        });

    list.or(detail).unify().boxed()
}
