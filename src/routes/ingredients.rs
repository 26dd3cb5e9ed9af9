use std::convert::Infallible;

use warp::{filters::BoxedFilter, http::StatusCode, reply::Response, Filter};

use crate::{
    actions::{get_ingredient, list_ingredients},
    schema::Uuid,
};

use super::{query_params, respond, with_context, Context, QueryParams};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(query_params())
        .and(with_context(ctx.clone()))
        .and_then(|params: QueryParams, ctx: Context| async move {
            let result = list_ingredients(params.get("name"), &ctx.pool).await;
            Ok::<_, Infallible>(respond(result, StatusCode::OK))
        });

    let detail = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_context(ctx))
        .and_then(|id: Uuid, ctx: Context| async move {
            Ok::<_, Infallible>(respond(get_ingredient(id, &ctx.pool).await, StatusCode::OK))
        });

    list.or(detail).unify().boxed()
}
