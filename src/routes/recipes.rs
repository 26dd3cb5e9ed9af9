use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    path::FullPath,
    reply::Response,
    Filter, Reply,
};

use crate::{
    actions::{
        attach, create_recipe, delete_recipe, detach, get_recipe_mut, get_recipe_view,
        get_short_link, get_short_recipe, list_recipes, render_shopping_list, shopping_list,
        short_link_url, update_recipe, RecipeFilter, RelationKind,
    },
    constants::{RECIPE_COUNT_PER_PAGE, SHOPPING_LIST_FILENAME},
    form::RecipeForm,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::Uuid,
};

use super::{
    error_reply, host, json_body, no_content, page_link, query_params, respond, with_context,
    Context, QueryParams,
};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(query_params())
        .and(with_possible_session(ctx.secret()))
        .and(warp::path::full())
        .and(host())
        .and(with_context(ctx.clone()))
        .and_then(recipes_page);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(ctx.secret()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(post_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(download_shopping_cart);

    let detail = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(recipe_detail);

    let update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(ctx.secret()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(patch_recipe);

    let delete = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(remove_recipe);

    let favorite = relation_filters("favorite", RelationKind::Favorite, &ctx);
    let shopping_cart = relation_filters("shopping_cart", RelationKind::ShoppingCart, &ctx);

    let link = warp::path!("api" / "recipes" / Uuid / "get-link")
        .and(warp::get())
        .and(host())
        .and(with_context(ctx))
        .and_then(recipe_link);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(favorite)
        .unify()
        .or(shopping_cart)
        .unify()
        .or(link)
        .unify()
        .boxed()
}

/// `POST` and `DELETE` on `/api/recipes/{id}/{segment}/`.
fn relation_filters(
    segment: &'static str,
    kind: RelationKind,
    ctx: &Context,
) -> BoxedFilter<(Response,)> {
    let relation = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path(segment))
        .and(warp::path::end());
    let session = with_session(ctx.secret()).and(with_context(ctx.clone()));

    let add = relation
        .clone()
        .and(warp::post())
        .and(session.clone())
        .and_then(move |id: Uuid, session: SessionData, ctx: Context| {
            add_relation(kind, id, session, ctx)
        });
    let remove = relation
        .and(warp::delete())
        .and(session)
        .and_then(move |id: Uuid, session: SessionData, ctx: Context| {
            remove_relation(kind, id, session, ctx)
        });

    add.or(remove).unify().boxed()
}

fn recipe_filter(params: &QueryParams) -> RecipeFilter {
    RecipeFilter {
        author: params.number("author").and_then(|id| Uuid::try_from(id).ok()),
        tags: params.all("tags"),
        is_favorited: params.flag("is_favorited"),
        is_in_shopping_cart: params.flag("is_in_shopping_cart"),
    }
}

async fn recipes_page(
    params: QueryParams,
    session: Option<SessionData>,
    path: FullPath,
    host: Option<String>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let origin = ctx.origin(host.as_deref());
    let result = list_recipes(
        &recipe_filter(&params),
        params.page(RECIPE_COUNT_PER_PAGE),
        session.map(|s| s.user_id),
        |n| page_link(&origin, &path, &params, n),
        &ctx.pool,
    )
    .await;

    Ok(respond(result, StatusCode::OK))
}

async fn recipe_detail(
    id: Uuid,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let result = get_recipe_view(id, session.map(|s| s.user_id), &ctx.pool).await;

    Ok(respond(result, StatusCode::OK))
}

async fn post_recipe(session: SessionData, body: Value, ctx: Context) -> Result<Response, Infallible> {
    let form = match RecipeForm::try_from(body) {
        Ok(form) => form,
        Err(e) => return Ok(error_reply(e.into())),
    };

    let result = match create_recipe(form, session.user_id, &ctx.media, &ctx.pool).await {
        Ok(id) => get_recipe_view(id, Some(session.user_id), &ctx.pool).await,
        Err(e) => Err(e),
    };

    Ok(respond(result, StatusCode::CREATED))
}

async fn patch_recipe(
    id: Uuid,
    session: SessionData,
    body: Value,
    ctx: Context,
) -> Result<Response, Infallible> {
    if let Err(e) = get_recipe_mut(id, &session, &ctx.pool).await {
        return Ok(error_reply(e));
    }
    let form = match RecipeForm::try_from(body) {
        Ok(form) => form,
        Err(e) => return Ok(error_reply(e.into())),
    };

    let result = match update_recipe(id, form, &ctx.media, &ctx.pool).await {
        Ok(()) => get_recipe_view(id, Some(session.user_id), &ctx.pool).await,
        Err(e) => Err(e),
    };

    Ok(respond(result, StatusCode::OK))
}

async fn remove_recipe(id: Uuid, session: SessionData, ctx: Context) -> Result<Response, Infallible> {
    if let Err(e) = get_recipe_mut(id, &session, &ctx.pool).await {
        return Ok(error_reply(e));
    }

    match delete_recipe(id, &ctx.media, &ctx.pool).await {
        Ok(()) => Ok(no_content()),
        Err(e) => Ok(error_reply(e)),
    }
}

async fn add_relation(
    kind: RelationKind,
    recipe_id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Infallible> {
    let result = match attach(kind, session.user_id, recipe_id, &ctx.pool).await {
        Ok(_) => get_short_recipe(recipe_id, &ctx.pool).await,
        Err(e) => Err(e),
    };

    Ok(respond(result, StatusCode::CREATED))
}

async fn remove_relation(
    kind: RelationKind,
    recipe_id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Infallible> {
    match detach(kind, session.user_id, recipe_id, &ctx.pool).await {
        Ok(()) => Ok(no_content()),
        Err(e) => Ok(error_reply(e)),
    }
}

async fn recipe_link(id: Uuid, host: Option<String>, ctx: Context) -> Result<Response, Infallible> {
    let origin = ctx.origin(host.as_deref());
    let result = get_short_link(id, &ctx.pool)
        .await
        .map(|token| json!({ "short-link": short_link_url(&origin, &token) }));

    Ok(respond(result, StatusCode::OK))
}

async fn download_shopping_cart(session: SessionData, ctx: Context) -> Result<Response, Infallible> {
    let items = match shopping_list(session.user_id, &ctx.pool).await {
        Ok(items) => items,
        Err(e) => return Ok(error_reply(e)),
    };

    let reply = warp::reply::with_header(
        render_shopping_list(&items),
        "content-disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );

    Ok(reply.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_filter_is_read_from_the_query() {
        let params = QueryParams(vec![
            ("author".into(), "3".into()),
            ("tags".into(), "breakfast".into()),
            ("tags".into(), "lunch".into()),
            ("is_in_shopping_cart".into(), "1".into()),
        ]);

        assert_eq!(
            recipe_filter(&params),
            RecipeFilter {
                author: Some(3),
                tags: vec!["breakfast".into(), "lunch".into()],
                is_favorited: false,
                is_in_shopping_cart: true,
            }
        );
    }

    #[test]
    fn author_outside_the_id_range_is_ignored() {
        let params = QueryParams(vec![("author".into(), "99999999999".into())]);

        assert_eq!(recipe_filter(&params).author, None);
    }
}
