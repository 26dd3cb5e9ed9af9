use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{filters::BoxedFilter, http::StatusCode, path::FullPath, reply::Response, Filter};

use crate::{
    actions::{
        attach, delete_avatar, detach, get_subscription_view, get_user_view, list_subscriptions,
        list_users, register_user, set_avatar, set_password, RelationKind,
    },
    constants::USER_COUNT_PER_PAGE,
    form::{Form, RegistrationForm},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    schema::Uuid,
};

use super::{
    error_reply, host, json_body, no_content, page_link, query_params, respond, string_fields,
    with_context, Context, QueryParams,
};

pub fn filters(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(query_params())
        .and(with_possible_session(ctx.secret()))
        .and(warp::path::full())
        .and(host())
        .and(with_context(ctx.clone()))
        .and_then(users_page);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(create_user);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(current_user);

    let detail = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(user_detail);

    let password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(ctx.secret()))
        .and(json_body())
        .and(with_context(ctx.clone()))
        .and_then(change_password);

    let put_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::put())
        .and(with_session(ctx.secret()))
        .and(json_body())
        .and(host())
        .and(with_context(ctx.clone()))
        .and_then(update_avatar);

    let remove_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::delete())
        .and(with_session(ctx.secret()))
        .and(with_context(ctx.clone()))
        .and_then(clear_avatar);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(with_session(ctx.secret()))
        .and(query_params())
        .and(warp::path::full())
        .and(host())
        .and(with_context(ctx.clone()))
        .and_then(subscriptions_page);

    let subscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_session(ctx.secret()))
        .and(query_params())
        .and(with_context(ctx.clone()))
        .and_then(add_subscription);

    let unsubscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(ctx.secret()))
        .and(with_context(ctx))
        .and_then(remove_subscription);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(put_avatar)
        .unify()
        .or(remove_avatar)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

async fn users_page(
    params: QueryParams,
    session: Option<SessionData>,
    path: FullPath,
    host: Option<String>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let origin = ctx.origin(host.as_deref());
    let result = list_users(
        params.page(USER_COUNT_PER_PAGE),
        session.map(|s| s.user_id),
        |n| page_link(&origin, &path, &params, n),
        &ctx.pool,
    )
    .await;

    Ok(respond(result, StatusCode::OK))
}

async fn create_user(body: Value, ctx: Context) -> Result<Response, Infallible> {
    let form = match Form::from_value(body).and_then(RegistrationForm::try_from) {
        Ok(form) => form,
        Err(e) => return Ok(error_reply(e.into())),
    };

    Ok(respond(register_user(form, &ctx.pool).await, StatusCode::CREATED))
}

async fn current_user(session: SessionData, ctx: Context) -> Result<Response, Infallible> {
    let result = get_user_view(session.user_id, Some(session.user_id), &ctx.pool).await;

    Ok(respond(result, StatusCode::OK))
}

async fn user_detail(
    id: Uuid,
    session: Option<SessionData>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let result = get_user_view(id, session.map(|s| s.user_id), &ctx.pool).await;

    Ok(respond(result, StatusCode::OK))
}

async fn change_password(
    session: SessionData,
    body: Value,
    ctx: Context,
) -> Result<Response, Infallible> {
    let fields = match string_fields(body, ["current_password", "new_password"]) {
        Ok(fields) => fields,
        Err(e) => return Ok(error_reply(e.into())),
    };

    match set_password(session.user_id, &fields[0], &fields[1], &ctx.pool).await {
        Ok(()) => Ok(no_content()),
        Err(e) => Ok(error_reply(e)),
    }
}

async fn update_avatar(
    session: SessionData,
    body: Value,
    host: Option<String>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let fields = match string_fields(body, ["avatar"]) {
        Ok(fields) => fields,
        Err(e) => return Ok(error_reply(e.into())),
    };

    let origin = ctx.origin(host.as_deref());
    let result = set_avatar(session.user_id, &fields[0], &ctx.media, &ctx.pool)
        .await
        .map(|url| json!({ "avatar": format!("{origin}{url}") }));

    Ok(respond(result, StatusCode::OK))
}

async fn clear_avatar(
    session: SessionData,
    ctx: Context,
) -> Result<Response, Infallible> {
    match delete_avatar(session.user_id, &ctx.media, &ctx.pool).await {
        Ok(()) => Ok(no_content()),
        Err(e) => Ok(error_reply(e)),
    }
}

async fn subscriptions_page(
    session: SessionData,
    params: QueryParams,
    path: FullPath,
    host: Option<String>,
    ctx: Context,
) -> Result<Response, Infallible> {
    let origin = ctx.origin(host.as_deref());
    let result = list_subscriptions(
        session.user_id,
        params.page(USER_COUNT_PER_PAGE),
        params.number("recipes_limit"),
        |n| page_link(&origin, &path, &params, n),
        &ctx.pool,
    )
    .await;

    Ok(respond(result, StatusCode::OK))
}

async fn add_subscription(
    author_id: Uuid,
    session: SessionData,
    params: QueryParams,
    ctx: Context,
) -> Result<Response, Infallible> {
    let result = match attach(RelationKind::Subscription, session.user_id, author_id, &ctx.pool).await {
        Ok(_) => get_subscription_view(author_id, params.number("recipes_limit"), &ctx.pool).await,
        Err(e) => Err(e),
    };

    Ok(respond(result, StatusCode::CREATED))
}

async fn remove_subscription(
    author_id: Uuid,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Infallible> {
    match detach(RelationKind::Subscription, session.user_id, author_id, &ctx.pool).await {
        Ok(()) => Ok(no_content()),
        Err(e) => Ok(error_reply(e)),
    }
}
