mod auth;
mod ingredients;
mod recipes;
mod short_links;
mod tags;
mod users;

use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{Pool, Postgres};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    path::FullPath,
    reject::Rejection,
    reply::Response,
    Filter, Reply,
};

use crate::{
    config::Config,
    constants::BODY_SIZE_LIMIT,
    error::ValidationError,
    form::Form,
    media::Media,
    middleware::Unauthorized,
    pagination::Page,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
    pub media: Media,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        let media = config.media();

        Self {
            pool,
            config: Arc::new(config),
            media,
        }
    }

    fn secret(&self) -> Arc<String> {
        self.config.jwt_secret.clone()
    }

    /// `scheme://host` of the request, for absolute links.
    fn origin(&self, host: Option<&str>) -> String {
        format!(
            "{}://{}",
            self.config.public_scheme,
            host.unwrap_or("localhost")
        )
    }
}

fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_body() -> impl Filter<Extract = (Value,), Error = Rejection> + Clone {
    warp::body::content_length_limit(BODY_SIZE_LIMIT).and(warp::body::json())
}

fn host() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("host")
}

/// Raw query pairs; repeated keys such as `tags` are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn all(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.to_owned())
            .collect()
    }

    /// Unparsable numbers are ignored.
    pub fn number(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("1") | Some("true"))
    }

    pub fn page(&self, default_size: i64) -> Page {
        Page::new(self.number("page"), self.number("limit"), default_size)
    }

    /// The same query with `page` replaced.
    pub fn with_page(&self, page: i64) -> String {
        let mut pairs: Vec<(String, String)> = self
            .0
            .iter()
            .filter(|(k, _)| k != "page")
            .cloned()
            .collect();
        pairs.push(("page".into(), page.to_string()));

        serde_urlencoded::to_string(&pairs).unwrap_or_else(|_| format!("page={page}"))
    }
}

fn query_params() -> impl Filter<Extract = (QueryParams,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(QueryParams)
}

fn page_link(origin: &str, path: &FullPath, params: &QueryParams, page: i64) -> String {
    format!("{origin}{}?{}", path.as_str(), params.with_page(page))
}

fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn error_body(status: StatusCode, info: Option<String>) -> Value {
    if status.is_server_error() {
        return json!({ "errors": "Internal server error" });
    }
    let info = info.unwrap_or_else(|| status.canonical_reason().unwrap_or("Error").to_owned());

    if status == StatusCode::BAD_REQUEST {
        if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&info) {
            return Value::Object(fields);
        }
    }
    if status == StatusCode::UNAUTHORIZED {
        return json!({ "detail": info });
    }

    json!({ "errors": info })
}

fn error_reply(err: potion::Error) -> Response {
    let status =
        StatusCode::from_u16(err.code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    json_reply(&error_body(status, err.info), status)
}

fn respond<T: Serialize>(result: Result<T, potion::Error>, status: StatusCode) -> Response {
    match result {
        Ok(value) => json_reply(&value, status),
        Err(e) => error_reply(e),
    }
}

/// Required string fields of a JSON body, every missing one reported.
fn string_fields<const N: usize>(body: Value, keys: [&str; N]) -> Result<Vec<String>, ValidationError> {
    let form = Form::from_value(body)?;
    let mut errors = ValidationError::new();
    let mut values = Vec::with_capacity(N);

    for key in keys {
        match form.get_str(key) {
            Ok(value) => values.push(value),
            Err(e) => errors.merge(e),
        }
    }
    errors.into_result()?;

    Ok(values)
}

fn media_files(ctx: &Context) -> BoxedFilter<(Response,)> {
    let mut prefix: BoxedFilter<()> = warp::any().boxed();
    for segment in ctx.config.media_url.split('/').filter(|s| !s.is_empty()) {
        prefix = prefix.and(warp::path(segment.to_owned())).boxed();
    }

    prefix
        .and(warp::get())
        .and(warp::fs::dir(ctx.config.media_root.clone()))
        .map(|file: warp::fs::File| file.into_response())
        .boxed()
}

/// Every endpoint of the service, without rejection handling.
pub fn api(ctx: Context) -> BoxedFilter<(Response,)> {
    users::filters(ctx.clone())
        .or(auth::filters(ctx.clone()))
        .unify()
        .or(tags::filters(ctx.clone()))
        .unify()
        .or(ingredients::filters(ctx.clone()))
        .unify()
        .or(recipes::filters(ctx.clone()))
        .unify()
        .or(short_links::filters(ctx.clone()))
        .unify()
        .or(media_files(&ctx))
        .unify()
        .boxed()
}

pub fn service(
    ctx: Context,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    api(ctx)
        .recover(handle_rejection)
        .with(warp::log("cookbook::http"))
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if err.find::<Unauthorized>().is_some() {
        (
            StatusCode::UNAUTHORIZED,
            json!({ "detail": "Authentication credentials were not provided." }),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "non_field_errors": [e.to_string()] }),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Request body is too large." }),
        )
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            json!({ "detail": "Invalid query string." }),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "detail": "Unsupported media type." }),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed." }),
        )
    } else {
        log::error!("> Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "errors": "Internal server error" }),
        )
    };

    Ok(json_reply(&body, status))
}
