use chrono::Duration;
use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    constants::AVATAR_DIR,
    error::{ErrorKind, QueryError, ValidationError},
    form::{check_password, RegistrationForm},
    media::{decode_image, Media},
    pagination::{Page, PageContext},
    schema::{RegisteredUser, SubscriptionView, User, UserRow, UserView, Uuid},
};

use super::{count_author_recipes, is_subscribed, list_author_recipes, subscribed_authors};

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email.to_lowercase())
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

pub async fn get_user_by_id(
    pool: &Pool<Postgres>,
    user_id: i32,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

async fn get_existing_user(pool: &Pool<Postgres>, user_id: i32) -> Result<User, potion::Error> {
    get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.new("No user exists with specified id"))
}

/// Creates a user; the password is stored as an argon2 hash.
pub async fn register_user(
    form: RegistrationForm,
    pool: &Pool<Postgres>,
) -> Result<RegisteredUser, potion::Error> {
    let password = hash_password(&form.password).map_err(|e| {
        log::error!("> Failed to hash password: {e}");
        HtmlError::InternalServerError.new("Failed to register user")
    })?;

    let id: Option<(i32,)> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    match id {
        Some((id,)) => {
            log::info!("> Registered user {id}");
            Ok(RegisteredUser {
                email: form.email,
                id,
                username: form.username,
                first_name: form.first_name,
                last_name: form.last_name,
            })
        }
        None => Err(registration_conflict(&form, pool).await?.into()),
    }
}

async fn registration_conflict(
    form: &RegistrationForm,
    pool: &Pool<Postgres>,
) -> Result<ValidationError, potion::Error> {
    let (email_taken, username_taken): (bool, bool) = sqlx::query_as(
        "
        SELECT EXISTS (SELECT 1 FROM users WHERE email = $1),
               EXISTS (SELECT 1 FROM users WHERE username = $2)
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let mut errors = ValidationError::new();
    if email_taken {
        errors.add("email", "A user with that email already exists.");
    }
    if username_taken {
        errors.add("username", "A user with that username already exists.");
    }
    if errors.is_empty() {
        errors.add("non_field_errors", "Failed to register user.");
    }

    Ok(errors)
}

pub async fn login_user(
    email: &str,
    password: &str,
    secret: &str,
    lifetime: Duration,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let user = get_user(pool, email).await?;
    let Some(user) = user else {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    };

    let authenticated = verify_password(password, &user.password).map_err(|e| {
        log::error!("> Stored password hash for user {} is unreadable: {e}", user.id);
        HtmlError::InternalServerError.new("Failed to verify credentials")
    })?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, secret.as_bytes(), lifetime)
}

pub async fn set_password(
    user_id: i32,
    current_password: &str,
    new_password: &str,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let user = get_existing_user(pool, user_id).await?;

    let matches = verify_password(current_password, &user.password).map_err(|e| {
        log::error!("> Stored password hash for user {user_id} is unreadable: {e}");
        HtmlError::InternalServerError.new("Failed to verify credentials")
    })?;
    if !matches {
        return Err(ValidationError::field("current_password", "Invalid password.").into());
    }
    check_password("new_password", new_password).map_err(|e| e.into())?;

    let password = hash_password(new_password).map_err(|e| {
        log::error!("> Failed to hash password: {e}");
        HtmlError::InternalServerError.new("Failed to set password")
    })?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(())
}

/// Stores a new avatar and returns its URL. The previous file is removed.
pub async fn set_avatar(
    user_id: i32,
    data: &str,
    media: &Media,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let image =
        decode_image(data).map_err(|e| ValidationError::field("avatar", e.info()).into())?;
    let previous = get_existing_user(pool, user_id).await?.avatar;

    let url = media.store(AVATAR_DIR, &image).await?;
    let result = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(&url)
        .bind(user_id)
        .execute(pool)
        .await;

    if let Err(e) = result {
        media.remove(&url).await;
        return Err(QueryError::from(e).into());
    }
    if let Some(previous) = previous {
        media.remove(&previous).await;
    }

    Ok(url)
}

pub async fn delete_avatar(
    user_id: i32,
    media: &Media,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let previous: Option<(Option<String>,)> = sqlx::query_as(
        "UPDATE users u SET avatar = NULL FROM users old WHERE u.id = $1 AND old.id = u.id RETURNING old.avatar",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if let Some((Some(previous),)) = previous {
        media.remove(&previous).await;
    }

    Ok(())
}

pub async fn get_user_view(
    user_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    let user = get_existing_user(pool, user_id).await?;
    let subscribed = is_subscribed(user.id, viewer, pool).await?;

    Ok(UserView::from_user(user, subscribed))
}

pub async fn list_users<F>(
    page: Page,
    viewer: Option<Uuid>,
    link: F,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserView>, potion::Error>
where
    F: Fn(i64) -> String,
{
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT id, email, username, first_name, last_name, avatar, COUNT(*) OVER() AS count
        FROM users
        ORDER BY id
        LIMIT $1 OFFSET $2
    ",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;
    page.ensure_exists(rows.len())?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let subscribed = subscribed_authors(viewer, &ids, pool).await?;

    let total_count = rows.get(0).map(|row| row.count).unwrap_or(0);
    let page = PageContext::from_rows(rows, total_count, page, link)
        .map(|row| {
            let is_subscribed = subscribed.contains(&row.id);
            UserView::from_row(row, is_subscribed)
        });

    Ok(page)
}

/// An author as seen by one of their subscribers, with their recipes.
pub async fn get_subscription_view(
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    let author = get_existing_user(pool, author_id).await?;

    subscription_view(UserView::from_user(author, true), recipes_limit, pool).await
}

async fn subscription_view(
    author: UserView,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    let recipes = list_author_recipes(author.id, recipes_limit, pool).await?;
    let recipes_count = count_author_recipes(author.id, pool).await?;

    Ok(SubscriptionView {
        author,
        recipes,
        recipes_count,
    })
}

pub async fn list_subscriptions<F>(
    user_id: Uuid,
    page: Page,
    recipes_limit: Option<i64>,
    link: F,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, potion::Error>
where
    F: Fn(i64) -> String,
{
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;
    page.ensure_exists(rows.len())?;

    let total_count = rows.get(0).map(|row| row.count).unwrap_or(0);
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        views.push(subscription_view(UserView::from_row(row, true), recipes_limit, pool).await?);
    }

    Ok(PageContext::from_rows(views, total_count, page, link))
}
