use crate::{
    constants::{SHORT_LINK_ATTEMPTS, SHORT_LINK_LENGTH},
    cryptography::generate_access_token,
    error::{ErrorKind, QueryError},
    schema::{ShortLink, Uuid},
};

use potion::HtmlError;
use sqlx::{PgConnection, Pool, Postgres};

use super::{begin, commit};

/// Stores a fresh random token. A token that is already taken is drawn again,
/// a bounded number of times.
pub async fn issue_short_link(conn: &mut PgConnection) -> Result<ShortLink, potion::Error> {
    for _ in 0..SHORT_LINK_ATTEMPTS {
        let token = generate_access_token(SHORT_LINK_LENGTH);
        let link: Option<ShortLink> = sqlx::query_as(
            "INSERT INTO short_links (token) VALUES ($1) ON CONFLICT (token) DO NOTHING RETURNING id, token",
        )
        .bind(&token)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| QueryError::from(e).into())?;

        match link {
            Some(link) => return Ok(link),
            None => log::warn!("> Short link token {token} already taken, drawing another"),
        }
    }

    log::error!("> No free short link token after {SHORT_LINK_ATTEMPTS} attempts");
    Err(HtmlError::InternalServerError.new("Failed to issue short link"))
}

/// The recipe a short link token points to.
pub async fn resolve_short_link(token: &str, pool: &Pool<Postgres>) -> Result<Uuid, potion::Error> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        "
        SELECT r.id
        FROM short_links s
        INNER JOIN recipes r ON r.short_link_id = s.id
        WHERE s.token = $1
    ",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    row.map(|r| r.0)
        .ok_or_else(|| ErrorKind::NotFound.new("Short link not found"))
}

/// Token of the recipe's short link. Recipes created without one get one now.
pub async fn get_short_link(recipe_id: Uuid, pool: &Pool<Postgres>) -> Result<String, potion::Error> {
    let mut tr = begin(pool).await?;

    let row: Option<(Option<String>,)> = sqlx::query_as(
        "
        SELECT s.token
        FROM recipes r
        LEFT JOIN short_links s ON s.id = r.short_link_id
        WHERE r.id = $1
        FOR UPDATE OF r
    ",
    )
    .bind(recipe_id)
    .fetch_optional(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    let token = match row {
        None => return Err(ErrorKind::NotFound.new("No recipe exists with specified id")),
        Some((Some(token),)) => token,
        Some((None,)) => {
            let link = issue_short_link(&mut *tr).await?;
            sqlx::query("UPDATE recipes SET short_link_id = $1 WHERE id = $2")
                .bind(link.id)
                .bind(recipe_id)
                .execute(&mut *tr)
                .await
                .map_err(|e| QueryError::from(e).into())?;
            log::info!("> Issued short link for recipe {recipe_id}");
            link.token
        }
    };
    commit(tr).await?;

    Ok(token)
}

/// `{base}/s/{token}`, where `base` is scheme and host.
pub fn short_link_url(base: &str, token: &str) -> String {
    format!("{}/s/{token}", base.trim_end_matches('/'))
}

/// Where a resolved short link redirects to.
pub fn recipe_location(base: &str, recipe_id: Uuid) -> String {
    format!("{}/recipes/{recipe_id}", base.trim_end_matches('/'))
}
