use crate::{
    error::{ErrorKind, QueryError},
    schema::{Ingredient, Uuid},
};

use sqlx::{Pool, Postgres};

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let ingredient: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    ingredient.ok_or_else(|| ErrorKind::NotFound.new("No ingredient exists with specified id"))
}

/// Lists ingredients, optionally only those whose name starts with `name`
/// (case insensitive).
pub async fn list_ingredients(
    name: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let list: Vec<Ingredient> = match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => sqlx::query_as::<_, Ingredient>(
            "
            SELECT id, name, measurement_unit FROM ingredients
            WHERE LOWER(name) LIKE $1 ESCAPE '\\'
            ORDER BY name, id
        ",
        )
        .bind(prefix_pattern(name))
        .fetch_all(pool)
        .await,
        None => sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients ORDER BY name, id",
        )
        .fetch_all(pool)
        .await,
    }
    .map_err(|e| QueryError::from(e).into())?;

    Ok(list)
}

fn prefix_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 1);
    for c in name.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');

    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_is_lowercased_and_escaped() {
        assert_eq!(prefix_pattern("Fl"), "fl%");
        assert_eq!(prefix_pattern("50%_"), "50\\%\\_%");
    }
}
