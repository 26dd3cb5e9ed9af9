use std::path::Path;

use crate::error::QueryError;

use potion::HtmlError;
use serde::{de::DeserializeOwned, Deserialize};
use sqlx::{Pool, Postgres, QueryBuilder};

use super::{begin, commit};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IngredientSeed {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TagSeed {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub ingredients: usize,
    pub tags: usize,
}

async fn read_seed<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, potion::Error> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        log::error!("> Could not read {path:?}: {e}");
        HtmlError::InternalServerError.new("Could not read reference data")
    })?;

    serde_json::from_str(&raw).map_err(|e| {
        log::error!("> Malformed reference data in {path:?}: {e}");
        HtmlError::InvalidRequest.new("Malformed reference data")
    })
}

/// Replaces every tag and ingredient with the contents of `tags.json` and
/// `ingredients.json` in `dir`. Recipe links to removed rows go with them.
pub async fn load_reference_data(
    dir: &Path,
    pool: &Pool<Postgres>,
) -> Result<SeedSummary, potion::Error> {
    let ingredients: Vec<IngredientSeed> = read_seed(&dir.join("ingredients.json")).await?;
    let tags: Vec<TagSeed> = read_seed(&dir.join("tags.json")).await?;

    let mut tr = begin(pool).await?;

    sqlx::query("DELETE FROM ingredients")
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    if !ingredients.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        builder.push_values(&ingredients, |mut b, ingredient| {
            b.push_bind(&ingredient.name)
                .push_bind(&ingredient.measurement_unit);
        });
        builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    sqlx::query("DELETE FROM tags")
        .execute(&mut *tr)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    if !tags.is_empty() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO tags (name, slug) ");
        builder.push_values(&tags, |mut b, tag| {
            b.push_bind(&tag.name).push_bind(&tag.slug);
        });
        builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    commit(tr).await?;

    let summary = SeedSummary {
        ingredients: ingredients.len(),
        tags: tags.len(),
    };
    log::info!(
        "> Loaded {} ingredients and {} tags",
        summary.ingredients,
        summary.tags
    );

    Ok(summary)
}
