use std::collections::HashSet;

use crate::{
    constants::RECIPE_IMAGE_DIR,
    error::{ErrorKind, QueryError, ValidationError},
    form::RecipeForm,
    jwt::SessionData,
    media::{decode_image, DecodedImage, Media},
    pagination::{Page, PageContext},
    schema::{Recipe, RecipePart, RecipeRow, RecipeView, ShortRecipe, Uuid},
};

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{begin, commit, get_user_view, issue_short_link, list_recipe_tags, recipe_flags};

/// Narrows a recipe listing. Tags match by slug, any of them.
/// The flag filters only apply to an authenticated viewer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, text, cooking_time, image, short_link_id FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(row)
}

/// Fetches a recipe the session is allowed to change.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    match get_recipe(id, pool).await? {
        Some(recipe) => {
            if recipe.author_id != session.user_id {
                Err(ErrorKind::Forbidden.new("You do not have permission to perform this action"))
            } else {
                Ok(recipe)
            }
        }
        None => Err(ErrorKind::NotFound.new("No recipe exists with specified id")),
    }
}

pub async fn get_short_recipe(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<ShortRecipe, potion::Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| QueryError::from(e).into())?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No recipe exists with specified id"))
}

pub async fn list_recipe_parts(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipePart>, potion::Error> {
    let rows: Vec<RecipePart> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = $1
        ORDER BY ri.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Newest first; `limit` of `None` lists them all.
pub async fn list_author_recipes(
    author_id: Uuid,
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShortRecipe>, potion::Error> {
    let rows: Vec<ShortRecipe> = sqlx::query_as(
        "
        SELECT id, name, image, cooking_time FROM recipes
        WHERE author_id = $1
        ORDER BY id DESC
        LIMIT $2
    ",
    )
    .bind(author_id)
    .bind(limit.map(|limit| limit.max(0)))
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

pub async fn count_author_recipes(
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<i64, potion::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(author_id)
        .fetch_one(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    Ok(count.0)
}

async fn recipe_view(
    recipe: Recipe,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    let tags = list_recipe_tags(recipe.id, pool).await?;
    let ingredients = list_recipe_parts(recipe.id, pool).await?;
    let author = get_user_view(recipe.author_id, viewer, pool).await?;
    let flags = recipe_flags(recipe.id, viewer, pool).await?;

    Ok(RecipeView {
        id: recipe.id,
        tags,
        author,
        ingredients,
        is_favorited: flags.is_favorited,
        is_in_shopping_cart: flags.is_in_shopping_cart,
        name: recipe.name,
        image: recipe.image,
        text: recipe.text,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn get_recipe_view(
    id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, potion::Error> {
    let recipe = get_recipe(id, pool)
        .await?
        .ok_or_else(|| ErrorKind::NotFound.new("No recipe exists with specified id"))?;

    recipe_view(recipe, viewer, pool).await
}

pub async fn list_recipes<F>(
    filter: &RecipeFilter,
    page: Page,
    viewer: Option<Uuid>,
    link: F,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeView>, potion::Error>
where
    F: Fn(i64) -> String,
{
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "
        SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.short_link_id,
               COUNT(*) OVER() AS count
        FROM recipes r
        WHERE TRUE",
    );

    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    if let Some(user_id) = viewer {
        if filter.is_favorited {
            builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            builder
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
    builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    page.ensure_exists(rows.len())?;

    let total_count = rows.get(0).map(|row| row.count).unwrap_or(0);
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        views.push(recipe_view(row.into(), viewer, pool).await?);
    }

    Ok(PageContext::from_rows(views, total_count, page, link))
}

/// Ids from `requested` that are absent from `known`, first occurrence order.
fn missing_ids(requested: &[Uuid], known: &[Uuid]) -> Vec<Uuid> {
    let known: HashSet<Uuid> = known.iter().copied().collect();
    let mut seen = HashSet::new();

    requested
        .iter()
        .copied()
        .filter(|id| !known.contains(id) && seen.insert(*id))
        .collect()
}

/// Every referenced tag and ingredient must exist before anything is written.
async fn check_references(form: &RecipeForm, conn: &mut PgConnection) -> Result<(), potion::Error> {
    let tags: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(form.tags.as_slice())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let requested: Vec<Uuid> = form.ingredients.iter().map(|part| part.id).collect();
    let ingredients: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(requested.as_slice())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    let known_tags: Vec<Uuid> = tags.into_iter().map(|t| t.0).collect();
    let known_ingredients: Vec<Uuid> = ingredients.into_iter().map(|i| i.0).collect();

    let mut errors = ValidationError::new();
    for id in missing_ids(&form.tags, &known_tags) {
        errors.add("tags", &format!("Invalid pk \"{id}\" - object does not exist."));
    }
    for id in missing_ids(&requested, &known_ingredients) {
        errors.add("ingredients", &format!("Ingredient with id {id} does not exist."));
    }

    errors.into_result().map_err(|e| e.into())
}

async fn insert_parts(
    recipe_id: Uuid,
    form: &RecipeForm,
    conn: &mut PgConnection,
) -> Result<(), potion::Error> {
    if !form.tags.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
        builder.push_values(&form.tags, |mut b, tag| {
            b.push_bind(recipe_id).push_bind(*tag);
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    if !form.ingredients.is_empty() {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
        builder.push_values(&form.ingredients, |mut b, part| {
            b.push_bind(recipe_id).push_bind(part.id).push_bind(part.amount);
        });
        builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }

    Ok(())
}

fn decode_recipe_image(data: &str) -> Result<DecodedImage, potion::Error> {
    decode_image(data).map_err(|e| ValidationError::field("image", e.info()).into())
}

async fn write_new_recipe(
    form: &RecipeForm,
    author_id: Uuid,
    image_url: &str,
    conn: &mut PgConnection,
) -> Result<Uuid, potion::Error> {
    let link = issue_short_link(&mut *conn).await?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image, short_link_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&form.name)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(image_url)
    .bind(link.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    insert_parts(id.0, form, conn).await?;

    Ok(id.0)
}

/// Creates a recipe with its tags, ingredient amounts and short link in one
/// transaction. Nothing is persisted if any step fails.
pub async fn create_recipe(
    form: RecipeForm,
    author_id: Uuid,
    media: &Media,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    let image = decode_recipe_image(&form.image)?;

    let mut tr = begin(pool).await?;
    check_references(&form, &mut *tr).await?;

    let image_url = media.store(RECIPE_IMAGE_DIR, &image).await?;
    let result = async {
        let id = write_new_recipe(&form, author_id, &image_url, &mut *tr).await?;
        commit(tr).await?;
        Ok::<Uuid, potion::Error>(id)
    }
    .await;

    match result {
        Ok(id) => {
            log::info!("> Created recipe {id} for user {author_id}");
            Ok(id)
        }
        Err(e) => {
            media.remove(&image_url).await;
            Err(e)
        }
    }
}

async fn write_recipe_update(
    recipe_id: Uuid,
    form: &RecipeForm,
    image_url: &str,
    conn: &mut PgConnection,
) -> Result<(), potion::Error> {
    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, cooking_time = $3, image = $4 WHERE id = $5",
    )
    .bind(&form.name)
    .bind(&form.text)
    .bind(form.cooking_time)
    .bind(image_url)
    .bind(recipe_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| QueryError::from(e).into())?;
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| QueryError::from(e).into())?;

    insert_parts(recipe_id, form, conn).await
}

/// Replaces every field, tag and ingredient amount of a recipe in one
/// transaction. The short link is kept.
pub async fn update_recipe(
    recipe_id: Uuid,
    form: RecipeForm,
    media: &Media,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let image = decode_recipe_image(&form.image)?;

    let mut tr = begin(pool).await?;
    let previous: Option<(String,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(recipe_id)
            .fetch_optional(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    let Some((previous_image,)) = previous else {
        return Err(ErrorKind::NotFound.new("No recipe exists with specified id"));
    };
    check_references(&form, &mut *tr).await?;

    let image_url = media.store(RECIPE_IMAGE_DIR, &image).await?;
    let result = async {
        write_recipe_update(recipe_id, &form, &image_url, &mut *tr).await?;
        commit(tr).await
    }
    .await;

    match result {
        Ok(()) => {
            media.remove(&previous_image).await;
            log::info!("> Updated recipe {recipe_id}");
            Ok(())
        }
        Err(e) => {
            media.remove(&image_url).await;
            Err(e)
        }
    }
}

/// Deletes a recipe with everything attached to it, including its short link.
pub async fn delete_recipe(
    recipe_id: Uuid,
    media: &Media,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let mut tr = begin(pool).await?;

    let row: Option<(String, Option<Uuid>)> = sqlx::query_as(
        "DELETE FROM recipes WHERE id = $1 RETURNING image, short_link_id",
    )
    .bind(recipe_id)
    .fetch_optional(&mut *tr)
    .await
    .map_err(|e| QueryError::from(e).into())?;
    let Some((image, short_link_id)) = row else {
        return Err(ErrorKind::NotFound.new("No recipe exists with specified id"));
    };

    if let Some(link_id) = short_link_id {
        sqlx::query("DELETE FROM short_links WHERE id = $1")
            .bind(link_id)
            .execute(&mut *tr)
            .await
            .map_err(|e| QueryError::from(e).into())?;
    }
    commit(tr).await?;

    media.remove(&image).await;
    log::info!("> Deleted recipe {recipe_id}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_keeps_first_occurrence_once() {
        assert_eq!(missing_ids(&[1, 9, 2, 9, 7], &[1, 2]), vec![9, 7]);
        assert!(missing_ids(&[1, 2], &[2, 1]).is_empty());
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = RecipeFilter::default();

        assert!(filter.author.is_none());
        assert!(filter.tags.is_empty());
        assert!(!filter.is_favorited && !filter.is_in_shopping_cart);
    }

    #[test]
    fn broken_image_is_a_field_error() {
        let error = decode_recipe_image("not an image").err().expect("image is invalid");

        assert_eq!(error.code, 400);
        assert!(error.info.as_deref().unwrap_or_default().contains("\"image\""));
    }
}
