use std::collections::{BTreeMap, HashSet};

use crate::{
    constants::SHOPPING_LIST_HEADERS,
    error::QueryError,
    schema::{CartPart, RecipeFlags, ShoppingListItem, Uuid},
    table::TextTable,
};

use sqlx::{Pool, Postgres};

use super::{is_attached, RelationKind};

/// Favorite and shopping cart flags of a recipe for the viewer.
/// Anonymous viewers get `false` for both without a query.
pub async fn recipe_flags(
    recipe_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<RecipeFlags, potion::Error> {
    let Some(user_id) = viewer else {
        return Ok(RecipeFlags::default());
    };

    Ok(RecipeFlags {
        is_favorited: is_attached(RelationKind::Favorite, user_id, recipe_id, pool).await?,
        is_in_shopping_cart: is_attached(RelationKind::ShoppingCart, user_id, recipe_id, pool)
            .await?,
    })
}

pub async fn is_subscribed(
    author_id: Uuid,
    viewer: Option<Uuid>,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    match viewer {
        Some(user_id) => is_attached(RelationKind::Subscription, user_id, author_id, pool).await,
        None => Ok(false),
    }
}

/// Which of `author_ids` the viewer is subscribed to, in one query.
pub async fn subscribed_authors(
    viewer: Option<Uuid>,
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, potion::Error> {
    let Some(user_id) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

pub async fn list_cart_parts(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartPart>, potion::Error> {
    let rows: Vec<CartPart> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(rows)
}

/// Sums amounts per (name, unit), ordered by name then unit.
pub fn roll_up(parts: Vec<CartPart>) -> Vec<ShoppingListItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.name, part.measurement_unit))
            .or_insert(0) += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingListItem {
            name,
            amount,
            measurement_unit,
        })
        .collect()
}

pub async fn shopping_list(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, potion::Error> {
    Ok(roll_up(list_cart_parts(user_id, pool).await?))
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut table = TextTable::new(&SHOPPING_LIST_HEADERS);
    for item in items {
        table.add_row(vec![
            item.name.clone(),
            item.amount.to_string(),
            item.measurement_unit.clone(),
        ]);
    }

    table.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::offline_pool;

    fn part(name: &str, unit: &str, amount: i32) -> CartPart {
        CartPart {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    #[test]
    fn same_ingredient_across_recipes_is_summed() {
        let list = roll_up(vec![
            part("flour", "g", 100),
            part("eggs", "pcs", 2),
            part("flour", "g", 50),
        ]);

        assert_eq!(
            list,
            vec![
                ShoppingListItem {
                    name: "eggs".into(),
                    amount: 2,
                    measurement_unit: "pcs".into()
                },
                ShoppingListItem {
                    name: "flour".into(),
                    amount: 150,
                    measurement_unit: "g".into()
                },
            ]
        );
    }

    #[test]
    fn different_units_stay_separate() {
        let list = roll_up(vec![part("sugar", "g", 10), part("sugar", "tbsp", 1)]);

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].measurement_unit, "g");
        assert_eq!(list[1].measurement_unit, "tbsp");
    }

    #[test]
    fn large_totals_do_not_overflow() {
        let list = roll_up(vec![part("water", "ml", 32767); 4]);

        assert_eq!(list[0].amount, 4 * 32767);
    }

    #[test]
    fn empty_cart_renders_headers_only() {
        let text = render_shopping_list(&roll_up(vec![]));

        assert!(text.contains("Name"));
        assert!(text.contains("Unit"));
    }

    #[test]
    fn rendered_list_has_a_row_per_item() {
        let text = render_shopping_list(&roll_up(vec![
            part("flour", "g", 100),
            part("flour", "g", 50),
        ]));

        assert!(text.contains("flour"));
        assert!(text.contains("150"));
    }

    #[tokio::test]
    async fn anonymous_viewer_is_answered_without_the_store() {
        let pool = offline_pool();

        let flags = recipe_flags(1, None, &pool)
            .await
            .ok()
            .expect("anonymous flags never query");
        assert_eq!(flags, RecipeFlags::default());

        let subscribed = is_subscribed(1, None, &pool).await.ok();
        assert_eq!(subscribed, Some(false));

        let authors = subscribed_authors(None, &[1, 2], &pool).await.ok();
        assert_eq!(authors.map(|a| a.len()), Some(0));
    }
}
