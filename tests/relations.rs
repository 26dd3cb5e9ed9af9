mod common;

use common::{count, fixture, recipe_form, user};
use cookbook_sdk::{
    actions::{
        attach, create_recipe, detach, get_recipe_view, get_user_view, list_subscriptions,
        RelationKind,
    },
    pagination::Page,
};
use sqlx::PgPool;

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn favoriting_twice_conflicts_and_removing_twice_is_missing(pool: PgPool) {
    let f = fixture(&pool).await;
    let recipe = create_recipe(
        recipe_form("Waffles", &[f.breakfast], &[(f.flour, 100)]),
        f.author,
        &f.media,
        &pool,
    )
    .await
    .ok()
    .expect("recipe should be created");

    attach(RelationKind::Favorite, f.reader, recipe, &pool)
        .await
        .ok()
        .expect("first favorite succeeds");
    let conflict = attach(RelationKind::Favorite, f.reader, recipe, &pool)
        .await
        .err()
        .expect("second favorite conflicts");
    assert_eq!(conflict.code, 409);

    let view = get_recipe_view(recipe, Some(f.reader), &pool).await.ok().expect("recipe exists");
    assert!(view.is_favorited);
    assert!(!view.is_in_shopping_cart);
    let anonymous = get_recipe_view(recipe, None, &pool).await.ok().expect("recipe exists");
    assert!(!anonymous.is_favorited);

    detach(RelationKind::Favorite, f.reader, recipe, &pool)
        .await
        .ok()
        .expect("first removal succeeds");
    let missing = detach(RelationKind::Favorite, f.reader, recipe, &pool)
        .await
        .err()
        .expect("second removal finds nothing");
    assert_eq!(missing.code, 404);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn missing_targets_are_not_found(pool: PgPool) {
    let f = fixture(&pool).await;

    let recipe = attach(RelationKind::ShoppingCart, f.reader, 424_242, &pool)
        .await
        .err()
        .expect("recipe does not exist");
    let author = attach(RelationKind::Subscription, f.reader, 424_242, &pool)
        .await
        .err()
        .expect("author does not exist");

    assert_eq!(recipe.code, 404);
    assert_eq!(author.code, 404);
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn subscriptions_list_authors_with_their_recipes(pool: PgPool) {
    let f = fixture(&pool).await;
    let other = user(&pool, "other").await;
    for name in ["Bread", "Buns", "Cake"] {
        create_recipe(recipe_form(name, &[f.lunch], &[(f.flour, 300)]), f.author, &f.media, &pool)
            .await
            .ok()
            .expect("recipe should be created");
    }

    let own = attach(RelationKind::Subscription, f.reader, f.reader, &pool)
        .await
        .err()
        .expect("cannot follow yourself");
    assert_eq!(own.code, 400);

    attach(RelationKind::Subscription, f.reader, f.author, &pool)
        .await
        .ok()
        .expect("subscription succeeds");

    let author = get_user_view(f.author, Some(f.reader), &pool).await.ok().expect("author exists");
    assert!(author.is_subscribed);
    let stranger = get_user_view(other, Some(f.reader), &pool).await.ok().expect("user exists");
    assert!(!stranger.is_subscribed);

    let page = list_subscriptions(
        f.reader,
        Page::new(None, None, 6),
        Some(2),
        |n| format!("/api/users/subscriptions/?page={n}"),
        &pool,
    )
    .await
    .ok()
    .expect("subscriptions are listed");

    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].author.id, f.author);
    assert_eq!(page.results[0].recipes.len(), 2);
    assert_eq!(page.results[0].recipes_count, 3);
    assert_eq!(page.results[0].recipes[0].name, "Cake");
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn unsubscribing_from_yourself_finds_nothing(pool: PgPool) {
    let f = fixture(&pool).await;

    let missing = detach(RelationKind::Subscription, f.reader, f.reader, &pool)
        .await
        .err()
        .expect("there is no self subscription to remove");

    assert_eq!(missing.code, 404);
    assert_eq!(
        missing.info.as_deref(),
        Some("You are not subscribed to this author")
    );
}

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn concurrent_attaches_store_one_row(pool: PgPool) {
    let f = fixture(&pool).await;
    let recipe = create_recipe(
        recipe_form("Scones", &[f.breakfast], &[(f.flour, 250)]),
        f.author,
        &f.media,
        &pool,
    )
    .await
    .ok()
    .expect("recipe should be created");

    let (first, second) = tokio::join!(
        attach(RelationKind::ShoppingCart, f.reader, recipe, &pool),
        attach(RelationKind::ShoppingCart, f.reader, recipe, &pool),
    );
    let mut codes: Vec<u16> = [first, second]
        .into_iter()
        .map(|r| r.map_or_else(|e| e.code as u16, |_| 201))
        .collect();
    codes.sort();

    assert_eq!(codes, vec![201, 409]);
    assert_eq!(count(&pool, "shopping_cart").await, 1);
}
