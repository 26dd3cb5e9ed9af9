mod common;

use common::{fixture, recipe_form};
use cookbook_sdk::{
    actions::{attach, create_recipe, render_shopping_list, shopping_list, RelationKind},
    schema::ShoppingListItem,
};
use sqlx::PgPool;

#[sqlx::test]
#[ignore = "needs DATABASE_URL"]
async fn amounts_are_summed_across_carted_recipes(pool: PgPool) {
    let f = fixture(&pool).await;
    let bread = create_recipe(
        recipe_form("Bread", &[f.lunch], &[(f.flour, 100)]),
        f.author,
        &f.media,
        &pool,
    )
    .await
    .ok()
    .expect("recipe should be created");
    let cake = create_recipe(
        recipe_form("Cake", &[f.lunch], &[(f.flour, 50), (f.eggs, 3)]),
        f.author,
        &f.media,
        &pool,
    )
    .await
    .ok()
    .expect("recipe should be created");

    for recipe in [bread, cake] {
        attach(RelationKind::ShoppingCart, f.reader, recipe, &pool)
            .await
            .ok()
            .expect("recipe goes into the cart");
    }

    let items = shopping_list(f.reader, &pool).await.ok().expect("list is built");
    assert_eq!(
        items,
        vec![
            ShoppingListItem {
                name: "eggs".into(),
                amount: 3,
                measurement_unit: "pcs".into()
            },
            ShoppingListItem {
                name: "flour".into(),
                amount: 150,
                measurement_unit: "g".into()
            },
        ]
    );
    assert!(render_shopping_list(&items).contains("150"));

    let empty = shopping_list(f.author, &pool).await.ok().expect("list is built");
    assert!(empty.is_empty());
}
