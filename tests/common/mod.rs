#![allow(dead_code)]

use std::path::PathBuf;

use cookbook_sdk::{
    actions::register_user,
    form::{IngredientAmount, RecipeForm, RegistrationForm},
    Media,
};
use sqlx::PgPool;

pub const IMAGE: &str = "data:image/png;base64,aGVsbG8=";

pub struct Fixture {
    pub media: Media,
    pub author: i32,
    pub reader: i32,
    pub breakfast: i32,
    pub lunch: i32,
    pub flour: i32,
    pub eggs: i32,
}

pub async fn user(pool: &PgPool, name: &str) -> i32 {
    let form = RegistrationForm {
        email: format!("{name}@example.com"),
        username: name.to_owned(),
        first_name: name.to_owned(),
        last_name: "Tester".to_owned(),
        password: "correct-horse-battery".to_owned(),
    };

    register_user(form, pool)
        .await
        .ok()
        .expect("user should register")
        .id
}

async fn insert_id(pool: &PgPool, query: &str, first: &str, second: &str) -> i32 {
    let row: (i32,) = sqlx::query_as(query)
        .bind(first)
        .bind(second)
        .fetch_one(pool)
        .await
        .unwrap();

    row.0
}

pub async fn fixture(pool: &PgPool) -> Fixture {
    let root: PathBuf =
        std::env::temp_dir().join(format!("cookbook-it-{}", uuid::Uuid::new_v4()));
    let tag = "INSERT INTO tags (name, slug) VALUES ($1, $2) RETURNING id";
    let ingredient = "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id";

    Fixture {
        media: Media::new(root, "/media/"),
        author: user(pool, "author").await,
        reader: user(pool, "reader").await,
        breakfast: insert_id(pool, tag, "Breakfast", "breakfast").await,
        lunch: insert_id(pool, tag, "Lunch", "lunch").await,
        flour: insert_id(pool, ingredient, "flour", "g").await,
        eggs: insert_id(pool, ingredient, "eggs", "pcs").await,
    }
}

pub fn recipe_form(name: &str, tags: &[i32], ingredients: &[(i32, i32)]) -> RecipeForm {
    RecipeForm {
        name: name.to_owned(),
        text: format!("How to make {name}."),
        cooking_time: 15,
        image: IMAGE.to_owned(),
        tags: tags.to_vec(),
        ingredients: ingredients
            .iter()
            .map(|&(id, amount)| IngredientAmount { id, amount })
            .collect(),
    }
}

pub async fn count(pool: &PgPool, table: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap();

    row.0
}
