mod aggregation;
mod ingredients;
mod recipes;
mod relations;
mod seed;
mod short_links;
mod tags;
mod users;

pub use aggregation::*;
pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use seed::*;
pub use short_links::*;
pub use tags::*;
pub use users::*;

use potion::HtmlError;
use sqlx::{Pool, Postgres, Transaction};

pub async fn begin(pool: &Pool<Postgres>) -> Result<Transaction<'static, Postgres>, potion::Error> {
    pool.begin().await.map_err(|e| {
        log::error!("> Could not start transaction: {e}");
        HtmlError::InternalServerError.new("Could not start transaction")
    })
}

pub async fn commit(tr: Transaction<'static, Postgres>) -> Result<(), potion::Error> {
    tr.commit().await.map_err(|e| {
        log::error!("> Could not commit transaction: {e}");
        HtmlError::InternalServerError.new("Could not commit transaction")
    })
}

/// A pool that never connects; any query against it fails. Lets tests prove
/// that an operation answered without touching the store.
#[cfg(test)]
pub(crate) fn offline_pool() -> Pool<Postgres> {
    sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://cookbook@127.0.0.1:1/offline")
        .expect("lazy pool accepts any well-formed url")
}
