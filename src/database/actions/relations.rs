use crate::{
    error::{is_foreign_key_violation, is_unique_violation, ErrorKind, QueryError},
    schema::{Relation, Uuid},
};

use sqlx::{Pool, Postgres};

/// The user-owned links between a user and a recipe or another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
    Subscription,
}

impl RelationKind {
    fn table(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
            RelationKind::Subscription => "subscriptions",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipe_id",
            RelationKind::Subscription => "author_id",
        }
    }

    fn target_table(self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => "recipes",
            RelationKind::Subscription => "users",
        }
    }

    fn target_missing(self) -> &'static str {
        match self {
            RelationKind::Favorite | RelationKind::ShoppingCart => {
                "No recipe exists with specified id"
            }
            RelationKind::Subscription => "No user exists with specified id",
        }
    }

    fn already_present(self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is already in favorites",
            RelationKind::ShoppingCart => "Recipe is already in the shopping cart",
            RelationKind::Subscription => "You are already subscribed to this author",
        }
    }

    fn not_present(self) -> &'static str {
        match self {
            RelationKind::Favorite => "Recipe is not in favorites",
            RelationKind::ShoppingCart => "Recipe is not in the shopping cart",
            RelationKind::Subscription => "You are not subscribed to this author",
        }
    }

    /// Checked before the store is consulted.
    fn check_target(self, user_id: Uuid, target_id: Uuid) -> Result<(), potion::Error> {
        if self == RelationKind::Subscription && user_id == target_id {
            return Err(ErrorKind::InvalidArgument.new("You cannot subscribe to yourself"));
        }

        Ok(())
    }
}

async fn ensure_target(
    kind: RelationKind,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let exists: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
        kind.target_table()
    ))
    .bind(target_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if !exists.0 {
        return Err(ErrorKind::NotFound.new(kind.target_missing()));
    }

    Ok(())
}

/// Links `user_id` to `target_id`. Attaching twice is a conflict, and the
/// store's unique constraint settles concurrent attempts the same way.
pub async fn attach(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Relation, potion::Error> {
    kind.check_target(user_id, target_id)?;
    ensure_target(kind, target_id, pool).await?;

    let column = kind.target_column();
    let result: Result<Option<Relation>, sqlx::Error> = sqlx::query_as(&format!(
        "
        INSERT INTO {} (user_id, {column}) VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        RETURNING id, user_id, {column} AS target_id
    ",
        kind.table()
    ))
    .bind(user_id)
    .bind(target_id)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(Some(relation)) => {
            log::trace!("> {kind:?} {user_id} -> {target_id} attached");
            Ok(relation)
        }
        Ok(None) => Err(ErrorKind::Conflict.new(kind.already_present())),
        Err(e) if is_unique_violation(&e) => Err(ErrorKind::Conflict.new(kind.already_present())),
        Err(e) if is_foreign_key_violation(&e) => {
            Err(ErrorKind::NotFound.new(kind.target_missing()))
        }
        Err(e) => Err(QueryError::from(e).into()),
    }
}

/// Unlinks `user_id` from `target_id`. A link that was never made, a
/// self-subscription included, is missing.
pub async fn detach(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    ensure_target(kind, target_id, pool).await?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    if result.rows_affected() == 0 {
        return Err(ErrorKind::NotFound.new(kind.not_present()));
    }
    log::trace!("> {kind:?} {user_id} -> {target_id} detached");

    Ok(())
}

pub async fn is_attached(
    kind: RelationKind,
    user_id: Uuid,
    target_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let exists: (bool,) = sqlx::query_as(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2)",
        kind.table(),
        kind.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).into())?;

    Ok(exists.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::offline_pool;

    #[tokio::test]
    async fn self_subscription_is_rejected_before_the_store() {
        let pool = offline_pool();

        let error = attach(RelationKind::Subscription, 4, 4, &pool)
            .await
            .err()
            .expect("subscribing to yourself fails");

        assert_eq!(error.code, 400);
        assert_eq!(
            error.info.as_deref(),
            Some("You cannot subscribe to yourself")
        );
    }

    #[tokio::test]
    async fn recipe_relations_allow_matching_ids() {
        assert!(RelationKind::Favorite.check_target(4, 4).is_ok());
        assert!(RelationKind::ShoppingCart.check_target(4, 4).is_ok());
        assert!(RelationKind::Subscription.check_target(4, 5).is_ok());
    }

    #[test]
    fn every_kind_names_its_own_table() {
        assert_eq!(RelationKind::Favorite.table(), "favorites");
        assert_eq!(RelationKind::ShoppingCart.table(), "shopping_cart");
        assert_eq!(RelationKind::Subscription.target_column(), "author_id");
        assert_eq!(RelationKind::Subscription.target_table(), "users");
    }
}
