use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::QueryError,
    schema::{RecipeShort, Uuid},
};

use super::get_recipe;

/// User scoped bookmark of a recipe. Both kinds share one add/remove flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

impl RecipeRelation {
    fn table(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "favorite_recipes",
            RecipeRelation::ShoppingCart => "shopping_carts",
        }
    }

    fn action(&self) -> ActionType {
        match self {
            RecipeRelation::Favorite => ActionType::ManageOwnFavorites,
            RecipeRelation::ShoppingCart => ActionType::ManageOwnShoppingCart,
        }
    }

    pub fn already_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is already in favorites",
            RecipeRelation::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    pub fn not_present(&self) -> &'static str {
        match self {
            RecipeRelation::Favorite => "Recipe is not in favorites",
            RecipeRelation::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

/// Adds the recipe to the relation. A second add is rejected, never stored twice.
pub async fn add_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, potion::Error> {
    session.authenticate(relation.action())?;
    let recipe = get_recipe(recipe_id, pool).await?;

    let query = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        relation.table()
    ))
    .bind(session.user_id)
    .bind(recipe.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(relation.already_present()));
    }

    Ok(RecipeShort {
        id: recipe.id,
        name: recipe.name,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
    })
}

pub async fn remove_relation(
    relation: RecipeRelation,
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(relation.action())?;
    let recipe = get_recipe(recipe_id, pool).await?;

    let query = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    ))
    .bind(session.user_id)
    .bind(recipe.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(relation.not_present()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_use_their_own_tables() {
        assert_eq!(RecipeRelation::Favorite.table(), "favorite_recipes");
        assert_eq!(RecipeRelation::ShoppingCart.table(), "shopping_carts");
        assert_eq!(
            RecipeRelation::ShoppingCart.action(),
            ActionType::ManageOwnShoppingCart
        );
    }

    #[test]
    fn messages_name_the_relation() {
        assert!(RecipeRelation::Favorite.already_present().contains("favorites"));
        assert!(RecipeRelation::ShoppingCart
            .not_present()
            .contains("shopping cart"));
    }
}
