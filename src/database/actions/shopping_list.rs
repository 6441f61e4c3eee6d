use std::collections::BTreeMap;

use potion::HtmlError;
use serde::Serialize;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    constants::SHOPPING_LIST_FOOTER,
    error::{not_found, QueryError},
    schema::{CartIngredientRow, User},
};

use super::get_user_by_id;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Ingredient totals across every recipe in a cart, sorted by name then unit.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ShoppingList {
    items: Vec<ShoppingListItem>,
}

impl ShoppingList {
    pub fn aggregate<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = CartIngredientRow>,
    {
        let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
        for row in rows {
            *totals.entry((row.name, row.measurement_unit)).or_default() += i64::from(row.amount);
        }

        Self {
            items: totals
                .into_iter()
                .map(|((name, measurement_unit), amount)| ShoppingListItem {
                    name,
                    measurement_unit,
                    amount,
                })
                .collect(),
        }
    }

    pub fn items(&self) -> &[ShoppingListItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn render(&self, user: &User) -> String {
        let mut text = format!(
            "Shopping list for {} {} ({}):\n\n",
            user.first_name, user.last_name, user.username
        );
        for item in &self.items {
            text.push_str(&format!(
                "{}: {} {}\n",
                item.name, item.amount, item.measurement_unit
            ));
        }
        text.push('\n');
        text.push_str(SHOPPING_LIST_FOOTER);
        text.push('\n');
        text
    }

    pub fn filename(username: &str) -> String {
        format!("{username}_shopping_list.txt")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListFile {
    pub filename: String,
    pub contents: String,
}

/// Aggregated shopping list of the session user. An empty cart is an error.
pub async fn fetch_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<ShoppingListFile, potion::Error> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let user = get_user_by_id(session.user_id, pool)
        .await?
        .ok_or_else(|| not_found("No user exists with specified id"))?;

    let rows: Vec<CartIngredientRow> = sqlx::query_as(
        "
        SELECT ia.recipe_id, i.name, i.measurement_unit, ia.amount
        FROM shopping_carts c
        INNER JOIN ingredient_amounts ia ON ia.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user.id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let list = ShoppingList::aggregate(rows);
    if list.is_empty() {
        let (in_cart,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM shopping_carts WHERE user_id = $1)")
                .bind(user.id)
                .fetch_one(pool)
                .await
                .map_err(QueryError::from)?;

        // Recipes can lose every ingredient line when ingredients are deleted
        let message = if in_cart {
            "Shopping list is empty"
        } else {
            "Shopping cart is empty"
        };
        return Err(HtmlError::InvalidRequest.new(message));
    }

    Ok(ShoppingListFile {
        filename: ShoppingList::filename(&user.username),
        contents: list.render(&user),
    })
}
