use std::collections::HashMap;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    config::AnonymousFilterPolicy,
    error::{forbidden, not_found, unauthenticated, QueryError, TypeError},
    form::Form,
    pagination::{PageContext, PageQuery},
    schema::{
        Recipe, RecipeDetail, RecipeIngredient, RecipeIngredientRow, RecipeOrder, RecipeRow,
        RecipeTagRow, Tag, Uuid,
    },
    validation::{
        validate_recipe, validate_recipe_update, IngredientAmountInput, RecipePayload,
        RecipeUpdate,
    },
};

/// Predicates of a recipe listing. Favorite and cart flags are relative to the viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, TypeError> {
        Ok(Self {
            author: form.get_number::<Uuid>("author")?,
            tags: form.get_all("tags"),
            is_favorited: form.get_flag("is_favorited")?,
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
        })
    }

    fn wants_viewer(&self) -> bool {
        self.is_favorited || self.is_in_shopping_cart
    }

    /// Applies `policy` to viewer-relative predicates requested by an anonymous caller.
    pub fn resolve(
        self,
        viewer: Option<&SessionData>,
        policy: AnonymousFilterPolicy,
    ) -> Result<Self, potion::Error> {
        if viewer.is_some() || !self.wants_viewer() {
            return Ok(self);
        }

        match policy {
            AnonymousFilterPolicy::Ignore => Ok(Self {
                is_favorited: false,
                is_in_shopping_cart: false,
                ..self
            }),
            AnonymousFilterPolicy::Reject => Err(unauthenticated(
                "Authentication credentials were not provided",
            )),
        }
    }

    fn push_predicates<'a>(&'a self, viewer: Option<Uuid>, builder: &mut QueryBuilder<'a, Postgres>) {
        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }

        if !self.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS(SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(&self.tags)
                .push("))");
        }

        // Without a viewer there is nothing to be relative to
        let Some(viewer) = viewer else {
            return;
        };

        if self.is_favorited {
            builder
                .push(" AND EXISTS(SELECT 1 FROM favorite_recipes f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if self.is_in_shopping_cart {
            builder
                .push(" AND EXISTS(SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }
}

/// `SELECT ... FROM recipes r JOIN users u ... WHERE TRUE`, ready for more predicates.
fn push_recipe_select(viewer: Option<Uuid>, builder: &mut QueryBuilder<'_, Postgres>) {
    builder
        .push(
            "SELECT r.id, r.name, r.image, r.text, r.cooking_time, r.pub_date, \
             u.id AS author_id, u.email AS author_email, u.username AS author_username, \
             u.first_name AS author_first_name, u.last_name AS author_last_name, \
             EXISTS(SELECT 1 FROM subscriptions s WHERE s.author_id = r.author_id AND s.user_id = ",
        )
        .push_bind(viewer)
        .push(
            ") AS author_is_subscribed, \
             EXISTS(SELECT 1 FROM favorite_recipes f WHERE f.recipe_id = r.id AND f.user_id = ",
        )
        .push_bind(viewer)
        .push(
            ") AS is_favorited, \
             EXISTS(SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ",
        )
        .push_bind(viewer)
        .push(
            ") AS is_in_shopping_cart, \
             COUNT(*) OVER() AS count \
             FROM recipes r INNER JOIN users u ON u.id = r.author_id WHERE TRUE",
        );
}

pub fn build_recipe_listing<'a>(
    filter: &'a RecipeFilter,
    order: RecipeOrder,
    query: PageQuery,
    viewer: Option<Uuid>,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("");
    push_recipe_select(viewer, &mut builder);
    filter.push_predicates(viewer, &mut builder);

    builder
        .push(format!(" ORDER BY {} LIMIT ", order.as_sql()))
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.offset());

    builder
}

fn group_by_recipe<R, T, F>(rows: Vec<R>, recipe_id: F) -> HashMap<Uuid, Vec<T>>
where
    T: From<R>,
    F: Fn(&R) -> Uuid,
{
    let mut hashmap: HashMap<Uuid, Vec<T>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(recipe_id(&row)).or_default().push(row.into());
    });
    hashmap
}

/// Loads tags and ingredient lines of every listed recipe, one query each.
async fn attach_recipe_parts(
    rows: Vec<RecipeRow>,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeDetail>, potion::Error> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();

    let tags: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name, t.id
    ",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let ingredients: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ia.recipe_id, i.id, i.name, i.measurement_unit, ia.amount
        FROM ingredient_amounts ia
        INNER JOIN ingredients i ON i.id = ia.ingredient_id
        WHERE ia.recipe_id = ANY($1)
        ORDER BY ia.id
    ",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut tags: HashMap<Uuid, Vec<Tag>> = group_by_recipe(tags, |row| row.recipe_id);
    let mut ingredients: HashMap<Uuid, Vec<RecipeIngredient>> =
        group_by_recipe(ingredients, |row| row.recipe_id);

    Ok(rows
        .into_iter()
        .map(|row| {
            let tags = tags.remove(&row.id).unwrap_or_default();
            let ingredients = ingredients.remove(&row.id).unwrap_or_default();
            RecipeDetail::from_row(row, tags, ingredients)
        })
        .collect())
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    order: RecipeOrder,
    query: PageQuery,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeDetail>, potion::Error> {
    let viewer = viewer.map(|session| session.user_id);

    let rows: Vec<RecipeRow> = build_recipe_listing(filter, order, query, viewer)
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = attach_recipe_parts(rows, pool).await?;

    PageContext::from_rows(rows, total_count, query)
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Recipe, potion::Error> {
    let recipe: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    recipe.ok_or_else(|| not_found("No recipe exists with specified id"))
}

pub async fn get_recipe_detail(
    id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    let mut builder = QueryBuilder::new("");
    push_recipe_select(viewer.map(|session| session.user_id), &mut builder);
    builder.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| not_found("No recipe exists with specified id"))?;

    attach_recipe_parts(vec![row], pool)
        .await?
        .pop()
        .ok_or_else(|| not_found("No recipe exists with specified id"))
}

/// Recipe the session is allowed to change: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    let recipe = get_recipe(id, pool).await?;

    session.authenticate(ActionType::ManageOwnRecipes)?;

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(_) => Ok(recipe),
        Err(_) if recipe.author_id == session.user_id => Ok(recipe),
        Err(_) => Err(forbidden("Only the author can change this recipe")),
    }
}

async fn insert_recipe_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    conn: &mut PgConnection,
) -> Result<(), potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn insert_ingredient_amounts(
    recipe_id: Uuid,
    ingredients: &[IngredientAmountInput],
    conn: &mut PgConnection,
) -> Result<(), potion::Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_amounts (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(ingredients, |mut b, ingredient| {
        b.push_bind(recipe_id)
            .push_bind(ingredient.id)
            .push_bind(ingredient.amount);
    });

    query_builder
        .build()
        .execute(conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Creates a recipe with its tags and ingredient amounts in one transaction.
pub async fn create_recipe(
    payload: &RecipePayload,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe(payload)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(session.user_id)
    .bind(payload.name.trim())
    .bind(&payload.image)
    .bind(payload.text.trim())
    .bind(payload.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    insert_recipe_tags(id.0, &payload.tags, &mut tr).await?;
    insert_ingredient_amounts(id.0, &payload.ingredients, &mut tr).await?;

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("User {} created recipe {}", session.user_id, id.0);

    get_recipe_detail(id.0, Some(session), pool).await
}

/// Applies the present fields; present tag or ingredient lists replace the old ones.
pub async fn update_recipe(
    id: Uuid,
    update: &RecipeUpdate,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    validate_recipe_update(update)?;

    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            image = COALESCE($2, image),
            text = COALESCE($3, text),
            cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(update.name.as_deref().map(str::trim))
    .bind(update.image.as_deref())
    .bind(update.text.as_deref().map(str::trim))
    .bind(update.cooking_time)
    .bind(recipe.id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = &update.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        insert_recipe_tags(recipe.id, tags, &mut tr).await?;
    }

    if let Some(ingredients) = &update.ingredients {
        sqlx::query("DELETE FROM ingredient_amounts WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;
        insert_ingredient_amounts(recipe.id, ingredients, &mut tr).await?;
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    get_recipe_detail(recipe.id, Some(session), pool).await
}

/// Deletes a recipe; tags, ingredient amounts, favorites and cart entries cascade.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("User {} deleted recipe {}", session.user_id, recipe.id);

    Ok(())
}
