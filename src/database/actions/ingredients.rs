use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    cache::cache::{invalidate, CacheKeyType, CacheLifetime, RedisValue},
    error::{not_found, QueryError},
    import::IngredientSeed,
    schema::{Ingredient, Uuid},
    validation::{validate_ingredient, IngredientPayload},
};

// Two binds per row
const IMPORT_CHUNK_SIZE: usize = 65535 / 2;

/// Escapes `%`, `_` and `\` so user input only ever matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive `LIKE` pattern matching names starting with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}%", escape_like(&prefix.trim().to_lowercase()))
}

async fn fetch_ingredients(
    prefix: Option<String>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let rows: Vec<Ingredient> = match prefix {
        Some(prefix) => sqlx::query_as(
            r"SELECT * FROM ingredients WHERE lower(name) LIKE $1 ESCAPE '\' ORDER BY name, id",
        )
        .bind(prefix_pattern(&prefix))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

/// Ingredients whose name starts with `prefix`, or all of them.
pub async fn list_ingredients(
    prefix: Option<&str>,
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let prefix = prefix
        .map(|prefix| prefix.trim().to_lowercase())
        .filter(|prefix| !prefix.is_empty());

    match cache {
        Some(mut cache) => {
            let key = CacheKeyType::Ingredients.new(prefix.clone().unwrap_or_default());
            let pool = pool.clone();
            RedisValue::get_or(key, &mut cache, move || async move {
                fetch_ingredients(prefix, &pool).await
            })
            .await
        }
        None => fetch_ingredients(prefix, pool).await,
    }
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Ingredient, potion::Error> {
    let ingredient: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    ingredient.ok_or_else(|| not_found("No ingredient exists with specified id"))
}

pub async fn create_ingredient(
    payload: &IngredientPayload,
    session: &SessionData,
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<Ingredient, potion::Error> {
    session.authenticate(ActionType::ManageReferenceData)?;
    validate_ingredient(payload)?;

    let ingredient: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(payload.name.trim())
    .bind(payload.measurement_unit.trim())
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    invalidate(CacheLifetime::BindIngredientCache, cache).await;

    Ok(ingredient)
}

/// Deletes an ingredient together with every recipe line using it.
pub async fn delete_ingredient(
    id: Uuid,
    session: &SessionData,
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageReferenceData)?;

    let query = sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(not_found("No ingredient exists with specified id"));
    }

    invalidate(CacheLifetime::BindIngredientCache, cache).await;

    Ok(())
}

/// Bulk inserts seeds, skipping ones that already exist. Returns the number of new rows.
pub async fn import_ingredients(
    seeds: &[IngredientSeed],
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<u64, potion::Error> {
    let mut tr = pool
        .begin()
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    let mut inserted = 0;
    for chunk in seeds.chunks(IMPORT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, seed| {
            b.push_bind(&seed.name).push_bind(&seed.measurement_unit);
        });
        query_builder.push(" ON CONFLICT DO NOTHING");

        inserted += query_builder
            .build()
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?
            .rows_affected();
    }

    tr.commit()
        .await
        .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;

    log::info!("Imported {inserted} of {} ingredients", seeds.len());
    invalidate(CacheLifetime::BindIngredientCache, cache).await;

    Ok(inserted)
}
