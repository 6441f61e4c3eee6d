use redis::aio::MultiplexedConnection;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    cache::cache::{invalidate, CacheKeyType, CacheLifetime, RedisValue},
    constants::TAG_DEFAULT_COLOR,
    error::{not_found, QueryError},
    schema::{Tag, Uuid},
    validation::{validate_tag, TagPayload},
};

async fn fetch_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, potion::Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name, id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// All tags, served from the cache when one is configured.
pub async fn list_tags(
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Tag>, potion::Error> {
    match cache {
        Some(mut cache) => {
            let pool = pool.clone();
            RedisValue::get_or(CacheKeyType::Tags.new("all"), &mut cache, move || async move {
                fetch_tags(&pool).await
            })
            .await
        }
        None => fetch_tags(pool).await,
    }
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Tag, potion::Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    tag.ok_or_else(|| not_found("No tag exists with specified id"))
}

pub async fn create_tag(
    payload: &TagPayload,
    session: &SessionData,
    cache: Option<MultiplexedConnection>,
    pool: &Pool<Postgres>,
) -> Result<Tag, potion::Error> {
    session.authenticate(ActionType::ManageReferenceData)?;
    validate_tag(payload)?;

    let color = payload
        .color
        .as_deref()
        .unwrap_or(TAG_DEFAULT_COLOR)
        .to_uppercase();

    let tag: Tag =
        sqlx::query_as("INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(payload.name.trim())
            .bind(color)
            .bind(payload.slug.trim())
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    invalidate(CacheLifetime::BindTagCache, cache).await;

    Ok(tag)
}
