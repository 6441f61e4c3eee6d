use std::collections::HashMap;

use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{jwt::SessionData, permissions::ActionType},
    error::{not_found, QueryError},
    pagination::{PageContext, PageQuery},
    schema::{RecipePreviewRow, RecipeShort, SubscriptionRow, SubscriptionView, Uuid},
};

use super::get_user_by_id;

/// Newest recipes of each author, at most `limit` per author when given.
async fn fetch_recipe_previews(
    author_ids: &[Uuid],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<RecipeShort>>, potion::Error> {
    let rows: Vec<RecipePreviewRow> = sqlx::query_as(
        "
        SELECT p.author_id, p.id, p.name, p.image, p.cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) p
        WHERE $2::BIGINT IS NULL OR p.position <= $2
        ORDER BY p.author_id, p.position
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<RecipeShort>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.author_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

async fn with_previews(
    rows: Vec<SubscriptionRow>,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionView>, potion::Error> {
    let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut previews = fetch_recipe_previews(&ids, recipes_limit, pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let recipes = previews.remove(&row.id).unwrap_or_default();
            SubscriptionView::from_row(row, recipes)
        })
        .collect())
}

/// Authors the session user follows, each with a preview of their newest recipes.
pub async fn list_subscriptions(
    session: &SessionData,
    query: PageQuery,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<PageContext<SubscriptionView>, potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let rows: Vec<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(query.limit)
    .bind(query.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows = with_previews(rows, recipes_limit, pool).await?;

    PageContext::from_rows(rows, total_count, query)
}

async fn get_subscription(
    user_id: Uuid,
    author_id: Uuid,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    let row: Option<SubscriptionRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1 AND s.author_id = $2
    ",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let row = row.ok_or_else(|| not_found("No subscription exists for specified author"))?;

    with_previews(vec![row], recipes_limit, pool)
        .await?
        .pop()
        .ok_or_else(|| not_found("No subscription exists for specified author"))
}

pub async fn subscribe(
    author_id: Uuid,
    session: &SessionData,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionView, potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_user_by_id(author_id, pool)
        .await?
        .ok_or_else(|| not_found("No user exists with specified id"))?;

    if author.id == session.user_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself"));
    }

    let query = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author.id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author"));
    }

    log::debug!("User {} subscribed to {}", session.user_id, author.id);

    get_subscription(session.user_id, author.id, recipes_limit, pool).await
}

pub async fn unsubscribe(
    author_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_user_by_id(author_id, pool)
        .await?
        .ok_or_else(|| not_found("No user exists with specified id"))?;

    let query = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are not subscribed to this author"));
    }

    Ok(())
}
