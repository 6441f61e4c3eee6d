use potion::HtmlError;
use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
    },
    error::{internal, not_found, QueryError},
    pagination::{PageContext, PageQuery},
    schema::{User, UserRow, UserView, Uuid},
    validation::{
        validate_new_password, validate_registration, LoginPayload, RegisterPayload,
        SetPasswordPayload,
    },
};

pub async fn get_user_by_id(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_email(
    email: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Creates a user from a registration form; the password is stored as an argon2 hash.
pub async fn register_user(
    payload: &RegisterPayload,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    validate_registration(payload)?;

    let password =
        hash_password(&payload.password).map_err(|_| internal("Failed to hash password"))?;

    let user: UserView = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, username, first_name, last_name, FALSE AS is_subscribed
    ",
    )
    .bind(payload.email.trim())
    .bind(payload.username.trim())
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", user.username, user.id);

    Ok(user)
}

/// Returns a signed session token for valid credentials.
pub async fn login_user(
    payload: &LoginPayload,
    secret: &[u8],
    lifetime: chrono::Duration,
    pool: &Pool<Postgres>,
) -> Result<String, potion::Error> {
    let Some(user) = get_user_by_email(payload.email.trim(), pool).await? else {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    };

    let authenticated = verify_password(&payload.password, &user.password)
        .map_err(|_| internal("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new("Invalid credentials"));
    }

    generate_jwt_session(&user, secret, lifetime)
}

pub async fn list_users(
    viewer: Option<&SessionData>,
    query: PageQuery,
    pool: &Pool<Postgres>,
) -> Result<PageContext<UserView>, potion::Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id
            ) AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM users u
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(viewer.map(|session| session.user_id))
    .bind(query.limit)
    .bind(query.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows: Vec<UserView> = rows.into_iter().map(UserView::from).collect();

    PageContext::from_rows(rows, total_count, query)
}

pub async fn get_user_view(
    user_id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserView, potion::Error> {
    let user: Option<UserView> = sqlx::query_as(
        "
        SELECT u.id, u.email, u.username, u.first_name, u.last_name,
            EXISTS(
                SELECT 1 FROM subscriptions s WHERE s.user_id = $2 AND s.author_id = u.id
            ) AS is_subscribed
        FROM users u
        WHERE u.id = $1
    ",
    )
    .bind(user_id)
    .bind(viewer.map(|session| session.user_id))
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    user.ok_or_else(|| not_found("No user exists with specified id"))
}

pub async fn set_password(
    session: &SessionData,
    payload: &SetPasswordPayload,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    validate_new_password(payload)?;

    let user = get_user_by_id(session.user_id, pool)
        .await?
        .ok_or_else(|| not_found("No user exists with specified id"))?;

    let authenticated = verify_password(&payload.current_password, &user.password)
        .map_err(|_| internal("Stored password hash is malformed"))?;
    if !authenticated {
        return Err(HtmlError::InvalidRequest.new("Current password is incorrect"));
    }

    let password =
        hash_password(&payload.new_password).map_err(|_| internal("Failed to hash password"))?;

    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user.id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    log::info!("User {} changed their password", user.id);

    Ok(())
}
