use serde::Serialize;
use warp::{reject::Rejection, reply::json, Filter, Reply};

use super::{created, json_body, no_content, with_form};
use crate::{
    actions,
    authentication::{
        jwt::SessionData,
        middleware::{with_possible_session, with_session},
    },
    error::TypeError,
    form::Form,
    pagination::PageQuery,
    schema::Uuid,
    server::{
        rejection::reject,
        state::{with_state, AppState},
    },
    validation::{LoginPayload, RegisterPayload, SetPasswordPayload},
};

#[derive(Debug, Serialize)]
struct TokenResponse {
    auth_token: String,
}

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_form())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(list_subscriptions);

    let subscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::post())
        .and(with_form())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(subscribe);

    let unsubscribe = warp::path!("users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(unsubscribe);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(me);

    let set_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(set_password);

    let list = warp::path!("users")
        .and(warp::get())
        .and(with_form())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(register);

    let retrieve = warp::path!("users" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret))
        .and(with_state(state.clone()))
        .and_then(get_user);

    let login = warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state))
        .and_then(login);

    subscriptions
        .or(subscribe)
        .or(unsubscribe)
        .or(me)
        .or(set_password)
        .or(list)
        .or(register)
        .or(retrieve)
        .or(login)
}

fn recipes_limit(form: &Form) -> Result<Option<i64>, Rejection> {
    match form.get_number::<i64>("recipes_limit") {
        Ok(Some(limit)) if limit < 0 => {
            Err(reject(TypeError::new("Invalid number for 'recipes_limit'").into()))
        }
        Ok(limit) => Ok(limit),
        Err(e) => Err(reject(e.into())),
    }
}

async fn list_subscriptions(
    form: Form,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let query =
        PageQuery::from_form(&form, state.config.page_size).map_err(|e| reject(e.into()))?;
    let limit = recipes_limit(&form)?;

    let page = actions::list_subscriptions(&session, query, limit, &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&page))
}

async fn subscribe(
    author_id: Uuid,
    form: Form,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let limit = recipes_limit(&form)?;

    let subscription = actions::subscribe(author_id, &session, limit, &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&subscription))
}

async fn unsubscribe(
    author_id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    actions::unsubscribe(author_id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn me(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    let user = actions::get_user_view(session.user_id, Some(&session), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&user))
}

async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    actions::set_password(&session, &payload, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn list_users(
    form: Form,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let query =
        PageQuery::from_form(&form, state.config.page_size).map_err(|e| reject(e.into()))?;

    let page = actions::list_users(viewer.as_ref(), query, &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&page))
}

async fn register(payload: RegisterPayload, state: AppState) -> Result<impl Reply, Rejection> {
    let user = actions::register_user(&payload, &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&user))
}

async fn get_user(
    id: Uuid,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let user = actions::get_user_view(id, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&user))
}

async fn login(payload: LoginPayload, state: AppState) -> Result<impl Reply, Rejection> {
    let auth_token = actions::login_user(
        &payload,
        &state.secret,
        state.config.session_lifetime(),
        &state.pool,
    )
    .await
    .map_err(reject)?;

    Ok(json(&TokenResponse { auth_token }))
}
