use warp::{reject::Rejection, reply::json, Filter, Reply};

use super::{created, json_body, no_content, with_form};
use crate::{
    actions,
    authentication::{jwt::SessionData, middleware::with_session},
    form::Form,
    schema::Uuid,
    server::{
        rejection::reject,
        state::{with_state, AppState},
    },
    validation::{IngredientPayload, TagPayload},
};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list_tags = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(list_tags);

    let get_tag = warp::path!("tags" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_tag);

    let create_tag = warp::path!("tags")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_tag);

    let list_ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(with_form())
        .and(with_state(state.clone()))
        .and_then(list_ingredients);

    let get_ingredient = warp::path!("ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_ingredient);

    let create_ingredient = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_ingredient);

    let delete_ingredient = warp::path!("ingredients" / Uuid)
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(delete_ingredient);

    list_tags
        .or(get_tag)
        .or(create_tag)
        .or(list_ingredients)
        .or(get_ingredient)
        .or(create_ingredient)
        .or(delete_ingredient)
}

async fn list_tags(state: AppState) -> Result<impl Reply, Rejection> {
    let tags = actions::list_tags(state.cache.clone(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&tags))
}

async fn get_tag(id: Uuid, state: AppState) -> Result<impl Reply, Rejection> {
    let tag = actions::get_tag(id, &state.pool).await.map_err(reject)?;

    Ok(json(&tag))
}

async fn create_tag(
    session: SessionData,
    payload: TagPayload,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let tag = actions::create_tag(&payload, &session, state.cache.clone(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&tag))
}

async fn list_ingredients(form: Form, state: AppState) -> Result<impl Reply, Rejection> {
    let ingredients = actions::list_ingredients(form.get_str("name"), state.cache.clone(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&ingredients))
}

async fn get_ingredient(id: Uuid, state: AppState) -> Result<impl Reply, Rejection> {
    let ingredient = actions::get_ingredient(id, &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&ingredient))
}

async fn create_ingredient(
    session: SessionData,
    payload: IngredientPayload,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let ingredient =
        actions::create_ingredient(&payload, &session, state.cache.clone(), &state.pool)
            .await
            .map_err(reject)?;

    Ok(created(&ingredient))
}

async fn delete_ingredient(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    actions::delete_ingredient(id, &session, state.cache.clone(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}
