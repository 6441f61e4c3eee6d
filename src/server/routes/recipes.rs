use warp::{
    reject::Rejection,
    reply::{json, with_header},
    Filter, Reply,
};

use super::{created, json_body, no_content, with_form};
use crate::{
    actions::{self, RecipeFilter, RecipeRelation},
    authentication::{
        jwt::SessionData,
        middleware::{with_possible_session, with_session},
    },
    form::Form,
    pagination::PageQuery,
    schema::{RecipeOrder, Uuid},
    server::{
        rejection::reject,
        state::{with_state, AppState},
    },
    validation::{RecipePayload, RecipeUpdate},
};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let secret = state.secret.clone();

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_form())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(create_recipe);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(download_shopping_cart);

    let retrieve = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_possible_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(get_recipe);

    let update = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(secret.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(delete_recipe);

    let favorite = warp::path!("recipes" / Uuid / "favorite")
        .map(|id: Uuid| (id, RecipeRelation::Favorite))
        .untuple_one();
    let shopping_cart = warp::path!("recipes" / Uuid / "shopping_cart")
        .map(|id: Uuid| (id, RecipeRelation::ShoppingCart))
        .untuple_one();
    let relation = favorite.or(shopping_cart).unify();

    let add_relation = relation
        .clone()
        .and(warp::post())
        .and(with_session(secret.clone()))
        .and(with_state(state.clone()))
        .and_then(add_relation);

    let remove_relation = relation
        .and(warp::delete())
        .and(with_session(secret))
        .and(with_state(state))
        .and_then(remove_relation);

    list.or(create)
        .or(download)
        .or(retrieve)
        .or(update)
        .or(delete)
        .or(add_relation)
        .or(remove_relation)
}

async fn list_recipes(
    form: Form,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let query =
        PageQuery::from_form(&form, state.config.page_size).map_err(|e| reject(e.into()))?;
    let order = match form.get_str("ordering") {
        Some(order) => RecipeOrder::try_from(order).map_err(|e| reject(e.into()))?,
        None => RecipeOrder::default(),
    };
    let filter = RecipeFilter::from_form(&form)
        .map_err(|e| reject(e.into()))?
        .resolve(viewer.as_ref(), state.config.anonymous_filter_policy)
        .map_err(reject)?;

    let page = actions::fetch_recipes(&filter, order, query, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&page))
}

async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::create_recipe(&payload, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&recipe))
}

async fn get_recipe(
    id: Uuid,
    viewer: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::get_recipe_detail(id, viewer.as_ref(), &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&recipe))
}

async fn update_recipe(
    id: Uuid,
    session: SessionData,
    update: RecipeUpdate,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::update_recipe(id, &update, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(json(&recipe))
}

async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    actions::delete_recipe(id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn add_relation(
    id: Uuid,
    relation: RecipeRelation,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::add_relation(relation, id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(created(&recipe))
}

async fn remove_relation(
    id: Uuid,
    relation: RecipeRelation,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    actions::remove_relation(relation, id, &session, &state.pool)
        .await
        .map_err(reject)?;

    Ok(no_content())
}

async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let file = actions::fetch_shopping_list(&session, &state.pool)
        .await
        .map_err(reject)?;

    log::debug!("Serving {} to user {}", file.filename, session.user_id);

    let reply = with_header(file.contents, "Content-Type", "text/plain; charset=utf-8");
    Ok(with_header(
        reply,
        "Content-Disposition",
        format!("attachment; filename=\"{}\"", file.filename),
    ))
}
