mod recipes;
mod reference;
mod users;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_status, Json, WithStatus},
    Filter, Reply,
};

use super::state::AppState;
use crate::{constants::MAX_BODY_SIZE, form::Form};

/// Every endpoint, mounted under `/api`.
pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let api = recipes::routes(state.clone())
        .or(users::routes(state.clone()))
        .or(reference::routes(state));

    warp::path("api").and(api)
}

/// Query string with repeatable keys.
pub fn with_form() -> impl Filter<Extract = (Form,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(Form::from_data)
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

pub fn created<T: Serialize>(value: &T) -> WithStatus<Json> {
    with_status(json(value), StatusCode::CREATED)
}

pub fn no_content() -> WithStatus<impl Reply> {
    with_status(warp::reply(), StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::{
        config::Config,
        jwt::generate_jwt_session,
        schema::{User, UserRole},
        server::rejection::handle_rejection,
    };

    const SECRET: &str = "routes-secret";

    // Nothing listens on the pool; these requests must be answered before any query runs.
    fn state(policy: &'static str) -> AppState {
        let Ok(config) = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(String::from("postgres://localhost/foodgram")),
            "JWT_SECRET" => Some(String::from(SECRET)),
            "ANONYMOUS_FILTER_POLICY" => Some(String::from(policy)),
            _ => None,
        }) else {
            panic!("config should load");
        };
        let Ok(pool) = PgPoolOptions::new().connect_lazy(&config.database_url) else {
            panic!("database url should parse");
        };

        AppState::from_parts(pool, None, config)
    }

    fn token() -> String {
        let user = User {
            id: 7,
            username: String::from("cook"),
            email: String::from("cook@example.com"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            password: String::new(),
            role: UserRole::User,
        };
        match generate_jwt_session(&user, SECRET.as_bytes(), Duration::hours(1)) {
            Ok(token) => token,
            Err(_) => panic!("token should be signed"),
        }
    }

    async fn status(
        method: &str,
        path: &str,
        token: Option<&str>,
        policy: &'static str,
    ) -> StatusCode {
        let api = routes(state(policy)).recover(handle_rejection);
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Token {token}"));
        }

        request.reply(&api).await.status()
    }

    #[tokio::test]
    async fn anonymous_writes_are_unauthorized() {
        for (method, path) in [
            ("POST", "/api/recipes/1/favorite"),
            ("DELETE", "/api/recipes/1/favorite"),
            ("POST", "/api/recipes/1/shopping_cart"),
            ("DELETE", "/api/recipes/1/shopping_cart"),
            ("DELETE", "/api/recipes/1"),
            ("GET", "/api/recipes/download_shopping_cart"),
            ("GET", "/api/users/me"),
            ("GET", "/api/users/subscriptions"),
            ("POST", "/api/users/2/subscribe"),
            ("DELETE", "/api/ingredients/1"),
        ] {
            assert_eq!(
                status(method, path, None, "ignore").await,
                StatusCode::UNAUTHORIZED,
                "{method} {path}"
            );
        }
    }

    #[tokio::test]
    async fn forged_token_is_unauthorized() {
        let status = status("GET", "/api/users/me", Some("not-a-token"), "ignore").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        assert_eq!(
            status("GET", "/api/recipes/soup", None, "ignore").await,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status("GET", "/recipes", None, "ignore").await,
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn bad_listing_parameters_are_client_errors() {
        let huge_page = format!("/api/recipes?page={}", i64::MAX);
        for path in [
            huge_page.as_str(),
            "/api/recipes?page=0",
            "/api/recipes?ordering=spiciest",
            "/api/recipes?author=julia",
        ] {
            assert_eq!(
                status("GET", path, None, "ignore").await,
                StatusCode::BAD_REQUEST,
                "{path}"
            );
        }

        let token = token();
        let huge_page = format!("/api/users/subscriptions?page={}", i64::MAX);
        assert_eq!(
            status("GET", &huge_page, Some(&token), "ignore").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn anonymous_favorite_filter_can_be_rejected() {
        let status = status("GET", "/api/recipes?is_favorited=1", None, "reject").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn form_keeps_repeated_keys() {
        let filter = with_form();
        let form = warp::test::request()
            .path("/api/recipes?tags=breakfast&tags=vegan&page=2")
            .filter(&filter)
            .await;

        let Ok(form) = form else {
            panic!("query should parse");
        };
        assert_eq!(form.get_all("tags"), vec!["breakfast", "vegan"]);
        assert_eq!(form.get_str("page"), Some("2"));
    }

    #[tokio::test]
    async fn missing_query_is_an_empty_form() {
        let filter = with_form();
        let form = warp::test::request().path("/api/recipes").filter(&filter).await;

        assert!(matches!(form, Ok(form) if form.get_str("page").is_none()));
    }

    #[test]
    fn status_helpers() {
        assert_eq!(
            created(&serde_json::json!({ "id": 1 })).into_response().status(),
            StatusCode::CREATED
        );
        assert_eq!(no_content().into_response().status(), StatusCode::NO_CONTENT);
    }
}
