//! HTTP contract of the recipe endpoints, driven through the full filter tree.
//! Needs a running PostgreSQL, see `tests/constraints.rs`.

use foodgram::{
    actions,
    jwt::SessionData,
    schema::{UserRole, Uuid},
    server::{rejection::handle_rejection, routes::routes, state::AppState},
    validation::{IngredientPayload, TagPayload},
    Config,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use warp::{http::StatusCode, Filter};

fn state(pool: &PgPool) -> AppState {
    let Ok(config) = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(String::from("postgres://localhost/foodgram")),
        "JWT_SECRET" => Some(String::from("route-tests")),
        _ => None,
    }) else {
        panic!("config should load");
    };

    AppState::from_parts(pool.clone(), None, config)
}

fn admin() -> SessionData {
    SessionData {
        user_id: 0,
        username: String::from("admin"),
        role: UserRole::Admin,
        is_admin: true,
    }
}

fn body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

async fn reference_data(pool: &PgPool) -> (Uuid, Uuid) {
    let salt = IngredientPayload {
        name: String::from("Salt"),
        measurement_unit: String::from("g"),
    };
    let lunch = TagPayload {
        name: String::from("Lunch"),
        color: None,
        slug: String::from("lunch"),
    };

    let salt = actions::create_ingredient(&salt, &admin(), None, pool)
        .await
        .unwrap();
    let lunch = actions::create_tag(&lunch, &admin(), None, pool).await.unwrap();

    (salt.id, lunch.id)
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn recipe_endpoints_status_contract(pool: PgPool) {
    let api = routes(state(&pool)).recover(handle_rejection);
    let (salt, lunch) = reference_data(&pool).await;

    let registered = warp::test::request()
        .method("POST")
        .path("/api/users")
        .json(&json!({
            "email": "julia@example.com",
            "username": "julia",
            "first_name": "Julia",
            "last_name": "Child",
            "password": "long-enough-password",
        }))
        .reply(&api)
        .await;
    assert_eq!(registered.status(), StatusCode::CREATED);

    let login = warp::test::request()
        .method("POST")
        .path("/api/auth/token/login")
        .json(&json!({ "email": "julia@example.com", "password": "long-enough-password" }))
        .reply(&api)
        .await;
    assert_eq!(login.status(), StatusCode::OK);
    let authorization = format!("Token {}", body(login.body())["auth_token"].as_str().unwrap());

    let request = |method: &str, path: &str| {
        warp::test::request()
            .method(method)
            .path(path)
            .header("authorization", authorization.clone())
    };

    let created = request("POST", "/api/recipes")
        .json(&json!({
            "ingredients": [{ "id": salt, "amount": 5 }],
            "tags": [lunch],
            "image": "recipes/images/soup.png",
            "name": "Soup",
            "text": "Boil water, add salt.",
            "cooking_time": 20,
        }))
        .reply(&api)
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let id = body(created.body())["id"].as_i64().unwrap();

    let favorite = format!("/api/recipes/{id}/favorite");
    let statuses = [
        ("POST", StatusCode::CREATED),
        ("POST", StatusCode::BAD_REQUEST),
        ("DELETE", StatusCode::NO_CONTENT),
        ("DELETE", StatusCode::BAD_REQUEST),
    ];
    for (method, expected) in statuses {
        let reply = request(method, &favorite).reply(&api).await;
        assert_eq!(reply.status(), expected, "{method} {favorite}");
    }

    let missing = request("POST", "/api/recipes/999999/favorite").reply(&api).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let missing = request("GET", "/api/recipes/999999").reply(&api).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let past_the_end = request("GET", "/api/recipes?page=5").reply(&api).await;
    assert_eq!(past_the_end.status(), StatusCode::NOT_FOUND);

    let empty = request("GET", "/api/recipes/download_shopping_cart")
        .reply(&api)
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let cart = request("POST", &format!("/api/recipes/{id}/shopping_cart"))
        .reply(&api)
        .await;
    assert_eq!(cart.status(), StatusCode::CREATED);
    assert_eq!(body(cart.body())["name"], "Soup");

    let download = request("GET", "/api/recipes/download_shopping_cart")
        .reply(&api)
        .await;
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(
        download.headers()["content-disposition"],
        "attachment; filename=\"julia_shopping_list.txt\""
    );
    assert!(download.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        std::str::from_utf8(download.body()).unwrap(),
        "Shopping list for Julia Child (julia):\n\nSalt: 5 g\n\nGenerated by Foodgram\n"
    );

    let deleted = request("DELETE", &format!("/api/recipes/{id}"))
        .reply(&api)
        .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}
