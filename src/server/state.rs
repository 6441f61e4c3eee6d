use std::{convert::Infallible, sync::Arc};

use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use warp::Filter;

use crate::config::Config;

/// Everything a handler needs. Cloning is cheap: the pool and the redis
/// connection are handles, the rest sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub cache: Option<MultiplexedConnection>,
    pub config: Arc<Config>,
    pub secret: Arc<[u8]>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Connecting to database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        if config.auto_migrate {
            log::info!("Running migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
        }

        let cache = match &config.redis_url {
            Some(url) => connect_cache(url).await,
            None => None,
        };

        Ok(Self::from_parts(pool, cache, config))
    }

    pub fn from_parts(
        pool: Pool<Postgres>,
        cache: Option<MultiplexedConnection>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            cache,
            secret: Arc::from(config.jwt_secret.as_bytes()),
            config: Arc::new(config),
        }
    }
}

/// Reference data can always be read from the database, so a missing cache is not fatal.
async fn connect_cache(url: &str) -> Option<MultiplexedConnection> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            log::error!("Invalid REDIS_URL, running without cache: {e}");
            return None;
        }
    };

    match client.get_multiplexed_async_connection().await {
        Ok(connection) => {
            log::info!("Connected to redis");
            Some(connection)
        }
        Err(e) => {
            log::error!("Could not connect to redis, running without cache: {e}");
            None
        }
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}
