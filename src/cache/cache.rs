use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::{constants::CACHE_TTL_SECONDS, cryptography::generate_token, error::CacheError};

// Caching - keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self._type {
            CacheKeyType::Tags => write!(f, "tags-{}", self._value.to_string()),
            CacheKeyType::Ingredients => write!(f, "ingredients-{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum CacheKeyType {
    Tags,
    Ingredients,
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(value: &CacheKey<T>) -> Self {
        match &value._type {
            CacheKeyType::Tags => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredients => CacheLifetime::BindIngredientCache,
        }
    }
}

/// Starts a new generation for `lifetime` when a cache is configured.
/// A failure leaves stale entries behind, so it is reported loudly but not returned.
pub async fn invalidate(lifetime: CacheLifetime, cache: Option<MultiplexedConnection>) {
    if let Some(mut cache) = cache {
        if let Err(e) = lifetime.refresh(&mut cache).await {
            log::error!("> Failed to invalidate {:?}: {:?}", lifetime, e.info);
        }
    }
}

// Cache - wrappers

/// The generation a cached value is bound to. Values become stale as soon as
/// their generation is refreshed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CacheLifetime {
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    pub fn bind_key(&self) -> &'static str {
        match self {
            CacheLifetime::BindTagCache => "tag-cache-key",
            CacheLifetime::BindIngredientCache => "ingredient-cache-key",
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, potion::Error> {
        get_cache_value::<&str, String>(self.bind_key(), cache).await
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, potion::Error> {
        Ok(bind == &self.get_cache_bind(cache).await?)
    }

    /// Starts a new generation; everything cached under the old one is ignored from now on.
    pub async fn refresh(&self, cache: &mut MultiplexedConnection) -> Result<(), potion::Error> {
        let key = self.bind_key();
        set_cache_value(key, generate_token(16), cache).await?;
        log::debug!("> Refreshed {key}");

        Ok(())
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct RedisValue<T: Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {

    async fn validate(&self, cache: &mut MultiplexedConnection) -> Result<bool, potion::Error> {
        self._lifetime.validate_cache_bind(&self._bind, cache).await
    }

    /// Cached value for `key`, or the result of `callback` which is then cached.
    /// The generation is read before `callback` runs, so a write that lands while
    /// the database is queried leaves the new entry already stale.
    /// A broken or unreachable cache only costs the database round trip.
    pub async fn get_or<'a, F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<T, potion::Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, potion::Error>> + Send + 'a,
    {
        let name = key.to_string();

        let value = get_cache_value::<&str, RedisValue<T>>(&name, cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = name.clone();
                tokio::spawn(async move {
                    log::error!("> Failed to read cached value. Deleting {}", &k);
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("> Failed to delete cached value! {:?}", e.info);
                    }
                });
                None
            });

        // * Cannot use .map(|| {...}) due to async closures
        if let Some(value) = value {
            log::trace!("> Found {name}");
            match value.validate(cache).await {
                Ok(true) => return Ok(value.value),
                Ok(false) => log::trace!("> Invalidated {name}"),
                Err(e) => log::warn!("> Could not validate {name}: {:?}", e.info),
            }
        }

        let lifetime = CacheLifetime::from(&key);
        let bind = lifetime.get_cache_bind(cache).await;

        log::trace!("> Fetching {name}");
        let value = callback().await?;

        match bind {
            Ok(bind) => {
                let cached = RedisValue {
                    value: value.clone(),
                    _lifetime: lifetime,
                    _bind: bind,
                };
                if let Err(e) = set_expiring_cache_value(name.as_str(), cached, cache).await {
                    log::error!("> Failed to cache {name}: {:?}", e.info);
                }
            }
            Err(e) => log::warn!("> Skipping cache for {name}: {:?}", e.info),
        }

        Ok(value)
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache.set(key, value).await.map_err(CacheError::from)?;

    Ok(())
}

/// Like `set_cache_value`, but the entry expires after `CACHE_TTL_SECONDS`.
pub async fn set_expiring_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache
        .set_ex(key, value, CACHE_TTL_SECONDS)
        .await
        .map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), potion::Error> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, potion::Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names() {
        assert_eq!(CacheKeyType::Tags.new("all").to_string(), "tags-all");
        assert_eq!(
            CacheKeyType::Ingredients.new("sal").to_string(),
            "ingredients-sal"
        );
    }

    #[test]
    fn keys_bind_to_generations() {
        assert_eq!(
            CacheLifetime::from(&CacheKeyType::Tags.new("all")),
            CacheLifetime::BindTagCache
        );
        assert_eq!(
            CacheLifetime::from(&CacheKeyType::Ingredients.new("")),
            CacheLifetime::BindIngredientCache
        );
        assert_eq!(CacheLifetime::BindTagCache.bind_key(), "tag-cache-key");
    }

    async fn connect() -> MultiplexedConnection {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        redis::Client::open(url)
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap()
    }

    // Needs a running redis: REDIS_URL=redis://localhost cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn write_during_fetch_is_not_served() {
        let mut cache = connect().await;
        let key = CacheKeyType::Tags.new(generate_token(8));

        let mut writer = cache.clone();
        let first = RedisValue::<Vec<String>>::get_or(key.clone(), &mut cache, move || async move {
            CacheLifetime::BindTagCache.refresh(&mut writer).await?;
            Ok(vec![String::from("before write")])
        })
        .await
        .unwrap();
        assert_eq!(first, vec!["before write"]);

        let second = RedisValue::<Vec<String>>::get_or(key, &mut cache, || async {
            Ok(vec![String::from("after write")])
        })
        .await
        .unwrap();
        assert_eq!(second, vec!["after write"]);
    }

    #[tokio::test]
    #[ignore]
    async fn cached_values_expire() {
        let mut cache = connect().await;
        let key = CacheKeyType::Ingredients.new(generate_token(8));
        let name = key.to_string();

        RedisValue::<Vec<String>>::get_or(key, &mut cache, || async { Ok(vec![]) })
            .await
            .unwrap();

        let ttl: i64 = redis::cmd("TTL")
            .arg(&name)
            .query_async(&mut cache)
            .await
            .unwrap();
        assert!(ttl > 0 && ttl <= CACHE_TTL_SECONDS as i64);
    }
}
