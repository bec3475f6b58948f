use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde_json::Value;

use crate::config::{AuditConfig, CacheConfig, RankingConfig};
use crate::models::category::CategoryView;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub cache: Arc<ApiCache>,
    pub ranking: RankingConfig,
    pub audit: AuditConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        database: DatabaseConnection,
        cache: Arc<ApiCache>,
        ranking: RankingConfig,
        audit: AuditConfig,
    ) -> Self {
        assert!(
            cache.analytics_capacity >= 10,
            "Analytics cache capacity must be configured"
        );
        assert!(
            ranking.trending_gravity > 0.0,
            "Trending gravity must be positive"
        );
        Self {
            database,
            cache,
            ranking,
            audit,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiCache {
    /// Serialized analytics responses keyed by view and parameters, tagged
    /// with the generation they were computed in.
    pub analytics: Cache<String, (u64, Value)>,
    pub categories: Cache<String, Arc<Vec<CategoryView>>>,
    pub analytics_capacity: u64,
    analytics_generation: AtomicU64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.analytics_max_capacity >= 10,
            "Analytics cache capacity threshold"
        );

        let analytics = Cache::builder()
            .max_capacity(config.analytics_max_capacity)
            .time_to_live(Duration::from_secs(config.analytics_ttl_seconds))
            .time_to_idle(Duration::from_secs(config.analytics_ttl_seconds / 2 + 1))
            .build();

        let categories = Cache::builder()
            .max_capacity(4)
            .time_to_live(Duration::from_secs(config.categories_ttl_seconds))
            .build();

        Self {
            analytics,
            categories,
            analytics_capacity: config.analytics_max_capacity,
            analytics_generation: AtomicU64::new(0),
        }
    }

    pub fn analytics_generation(&self) -> u64 {
        self.analytics_generation.load(Ordering::Acquire)
    }

    /// Cached view for `key`, unless it predates the last invalidation.
    pub async fn cached_analytics(&self, key: &str) -> Option<Value> {
        let (generation, value) = self.analytics.get(key).await?;
        (generation == self.analytics_generation()).then_some(value)
    }

    /// Stores a view computed in `generation`. Views computed before an
    /// invalidation are never served.
    pub async fn store_analytics(&self, key: String, generation: u64, value: Value) {
        if generation == self.analytics_generation() {
            self.analytics.insert(key, (generation, value)).await;
        }
    }

    /// Drops every cached analytics view after votes, proposals or statuses change.
    pub fn invalidate_analytics(&self) {
        self.analytics_generation.fetch_add(1, Ordering::AcqRel);
        self.analytics.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::test_cache_config;

    #[tokio::test]
    async fn invalidation_drops_cached_views() {
        let cache = ApiCache::new(&test_cache_config());
        let generation = cache.analytics_generation();
        cache
            .store_analytics("stats".to_string(), generation, json!({ "votes": 1 }))
            .await;
        assert_eq!(cache.cached_analytics("stats").await, Some(json!({ "votes": 1 })));

        cache.invalidate_analytics();
        assert_eq!(cache.cached_analytics("stats").await, None);
    }

    #[tokio::test]
    async fn views_computed_before_invalidation_are_not_served() {
        let cache = ApiCache::new(&test_cache_config());
        let started_in = cache.analytics_generation();

        cache.invalidate_analytics();
        cache
            .store_analytics("stats".to_string(), started_in, json!({ "votes": 0 }))
            .await;
        assert_eq!(cache.cached_analytics("stats").await, None);

        // An entry from an older generation is ignored even if it lands.
        cache
            .analytics
            .insert("barometer".to_string(), (started_in, json!({})))
            .await;
        assert_eq!(cache.cached_analytics("barometer").await, None);
    }
}
