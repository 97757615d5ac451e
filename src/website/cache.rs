//! In-memory cache of public village websites.
//! Uses moka for TTL-based caching with LRU eviction.

use super::PublicSite;
use moka::sync::Cache;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;

/// Key is village_id. TTL comes from `website.cache_ttl_seconds`.
static PUBLIC_SITE_CACHE: Lazy<Cache<i32, Arc<PublicSite>>> = Lazy::new(|| {
    Cache::builder()
        .time_to_live(Duration::from_secs(
            crate::app_config::website().cache_ttl_seconds,
        ))
        .max_capacity(1_000)
        .build()
});

pub fn get(village_id: i32) -> Option<Arc<PublicSite>> {
    PUBLIC_SITE_CACHE.get(&village_id)
}

pub fn insert(village_id: i32, site: Arc<PublicSite>) {
    PUBLIC_SITE_CACHE.insert(village_id, site);
}

/// Drops the cached site of a village. Called after every website write.
pub fn invalidate(village_id: i32) {
    PUBLIC_SITE_CACHE.invalidate(&village_id);
}

pub fn clear() {
    PUBLIC_SITE_CACHE.invalidate_all();
}
