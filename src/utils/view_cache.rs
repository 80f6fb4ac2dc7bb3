//! Short-lived cache for derived verification views (counts, date
//! flags). Entries are keyed `tag:suffix` so a whole tag can be dropped
//! when a submission or decision changes the underlying rows.
//! Invalidation is best-effort: a failure is logged and never propagated
//! to the write that triggered it.

use std::time::Duration;

use moka::future::Cache;
use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::warn;

pub const TAG_ATTENDANCE: &str = "attendance";
pub const TAG_STATS: &str = "stats";
pub const TAG_DATES: &str = "dates";

static VIEW_CACHE: Lazy<Cache<String, Value>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(300)) // views also age out on their own
        .support_invalidation_closures()
        .build()
});

fn key(tag: &str, suffix: &str) -> String {
    format!("{}:{}", tag, suffix)
}

pub async fn get(tag: &str, suffix: &str) -> Option<Value> {
    VIEW_CACHE.get(&key(tag, suffix)).await
}

pub async fn put(tag: &str, suffix: &str, value: Value) {
    VIEW_CACHE.insert(key(tag, suffix), value).await;
}

/// Drops every entry under the given tags.
pub fn invalidate_tags(tags: &[&str]) {
    let prefixes: Vec<String> = tags.iter().map(|t| format!("{}:", t)).collect();
    if let Err(e) =
        VIEW_CACHE.invalidate_entries_if(move |k, _| prefixes.iter().any(|p| k.starts_with(p)))
    {
        warn!(error = %e, "View cache invalidation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[actix_web::test]
    async fn invalidation_only_hits_the_named_tags() {
        put(TAG_STATS, "counts", json!({"total": 1})).await;
        put(TAG_DATES, "2025-01", json!([{"date": "2025-01-06"}])).await;

        invalidate_tags(&[TAG_STATS]);
        // moka applies invalidation predicates lazily; reads observe it.
        VIEW_CACHE.run_pending_tasks().await;

        assert!(get(TAG_STATS, "counts").await.is_none());
        assert!(get(TAG_DATES, "2025-01").await.is_some());

        invalidate_tags(&[TAG_ATTENDANCE, TAG_DATES]);
        VIEW_CACHE.run_pending_tasks().await;
        assert!(get(TAG_DATES, "2025-01").await.is_none());
    }
}
