//! Cached reference data: pricing, subscriptions and group accounts.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;
use tracing::{error, instrument};

use crate::{
    base::types::{GroupAccount, PricingItem, Res, SubscriptionRecord},
    service::db::DbClient,
};

/// Read-through TTL caches in front of the database.
///
/// A failed load is logged and yields an empty list; nothing is cached in that case, so the
/// next call retries.
#[derive(Clone)]
pub struct Catalog {
    db: DbClient,
    pricing: Cache<(), Arc<Vec<PricingItem>>>,
    subscriptions: Cache<(), Arc<Vec<SubscriptionRecord>>>,
    groups: Cache<(), Arc<Vec<GroupAccount>>>,
}

impl Catalog {
    pub fn new(db: DbClient, ttl_secs: u64) -> Self {
        fn cache<V: Clone + Send + Sync + 'static>(ttl_secs: u64) -> Cache<(), V> {
            Cache::builder().max_capacity(1).time_to_live(Duration::from_secs(ttl_secs)).build()
        }

        Self {
            db,
            pricing: cache(ttl_secs),
            subscriptions: cache(ttl_secs),
            groups: cache(ttl_secs),
        }
    }

    #[instrument(skip_all)]
    pub async fn pricing(&self) -> Arc<Vec<PricingItem>> {
        let db = self.db.clone();
        load_or_empty(&self.pricing, "pricing", async move { db.load_pricing().await }).await
    }

    #[instrument(skip_all)]
    pub async fn subscriptions(&self) -> Arc<Vec<SubscriptionRecord>> {
        let db = self.db.clone();
        load_or_empty(&self.subscriptions, "subscriptions", async move { db.load_subscriptions().await }).await
    }

    #[instrument(skip_all)]
    pub async fn groups(&self) -> Arc<Vec<GroupAccount>> {
        let db = self.db.clone();
        load_or_empty(&self.groups, "groups", async move { db.load_groups().await }).await
    }

    /// Drops cached subscriptions after a write.
    pub async fn invalidate_subscriptions(&self) {
        self.subscriptions.invalidate(&()).await;
    }
}

async fn load_or_empty<T, F>(cache: &Cache<(), Arc<Vec<T>>>, name: &str, load: F) -> Arc<Vec<T>>
where
    T: Send + Sync + 'static,
    F: Future<Output = Res<Vec<T>>>,
{
    match cache.try_get_with((), async move { load.await.map(Arc::new) }).await {
        Ok(items) => items,
        Err(err) => {
            error!("Error loading {name}: {err}");
            Arc::new(Vec::new())
        }
    }
}

// Tests.
