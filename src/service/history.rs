//! Per-phone conversation history with an in-memory fallback.

use std::time::Duration;

use moka::future::Cache;
use tracing::{instrument, warn};

use crate::{
    base::{config::Config, types::HistoryEntry},
    service::db::DbClient,
};

/// Conversation history backed by the database.
///
/// When the database is unreachable, reads and writes go to a short-lived cache instead, so a
/// customer keeps some context while the outage lasts.
#[derive(Clone)]
pub struct HistoryStore {
    db: DbClient,
    limit: i64,
    max_cached: usize,
    fallback: Cache<String, Vec<HistoryEntry>>,
}

impl HistoryStore {
    pub fn new(db: DbClient, config: &Config) -> Self {
        let fallback = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(Duration::from_secs(config.history_cache_ttl_secs))
            .build();

        Self {
            db,
            limit: config.history_limit,
            max_cached: config.history_cache_max_entries,
            fallback,
        }
    }

    /// Oldest-first history for a phone.
    #[instrument(name = "HistoryStore::load", skip(self))]
    pub async fn load(&self, phone: &str) -> Vec<HistoryEntry> {
        match self.db.conversation_history(phone, self.limit).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!("History unavailable from database, using cache: {err}");
                self.fallback.get(phone).await.unwrap_or_default()
            }
        }
    }

    /// Appends a turn; never fails.
    #[instrument(name = "HistoryStore::record", skip(self, entries))]
    pub async fn record(&self, phone: &str, entries: &[HistoryEntry]) {
        if entries.is_empty() {
            return;
        }

        if let Err(err) = self.db.append_history(phone, entries).await {
            warn!("History write failed, keeping it in cache: {err}");

            let mut cached = self.fallback.get(phone).await.unwrap_or_default();
            cached.extend_from_slice(entries);
            let overflow = cached.len().saturating_sub(self.max_cached);
            cached.drain(..overflow);

            self.fallback.insert(phone.to_string(), cached).await;
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        base::{
            config::ConfigInner,
            types::{GroupAccount, PricingItem, ReminderCandidate, ReminderKind, Res, SubscriptionRecord, Void},
        },
        service::db::GenericDbClient,
    };

    /// A database that is either healthy (in-memory) or down.
    struct MemoryDb {
        down: bool,
        rows: Mutex<Vec<HistoryEntry>>,
    }

    #[async_trait]
    impl GenericDbClient for MemoryDb {
        async fn ping(&self) -> Void {
            Ok(())
        }
        async fn ensure_schema(&self) -> Void {
            Ok(())
        }
        async fn load_pricing(&self) -> Res<Vec<PricingItem>> {
            Ok(Vec::new())
        }
        async fn load_subscriptions(&self) -> Res<Vec<SubscriptionRecord>> {
            Ok(Vec::new())
        }
        async fn load_groups(&self) -> Res<Vec<GroupAccount>> {
            Ok(Vec::new())
        }
        async fn lookup_customer_name(&self, _phone: &str) -> Res<Option<String>> {
            Ok(None)
        }
        async fn customer_subscriptions(&self, _phone: &str) -> Res<Vec<SubscriptionRecord>> {
            Ok(Vec::new())
        }
        async fn find_renewal_candidate(&self, _phone: &str, _product: &str) -> Res<Option<SubscriptionRecord>> {
            Ok(None)
        }
        async fn conversation_history(&self, _phone: &str, _limit: i64) -> Res<Vec<HistoryEntry>> {
            if self.down {
                return Err(anyhow::anyhow!("database down"));
            }
            Ok(self.rows.lock().unwrap().clone())
        }
        async fn append_history(&self, _phone: &str, entries: &[HistoryEntry]) -> Void {
            if self.down {
                return Err(anyhow::anyhow!("database down"));
            }
            self.rows.lock().unwrap().extend_from_slice(entries);
            Ok(())
        }
        async fn extend_subscription(&self, _id: i64, _new_end: NaiveDate) -> Void {
            Ok(())
        }
        async fn expiring_subscriptions(&self, _date: NaiveDate) -> Res<Vec<ReminderCandidate>> {
            Ok(Vec::new())
        }
        async fn mark_reminded(&self, _id: i64, _kind: ReminderKind) -> Void {
            Ok(())
        }
        async fn clear_paid_expiring(&self, _date: NaiveDate) -> Res<u64> {
            Ok(0)
        }
    }

    fn store(down: bool) -> HistoryStore {
        let config = Config {
            inner: Arc::new(ConfigInner {
                history_limit: 20,
                history_cache_ttl_secs: 60,
                history_cache_max_entries: 3,
                ..Default::default()
            }),
        };
        let db = DbClient::new(Arc::new(MemoryDb { down, rows: Mutex::new(Vec::new()) }));

        HistoryStore::new(db, &config)
    }

    #[tokio::test]
    async fn healthy_database_round_trips() {
        let history = store(false);

        history.record("628111", &[HistoryEntry::user("halo"), HistoryEntry::assistant("hai")]).await;

        assert_eq!(history.load("628111").await, vec![HistoryEntry::user("halo"), HistoryEntry::assistant("hai")]);
    }

    #[tokio::test]
    async fn outage_falls_back_to_capped_cache() {
        let history = store(true);

        history.record("628111", &[HistoryEntry::user("1"), HistoryEntry::assistant("2")]).await;
        history.record("628111", &[HistoryEntry::user("3"), HistoryEntry::assistant("4")]).await;

        let loaded = history.load("628111").await;
        assert_eq!(loaded, vec![HistoryEntry::assistant("2"), HistoryEntry::user("3"), HistoryEntry::assistant("4")]);
        assert!(history.load("628222").await.is_empty());
    }
}
