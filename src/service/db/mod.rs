pub mod postgres;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::base::types::{GroupAccount, HistoryEntry, PricingItem, ReminderCandidate, ReminderKind, Res, SubscriptionRecord, Void};

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait covers the structured business data the bot reads (pricing, subscriptions,
/// groups) and the little it writes (conversation rows, renewals, reminder stamps).
/// Implementing this trait allows different database backends to be used with the bot.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Checks connectivity.
    async fn ping(&self) -> Void;

    /// Creates missing tables and columns.
    ///
    /// Must be idempotent; it runs on every start.
    async fn ensure_schema(&self) -> Void;

    /// Active pricing rows, ordered by product then duration.
    async fn load_pricing(&self) -> Res<Vec<PricingItem>>;

    /// Every subscription row.
    async fn load_subscriptions(&self) -> Res<Vec<SubscriptionRecord>>;

    /// Every group account that is not marked inactive.
    async fn load_groups(&self) -> Res<Vec<GroupAccount>>;

    /// The registered name for a digits-only phone number, if any.
    async fn lookup_customer_name(&self, phone: &str) -> Res<Option<String>>;

    /// The caller's `ACTIVE`, `PAID` and `PENDING` subscriptions, latest expiry first.
    async fn customer_subscriptions(&self, phone: &str) -> Res<Vec<SubscriptionRecord>>;

    /// The first active subscription whose product contains `product`, case-insensitively.
    async fn find_renewal_candidate(&self, phone: &str, product: &str) -> Res<Option<SubscriptionRecord>>;

    /// The newest `limit` conversation rows, returned oldest first.
    async fn conversation_history(&self, phone: &str, limit: i64) -> Res<Vec<HistoryEntry>>;

    /// Appends conversation rows in order.
    async fn append_history(&self, phone: &str, entries: &[HistoryEntry]) -> Void;

    /// Sets a new expiry and marks the subscription as paid.
    async fn extend_subscription(&self, id: i64, new_end: NaiveDate) -> Void;

    /// Active subscriptions expiring exactly on `date`.
    async fn expiring_subscriptions(&self, date: NaiveDate) -> Res<Vec<ReminderCandidate>>;

    /// Stamps the reminder flag for `kind`.
    async fn mark_reminded(&self, id: i64, kind: ReminderKind) -> Void;

    /// Resets `PAID` status and both reminder flags for rows expiring on `date`.
    async fn clear_paid_expiring(&self, date: NaiveDate) -> Res<u64>;
}

// Structs.

/// Database client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The database client instance.
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
