//! Postgres-backed database client.
//!
//! All business tables live in one Postgres database shared with the admin tooling, so
//! the schema here only adds what the bot needs and never drops anything.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row,
    postgres::{PgPoolOptions, PgRow},
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{GroupAccount, HistoryEntry, HistoryRole, PricingItem, ReminderCandidate, ReminderKind, Res, SubscriptionRecord, Void, phone},
};

use super::{DbClient, GenericDbClient};

// Extra methods on `DbClient` applied by the postgres implementation.

impl DbClient {
    /// Connects to Postgres and makes sure the schema is in place.
    pub async fn postgres(config: &Config) -> Res<Self> {
        let client = PostgresDbClient::connect(config).await?;
        client.ensure_schema().await?;

        Ok(Self { inner: Arc::new(client) })
    }
}

// Statements.

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS pricing (
        id BIGSERIAL PRIMARY KEY,
        product VARCHAR(150) NOT NULL,
        duration VARCHAR(50) NOT NULL,
        price NUMERIC NOT NULL DEFAULT 0,
        description TEXT,
        is_active BOOLEAN NOT NULL DEFAULT true
    )"#,
    r#"CREATE TABLE IF NOT EXISTS customer_master (
        id BIGSERIAL PRIMARY KEY,
        nama VARCHAR(150),
        wa_pelanggan VARCHAR(30)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS customer_subscriptions (
        id BIGSERIAL PRIMARY KEY,
        nama VARCHAR(150),
        wa_pelanggan VARCHAR(30),
        email VARCHAR(150),
        produk VARCHAR(150),
        subscription VARCHAR(150),
        profil_pin VARCHAR(100),
        member_since DATE,
        start_membership DATE,
        end_membership DATE,
        status_payment VARCHAR(30),
        active BOOLEAN NOT NULL DEFAULT true,
        updated_at TIMESTAMP DEFAULT NOW()
    )"#,
    "ALTER TABLE customer_subscriptions ADD COLUMN IF NOT EXISTS slot VARCHAR(20)",
    "ALTER TABLE customer_subscriptions ADD COLUMN IF NOT EXISTS reminded_h5_at TIMESTAMP",
    "ALTER TABLE customer_subscriptions ADD COLUMN IF NOT EXISTS reminded_h1_at TIMESTAMP",
    r#"CREATE TABLE IF NOT EXISTS groups (
        id BIGSERIAL PRIMARY KEY,
        subscription VARCHAR(150) NOT NULL,
        code VARCHAR(50),
        email VARCHAR(150),
        password VARCHAR(150),
        max_slots INTEGER DEFAULT 5,
        status VARCHAR(30) DEFAULT 'active'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS conversations (
        id BIGSERIAL PRIMARY KEY,
        wa_number VARCHAR(30) NOT NULL,
        message_type VARCHAR(20) NOT NULL,
        message_text TEXT NOT NULL,
        is_handled_by_bot BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMP NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS conversations_wa_number_idx ON conversations (wa_number, created_at DESC)",
];

const SUBSCRIPTION_COLUMNS: &str = r#"
    id::BIGINT AS id,
    COALESCE(nama, '') AS nama,
    COALESCE(wa_pelanggan, '') AS wa_pelanggan,
    COALESCE(email, '') AS email,
    COALESCE(produk, '') AS produk,
    COALESCE(subscription, '') AS subscription,
    COALESCE(profil_pin, '') AS profil_pin,
    member_since::DATE AS member_since,
    start_membership::DATE AS start_membership,
    end_membership::DATE AS end_membership,
    COALESCE(status_payment, '') AS status_payment,
    slot
"#;

/// Stored numbers normalized the way `phone::normalize` does it, compared with a normalized `$1`.
const PHONE_MATCH: &str = "REGEXP_REPLACE(REGEXP_REPLACE(wa_pelanggan, '[^0-9]', '', 'g'), '^0', '62') = $1";

// Specific implementations.

/// Postgres database client implementation.
#[derive(Clone)]
pub struct PostgresDbClient {
    pool: PgPool,
}

impl PostgresDbClient {
    /// Opens the connection pool.
    #[instrument(name = "PostgresDbClient::connect", skip_all)]
    pub async fn connect(config: &Config) -> Res<Self> {
        let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;

        info!("Connected to Postgres.");

        Ok(Self { pool })
    }
}

#[async_trait]
impl GenericDbClient for PostgresDbClient {
    #[instrument(skip_all)]
    async fn ping(&self) -> Void {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn ensure_schema(&self) -> Void {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Database schema checked.");

        Ok(())
    }

    #[instrument(skip_all)]
    async fn load_pricing(&self) -> Res<Vec<PricingItem>> {
        let rows = sqlx::query(
            "SELECT COALESCE(product, '') AS product, COALESCE(duration, '') AS duration, ROUND(price)::BIGINT AS price, description
             FROM pricing
             WHERE is_active = true
             ORDER BY product, duration",
        )
        .fetch_all(&self.pool)
        .await?;

        let pricing = rows
            .iter()
            .map(|row| -> Res<PricingItem> {
                let description: Option<String> = row.try_get("description")?;
                Ok(PricingItem::from_row(row.try_get("product")?, row.try_get("duration")?, row.try_get("price")?, description.as_deref()))
            })
            .collect::<Res<Vec<_>>>()?;

        info!("Loaded {} pricing items.", pricing.len());

        Ok(pricing)
    }

    #[instrument(skip_all)]
    async fn load_subscriptions(&self) -> Res<Vec<SubscriptionRecord>> {
        let rows = sqlx::query(&format!("SELECT {SUBSCRIPTION_COLUMNS} FROM customer_subscriptions ORDER BY nama"))
            .fetch_all(&self.pool)
            .await?;

        let subscriptions = rows.iter().map(subscription_from_row).collect::<Res<Vec<_>>>()?;

        info!("Loaded {} subscription records.", subscriptions.len());

        Ok(subscriptions)
    }

    #[instrument(skip_all)]
    async fn load_groups(&self) -> Res<Vec<GroupAccount>> {
        let rows = sqlx::query(
            "SELECT subscription, COALESCE(code, '') AS code, COALESCE(email, '') AS email, COALESCE(password, '') AS password,
                    COALESCE(max_slots, 5)::BIGINT AS max_slots
             FROM groups
             WHERE subscription IS NOT NULL AND COALESCE(LOWER(status), 'active') != 'inactive'
             ORDER BY subscription",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = rows
            .iter()
            .map(|row| -> Res<GroupAccount> {
                Ok(GroupAccount {
                    subscription: row.try_get("subscription")?,
                    code: row.try_get("code")?,
                    email: row.try_get("email")?,
                    password: row.try_get("password")?,
                    max_slots: row.try_get("max_slots")?,
                })
            })
            .collect::<Res<Vec<_>>>()?;

        info!("Loaded {} group accounts.", groups.len());

        Ok(groups)
    }

    #[instrument(skip(self))]
    async fn lookup_customer_name(&self, phone: &str) -> Res<Option<String>> {
        let name = sqlx::query_scalar::<_, Option<String>>(&format!(
            "SELECT nama FROM customer_master WHERE {PHONE_MATCH}
             UNION ALL
             SELECT nama FROM customer_subscriptions WHERE {PHONE_MATCH}
             LIMIT 1"
        ))
        .bind(phone::normalize(phone))
        .fetch_optional(&self.pool)
        .await?;

        Ok(name.flatten().filter(|name| !name.trim().is_empty()))
    }

    #[instrument(skip(self))]
    async fn customer_subscriptions(&self, phone: &str) -> Res<Vec<SubscriptionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM customer_subscriptions
             WHERE {PHONE_MATCH} AND UPPER(status_payment) IN ('ACTIVE', 'PAID', 'PENDING')
             ORDER BY end_membership DESC NULLS LAST"
        ))
        .bind(phone::normalize(phone))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(subscription_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn find_renewal_candidate(&self, phone: &str, product: &str) -> Res<Option<SubscriptionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM customer_subscriptions
             WHERE {PHONE_MATCH} AND LOWER(produk) LIKE LOWER($2) AND UPPER(status_payment) IN ('ACTIVE', 'PAID')
             ORDER BY end_membership ASC NULLS LAST
             LIMIT 1"
        ))
        .bind(phone::normalize(phone))
        .bind(format!("%{product}%"))
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(subscription_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn conversation_history(&self, phone: &str, limit: i64) -> Res<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT message_type, message_text FROM conversations
             WHERE wa_number = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut history = rows
            .iter()
            .map(|row| -> Res<HistoryEntry> {
                let kind: String = row.try_get("message_type")?;
                let role = if kind == "incoming" { HistoryRole::User } else { HistoryRole::Assistant };

                Ok(HistoryEntry { role, content: row.try_get("message_text")? })
            })
            .collect::<Res<Vec<_>>>()?;

        history.reverse();

        Ok(history)
    }

    #[instrument(skip(self, entries))]
    async fn append_history(&self, phone: &str, entries: &[HistoryEntry]) -> Void {
        if entries.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO conversations (wa_number, message_type, message_text, is_handled_by_bot) ");

        builder.push_values(entries, |mut row, entry| {
            let (kind, by_bot) = match entry.role {
                HistoryRole::User => ("incoming", false),
                HistoryRole::Assistant => ("outgoing", true),
            };

            row.push_bind(phone.to_string()).push_bind(kind).push_bind(entry.content.clone()).push_bind(by_bot);
        });

        builder.build().execute(&self.pool).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn extend_subscription(&self, id: i64, new_end: NaiveDate) -> Void {
        let result = sqlx::query("UPDATE customer_subscriptions SET end_membership = $2, status_payment = 'PAID', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(new_end)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("Subscription {id} not found."));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn expiring_subscriptions(&self, date: NaiveDate) -> Res<Vec<ReminderCandidate>> {
        let rows = sqlx::query(
            "SELECT cs.id::BIGINT AS id,
                    COALESCE(cs.nama, '') AS nama,
                    COALESCE(cs.wa_pelanggan, '') AS wa_pelanggan,
                    COALESCE(cs.produk, '') AS produk,
                    cs.end_membership::DATE AS end_membership,
                    cs.slot,
                    g.email AS group_email,
                    cs.reminded_h5_at IS NOT NULL AS reminded_h5,
                    cs.reminded_h1_at IS NOT NULL AS reminded_h1
             FROM customer_subscriptions cs
             LEFT JOIN groups g ON UPPER(g.subscription) = UPPER(cs.subscription)
             WHERE cs.active = true AND cs.end_membership::DATE = $1
             ORDER BY cs.nama",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Res<ReminderCandidate> {
                Ok(ReminderCandidate {
                    subscription_id: row.try_get("id")?,
                    nama: row.try_get("nama")?,
                    wa_number: row.try_get("wa_pelanggan")?,
                    produk: row.try_get("produk")?,
                    end_date: row.try_get("end_membership")?,
                    slot: row.try_get("slot")?,
                    group_email: row.try_get("group_email")?,
                    reminded_h5: row.try_get("reminded_h5")?,
                    reminded_h1: row.try_get("reminded_h1")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn mark_reminded(&self, id: i64, kind: ReminderKind) -> Void {
        let statement = match kind {
            ReminderKind::FirstNotice => "UPDATE customer_subscriptions SET reminded_h5_at = NOW() WHERE id = $1",
            ReminderKind::FinalNotice => "UPDATE customer_subscriptions SET reminded_h1_at = NOW() WHERE id = $1",
            ReminderKind::ClearPaid => return Err(anyhow::anyhow!("The H-7 job does not send reminders.")),
        };

        sqlx::query(statement).bind(id).execute(&self.pool).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_paid_expiring(&self, date: NaiveDate) -> Res<u64> {
        let result = sqlx::query(
            "UPDATE customer_subscriptions
             SET status_payment = NULL, reminded_h5_at = NULL, reminded_h1_at = NULL, updated_at = NOW()
             WHERE active = true AND end_membership::DATE = $1 AND UPPER(status_payment) = 'PAID'",
        )
        .bind(date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// Helpers.

fn subscription_from_row(row: &PgRow) -> Res<SubscriptionRecord> {
    Ok(SubscriptionRecord {
        id: row.try_get("id")?,
        nama: row.try_get("nama")?,
        wa_pelanggan: row.try_get("wa_pelanggan")?,
        email: row.try_get("email")?,
        produk: row.try_get("produk")?,
        subscription: row.try_get("subscription")?,
        profil_pin: row.try_get("profil_pin")?,
        member_since: row.try_get("member_since")?,
        start_membership: row.try_get("start_membership")?,
        end_membership: row.try_get("end_membership")?,
        status_payment: row.try_get("status_payment")?,
        slot: row.try_get("slot")?,
    })
}

// Tests.
