//! Phone numbers the bot stays silent for.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::base::types::{Res, SubscriptionRecord, Void, phone};

use super::commands::OverrideCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
struct OverrideEntry {
    phone: String,
    name: String,
}

/// File-backed override list, one normalized number per line.
#[derive(Clone)]
pub struct OverrideList {
    path: PathBuf,
    entries: Arc<RwLock<Vec<OverrideEntry>>>,
}

impl OverrideList {
    /// Reads the file (a missing file is an empty list) and resolves names.
    #[instrument(name = "OverrideList::load", skip(subscriptions))]
    pub async fn load(path: &Path, subscriptions: &[SubscriptionRecord]) -> Res<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };

        let entries: Vec<OverrideEntry> = content
            .lines()
            .map(phone::normalize)
            .filter(|digits| !digits.is_empty())
            .map(|phone| OverrideEntry { name: resolve_name(&phone, subscriptions), phone })
            .collect();

        for entry in &entries {
            info!("Override: {} ({})", entry.phone, entry.name);
        }

        Ok(Self {
            path: path.to_path_buf(),
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub async fn contains(&self, phone: &str) -> bool {
        let phone = phone::normalize(phone);
        self.entries.read().await.iter().any(|entry| entry.phone == phone)
    }

    /// Mutes a number.
    pub async fn disable(&self, raw: &str, subscriptions: &[SubscriptionRecord]) -> Res<String> {
        let phone = phone::normalize(raw);
        if phone.is_empty() {
            return Ok(format!("❌ Nomor {raw} tidak valid"));
        }

        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.iter().find(|entry| entry.phone == phone) {
            return Ok(format!("❌ Nomor {raw} sudah dalam daftar disable ({})", existing.name));
        }

        let name = resolve_name(&phone, subscriptions);
        let mut next = entries.clone();
        next.push(OverrideEntry { phone: phone.clone(), name: name.clone() });

        self.persist(&next).await?;
        *entries = next;

        info!("Number {phone} ({name}) added to override list.");

        Ok(format!("✅ Nomor {raw} ({name}) berhasil di-disable"))
    }

    /// Unmutes a number.
    pub async fn enable(&self, raw: &str) -> Res<String> {
        let phone = phone::normalize(raw);
        let mut entries = self.entries.write().await;

        let Some(position) = entries.iter().position(|entry| entry.phone == phone) else {
            return Ok(format!("❌ Nomor {raw} tidak dalam daftar disable"));
        };

        let mut next = entries.clone();
        let removed = next.remove(position);

        self.persist(&next).await?;
        *entries = next;

        info!("Number {phone} ({}) removed from override list.", removed.name);

        Ok(format!("✅ Nomor {raw} ({}) berhasil di-enable", removed.name))
    }

    pub async fn render(&self) -> String {
        let entries = self.entries.read().await;

        if entries.is_empty() {
            return "✅ Tidak ada nomor yang di-disable".to_string();
        }

        let mut response = "⛔ *Daftar Nomor Disable:*\n\n".to_string();
        for (i, entry) in entries.iter().enumerate() {
            let local = entry.phone.get(2..).unwrap_or_default();
            response.push_str(&format!("{}. +62{local} ({})\n", i + 1, entry.name));
        }

        response
    }

    /// Runs an admin command and returns the reply for the admin.
    pub async fn execute(&self, command: &OverrideCommand, subscriptions: &[SubscriptionRecord]) -> String {
        let result = match command {
            OverrideCommand::Disable { phone } => self.disable(phone, subscriptions).await,
            OverrideCommand::Enable { phone } => self.enable(phone).await,
            OverrideCommand::List => Ok(self.render().await),
        };

        result.unwrap_or_else(|err| {
            warn!("Override command failed: {err}");
            format!("❌ Error: {err}")
        })
    }

    async fn persist(&self, entries: &[OverrideEntry]) -> Void {
        let content = entries.iter().map(|entry| entry.phone.as_str()).collect::<Vec<_>>().join("\n");
        tokio::fs::write(&self.path, content).await?;

        Ok(())
    }
}

/// Name of the first subscription whose number overlaps `phone`.
fn resolve_name(phone: &str, subscriptions: &[SubscriptionRecord]) -> String {
    subscriptions
        .iter()
        .find(|subscription| {
            let candidate = phone::normalize(&subscription.wa_pelanggan);
            !candidate.is_empty() && (candidate.contains(phone) || phone.contains(&candidate))
        })
        .map(|subscription| subscription.nama.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown".to_string())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("digilife-override-{}-{name}.txt", std::process::id()))
    }

    fn customer(nama: &str, wa: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            nama: nama.to_string(),
            wa_pelanggan: wa.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let list = OverrideList::load(&temp_file("missing"), &[]).await.unwrap();

        assert!(!list.contains("628111").await);
        assert_eq!(list.render().await, "✅ Tidak ada nomor yang di-disable");
    }

    #[tokio::test]
    async fn disable_and_enable_rewrite_the_file() {
        let path = temp_file("roundtrip");
        tokio::fs::write(&path, "628111\n\n  \n").await.unwrap();

        let customers = vec![customer("Budi", "+62 812-222")];
        let list = OverrideList::load(&path, &customers).await.unwrap();
        assert!(list.contains("628111").await);

        let reply = list.disable("0812-222", &customers).await.unwrap();
        assert_eq!(reply, "✅ Nomor 0812-222 (Budi) berhasil di-disable");

        let reply = list.disable("62812222", &customers).await.unwrap();
        assert!(reply.starts_with("❌ Nomor 62812222 sudah dalam daftar disable (Budi)"));

        let reply = list.disable("0899", &customers).await.unwrap();
        assert_eq!(reply, "✅ Nomor 0899 (Unknown) berhasil di-disable");

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "628111\n62812222\n62899");

        let reply = list.enable("628111").await.unwrap();
        assert_eq!(reply, "✅ Nomor 628111 (Unknown) berhasil di-enable");
        assert!(list.enable("628111").await.unwrap().starts_with("❌"));
        assert!(list.contains("0812222").await);

        assert_eq!(list.render().await, "⛔ *Daftar Nomor Disable:*\n\n1. +62812222 (Budi)\n2. +62899 (Unknown)\n");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn failed_write_leaves_list_unchanged() {
        let path = std::env::temp_dir().join(format!("digilife-override-{}-no-such-dir", std::process::id())).join("overrides.txt");
        let list = OverrideList::load(&path, &[]).await.unwrap();

        assert!(list.disable("628444", &[]).await.is_err());
        assert!(!list.contains("628444").await);

        let reply = list.execute(&OverrideCommand::Disable { phone: "628444".to_string() }, &[]).await;
        assert!(reply.starts_with("❌ Error:"));
        assert_eq!(list.render().await, "✅ Tidak ada nomor yang di-disable");
    }

    #[tokio::test]
    async fn failed_write_keeps_enabled_number_muted() {
        let dir = std::env::temp_dir().join(format!("digilife-override-{}-vanishing", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("overrides.txt");
        tokio::fs::write(&path, "628555").await.unwrap();

        let list = OverrideList::load(&path, &[]).await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        assert!(list.enable("628555").await.is_err());
        assert!(list.contains("628555").await);
    }

    #[tokio::test]
    async fn execute_dispatches_commands() {
        let path = temp_file("execute");
        let list = OverrideList::load(&path, &[]).await.unwrap();

        let reply = list.execute(&OverrideCommand::Disable { phone: "628333".to_string() }, &[]).await;
        assert!(reply.starts_with("✅"));
        assert!(list.execute(&OverrideCommand::List, &[]).await.contains("+62333 (Unknown)"));

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
