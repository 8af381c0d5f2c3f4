//! Expiry reminders (H-7 / H-5 / H-1) and their daily scheduler.

use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, instrument, warn};

pub use crate::base::types::ReminderKind;
use crate::{
    base::types::{HistoryEntry, ReminderCandidate, Res, phone, wib},
    service::{chat::ChatClient, db::DbClient, history::HistoryStore},
};

use super::templates::indonesian_date;

/// Products sold as family plans, where the reminder names the shared account.
const FAMILY_KEYWORDS: &[&str] = &["YOUTUBE", "SPOTIFY", "CANVA", "MICROSOFT", "APPLE MUSIC"];

/// Outcome of one reminder run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub kind: ReminderKind,
    pub candidates: usize,
    pub sent: usize,
    pub cleared: u64,
}

/// The reminder text for a candidate, or `None` for kinds that send nothing.
pub fn reminder_message(candidate: &ReminderCandidate, kind: ReminderKind) -> Option<String> {
    let nama = if candidate.nama.trim().is_empty() { "kak" } else { candidate.nama.trim() };
    let produk = if candidate.produk.trim().is_empty() { "subscription" } else { candidate.produk.trim() };

    let slot_info = candidate.slot.as_deref().filter(|slot| !slot.is_empty()).map(|slot| format!(" (Slot {slot})")).unwrap_or_default();

    let is_family = FAMILY_KEYWORDS.iter().any(|keyword| produk.to_uppercase().contains(keyword));
    let email_info = candidate
        .group_email
        .as_deref()
        .filter(|email| is_family && !email.is_empty())
        .map(|email| format!(" yg akun _{email}_"))
        .unwrap_or_default();

    match kind {
        ReminderKind::ClearPaid => None,
        ReminderKind::FirstNotice => Some(format!(
            "Punteun ka *{nama}*,\nmau reminder utk subscription *{produk}*{email_info} akan expire di tanggal *{}*{slot_info} ya ka..🙏🏻",
            indonesian_date(candidate.end_date)
        )),
        ReminderKind::FinalNotice => Some(format!(
            "Punteun ka *{nama}*,\nmau reminder kembali utk subscription *{produk}*{email_info} akan expire *besok*{slot_info} ya ka..🙏🏻\nMohon Konfirmasi nya apakah akan di perpanjang kembali ?"
        )),
    }
}

/// Runs reminder jobs against the database and the chat gateway.
#[derive(Clone)]
pub struct ReminderService {
    db: DbClient,
    chat: ChatClient,
    history: HistoryStore,
    send_delay: Duration,
}

impl ReminderService {
    pub fn new(db: DbClient, chat: ChatClient, history: HistoryStore, send_delay: Duration) -> Self {
        Self { db, chat, history, send_delay }
    }

    /// Runs one job for the given WIB date.
    #[instrument(name = "ReminderService::run", skip(self))]
    pub async fn run(&self, kind: ReminderKind, today: chrono::NaiveDate) -> Res<ReminderReport> {
        let target = today + chrono::Duration::days(kind.days_before_expiry());

        if kind == ReminderKind::ClearPaid {
            let cleared = self.db.clear_paid_expiring(target).await?;
            info!("Cleared PAID status for {cleared} subscription(s) expiring {target}.");

            return Ok(ReminderReport { kind, candidates: 0, sent: 0, cleared });
        }

        let candidates = self.db.expiring_subscriptions(target).await?;
        info!("Found {} subscription(s) expiring {target}.", candidates.len());

        let mut sent = 0;

        for candidate in &candidates {
            let already_reminded = match kind {
                ReminderKind::FirstNotice => candidate.reminded_h5,
                _ => candidate.reminded_h1,
            };

            if candidate.wa_number.trim().is_empty() {
                warn!("Skipping {}: no WhatsApp number.", candidate.nama);
                continue;
            }

            if already_reminded {
                info!("Skipping {}: already reminded.", candidate.nama);
                continue;
            }

            let Some(message) = reminder_message(candidate, kind) else {
                continue;
            };

            let number = phone::normalize(&candidate.wa_number);

            match self.chat.send_message(&number, &message).await {
                Ok(()) => {
                    if let Err(err) = self.db.mark_reminded(candidate.subscription_id, kind).await {
                        error!("Failed to mark subscription {} as reminded: {err}", candidate.subscription_id);
                    }

                    // Kept in history so the customer's reply has context.
                    self.history.record(&number, &[HistoryEntry::assistant(message)]).await;
                    sent += 1;
                }
                Err(err) => error!("Failed to send {kind} reminder to {number}: {err}"),
            }

            if !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
        }

        info!("{kind} complete: sent {sent}/{} reminder(s).", candidates.len());

        Ok(ReminderReport { kind, candidates: candidates.len(), sent, cleared: 0 })
    }
}

/// Starts one daily task per reminder kind, each firing at its WIB wall-clock time.
pub fn spawn_scheduler(service: ReminderService) -> Vec<JoinHandle<()>> {
    ReminderKind::ALL
        .into_iter()
        .map(|kind| {
            let service = service.clone();
            let span = info_span!("reminder_scheduler", %kind);

            tokio::spawn(
                async move {
                    loop {
                        let delay = until_next_fire(wib::now(), kind.fire_time());
                        info!("Next {kind} run in {} minute(s).", delay.as_secs() / 60);
                        tokio::time::sleep(delay).await;

                        if let Err(err) = service.run(kind, wib::today()).await {
                            error!("Error while running {kind} reminders: {err}");
                        }
                    }
                }
                .instrument(span),
            )
        })
        .collect()
}

/// Time from `now` until the next `(hour, minute)`, tomorrow if it already passed today.
pub fn until_next_fire(now: NaiveDateTime, (hour, minute): (u32, u32)) -> Duration {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
    let mut next = now.date().and_time(time);

    if next <= now {
        next += chrono::Duration::days(1);
    }

    (next - now).to_std().unwrap_or_default()
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn candidate(produk: &str) -> ReminderCandidate {
        ReminderCandidate {
            subscription_id: 1,
            nama: "Budi".to_string(),
            wa_number: "0812345".to_string(),
            produk: produk.to_string(),
            end_date: NaiveDate::from_ymd_opt(2026, 8, 17).unwrap(),
            slot: Some("2".to_string()),
            group_email: Some("family@mail.test".to_string()),
            reminded_h5: false,
            reminded_h1: false,
        }
    }

    #[test]
    fn first_notice_mentions_date_and_family_account() {
        let message = reminder_message(&candidate("YouTube Premium"), ReminderKind::FirstNotice).unwrap();

        assert_eq!(
            message,
            "Punteun ka *Budi*,\nmau reminder utk subscription *YouTube Premium* yg akun _family@mail.test_ akan expire di tanggal *17 Agustus 2026* (Slot 2) ya ka..🙏🏻"
        );
    }

    #[test]
    fn final_notice_skips_email_for_shared_products() {
        let message = reminder_message(&candidate("Netflix Premium"), ReminderKind::FinalNotice).unwrap();

        assert!(message.starts_with("Punteun ka *Budi*,\nmau reminder kembali utk subscription *Netflix Premium* akan expire *besok* (Slot 2)"));
        assert!(message.ends_with("apakah akan di perpanjang kembali ?"));
        assert_eq!(reminder_message(&candidate("Netflix"), ReminderKind::ClearPaid), None);
    }

    #[test]
    fn next_fire_rolls_over_to_tomorrow() {
        let at = |h, m| NaiveDate::from_ymd_opt(2026, 1, 10).unwrap().and_hms_opt(h, m, 0).unwrap();

        assert_eq!(until_next_fire(at(9, 0), (10, 0)), Duration::from_secs(3600));
        assert_eq!(until_next_fire(at(10, 0), (10, 0)), Duration::from_secs(24 * 3600));
        assert_eq!(until_next_fire(at(16, 31), (16, 30)), Duration::from_secs(24 * 3600 - 60));
    }
}
