//! Manual payment confirmation by an admin.

use std::sync::OnceLock;

use chrono::{Months, NaiveDate};
use regex::Regex;
use tracing::{info, instrument};

use crate::{
    base::types::{GroupAccount, OutgoingMessage, Res, SubscriptionRecord, phone},
    service::{catalog::Catalog, db::DbClient},
};

use super::commands::{PaymentCommand, product_code};

/// Everything needed to apply a confirmed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPlan {
    pub subscription_id: i64,
    pub is_new: bool,
    pub new_end: NaiveDate,
    pub customer_jid: String,
    pub customer_message: String,
    pub admin_message: String,
}

/// Works out which subscription a payment is for and what everybody gets told.
///
/// The error is the reply for the admin.
pub fn plan_payment(command: &PaymentCommand, subscriptions: &[SubscriptionRecord], groups: &[GroupAccount], today: NaiveDate) -> Result<PaymentPlan, String> {
    let Some(code) = product_code(&command.code) else {
        return Err(format!("❌ Product code tidak valid: {}\n\nValid codes: netflix-nontv-3m, netflix-tv-6m, dll.", command.code));
    };

    let wanted = phone::normalize(&command.phone);
    let customer_rows: Vec<&SubscriptionRecord> = subscriptions
        .iter()
        .filter(|subscription| {
            let candidate = phone::normalize(&subscription.wa_pelanggan);
            !candidate.is_empty() && !wanted.is_empty() && (candidate.contains(&wanted) || wanted.contains(&candidate))
        })
        .collect();

    if customer_rows.is_empty() {
        return Err(format!("❌ Customer tidak ditemukan dengan nomor: {}", command.phone));
    }

    let product_type = code.product.split(' ').next().unwrap_or(code.product).to_uppercase();
    let mut matches: Vec<&SubscriptionRecord> = customer_rows.iter().copied().filter(|row| row.produk.to_uppercase().contains(&product_type)).collect();

    if matches.is_empty() {
        let owned = customer_rows.iter().map(|row| row.produk.as_str()).filter(|produk| !produk.is_empty()).collect::<Vec<_>>().join(", ");
        return Err(format!("❌ Customer {} tidak punya langganan {product_type}.\n\nLangganan yang ada: {owned}", command.phone));
    }

    let customer = match matches.iter().find(|row| !row.is_paid()) {
        Some(unpaid) => *unpaid,
        None => {
            matches.sort_by_key(|row| row.end_membership.unwrap_or(today));
            matches[0]
        }
    };

    let is_new = match (customer.member_since, customer.start_membership) {
        (Some(since), Some(start)) => since == start,
        _ => true,
    };

    let current_end = customer.end_membership.unwrap_or(today);
    let new_end = current_end
        .checked_add_months(Months::new(code.months))
        .ok_or_else(|| format!("❌ Tanggal expired tidak valid untuk {}", customer.produk))?;

    let group = groups.iter().find(|group| group.subscription == customer.subscription);
    let subscription_name = if customer.subscription.is_empty() { code.product } else { customer.subscription.as_str() };

    let notice = ActivationNotice {
        produk: if customer.produk.is_empty() { code.product } else { customer.produk.as_str() },
        subscription_name,
        group_email: group.map(|group| group.email.as_str()).filter(|email| !email.is_empty()).unwrap_or("N/A"),
        group_password: group.map(|group| group.password.as_str()).filter(|password| !password.is_empty()).unwrap_or("N/A"),
        customer_email: if customer.email.is_empty() { "N/A" } else { customer.email.as_str() },
        profil_pin: &customer.profil_pin,
        action_word: if is_new { "Subscription" } else { "Extended" },
        duration: duration_label(code.duration),
        exp_date: new_end.format("%-d %b %Y").to_string(),
    };

    let admin_message = format!(
        "✅ Berhasil {action} *{nama}* ({wa})\n\n\
         Subscription: {subscription_name}\n\
         Produk: {product} - {duration}\n\
         {old_label}: {old}\n\
         New Exp: {new}\n\
         ID: {id}",
        action = if is_new { "activate" } else { "extend" },
        nama = customer.nama,
        wa = customer.wa_pelanggan,
        product = code.product,
        duration = code.duration,
        old_label = if is_new { "Start Date" } else { "Old Exp" },
        old = customer.end_membership.map(|date| date.format("%d/%m/%Y").to_string()).unwrap_or_else(|| "N/A".to_string()),
        new = new_end.format("%d/%m/%Y"),
        id = customer.id,
    );

    Ok(PaymentPlan {
        subscription_id: customer.id,
        is_new,
        new_end,
        customer_jid: phone::to_jid(&phone::normalize(&customer.wa_pelanggan)),
        customer_message: notice.render(),
        admin_message,
    })
}

/// Persists the new expiry and returns the customer and admin notifications.
#[instrument(skip_all, fields(subscription_id = plan.subscription_id))]
pub async fn apply_payment(plan: &PaymentPlan, admin_chat: &str, db: &DbClient, catalog: &Catalog) -> Res<Vec<OutgoingMessage>> {
    db.extend_subscription(plan.subscription_id, plan.new_end).await?;
    catalog.invalidate_subscriptions().await;

    info!("Subscription {} now ends {} ({}).", plan.subscription_id, plan.new_end, if plan.is_new { "new" } else { "renewal" });

    Ok(vec![
        OutgoingMessage::new(&plan.customer_jid, &plan.customer_message),
        OutgoingMessage::new(admin_chat, &plan.admin_message),
    ])
}

// Helpers.

struct ActivationNotice<'a> {
    produk: &'a str,
    subscription_name: &'a str,
    group_email: &'a str,
    group_password: &'a str,
    customer_email: &'a str,
    profil_pin: &'a str,
    action_word: &'a str,
    duration: &'a str,
    exp_date: String,
}

impl ActivationNotice<'_> {
    /// The account details message, shaped by product family.
    fn render(&self) -> String {
        let produk = self.produk.to_uppercase();
        let (profil, pin) = parse_profil_pin(self.profil_pin);
        let footer = format!("{} *{}*\nExp Date : *{}*", self.action_word, self.duration, self.exp_date);
        let name = self.subscription_name;

        if produk.contains("SPOTIFY") {
            // Spotify groups keep the profile name in the password column.
            return format!("*🎧{name}*\n\nUser : *{}*\n\n{footer}", self.group_password);
        }

        if produk.contains("DISNEY") {
            return format!("*🏰{name}*\n\nLogin Number : *{}*\n_OTP by Request_\n\nProfil : *{profil}*\n\n{footer}", self.group_email);
        }

        if produk.contains("NETFLIX") {
            let group = name.to_uppercase();
            let (emoji, account_type) = if group.contains("SHARED") {
                ("✅📺", "SHARED TV")
            } else if group.contains("EXCLUSIVE") {
                ("✅📺", "TV EXCLUSIVE")
            } else {
                ("❌📺", "NON TV")
            };

            return format!(
                "*{emoji}{name}*\n{emoji} *({account_type})*\n\nUsername : {}\nPassword : {}\n\nProfil : *{profil}*\nPIN : {pin}\n\n{footer}",
                self.group_email, self.group_password
            );
        }

        if produk.contains("HBO") || produk.contains("PRIME") {
            let emoji = if produk.contains("HBO") { "🎭" } else { "📺" };
            return format!(
                "*{name}*\n{emoji} *(Sharing)*\n\nUsername : {}\nPassword : {}\n\nProfil : *{profil}*\nPIN : {pin}\n\n{footer}",
                self.group_email, self.group_password
            );
        }

        let emoji = family_emoji(&produk);
        format!("*{emoji}{name}*\n\nuser : {}\n\n{footer}", self.customer_email)
    }
}

fn family_emoji(produk: &str) -> &'static str {
    [("YOUTUBE", "🎬"), ("CANVA", "🎨"), ("MICROSOFT", "💼"), ("APPLE", "🎵"), ("CAPCUT", "✂️")]
        .iter()
        .find(|(key, _)| produk.contains(key))
        .map(|(_, emoji)| *emoji)
        .unwrap_or("📱")
}

fn duration_label(duration: &str) -> &str {
    match duration {
        "1 Bulan" => "A Month",
        "3 Bulan" => "3 Months",
        "6 Bulan" => "6 Months",
        "12 Bulan" => "A Year",
        other => other,
    }
}

/// Splits `"NAME 1234"` or `"NAME-1234"` into an upper-case profile and a PIN.
fn parse_profil_pin(text: &str) -> (String, String) {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^(.+?)\s+(\d{4,5})$").expect("static regex"));

    let text = text.trim();
    if text.is_empty() {
        return ("N/A".to_string(), "N/A".to_string());
    }

    if let Some(caps) = pattern.captures(text) {
        return (caps[1].trim().to_uppercase(), caps[2].to_string());
    }

    let parts: Vec<&str> = text.split(|c: char| c.is_whitespace() || c == '-').collect();
    if let Some((last, rest)) = parts.split_last() {
        let is_pin = (4..=5).contains(&last.len()) && last.chars().all(|c| c.is_ascii_digit());
        if !rest.is_empty() && is_pin {
            return (rest.join(" ").to_uppercase(), last.to_string());
        }
    }

    (text.to_uppercase(), "N/A".to_string())
}

// Tests.
