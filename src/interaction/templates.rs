//! Fixed customer-facing replies.

use chrono::{Datelike, NaiveDate};

use crate::base::types::{PricingItem, SubscriptionRecord};

pub const MINIMAL_REPLY: &str = "Terima kasih sudah menghubungi! 👋";

pub const LLM_APOLOGY: &str = "Maaf, saat ini sistem sedang mengalami gangguan. Silakan coba lagi.";

pub const UNREADABLE_IMAGE: &str = "[Gambar diterima, tapi tidak bisa dibaca]";

const MONTHS: [&str; 12] = ["Januari", "Februari", "Maret", "April", "Mei", "Juni", "Juli", "Agustus", "September", "Oktober", "November", "Desember"];

// Formatting helpers.

/// `55000` as `55.000`.
pub fn rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if amount < 0 { format!("-{grouped}") } else { grouped }
}

/// `5 Januari 2026`.
pub fn indonesian_date(date: NaiveDate) -> String {
    format!("{} {} {}", date.day(), MONTHS[date.month0() as usize], date.year())
}

/// First word of a name, or `ka` when there is none.
pub fn first_name(full_name: Option<&str>) -> String {
    full_name.and_then(|name| name.split_whitespace().next()).unwrap_or("ka").to_string()
}

// Replies.

pub fn category_overview(customer_name: Option<&str>) -> String {
    let greeting = match customer_name {
        Some(name) => format!("Ka {name}"),
        None => "ka".to_string(),
    };

    format!(
        "Halo {greeting}! 👋\n\n\
         Kita punya produk digital di kategori:\n\n\
         🎬 *Streaming:* Netflix, YouTube Premium, Disney+ Hotstar\n\
         🎵 *Music:* Spotify Premium, Apple Music\n\
         💼 *Productivity:* Microsoft 365, Canva Pro, Adobe\n\
         ☁️ *Cloud Storage:* Google One, iCloud+\n\n\
         Mau tanya tentang produk yang mana? 😊"
    )
}

/// Price list built straight from the pricing table, with an optional renewal nudge on top.
pub fn pricing_list(customer_name: Option<&str>, items: &[PricingItem], renewal_nudge: Option<&str>) -> String {
    if items.is_empty() {
        return "Maaf, produk yang ditanyakan tidak tersedia atau tidak ditemukan.".to_string();
    }

    let mut response = String::new();

    if let Some(nudge) = renewal_nudge {
        response.push_str(nudge);
        response.push_str("\n\n\n\n");
    }

    match customer_name {
        Some(name) => response.push_str(&format!("Ka {name}, berikut harga produk yang tersedia:\n\n")),
        None => response.push_str("Halo! Berikut harga produk yang tersedia:\n\n"),
    }

    // Group by product, keeping first-seen order.
    let mut grouped: Vec<(&str, Vec<&PricingItem>)> = Vec::new();
    for item in items {
        match grouped.iter_mut().find(|(product, _)| *product == item.product) {
            Some((_, entries)) => entries.push(item),
            None => grouped.push((&item.product, vec![item])),
        }
    }

    let with_headers = grouped.len() > 1;

    for (product, entries) in grouped {
        if with_headers {
            response.push_str(&format!("*{product}:*\n"));
        }

        for item in entries {
            if item.has_promo() {
                response.push_str(&format!("- {}: ~Rp {}~ *Rp {}*\n", item.duration, rupiah(item.price_normal), rupiah(item.price)));
            } else {
                response.push_str(&format!("- {}: *Rp {}*\n", item.duration, rupiah(item.price)));
            }
        }

        if with_headers {
            response.push('\n');
        }
    }

    response.push_str("\nMau order atau info lebih lanjut? Hubungi admin ya! 😊");

    response
}

pub fn deferred(name: &str) -> String {
    format!("Baik {name}, saya tunggu konfirmasi Anda nanti ya! 😊\n\nHubungi saya kapan saja jika sudah siap perpanjang. ✨")
}

pub fn new_subscription(sender_name: &str) -> String {
    format!(
        "Halo {sender_name}! 👋\n\n\
         Terima kasih sudah berminat berlangganan. Tim admin kami akan segera memproses permintaan Anda.\n\n\
         Mohon tunggu sebentar ya! 🙏"
    )
}

pub fn payment_proof_received(name: &str, details: &str) -> String {
    format!(
        "Terima kasih {name}! 🙏\n\n\
         Bukti transfer Anda sudah diterima:\n\n\
         {details}\n\n\
         Admin akan segera verifikasi dan mengaktifkan langganan Anda.\n\
         Mohon tunggu konfirmasi dalam beberapa saat ya! ⏳"
    )
}

/// The text the rest of the pipeline sees for an image.
pub fn media_text(caption: &str, extracted: &str) -> String {
    let caption = caption.trim();

    if caption.is_empty() {
        format!("[Gambar dikirim tanpa caption]\n\nText dari gambar:\n{extracted}")
    } else {
        format!("[Gambar dikirim dengan caption: \"{caption}\"]\n\nText dari gambar:\n{extracted}")
    }
}

/// Listing of a customer's subscriptions with a status per row.
pub fn subscription_list(subscriptions: &[SubscriptionRecord], today: NaiveDate) -> String {
    let mut list = "📋 *Langganan Anda:*\n\n".to_string();

    for subscription in subscriptions {
        let days_left = subscription.end_membership.map(|end| (end - today).num_days());

        let (emoji, status) = match days_left {
            _ if subscription.is_pending() => ("⏳", "MENUNGGU PEMBAYARAN".to_string()),
            Some(days) if days > 0 && days <= 7 => ("⚠️", format!("EXPIRED {days} HARI LAGI")),
            Some(days) if days <= 0 => ("❌", "EXPIRED".to_string()),
            _ => ("✅", "AKTIF".to_string()),
        };

        let expiry = subscription.end_membership.map(|end| end.format("%-d/%-m/%Y").to_string()).unwrap_or_else(|| "-".to_string());

        list.push_str(&format!("{emoji} *{}*\n", subscription.produk));
        list.push_str(&format!("   Status: {status}\n"));
        list.push_str(&format!("   Expired: {expiry}"));
        if let Some(days) = days_left.filter(|days| *days > 0 && *days <= 7) {
            list.push_str(&format!(" ({days} hari lagi)"));
        }
        list.push('\n');
        if let Some(slot) = subscription.slot.as_deref().filter(|slot| !slot.is_empty()) {
            list.push_str(&format!("   Slot: {slot}/5\n"));
        }
        list.push('\n');
    }

    list.push_str("Mau info lebih lanjut atau perpanjang? Tanya aja! 😊");

    list
}

pub fn no_subscriptions(name: &str) -> String {
    format!("Maaf {name}, Anda belum punya langganan apapun. 😔\n\nMau berlangganan produk digital? Tanya-tanya aja produk apa yang tersedia! 🎯")
}

/// Reminder prepended to a price list when the customer's subscription is about to run out.
pub fn renewal_nudge(first_name: &str, product: &str, days_left: i64) -> Option<String> {
    match days_left {
        days if !(0..=7).contains(&days) => None,
        0 => Some(format!("⚠️ *{first_name}*, langganan {product}-mu sudah expired! Mau perpanjang?")),
        1 => Some(format!("⚠️ *{first_name}*, langganan {product}-mu akan expired besok! Mau perpanjang sekarang?")),
        days => Some(format!("💡 *{first_name}*, langganan {product}-mu akan expired {days} hari lagi. Mungkin mau perpanjang sekalian?")),
    }
}

pub fn availability_reply(display_name: &str, available: bool) -> String {
    if available {
        format!("✅ *{display_name}* masih tersedia!\n\nMinat perpanjang atau berlangganan baru? Ketik \"iya\" atau hubungi admin! 🎯")
    } else {
        format!("❌ Maaf, *{display_name}* saat ini *penuh/tidak tersedia* 🙏\n\nTunggu slot terbuka atau tanya admin untuk alternatif ya!")
    }
}

// Tests.
