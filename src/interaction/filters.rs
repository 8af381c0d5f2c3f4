//! Keyword heuristics that run around intent classification.

use std::sync::OnceLock;

use regex::Regex;

use crate::base::types::{HistoryEntry, HistoryRole};

/// Keywords that earn an answer even for very short messages.
const SHORT_SUPPORT_KEYWORDS: &[&str] = &["otp", "error", "problem", "gagal", "tidak bisa", "masalah", "bantuan", "gimana", "apa", "caranya", "bagaimana"];

const ACKNOWLEDGMENTS: &[&str] = &["ok", "oke", "tq", "ty", "tyy", "mantap", "baik", "siap", "iya", "yyy", "yy", "ya"];

const CLARIFICATION_PHRASES: &[&str] = &[
    "bisa dijelaskan",
    "jelaskan",
    "apakah ini tentang",
    "yang mana",
    "produk apa",
    "tanya tentang",
    "maksudnya",
    "sebenernya tentang apa",
    "mau tanya tentang",
];

const PRODUCT_KEYWORDS: &[&str] = &["netflix", "spotify", "youtube", "hbo", "prime", "disney", "microsoft", "canva", "vpn", "apple"];

const CONTEXT_KEYWORDS: &[&str] = &["error", "problem", "tidak bisa", "gimana", "caranya", "perpanjang", "bayar", "harga"];

const DEFER_KEYWORDS: &[&str] = &[
    "nanti",
    "stop dl",
    "stop dlu",
    "belum",
    "blm waktunya",
    "belum sekarang",
    "japri lg",
    "jangan sekarang",
    "tidak usah",
    "gak usah",
    "skip",
    "skip dl",
];

const NEW_SUBSCRIPTION_KEYWORDS: &[&str] = &["langganan baru", "akun baru", "daftar baru", "bikin baru", "buat baru", "mau langganan"];

const CONFIRM_RENEWAL_KEYWORDS: &[&str] = &[
    "iya perpanjang",
    "mau perpanjang",
    "perpanjang sekarang",
    "iya lanjut",
    "ok perpanjang",
    "ya perpanjang",
    "iya extend",
    "mau bayar",
    "bayar sekarang",
    "bayarnya gimana",
    "transfer kemana",
    "rekening apa",
];

const SUPPORT_KEYWORDS: &[&str] = &[
    "otp",
    "verif",
    "verifikasi",
    "kode",
    "login error",
    "password",
    "lupa",
    "reset",
    "error",
    "gagal",
    "tidak bisa",
    "masalah",
    "kendala",
    "sudah terkirim",
    "sudah terima",
];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let text = text.to_lowercase();
    keywords.iter().any(|keyword| text.contains(keyword))
}

/// Smart silence: short acknowledgments and noise get no reply.
pub fn should_skip_short_message(text: &str) -> bool {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let length = trimmed.chars().count();

    if length < 5 && !contains_any(&lower, SHORT_SUPPORT_KEYWORDS) {
        return true;
    }

    let is_acknowledgment = ACKNOWLEDGMENTS.contains(&lower.as_str());
    let is_only_numbers = !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '.' || c == ',');

    (is_acknowledgment || is_only_numbers) && length < 10
}

/// Whether one of the last two bot messages already asked the customer to clarify.
pub fn detect_previous_clarification(history: &[HistoryEntry]) -> bool {
    if history.len() < 2 {
        return false;
    }

    let assistant: Vec<&HistoryEntry> = history.iter().filter(|entry| entry.role == HistoryRole::Assistant).collect();

    assistant.iter().rev().take(2).any(|entry| contains_any(&entry.content, CLARIFICATION_PHRASES))
}

/// Three short user messages in a row suggest a distracted customer.
pub fn detect_bad_momentum(history: &[HistoryEntry]) -> bool {
    if history.len() < 6 {
        return false;
    }

    let recent: Vec<&str> = history.iter().filter(|entry| entry.role == HistoryRole::User).map(|entry| entry.content.trim()).collect();

    recent.len() >= 3 && recent[recent.len() - 3..].iter().all(|content| content.chars().count() < 10)
}

/// How sure we are which product the customer means, `0..=100`.
pub fn product_confidence(text: &str, history: &[HistoryEntry]) -> u8 {
    let lower = text.to_lowercase();
    let mut confidence = 0u8;

    if contains_any(&lower, PRODUCT_KEYWORDS) {
        confidence += 40;
    }

    if !history.is_empty() {
        let joined = history.iter().map(|entry| entry.content.as_str()).collect::<Vec<_>>().join(" ");
        if contains_any(&joined, PRODUCT_KEYWORDS) {
            confidence += 30;
        }
    }

    if contains_any(&lower, CONTEXT_KEYWORDS) {
        confidence += 20;
    }

    if lower.chars().count() > 20 {
        confidence += 10;
    }

    confidence.min(100)
}

/// Open-ended openers answered with the category overview.
pub fn is_vague_question(text: &str) -> bool {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    let patterns = PATTERNS.get_or_init(|| {
        [
            r"^mau tanya(?: dong)?$",
            r"^tanya(?: dong)?$",
            r"^ada apa aja\??$",
            r"^ada promo\??$",
            r"^promo apa\??$",
            r"^lagi promo\??$",
            r"^lagi ada promo\??$",
            r"^produk apa aja\??$",
            r"^apa aja\??$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("static regex"))
        .collect()
    });

    let lower = text.trim().to_lowercase();
    patterns.iter().any(|pattern| pattern.is_match(&lower))
}

pub fn is_deferring(text: &str) -> bool {
    contains_any(text, DEFER_KEYWORDS)
}

pub fn is_new_subscription_request(text: &str) -> bool {
    contains_any(text, NEW_SUBSCRIPTION_KEYWORDS)
}

pub fn is_confirming_renewal(text: &str) -> bool {
    contains_any(text, CONFIRM_RENEWAL_KEYWORDS)
}

/// Technical problems take priority over every other intent.
pub fn needs_support(text: &str) -> bool {
    contains_any(text, SUPPORT_KEYWORDS)
}

// Tests.
