//! Admin commands sent over WhatsApp.

use std::sync::OnceLock;

use regex::Regex;

/// Edits to the override list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideCommand {
    Disable { phone: String },
    Enable { phone: String },
    List,
}

/// A manual payment confirmation (`/pay`, `/extend` or `/confirm`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentCommand {
    pub phone: String,
    pub code: String,
    pub amount: Option<i64>,
}

/// What a product code extends a subscription by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductCode {
    pub product: &'static str,
    pub duration: &'static str,
    pub months: u32,
}

/// Product families and the code prefix each one uses.
const PRODUCT_FAMILIES: &[(&str, &str)] = &[
    ("netflix-nontv", "Netflix Premium - Non TV Access"),
    ("netflix-tv", "Netflix Premium - TV Shared Access"),
    ("youtube-premium", "YouTube Premium"),
    ("spotify", "Spotify Premium"),
    ("canva", "Canva Pro"),
    ("disney", "Disney+"),
    ("microsoft", "Microsoft 365"),
    ("apple", "Apple Music"),
    ("hbo", "HBO GO Max"),
    ("prime", "Prime Video"),
    ("capcut", "CapCut Pro"),
];

const DURATIONS: &[(&str, &str, u32)] = &[("1m", "1 Bulan", 1), ("3m", "3 Bulan", 3), ("6m", "6 Bulan", 6), ("12m", "12 Bulan", 12)];

pub fn parse_override_command(text: &str) -> Option<OverrideCommand> {
    static DISABLE: OnceLock<Regex> = OnceLock::new();
    static ENABLE: OnceLock<Regex> = OnceLock::new();

    let disable = DISABLE.get_or_init(|| Regex::new(r"(?i)^/disable\s+([0-9+\-\s]+)$").expect("static regex"));
    let enable = ENABLE.get_or_init(|| Regex::new(r"(?i)^/enable\s+([0-9+\-\s]+)$").expect("static regex"));

    let text = text.trim();

    if let Some(caps) = disable.captures(text) {
        return Some(OverrideCommand::Disable { phone: caps[1].trim().to_string() });
    }

    if let Some(caps) = enable.captures(text) {
        return Some(OverrideCommand::Enable { phone: caps[1].trim().to_string() });
    }

    text.eq_ignore_ascii_case("/list-override").then_some(OverrideCommand::List)
}

pub fn parse_payment_command(text: &str) -> Option<PaymentCommand> {
    static PAY: OnceLock<Regex> = OnceLock::new();
    static CONFIRM: OnceLock<Regex> = OnceLock::new();

    let pay = PAY.get_or_init(|| Regex::new(r"(?i)^/(?:pay|extend)\s+(\d+)\s+([\w-]+)$").expect("static regex"));
    let confirm = CONFIRM.get_or_init(|| Regex::new(r"(?i)^/confirm\s+(\d+)\s+(\d+)\s+([\w-]+)$").expect("static regex"));

    let text = text.trim();

    if let Some(caps) = pay.captures(text) {
        return Some(PaymentCommand {
            phone: caps[1].to_string(),
            code: caps[2].to_string(),
            amount: None,
        });
    }

    confirm.captures(text).map(|caps| PaymentCommand {
        phone: caps[1].to_string(),
        code: caps[3].to_string(),
        amount: caps[2].parse().ok(),
    })
}

/// Looks up a code such as `netflix-nontv-3m`, case-insensitively.
pub fn product_code(code: &str) -> Option<ProductCode> {
    let code = code.trim().to_lowercase();
    let (family, suffix) = code.rsplit_once('-')?;

    let product = PRODUCT_FAMILIES.iter().find(|(prefix, _)| *prefix == family).map(|(_, product)| *product)?;
    let &(_, duration, months) = DURATIONS.iter().find(|(candidate, _, _)| *candidate == suffix)?;

    Some(ProductCode { product, duration, months })
}

// Tests.
