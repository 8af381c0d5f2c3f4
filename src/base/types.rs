//! Domain types and result handling.

use std::{fmt, str::FromStr, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The crate-wide error type.
pub type Err = anyhow::Error;
/// The crate-wide result type.
pub type Res<T> = Result<T, Err>;
/// A result with no value.
pub type Void = Res<()>;

// Intents.

/// Coarse classification of a customer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// A problem with an existing account.
    Support,
    /// Wants to extend a subscription.
    Renewal,
    /// Asks what something costs.
    PriceInquiry,
    /// Asks whether a slot is free.
    AvailabilityInquiry,
    /// Asks what is on offer.
    ProductCatalog,
    /// Asks about their own subscriptions.
    SubscriptionInquiry,
    /// Small talk.
    Greeting,
    /// Anything else, including unknown labels.
    #[serde(other)]
    Unclear,
}

/// The classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// The classified intent.
    pub intent: IntentKind,
    /// Product mentioned, if any.
    #[serde(default)]
    pub product: Option<String>,
    /// Duration mentioned, if any.
    #[serde(default)]
    pub duration: Option<String>,
    /// Support issue category, if any.
    #[serde(default)]
    pub issue_type: Option<String>,
}

impl Intent {
    /// The value used whenever classification is unavailable.
    pub fn unclear() -> Self {
        Self {
            intent: IntentKind::Unclear,
            product: None,
            duration: None,
            issue_type: None,
        }
    }
}

// LLM contexts.

/// Everything the classifier sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentContext {
    /// Distinct product names from the pricing table.
    pub products: Vec<String>,
    /// Recent conversation, oldest first.
    pub history: Vec<HistoryEntry>,
    /// The message being classified.
    pub message: String,
    /// Product confidence score, `0..=100`.
    pub confidence: u8,
    /// The bot already asked for clarification recently.
    pub already_asked: bool,
    /// The customer sounds frustrated.
    pub bad_momentum: bool,
}

/// Everything the assistant sees when writing a free-form reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyContext {
    /// The message being answered.
    pub message: String,
    /// How to address the customer.
    pub customer_name: Option<String>,
    /// Retrieved knowledge base entries.
    pub knowledge: Vec<KnowledgeEntry>,
    /// Recent conversation, oldest first.
    pub history: Vec<HistoryEntry>,
}

/// Result of the payment proof check on an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentProof {
    /// Whether the image looks like a transfer receipt.
    pub is_payment_proof: bool,
    /// Human-readable extracted transfer details.
    pub details: String,
}

// Conversation history.

/// Who said a history line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    /// The customer.
    User,
    /// The bot.
    Assistant,
}

/// One stored conversation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Speaker.
    pub role: HistoryRole,
    /// Message text.
    pub content: String,
}

impl HistoryEntry {
    /// A customer line.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: HistoryRole::User, content: content.into() }
    }

    /// A bot line.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: HistoryRole::Assistant, content: content.into() }
    }
}

// Reference data.

/// One sellable product/duration combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingItem {
    /// Product name, e.g. `Netflix Premium`.
    pub product: String,
    /// Duration label, e.g. `1 Bulan`.
    pub duration: String,
    /// Selling price in rupiah.
    pub price: i64,
    /// Price before discount; `0` when there is no promo.
    pub price_normal: i64,
}

impl PricingItem {
    /// Builds an item from a raw row, reading the normal price out of the description.
    pub fn from_row(product: String, duration: String, price: i64, description: Option<&str>) -> Self {
        Self {
            product,
            duration,
            price,
            price_normal: description.map(parse_normal_price).unwrap_or_default(),
        }
    }

    /// Whether the item is discounted.
    pub fn has_promo(&self) -> bool {
        self.price_normal > 0 && self.price_normal > self.price
    }
}

/// Extracts `N` from a description such as `"Harga normal: 390000"`.
pub fn parse_normal_price(description: &str) -> i64 {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"Harga normal:\s*(\d+)").expect("static regex"));

    pattern.captures(description).and_then(|c| c[1].parse().ok()).unwrap_or_default()
}

/// A customer subscription row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Row id.
    pub id: i64,
    /// Customer name.
    pub nama: String,
    /// Customer WhatsApp number, as stored.
    pub wa_pelanggan: String,
    /// Account email handed to the customer.
    pub email: String,
    /// Product name.
    pub produk: String,
    /// The group account this subscription occupies a slot in.
    pub subscription: String,
    /// Profile and PIN, as `profile / pin` or similar.
    pub profil_pin: String,
    /// First subscription date.
    pub member_since: Option<NaiveDate>,
    /// Start of the current period.
    pub start_membership: Option<NaiveDate>,
    /// Expiry date.
    pub end_membership: Option<NaiveDate>,
    /// `ACTIVE`, `PAID`, `PENDING` or anything else.
    pub status_payment: String,
    /// Slot number in the group account.
    pub slot: Option<String>,
}

impl SubscriptionRecord {
    /// Status is `PAID`.
    pub fn is_paid(&self) -> bool {
        self.status_payment.eq_ignore_ascii_case("PAID")
    }

    /// Status is `PENDING`.
    pub fn is_pending(&self) -> bool {
        self.status_payment.eq_ignore_ascii_case("PENDING")
    }
}

/// A shared upstream account with a fixed number of slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAccount {
    /// Group name, matched against [`SubscriptionRecord::subscription`].
    pub subscription: String,
    /// Short internal code.
    pub code: String,
    /// Login email.
    pub email: String,
    /// Login password.
    pub password: String,
    /// Slot capacity; non-positive means the default.
    pub max_slots: i64,
}

/// A subscription due for an expiry reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCandidate {
    /// Subscription row id.
    pub subscription_id: i64,
    /// Customer name.
    pub nama: String,
    /// Customer WhatsApp number, as stored.
    pub wa_number: String,
    /// Product name.
    pub produk: String,
    /// Expiry date.
    pub end_date: NaiveDate,
    /// Slot number in the group account.
    pub slot: Option<String>,
    /// Email of the group account, when joined.
    pub group_email: Option<String>,
    /// The H-5 notice went out.
    pub reminded_h5: bool,
    /// The H-1 notice went out.
    pub reminded_h1: bool,
}

/// The three daily reminder jobs, keyed to days before expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReminderKind {
    /// H-7: clear `PAID` status and reset reminder flags.
    #[serde(rename = "h7")]
    ClearPaid,
    /// H-5: first notice.
    #[serde(rename = "h5")]
    FirstNotice,
    /// H-1: final notice.
    #[serde(rename = "h1")]
    FinalNotice,
}

impl ReminderKind {
    /// Every kind, in firing order.
    pub const ALL: [ReminderKind; 3] = [ReminderKind::ClearPaid, ReminderKind::FirstNotice, ReminderKind::FinalNotice];

    /// Days between the run date and the targeted expiry date.
    pub fn days_before_expiry(self) -> i64 {
        match self {
            ReminderKind::ClearPaid => 7,
            ReminderKind::FirstNotice => 5,
            ReminderKind::FinalNotice => 1,
        }
    }

    /// WIB wall-clock time of the daily run, as `(hour, minute)`.
    pub fn fire_time(self) -> (u32, u32) {
        match self {
            ReminderKind::ClearPaid => (7, 1),
            ReminderKind::FirstNotice => (16, 30),
            ReminderKind::FinalNotice => (10, 0),
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderKind::ClearPaid => write!(f, "h7"),
            ReminderKind::FirstNotice => write!(f, "h5"),
            ReminderKind::FinalNotice => write!(f, "h1"),
        }
    }
}

impl FromStr for ReminderKind {
    type Err = Err;

    fn from_str(s: &str) -> Res<Self> {
        match s.trim().to_lowercase().as_str() {
            "h7" => Ok(ReminderKind::ClearPaid),
            "h5" => Ok(ReminderKind::FirstNotice),
            "h1" => Ok(ReminderKind::FinalNotice),
            _ => Err(anyhow::anyhow!("Invalid type. Use: h1, h5, or h7")),
        }
    }
}

/// A document in the vector knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    /// Category, e.g. `faq`.
    pub category: String,
    /// Short title.
    pub topic: String,
    /// The text handed to the assistant.
    pub content: String,
}

// Inbound messages.

/// Kind of attached media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// A picture, checked for payment proof.
    Image,
    /// Anything else.
    Document,
}

/// A provider-neutral inbound WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Sender JID or phone number.
    pub sender_jid: String,
    /// WhatsApp display name.
    #[serde(default)]
    pub sender_name: String,
    /// Chat to answer in; empty means the sender.
    #[serde(default)]
    pub chat_jid: String,
    /// Message text or caption.
    #[serde(default)]
    pub text: String,
    /// Attached media, if any.
    #[serde(default)]
    pub media_url: Option<String>,
    /// Kind of the attached media.
    #[serde(default)]
    pub media_kind: Option<MediaKind>,
}

impl InboundMessage {
    /// A plain text message in a direct chat.
    pub fn text(sender_jid: impl Into<String>, sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        let sender_jid = sender_jid.into();
        Self {
            chat_jid: sender_jid.clone(),
            sender_jid,
            sender_name: sender_name.into(),
            text: text.into(),
            media_url: None,
            media_kind: None,
        }
    }
}

/// A message the bot wants delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Target JID or phone number.
    pub chat_id: String,
    /// Message text.
    pub text: String,
}

impl OutgoingMessage {
    /// A message for `chat_id`.
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { chat_id: chat_id.into(), text: text.into() }
    }
}

// Providers.

/// The WhatsApp gateway used for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Fonnte HTTP API.
    Fonnte,
    /// Self-hosted go-whatsapp-web-multidevice.
    Gowa,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Fonnte => write!(f, "fonnte"),
            Provider::Gowa => write!(f, "gowa"),
        }
    }
}

impl FromStr for Provider {
    type Err = Err;

    fn from_str(s: &str) -> Res<Self> {
        match s.trim().to_lowercase().as_str() {
            "fonnte" => Ok(Provider::Fonnte),
            "gowa" => Ok(Provider::Gowa),
            _ => Err(anyhow::anyhow!("Invalid provider: {s}. Must be 'fonnte' or 'gowa'")),
        }
    }
}

/// Connectivity report for the active provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    /// The active provider.
    pub provider: Provider,
    /// Whether it reports a live WhatsApp session.
    pub is_connected: bool,
    /// Short status label.
    pub status: String,
    /// Raw provider detail, when available.
    pub detail: Option<String>,
}

// Phone helpers.

/// Phone number and JID helpers.
pub mod phone {
    /// Keeps digits only.
    pub fn digits(raw: &str) -> String {
        raw.chars().filter(char::is_ascii_digit).collect()
    }

    /// Digits only, with a local `0` prefix rewritten to `62`.
    pub fn normalize(raw: &str) -> String {
        let digits = digits(raw);
        match digits.strip_prefix('0') {
            Some(rest) => format!("62{rest}"),
            None => digits,
        }
    }

    /// Phone number of a JID such as `628123:4@s.whatsapp.net`.
    pub fn from_jid(jid: &str) -> String {
        let user = jid.split('@').next().unwrap_or_default();
        let user = user.split(':').next().unwrap_or_default();
        digits(user)
    }

    /// JID for a bare phone number; JIDs pass through unchanged.
    pub fn to_jid(target: &str) -> String {
        if target.contains('@') { target.to_string() } else { format!("{}@s.whatsapp.net", digits(target)) }
    }
}

// Business time.

/// Western Indonesia Time (UTC+7), used for every business date.
pub mod wib {
    use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

    /// Offset from UTC.
    pub const UTC_OFFSET_HOURS: i64 = 7;

    /// Current WIB wall-clock time.
    pub fn now() -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::hours(UTC_OFFSET_HOURS)
    }

    /// Current WIB date.
    pub fn today() -> NaiveDate {
        now().date()
    }
}

// Tests.
