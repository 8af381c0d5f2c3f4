#![cfg(test)]

use std::{
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use digilife_bot::{
    base::{
        config::{Config, ConfigInner},
        types::{
            GroupAccount, HistoryEntry, HistoryRole, InboundMessage, Intent, IntentContext, IntentKind, KnowledgeEntry, MediaKind, PaymentProof, PricingItem, Provider, ProviderStatus,
            ReminderCandidate, ReminderKind, ReplyContext, Res, SubscriptionRecord, Void, phone, wib,
        },
    },
    interaction::{
        overrides::OverrideList,
        pipeline::{Pipeline, Route, process_inbound},
        reminder::ReminderService,
        templates,
    },
    runtime::Runtime,
    server,
    service::{
        catalog::Catalog,
        chat::{ChatClient, GenericChatClient},
        db::{DbClient, GenericDbClient},
        history::HistoryStore,
        knowledge::{GenericKnowledgeClient, KnowledgeClient},
        llm::{GenericLlmClient, LlmClient},
    },
};
use mockall::mock;
use serde_json::{Value, json};
use tower::ServiceExt;

// Mocks.

mock! {
    pub Db {}

    #[async_trait]
    impl GenericDbClient for Db {
        async fn ping(&self) -> Void;
        async fn ensure_schema(&self) -> Void;
        async fn load_pricing(&self) -> Res<Vec<PricingItem>>;
        async fn load_subscriptions(&self) -> Res<Vec<SubscriptionRecord>>;
        async fn load_groups(&self) -> Res<Vec<GroupAccount>>;
        async fn lookup_customer_name(&self, phone: &str) -> Res<Option<String>>;
        async fn customer_subscriptions(&self, phone: &str) -> Res<Vec<SubscriptionRecord>>;
        async fn find_renewal_candidate(&self, phone: &str, product: &str) -> Res<Option<SubscriptionRecord>>;
        async fn conversation_history(&self, phone: &str, limit: i64) -> Res<Vec<HistoryEntry>>;
        async fn append_history(&self, phone: &str, entries: &[HistoryEntry]) -> Void;
        async fn extend_subscription(&self, id: i64, new_end: NaiveDate) -> Void;
        async fn expiring_subscriptions(&self, date: NaiveDate) -> Res<Vec<ReminderCandidate>>;
        async fn mark_reminded(&self, id: i64, kind: ReminderKind) -> Void;
        async fn clear_paid_expiring(&self, date: NaiveDate) -> Res<u64>;
    }
}

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn extract_intent(&self, context: &IntentContext) -> Res<Intent>;
        async fn generate_reply(&self, context: &ReplyContext) -> Res<String>;
        async fn analyze_payment_proof(&self, image_url: &str) -> Res<PaymentProof>;
        async fn extract_image_text(&self, image_url: &str) -> Res<String>;
        async fn embed(&self, text: &str) -> Res<Vec<f32>>;
    }
}

mock! {
    pub Knowledge {}

    #[async_trait]
    impl GenericKnowledgeClient for Knowledge {
        async fn search(&self, query: &str, top_k: usize) -> Res<Vec<KnowledgeEntry>>;
        async fn ingest(&self, entry: &KnowledgeEntry) -> Res<u64>;
    }
}

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        fn provider(&self) -> Provider;
        async fn send_message(&self, chat_id: &str, text: &str) -> Void;
        async fn status(&self) -> Res<ProviderStatus>;
    }
}

// Fixture.

const ADMIN: &str = "6281100";
const CUSTOMER: &str = "6281234567890";
const CUSTOMER_JID: &str = "6281234567890@s.whatsapp.net";

fn customer_subscription() -> SubscriptionRecord {
    SubscriptionRecord {
        id: 7,
        nama: "Budi Santoso".to_string(),
        wa_pelanggan: "081234567890".to_string(),
        email: "budi@mail.test".to_string(),
        produk: "Netflix Premium".to_string(),
        subscription: "Netflix Premium 1".to_string(),
        profil_pin: "Budi / 1234".to_string(),
        member_since: NaiveDate::from_ymd_opt(2025, 1, 10),
        start_membership: NaiveDate::from_ymd_opt(2025, 12, 10),
        end_membership: NaiveDate::from_ymd_opt(2026, 1, 10),
        status_payment: "ACTIVE".to_string(),
        slot: Some("2".to_string()),
    }
}

fn group(name: &str, password: &str) -> GroupAccount {
    GroupAccount {
        subscription: name.to_string(),
        code: "G1".to_string(),
        email: "group@mail.test".to_string(),
        password: password.to_string(),
        max_slots: 5,
    }
}

/// Canned service data; each field backs exactly one mocked method.
struct Fixture {
    admin_numbers: Vec<String>,
    pricing: Vec<PricingItem>,
    subscriptions: Vec<SubscriptionRecord>,
    groups: Vec<GroupAccount>,
    customer_name: Option<String>,
    renewal_candidate: Option<SubscriptionRecord>,
    intent: Intent,
    reply: Option<String>,
    proof: Option<PaymentProof>,
    expiring: Vec<ReminderCandidate>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            admin_numbers: vec![ADMIN.to_string()],
            pricing: vec![
                PricingItem::from_row("Netflix Premium".to_string(), "1 Bulan".to_string(), 55000, None),
                PricingItem::from_row("Netflix Premium".to_string(), "3 Bulan".to_string(), 150000, Some("Harga normal: 165000")),
                PricingItem::from_row("Spotify Premium".to_string(), "1 Bulan".to_string(), 25000, None),
            ],
            subscriptions: vec![customer_subscription()],
            groups: vec![group("Netflix Premium 1", "secret"), group("YouTube Premium Family 1", "hunter2")],
            customer_name: Some("Budi Santoso".to_string()),
            renewal_candidate: None,
            intent: Intent::unclear(),
            reply: Some("Jawaban dari asisten.".to_string()),
            proof: None,
            expiring: Vec::new(),
        }
    }
}

/// What the mocks observed.
#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    history: Arc<Mutex<Vec<(String, HistoryEntry)>>>,
    extended: Arc<Mutex<Vec<(i64, NaiveDate)>>>,
    reminded: Arc<Mutex<Vec<(i64, ReminderKind)>>>,
    intent_calls: Arc<AtomicUsize>,
    intent_messages: Arc<Mutex<Vec<String>>>,
    reply_calls: Arc<AtomicUsize>,
}

impl Recorder {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn history(&self) -> Vec<(String, HistoryEntry)> {
        self.history.lock().unwrap().clone()
    }
}

fn override_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("digilife-it-{}-{name}.txt", std::process::id()))
}

impl Fixture {
    async fn build(self, name: &str) -> (Runtime, Recorder) {
        let recorder = Recorder::default();

        // Database.

        let mut db = MockDb::new();
        db.expect_ping().returning(|| Ok(()));
        db.expect_ensure_schema().returning(|| Ok(()));

        let pricing = self.pricing.clone();
        db.expect_load_pricing().returning(move || Ok(pricing.clone()));
        let subscriptions = self.subscriptions.clone();
        db.expect_load_subscriptions().returning(move || Ok(subscriptions.clone()));
        let groups = self.groups.clone();
        db.expect_load_groups().returning(move || Ok(groups.clone()));

        let customer_name = self.customer_name.clone();
        db.expect_lookup_customer_name()
            .returning(move |phone| Ok(if phone == CUSTOMER { customer_name.clone() } else { None }));

        // Stored numbers are compared normalized, like the SQL lookup.
        let own = self.subscriptions.clone();
        db.expect_customer_subscriptions()
            .returning(move |wanted| Ok(own.iter().filter(|subscription| phone::normalize(&subscription.wa_pelanggan) == wanted).cloned().collect()));

        let candidate = self.renewal_candidate.clone();
        db.expect_find_renewal_candidate().returning(move |_, _| Ok(candidate.clone()));

        let history = recorder.history.clone();
        db.expect_conversation_history().returning(move |phone, _| {
            Ok(history.lock().unwrap().iter().filter(|(owner, _)| owner == phone).map(|(_, entry)| entry.clone()).collect())
        });

        let history = recorder.history.clone();
        db.expect_append_history().returning(move |phone, entries| {
            history.lock().unwrap().extend(entries.iter().map(|entry| (phone.to_string(), entry.clone())));
            Ok(())
        });

        let extended = recorder.extended.clone();
        db.expect_extend_subscription().returning(move |id, end| {
            extended.lock().unwrap().push((id, end));
            Ok(())
        });

        let expiring = self.expiring.clone();
        db.expect_expiring_subscriptions().returning(move |_| Ok(expiring.clone()));

        let reminded = recorder.reminded.clone();
        db.expect_mark_reminded().returning(move |id, kind| {
            reminded.lock().unwrap().push((id, kind));
            Ok(())
        });

        db.expect_clear_paid_expiring().returning(|_| Ok(3));

        // Language model.

        let mut llm = MockLlm::new();

        let intent = self.intent.clone();
        let intent_calls = recorder.intent_calls.clone();
        let intent_messages = recorder.intent_messages.clone();
        llm.expect_extract_intent().returning(move |context| {
            intent_calls.fetch_add(1, Ordering::SeqCst);
            intent_messages.lock().unwrap().push(context.message.clone());
            Ok(intent.clone())
        });

        let reply = self.reply.clone();
        let reply_calls = recorder.reply_calls.clone();
        llm.expect_generate_reply().returning(move |_| {
            reply_calls.fetch_add(1, Ordering::SeqCst);
            reply.clone().ok_or_else(|| anyhow::anyhow!("model unavailable"))
        });

        let proof = self.proof.clone();
        llm.expect_analyze_payment_proof()
            .returning(move |_| Ok(proof.clone().unwrap_or(PaymentProof { is_payment_proof: false, details: String::new() })));
        llm.expect_extract_image_text().returning(|_| Ok("Netflix error kode 123".to_string()));
        llm.expect_embed().returning(|_| Ok(vec![0.0; 4]));

        // Knowledge base.

        let mut knowledge = MockKnowledge::new();
        knowledge.expect_search().returning(|_, _| Ok(Vec::new()));
        knowledge.expect_ingest().returning(|_| Ok(42));

        // WhatsApp.

        let mut chat = MockChat::new();
        chat.expect_provider().return_const(Provider::Fonnte);

        let sent = recorder.sent.clone();
        chat.expect_send_message().returning(move |chat_id, text| {
            sent.lock().unwrap().push((chat_id.to_string(), text.to_string()));
            Ok(())
        });
        chat.expect_status().returning(|| {
            Ok(ProviderStatus {
                provider: Provider::Fonnte,
                is_connected: true,
                status: "connect".to_string(),
                detail: None,
            })
        });

        // Runtime.

        let path = override_path(name);
        let _ = std::fs::remove_file(&path);

        let config = Config {
            inner: Arc::new(ConfigInner {
                admin_numbers: self.admin_numbers.clone(),
                admin_password: Some("rahasia".to_string()),
                payment_instructions: "Transfer ke BCA 123.".to_string(),
                override_file: path.to_string_lossy().into_owned(),
                whatsapp_provider: "fonnte".to_string(),
                gowa_api_url: "http://gowa.test".to_string(),
                knowledge_top_k: 3,
                history_limit: 10,
                history_cache_ttl_secs: 60,
                history_cache_max_entries: 10,
                data_cache_ttl_secs: 60,
                ..Default::default()
            }),
        };

        let db = DbClient::new(Arc::new(db));
        let llm = LlmClient::new(Arc::new(llm));
        let overrides = OverrideList::load(&path, &self.subscriptions).await.unwrap();

        let runtime = Runtime {
            catalog: Catalog::new(db.clone(), config.data_cache_ttl_secs),
            history: HistoryStore::new(db.clone(), &config),
            knowledge: KnowledgeClient::new(Arc::new(knowledge)),
            chat: ChatClient::new(Arc::new(chat)),
            config,
            db,
            llm,
            overrides,
        };

        (runtime, recorder)
    }
}

fn from_customer(text: &str) -> InboundMessage {
    InboundMessage::text(CUSTOMER_JID, "Budi S", text)
}

// Pipeline.

#[tokio::test]
async fn price_inquiry_uses_pricing_table_with_renewal_nudge() {
    let mut renewal = customer_subscription();
    renewal.end_membership = Some(wib::today() + chrono::Duration::days(3));

    let fixture = Fixture {
        intent: Intent {
            intent: IntentKind::PriceInquiry,
            product: Some("Netflix".to_string()),
            duration: None,
            issue_type: None,
        },
        renewal_candidate: Some(renewal),
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("price").await;

    let decision = process_inbound(from_customer("berapa harga netflix sekarang?"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::PricingTemplate);

    let sent = recorder.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, CUSTOMER_JID);
    assert!(sent[0].1.starts_with("💡 *Budi*, langganan Netflix-mu akan expired 3 hari lagi."));
    assert!(sent[0].1.contains("sekalian?\n\n\n\nKa Budi, berikut harga produk yang tersedia:"));
    assert!(sent[0].1.contains("- 1 Bulan: *Rp 55.000*"));
    assert!(sent[0].1.contains("- 3 Bulan: ~Rp 165.000~ *Rp 150.000*"));
    assert!(!sent[0].1.contains("Spotify"));

    assert_eq!(recorder.reply_calls.load(Ordering::SeqCst), 0);

    let history = recorder.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].1, HistoryEntry::user("berapa harga netflix sekarang?"));
    assert_eq!(history[1].1.role, HistoryRole::Assistant);
}

#[tokio::test]
async fn unregistered_sender_gets_minimal_reply_without_assistant() {
    let (runtime, recorder) = Fixture::default().build("minimal").await;

    let message = InboundMessage::text("6289999@s.whatsapp.net", "Stranger", "halo kak, saya mau nanya sesuatu");
    let decision = Pipeline::new(&runtime).process(&message).await.unwrap();

    assert_eq!(decision.route, Route::Minimal);
    assert_eq!(decision.replies[0].text, templates::MINIMAL_REPLY);
    assert_eq!(recorder.reply_calls.load(Ordering::SeqCst), 0);

    // Decisions are not delivered by `process`.
    assert!(recorder.sent().is_empty());
}

#[tokio::test]
async fn short_acknowledgment_is_stored_but_not_answered() {
    let (runtime, recorder) = Fixture::default().build("silence").await;

    let decision = process_inbound(from_customer("ok"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::SmartSilence);
    assert!(recorder.sent().is_empty());
    assert_eq!(recorder.history(), vec![(CUSTOMER.to_string(), HistoryEntry::user("ok"))]);
    assert_eq!(recorder.intent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn registered_customer_can_defer() {
    let (runtime, recorder) = Fixture::default().build("defer").await;

    let decision = process_inbound(from_customer("nanti dulu ya kak"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::Deferred);
    assert_eq!(recorder.sent()[0].1, templates::deferred("Budi"));
    assert_eq!(recorder.intent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn vague_opener_gets_category_overview() {
    let (runtime, recorder) = Fixture::default().build("vague").await;

    let decision = process_inbound(from_customer("ada promo?"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::CategoryOverview);
    assert_eq!(recorder.sent()[0].1, templates::category_overview(Some("Budi")));
}

#[tokio::test]
async fn renewal_confirmation_sends_payment_instructions() {
    let (runtime, recorder) = Fixture::default().build("confirm").await;

    let decision = process_inbound(from_customer("iya perpanjang kak"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::PaymentInfo);
    assert_eq!(recorder.sent()[0].1, "Transfer ke BCA 123.");
}

#[tokio::test]
async fn availability_question_answers_from_group_slots() {
    let fixture = Fixture {
        intent: Intent {
            intent: IntentKind::AvailabilityInquiry,
            product: Some("YouTube".to_string()),
            duration: None,
            issue_type: None,
        },
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("availability").await;

    let decision = process_inbound(from_customer("slot youtube masih ada?"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::Availability);
    assert_eq!(recorder.sent()[0].1, templates::availability_reply("Youtube Premium Family", true));
}

#[tokio::test]
async fn support_problem_goes_to_assistant_even_for_price_intent() {
    let fixture = Fixture {
        intent: Intent {
            intent: IntentKind::PriceInquiry,
            product: Some("Netflix".to_string()),
            duration: None,
            issue_type: None,
        },
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("support").await;

    let decision = process_inbound(from_customer("netflix minta kode otp terus, gimana?"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::SupportAssistant);
    assert_eq!(recorder.sent()[0].1, "Jawaban dari asisten.");
    assert_eq!(recorder.reply_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn assistant_failure_falls_back_to_apology() {
    let fixture = Fixture { reply: None, ..Default::default() };
    let (runtime, recorder) = fixture.build("apology").await;

    let decision = process_inbound(from_customer("akun saya kok logout sendiri ya kak"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::Assistant);
    assert_eq!(recorder.sent()[0].1, templates::LLM_APOLOGY);
}

#[tokio::test]
async fn subscription_inquiry_lists_own_subscriptions() {
    let fixture = Fixture {
        intent: Intent {
            intent: IntentKind::SubscriptionInquiry,
            product: None,
            duration: None,
            issue_type: None,
        },
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("subscriptions").await;

    let decision = process_inbound(from_customer("langganan saya sampai kapan ya"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::SubscriptionList);
    let reply = &recorder.sent()[0].1;
    assert!(reply.starts_with("📋 *Langganan Anda:*"));
    assert!(reply.contains("*Netflix Premium*"));
    assert!(reply.contains("Slot: 2/5"));
}

#[tokio::test]
async fn payment_proof_image_is_acknowledged() {
    let fixture = Fixture {
        proof: Some(PaymentProof {
            is_payment_proof: true,
            details: "Rp 55.000 ke BCA".to_string(),
        }),
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("proof").await;

    let mut message = from_customer("");
    message.media_url = Some("https://cdn.test/proof.jpg".to_string());
    message.media_kind = Some(MediaKind::Image);

    let decision = process_inbound(message, &runtime).await.unwrap();

    assert_eq!(decision.route, Route::PaymentProof);
    assert_eq!(recorder.sent()[0].1, templates::payment_proof_received("Budi", "Rp 55.000 ke BCA"));
    assert_eq!(recorder.history()[0].1, HistoryEntry::user("[Sent IMAGE] Budi S"));
    assert_eq!(recorder.intent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn new_subscription_request_is_handed_to_admin() {
    let (runtime, recorder) = Fixture::default().build("new-subscription").await;

    let message = InboundMessage::text("6289999@s.whatsapp.net", "Stranger", "kak saya mau langganan netflix dong");
    let decision = process_inbound(message, &runtime).await.unwrap();

    assert_eq!(decision.route, Route::NewSubscription);
    assert_eq!(recorder.sent()[0].1, templates::new_subscription("Stranger"));
    assert_eq!(recorder.intent_calls.load(Ordering::SeqCst), 0);

    // Registered customers asking the same thing go through intent routing.
    let decision = process_inbound(from_customer("kak saya mau langganan netflix dong"), &runtime).await.unwrap();

    assert_ne!(decision.route, Route::NewSubscription);
    assert_eq!(recorder.intent_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn image_text_drives_routing_when_not_a_payment_proof() {
    let (runtime, recorder) = Fixture::default().build("ocr").await;

    let mut message = from_customer("");
    message.media_url = Some("https://cdn.test/screenshot.jpg".to_string());
    message.media_kind = Some(MediaKind::Image);

    let decision = process_inbound(message, &runtime).await.unwrap();
    let expected = templates::media_text("", "Netflix error kode 123");

    // "kode" in the extracted text marks a support problem.
    assert_eq!(decision.route, Route::SupportAssistant);
    assert_eq!(recorder.intent_messages.lock().unwrap().clone(), vec![expected.clone()]);
    assert_eq!(recorder.history()[0].1, HistoryEntry::user(expected));
    assert_eq!(recorder.sent()[0].1, "Jawaban dari asisten.");
}

#[tokio::test]
async fn local_format_numbers_match_whatsapp_senders() {
    let fixture = Fixture {
        admin_numbers: vec!["0811-00".to_string()],
        intent: Intent {
            intent: IntentKind::SubscriptionInquiry,
            product: None,
            duration: None,
            issue_type: None,
        },
        ..Default::default()
    };
    assert_eq!(fixture.subscriptions[0].wa_pelanggan, "081234567890");

    let (runtime, recorder) = fixture.build("local-format").await;

    let decision = process_inbound(from_customer("langganan saya sampai kapan ya"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::SubscriptionList);
    assert!(recorder.sent()[0].1.contains("*Netflix Premium*"));

    let admin = InboundMessage::text(format!("{ADMIN}@s.whatsapp.net"), "Admin", "/list-override");
    let decision = process_inbound(admin, &runtime).await.unwrap();

    assert_eq!(decision.route, Route::OverrideCommand);
    assert_eq!(decision.replies[0].text, "✅ Tidak ada nomor yang di-disable");
}

#[tokio::test]
async fn admin_override_silences_a_number() {
    let (runtime, recorder) = Fixture::default().build("override").await;

    let admin = InboundMessage::text(format!("{ADMIN}@s.whatsapp.net"), "Admin", format!("/disable {CUSTOMER}"));
    let decision = process_inbound(admin, &runtime).await.unwrap();

    assert_eq!(decision.route, Route::OverrideCommand);
    assert_eq!(decision.replies[0].text, format!("✅ Nomor {CUSTOMER} (Budi Santoso) berhasil di-disable"));

    let decision = process_inbound(from_customer("berapa harga netflix sekarang?"), &runtime).await.unwrap();

    assert_eq!(decision.route, Route::Overridden);
    assert!(decision.replies.is_empty());
    assert_eq!(recorder.sent().len(), 1);

    let _ = std::fs::remove_file(override_path("override"));
}

#[tokio::test]
async fn admin_payment_command_extends_and_notifies() {
    let (runtime, recorder) = Fixture::default().build("payment").await;

    let admin_jid = format!("{ADMIN}@s.whatsapp.net");
    let admin = InboundMessage::text(&admin_jid, "Admin", format!("/pay {CUSTOMER} netflix-nontv-1m"));
    let decision = process_inbound(admin, &runtime).await.unwrap();

    assert_eq!(decision.route, Route::PaymentCommand);
    assert_eq!(recorder.extended.lock().unwrap().clone(), vec![(7, NaiveDate::from_ymd_opt(2026, 2, 10).unwrap())]);

    let sent = recorder.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].0, CUSTOMER_JID);
    assert_eq!(sent[1].0, admin_jid);
    assert!(sent[1].1.starts_with("✅ Berhasil extend *Budi Santoso*"));
    assert!(sent[1].1.ends_with("ID: 7"));

    // Admin commands stay out of the conversation log.
    assert!(recorder.history().is_empty());
}

#[tokio::test]
async fn unknown_customer_in_payment_command_is_reported_to_admin() {
    let (runtime, recorder) = Fixture::default().build("payment-missing").await;

    let admin = InboundMessage::text(format!("{ADMIN}@s.whatsapp.net"), "Admin", "/pay 6285555 netflix-nontv-1m");
    process_inbound(admin, &runtime).await.unwrap();

    assert!(recorder.extended.lock().unwrap().is_empty());
    assert_eq!(recorder.sent()[0].1, "❌ Customer tidak ditemukan dengan nomor: 6285555");
}

// Reminders.

#[tokio::test]
async fn reminder_run_sends_and_stamps() {
    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let candidate = |id: i64, wa: &str, reminded_h5: bool| ReminderCandidate {
        subscription_id: id,
        nama: "Budi".to_string(),
        wa_number: wa.to_string(),
        produk: "Spotify Premium".to_string(),
        end_date: NaiveDate::from_ymd_opt(2026, 3, 6).unwrap(),
        slot: None,
        group_email: Some("family@mail.test".to_string()),
        reminded_h5,
        reminded_h1: false,
    };

    let fixture = Fixture {
        expiring: vec![candidate(1, "081234567890", false), candidate(2, "", false), candidate(3, "0813", true)],
        ..Default::default()
    };
    let (runtime, recorder) = fixture.build("reminder").await;

    let service = ReminderService::new(runtime.db.clone(), runtime.chat.clone(), runtime.history.clone(), Duration::ZERO);
    let report = service.run(ReminderKind::FirstNotice, today).await.unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.sent, 1);

    let sent = recorder.sent();
    assert_eq!(sent[0].0, CUSTOMER);
    assert!(sent[0].1.contains("yg akun _family@mail.test_ akan expire di tanggal *6 Maret 2026*"));
    assert_eq!(recorder.reminded.lock().unwrap().clone(), vec![(1, ReminderKind::FirstNotice)]);
    assert_eq!(recorder.history()[0].1.role, HistoryRole::Assistant);

    let report = service.run(ReminderKind::ClearPaid, today).await.unwrap();
    assert_eq!(report.cleared, 3);
    assert_eq!(recorder.sent().len(), 1);
}

// HTTP.

async fn call(runtime: Runtime, request: Request<Body>) -> (StatusCode, Value) {
    let response = server::router(runtime).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri).header("content-type", "application/json").body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_reports_provider() {
    let (runtime, _) = Fixture::default().build("health").await;

    let (status, body) = call(runtime, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
    assert_eq!(body["provider"], "fonnte");
}

#[tokio::test]
async fn inbound_endpoint_returns_route() {
    let (runtime, _) = Fixture::default().build("inbound").await;

    let request = post_json("/inbound", json!({ "senderJid": CUSTOMER_JID, "senderName": "Budi S", "text": "ok" }));
    let (status, body) = call(runtime, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route"], "smart_silence");
}

#[tokio::test]
async fn fonnte_webhook_requires_sender() {
    let (runtime, _) = Fixture::default().build("fonnte").await;

    let (status, body) = call(runtime, post_json("/webhook", json!({ "message": "halo" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Missing sender in webhook payload." }));
}

#[tokio::test]
async fn group_data_masks_passwords() {
    let (runtime, _) = Fixture::default().build("groups").await;

    let (status, body) = call(runtime, Request::get("/data/groups").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["password"], "***");
}

#[tokio::test]
async fn availability_endpoint_counts_slots() {
    let (runtime, _) = Fixture::default().build("availability-endpoint").await;

    let (status, body) = call(runtime, Request::get("/availability").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["availability"]["Netflix Premium 1"]["filled"], 1);
    assert_eq!(body["availability"]["Netflix Premium 1"]["freeSlots"], 4);
}

#[tokio::test]
async fn trigger_reminder_validates_type() {
    let (runtime, _) = Fixture::default().build("trigger").await;

    let (status, body) = call(runtime.clone(), post_json("/trigger-reminder", json!({ "type": "h9" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid type. Use: h1, h5, or h7");

    let request = Request::post("/trigger-reminder?type=h7").body(Body::empty()).unwrap();
    let (status, body) = call(runtime, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["cleared"], 3);
}

#[tokio::test]
async fn admin_endpoints_check_credentials() {
    let (runtime, _) = Fixture::default().build("admin").await;

    let (status, _) = call(runtime.clone(), post_json("/api/admin/switch-provider", json!({ "provider": "gowa", "adminPassword": "salah" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(runtime.clone(), post_json("/admin/ingest-knowledge", json!({ "adminPhone": ADMIN, "category": "faq" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "❌ Missing required fields: category, topic, content");

    let request = post_json(
        "/admin/ingest-knowledge",
        json!({ "adminPassword": "rahasia", "category": "faq", "topic": "Garansi", "content": "Garansi full selama masa aktif." }),
    );
    let (status, body) = call(runtime, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["docId"], 42);
}
