//! Intent routing and response arbitration for inbound WhatsApp messages.
//!
//! Every inbound message runs through a fixed sequence of checks. Cheap keyword filters run
//! first, then the language model classifies what is left, and a final arbitration step picks
//! exactly one reply (or none).

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::types::{HistoryEntry, InboundMessage, Intent, IntentContext, IntentKind, KnowledgeEntry, MediaKind, OutgoingMessage, PricingItem, ReplyContext, Res, phone, wib},
    runtime::Runtime,
};

use super::{
    availability::{compute_availability, detect_products, display_name},
    commands::{parse_override_command, parse_payment_command},
    filters,
    payment::{apply_payment, plan_payment},
    templates,
};

/// Which branch of the pipeline produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    PaymentProof,
    Overridden,
    OverrideCommand,
    PaymentCommand,
    Deferred,
    SmartSilence,
    NewSubscription,
    CategoryOverview,
    PaymentInfo,
    SubscriptionList,
    PricingTemplate,
    SupportAssistant,
    Availability,
    Minimal,
    Assistant,
}

/// The outcome of processing one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub route: Route,
    pub replies: Vec<OutgoingMessage>,
}

impl Decision {
    fn silent(route: Route) -> Self {
        Self { route, replies: Vec::new() }
    }

    fn reply(route: Route, chat_id: &str, text: impl Into<String>) -> Self {
        Self { route, replies: vec![OutgoingMessage::new(chat_id, text)] }
    }
}

/// Runs the routing pipeline against the runtime's services.
pub struct Pipeline<'a> {
    runtime: &'a Runtime,
}

impl<'a> Pipeline<'a> {
    pub fn new(runtime: &'a Runtime) -> Self {
        Self { runtime }
    }

    /// Decides how to answer `message`; replies are returned, not sent.
    #[instrument(name = "Pipeline::process", skip_all, fields(sender = %message.sender_jid))]
    pub async fn process(&self, message: &InboundMessage) -> Res<Decision> {
        let rt = self.runtime;
        let chat_id = if message.chat_jid.is_empty() { message.sender_jid.as_str() } else { message.chat_jid.as_str() };
        let phone = phone::normalize(&phone::from_jid(&message.sender_jid));
        let sender_name = message.sender_name.trim();

        // Media: payment proofs short-circuit, anything else becomes text.

        let mut text = message.text.clone();

        if let Some(media_url) = message.media_url.as_deref().filter(|url| !url.is_empty()) {
            if message.media_kind != Some(MediaKind::Document) {
                match rt.llm.analyze_payment_proof(media_url).await {
                    Ok(proof) if proof.is_payment_proof => {
                        info!("Payment proof received.");

                        let name = self.display_name(&phone, sender_name).await;
                        let reply = templates::payment_proof_received(&name, &proof.details);
                        rt.history.record(&phone, &[HistoryEntry::user(format!("[Sent IMAGE] {sender_name}")), HistoryEntry::assistant(&reply)]).await;

                        return Ok(Decision::reply(Route::PaymentProof, chat_id, reply));
                    }
                    Ok(_) => {}
                    Err(err) => warn!("Payment proof analysis failed: {err}"),
                }
            }

            let extracted = rt.llm.extract_image_text(media_url).await.unwrap_or_else(|err| {
                warn!("Image text extraction failed: {err}");
                templates::UNREADABLE_IMAGE.to_string()
            });

            text = templates::media_text(&text, &extracted);
        }

        let name = self.display_name(&phone, sender_name).await;

        info!("Incoming message from {name} ({phone}).");

        // Muted numbers get nothing.

        if rt.overrides.contains(&phone).await {
            info!("Number {phone} is in the override list.");
            return Ok(Decision::silent(Route::Overridden));
        }

        // Admin commands.

        if rt.config.is_admin(&phone) && text.trim_start().starts_with('/') {
            if let Some(command) = parse_override_command(&text) {
                let subscriptions = rt.catalog.subscriptions().await;
                let reply = rt.overrides.execute(&command, &subscriptions).await;

                return Ok(Decision::reply(Route::OverrideCommand, chat_id, reply));
            }

            if let Some(command) = parse_payment_command(&text) {
                let (subscriptions, groups) = futures::join!(rt.catalog.subscriptions(), rt.catalog.groups());

                let replies = match plan_payment(&command, &subscriptions, &groups, wib::today()) {
                    Ok(plan) => match apply_payment(&plan, chat_id, &rt.db, &rt.catalog).await {
                        Ok(replies) => replies,
                        Err(err) => {
                            error!("Error applying payment: {err}");
                            vec![OutgoingMessage::new(chat_id, format!("❌ Error: {err}"))]
                        }
                    },
                    Err(reply) => vec![OutgoingMessage::new(chat_id, reply)],
                };

                return Ok(Decision { route: Route::PaymentCommand, replies });
            }
        }

        // Reference data.

        let (pricing, subscriptions, groups) = futures::join!(rt.catalog.pricing(), rt.catalog.subscriptions(), rt.catalog.groups());

        let availability = compute_availability(&groups, &subscriptions);
        let registered = !phone.is_empty() && subscriptions.iter().any(|subscription| phone::normalize(&subscription.wa_pelanggan) == phone);

        // Defer.

        let deferring = filters::is_deferring(&text);

        if deferring && registered {
            let reply = templates::deferred(&name);
            self.record_exchange(&phone, &text, &reply).await;

            return Ok(Decision::reply(Route::Deferred, chat_id, reply));
        }

        let history = rt.history.load(&phone).await;

        // Smart silence keeps the message but does not answer it.

        if filters::should_skip_short_message(&text) {
            info!("Smart silence for a short message.");
            rt.history.record(&phone, &[HistoryEntry::user(&text)]).await;

            return Ok(Decision::silent(Route::SmartSilence));
        }

        let already_asked = filters::detect_previous_clarification(&history);
        let bad_momentum = filters::detect_bad_momentum(&history);
        let confidence = filters::product_confidence(&text, &history);

        // New subscriptions go to a human.

        if filters::is_new_subscription_request(&text) && !registered {
            let reply = templates::new_subscription(if sender_name.is_empty() { "ka" } else { sender_name });
            self.record_exchange(&phone, &text, &reply).await;

            return Ok(Decision::reply(Route::NewSubscription, chat_id, reply));
        }

        // Knowledge and intent.

        let knowledge = rt.knowledge.search(&text, rt.config.knowledge_top_k).await.unwrap_or_else(|err| {
            warn!("Knowledge search failed: {err}");
            Vec::new()
        });

        let products: Vec<String> = pricing.iter().map(|item| item.product.clone()).collect::<BTreeSet<_>>().into_iter().collect();

        let intent_context = IntentContext {
            products,
            history: history.clone(),
            message: text.clone(),
            confidence,
            already_asked,
            bad_momentum,
        };

        let intent = rt.llm.extract_intent(&intent_context).await.unwrap_or_else(|err| {
            warn!("Intent extraction failed: {err}");
            Intent::unclear()
        });

        info!("Intent: {:?} (product: {:?}, confidence: {confidence}).", intent.intent, intent.product);

        // Vague openers get the category overview instead of a clarifying question.

        if filters::is_vague_question(&text) {
            let greeting = if registered { name.as_str() } else { sender_name };
            let reply = templates::category_overview(Some(greeting).filter(|greeting| !greeting.is_empty()));
            self.record_exchange(&phone, &text, &reply).await;

            return Ok(Decision::reply(Route::CategoryOverview, chat_id, reply));
        }

        // Explicit renewal confirmation.

        if filters::is_confirming_renewal(&text) && registered && !deferring {
            let reply = rt.config.payment_instructions.clone();
            self.record_exchange(&phone, &text, &reply).await;

            return Ok(Decision::reply(Route::PaymentInfo, chat_id, reply));
        }

        // Direct answers.

        let mut answered: Option<(Route, String)> = None;

        if intent.intent == IntentKind::SubscriptionInquiry && registered {
            let own = rt.db.customer_subscriptions(&phone).await.unwrap_or_else(|err| {
                warn!("Subscription lookup failed: {err}");
                Vec::new()
            });

            let reply = if own.is_empty() { templates::no_subscriptions(&name) } else { templates::subscription_list(&own, wib::today()) };
            answered = Some((Route::SubscriptionList, reply));
        }

        let needs_support = filters::needs_support(&text);

        if intent.intent == IntentKind::PriceInquiry && !needs_support {
            let items = filter_pricing(&pricing, intent.product.as_deref());
            let nudge = if registered { self.renewal_nudge(&phone, intent.product.as_deref()).await } else { None };

            let customer = if registered { name.as_str() } else { sender_name };
            let reply = templates::pricing_list(Some(customer).filter(|customer| !customer.is_empty()), &items, nudge.as_deref());
            answered = Some((Route::PricingTemplate, reply));
        }

        let detected = if !matches!(intent.intent, IntentKind::PriceInquiry | IntentKind::SubscriptionInquiry) && registered && !needs_support {
            detect_products(&text, &availability)
        } else {
            Vec::new()
        };

        // Arbitration.

        let (route, reply) = if let Some(answer) = answered {
            answer
        } else if needs_support {
            (Route::SupportAssistant, self.assistant_reply(&text, &name, knowledge, history).await)
        } else if let Some(first) = detected.first() {
            let available = detected.iter().any(|group| availability.get(group).is_some_and(|info| info.available));
            (Route::Availability, templates::availability_reply(&display_name(first), available))
        } else if !registered {
            (Route::Minimal, templates::MINIMAL_REPLY.to_string())
        } else {
            (Route::Assistant, self.assistant_reply(&text, &name, knowledge, history).await)
        };

        self.record_exchange(&phone, &text, &reply).await;

        Ok(Decision::reply(route, chat_id, reply))
    }

    /// First name from the database, else the WhatsApp display name, else `ka`.
    async fn display_name(&self, phone: &str, sender_name: &str) -> String {
        match self.runtime.db.lookup_customer_name(phone).await {
            Ok(Some(name)) if !name.trim().is_empty() => templates::first_name(Some(&name)),
            Ok(_) => templates::first_name(Some(sender_name)),
            Err(err) => {
                warn!("Customer name lookup failed: {err}");
                templates::first_name(Some(sender_name))
            }
        }
    }

    async fn renewal_nudge(&self, phone: &str, product: Option<&str>) -> Option<String> {
        let product = product.filter(|product| !product.is_empty())?;

        let candidate = match self.runtime.db.find_renewal_candidate(phone, product).await {
            Ok(candidate) => candidate?,
            Err(err) => {
                warn!("Renewal lookup failed: {err}");
                return None;
            }
        };

        let days_left = (candidate.end_membership? - wib::today()).num_days();
        templates::renewal_nudge(&templates::first_name(Some(&candidate.nama)), product, days_left)
    }

    async fn assistant_reply(&self, text: &str, name: &str, knowledge: Vec<KnowledgeEntry>, history: Vec<HistoryEntry>) -> String {
        let context = ReplyContext {
            message: text.to_string(),
            customer_name: Some(name.to_string()),
            knowledge,
            history,
        };

        self.runtime.llm.generate_reply(&context).await.unwrap_or_else(|err| {
            error!("Reply generation failed: {err}");
            templates::LLM_APOLOGY.to_string()
        })
    }

    async fn record_exchange(&self, phone: &str, text: &str, reply: &str) {
        self.runtime.history.record(phone, &[HistoryEntry::user(text), HistoryEntry::assistant(reply)]).await;
    }
}

/// Pricing rows for the product the customer asked about, or everything when nothing matches.
pub fn filter_pricing(pricing: &[PricingItem], product: Option<&str>) -> Vec<PricingItem> {
    let Some(filter) = product.map(|product| product.trim().to_lowercase()).filter(|product| !product.is_empty()) else {
        return pricing.to_vec();
    };

    let filtered: Vec<_> = pricing
        .iter()
        .filter(|item| {
            let lower = item.product.to_lowercase();
            lower.contains(&filter) || lower.split(' ').next() == Some(filter.as_str())
        })
        .cloned()
        .collect();

    if filtered.is_empty() { pricing.to_vec() } else { filtered }
}

// Entry points.

/// Processes a message in the background, sending the replies when done.
#[instrument(skip_all)]
pub fn handle_inbound(message: InboundMessage, runtime: Runtime) {
    tokio::spawn(async move {
        // Process the message.
        let result = process_inbound(message, &runtime).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

/// Processes a message and sends the replies through the active provider.
#[instrument(skip_all)]
pub async fn process_inbound(message: InboundMessage, runtime: &Runtime) -> Res<Decision> {
    let decision = Pipeline::new(runtime).process(&message).await?;

    for reply in &decision.replies {
        if let Err(err) = runtime.chat.send_message(&reply.chat_id, &reply.text).await {
            error!("Failed to send reply to {}: {err}", reply.chat_id);
        }
    }

    info!("Handled message via {:?} with {} reply(ies).", decision.route, decision.replies.len());

    Ok(decision)
}

// Tests.
