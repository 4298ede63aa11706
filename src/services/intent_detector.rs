//! Intent detection for agent replies.
//!
//! Primary path: a language-model call with a fixed instruction set that
//! enumerates the closed intent vocabulary and its disambiguation rules.
//! On provider failure or malformed JSON the detector falls back to an
//! ordered keyword table where terminal intents are matched first, so a
//! later generic match can never mask a goodbye, transfer, or booking
//! confirmation.
//!
//! Results are cached by (reply prefix, sorted pending fields) with a
//! bounded TTL; the cache is pruned opportunistically once it exceeds its
//! size threshold.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::models::{
    recent_history, AgentIntent, ConversationTurn, DetectorConfig, FieldKey,
    IntentDetectionResult, LlmConfig,
};
use crate::domain::ports::{LlmProvider, LlmRequest};

/// Number of reply characters contributing to the cache key.
const CACHE_KEY_PREFIX_LEN: usize = 100;

/// Turns of history included in the detection prompt.
const HISTORY_TURNS: usize = 4;

const SYSTEM_PROMPT: &str = "\
You classify replies from a voice appointment-scheduling agent into exactly \
one intent from this closed vocabulary:

greeting, asking_parent_name, asking_callback_number, asking_child_name, \
asking_child_dob, asking_visit_reason, asking_medical_history, \
asking_insurance, asking_special_needs, searching_availability, \
offering_time_slot, confirming_booking, initiating_transfer, \
saying_goodbye, answering_question, unknown

Disambiguation rules:
- searching_availability vs offering_time_slot is decided solely by the \
presence of a concrete day or time token (e.g. \"Tuesday\", \"3:30 PM\"). \
Mentions of looking or checking without a concrete slot are \
searching_availability.
- confirming_booking requires an explicit statement that the appointment \
is booked, not merely an offer.
- initiating_transfer requires handing the caller to a human, not \
offering to.

Respond with strict JSON only:
{\"primary_intent\": \"...\", \"confidence\": 0.0-1.0, \
\"secondary_intents\": [\"...\"], \"is_question\": bool, \
\"requires_response\": bool, \"reasoning\": \"...\"}";

/// Raw JSON shape the provider is asked to return.
#[derive(Debug, Deserialize)]
struct RawDetection {
    primary_intent: String,
    confidence: f64,
    #[serde(default)]
    secondary_intents: Vec<String>,
    #[serde(default)]
    is_question: bool,
    #[serde(default = "default_requires_response")]
    requires_response: bool,
    #[serde(default)]
    reasoning: Option<String>,
}

fn default_requires_response() -> bool {
    true
}

struct CacheEntry {
    result: IntentDetectionResult,
    inserted_at: Instant,
}

/// Classifies agent replies into the closed intent vocabulary.
pub struct IntentDetector {
    provider: std::sync::Arc<dyn LlmProvider>,
    llm_config: LlmConfig,
    cache_ttl: Duration,
    cache_max_entries: usize,
    cache: Mutex<HashMap<String, CacheEntry>>,
    slot_token: Regex,
}

impl IntentDetector {
    pub fn new(
        provider: std::sync::Arc<dyn LlmProvider>,
        llm_config: LlmConfig,
        detector_config: &DetectorConfig,
    ) -> Self {
        Self {
            provider,
            llm_config,
            cache_ttl: Duration::from_secs(detector_config.cache_ttl_secs),
            cache_max_entries: detector_config.cache_max_entries,
            cache: Mutex::new(HashMap::new()),
            // Concrete day or clock-time token, the sole discriminator
            // between searching and offering.
            slot_token: Regex::new(
                r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|\d{1,2}(:\d{2})?\s*(am|pm))\b",
            )
            .expect("static regex"),
        }
    }

    /// Classify one agent reply given recent history and the fields the
    /// simulated caller has not yet supplied.
    #[instrument(skip(self, reply, history), fields(reply_len = reply.len()))]
    pub async fn detect(
        &self,
        reply: &str,
        history: &[ConversationTurn],
        pending_fields: &[FieldKey],
    ) -> IntentDetectionResult {
        let key = Self::cache_key(reply, pending_fields);
        if let Some(cached) = self.cache_get(&key) {
            debug!("intent cache hit");
            return cached;
        }

        let result = match self.detect_via_provider(reply, history, pending_fields).await {
            Ok(result) => result,
            Err(reason) => {
                warn!(%reason, "provider detection failed, using keyword fallback");
                self.detect_via_keywords(reply, Some(reason))
            }
        };

        self.cache_put(key, result.clone());
        result
    }

    async fn detect_via_provider(
        &self,
        reply: &str,
        history: &[ConversationTurn],
        pending_fields: &[FieldKey],
    ) -> Result<IntentDetectionResult, String> {
        let pending: Vec<&str> = pending_fields.iter().map(FieldKey::as_str).collect();
        let prompt = format!(
            "Recent conversation:\n{}\n\nFields not yet collected: [{}]\n\nAgent reply to classify:\n{reply}",
            recent_history(history, HISTORY_TURNS),
            pending.join(", "),
        );

        let response = self
            .provider
            .complete(LlmRequest {
                prompt,
                system_prompt: Some(SYSTEM_PROMPT.to_string()),
                model: self.llm_config.model.clone(),
                max_tokens: self.llm_config.max_tokens,
                temperature: 0.0,
                timeout_secs: self.llm_config.timeout_secs,
            })
            .await;

        if !response.success {
            return Err(response
                .error
                .unwrap_or_else(|| "provider reported failure".to_string()));
        }

        let content = response.content.ok_or("provider returned empty content")?;
        Self::parse_detection(&content)
    }

    /// Parse the provider's JSON, tolerating surrounding prose by slicing
    /// the outermost braces.
    fn parse_detection(content: &str) -> Result<IntentDetectionResult, String> {
        let start = content.find('{').ok_or("no JSON object in response")?;
        let end = content.rfind('}').ok_or("no JSON object in response")?;
        let raw: RawDetection = serde_json::from_str(&content[start..=end])
            .map_err(|e| format!("malformed detection JSON: {e}"))?;

        let primary_intent = AgentIntent::from_str(&raw.primary_intent)
            .ok_or_else(|| format!("unknown intent label: {}", raw.primary_intent))?;

        Ok(IntentDetectionResult {
            primary_intent,
            confidence: raw.confidence.clamp(0.0, 1.0),
            secondary_intents: raw
                .secondary_intents
                .iter()
                .filter_map(|s| AgentIntent::from_str(s))
                .collect(),
            is_question: raw.is_question,
            requires_response: raw.requires_response,
            reasoning: raw.reasoning,
        })
    }

    /// Deterministic keyword fallback with fixed priority. Terminal intents
    /// are checked before anything else.
    pub fn detect_via_keywords(
        &self,
        reply: &str,
        fallback_reason: Option<String>,
    ) -> IntentDetectionResult {
        let lower = reply.to_lowercase();

        for intent in AgentIntent::fallback_priority() {
            let matched = match intent {
                AgentIntent::SayingGoodbye => {
                    contains_any(&lower, &["goodbye", "bye", "have a great day", "take care"])
                }
                AgentIntent::InitiatingTransfer => contains_any(
                    &lower,
                    &["transfer you", "connect you", "hand you over", "to a staff member"],
                ),
                AgentIntent::ConfirmingBooking => contains_any(
                    &lower,
                    &["you're all booked", "appointment is confirmed", "booked your appointment", "all set for"],
                ),
                AgentIntent::OfferingTimeSlot => {
                    contains_any(&lower, &["available", "opening", "slot", "how about", "works for you"])
                        && self.slot_token.is_match(&lower)
                }
                AgentIntent::SearchingAvailability => contains_any(
                    &lower,
                    &["let me check", "looking for availability", "checking the schedule", "see what we have"],
                ),
                AgentIntent::AskingChildDob => {
                    contains_any(&lower, &["date of birth", "birthday", "how old", "born"])
                }
                AgentIntent::AskingParentName => {
                    contains_any(&lower, &["your name", "who am i speaking", "may i ask your name"])
                }
                AgentIntent::AskingChildName => {
                    contains_any(&lower, &["child's name", "your child's name", "name of your child", "patient's name"])
                }
                AgentIntent::AskingCallbackNumber => {
                    contains_any(&lower, &["phone number", "callback number", "number to reach"])
                }
                AgentIntent::AskingVisitReason => {
                    contains_any(&lower, &["reason for", "what brings", "why you're calling", "what's going on with"])
                }
                AgentIntent::AskingMedicalHistory => {
                    contains_any(&lower, &["medical history", "been seen here", "previous visit", "any conditions"])
                }
                AgentIntent::AskingInsurance => {
                    contains_any(&lower, &["insurance", "coverage", "carrier"])
                }
                AgentIntent::AskingSpecialNeeds => {
                    contains_any(&lower, &["special needs", "accommodations", "accessibility"])
                }
                AgentIntent::Greeting => {
                    contains_any(&lower, &["thank you for calling", "how can i help", "hello", "hi there"])
                }
                // Not keyword-matchable; reached only via provider output.
                AgentIntent::AnsweringQuestion | AgentIntent::Unknown => false,
            };

            if matched {
                let is_question = reply.contains('?');
                return IntentDetectionResult {
                    primary_intent: *intent,
                    confidence: 0.6,
                    secondary_intents: Vec::new(),
                    is_question,
                    requires_response: !intent.is_terminal(),
                    reasoning: fallback_reason
                        .clone()
                        .map(|r| format!("keyword fallback ({r})")),
                };
            }
        }

        IntentDetectionResult::unknown(
            fallback_reason
                .map(|r| format!("no keyword match ({r})"))
                .unwrap_or_else(|| "no keyword match".to_string()),
        )
    }

    fn cache_key(reply: &str, pending_fields: &[FieldKey]) -> String {
        let prefix: String = reply.chars().take(CACHE_KEY_PREFIX_LEN).collect();
        let mut fields: Vec<&str> = pending_fields.iter().map(FieldKey::as_str).collect();
        fields.sort_unstable();
        format!("{prefix}|{}", fields.join(","))
    }

    fn cache_get(&self, key: &str) -> Option<IntentDetectionResult> {
        let cache = self.cache.lock().expect("cache lock");
        cache.get(key).and_then(|entry| {
            (entry.inserted_at.elapsed() < self.cache_ttl).then(|| entry.result.clone())
        })
    }

    fn cache_put(&self, key: String, result: IntentDetectionResult) {
        let mut cache = self.cache.lock().expect("cache lock");
        if cache.len() >= self.cache_max_entries {
            Self::prune(&mut cache, self.cache_ttl, self.cache_max_entries);
        }
        cache.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries; if still over the threshold, drop the oldest
    /// entries until half the capacity is free.
    fn prune(cache: &mut HashMap<String, CacheEntry>, ttl: Duration, max_entries: usize) {
        cache.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        if cache.len() >= max_entries {
            let mut by_age: Vec<(String, Instant)> = cache
                .iter()
                .map(|(k, v)| (k.clone(), v.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, t)| *t);
            let to_remove = cache.len() - max_entries / 2;
            for (key, _) in by_age.into_iter().take(to_remove) {
                cache.remove(&key);
            }
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
