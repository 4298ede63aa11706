//! Persona-driven caller reply synthesis.
//!
//! Given the detected agent intent and the persona, produce the simulated
//! caller's next utterance. Field questions are answered from the persona
//! profile; slot offers are accepted; everything else gets a neutral
//! acknowledgement shaped by the persona's communication style.

use rand::Rng;

use crate::domain::models::{
    AgentIntent, CommunicationStyle, EdgeCaseDisposition, IntentDetectionResult, Persona,
    ResponseConfig,
};

/// Synthesizes caller utterances from a persona.
pub struct PersonaResponder {
    persona: Persona,
    config: ResponseConfig,
}

impl PersonaResponder {
    pub fn new(persona: Persona, config: ResponseConfig) -> Self {
        Self { persona, config }
    }

    /// The opening message for a run: the test case's literal message when
    /// set, otherwise derived from the persona.
    pub fn opening_message(&self, literal: Option<&str>) -> String {
        literal.map_or_else(|| self.persona.opening_line(), ToString::to_string)
    }

    /// Build the caller's reply to one detected agent turn. Returns `None`
    /// when no reply is warranted (terminal intents).
    pub fn reply_to(&self, detection: &IntentDetectionResult) -> Option<String> {
        let intent = detection.primary_intent;
        if intent.is_terminal() {
            return None;
        }

        let core = match intent {
            AgentIntent::Greeting => "I'd like to book an appointment for my child.".to_string(),
            AgentIntent::SearchingAvailability => "Sure, take your time.".to_string(),
            AgentIntent::OfferingTimeSlot => "Yes, that time works for us.".to_string(),
            AgentIntent::AnsweringQuestion => "Okay, that makes sense.".to_string(),
            AgentIntent::Unknown => "Sorry, could you repeat that?".to_string(),
            _ => {
                if let Some(field) = intent.asks_for() {
                    self.answer_for_field(field)
                } else {
                    "Okay.".to_string()
                }
            }
        };

        Some(self.stylize(core))
    }

    fn answer_for_field(&self, field: crate::domain::models::FieldKey) -> String {
        let value = self.persona.field_value(field).to_string();
        match self.persona.disposition {
            EdgeCaseDisposition::Cooperative | EdgeCaseDisposition::Distracted => value,
            EdgeCaseDisposition::Hesitant => {
                format!("Do you really need that? Fine, it's {value}.")
            }
        }
    }

    /// Apply the persona's communication style, with filler jitter for
    /// rambling callers.
    fn stylize(&self, core: String) -> String {
        match self.persona.style {
            CommunicationStyle::Terse => core,
            CommunicationStyle::Conversational => format!("Sure. {core}"),
            CommunicationStyle::Rambling => {
                let mut rng = rand::thread_rng();
                if rng.gen_bool(self.config.filler_chance.clamp(0.0, 1.0)) {
                    format!(
                        "Oh, let me think, we've had such a busy week. {core} Anyway, where were we?"
                    )
                } else {
                    format!("Right, so, {core}")
                }
            }
        }
    }
}
