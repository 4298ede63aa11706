//! Agent intent vocabulary.
//!
//! Every reply from the agent under test is classified into exactly one
//! primary intent from this closed set. The flow-state mapper matches on
//! the enum exhaustively, so adding a variant forces every consumer to
//! declare a transition (possibly a no-op).

use serde::{Deserialize, Serialize};

use super::progress::FieldKey;

/// What the agent under test is asking or doing in a given turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentIntent {
    /// Opening greeting, no information requested yet
    Greeting,
    /// Asking for the parent/guardian's name
    AskingParentName,
    /// Asking for a callback phone number
    AskingCallbackNumber,
    /// Asking for the child's name
    AskingChildName,
    /// Asking for the child's date of birth
    AskingChildDob,
    /// Asking why the appointment is needed
    AskingVisitReason,
    /// Asking about prior visits or medical history
    AskingMedicalHistory,
    /// Asking for insurance details
    AskingInsurance,
    /// Asking about accessibility or special needs
    AskingSpecialNeeds,
    /// Looking for availability without naming a concrete slot
    SearchingAvailability,
    /// Offering a specific day/time slot
    OfferingTimeSlot,
    /// Confirming the booking is made
    ConfirmingBooking,
    /// Handing the caller off to a human
    InitiatingTransfer,
    /// Ending the call
    SayingGoodbye,
    /// Answering a caller question without requesting anything
    AnsweringQuestion,
    /// Could not be classified
    Unknown,
}

impl AgentIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::AskingParentName => "asking_parent_name",
            Self::AskingCallbackNumber => "asking_callback_number",
            Self::AskingChildName => "asking_child_name",
            Self::AskingChildDob => "asking_child_dob",
            Self::AskingVisitReason => "asking_visit_reason",
            Self::AskingMedicalHistory => "asking_medical_history",
            Self::AskingInsurance => "asking_insurance",
            Self::AskingSpecialNeeds => "asking_special_needs",
            Self::SearchingAvailability => "searching_availability",
            Self::OfferingTimeSlot => "offering_time_slot",
            Self::ConfirmingBooking => "confirming_booking",
            Self::InitiatingTransfer => "initiating_transfer",
            Self::SayingGoodbye => "saying_goodbye",
            Self::AnsweringQuestion => "answering_question",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "greeting" => Some(Self::Greeting),
            "asking_parent_name" => Some(Self::AskingParentName),
            "asking_callback_number" => Some(Self::AskingCallbackNumber),
            "asking_child_name" => Some(Self::AskingChildName),
            "asking_child_dob" | "asking_date_of_birth" => Some(Self::AskingChildDob),
            "asking_visit_reason" => Some(Self::AskingVisitReason),
            "asking_medical_history" => Some(Self::AskingMedicalHistory),
            "asking_insurance" => Some(Self::AskingInsurance),
            "asking_special_needs" => Some(Self::AskingSpecialNeeds),
            "searching_availability" => Some(Self::SearchingAvailability),
            "offering_time_slot" => Some(Self::OfferingTimeSlot),
            "confirming_booking" => Some(Self::ConfirmingBooking),
            "initiating_transfer" => Some(Self::InitiatingTransfer),
            "saying_goodbye" => Some(Self::SayingGoodbye),
            "answering_question" => Some(Self::AnsweringQuestion),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Intents that end the simulated conversation.
    ///
    /// `ConfirmingBooking` and `InitiatingTransfer` are terminal for the
    /// simulator even though only one of them may satisfy a declared goal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SayingGoodbye | Self::ConfirmingBooking | Self::InitiatingTransfer
        )
    }

    /// The data field this intent is requesting, if any.
    pub fn asks_for(&self) -> Option<FieldKey> {
        match self {
            Self::AskingParentName => Some(FieldKey::ParentName),
            Self::AskingCallbackNumber => Some(FieldKey::CallbackNumber),
            Self::AskingChildName => Some(FieldKey::ChildName),
            Self::AskingChildDob => Some(FieldKey::ChildDob),
            Self::AskingVisitReason => Some(FieldKey::VisitReason),
            Self::AskingMedicalHistory => Some(FieldKey::MedicalHistory),
            Self::AskingInsurance => Some(FieldKey::InsuranceProvider),
            Self::AskingSpecialNeeds => Some(FieldKey::SpecialNeeds),
            _ => None,
        }
    }

    /// All variants, in fallback-match priority order (terminal intents first).
    pub fn fallback_priority() -> &'static [AgentIntent] {
        &[
            Self::SayingGoodbye,
            Self::InitiatingTransfer,
            Self::ConfirmingBooking,
            Self::OfferingTimeSlot,
            Self::SearchingAvailability,
            Self::AskingChildDob,
            Self::AskingParentName,
            Self::AskingChildName,
            Self::AskingCallbackNumber,
            Self::AskingVisitReason,
            Self::AskingMedicalHistory,
            Self::AskingInsurance,
            Self::AskingSpecialNeeds,
            Self::Greeting,
        ]
    }
}

/// Outcome of classifying one agent reply.
///
/// Derived data: consumed immediately by the progress tracker, never
/// persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDetectionResult {
    pub primary_intent: AgentIntent,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub secondary_intents: Vec<AgentIntent>,
    /// Whether the reply is phrased as a question
    pub is_question: bool,
    /// Whether the simulated caller should respond
    pub requires_response: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl IntentDetectionResult {
    /// Safe default used when both the provider and the fallback fail to
    /// produce a classification.
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            primary_intent: AgentIntent::Unknown,
            confidence: 0.1,
            secondary_intents: Vec::new(),
            is_question: false,
            requires_response: true,
            reasoning: Some(reasoning.into()),
        }
    }
}
