//! Synthetic caller personas.
//!
//! A persona is the immutable profile that drives the simulated side of a
//! conversation: who is calling, on behalf of which child, and how they
//! talk. Supplied per test case and never mutated during a run.

use serde::{Deserialize, Serialize};

use super::progress::FieldKey;

/// How verbose and direct the simulated caller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStyle {
    /// Short, direct answers
    Terse,
    /// Natural answers with some filler
    #[default]
    Conversational,
    /// Long-winded answers that bury the requested information
    Rambling,
}

/// Disposition toward edge-case behavior during the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCaseDisposition {
    /// Answers every question as asked
    #[default]
    Cooperative,
    /// Occasionally answers a different question than the one asked
    Distracted,
    /// Pushes back on requests before eventually complying
    Hesitant,
}

/// Immutable profile of a simulated caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Parent/guardian name
    pub parent_name: String,
    /// Callback phone number
    pub callback_number: String,
    /// Child's name
    pub child_name: String,
    /// Child's date of birth, spoken form (e.g. "March 4th, 2019")
    pub child_dob: String,
    /// Reason for the visit
    pub visit_reason: String,
    /// Relevant medical history summary
    pub medical_history: String,
    /// Insurance provider name
    pub insurance_provider: String,
    /// Accessibility or special needs note ("none" is valid)
    pub special_needs: String,
    #[serde(default)]
    pub style: CommunicationStyle,
    #[serde(default)]
    pub disposition: EdgeCaseDisposition,
}

impl Persona {
    /// The persona's answer for a collectible field.
    pub fn field_value(&self, field: FieldKey) -> &str {
        match field {
            FieldKey::ParentName => &self.parent_name,
            FieldKey::CallbackNumber => &self.callback_number,
            FieldKey::ChildName => &self.child_name,
            FieldKey::ChildDob => &self.child_dob,
            FieldKey::VisitReason => &self.visit_reason,
            FieldKey::MedicalHistory => &self.medical_history,
            FieldKey::InsuranceProvider => &self.insurance_provider,
            FieldKey::SpecialNeeds => &self.special_needs,
        }
    }

    /// A default opening line when the test case does not supply one.
    pub fn opening_line(&self) -> String {
        format!(
            "Hi, I'd like to schedule an appointment for my child {}.",
            self.child_name
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_persona() -> Persona {
    Persona {
        parent_name: "Dana Reyes".to_string(),
        callback_number: "555-0132".to_string(),
        child_name: "Milo".to_string(),
        child_dob: "March 4th, 2019".to_string(),
        visit_reason: "persistent cough".to_string(),
        medical_history: "mild asthma, no surgeries".to_string(),
        insurance_provider: "Blue Shield".to_string(),
        special_needs: "none".to_string(),
        style: CommunicationStyle::Conversational,
        disposition: EdgeCaseDisposition::Cooperative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_values_cover_every_key() {
        let persona = sample_persona();
        for field in FieldKey::ALL {
            assert!(!persona.field_value(field).is_empty());
        }
    }
}
