//! Experiment trigger assessment.
//!
//! Rule-based classifier that decides whether a proposed configuration
//! fix is impactful enough to warrant a formal experiment, and drafts the
//! experiment parameters when it is. Rules are evaluated in a fixed
//! order; the first matching rule assigns the impact level.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::models::VariantType;

/// What kind of change a proposed fix makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Prompt/instruction content change
    Prompt,
    /// Configuration parameter change
    ConfigParameter,
    /// Cosmetic wording change with no behavioral intent
    Cosmetic,
}

/// A proposed fix to agent configuration, as assessed by upstream failure
/// analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixProposal {
    pub target_file: String,
    pub change_kind: ChangeKind,
    /// Section names the fix touches (e.g. "call_flow")
    #[serde(default)]
    pub touched_sections: Vec<String>,
    /// Function names the fix touches (e.g. "book_appointment")
    #[serde(default)]
    pub touched_functions: Vec<String>,
    /// Analyzer confidence in the fix, in [0, 1]
    pub confidence: f64,
    /// Number of tests the analyzed failure affected
    pub affected_tests: u32,
    /// Short description of the failure being fixed
    pub description: String,
    /// Replacement content for the target file
    pub proposed_content: String,
}

/// Impact level assigned by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// Skip: no experiment warranted
    Minimal,
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Minimum per-arm sample size an experiment at this impact needs.
    pub fn min_sample_size(&self) -> Option<u32> {
        match self {
            Self::High => Some(20),
            Self::Medium => Some(15),
            Self::Low => Some(10),
            Self::Minimal => None,
        }
    }
}

/// Drafted parameters for an experiment the trigger recommends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRecommendation {
    pub impact: ImpactLevel,
    pub hypothesis: String,
    pub target_file: String,
    pub variant_type: VariantType,
    pub proposed_content: String,
    pub min_sample_size: u32,
}

/// Outcome of assessing one fix proposal.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerAssessment {
    pub impact: ImpactLevel,
    pub rationale: String,
    /// Present only for low/medium/high impact
    pub recommendation: Option<ExperimentRecommendation>,
}

/// Tunable thresholds and recognized names for the rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRules {
    /// Section names whose changes are always high impact
    pub core_sections: Vec<String>,
    /// Function names whose changes are always high impact
    pub critical_functions: Vec<String>,
    /// Prompt changes at or above this confidence are medium impact
    pub prompt_confidence_floor: f64,
    /// Cosmetic changes at or above this confidence are low impact
    pub cosmetic_confidence_floor: f64,
    /// Below this confidence nothing but core/critical matches
    pub min_confidence: f64,
    /// Fixes affecting fewer tests than this are minimal
    pub min_affected_tests: u32,
}

impl Default for TriggerRules {
    fn default() -> Self {
        Self {
            core_sections: vec![
                "identity".to_string(),
                "call_flow".to_string(),
                "booking_rules".to_string(),
                "safety".to_string(),
            ],
            critical_functions: vec![
                "book_appointment".to_string(),
                "transfer_call".to_string(),
                "verify_insurance".to_string(),
                "collect_patient_info".to_string(),
            ],
            prompt_confidence_floor: 0.7,
            cosmetic_confidence_floor: 0.8,
            min_confidence: 0.5,
            min_affected_tests: 1,
        }
    }
}

/// Decides whether a fix warrants a formal experiment.
pub struct TriggerService {
    rules: TriggerRules,
}

impl TriggerService {
    pub fn new(rules: TriggerRules) -> Self {
        Self { rules }
    }

    pub fn with_defaults() -> Self {
        Self::new(TriggerRules::default())
    }

    /// Assign an impact level and, for non-minimal impacts, draft the
    /// recommended experiment.
    #[instrument(skip(self, proposal), fields(target = %proposal.target_file))]
    pub fn assess(&self, proposal: &FixProposal) -> TriggerAssessment {
        let (impact, rationale) = self.classify(proposal);
        debug!(impact = impact.as_str(), %rationale, "fix assessed");

        let recommendation = impact.min_sample_size().map(|min_sample_size| {
            ExperimentRecommendation {
                impact,
                hypothesis: format!(
                    "Applying the proposed fix to {} improves the pass rate ({})",
                    proposal.target_file, proposal.description
                ),
                target_file: proposal.target_file.clone(),
                variant_type: match proposal.change_kind {
                    ChangeKind::ConfigParameter => VariantType::Config,
                    ChangeKind::Prompt | ChangeKind::Cosmetic => VariantType::Prompt,
                },
                proposed_content: proposal.proposed_content.clone(),
                min_sample_size,
            }
        });

        TriggerAssessment {
            impact,
            rationale,
            recommendation,
        }
    }

    fn classify(&self, proposal: &FixProposal) -> (ImpactLevel, String) {
        // Rule 1: core sections and critical functions are high impact
        // regardless of confidence.
        if let Some(section) = proposal
            .touched_sections
            .iter()
            .find(|s| self.rules.core_sections.iter().any(|c| c.eq_ignore_ascii_case(s)))
        {
            return (
                ImpactLevel::High,
                format!("touches core section '{section}'"),
            );
        }
        if let Some(function) = proposal
            .touched_functions
            .iter()
            .find(|f| {
                self.rules
                    .critical_functions
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(f))
            })
        {
            return (
                ImpactLevel::High,
                format!("touches critical function '{function}'"),
            );
        }

        // Rule 2: configuration parameter changes are medium.
        if proposal.change_kind == ChangeKind::ConfigParameter {
            return (
                ImpactLevel::Medium,
                "configuration parameter change".to_string(),
            );
        }

        // Rule 3: non-core prompt changes need analyzer confidence.
        if proposal.change_kind == ChangeKind::Prompt
            && proposal.confidence >= self.rules.prompt_confidence_floor
        {
            return (
                ImpactLevel::Medium,
                format!(
                    "prompt change at confidence {:.2}",
                    proposal.confidence
                ),
            );
        }

        // Rule 4: cosmetic changes are low only with strong confidence.
        if proposal.change_kind == ChangeKind::Cosmetic {
            return if proposal.confidence >= self.rules.cosmetic_confidence_floor {
                (
                    ImpactLevel::Low,
                    format!("cosmetic change at confidence {:.2}", proposal.confidence),
                )
            } else {
                (
                    ImpactLevel::Minimal,
                    "cosmetic change below the confidence floor".to_string(),
                )
            };
        }

        // Rule 5: everything else below the floor thresholds is minimal.
        if proposal.confidence < self.rules.min_confidence
            || proposal.affected_tests < self.rules.min_affected_tests
        {
            return (
                ImpactLevel::Minimal,
                "below minimum confidence/affected-test threshold".to_string(),
            );
        }

        (ImpactLevel::Minimal, "no rule matched".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal(change_kind: ChangeKind, confidence: f64) -> FixProposal {
        FixProposal {
            target_file: "prompts/scheduling.md".to_string(),
            change_kind,
            touched_sections: vec![],
            touched_functions: vec![],
            confidence,
            affected_tests: 3,
            description: "slot offers missing concrete times".to_string(),
            proposed_content: "updated content".to_string(),
        }
    }

    #[test]
    fn core_section_is_high_regardless_of_confidence() {
        let service = TriggerService::with_defaults();
        let mut p = proposal(ChangeKind::Cosmetic, 0.1);
        p.touched_sections = vec!["call_flow".to_string()];
        let assessment = service.assess(&p);
        assert_eq!(assessment.impact, ImpactLevel::High);
        assert_eq!(assessment.recommendation.unwrap().min_sample_size, 20);
    }

    #[test]
    fn critical_function_is_high() {
        let service = TriggerService::with_defaults();
        let mut p = proposal(ChangeKind::Prompt, 0.2);
        p.touched_functions = vec!["book_appointment".to_string()];
        assert_eq!(service.assess(&p).impact, ImpactLevel::High);
    }

    #[test]
    fn config_parameter_change_is_medium() {
        let service = TriggerService::with_defaults();
        let assessment = service.assess(&proposal(ChangeKind::ConfigParameter, 0.4));
        assert_eq!(assessment.impact, ImpactLevel::Medium);
        assert_eq!(assessment.recommendation.unwrap().min_sample_size, 15);
    }

    #[test]
    fn prompt_change_needs_confidence() {
        let service = TriggerService::with_defaults();
        assert_eq!(
            service.assess(&proposal(ChangeKind::Prompt, 0.75)).impact,
            ImpactLevel::Medium
        );
        assert_eq!(
            service.assess(&proposal(ChangeKind::Prompt, 0.6)).impact,
            ImpactLevel::Minimal
        );
    }

    #[test]
    fn cosmetic_split_on_confidence() {
        let service = TriggerService::with_defaults();
        let low = service.assess(&proposal(ChangeKind::Cosmetic, 0.85));
        assert_eq!(low.impact, ImpactLevel::Low);
        assert_eq!(low.recommendation.unwrap().min_sample_size, 10);

        let minimal = service.assess(&proposal(ChangeKind::Cosmetic, 0.7));
        assert_eq!(minimal.impact, ImpactLevel::Minimal);
        assert!(minimal.recommendation.is_none());
    }
}
