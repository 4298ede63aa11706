//! Experiment lifecycle domain model.
//!
//! An experiment is a controlled comparison between a control variant and
//! one or more treatments, with declared traffic weights and sample-size
//! bounds. Status transitions are one-directional except pause/resume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::ExperimentError;

/// Lifecycle status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Aborted,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<ExperimentStatus> {
        match self {
            Self::Draft => vec![Self::Running, Self::Aborted],
            Self::Running => vec![Self::Paused, Self::Completed, Self::Aborted],
            Self::Paused => vec![Self::Running, Self::Aborted],
            Self::Completed | Self::Aborted => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

/// Role of a variant arm inside an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmRole {
    Control,
    Treatment,
}

impl ArmRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Treatment => "treatment",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "control" => Some(Self::Control),
            "treatment" => Some(Self::Treatment),
            _ => None,
        }
    }
}

/// One arm of an experiment: a variant, its role, and its traffic weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantArm {
    pub variant_id: Uuid,
    pub role: ArmRole,
    /// Fraction of runs assigned to this arm; weights sum to 1.0
    pub weight: f64,
}

/// Tolerance for traffic-split weight sums.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// A controlled comparison between agent configuration variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: Uuid,
    pub name: String,
    pub hypothesis: String,
    pub status: ExperimentStatus,
    pub arms: Vec<VariantArm>,
    /// Test case ids this experiment runs against
    pub test_ids: Vec<String>,
    pub min_sample_size: u32,
    pub max_sample_size: u32,
    pub significance_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_variant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(
        name: impl Into<String>,
        hypothesis: impl Into<String>,
        arms: Vec<VariantArm>,
        test_ids: Vec<String>,
        min_sample_size: u32,
        max_sample_size: u32,
        significance_threshold: f64,
    ) -> Result<Self, ExperimentError> {
        let now = Utc::now();
        let experiment = Self {
            experiment_id: Uuid::new_v4(),
            name: name.into(),
            hypothesis: hypothesis.into(),
            status: ExperimentStatus::Draft,
            arms,
            test_ids,
            min_sample_size,
            max_sample_size,
            significance_threshold,
            winning_variant_id: None,
            conclusion: None,
            created_at: now,
            updated_at: now,
        };
        experiment.validate()?;
        Ok(experiment)
    }

    /// Validate arm structure and the traffic-split invariant.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.arms.len() < 2 {
            return Err(ExperimentError::TooFewArms(self.arms.len()));
        }
        if !self.arms.iter().any(|a| a.role == ArmRole::Control) {
            return Err(ExperimentError::MissingControl);
        }
        let sum: f64 = self.arms.iter().map(|a| a.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ExperimentError::InvalidTrafficSplit(sum));
        }
        if self.min_sample_size == 0 || self.max_sample_size < self.min_sample_size {
            return Err(ExperimentError::InvalidSampleBounds {
                min: self.min_sample_size,
                max: self.max_sample_size,
            });
        }
        Ok(())
    }

    pub fn has_variant(&self, variant_id: Uuid) -> bool {
        self.arms.iter().any(|a| a.variant_id == variant_id)
    }

    pub fn control_arm(&self) -> Option<&VariantArm> {
        self.arms.iter().find(|a| a.role == ArmRole::Control)
    }

    pub fn transition_to(&mut self, new_status: ExperimentStatus) -> Result<(), ExperimentError> {
        if !self.status.can_transition_to(new_status) {
            return Err(ExperimentError::InvalidTransition {
                from: self.status,
                to: new_status,
            });
        }
        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Outcome metrics snapshot for one executed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    pub passed: bool,
    pub turn_count: u32,
    pub duration_ms: u64,
    pub goal_completion_rate: f64,
    pub constraint_violations: u32,
    pub errored: bool,
}

/// One executed test under an experiment. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRun {
    pub experiment_id: Uuid,
    pub run_id: Uuid,
    pub test_id: String,
    pub variant_id: Uuid,
    pub role: ArmRole,
    pub metrics: ExperimentMetrics,
    pub recorded_at: DateTime<Utc>,
}

/// Computed aggregate over all runs for one variant. Recomputed on demand,
/// never stored as ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantStats {
    pub variant_id: Uuid,
    pub sample_size: u32,
    pub pass_rate: f64,
    pub pass_rate_ci: (f64, f64),
    pub mean_turns: f64,
    pub median_turns: f64,
    pub std_dev_turns: f64,
    pub mean_duration_ms: f64,
    pub std_dev_duration_ms: f64,
    pub error_count: u32,
}

impl VariantStats {
    /// Neutral stats for a variant with no recorded runs.
    pub fn empty(variant_id: Uuid) -> Self {
        Self {
            variant_id,
            sample_size: 0,
            pass_rate: 0.0,
            pass_rate_ci: (0.0, 0.0),
            mean_turns: 0.0,
            median_turns: 0.0,
            std_dev_turns: 0.0,
            mean_duration_ms: 0.0,
            std_dev_duration_ms: 0.0,
            error_count: 0,
        }
    }
}

/// Why an experiment should (or should not yet) conclude.
///
/// Each reason is reported distinctly, never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConclusionReason {
    /// Max sample size reached, regardless of significance
    MaxSampleReached,
    /// Min sample size reached and the pass-rate test is significant
    SignificanceAchieved,
    /// Min sample size plus grace samples accrued with no practically
    /// meaningful difference
    NoMeaningfulDifference,
    /// Keep collecting samples
    ContinueCollecting,
}

impl ConclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxSampleReached => "max-sample-reached",
            Self::SignificanceAchieved => "significance-achieved",
            Self::NoMeaningfulDifference => "no-meaningful-difference",
            Self::ContinueCollecting => "continue-collecting",
        }
    }

    pub fn should_conclude(&self) -> bool {
        !matches!(self, Self::ContinueCollecting)
    }
}
