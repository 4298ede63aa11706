//! Experiment lifecycle management.
//!
//! Creates draft experiments from trigger recommendations, walks them
//! through the status machine, assigns variants to runs by traffic
//! weight, records per-run metrics, and evaluates conclusion evidence
//! through the statistics service. Variant stats are always recomputed
//! from the recorded runs, never cached as ground truth.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::error::ExperimentError;
use crate::domain::models::{
    ArmRole, ConclusionReason, Experiment, ExperimentConfig, ExperimentMetrics, ExperimentRun,
    ExperimentStatus, GoalTestResult, TestStatus, Variant, VariantArm, VariantStats,
};
use crate::domain::ports::{ExperimentStore, StoreError};
use crate::services::statistics::{mean, median, std_dev, PassRateComparison, StatisticsService};
use crate::services::trigger_service::ExperimentRecommendation;

/// Confidence level used for reported variant confidence intervals.
const STATS_CONFIDENCE: f64 = 0.95;

#[derive(Error, Debug)]
pub enum ExperimentServiceError {
    #[error(transparent)]
    Domain(#[from] ExperimentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No baseline variant registered for target file '{0}'")]
    NoBaseline(String),

    #[error("Experiment {experiment_id} is {status:?}, expected Running")]
    NotRunning {
        experiment_id: Uuid,
        status: ExperimentStatus,
    },
}

/// Aggregate conclusion evidence for one experiment.
#[derive(Debug, Clone)]
pub struct ConclusionCheck {
    pub reason: ConclusionReason,
    pub comparison: PassRateComparison,
    /// The variant that would win if concluded now. `None` when no arm
    /// separates from the others.
    pub winning_variant_id: Option<Uuid>,
    pub control_stats: VariantStats,
    pub treatment_stats: Vec<VariantStats>,
}

/// Drives experiments from draft through conclusion.
pub struct ExperimentService {
    store: Arc<dyn ExperimentStore>,
    stats: StatisticsService,
    config: ExperimentConfig,
}

impl ExperimentService {
    pub fn new(store: Arc<dyn ExperimentStore>, config: ExperimentConfig) -> Self {
        Self {
            store,
            stats: StatisticsService::new(),
            config,
        }
    }

    /// Create a draft experiment from a trigger recommendation.
    ///
    /// The control arm is the current baseline variant for the target
    /// file; the treatment arm is the proposed content, deduplicated by
    /// content hash. Traffic is split evenly.
    #[instrument(skip(self, recommendation), fields(target = %recommendation.target_file))]
    pub async fn create_from_recommendation(
        &self,
        name: impl Into<String> + std::fmt::Debug,
        recommendation: &ExperimentRecommendation,
        test_ids: Vec<String>,
    ) -> Result<Experiment, ExperimentServiceError> {
        let control = self
            .store
            .baseline_for(&recommendation.target_file)
            .await?
            .ok_or_else(|| {
                ExperimentServiceError::NoBaseline(recommendation.target_file.clone())
            })?;

        let mut treatment = Variant::new(
            recommendation.variant_type,
            recommendation.target_file.clone(),
            recommendation.proposed_content.clone(),
        );
        treatment.baseline_variant_id = Some(control.variant_id);
        let treatment = self.store.upsert_variant(&treatment).await?;

        let arms = vec![
            VariantArm {
                variant_id: control.variant_id,
                role: ArmRole::Control,
                weight: 0.5,
            },
            VariantArm {
                variant_id: treatment.variant_id,
                role: ArmRole::Treatment,
                weight: 0.5,
            },
        ];

        let experiment = Experiment::new(
            name,
            recommendation.hypothesis.clone(),
            arms,
            test_ids,
            recommendation.min_sample_size,
            self.config.max_sample_size,
            self.config.significance_threshold,
        )?;

        self.store.insert_experiment(&experiment).await?;
        info!(experiment_id = %experiment.experiment_id, "experiment drafted");
        Ok(experiment)
    }

    pub async fn start(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.transition(experiment_id, ExperimentStatus::Running).await
    }

    pub async fn pause(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.transition(experiment_id, ExperimentStatus::Paused).await
    }

    pub async fn resume(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.transition(experiment_id, ExperimentStatus::Running).await
    }

    pub async fn abort(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.transition(experiment_id, ExperimentStatus::Aborted).await
    }

    async fn transition(
        &self,
        experiment_id: Uuid,
        new_status: ExperimentStatus,
    ) -> Result<Experiment, ExperimentServiceError> {
        let mut experiment = self.load(experiment_id).await?;
        experiment.transition_to(new_status)?;
        self.store.update_experiment(&experiment).await?;
        info!(%experiment_id, status = new_status.as_str(), "experiment transitioned");
        Ok(experiment)
    }

    /// Pick the variant for the next run by traffic weight.
    pub fn select_variant(&self, experiment: &Experiment) -> Uuid {
        let roll: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let mut cumulative = 0.0;
        for arm in &experiment.arms {
            cumulative += arm.weight;
            if roll < cumulative {
                return arm.variant_id;
            }
        }
        // Floating point slack at the top of the range lands on the last arm.
        experiment.arms[experiment.arms.len() - 1].variant_id
    }

    /// Record one executed test run under an experiment.
    ///
    /// The experiment must be running and the variant must be one of its
    /// arms. Recording is idempotent per `(run_id, test_id)`.
    #[instrument(skip(self, result), fields(%experiment_id, %variant_id, test_id = %result.test_id))]
    pub async fn record_run(
        &self,
        experiment_id: Uuid,
        variant_id: Uuid,
        run_id: Uuid,
        result: &GoalTestResult,
    ) -> Result<(), ExperimentServiceError> {
        let experiment = self.load(experiment_id).await?;
        if experiment.status != ExperimentStatus::Running {
            return Err(ExperimentServiceError::NotRunning {
                experiment_id,
                status: experiment.status,
            });
        }
        let arm = experiment
            .arms
            .iter()
            .find(|a| a.variant_id == variant_id)
            .ok_or(ExperimentError::VariantNotInExperiment {
                experiment_id,
                variant_id,
            })?;

        let run = ExperimentRun {
            experiment_id,
            run_id,
            test_id: result.test_id.clone(),
            variant_id,
            role: arm.role,
            metrics: Self::metrics_from_result(result),
            recorded_at: chrono::Utc::now(),
        };
        self.store.append_run(&run).await?;
        Ok(())
    }

    fn metrics_from_result(result: &GoalTestResult) -> ExperimentMetrics {
        ExperimentMetrics {
            passed: result.passed,
            turn_count: result.turn_count,
            duration_ms: result.duration_ms,
            goal_completion_rate: result.goal_completion_rate(),
            constraint_violations: result.constraint_violations.len() as u32,
            errored: result.status == TestStatus::Error,
        }
    }

    /// Recompute per-variant aggregates from the recorded runs.
    pub async fn variant_stats(
        &self,
        experiment_id: Uuid,
    ) -> Result<Vec<VariantStats>, ExperimentServiceError> {
        let experiment = self.load(experiment_id).await?;
        let runs = self.store.runs_for_experiment(experiment_id).await?;

        Ok(experiment
            .arms
            .iter()
            .map(|arm| self.stats_for_arm(arm.variant_id, &runs))
            .collect())
    }

    fn stats_for_arm(&self, variant_id: Uuid, runs: &[ExperimentRun]) -> VariantStats {
        let arm_runs: Vec<&ExperimentRun> =
            runs.iter().filter(|r| r.variant_id == variant_id).collect();
        if arm_runs.is_empty() {
            return VariantStats::empty(variant_id);
        }

        let n = arm_runs.len() as u32;
        let passes = arm_runs.iter().filter(|r| r.metrics.passed).count() as u32;
        let turns: Vec<f64> = arm_runs
            .iter()
            .map(|r| f64::from(r.metrics.turn_count))
            .collect();
        let durations: Vec<f64> = arm_runs
            .iter()
            .map(|r| r.metrics.duration_ms as f64)
            .collect();

        VariantStats {
            variant_id,
            sample_size: n,
            pass_rate: f64::from(passes) / f64::from(n),
            pass_rate_ci: self.stats.proportion_ci(passes, n, STATS_CONFIDENCE),
            mean_turns: mean(&turns),
            median_turns: median(&turns),
            std_dev_turns: std_dev(&turns),
            mean_duration_ms: mean(&durations),
            std_dev_duration_ms: std_dev(&durations),
            error_count: arm_runs.iter().filter(|r| r.metrics.errored).count() as u32,
        }
    }

    /// Evaluate whether the experiment has enough evidence to conclude.
    ///
    /// The control arm is compared against the treatment arm with the
    /// highest observed pass rate.
    #[instrument(skip(self), fields(%experiment_id))]
    pub async fn check_conclusion(
        &self,
        experiment_id: Uuid,
    ) -> Result<ConclusionCheck, ExperimentServiceError> {
        let experiment = self.load(experiment_id).await?;
        let runs = self.store.runs_for_experiment(experiment_id).await?;

        let control_arm = experiment
            .control_arm()
            .ok_or(ExperimentError::MissingControl)?;
        let control_stats = self.stats_for_arm(control_arm.variant_id, &runs);

        let treatment_stats: Vec<VariantStats> = experiment
            .arms
            .iter()
            .filter(|a| a.role == ArmRole::Treatment)
            .map(|a| self.stats_for_arm(a.variant_id, &runs))
            .collect();

        let best_treatment = treatment_stats
            .iter()
            .max_by(|a, b| {
                a.pass_rate
                    .partial_cmp(&b.pass_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .unwrap_or_else(|| VariantStats::empty(Uuid::nil()));

        let control_passes =
            (control_stats.pass_rate * f64::from(control_stats.sample_size)).round() as u32;
        let treatment_passes =
            (best_treatment.pass_rate * f64::from(best_treatment.sample_size)).round() as u32;

        let recommendation = self.stats.recommend_conclusion(
            control_passes,
            control_stats.sample_size,
            treatment_passes,
            best_treatment.sample_size,
            experiment.min_sample_size,
            experiment.max_sample_size,
            experiment.significance_threshold,
            self.config.practical_delta,
            self.config.grace_samples,
        );

        let winning_variant_id = if recommendation.pass_rate_comparison.significant {
            if best_treatment.pass_rate > control_stats.pass_rate {
                Some(best_treatment.variant_id)
            } else {
                Some(control_stats.variant_id)
            }
        } else {
            None
        };

        Ok(ConclusionCheck {
            reason: recommendation.reason,
            comparison: recommendation.pass_rate_comparison,
            winning_variant_id,
            control_stats,
            treatment_stats,
        })
    }

    /// Conclude the experiment if the evidence warrants it.
    ///
    /// Returns the updated experiment; its status is unchanged when the
    /// recommendation is to keep collecting.
    #[instrument(skip(self), fields(%experiment_id))]
    pub async fn conclude_if_ready(
        &self,
        experiment_id: Uuid,
    ) -> Result<(Experiment, ConclusionCheck), ExperimentServiceError> {
        let check = self.check_conclusion(experiment_id).await?;
        let mut experiment = self.load(experiment_id).await?;

        if !check.reason.should_conclude() {
            return Ok((experiment, check));
        }

        experiment.transition_to(ExperimentStatus::Completed)?;
        experiment.winning_variant_id = check.winning_variant_id;
        experiment.conclusion = Some(format!(
            "{}: control pass rate {:.3} ({} runs), best treatment pass rate {:.3} ({} runs), p = {:.4}",
            check.reason.as_str(),
            check.control_stats.pass_rate,
            check.control_stats.sample_size,
            check
                .treatment_stats
                .iter()
                .map(|s| s.pass_rate)
                .fold(0.0, f64::max),
            check
                .treatment_stats
                .iter()
                .map(|s| s.sample_size)
                .max()
                .unwrap_or(0),
            check.comparison.p_value,
        ));
        self.store.update_experiment(&experiment).await?;
        info!(
            reason = check.reason.as_str(),
            winner = ?experiment.winning_variant_id,
            "experiment concluded"
        );
        Ok((experiment, check))
    }

    /// Promote a concluded experiment's winner to be the baseline for its
    /// target file. A no-op store change happens when the control won.
    #[instrument(skip(self), fields(%experiment_id))]
    pub async fn adopt_winner(
        &self,
        experiment_id: Uuid,
    ) -> Result<Variant, ExperimentServiceError> {
        let experiment = self.load(experiment_id).await?;
        let winner_id = experiment
            .winning_variant_id
            .ok_or(ExperimentError::NoWinner(experiment_id))?;

        let winner = self
            .store
            .get_variant(winner_id)
            .await?
            .ok_or(ExperimentError::VariantNotFound(winner_id))?;

        self.store.set_baseline(winner_id).await?;
        info!(variant_id = %winner_id, target = %winner.target_file, "winner adopted as baseline");
        Ok(winner)
    }

    pub async fn get(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.load(experiment_id).await
    }

    pub async fn variant(&self, variant_id: Uuid) -> Result<Variant, ExperimentServiceError> {
        Ok(self
            .store
            .get_variant(variant_id)
            .await?
            .ok_or(ExperimentError::VariantNotFound(variant_id))?)
    }

    pub async fn list(&self) -> Result<Vec<Experiment>, ExperimentServiceError> {
        Ok(self.store.list_experiments().await?)
    }

    async fn load(&self, experiment_id: Uuid) -> Result<Experiment, ExperimentServiceError> {
        self.store
            .get_experiment(experiment_id)
            .await?
            .ok_or_else(|| {
                warn!(%experiment_id, "experiment not found");
                ExperimentError::ExperimentNotFound(experiment_id).into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::VariantType;
    use crate::services::trigger_service::ImpactLevel;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        variants: Mutex<HashMap<Uuid, Variant>>,
        experiments: Mutex<HashMap<Uuid, Experiment>>,
        runs: Mutex<Vec<ExperimentRun>>,
    }

    #[async_trait]
    impl ExperimentStore for MemoryStore {
        async fn upsert_variant(&self, variant: &Variant) -> Result<Variant, StoreError> {
            let mut variants = self.variants.lock().unwrap();
            if let Some(existing) = variants.values().find(|v| {
                v.target_file == variant.target_file && v.content_hash == variant.content_hash
            }) {
                return Ok(existing.clone());
            }
            variants.insert(variant.variant_id, variant.clone());
            Ok(variant.clone())
        }

        async fn get_variant(&self, variant_id: Uuid) -> Result<Option<Variant>, StoreError> {
            Ok(self.variants.lock().unwrap().get(&variant_id).cloned())
        }

        async fn baseline_for(&self, target_file: &str) -> Result<Option<Variant>, StoreError> {
            Ok(self
                .variants
                .lock()
                .unwrap()
                .values()
                .find(|v| v.target_file == target_file && v.is_baseline)
                .cloned())
        }

        async fn set_baseline(&self, variant_id: Uuid) -> Result<(), StoreError> {
            let mut variants = self.variants.lock().unwrap();
            let target = variants
                .get(&variant_id)
                .map(|v| v.target_file.clone())
                .ok_or_else(|| StoreError::NotFound(variant_id.to_string()))?;
            for v in variants.values_mut() {
                if v.target_file == target {
                    v.is_baseline = v.variant_id == variant_id;
                }
            }
            Ok(())
        }

        async fn insert_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
            self.experiments
                .lock()
                .unwrap()
                .insert(experiment.experiment_id, experiment.clone());
            Ok(())
        }

        async fn update_experiment(&self, experiment: &Experiment) -> Result<(), StoreError> {
            self.insert_experiment(experiment).await
        }

        async fn get_experiment(
            &self,
            experiment_id: Uuid,
        ) -> Result<Option<Experiment>, StoreError> {
            Ok(self.experiments.lock().unwrap().get(&experiment_id).cloned())
        }

        async fn list_experiments(&self) -> Result<Vec<Experiment>, StoreError> {
            Ok(self.experiments.lock().unwrap().values().cloned().collect())
        }

        async fn append_run(&self, run: &ExperimentRun) -> Result<(), StoreError> {
            let mut runs = self.runs.lock().unwrap();
            if !runs
                .iter()
                .any(|r| r.run_id == run.run_id && r.test_id == run.test_id)
            {
                runs.push(run.clone());
            }
            Ok(())
        }

        async fn runs_for_experiment(
            &self,
            experiment_id: Uuid,
        ) -> Result<Vec<ExperimentRun>, StoreError> {
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.experiment_id == experiment_id)
                .cloned()
                .collect())
        }
    }

    fn recommendation() -> ExperimentRecommendation {
        ExperimentRecommendation {
            impact: ImpactLevel::High,
            hypothesis: "fix improves pass rate".to_string(),
            target_file: "prompts/scheduling.md".to_string(),
            variant_type: VariantType::Prompt,
            proposed_content: "offer two concrete times".to_string(),
            min_sample_size: 20,
        }
    }

    fn result(test_id: &str, passed: bool) -> GoalTestResult {
        GoalTestResult {
            test_id: test_id.to_string(),
            passed,
            status: TestStatus::Completed,
            goal_results: vec![],
            constraint_violations: vec![],
            turn_count: 8,
            duration_ms: 4200,
            issues: vec![],
            transcript: vec![],
            stop_reason: "goals-satisfied".to_string(),
            error_message: None,
        }
    }

    async fn setup() -> (ExperimentService, Arc<MemoryStore>, Experiment) {
        let store = Arc::new(MemoryStore::default());
        let mut baseline = Variant::new(
            VariantType::Prompt,
            "prompts/scheduling.md",
            "current content",
        );
        baseline.is_baseline = true;
        store.upsert_variant(&baseline).await.unwrap();

        let service = ExperimentService::new(store.clone(), ExperimentConfig::default());
        let experiment = service
            .create_from_recommendation("slot fix", &recommendation(), vec!["t1".to_string()])
            .await
            .unwrap();
        (service, store, experiment)
    }

    #[tokio::test]
    async fn draft_has_control_and_treatment() {
        let (_, _, experiment) = setup().await;
        assert_eq!(experiment.status, ExperimentStatus::Draft);
        assert_eq!(experiment.arms.len(), 2);
        assert!(experiment.control_arm().is_some());
    }

    #[tokio::test]
    async fn identical_proposed_content_reuses_variant() {
        let (service, _, first) = setup().await;
        let second = service
            .create_from_recommendation("again", &recommendation(), vec![])
            .await
            .unwrap();
        let treatment_of = |e: &Experiment| {
            e.arms
                .iter()
                .find(|a| a.role == ArmRole::Treatment)
                .unwrap()
                .variant_id
        };
        assert_eq!(treatment_of(&first), treatment_of(&second));
    }

    #[tokio::test]
    async fn record_run_rejects_foreign_variant() {
        let (service, _, experiment) = setup().await;
        service.start(experiment.experiment_id).await.unwrap();
        let err = service
            .record_run(
                experiment.experiment_id,
                Uuid::new_v4(),
                Uuid::new_v4(),
                &result("t1", true),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExperimentServiceError::Domain(ExperimentError::VariantNotInExperiment { .. })
        ));
    }

    #[tokio::test]
    async fn record_run_requires_running_status() {
        let (service, _, experiment) = setup().await;
        let control = experiment.control_arm().unwrap().variant_id;
        let err = service
            .record_run(experiment.experiment_id, control, Uuid::new_v4(), &result("t1", true))
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentServiceError::NotRunning { .. }));
    }

    #[tokio::test]
    async fn significant_split_concludes_and_adopts_treatment() {
        let (service, _, experiment) = setup().await;
        service.start(experiment.experiment_id).await.unwrap();

        let control = experiment.control_arm().unwrap().variant_id;
        let treatment = experiment
            .arms
            .iter()
            .find(|a| a.role == ArmRole::Treatment)
            .unwrap()
            .variant_id;

        // 18/20 vs 8/20 is strongly significant under the chi-square test.
        for i in 0..20 {
            service
                .record_run(
                    experiment.experiment_id,
                    treatment,
                    Uuid::new_v4(),
                    &result(&format!("t{i}"), i < 18),
                )
                .await
                .unwrap();
            service
                .record_run(
                    experiment.experiment_id,
                    control,
                    Uuid::new_v4(),
                    &result(&format!("t{i}"), i < 8),
                )
                .await
                .unwrap();
        }

        let (concluded, check) = service
            .conclude_if_ready(experiment.experiment_id)
            .await
            .unwrap();
        assert_eq!(check.reason, ConclusionReason::SignificanceAchieved);
        assert_eq!(concluded.status, ExperimentStatus::Completed);
        assert_eq!(concluded.winning_variant_id, Some(treatment));

        let adopted = service.adopt_winner(experiment.experiment_id).await.unwrap();
        assert_eq!(adopted.variant_id, treatment);
        assert!(service
            .store
            .baseline_for("prompts/scheduling.md")
            .await
            .unwrap()
            .map(|v| v.variant_id == treatment)
            .unwrap_or(false));
    }

    #[tokio::test]
    async fn stats_recomputed_from_runs() {
        let (service, _, experiment) = setup().await;
        service.start(experiment.experiment_id).await.unwrap();
        let control = experiment.control_arm().unwrap().variant_id;

        for i in 0..4 {
            service
                .record_run(
                    experiment.experiment_id,
                    control,
                    Uuid::new_v4(),
                    &result(&format!("t{i}"), i % 2 == 0),
                )
                .await
                .unwrap();
        }

        let stats = service.variant_stats(experiment.experiment_id).await.unwrap();
        let control_stats = stats.iter().find(|s| s.variant_id == control).unwrap();
        assert_eq!(control_stats.sample_size, 4);
        assert!((control_stats.pass_rate - 0.5).abs() < 1e-9);
        assert!((control_stats.mean_turns - 8.0).abs() < 1e-9);
    }

    #[test]
    fn weighted_selection_respects_degenerate_split() {
        let arms = vec![
            VariantArm {
                variant_id: Uuid::new_v4(),
                role: ArmRole::Control,
                weight: 1.0,
            },
            VariantArm {
                variant_id: Uuid::new_v4(),
                role: ArmRole::Treatment,
                weight: 0.0,
            },
        ];
        let control_id = arms[0].variant_id;
        let experiment =
            Experiment::new("e", "h", arms, vec![], 10, 50, 0.05).unwrap();
        let service = ExperimentService::new(
            Arc::new(MemoryStore::default()),
            ExperimentConfig::default(),
        );
        for _ in 0..50 {
            assert_eq!(service.select_variant(&experiment), control_id);
        }
    }
}
