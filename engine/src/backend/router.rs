//! Backend Router
//!
//! Selects which catalog backend should handle a stage invocation based on
//! task characteristics and accumulated feedback. Selection is a pure
//! scoring pass over the catalog: given a fixed catalog, fixed feedback
//! aggregates, and fixed task text the same backend is chosen every time.
//! Each stage's selection is independent — a later stage may pick a
//! different backend than an earlier one for the same task.

use crate::catalog::{BackendCatalog, BackendProfile, Capability, CostClass};
use crate::config::RoutingConfig;
use crate::error::EngineError;
use crate::feedback::FeedbackStore;
use crate::workflow::types::{Stage, Task};
use serde::Serialize;
use std::sync::Arc;

/// Markers that flag a task as code-related
const CODING_MARKERS: &[&str] = &[
    "code",
    "function",
    "class",
    "python",
    "javascript",
    "rust",
    "api",
    "debug",
    "implement",
];

/// Markers that flag a task as requiring multilingual ability
const MULTILINGUAL_MARKERS: &[&str] = &[
    "translate",
    "language",
    "multilingual",
    "spanish",
    "french",
    "german",
];

/// Markers that flag a task as urgent
const URGENCY_MARKERS: &[&str] = &["urgent", "fast", "quick", "asap"];

/// A feedback-promoted backend outranks every unpromoted one; the base is
/// far above any priority/affinity sum so the boost always dominates.
const FEEDBACK_BOOST_BASE: f64 = 1000.0;

/// Length bucket of a task, from character count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthBucket {
    Short,
    Medium,
    Long,
}

/// Features extracted from task text, the sole input to the shortlist
#[derive(Debug, Clone, Serialize)]
pub struct TaskFeatures {
    /// Character count of the task text
    pub length: usize,

    /// Length bucket derived from the configured thresholds
    pub bucket: LengthBucket,

    /// Any coding marker present
    pub coding: bool,

    /// Any multilingual marker present
    pub multilingual: bool,

    /// Any urgency marker present
    pub urgent: bool,
}

/// Score components for one shortlisted backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendScore {
    /// Backend name
    pub backend: String,

    /// Baseline priority from the catalog profile
    pub priority: f64,

    /// Bonus for matching the task's speed/size affinity
    pub affinity: f64,

    /// Feedback promotion, 0.0 unless the backend cleared the thresholds
    pub feedback_boost: f64,

    /// Number of ratings behind the aggregate
    pub rating_count: u64,

    /// Mean rating behind the aggregate
    pub mean_rating: f64,

    /// Final score the ranking is based on
    pub total: f64,
}

/// The outcome of one `select` call, kept for observability only — it is
/// never persisted beyond the workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionDecision {
    /// Task the decision was made for
    pub task_id: String,

    /// Excerpt of the task text, truncated for logging
    pub task_excerpt: String,

    /// Stage the decision applies to
    pub stage: Stage,

    /// The chosen backend
    pub backend: String,

    /// Features the shortlist was derived from
    pub features: TaskFeatures,

    /// Scores of every shortlisted backend, best first
    pub scores: Vec<BackendScore>,
}

/// Routes stage invocations to catalog backends
pub struct BackendRouter {
    catalog: Arc<BackendCatalog>,
    feedback: Arc<FeedbackStore>,
    config: RoutingConfig,
}

impl BackendRouter {
    /// Create a new router over the given catalog and feedback store
    pub fn new(
        catalog: Arc<BackendCatalog>,
        feedback: Arc<FeedbackStore>,
        config: RoutingConfig,
    ) -> Self {
        Self {
            catalog,
            feedback,
            config,
        }
    }

    /// Extract routing features from task text
    pub fn analyze(&self, text: &str) -> TaskFeatures {
        let lower = text.to_lowercase();
        let length = text.chars().count();

        let bucket = if length > self.config.long_task_threshold {
            LengthBucket::Long
        } else if length > self.config.medium_task_threshold {
            LengthBucket::Medium
        } else {
            LengthBucket::Short
        };

        TaskFeatures {
            length,
            bucket,
            coding: CODING_MARKERS.iter().any(|m| lower.contains(m)),
            multilingual: MULTILINGUAL_MARKERS.iter().any(|m| lower.contains(m)),
            urgent: URGENCY_MARKERS.iter().any(|m| lower.contains(m)),
        }
    }

    /// Capability tags a backend must carry to be shortlisted.
    ///
    /// Long tasks always require the complex tag, and a long coding task
    /// needs the large-context backend more than a coding-tagged one, so
    /// the complex requirement replaces the coding requirement there. An
    /// empty set means the shortlist is decided by speed class alone
    /// (urgent tasks with no other requirement).
    fn requirements(&self, features: &TaskFeatures) -> Vec<Capability> {
        let mut required = Vec::new();

        if features.multilingual {
            required.push(Capability::Multilingual);
        }

        if features.bucket == LengthBucket::Long {
            required.push(Capability::Complex);
        } else if features.coding {
            required.push(Capability::Coding);
        }

        if required.is_empty() && !features.urgent {
            required.push(Capability::General);
        }

        required
    }

    /// Affinity bonus: urgent tasks strongly prefer the fastest class, and
    /// short/medium general tasks lean toward the matching size class.
    fn affinity(&self, features: &TaskFeatures, profile: &BackendProfile) -> f64 {
        let mut bonus = 0.0;

        if features.urgent && profile.cost_class == CostClass::Light {
            bonus += 50.0;
        }

        match features.bucket {
            LengthBucket::Short if profile.cost_class == CostClass::Light => bonus += 10.0,
            LengthBucket::Medium if profile.cost_class == CostClass::Medium => bonus += 10.0,
            _ => {}
        }

        bonus
    }

    /// Choose the backend for one stage invocation.
    ///
    /// Ranking: feedback-promoted backends (count and mean above the
    /// configured thresholds) outrank everything else; within a rank tier,
    /// higher mean, then higher count, then baseline priority, then context
    /// window, then name decide — the ordering is total and deterministic.
    ///
    /// Fails when no catalog backend satisfies the requirement set; the
    /// error names the unmet requirement rather than silently falling back.
    pub fn select(&self, task: &Task, stage: Stage) -> Result<SelectionDecision, EngineError> {
        let features = self.analyze(&task.text);
        let required = self.requirements(&features);

        let shortlist: Vec<&BackendProfile> = self
            .catalog
            .profiles()
            .iter()
            .filter(|profile| {
                if required.is_empty() {
                    profile.cost_class == CostClass::Light
                } else {
                    required.iter().all(|cap| profile.has(*cap))
                }
            })
            .collect();

        if shortlist.is_empty() {
            let unmet = if required.is_empty() {
                "a fastest-class backend".to_string()
            } else {
                let tags: Vec<&str> = required.iter().map(Capability::as_str).collect();
                format!("capabilities [{}]", tags.join(", "))
            };
            return Err(EngineError::ModelSelection(format!(
                "no backend provides {} for the {} stage of task {}",
                unmet, stage, task.id
            )));
        }

        let mut scores: Vec<(BackendScore, &BackendProfile)> = shortlist
            .into_iter()
            .map(|profile| {
                let aggregate = self.feedback.aggregates_for(&profile.name);
                let promoted = aggregate.count >= self.config.feedback_min_count
                    && aggregate.mean_rating >= self.config.feedback_min_mean;

                let priority = f64::from(profile.default_priority);
                let affinity = self.affinity(&features, profile);
                let feedback_boost = if promoted {
                    FEEDBACK_BOOST_BASE + aggregate.mean_rating * 10.0
                } else {
                    0.0
                };

                (
                    BackendScore {
                        backend: profile.name.clone(),
                        priority,
                        affinity,
                        feedback_boost,
                        rating_count: aggregate.count,
                        mean_rating: aggregate.mean_rating,
                        total: priority + affinity + feedback_boost,
                    },
                    profile,
                )
            })
            .collect();

        scores.sort_by(|(a, pa), (b, pb)| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.mean_rating
                        .partial_cmp(&a.mean_rating)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(b.rating_count.cmp(&a.rating_count))
                .then(pb.default_priority.cmp(&pa.default_priority))
                .then(pb.max_context.cmp(&pa.max_context))
                .then(a.backend.cmp(&b.backend))
        });

        let ranked: Vec<BackendScore> = scores.into_iter().map(|(score, _)| score).collect();
        let chosen = ranked[0].backend.clone();

        tracing::debug!(
            "Selected backend {} for {} stage of task {} (score {:.1})",
            chosen,
            stage,
            task.id,
            ranked[0].total
        );

        Ok(SelectionDecision {
            task_id: task.id.clone(),
            task_excerpt: task.text.chars().take(100).collect(),
            stage,
            backend: chosen,
            features,
            scores: ranked,
        })
    }
}
