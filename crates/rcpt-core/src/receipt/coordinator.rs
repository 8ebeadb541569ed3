//! Stage cascade: runs the matchers in order for every candidate item line.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::library::Pattern;
use super::stages::{FlexibleStage, HeuristicStage, StageMatcher, StrictStage};
use crate::models::config::{ExtractionConfig, StageConfig};
use crate::models::receipt::{MatchCandidate, StageKind};
use crate::text::NormalizedLine;

/// Resolution state of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum LineState {
    Pending,
    /// The stage ran without producing an acceptable candidate.
    Attempted(StageKind),
    /// A candidate of this stage was accepted.
    Resolved(StageKind),
    /// Not an item line, or no stage produced an acceptable candidate.
    Unresolved,
}

/// Outcome of one stage on one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    /// A candidate was produced below the stage threshold.
    Rejected,
    /// The stage did not apply to the line.
    Abstained,
}

/// Record of one stage attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAttempt {
    pub stage: StageKind,
    pub outcome: AttemptOutcome,
    pub pattern_id: Option<String>,
    pub confidence: Option<f32>,
}

/// Resolution of one normalized line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineResolution {
    pub line_index: usize,
    pub state: LineState,
    pub accepted: Option<MatchCandidate>,
    pub attempts: Vec<StageAttempt>,
    /// Candidates below threshold; kept only when diagnostics are collected.
    pub rejected: Vec<MatchCandidate>,
}

/// Outcome of running the cascade over a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordination {
    /// One resolution per input line, in line order.
    pub lines: Vec<LineResolution>,
    /// Mean confidence of accepted candidates, 0.0 without any.
    pub confidence: f32,
    /// Number of patterns offered to the stages.
    pub patterns_considered: usize,
    /// Number of those patterns that are vendor-specific.
    pub vendor_patterns: usize,
}

impl Coordination {
    /// Accepted candidates in line order.
    pub fn accepted(&self) -> impl Iterator<Item = &MatchCandidate> {
        self.lines.iter().filter_map(|l| l.accepted.as_ref())
    }

    pub fn resolved_count(&self) -> usize {
        self.accepted().count()
    }
}

/// Runs the stage chain for every line.
pub struct StageCoordinator {
    stages: Vec<Box<dyn StageMatcher>>,
    parallel: bool,
    parallel_min_lines: usize,
}

impl StageCoordinator {
    /// Build the strict, flexible and heuristic chain.
    pub fn new(config: &StageConfig) -> Self {
        let defaults = ExtractionConfig::default();
        Self {
            stages: vec![
                Box::new(StrictStage::new(config.strict_threshold)),
                Box::new(FlexibleStage::new(config.flexible_threshold)),
                Box::new(HeuristicStage::new(config.heuristic.clone())),
            ],
            parallel: defaults.parallel,
            parallel_min_lines: defaults.parallel_min_lines,
        }
    }

    /// Set parallel resolution and the item-line count from which it applies.
    pub fn with_parallelism(mut self, enabled: bool, min_lines: usize) -> Self {
        self.parallel = enabled;
        self.parallel_min_lines = min_lines;
        self
    }

    /// Insert a stage ahead of the terminal fallback.
    pub fn with_stage_before_terminal(mut self, stage: Box<dyn StageMatcher>) -> Self {
        let at = self.stages.len().saturating_sub(1);
        self.stages.insert(at, stage);
        self
    }

    /// Stage kinds in cascade order.
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.stage()).collect()
    }

    /// Resolve every line against `patterns`.
    ///
    /// Non-item lines are left unresolved. With `collect_rejected`, candidates
    /// that fell below their stage threshold are kept for diagnostics.
    pub fn coordinate(
        &self,
        lines: &[NormalizedLine],
        patterns: &[&Pattern],
        collect_rejected: bool,
    ) -> Coordination {
        let item_lines = lines.iter().filter(|l| l.is_item()).count();

        let parallel = self.parallel && item_lines >= self.parallel_min_lines;
        let resolutions: Vec<LineResolution> = if parallel {
            debug!("Resolving {} item lines in parallel", item_lines);
            lines
                .par_iter()
                .map(|line| self.resolve_line(line, patterns, collect_rejected))
                .collect()
        } else {
            lines
                .iter()
                .map(|line| self.resolve_line(line, patterns, collect_rejected))
                .collect()
        };

        let accepted: Vec<f32> = resolutions
            .iter()
            .filter_map(|r| r.accepted.as_ref().map(|c| c.confidence))
            .collect();
        let confidence = if accepted.is_empty() {
            0.0
        } else {
            accepted.iter().sum::<f32>() / accepted.len() as f32
        };

        Coordination {
            lines: resolutions,
            confidence,
            patterns_considered: patterns.len(),
            vendor_patterns: patterns.iter().filter(|p| !p.is_generic()).count(),
        }
    }

    fn resolve_line(
        &self,
        line: &NormalizedLine,
        patterns: &[&Pattern],
        collect_rejected: bool,
    ) -> LineResolution {
        let mut resolution = LineResolution {
            line_index: line.index,
            state: LineState::Pending,
            accepted: None,
            attempts: Vec::new(),
            rejected: Vec::new(),
        };

        if !line.is_item() {
            resolution.state = LineState::Unresolved;
            return resolution;
        }

        for stage in &self.stages {
            let kind = stage.stage();
            resolution.state = LineState::Attempted(kind);

            let Some(candidate) = stage.attempt(line, patterns) else {
                resolution.attempts.push(StageAttempt {
                    stage: kind,
                    outcome: AttemptOutcome::Abstained,
                    pattern_id: None,
                    confidence: None,
                });
                continue;
            };

            let accepted = candidate.confidence >= stage.threshold();
            resolution.attempts.push(StageAttempt {
                stage: kind,
                outcome: if accepted {
                    AttemptOutcome::Accepted
                } else {
                    AttemptOutcome::Rejected
                },
                pattern_id: Some(candidate.pattern_id.clone()),
                confidence: Some(candidate.confidence),
            });

            if accepted {
                debug!(
                    "Line {} resolved at {} by {} ({:.2})",
                    line.index, kind, candidate.pattern_id, candidate.confidence
                );
                resolution.state = LineState::Resolved(kind);
                resolution.accepted = Some(candidate);
                return resolution;
            }

            if collect_rejected {
                resolution.rejected.push(candidate);
            }
        }

        debug!("Line {} unresolved after {} stages", line.index, resolution.attempts.len());
        resolution.state = LineState::Unresolved;
        resolution
    }
}

impl Default for StageCoordinator {
    fn default() -> Self {
        Self::new(&StageConfig::default())
    }
}
