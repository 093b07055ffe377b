//! Rule engine for multi-criteria dispatching.
//!
//! Composes multiple dispatching rules with configurable evaluation modes
//! and tie-breaking strategies. Every rule scores a candidate exactly once
//! per decision, so stateful rules (random) stay consistent within it.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::trace;

use super::{Dispatcher, DispatchingRule, RuleScore, SchedulingContext};
use crate::error::{JobShopError, Result};
use crate::models::Operation;
use crate::validation::ValidationErrorKind;

/// How multiple rules are combined.
#[derive(Debug, Clone, Default)]
pub enum EvaluationMode {
    /// Apply rules in sequence; use next rule only on ties.
    #[default]
    Sequential,
    /// Compute weighted sum of all rule scores.
    Weighted,
}

/// How ties are broken after all rules are exhausted.
#[derive(Debug, Clone, Default)]
pub enum TieBreaker {
    /// Keep candidate order (job order for dispatcher candidates).
    #[default]
    NextRule,
    /// Lowest operation id.
    ById,
}

#[derive(Clone)]
struct WeightedRule {
    rule: Arc<dyn DispatchingRule>,
    weight: f64,
}

/// A composable rule engine for operation prioritization.
///
/// Supports sequential multi-layer evaluation (primary rule → tie-breaker)
/// and weighted combination modes.
///
/// # Example
/// ```
/// use jobshop_dispatch::dispatching::{rules, RuleEngine};
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Mwkr)
///     .with_tie_breaker(rules::Spt);
/// assert_eq!(engine.len(), 2);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<WeightedRule>,
    mode: EvaluationMode,
    tie_breaker: TieBreaker,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            mode: EvaluationMode::Sequential,
            tie_breaker: TieBreaker::NextRule,
            epsilon: 1e-9,
        }
    }

    /// Adds a primary rule (weight 1.0).
    pub fn with_rule<R: DispatchingRule + 'static>(self, rule: R) -> Self {
        self.with_shared_rule(Arc::new(rule), 1.0)
    }

    /// Adds a weighted rule.
    pub fn with_weighted_rule<R: DispatchingRule + 'static>(self, rule: R, weight: f64) -> Self {
        self.with_shared_rule(Arc::new(rule), weight)
    }

    /// Adds a tie-breaking rule (weight 0.0, used only in Sequential mode).
    pub fn with_tie_breaker<R: DispatchingRule + 'static>(self, rule: R) -> Self {
        self.with_shared_rule(Arc::new(rule), 0.0)
    }

    /// Adds an already shared rule with the given weight.
    pub fn with_shared_rule(mut self, rule: Arc<dyn DispatchingRule>, weight: f64) -> Self {
        self.rules.push(WeightedRule { rule, weight });
        self
    }

    /// Sets the evaluation mode.
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the final tie-breaking strategy.
    pub fn with_final_tie_breaker(mut self, tie_breaker: TieBreaker) -> Self {
        self.tie_breaker = tie_breaker;
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|wr| wr.rule.name()).collect()
    }

    /// Sorts operations by priority (highest priority first).
    ///
    /// Returns indices into the original slice; equal operations keep
    /// their relative order.
    pub fn sort_indices(&self, operations: &[&Operation], context: &SchedulingContext) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..operations.len()).collect();
        if operations.is_empty() {
            return indices;
        }

        match &self.mode {
            EvaluationMode::Sequential => {
                let scores = self.score_table(operations, context);
                indices.sort_by(|&a, &b| self.compare_sequential(&scores, operations, a, b));
            }
            EvaluationMode::Weighted => {
                let scores = self.weighted_scores(operations, context);
                indices.sort_by(|&a, &b| {
                    scores[a]
                        .partial_cmp(&scores[b])
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| self.final_order(operations, a, b))
                });
            }
        }

        indices
    }

    /// Returns the index of the highest-priority operation.
    ///
    /// In sequential mode each rule narrows the candidates to those within
    /// epsilon of its best score; the first survivor wins.
    pub fn select_best(&self, operations: &[&Operation], context: &SchedulingContext) -> Option<usize> {
        if operations.is_empty() {
            return None;
        }
        match &self.mode {
            EvaluationMode::Sequential => {
                let scores = self.score_table(operations, context);
                let mut candidates: Vec<usize> = (0..operations.len()).collect();
                for rule_scores in &scores {
                    if candidates.len() == 1 {
                        break;
                    }
                    let best = candidates
                        .iter()
                        .map(|&i| rule_scores[i])
                        .fold(f64::INFINITY, f64::min);
                    candidates.retain(|&i| (rule_scores[i] - best).abs() <= self.epsilon);
                }
                candidates
                    .into_iter()
                    .min_by(|&a, &b| self.final_order(operations, a, b))
            }
            EvaluationMode::Weighted => self.sort_indices(operations, context).first().copied(),
        }
    }

    /// Picks the next operation among the dispatcher's available ones.
    pub fn select<'a>(&self, dispatcher: &'a Dispatcher) -> Result<&'a Operation> {
        let candidates = dispatcher.available_operations();
        let context = SchedulingContext::from_dispatcher(dispatcher);
        let best = self.select_best(&candidates, &context).ok_or_else(|| {
            JobShopError::validation(
                ValidationErrorKind::EmptyCandidates,
                "no available operations to choose from",
            )
        })?;
        trace!(
            operation_id = candidates[best].operation_id,
            candidates = candidates.len(),
            "rule engine selected operation"
        );
        Ok(candidates[best])
    }

    /// Evaluates a single operation and returns weighted scores from each rule.
    pub fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|wr| wr.rule.evaluate(operation, context) * wr.weight)
            .collect()
    }

    /// `scores[rule][candidate]`, unweighted.
    fn score_table(&self, operations: &[&Operation], context: &SchedulingContext) -> Vec<Vec<RuleScore>> {
        self.rules
            .iter()
            .map(|wr| operations.iter().map(|op| wr.rule.evaluate(op, context)).collect())
            .collect()
    }

    fn weighted_scores(&self, operations: &[&Operation], context: &SchedulingContext) -> Vec<f64> {
        operations
            .iter()
            .map(|op| self.evaluate(op, context).into_iter().sum())
            .collect()
    }

    fn compare_sequential(&self, scores: &[Vec<RuleScore>], operations: &[&Operation], a: usize, b: usize) -> Ordering {
        for rule_scores in scores {
            let (score_a, score_b) = (rule_scores[a], rule_scores[b]);
            if (score_a - score_b).abs() > self.epsilon {
                return score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal);
            }
        }
        self.final_order(operations, a, b)
    }

    fn final_order(&self, operations: &[&Operation], a: usize, b: usize) -> Ordering {
        match &self.tie_breaker {
            TieBreaker::NextRule => a.cmp(&b),
            TieBreaker::ById => operations[a].operation_id.cmp(&operations[b].operation_id),
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field(
                "rules",
                &self
                    .rules
                    .iter()
                    .map(|r| format!("{}(w={})", r.rule.name(), r.weight))
                    .collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .finish()
    }
}
