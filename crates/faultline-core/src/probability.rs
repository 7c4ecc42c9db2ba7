//! Top-event probability over a set of minimal cut sets.
//!
//! Three quantification methods: the rare-event approximation, the min-cut
//! upper bound, and truncated inclusion-exclusion (the default, exact when
//! the truncation depth reaches the cut-set count). Literal probability is
//! `p` for a positive literal and `1 - p` for a negated one; house events
//! never reach this stage.
//!
//! Numeric policy: sums are accumulated smallest-first to limit
//! cancellation, results are clamped to [0, 1], and a non-finite
//! intermediate surfaces as a `numeric` error so the caller can degrade
//! the metric instead of aborting the target.

use crate::analysis::AnalysisContext;
use crate::graph::Literal;
use crate::mocus::{CutSet, CutSetCollection};
use crate::settings::Approximation;
use crate::{AnalysisError, AnalysisResult};

/// Evaluates cut-set probabilities against one probability assignment.
pub struct ProbabilityCalculator<'a> {
    /// Per-variable probabilities, index-aligned (slot 0 unused).
    probabilities: &'a [f64],
}

impl<'a> ProbabilityCalculator<'a> {
    pub fn new(probabilities: &'a [f64]) -> Self {
        Self { probabilities }
    }

    pub fn literal_probability(&self, literal: Literal) -> f64 {
        let p = self.probabilities[literal.index()];
        if literal.is_complement() {
            1.0 - p
        } else {
            p
        }
    }

    /// Product of the literal probabilities of one cut set.
    pub fn cut_set_probability(&self, cut_set: &CutSet) -> f64 {
        cut_set
            .literals()
            .iter()
            .map(|&l| self.literal_probability(l))
            .product()
    }

    /// `P ~ sum P(cut)`; an upper bound for coherent trees, accurate when
    /// every probability is small.
    pub fn rare_event(&self, sets: &CutSetCollection) -> f64 {
        let mut terms: Vec<f64> = sets
            .cut_sets()
            .iter()
            .map(|c| self.cut_set_probability(c))
            .collect();
        terms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        terms.iter().sum()
    }

    /// Min-cut upper bound: `P ~ 1 - prod(1 - P(cut))`.
    pub fn mcub(&self, sets: &CutSetCollection) -> f64 {
        1.0 - sets
            .cut_sets()
            .iter()
            .map(|c| 1.0 - self.cut_set_probability(c))
            .product::<f64>()
    }

    /// Inclusion-exclusion truncated at `num_sums` terms:
    /// `P = sum_k (-1)^(k+1) sum_{|S|=k} P(and of S)`.
    pub fn inclusion_exclusion(&self, sets: &CutSetCollection, num_sums: u32) -> f64 {
        let count = sets.len();
        let depth = (num_sums as usize).min(count);
        let mut level_sums = Vec::with_capacity(depth);
        for k in 1..=depth {
            level_sums.push(self.level_sum(sets.cut_sets(), k));
        }
        // Combine the alternating series smallest-magnitude-first.
        let mut terms: Vec<f64> = level_sums
            .into_iter()
            .enumerate()
            .map(|(i, sum)| if i % 2 == 0 { sum } else { -sum })
            .collect();
        terms.sort_by(|a, b| {
            a.abs()
                .partial_cmp(&b.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        terms.iter().sum()
    }

    /// Sum of `P(intersection)` over all k-subsets of the cut sets.
    fn level_sum(&self, sets: &[CutSet], k: usize) -> f64 {
        let mut total = 0.0;
        let mut union: Vec<Literal> = Vec::new();
        self.level_sum_recurse(sets, 0, k, &mut union, 1.0, &mut total);
        total
    }

    fn level_sum_recurse(
        &self,
        sets: &[CutSet],
        start: usize,
        remaining: usize,
        union: &mut Vec<Literal>,
        product: f64,
        total: &mut f64,
    ) {
        if remaining == 0 {
            *total += product;
            return;
        }
        for i in start..=sets.len() - remaining {
            let mut added = 0;
            let mut factor = product;
            let mut contradictory = false;
            for &literal in sets[i].literals() {
                if union.contains(&!literal) {
                    contradictory = true;
                    break;
                }
                if !union.contains(&literal) {
                    union.push(literal);
                    added += 1;
                    factor *= self.literal_probability(literal);
                }
            }
            if !contradictory {
                self.level_sum_recurse(sets, i + 1, remaining - 1, union, factor, total);
            }
            union.truncate(union.len() - added);
        }
    }

    /// Quantifies the top-event probability with the configured method,
    /// clamping to [0, 1] and converting non-finite results into a
    /// `numeric` error.
    pub fn evaluate(
        &self,
        sets: &CutSetCollection,
        approximation: Approximation,
        num_sums: u32,
        ctx: &AnalysisContext,
    ) -> AnalysisResult<f64> {
        if sets.is_tautology() {
            return Ok(1.0);
        }
        if sets.is_contradiction() {
            return Ok(0.0);
        }
        let raw = match approximation {
            Approximation::RareEvent => self.rare_event(sets),
            Approximation::Mcub => self.mcub(sets),
            Approximation::None => self.inclusion_exclusion(sets, num_sums),
        };
        if !raw.is_finite() {
            return Err(AnalysisError::Numeric {
                target: ctx.target().to_string(),
                metric: "top-event probability".into(),
            });
        }
        Ok(raw.clamp(0.0, 1.0))
    }
}
