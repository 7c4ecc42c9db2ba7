//! Common-cause failure groups and their Boolean expansion.
//!
//! A CCF group couples the failures of its member events under a parametric
//! model. Expansion is a pure rewrite performed before graph construction:
//! every size-k subset of the group (the sizes depend on the model) becomes a
//! synthetic basic event whose probability expression is derived from the
//! group's level factors, and each original member is replaced by the OR of
//! all synthetic events containing it. Factor expressions are shared by the
//! synthetic events, so uncertainty analysis resamples them coherently.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::event::BasicEvent;
use crate::expression::{EvalContext, Expression};
use crate::{ModelError, ModelResult};

/// Parametric common-cause model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CcfModel {
    /// One factor beta: total failure splits into an independent part and a
    /// single all-members common part.
    BetaFactor,
    /// Multiple Greek letters: factors g2..gn.
    Mgl,
    /// Alpha factors a1..an over failure multiplicities.
    AlphaFactor,
    /// Phi factors: direct level fractions summing to one.
    PhiFactor,
}

impl std::fmt::Display for CcfModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CcfModel::BetaFactor => "beta-factor",
            CcfModel::Mgl => "MGL",
            CcfModel::AlphaFactor => "alpha-factor",
            CcfModel::PhiFactor => "phi-factor",
        };
        f.write_str(name)
    }
}

/// A group of basic events failing together under a common-cause model.
#[derive(Debug)]
pub struct CcfGroup {
    id: String,
    model: CcfModel,
    members: Vec<Arc<BasicEvent>>,
    /// Total failure probability of one member, shared by the group.
    distribution: Arc<Expression>,
    /// Level factors; the expected count depends on the model.
    factors: Vec<Arc<Expression>>,
}

/// The outcome of expanding one or more CCF groups.
#[derive(Debug, Default)]
pub struct CcfExpansion {
    /// Original member id -> OR-list of synthetic replacement events.
    substitutions: IndexMap<String, Vec<Arc<BasicEvent>>>,
}

impl CcfExpansion {
    /// The replacement OR-list for a member event, if it belongs to an
    /// expanded group.
    pub fn substitution(&self, event_id: &str) -> Option<&[Arc<BasicEvent>]> {
        self.substitutions.get(event_id).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Merges the expansion of another group into this one.
    pub fn merge(&mut self, other: CcfExpansion) {
        self.substitutions.extend(other.substitutions);
    }
}

impl CcfGroup {
    pub fn new(
        id: impl Into<String>,
        model: CcfModel,
        members: Vec<Arc<BasicEvent>>,
        distribution: Arc<Expression>,
        factors: Vec<Arc<Expression>>,
    ) -> Self {
        Self {
            id: id.into(),
            model,
            members,
            distribution,
            factors,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> CcfModel {
        self.model
    }

    pub fn members(&self) -> &[Arc<BasicEvent>] {
        &self.members
    }

    /// Checks group size and the model's factor-count and domain rules.
    pub fn validate(&self, ctx: &EvalContext) -> ModelResult<()> {
        let n = self.members.len();
        if n < 2 {
            return Err(ModelError::CcfGroupTooSmall {
                id: self.id.clone(),
                size: n,
            });
        }
        let fail = |message: String| {
            Err(ModelError::InvalidCcfFactors {
                id: self.id.clone(),
                message,
            })
        };
        let values: Vec<f64> = self.factors.iter().map(|f| f.value(ctx)).collect();
        match self.model {
            CcfModel::BetaFactor => {
                if values.len() != 1 {
                    return fail(format!("beta-factor takes 1 factor, got {}", values.len()));
                }
                if !(0.0 < values[0] && values[0] < 1.0) {
                    return fail(format!("beta {} is outside (0, 1)", values[0]));
                }
            }
            CcfModel::Mgl => {
                if values.len() != n - 1 {
                    return fail(format!(
                        "MGL over {n} members takes {} factors, got {}",
                        n - 1,
                        values.len()
                    ));
                }
                for (i, g) in values.iter().enumerate() {
                    if !(0.0..1.0).contains(g) {
                        return fail(format!("factor g{} = {g} is outside [0, 1)", i + 2));
                    }
                }
            }
            CcfModel::AlphaFactor => {
                if values.len() != n {
                    return fail(format!(
                        "alpha-factor over {n} members takes {n} factors, got {}",
                        values.len()
                    ));
                }
                if values.iter().any(|a| *a < 0.0) {
                    return fail("alpha factors must be non-negative".into());
                }
                if values.iter().sum::<f64>() <= 0.0 {
                    return fail("alpha factors must not all be zero".into());
                }
            }
            CcfModel::PhiFactor => {
                if values.len() != n {
                    return fail(format!(
                        "phi-factor over {n} members takes {n} factors, got {}",
                        values.len()
                    ));
                }
                if values.iter().any(|p| *p < 0.0) {
                    return fail("phi factors must be non-negative".into());
                }
                let sum: f64 = values.iter().sum();
                if (sum - 1.0).abs() > 1e-6 {
                    return fail(format!("phi factors sum to {sum}, expected 1"));
                }
            }
        }
        for factor in &self.factors {
            factor.validate(&self.id, ctx)?;
        }
        self.distribution.validate(&self.id, ctx)?;
        Ok(())
    }

    /// Expands the group into synthetic basic events and the member
    /// substitution map. The group must validate first.
    pub fn expand(&self) -> CcfExpansion {
        let n = self.members.len();
        let sizes: Vec<usize> = match self.model {
            CcfModel::BetaFactor => vec![1, n],
            _ => (1..=n).collect(),
        };

        let mut substitutions: IndexMap<String, Vec<Arc<BasicEvent>>> = self
            .members
            .iter()
            .map(|m| (m.id().to_string(), Vec::new()))
            .collect();

        for &k in &sizes {
            let probability = self.level_probability(k, n);
            for combo in combinations(n, k) {
                let ids: Vec<&str> = combo.iter().map(|&i| self.members[i].id()).collect();
                let event = Arc::new(BasicEvent::new(
                    format!("[{}]", ids.join(" ")),
                    probability.clone(),
                ));
                for &i in &combo {
                    substitutions
                        .get_mut(self.members[i].id())
                        .expect("member registered above")
                        .push(event.clone());
                }
            }
        }
        CcfExpansion { substitutions }
    }

    /// The probability expression of one specific size-k combination event.
    fn level_probability(&self, k: usize, n: usize) -> Arc<Expression> {
        let q = self.distribution.clone();
        let count = Expression::constant(binomial(n - 1, k - 1));
        match self.model {
            CcfModel::BetaFactor => {
                let beta = self.factors[0].clone();
                if k == 1 {
                    // (1 - beta) * Q
                    Arc::new(Expression::Mul(vec![
                        Arc::new(Expression::Sub(Expression::constant(1.0), beta)),
                        q,
                    ]))
                } else {
                    // beta * Q, the all-members event
                    Arc::new(Expression::Mul(vec![beta, q]))
                }
            }
            CcfModel::Mgl => {
                // prod(g2..gk) * (1 - g_{k+1}) * Q / C(n-1, k-1), g_{n+1} = 0
                let mut product: Vec<Arc<Expression>> =
                    self.factors[..k.saturating_sub(1)].to_vec();
                if k < n {
                    product.push(Arc::new(Expression::Sub(
                        Expression::constant(1.0),
                        self.factors[k - 1].clone(),
                    )));
                }
                product.push(q);
                Arc::new(Expression::Div(Arc::new(Expression::Mul(product)), count))
            }
            CcfModel::AlphaFactor => {
                // k * a_k * Q / (C(n-1, k-1) * sum(j * a_j))
                let total = Arc::new(Expression::Add(
                    self.factors
                        .iter()
                        .enumerate()
                        .map(|(j, a)| {
                            Arc::new(Expression::Mul(vec![
                                Expression::constant((j + 1) as f64),
                                a.clone(),
                            ]))
                        })
                        .collect(),
                ));
                Arc::new(Expression::Div(
                    Arc::new(Expression::Mul(vec![
                        Expression::constant(k as f64),
                        self.factors[k - 1].clone(),
                        q,
                    ])),
                    Arc::new(Expression::Mul(vec![count, total])),
                ))
            }
            CcfModel::PhiFactor => {
                // phi_k * Q / C(n-1, k-1)
                Arc::new(Expression::Div(
                    Arc::new(Expression::Mul(vec![self.factors[k - 1].clone(), q])),
                    count,
                ))
            }
        }
    }
}

/// All k-subsets of 0..n in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut result = Vec::new();
    let mut current = Vec::with_capacity(k);
    fn recurse(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            if n - i < k - current.len() {
                break;
            }
            current.push(i);
            recurse(i + 1, n, k, current, out);
            current.pop();
        }
    }
    recurse(0, n, k, &mut current, &mut result);
    result
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    let mut result = 1.0;
    for i in 0..k {
        result = result * (n - i) as f64 / (i + 1) as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: EvalContext = EvalContext {
        mission_time: 8760.0,
    };

    fn member(id: &str) -> Arc<BasicEvent> {
        Arc::new(BasicEvent::new(id, Expression::constant(0.1)))
    }

    fn beta_group(beta: f64) -> CcfGroup {
        CcfGroup::new(
            "pumps",
            CcfModel::BetaFactor,
            vec![member("p1"), member("p2"), member("p3")],
            Expression::constant(0.1),
            vec![Expression::constant(beta)],
        )
    }

    #[test]
    fn test_beta_factor_expansion_shape() {
        let group = beta_group(0.2);
        group.validate(&CTX).unwrap();
        let expansion = group.expand();

        let p1 = expansion.substitution("p1").unwrap();
        // Independent copy plus the all-members common event.
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].id(), "[p1]");
        assert_eq!(p1[1].id(), "[p1 p2 p3]");

        let independent = p1[0].expression().unwrap().value(&CTX);
        let common = p1[1].expression().unwrap().value(&CTX);
        assert!((independent - 0.8 * 0.1).abs() < 1e-12);
        assert!((common - 0.2 * 0.1).abs() < 1e-12);

        // The common event is shared, not duplicated per member.
        let p2 = expansion.substitution("p2").unwrap();
        assert!(Arc::ptr_eq(&p1[1], &p2[1]));
    }

    #[test]
    fn test_mgl_level_probabilities() {
        let group = CcfGroup::new(
            "valves",
            CcfModel::Mgl,
            vec![member("v1"), member("v2"), member("v3")],
            Expression::constant(0.1),
            vec![Expression::constant(0.10), Expression::constant(0.05)],
        );
        group.validate(&CTX).unwrap();
        let expansion = group.expand();
        let v1 = expansion.substitution("v1").unwrap();
        // Sizes 1..=3, each containing v1: [v1], [v1 v2], [v1 v3], [v1 v2 v3].
        assert_eq!(v1.len(), 4);

        let q1 = v1[0].expression().unwrap().value(&CTX);
        assert!((q1 - 0.9 * 0.1).abs() < 1e-12); // (1 - g2) Q

        let q2 = v1[1].expression().unwrap().value(&CTX);
        // g2 (1 - g3) Q / C(2,1)
        assert!((q2 - 0.10 * 0.95 * 0.1 / 2.0).abs() < 1e-12);

        let q3 = v1[3].expression().unwrap().value(&CTX);
        // g2 g3 Q / C(2,2)
        assert!((q3 - 0.10 * 0.05 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_alpha_factor_level_probabilities() {
        let group = CcfGroup::new(
            "fans",
            CcfModel::AlphaFactor,
            vec![member("f1"), member("f2")],
            Expression::constant(0.2),
            vec![Expression::constant(0.95), Expression::constant(0.05)],
        );
        group.validate(&CTX).unwrap();
        let expansion = group.expand();
        let f1 = expansion.substitution("f1").unwrap();
        assert_eq!(f1.len(), 2);

        let alpha_total = 1.0 * 0.95 + 2.0 * 0.05;
        let q1 = f1[0].expression().unwrap().value(&CTX);
        assert!((q1 - 0.95 * 0.2 / alpha_total).abs() < 1e-12);
        let q2 = f1[1].expression().unwrap().value(&CTX);
        assert!((q2 - 2.0 * 0.05 * 0.2 / alpha_total).abs() < 1e-12);
    }

    #[test]
    fn test_factor_validation() {
        assert!(beta_group(0.2).validate(&CTX).is_ok());
        assert!(beta_group(0.0).validate(&CTX).is_err());
        assert!(beta_group(1.0).validate(&CTX).is_err());

        let small = CcfGroup::new(
            "g",
            CcfModel::BetaFactor,
            vec![member("x")],
            Expression::constant(0.1),
            vec![Expression::constant(0.5)],
        );
        assert!(matches!(
            small.validate(&CTX),
            Err(ModelError::CcfGroupTooSmall { .. })
        ));

        let phi = CcfGroup::new(
            "g",
            CcfModel::PhiFactor,
            vec![member("x"), member("y")],
            Expression::constant(0.1),
            vec![Expression::constant(0.6), Expression::constant(0.3)],
        );
        assert!(phi.validate(&CTX).is_err()); // sums to 0.9
    }
}
