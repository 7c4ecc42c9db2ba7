//! Parameters and probability expressions.
//!
//! An expression is an arithmetic tree whose leaves are constants, parameter
//! references, and probability distributions. Expressions have two modes of
//! evaluation: [`Expression::value`] yields the deterministic point value
//! (the mean, for distribution leaves) used by probability analysis, and
//! [`Expression::sample`] draws one Monte Carlo realization used by
//! uncertainty analysis.
//!
//! A parameter referenced from several places is sampled once per trial; the
//! [`SampleContext`] carries the per-trial cache that pins its value.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand_distr::{Distribution, Triangular};

use crate::{ModelError, ModelResult};

/// A named expression reused across the model.
#[derive(Debug)]
pub struct Parameter {
    id: String,
    expression: Arc<Expression>,
}

impl Parameter {
    pub fn new(id: impl Into<String>, expression: Arc<Expression>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            expression,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &Arc<Expression> {
        &self.expression
    }
}

/// Deterministic evaluation inputs threaded through every expression.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// System mission time, used to convert failure rates to probabilities.
    pub mission_time: f64,
}

/// Per-trial sampling state: the evaluation inputs plus the cache that keeps
/// a shared parameter at one value for the whole trial.
#[derive(Debug)]
pub struct SampleContext {
    pub eval: EvalContext,
    parameter_cache: HashMap<usize, f64>,
}

impl SampleContext {
    pub fn new(eval: EvalContext) -> Self {
        Self {
            eval,
            parameter_cache: HashMap::new(),
        }
    }
}

/// An arithmetic/stochastic expression tree.
#[derive(Debug)]
pub enum Expression {
    Constant(f64),
    Parameter(Arc<Parameter>),
    /// The settings-supplied mission time.
    MissionTime,
    /// `1 - exp(-rate * mission_time)`: failure rate to probability.
    Exponential { rate: Arc<Expression> },
    Uniform {
        lower: Arc<Expression>,
        upper: Arc<Expression>,
    },
    Triangular {
        lower: Arc<Expression>,
        mode: Arc<Expression>,
        upper: Arc<Expression>,
    },
    Normal {
        mean: Arc<Expression>,
        sigma: Arc<Expression>,
    },
    /// Parameterized by the underlying normal's mu and sigma.
    LogNormal {
        mu: Arc<Expression>,
        sigma: Arc<Expression>,
    },
    Gamma {
        shape: Arc<Expression>,
        scale: Arc<Expression>,
    },
    Beta {
        alpha: Arc<Expression>,
        beta: Arc<Expression>,
    },
    Poisson { lambda: Arc<Expression> },
    /// Piecewise-uniform empirical distribution: `bounds` has one more entry
    /// than `weights` and is strictly increasing.
    Histogram {
        bounds: Vec<f64>,
        weights: Vec<f64>,
    },
    Neg(Arc<Expression>),
    Add(Vec<Arc<Expression>>),
    Sub(Arc<Expression>, Arc<Expression>),
    Mul(Vec<Arc<Expression>>),
    Div(Arc<Expression>, Arc<Expression>),
    Pow(Arc<Expression>, Arc<Expression>),
}

impl Expression {
    pub fn constant(value: f64) -> Arc<Self> {
        Arc::new(Expression::Constant(value))
    }

    /// The deterministic point value. Distribution leaves evaluate to their
    /// mean.
    pub fn value(&self, ctx: &EvalContext) -> f64 {
        match self {
            Expression::Constant(v) => *v,
            Expression::Parameter(p) => p.expression().value(ctx),
            Expression::MissionTime => ctx.mission_time,
            Expression::Exponential { rate } => {
                1.0 - (-rate.value(ctx) * ctx.mission_time).exp()
            }
            Expression::Uniform { lower, upper } => (lower.value(ctx) + upper.value(ctx)) / 2.0,
            Expression::Triangular { lower, mode, upper } => {
                (lower.value(ctx) + mode.value(ctx) + upper.value(ctx)) / 3.0
            }
            Expression::Normal { mean, .. } => mean.value(ctx),
            Expression::LogNormal { mu, sigma } => {
                let s = sigma.value(ctx);
                (mu.value(ctx) + s * s / 2.0).exp()
            }
            Expression::Gamma { shape, scale } => shape.value(ctx) * scale.value(ctx),
            Expression::Beta { alpha, beta } => {
                let a = alpha.value(ctx);
                a / (a + beta.value(ctx))
            }
            Expression::Poisson { lambda } => lambda.value(ctx),
            Expression::Histogram { bounds, weights } => {
                let total: f64 = weights.iter().sum();
                let mean: f64 = weights
                    .iter()
                    .enumerate()
                    .map(|(i, w)| w * (bounds[i] + bounds[i + 1]) / 2.0)
                    .sum();
                mean / total
            }
            Expression::Neg(e) => -e.value(ctx),
            Expression::Add(args) => args.iter().map(|e| e.value(ctx)).sum(),
            Expression::Sub(a, b) => a.value(ctx) - b.value(ctx),
            Expression::Mul(args) => args.iter().map(|e| e.value(ctx)).product(),
            Expression::Div(a, b) => a.value(ctx) / b.value(ctx),
            Expression::Pow(a, b) => a.value(ctx).powf(b.value(ctx)),
        }
    }

    /// Draws one realization of the expression. Deterministic nodes evaluate
    /// as in [`Expression::value`]; distribution leaves sample their law.
    pub fn sample<R: Rng>(&self, ctx: &mut SampleContext, rng: &mut R) -> f64 {
        match self {
            Expression::Constant(v) => *v,
            Expression::Parameter(p) => {
                let key = Arc::as_ptr(p) as usize;
                if let Some(&v) = ctx.parameter_cache.get(&key) {
                    return v;
                }
                let v = p.expression().sample(ctx, rng);
                ctx.parameter_cache.insert(key, v);
                v
            }
            Expression::MissionTime => ctx.eval.mission_time,
            Expression::Exponential { rate } => {
                let lambda = rate.sample(ctx, rng);
                1.0 - (-lambda * ctx.eval.mission_time).exp()
            }
            Expression::Uniform { lower, upper } => {
                let a = lower.sample(ctx, rng);
                let b = upper.sample(ctx, rng);
                rng.gen_range(a..b)
            }
            Expression::Triangular { lower, mode, upper } => {
                let a = lower.sample(ctx, rng);
                let m = mode.sample(ctx, rng);
                let b = upper.sample(ctx, rng);
                match Triangular::new(a, b, m) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => m,
                }
            }
            Expression::Normal { mean, sigma } => {
                let m = mean.sample(ctx, rng);
                match rand_distr::Normal::new(m, sigma.sample(ctx, rng)) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => m,
                }
            }
            Expression::LogNormal { mu, sigma } => {
                let m = mu.sample(ctx, rng);
                match rand_distr::LogNormal::new(m, sigma.sample(ctx, rng)) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => m.exp(),
                }
            }
            Expression::Gamma { shape, scale } => {
                let k = shape.sample(ctx, rng);
                let theta = scale.sample(ctx, rng);
                match rand_distr::Gamma::new(k, theta) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => k * theta,
                }
            }
            Expression::Beta { alpha, beta } => {
                let a = alpha.sample(ctx, rng);
                let b = beta.sample(ctx, rng);
                match rand_distr::Beta::new(a, b) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => a / (a + b),
                }
            }
            Expression::Poisson { lambda } => {
                let l = lambda.sample(ctx, rng);
                match rand_distr::Poisson::new(l) {
                    Ok(dist) => dist.sample(rng),
                    Err(_) => l,
                }
            }
            Expression::Histogram { bounds, weights } => {
                let total: f64 = weights.iter().sum();
                let mut u = rng.gen::<f64>() * total;
                let last = weights.len() - 1;
                for (i, w) in weights.iter().enumerate() {
                    if *w > 0.0 && (u < *w || i == last) {
                        let frac = (u / w).clamp(0.0, 1.0);
                        return bounds[i] + frac * (bounds[i + 1] - bounds[i]);
                    }
                    u -= w;
                }
                bounds[last + 1]
            }
            Expression::Neg(e) => -e.sample(ctx, rng),
            Expression::Add(args) => args.iter().map(|e| e.sample(ctx, rng)).sum(),
            Expression::Sub(a, b) => a.sample(ctx, rng) - b.sample(ctx, rng),
            Expression::Mul(args) => args.iter().map(|e| e.sample(ctx, rng)).product(),
            Expression::Div(a, b) => a.sample(ctx, rng) / b.sample(ctx, rng),
            Expression::Pow(a, b) => a.sample(ctx, rng).powf(b.sample(ctx, rng)),
        }
    }

    /// Checks distribution parameter domains at their point values.
    /// `id` names the owning event or parameter for error reporting.
    pub fn validate(&self, id: &str, ctx: &EvalContext) -> ModelResult<()> {
        let fail = |message: String| {
            Err(ModelError::InvalidExpression {
                id: id.to_string(),
                message,
            })
        };
        match self {
            Expression::Constant(v) => {
                if !v.is_finite() {
                    return fail(format!("non-finite constant {v}"));
                }
            }
            Expression::Parameter(p) => p.expression().validate(p.id(), ctx)?,
            Expression::MissionTime => {}
            Expression::Exponential { rate } => {
                rate.validate(id, ctx)?;
                if rate.value(ctx) < 0.0 {
                    return fail("negative failure rate".into());
                }
            }
            Expression::Uniform { lower, upper } => {
                lower.validate(id, ctx)?;
                upper.validate(id, ctx)?;
                if lower.value(ctx) >= upper.value(ctx) {
                    return fail("uniform requires lower < upper".into());
                }
            }
            Expression::Triangular { lower, mode, upper } => {
                lower.validate(id, ctx)?;
                mode.validate(id, ctx)?;
                upper.validate(id, ctx)?;
                let (a, m, b) = (lower.value(ctx), mode.value(ctx), upper.value(ctx));
                if !(a <= m && m <= b && a < b) {
                    return fail("triangular requires lower <= mode <= upper".into());
                }
            }
            Expression::Normal { mean, sigma } => {
                mean.validate(id, ctx)?;
                sigma.validate(id, ctx)?;
                if sigma.value(ctx) <= 0.0 {
                    return fail("normal requires sigma > 0".into());
                }
            }
            Expression::LogNormal { mu, sigma } => {
                mu.validate(id, ctx)?;
                sigma.validate(id, ctx)?;
                if sigma.value(ctx) <= 0.0 {
                    return fail("log-normal requires sigma > 0".into());
                }
            }
            Expression::Gamma { shape, scale } => {
                shape.validate(id, ctx)?;
                scale.validate(id, ctx)?;
                if shape.value(ctx) <= 0.0 || scale.value(ctx) <= 0.0 {
                    return fail("gamma requires shape > 0 and scale > 0".into());
                }
            }
            Expression::Beta { alpha, beta } => {
                alpha.validate(id, ctx)?;
                beta.validate(id, ctx)?;
                if alpha.value(ctx) <= 0.0 || beta.value(ctx) <= 0.0 {
                    return fail("beta requires alpha > 0 and beta > 0".into());
                }
            }
            Expression::Poisson { lambda } => {
                lambda.validate(id, ctx)?;
                if lambda.value(ctx) <= 0.0 {
                    return fail("poisson requires lambda > 0".into());
                }
            }
            Expression::Histogram { bounds, weights } => {
                if bounds.len() != weights.len() + 1 {
                    return fail("histogram requires one more bound than weights".into());
                }
                if bounds.windows(2).any(|w| w[0] >= w[1]) {
                    return fail("histogram bounds must be strictly increasing".into());
                }
                if weights.iter().any(|w| *w < 0.0) {
                    return fail("histogram weights must be non-negative".into());
                }
                if weights.iter().sum::<f64>() <= 0.0 {
                    return fail("histogram weights must not all be zero".into());
                }
            }
            Expression::Neg(e) => e.validate(id, ctx)?,
            Expression::Add(args) | Expression::Mul(args) => {
                for e in args {
                    e.validate(id, ctx)?;
                }
            }
            Expression::Sub(a, b) | Expression::Pow(a, b) => {
                a.validate(id, ctx)?;
                b.validate(id, ctx)?;
            }
            Expression::Div(a, b) => {
                a.validate(id, ctx)?;
                b.validate(id, ctx)?;
                if b.value(ctx) == 0.0 {
                    return fail("division by zero".into());
                }
            }
        }
        Ok(())
    }
}
