//! Mamdani inference over a parsed [`RuleBase`].
//!
//! Evaluation is a pure function of the inputs:
//!
//! 1. Fuzzify: each crisp input (clamped to its variable's range) gets a
//!    degree per term.
//! 2. Each rule's firing strength is its condition under the block's AND/OR
//!    operators, times the rule weight.
//! 3. Each conclusion term is cut (ACT MIN) or scaled (ACT PROD) by the
//!    strength and accumulated into the output with MAX.
//! 4. The aggregate is sampled on `resolution + 1` evenly spaced points of
//!    the output universe and reduced by COG or MM.
//!
//! An output no rule fires for takes its `DEFAULT`, or `None` without one.

use std::collections::BTreeMap;

use crate::fuzzy::fcl::{ActMethod, AndMethod, Condition, Defuzzifier, OrMethod, RuleBase};
use crate::{RoutingError, RoutingResult};

pub const DEFAULT_RESOLUTION: usize = 1000;

#[derive(Clone, Debug)]
pub struct FuzzyEngine {
    rule_base:  RuleBase,
    resolution: usize,
}

impl FuzzyEngine {
    pub fn new(rule_base: RuleBase) -> Self {
        Self { rule_base, resolution: DEFAULT_RESOLUTION }
    }

    /// Number of intervals the output universe is sampled with (at least 1).
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    pub fn rule_base(&self) -> &RuleBase {
        &self.rule_base
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.rule_base.input_index(name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.rule_base.output_index(name)
    }

    /// Evaluate with inputs in declaration order.  Returns one value per
    /// output, in declaration order.
    pub fn evaluate(&self, inputs: &[f64]) -> RoutingResult<Vec<Option<f64>>> {
        let rb = &self.rule_base;
        if inputs.len() != rb.inputs.len() {
            return Err(RoutingError::Config(format!(
                "rule base {:?} takes {} inputs, got {}",
                rb.name,
                rb.inputs.len(),
                inputs.len()
            )));
        }

        let mut degrees = Vec::with_capacity(inputs.len());
        for (var, &x) in rb.inputs.iter().zip(inputs) {
            if !x.is_finite() {
                return Err(RoutingError::Config(format!("input {:?} is not finite", var.name)));
            }
            let x = x.clamp(var.range.0, var.range.1);
            degrees.push(var.terms.iter().map(|t| t.shape.degree(x)).collect::<Vec<f64>>());
        }

        let n = self.resolution;
        let mut aggregate: Vec<Vec<f64>> = vec![vec![0.0; n + 1]; rb.outputs.len()];
        let mut fired = vec![false; rb.outputs.len()];

        for block in &rb.blocks {
            for rule in &block.rules {
                let strength = eval(&rule.condition, &degrees, block.and, block.or) * rule.weight;
                if strength <= 0.0 {
                    continue;
                }
                for &(o, t) in &rule.conclusions {
                    fired[o] = true;
                    let out = &rb.outputs[o].var;
                    let shape = &out.terms[t].shape;
                    let (lo, hi) = out.range;
                    for (k, slot) in aggregate[o].iter_mut().enumerate() {
                        let x = lo + (hi - lo) * k as f64 / n as f64;
                        let mu = shape.degree(x);
                        let implied = match block.act {
                            ActMethod::Min  => mu.min(strength),
                            ActMethod::Prod => mu * strength,
                        };
                        *slot = slot.max(implied);
                    }
                }
            }
        }

        Ok(rb
            .outputs
            .iter()
            .zip(&aggregate)
            .zip(&fired)
            .map(|((out, agg), &fired)| {
                let value = if fired { defuzzify(out.method, out.var.range, agg) } else { None };
                value.or(out.default)
            })
            .collect())
    }

    /// Evaluate with named inputs; every input must be given exactly once.
    /// Outputs that produce no value are omitted from the result.
    pub fn evaluate_named(&self, inputs: &[(&str, f64)]) -> RoutingResult<BTreeMap<String, f64>> {
        let rb = &self.rule_base;
        let mut crisp = vec![None; rb.inputs.len()];
        for &(name, x) in inputs {
            let i = self
                .input_index(name)
                .ok_or_else(|| RoutingError::UnknownVariable(name.to_string()))?;
            crisp[i] = Some(x);
        }
        let crisp = crisp
            .into_iter()
            .zip(&rb.inputs)
            .map(|(x, var)| {
                x.ok_or_else(|| RoutingError::Config(format!("missing value for input {:?}", var.name)))
            })
            .collect::<RoutingResult<Vec<f64>>>()?;

        Ok(self
            .evaluate(&crisp)?
            .into_iter()
            .zip(&rb.outputs)
            .filter_map(|(v, out)| v.map(|v| (out.var.name.clone(), v)))
            .collect())
    }
}

fn eval(cond: &Condition, degrees: &[Vec<f64>], and: AndMethod, or: OrMethod) -> f64 {
    match cond {
        Condition::Is { var, term } => degrees[*var][*term],
        Condition::Not(c) => 1.0 - eval(c, degrees, and, or),
        Condition::And(a, b) => {
            let (a, b) = (eval(a, degrees, and, or), eval(b, degrees, and, or));
            match and {
                AndMethod::Min  => a.min(b),
                AndMethod::Prod => a * b,
            }
        }
        Condition::Or(a, b) => {
            let (a, b) = (eval(a, degrees, and, or), eval(b, degrees, and, or));
            match or {
                OrMethod::Max  => a.max(b),
                OrMethod::Asum => a + b - a * b,
            }
        }
    }
}

fn defuzzify(method: Defuzzifier, (lo, hi): (f64, f64), agg: &[f64]) -> Option<f64> {
    let n = agg.len().saturating_sub(1).max(1) as f64;
    let x_at = |k: usize| lo + (hi - lo) * k as f64 / n;
    match method {
        Defuzzifier::Cog => {
            let (num, den) = agg
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(num, den), (k, &mu)| (num + x_at(k) * mu, den + mu));
            (den > 0.0).then(|| num / den)
        }
        Defuzzifier::Mm => {
            let peak = agg.iter().copied().fold(0.0_f64, f64::max);
            if peak <= 0.0 {
                return None;
            }
            let (sum, count) = agg
                .iter()
                .enumerate()
                .filter(|&(_, &mu)| mu >= peak - 1e-12)
                .fold((0.0, 0usize), |(s, c), (k, _)| (s + x_at(k), c + 1));
            Some(sum / count as f64)
        }
    }
}
