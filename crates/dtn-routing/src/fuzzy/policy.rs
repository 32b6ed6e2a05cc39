//! The fuzzy routing policy: network features in, FCL rule base, a crisp
//! score out, thresholds to a decision.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use dtn_core::{DropReason, NodeId, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::fuzzy::{FuzzyEngine, RuleBase};
use crate::{
    DecisionContext, DeliveryPredictability, ProphetParams, RoutingDecision, RoutingError,
    RoutingPolicy, RoutingResult,
};

/// A quantity the policy can feed into an FCL input, normalised to `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    RemainingTtl,
    ContactDuration,
    PeerDeliveryProbability,
    LocalBufferOccupancy,
    PeerBufferOccupancy,
    HopCount,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FeatureBinding {
    pub feature:  Feature,
    /// FCL input variable the feature is bound to.
    pub variable: String,
}

/// Crisp output cut-offs.  Checked in the order replicate, forward, drop.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub replicate: f64,
    pub forward:   f64,
    pub drop:      f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { replicate: 0.75, forward: 0.5, drop: 0.1 }
    }
}

impl Thresholds {
    pub fn validate(&self) -> RoutingResult<()> {
        let all_finite = [self.replicate, self.forward, self.drop].iter().all(|v| v.is_finite());
        if !all_finite || !(self.drop < self.forward && self.forward <= self.replicate) {
            return Err(RoutingError::Config(format!(
                "fuzzy thresholds must satisfy drop < forward <= replicate (got {} / {} / {})",
                self.drop, self.forward, self.replicate
            )));
        }
        Ok(())
    }

    pub fn classify(&self, score: f64, peer: NodeId) -> RoutingDecision {
        if score >= self.replicate {
            RoutingDecision::Replicate(vec![peer])
        } else if score >= self.forward {
            RoutingDecision::Forward(peer)
        } else if score <= self.drop {
            RoutingDecision::Drop(DropReason::Policy)
        } else {
            RoutingDecision::Hold
        }
    }
}

fn default_output() -> String {
    "decision".into()
}

fn default_contact_scale() -> f64 {
    600.0
}

fn default_hop_scale() -> f64 {
    10.0
}

/// Scenario-file form of the fuzzy policy.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FuzzyConfig {
    /// Path of the FCL file, relative to the scenario file.
    pub rule_base: PathBuf,
    pub bindings:  Vec<FeatureBinding>,
    #[serde(default = "default_output")]
    pub output:    String,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Contact duration (seconds) that maps to 1.0.
    #[serde(default = "default_contact_scale")]
    pub contact_duration_scale: f64,
    /// Hop count that maps to 1.0.
    #[serde(default = "default_hop_scale")]
    pub hop_scale: f64,
    #[serde(default)]
    pub prophet: ProphetParams,
}

impl FuzzyConfig {
    /// Defaults for everything but the rule base and bindings.
    pub fn new(rule_base: impl Into<PathBuf>, bindings: Vec<FeatureBinding>) -> Self {
        Self {
            rule_base: rule_base.into(),
            bindings,
            output: default_output(),
            thresholds: Thresholds::default(),
            contact_duration_scale: default_contact_scale(),
            hop_scale: default_hop_scale(),
            prophet: ProphetParams::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FuzzyPolicy {
    engine:    FuzzyEngine,
    /// `(feature, input index)`, one per FCL input.
    inputs:    Vec<(Feature, usize)>,
    output:    usize,
    thresholds: Thresholds,
    contact_scale: f64,
    hop_scale: f64,
    preds:     DeliveryPredictability,
}

impl FuzzyPolicy {
    /// Bind `config` to an already parsed rule base.  Every FCL input must
    /// be bound exactly once and the output variable must exist.
    pub fn new(rule_base: RuleBase, config: &FuzzyConfig) -> RoutingResult<Self> {
        config.thresholds.validate()?;
        config.prophet.validate()?;
        for (what, v) in [("contact_duration_scale", config.contact_duration_scale), ("hop_scale", config.hop_scale)] {
            if !(v > 0.0 && v.is_finite()) {
                return Err(RoutingError::Config(format!("fuzzy {what} must be positive")));
            }
        }

        let engine = FuzzyEngine::new(rule_base);
        let output = engine
            .output_index(&config.output)
            .ok_or_else(|| RoutingError::UnknownVariable(config.output.clone()))?;

        let mut slots: Vec<Option<Feature>> = vec![None; engine.rule_base().inputs.len()];
        for b in &config.bindings {
            let i = engine
                .input_index(&b.variable)
                .ok_or_else(|| RoutingError::UnknownVariable(b.variable.clone()))?;
            if slots[i].replace(b.feature).is_some() {
                return Err(RoutingError::Config(format!("input {:?} is bound twice", b.variable)));
            }
        }
        let inputs = slots
            .into_iter()
            .enumerate()
            .map(|(i, f)| {
                f.map(|f| (f, i)).ok_or_else(|| {
                    RoutingError::Config(format!(
                        "input {:?} has no feature binding",
                        engine.rule_base().inputs[i].name
                    ))
                })
            })
            .collect::<RoutingResult<Vec<_>>>()?;

        Ok(Self {
            engine,
            inputs,
            output,
            thresholds: config.thresholds,
            contact_scale: config.contact_duration_scale,
            hop_scale: config.hop_scale,
            preds: DeliveryPredictability::new(config.prophet),
        })
    }

    pub fn engine(&self) -> &FuzzyEngine {
        &self.engine
    }

    pub fn predictability(&self) -> &DeliveryPredictability {
        &self.preds
    }

    /// Normalised value of `feature` for this decision.
    pub fn feature_value(&self, feature: Feature, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> f64 {
        let v = match feature {
            Feature::RemainingTtl => ctx.remaining_ttl_fraction,
            // Past contacts of this pair, else how long this one has lasted.
            Feature::ContactDuration => {
                let d = ctx.estimated_contact_duration.unwrap_or_else(|| ctx.contact_elapsed());
                d.as_secs_f64() / self.contact_scale
            }
            Feature::PeerDeliveryProbability => self.preds.get(ctx.peer, msg.destination),
            Feature::LocalBufferOccupancy => ctx.local_occupancy,
            Feature::PeerBufferOccupancy => ctx.peer_occupancy,
            Feature::HopCount => f64::from(copy.hop_count) / self.hop_scale,
        };
        v.clamp(0.0, 1.0)
    }

    /// The crisp score for this decision, or `None` when no rule fired and
    /// the output has no default.
    pub fn score(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingResult<Option<f64>> {
        let mut crisp = vec![0.0; self.inputs.len()];
        for &(feature, i) in &self.inputs {
            crisp[i] = self.feature_value(feature, msg, copy, ctx);
        }
        let outputs = self.engine.evaluate(&crisp)?;
        Ok(outputs.get(self.output).copied().flatten())
    }
}

impl RoutingPolicy for FuzzyPolicy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn on_contact_up(&mut self, a: NodeId, b: NodeId, now: SimTime) {
        self.preds.encounter(a, b, now);
    }

    fn decide(&self, msg: &Message, copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == msg.destination {
            return RoutingDecision::Forward(ctx.peer);
        }
        match self.score(msg, copy, ctx) {
            Ok(Some(score)) => self.thresholds.classify(score, ctx.peer),
            Ok(None) => RoutingDecision::Hold,
            Err(e) => {
                warn!(msg = %msg.id, error = %e, "fuzzy evaluation failed; holding");
                RoutingDecision::Hold
            }
        }
    }
}
