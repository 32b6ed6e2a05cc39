//! Scenario-file routing section.
//!
//! ```toml
//! [routing]
//! policy = "spray_and_wait"
//! copies = 8
//! binary = true
//! ```
//!
//! The `policy` tag selects the variant; the remaining keys are that
//! policy's parameters.  Unknown policy names fail at deserialization.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::fuzzy::{FuzzyConfig, FuzzyPolicy, RuleBase};
use crate::{
    BubbleRap, BubbleRapParams, DirectDelivery, Epidemic, Prophet, ProphetParams, RoutingError, RoutingPolicy,
    RoutingResult, SprayAndFocus, SprayAndFocusParams, SprayAndWait, SprayAndWaitParams,
};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RoutingConfig {
    #[default]
    Epidemic,
    DirectDelivery,
    SprayAndWait(SprayAndWaitParams),
    SprayAndFocus(SprayAndFocusParams),
    Prophet(ProphetParams),
    BubbleRap(BubbleRapParams),
    Fuzzy(FuzzyConfig),
}

impl RoutingConfig {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingConfig::Epidemic => "epidemic",
            RoutingConfig::DirectDelivery => "direct_delivery",
            RoutingConfig::SprayAndWait(_) => "spray_and_wait",
            RoutingConfig::SprayAndFocus(_) => "spray_and_focus",
            RoutingConfig::Prophet(_) => "prophet",
            RoutingConfig::BubbleRap(_) => "bubble_rap",
            RoutingConfig::Fuzzy(_) => "fuzzy",
        }
    }

    /// Instantiate the policy.  A relative fuzzy `rule_base` path is resolved
    /// against `base_dir` when given.
    pub fn build(&self, base_dir: Option<&Path>) -> RoutingResult<Box<dyn RoutingPolicy>> {
        Ok(match self {
            RoutingConfig::Epidemic => Box::new(Epidemic),
            RoutingConfig::DirectDelivery => Box::new(DirectDelivery),
            RoutingConfig::SprayAndWait(p) => Box::new(SprayAndWait::new(*p)?),
            RoutingConfig::SprayAndFocus(p) => Box::new(SprayAndFocus::new(*p)?),
            RoutingConfig::Prophet(p) => Box::new(Prophet::new(*p)?),
            RoutingConfig::BubbleRap(p) => Box::new(BubbleRap::new(*p)?),
            RoutingConfig::Fuzzy(cfg) => {
                let path = match base_dir {
                    Some(dir) if cfg.rule_base.is_relative() => dir.join(&cfg.rule_base),
                    _ => cfg.rule_base.clone(),
                };
                let rules = load_rule_base(&path)?;
                info!(
                    path = %path.display(),
                    inputs = rules.inputs.len(),
                    rules = rules.rule_count(),
                    "loaded fuzzy rule base"
                );
                Box::new(FuzzyPolicy::new(rules, cfg)?)
            }
        })
    }
}

/// Read and parse an FCL file.
pub fn load_rule_base(path: &Path) -> RoutingResult<RuleBase> {
    let src = std::fs::read_to_string(path).map_err(|source| RoutingError::RuleBaseIo {
        path: path.display().to_string(),
        source,
    })?;
    Ok(src.parse::<RuleBase>()?)
}
