//! Fluent builder for constructing a [`Sim`].

use dtn_contact::{ContactDetector, ContactLog, DetectionStrategy};
use dtn_core::{Area, SimConfig, SimRng, SimTime};
use dtn_mobility::{MobilityModel, World};
use dtn_routing::RoutingPolicy;

use crate::bridge::ConvergenceLayer;
use crate::generator::{GeneratorConfig, MessageGenerator, MessageSpec};
use crate::node::NodeSpec;
use crate::sim::Action;
use crate::{Sim, SimError, SimResult};

/// RNG stream offset for the message generator, so its draws never overlap
/// the mobility model's.
const GENERATOR_STREAM: u64 = 0x6d65_7373;

/// Fluent builder for [`Sim`].
///
/// # Required inputs
///
/// - [`SimConfig`]: seed, end time, update interval
/// - the simulation [`Area`] and a [`MobilityModel`] (which fixes the node count)
/// - a [`RoutingPolicy`]
///
/// # Optional inputs
///
/// | Method                    | Default                          |
/// |---------------------------|----------------------------------|
/// | `.nodes(v)`               | `NodeSpec::default()` per node   |
/// | `.strategy(s)`            | `DetectionStrategy::Pairwise`    |
/// | `.purge_on_delivery(b)`   | `true`                           |
/// | `.contact_history(b)`     | `false`                          |
/// | `.generator(cfg)`         | no random workload               |
/// | `.message(spec)`          | no explicit messages             |
/// | `.bridge(layer)`          | no convergence layer             |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, area, Box::new(model), Box::new(Epidemic))
///     .nodes(specs)
///     .message(MessageSpec::new(SimTime::ZERO, NodeId(0), NodeId(1), ttl, 1_000))
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:            SimConfig,
    area:              Area,
    mobility:          Box<dyn MobilityModel>,
    policy:            Box<dyn RoutingPolicy>,
    nodes:             Option<Vec<NodeSpec>>,
    strategy:          DetectionStrategy,
    purge_on_delivery: bool,
    contact_history:   bool,
    generator:         Option<GeneratorConfig>,
    messages:          Vec<MessageSpec>,
    bridge:            Option<Box<dyn ConvergenceLayer>>,
}

impl SimBuilder {
    pub fn new(
        config:   SimConfig,
        area:     Area,
        mobility: Box<dyn MobilityModel>,
        policy:   Box<dyn RoutingPolicy>,
    ) -> Self {
        Self {
            config,
            area,
            mobility,
            policy,
            nodes:             None,
            strategy:          DetectionStrategy::default(),
            purge_on_delivery: true,
            contact_history:   false,
            generator:         None,
            messages:          Vec::new(),
            bridge:            None,
        }
    }

    /// Per-node radio, buffer, and energy parameters (length `node_count`).
    pub fn nodes(mut self, nodes: Vec<NodeSpec>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn strategy(mut self, strategy: DetectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Remove every remaining copy of a message once it is delivered.
    pub fn purge_on_delivery(mut self, purge: bool) -> Self {
        self.purge_on_delivery = purge;
        self
    }

    /// Keep every completed contact in the detector's log.
    pub fn contact_history(mut self, keep: bool) -> Self {
        self.contact_history = keep;
        self
    }

    pub fn generator(mut self, cfg: GeneratorConfig) -> Self {
        self.generator = Some(cfg);
        self
    }

    pub fn message(mut self, spec: MessageSpec) -> Self {
        self.messages.push(spec);
        self
    }

    pub fn messages(mut self, specs: impl IntoIterator<Item = MessageSpec>) -> Self {
        self.messages.extend(specs);
        self
    }

    /// Route transfers to nodes with a `bridge` address through `layer`.
    pub fn bridge(mut self, layer: Box<dyn ConvergenceLayer>) -> Self {
        self.bridge = Some(layer);
        self
    }

    /// Validate inputs and return a ready-to-run [`Sim`] with the first
    /// world update, the explicit messages, and the generator queued.
    pub fn build(self) -> SimResult<Sim> {
        let node_count = self.mobility.node_count();

        // ── Validate ──────────────────────────────────────────────────────
        if self.config.update_interval.is_zero() {
            return Err(SimError::Config("update interval must be positive".into()));
        }
        let specs = match self.nodes {
            Some(v) => {
                if v.len() != node_count {
                    return Err(SimError::NodeCountMismatch {
                        expected: node_count,
                        got:      v.len(),
                        what:     "node spec",
                    });
                }
                v
            }
            None => vec![NodeSpec::default(); node_count],
        };
        for spec in &specs {
            spec.validate()?;
        }
        if self.bridge.is_none() && specs.iter().any(|s| s.bridge.is_some()) {
            return Err(SimError::Config("bridged nodes configured without a convergence layer".into()));
        }
        for m in &self.messages {
            m.validate(node_count)?;
        }

        // ── Components ────────────────────────────────────────────────────
        let world = World::new(self.area, self.mobility)?;
        let log = if self.contact_history { ContactLog::with_history() } else { ContactLog::new() };
        let detector = ContactDetector::new(self.strategy, specs.iter().map(|s| s.range).collect())?.with_log(log);
        let generator = match self.generator {
            Some(cfg) => {
                let rng = SimRng::new(self.config.seed).child(GENERATOR_STREAM);
                Some(MessageGenerator::new(cfg, node_count, rng)?)
            }
            None => None,
        };
        let first_generated = generator.as_ref().and_then(MessageGenerator::first_time);

        let mut sim = Sim::from_parts(
            self.config,
            self.purge_on_delivery,
            world,
            detector,
            specs,
            self.policy,
            generator,
            self.bridge,
        );

        // ── Initial actions ───────────────────────────────────────────────
        // The world update goes first so messages created at t = 0 see the
        // contacts that exist at t = 0.
        sim.queue.schedule(SimTime::ZERO, Action::WorldUpdate)?;
        for m in self.messages {
            sim.queue.schedule(m.time, Action::Create(m))?;
        }
        if let Some(t) = first_generated.filter(|&t| t < sim.config.end_time) {
            sim.queue.schedule(t, Action::Generate)?;
        }
        Ok(sim)
    }
}
