//! Unit and scenario tests for dtn-sim.

use std::sync::mpsc;

use dtn_core::{
    Area, Coord, DropReason, EventKind, MessageId, NodeId, SimConfig, SimDuration, SimEvent, SimTime,
    TimedEvent,
};
use dtn_mobility::{MobilityModel, RandomWaypoint, RandomWaypointParams, StaticMobility, TracePlayback, TraceSample};
use dtn_routing::{
    DecisionContext, DirectDelivery, Epidemic, RoutingDecision, RoutingPolicy, SprayAndWait, SprayAndWaitParams,
};
use dtn_store::{BufferedCopy, Capacity, EvictionPolicy, Message};

use crate::{
    ControlCommand, EnergySpec, EventRecorder, GeneratorConfig, LoopbackAdapter, MessageSpec, NodeSpec,
    ObserverSet, RunStats, RunStatus, ScenarioConfig, SimBuilder, SimError,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

const AREA: Area = Area::new(1_000.0, 1_000.0);

fn config(end_secs: u64) -> SimConfig {
    SimConfig {
        seed:            42,
        end_time:        SimTime::from_secs(end_secs),
        update_interval: SimDuration::from_secs(1),
    }
}

fn fixed(points: &[(f64, f64)]) -> Box<dyn MobilityModel> {
    Box::new(StaticMobility::new(points.iter().map(|&(x, y)| Coord::new(x, y)).collect()))
}

fn msg(at_secs: u64, src: u32, dst: u32, ttl_secs: u64, size: u64) -> MessageSpec {
    MessageSpec::new(SimTime::from_secs(at_secs), NodeId(src), NodeId(dst), SimDuration::from_secs(ttl_secs), size)
}

fn drops(rec: &EventRecorder) -> Vec<(MessageId, NodeId, DropReason)> {
    rec.events
        .iter()
        .filter_map(|e| match e.event {
            SimEvent::MessageDropped { msg, node, reason } => Some((msg, node, reason)),
            _ => None,
        })
        .collect()
}

/// Twelve roaming nodes with a steady random workload and tight buffers.
fn roaming(seed: u64, policy: Box<dyn RoutingPolicy>) -> SimBuilder {
    let cfg = SimConfig { seed, ..config(900) };
    let area = Area::new(200.0, 200.0);
    let model = RandomWaypoint::new(area, RandomWaypointParams { speed: [1.0, 3.0], pause: [0.0, 10.0] })
        .unwrap()
        .into_model(12, seed);
    let spec = NodeSpec {
        range:    30.0,
        capacity: Capacity { bytes: Some(12_000), messages: None },
        tx_speed: 2_000.0,
        ..NodeSpec::default()
    };
    SimBuilder::new(cfg, area, Box::new(model), policy)
        .nodes(vec![spec; 12])
        .generator(GeneratorConfig {
            interval: [5.0, 10.0],
            size:     [500, 5_000],
            ttl:      300.0,
            ..GeneratorConfig::default()
        })
}

/// Replicates to anyone except `refuse`; meeting `refuse` drops the copy.
struct DropOnMeeting {
    refuse: NodeId,
}

impl RoutingPolicy for DropOnMeeting {
    fn name(&self) -> &'static str {
        "drop_on_meeting"
    }

    fn decide(&self, _msg: &Message, _copy: &BufferedCopy, ctx: &DecisionContext) -> RoutingDecision {
        if ctx.peer == self.refuse {
            RoutingDecision::Drop(DropReason::Policy)
        } else {
            RoutingDecision::Replicate(vec![ctx.peer])
        }
    }
}

// ── Builder validation ────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn defaults_to_one_spec_per_node() {
        let sim = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0), (9.0, 9.0)]), Box::new(Epidemic))
            .build()
            .unwrap();
        assert_eq!(sim.node_count(), 3);
        assert_eq!(sim.node_spec(NodeId(2)), &NodeSpec::default());
        assert_eq!(sim.policy_name(), "epidemic");
        // The initial world update is queued.
        assert_eq!(sim.pending_actions(), 1);
    }

    #[test]
    fn spec_count_mismatch_errors() {
        let err = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![NodeSpec::default()])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SimError::NodeCountMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn message_with_unknown_endpoint_errors() {
        let err = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 7, 10, 100))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn zero_update_interval_errors() {
        let cfg = SimConfig { update_interval: SimDuration::ZERO, ..config(10) };
        let err = SimBuilder::new(cfg, AREA, fixed(&[(0.0, 0.0)]), Box::new(Epidemic)).build().err().unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn bridged_node_without_layer_errors() {
        let bridged = NodeSpec { bridge: Some("gw".into()), ..NodeSpec::default() };
        let err = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![NodeSpec::default(), bridged])
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn sim_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<crate::Sim>();
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod scenario_tests {
    use super::*;

    #[test]
    fn in_range_pair_delivers() {
        let mut sim = SimBuilder::new(config(200), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        assert_eq!(sim.run(&mut rec).unwrap(), RunStatus::Completed);

        let delivered: Vec<&TimedEvent> = rec.of_kind(EventKind::MessageDelivered).collect();
        assert_eq!(delivered.len(), 1);
        assert!(delivered[0].time > SimTime::ZERO);
        // 1000 B at 250 kB/s.
        assert_eq!(delivered[0].time, SimTime::from_millis(4));
        assert!(drops(&rec).is_empty());

        let m = sim.messages().get(MessageId(0)).unwrap();
        assert_eq!(m.delivered_at, Some(SimTime::from_millis(4)));
        assert!(m.holders.is_empty(), "delivery purges the source copy");
        assert!(sim.buffer(NodeId(0)).is_empty());
    }

    #[test]
    fn relayed_then_delivered_in_order() {
        let mut sim = SimBuilder::new(config(200), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        let kinds: Vec<EventKind> = rec.events.iter().map(TimedEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ContactUp,
                EventKind::MessageCreated,
                EventKind::TransferStarted,
                EventKind::TransferComplete,
                EventKind::MessageRelayed,
                EventKind::MessageDelivered,
                EventKind::ContactDown,
            ]
        );
    }

    #[test]
    fn zero_ttl_expires_at_creation() {
        let mut sim = SimBuilder::new(config(50), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 1, 0, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();

        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::TtlExpired)]);
        let drop_time = rec.of_kind(EventKind::MessageDropped).next().unwrap().time;
        assert_eq!(drop_time, SimTime::ZERO);
        assert_eq!(rec.count(EventKind::MessageDelivered), 0);
        assert_eq!(rec.count(EventKind::TransferStarted), 0);
    }

    #[test]
    fn zero_ttl_without_contacts_expires_once() {
        let mut sim = SimBuilder::new(config(50), AREA, fixed(&[(0.0, 0.0), (500.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 1, 0, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::TtlExpired)]);
    }

    #[test]
    fn short_contact_loses_link() {
        // Node 1 leaves at t = 6 s; the transfer needs 10 s.
        let trace = TracePlayback::new(vec![
            vec![TraceSample { time: SimTime::ZERO, pos: Coord::new(0.0, 0.0) }],
            vec![
                TraceSample { time: SimTime::ZERO, pos: Coord::new(5.0, 0.0) },
                TraceSample { time: SimTime::from_secs(5), pos: Coord::new(5.0, 0.0) },
                TraceSample { time: SimTime::from_secs(6), pos: Coord::new(500.0, 0.0) },
            ],
        ]);
        let slow = NodeSpec { tx_speed: 100.0, ..NodeSpec::default() };
        let mut sim = SimBuilder::new(config(20), AREA, Box::new(trace), Box::new(Epidemic))
            .nodes(vec![slow.clone(), slow])
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();

        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(1), DropReason::LinkLost)]);
        let lost = rec.of_kind(EventKind::MessageDropped).next().unwrap();
        assert_eq!(lost.time, SimTime::from_secs(6));
        assert_eq!(rec.count(EventKind::MessageDelivered), 0);
        // The sender keeps its copy.
        assert!(sim.buffer(NodeId(0)).contains(MessageId(0)));
        assert!(!sim.buffer(NodeId(0)).get(MessageId(0)).unwrap().sending);
    }

    #[test]
    fn ttl_expiry_cancels_transfer_in_flight() {
        // 1000 B at 100 B/s needs 10 s; the TTL runs out at 5 s.
        let slow = NodeSpec { tx_speed: 100.0, ..NodeSpec::default() };
        let mut sim = SimBuilder::new(config(20), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(DirectDelivery))
            .nodes(vec![slow.clone(), slow])
            .message(msg(0, 0, 1, 5, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run_until(SimTime::from_secs(6), &mut rec).unwrap();
        assert_eq!(sim.transfers_in_flight(), 0, "the link is free once the copy is gone");

        sim.run(&mut rec).unwrap();
        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::TtlExpired)]);
        let expired = rec.of_kind(EventKind::MessageDropped).next().unwrap();
        assert_eq!(expired.time, SimTime::from_secs(5));
        assert_eq!(rec.count(EventKind::TransferStarted), 1);
        assert_eq!(rec.count(EventKind::TransferComplete), 0);
        assert_eq!(rec.count(EventKind::MessageDelivered), 0);
        assert!(sim.buffer(NodeId(1)).is_empty());
    }

    #[test]
    fn policy_drop_cancels_copy_being_sent() {
        // Node 2 walks up at 3 s, halfway through the 0 -> 1 transfer.
        let still = |x: f64, y: f64| vec![TraceSample { time: SimTime::ZERO, pos: Coord::new(x, y) }];
        let trace = TracePlayback::new(vec![
            still(0.0, 0.0),
            still(5.0, 0.0),
            vec![
                TraceSample { time: SimTime::ZERO, pos: Coord::new(500.0, 500.0) },
                TraceSample { time: SimTime::from_secs(2), pos: Coord::new(500.0, 500.0) },
                TraceSample { time: SimTime::from_secs(3), pos: Coord::new(0.0, 5.0) },
            ],
            still(900.0, 900.0),
        ]);
        let slow = NodeSpec { tx_speed: 100.0, ..NodeSpec::default() };
        let mut sim =
            SimBuilder::new(config(30), AREA, Box::new(trace), Box::new(DropOnMeeting { refuse: NodeId(2) }))
                .nodes(vec![slow; 4])
                .message(msg(0, 0, 3, 100, 1_000))
                .build()
                .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();

        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::Policy)]);
        assert_eq!(rec.of_kind(EventKind::MessageDropped).next().unwrap().time, SimTime::from_secs(3));
        assert_eq!(rec.count(EventKind::TransferStarted), 1);
        assert_eq!(rec.count(EventKind::MessageRelayed), 0);
        assert!(!sim.buffer(NodeId(1)).contains(MessageId(0)));
        assert!(sim.messages().get(MessageId(0)).unwrap().holders.is_empty());
    }

    #[test]
    fn full_buffer_evicts_oldest() {
        let tiny = NodeSpec {
            capacity: Capacity { bytes: None, messages: Some(1) },
            eviction: EvictionPolicy::DropOldest,
            ..NodeSpec::default()
        };
        let mut sim = SimBuilder::new(config(50), AREA, fixed(&[(0.0, 0.0), (500.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![tiny.clone(), tiny])
            .message(msg(0, 0, 1, 100, 100))
            .message(msg(1, 0, 1, 100, 100))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();

        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::Evicted)]);
        assert_eq!(sim.buffer(NodeId(0)).ids(), vec![MessageId(1)]);
        // The evicted message no longer lists node 0 as a holder.
        assert!(sim.messages().get(MessageId(0)).unwrap().holders.is_empty());
    }

    #[test]
    fn oversized_message_is_refused_at_source() {
        let small = NodeSpec { capacity: Capacity { bytes: Some(500), messages: None }, ..NodeSpec::default() };
        let mut sim = SimBuilder::new(config(20), AREA, fixed(&[(0.0, 0.0), (500.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![small.clone(), small])
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert_eq!(drops(&rec), vec![(MessageId(0), NodeId(0), DropReason::CapacityExceeded)]);
    }

    #[test]
    fn relay_chain_counts_hops() {
        // 0 - 1 - 2 in a line; 0 and 2 are out of range of each other.
        let mut sim = SimBuilder::new(
            config(50),
            AREA,
            fixed(&[(0.0, 0.0), (8.0, 0.0), (16.0, 0.0)]),
            Box::new(Epidemic),
        )
        .message(msg(0, 0, 2, 100, 1_000))
        .build()
        .unwrap();
        let mut stats = RunStats::new();
        sim.run(&mut stats).unwrap();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.mean_hops(), Some(2.0));
        let m = sim.messages().get(MessageId(0)).unwrap();
        assert_eq!(m.hops.len(), 2);
        assert_eq!(m.hops[1].to, NodeId(2));
    }

    #[test]
    fn direct_delivery_waits_for_destination() {
        let mut sim = SimBuilder::new(
            config(50),
            AREA,
            fixed(&[(0.0, 0.0), (8.0, 0.0), (16.0, 0.0)]),
            Box::new(DirectDelivery),
        )
        .message(msg(0, 0, 2, 100, 1_000))
        .build()
        .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert_eq!(rec.count(EventKind::TransferStarted), 0);
        assert_eq!(rec.count(EventKind::MessageDelivered), 0);
        assert!(sim.buffer(NodeId(0)).contains(MessageId(0)));
    }

    #[test]
    fn spray_and_wait_hands_out_bounded_copies() {
        // Three relays around the source, destination far away.
        let policy = SprayAndWait::new(SprayAndWaitParams { copies: 2, binary: true }).unwrap();
        let mut sim = SimBuilder::new(
            config(50),
            AREA,
            fixed(&[(0.0, 0.0), (5.0, 0.0), (0.0, 5.0), (-5.0, 0.0), (900.0, 900.0)]),
            Box::new(policy),
        )
        .message(msg(0, 0, 4, 100, 1_000))
        .build()
        .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        // Two tokens: the source keeps one, one relay gets the other.
        assert_eq!(rec.count(EventKind::MessageRelayed), 1);
        let holders = &sim.messages().get(MessageId(0)).unwrap().holders;
        assert_eq!(holders.len(), 2);
        let tokens: u32 = holders.iter().map(|&n| sim.buffer(n).get(MessageId(0)).unwrap().tokens).sum();
        assert_eq!(tokens, 2);
    }

    #[test]
    fn depleted_battery_ends_contacts() {
        let battery = NodeSpec {
            energy: Some(EnergySpec { initial: 1.0, scan_cost: 0.5, transmit_cost: 0.0 }),
            ..NodeSpec::default()
        };
        let mut sim = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![battery, NodeSpec::default()])
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        let down = rec.of_kind(EventKind::ContactDown).next().unwrap();
        assert_eq!(down.time, SimTime::from_secs(1));
        assert!(!sim.is_active(NodeId(0)));
        assert_eq!(sim.energy(NodeId(0)), Some(0.0));
        assert_eq!(rec.count(EventKind::ContactUp), 1);
    }

    #[test]
    fn sleeping_node_drops_out_at_next_update() {
        let mut sim = SimBuilder::new(config(10), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run_until(SimTime::from_millis(2_500), &mut rec).unwrap();
        assert_eq!(rec.count(EventKind::ContactUp), 1);
        sim.set_active(NodeId(1), false);
        sim.run(&mut rec).unwrap();
        let down = rec.of_kind(EventKind::ContactDown).next().unwrap();
        assert_eq!(down.time, SimTime::from_secs(3));
    }

    #[test]
    fn bridged_receiver_uses_adapter_timing() {
        let bridged = NodeSpec { bridge: Some("gw".into()), ..NodeSpec::default() };
        let adapter = LoopbackAdapter::new(SimDuration::from_millis(500), 1_000_000.0).with_peers(vec!["gw".into()]);
        let mut sim = SimBuilder::new(config(20), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![NodeSpec::default(), bridged])
            .bridge(Box::new(adapter))
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        let delivered = rec.of_kind(EventKind::MessageDelivered).next().unwrap();
        assert!(delivered.time >= SimTime::from_millis(500));
        assert!(delivered.time < SimTime::from_secs(1));
    }

    #[test]
    fn unknown_bridge_peer_is_skipped() {
        let bridged = NodeSpec { bridge: Some("elsewhere".into()), ..NodeSpec::default() };
        let adapter = LoopbackAdapter::new(SimDuration::ZERO, 1_000_000.0).with_peers(vec!["gw".into()]);
        let mut sim = SimBuilder::new(config(5), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .nodes(vec![NodeSpec::default(), bridged])
            .bridge(Box::new(adapter))
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert_eq!(rec.count(EventKind::TransferStarted), 0);
        assert!(sim.buffer(NodeId(0)).contains(MessageId(0)));
    }
}

// ── Run-loop properties ───────────────────────────────────────────────────────

#[cfg(test)]
mod property_tests {
    use super::*;

    #[test]
    fn same_seed_same_events() {
        let run = |seed| {
            let mut sim = roaming(seed, Box::new(Epidemic)).build().unwrap();
            let mut rec = EventRecorder::new();
            sim.run(&mut rec).unwrap();
            rec.events
        };
        let a = run(7);
        assert!(!a.is_empty());
        assert_eq!(a, run(7));
        assert_ne!(a, run(8));
    }

    #[test]
    fn event_times_never_decrease() {
        let mut sim = roaming(3, Box::new(Epidemic)).build().unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert!(rec.events.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn scheduling_in_the_past_is_rejected() {
        let mut sim = SimBuilder::new(config(100), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run_until(SimTime::from_secs(10), &mut rec).unwrap();
        assert_eq!(sim.now(), SimTime::from_secs(10));
        let err = sim.schedule_message(msg(5, 0, 1, 10, 100)).unwrap_err();
        assert!(matches!(err, SimError::InvalidTime { .. }));
        sim.schedule_message(msg(10, 0, 1, 10, 100)).unwrap();
    }

    #[test]
    fn buffers_stay_within_capacity() {
        let mut sim = roaming(11, Box::new(Epidemic)).build().unwrap();
        let mut stats = RunStats::new();
        while sim.step(&mut stats).unwrap() {
            for i in 0..sim.node_count() {
                let b = sim.buffer(NodeId(i as u32));
                assert!(b.used_bytes() <= 12_000, "node {i} holds {} bytes", b.used_bytes());
            }
            if sim.now() >= sim.config().end_time {
                break;
            }
        }
        assert!(stats.created > 0);
    }

    #[test]
    fn contacts_are_symmetric_after_finish() {
        let mut sim = roaming(5, Box::new(Epidemic)).build().unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        assert!(sim.is_finished());
        assert_eq!(sim.detector().active_count(), 0);

        let mut open = std::collections::BTreeMap::new();
        for e in &rec.events {
            match e.event {
                SimEvent::ContactUp { a, b } => {
                    assert!(open.insert((a, b), e.time).is_none(), "double up for {a}-{b}");
                }
                SimEvent::ContactDown { a, b } => {
                    let up = open.remove(&(a, b)).expect("down without up");
                    assert!(e.time >= up);
                }
                _ => {}
            }
        }
        assert!(open.is_empty());
        assert_eq!(rec.count(EventKind::ContactUp), rec.count(EventKind::ContactDown));
    }

    #[test]
    fn messages_are_accounted_for() {
        let mut sim = roaming(9, Box::new(Epidemic)).build().unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();

        for m in sim.messages().iter() {
            let delivered = m.delivered_at.is_some();
            let pending = !m.holders.is_empty();
            let dropped = rec.events.iter().any(|e| matches!(e.event, SimEvent::MessageDropped { msg, .. } if msg == m.id));
            assert!(delivered || pending || dropped, "message {} vanished", m.id);
            for h in &m.holders {
                assert!(sim.buffer(*h).contains(m.id));
            }
            if let Some(at) = m.delivered_at {
                assert!(m.holders.is_empty(), "purged on delivery");
                let late_drop = rec.events.iter().any(|e| {
                    e.time > at && matches!(e.event, SimEvent::MessageDropped { msg, .. } if msg == m.id)
                });
                assert!(!late_drop, "message {} dropped after delivery", m.id);
            }
        }
    }

    #[test]
    fn finish_is_idempotent() {
        let mut sim = SimBuilder::new(config(5), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .build()
            .unwrap();
        let mut rec = EventRecorder::new();
        sim.run(&mut rec).unwrap();
        let n = rec.events.len();
        sim.finish(&mut rec);
        assert_eq!(rec.events.len(), n);
        assert_eq!(rec.ended, Some(SimTime::from_secs(5)));
    }

    #[test]
    fn stats_match_recorded_events() {
        let mut sim = roaming(13, Box::new(Epidemic)).build().unwrap();
        let mut stats = RunStats::new();
        let mut rec = EventRecorder::new();
        {
            let mut set = ObserverSet::new().with(&mut stats).with(&mut rec);
            sim.run(&mut set).unwrap();
        }
        assert_eq!(stats.created as usize, rec.count(EventKind::MessageCreated));
        assert_eq!(stats.delivered as usize, rec.count(EventKind::MessageDelivered));
        assert_eq!(stats.dropped_total() as usize, rec.count(EventKind::MessageDropped));
        assert_eq!(stats.end_time, SimTime::from_secs(900));
    }
}

// ── Control ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod control_tests {
    use super::*;

    fn pair_sim() -> crate::Sim {
        SimBuilder::new(config(30), AREA, fixed(&[(0.0, 0.0), (5.0, 0.0)]), Box::new(Epidemic))
            .message(msg(0, 0, 1, 100, 1_000))
            .build()
            .unwrap()
    }

    #[test]
    fn parses_console_lines() {
        assert_eq!("pause".parse::<ControlCommand>().unwrap(), ControlCommand::Pause);
        assert_eq!(" continue ".parse::<ControlCommand>().unwrap(), ControlCommand::Resume);
        assert_eq!("step".parse::<ControlCommand>().unwrap(), ControlCommand::Step(1));
        assert_eq!("step 25".parse::<ControlCommand>().unwrap(), ControlCommand::Step(25));
        assert_eq!("QUIT".parse::<ControlCommand>().unwrap(), ControlCommand::Terminate);
        assert!("step many".parse::<ControlCommand>().is_err());
        assert!("jump".parse::<ControlCommand>().is_err());
    }

    #[test]
    fn terminate_stops_before_any_event() {
        let mut sim = pair_sim();
        let (tx, rx) = mpsc::channel();
        tx.send(ControlCommand::Terminate).unwrap();
        let status = sim.run_controlled(SimTime::from_secs(30), &mut EventRecorder::new(), &rx).unwrap();
        assert_eq!(status, RunStatus::Stopped);
        assert_eq!(sim.dispatched(), 0);
    }

    #[test]
    fn step_then_hang_up_resumes() {
        let mut full = pair_sim();
        full.run_until(SimTime::from_secs(30), &mut EventRecorder::new()).unwrap();

        let mut sim = pair_sim();
        let (tx, rx) = mpsc::channel();
        tx.send(ControlCommand::Step(3)).unwrap();
        drop(tx);
        let status = sim.run_controlled(SimTime::from_secs(30), &mut EventRecorder::new(), &rx).unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(sim.dispatched(), full.dispatched());
        assert_eq!(sim.now(), SimTime::from_secs(30));
    }

    #[test]
    fn paused_run_waits_for_commands() {
        let mut sim = pair_sim();
        let (tx, rx) = mpsc::channel();
        tx.send(ControlCommand::Step(2)).unwrap();
        let handle = std::thread::spawn(move || {
            let mut rec = EventRecorder::new();
            let status = sim.run_controlled(SimTime::from_secs(30), &mut rec, &rx).unwrap();
            (status, sim.dispatched())
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        tx.send(ControlCommand::Terminate).unwrap();
        let (status, dispatched) = handle.join().unwrap();
        assert_eq!(status, RunStatus::Stopped);
        assert_eq!(dispatched, 2);
    }

    #[test]
    fn stop_handle_ends_run() {
        let mut sim = pair_sim();
        sim.stop_handle().stop();
        let mut rec = EventRecorder::new();
        assert_eq!(sim.run(&mut rec).unwrap(), RunStatus::Stopped);
        assert_eq!(sim.dispatched(), 0);
        assert!(rec.ended.is_some());
    }
}

// ── Bridge codec ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod bridge_tests {
    use super::*;
    use crate::{ConvergenceLayer, WireBundle};
    use dtn_store::MessageTable;

    #[test]
    fn wire_bundle_keeps_identity() {
        let mut table = MessageTable::new();
        let id = table.create(NodeId(3), NodeId(9), SimTime::from_secs(2), SimDuration::from_secs(60), 512, 4);
        let m = table.get(id).unwrap();
        let bytes = WireBundle::from_message(m).encode().unwrap();
        let back = WireBundle::decode(&bytes).unwrap().to_message();
        assert_eq!(back.id, id);
        assert_eq!(back.source, NodeId(3));
        assert_eq!(back.destination, NodeId(9));
        assert_eq!(back.expires_at(), m.expires_at());
        assert_eq!(back.priority, 4);
    }

    #[test]
    fn loopback_reports_latency_plus_serialisation() {
        let mut cl = LoopbackAdapter::new(SimDuration::from_millis(100), 1_000.0);
        let done = cl.send_payload("peer", &[0u8; 500]).unwrap();
        assert_eq!(done.duration, SimDuration::from_millis(600));
        assert_eq!(cl.sent().len(), 1);
    }

    #[test]
    fn loopback_rejects_garbage() {
        let mut cl = LoopbackAdapter::new(SimDuration::ZERO, 1_000.0);
        assert!(cl.on_receive(b"not json").is_err());
    }
}

// ── Scenario files and sweeps ─────────────────────────────────────────────────

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::{run_sweep, seed_sweep, MobilityConfig};

    const PAIR: &str = r#"
        name     = "pair"
        seed     = 1
        end_time = 60.0

        [area]
        width  = 100.0
        height = 100.0

        [[groups]]
        count = 2
        range = 10.0

        [mobility]
        kind      = "static"
        positions = [[0.0, 0.0], [5.0, 0.0]]

        [[messages]]
        time        = 0.0
        source      = 0
        destination = 1
        ttl         = 30.0
        size        = 1000
    "#;

    #[test]
    fn parses_and_runs_a_scenario() {
        let cfg = ScenarioConfig::from_toml_str(PAIR).unwrap();
        assert_eq!(cfg.node_count(), 2);
        assert!(cfg.purge_on_delivery);
        assert_eq!(cfg.routing.name(), "epidemic");
        assert_eq!(cfg.sim_config().end_time, SimTime::from_secs(60));

        let mut sim = cfg.build(None).unwrap();
        let mut stats = RunStats::new();
        sim.run(&mut stats).unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn groups_expand_in_order() {
        let src = PAIR.replace(
            "[[groups]]\n        count = 2\n        range = 10.0",
            "[[groups]]\n        count = 1\n        range = 10.0\n\n        [[groups]]\n        count = 1\n        range = 25.0\n        buffer_messages = 3\n        eviction = \"drop_largest\"",
        );
        let cfg = ScenarioConfig::from_toml_str(&src).unwrap();
        let specs = cfg.node_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].range, 10.0);
        assert_eq!(specs[1].range, 25.0);
        assert_eq!(specs[1].capacity.messages, Some(3));
        assert_eq!(specs[1].eviction, EvictionPolicy::DropLargest);
    }

    #[test]
    fn rejects_unknown_policy() {
        let src = format!("{PAIR}\n[routing]\npolicy = \"gossip\"\n");
        assert!(matches!(ScenarioConfig::from_toml_str(&src), Err(SimError::Toml(_))));
    }

    #[test]
    fn rejects_unknown_keys() {
        let src = format!("colour = \"blue\"\n{PAIR}");
        assert!(matches!(ScenarioConfig::from_toml_str(&src), Err(SimError::Toml(_))));
    }

    #[test]
    fn rejects_bad_values() {
        let src = PAIR.replace("end_time = 60.0", "end_time = -1.0");
        assert!(matches!(ScenarioConfig::from_toml_str(&src), Err(SimError::Config(_))));
        let src = PAIR.replace("destination = 1", "destination = 0");
        assert!(matches!(ScenarioConfig::from_toml_str(&src), Err(SimError::Config(_))));
    }

    #[test]
    fn static_position_count_must_match() {
        let src = PAIR.replace("positions = [[0.0, 0.0], [5.0, 0.0]]", "positions = [[0.0, 0.0]]");
        let cfg = ScenarioConfig::from_toml_str(&src).unwrap();
        assert!(matches!(cfg.build(None).err().unwrap(), SimError::NodeCountMismatch { .. }));
    }

    #[test]
    fn random_static_placement_is_seeded() {
        let src = PAIR.replace("positions = [[0.0, 0.0], [5.0, 0.0]]", "");
        let cfg = ScenarioConfig::from_toml_str(&src).unwrap();
        assert_eq!(cfg.mobility, MobilityConfig::Static { positions: None });
        let a = cfg.build(None).unwrap();
        let b = cfg.build(None).unwrap();
        assert_eq!(a.world().positions(SimTime::ZERO), b.world().positions(SimTime::ZERO));
    }

    #[test]
    fn loads_fuzzy_rule_base_next_to_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let fcl = "FUNCTION_BLOCK f\n\
            VAR_INPUT ttl : REAL; END_VAR\n\
            VAR_OUTPUT decision : REAL; END_VAR\n\
            FUZZIFY ttl\nTERM low := (0, 1) (1, 0);\nTERM high := (0, 0) (1, 1);\nEND_FUZZIFY\n\
            DEFUZZIFY decision\nTERM hold := trian 0 0 0.6;\nTERM send := trian 0.4 1 1;\nRANGE := (0 .. 1);\nEND_DEFUZZIFY\n\
            RULEBLOCK r\nRULE 1 : IF ttl IS high THEN decision IS send;\nRULE 2 : IF ttl IS low THEN decision IS hold;\nEND_RULEBLOCK\n\
            END_FUNCTION_BLOCK\n";
        std::fs::write(dir.path().join("relay.fcl"), fcl).unwrap();
        let scenario = format!(
            "{PAIR}\n[routing]\npolicy = \"fuzzy\"\nrule_base = \"relay.fcl\"\n\
             bindings = [{{ feature = \"remaining_ttl\", variable = \"ttl\" }}]\n"
        );
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, scenario).unwrap();

        let (cfg, base) = ScenarioConfig::load(&path).unwrap();
        assert_eq!(cfg.routing.name(), "fuzzy");
        let mut sim = cfg.build(Some(&base)).unwrap();
        assert_eq!(sim.policy_name(), "fuzzy");
        let mut stats = RunStats::new();
        sim.run(&mut stats).unwrap();
        // The destination is always handed the message.
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn map_based_mobility_loads_roads_next_to_scenario() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roads.csv"), "ax,ay,bx,by\n0,0,50,0\n50,0,50,50\n50,50,0,50\n0,50,0,0\n")
            .unwrap();
        let scenario = PAIR.replace(
            "kind      = \"static\"\n        positions = [[0.0, 0.0], [5.0, 0.0]]",
            "kind  = \"map_based\"\n        map   = \"roads.csv\"\n        speed = [1.0, 2.0]",
        );
        let path = dir.path().join("scenario.toml");
        std::fs::write(&path, scenario).unwrap();

        let (cfg, base) = ScenarioConfig::load(&path).unwrap();
        assert_eq!(cfg.mobility.name(), "map_based");
        let mut sim = cfg.build(Some(&base)).unwrap();
        let mut stats = RunStats::new();
        sim.run(&mut stats).unwrap();
        assert_eq!(stats.created, 1);
        // Nodes never leave the road square.
        for p in sim.world().positions(sim.now()) {
            let on_map = |v: f64| (-1e-9..=50.0 + 1e-9).contains(&v);
            assert!(on_map(p.x) && on_map(p.y), "{p:?}");
        }
    }

    #[test]
    fn encounter_based_policies_run_from_scenario() {
        for (routing, name) in [
            ("policy = \"spray_and_focus\"\ncopies = 4\n", "spray_and_focus"),
            ("policy = \"bubble_rap\"\nfamiliar_threshold = 30.0\n", "bubble_rap"),
        ] {
            let cfg = ScenarioConfig::from_toml_str(&format!("{PAIR}\n[routing]\n{routing}")).unwrap();
            let mut sim = cfg.build(None).unwrap();
            assert_eq!(sim.policy_name(), name);
            let mut stats = RunStats::new();
            sim.run(&mut stats).unwrap();
            assert_eq!(stats.delivered, 1, "{name}");
        }
    }

    #[test]
    fn missing_rule_base_fails_at_build() {
        let src = format!(
            "{PAIR}\n[routing]\npolicy = \"fuzzy\"\nrule_base = \"/nonexistent/relay.fcl\"\n\
             bindings = [{{ feature = \"remaining_ttl\", variable = \"ttl\" }}]\n"
        );
        let cfg = ScenarioConfig::from_toml_str(&src).unwrap();
        assert!(matches!(cfg.build(None).err().unwrap(), SimError::Routing(_)));
    }

    #[test]
    fn seed_sweep_runs_in_input_order() {
        let base = ScenarioConfig::from_toml_str(PAIR).unwrap();
        let configs = seed_sweep(&base, [1, 2, 1]);
        assert_eq!(configs[1].name, "pair-seed2");
        let results = run_sweep(&configs, None);
        assert_eq!(results.len(), 3);
        let seeds: Vec<u64> = results.iter().map(|r| r.as_ref().unwrap().seed).collect();
        assert_eq!(seeds, vec![1, 2, 1]);
        let first = &results[0].as_ref().unwrap().stats;
        assert_eq!(first, &results[2].as_ref().unwrap().stats);
        assert_eq!(first.delivered, 1);
    }

    #[test]
    fn bundled_demo_scenarios_build() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/dtnsim/scenarios");
        for name in ["campus.toml", "fuzzy.toml"] {
            let (cfg, base) = ScenarioConfig::load(&dir.join(name)).unwrap();
            assert_eq!(cfg.node_count(), 48, "{name}");
            let sim = cfg.build(Some(&base)).unwrap();
            assert_eq!(sim.node_count(), 48);
        }
    }
}
