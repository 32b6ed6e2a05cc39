//! Unit tests for dtn-routing.

use dtn_core::{DropReason, MessageId, NodeId, SimDuration, SimTime};
use dtn_store::{BufferedCopy, Message};

use crate::fuzzy::{parse_fcl, FuzzyEngine, RuleBase};
use crate::{
    BubbleRap, BubbleRapParams, CopySplit, DecisionContext, DirectDelivery, Epidemic, Feature, FeatureBinding,
    FuzzyConfig, FuzzyPolicy, Prophet, ProphetParams, RoutingConfig, RoutingDecision, RoutingError,
    RoutingPolicy, SprayAndFocus, SprayAndFocusParams, SprayAndWait, SprayAndWaitParams,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Message 0 from node 0 to node 2, TTL 100 s.
fn message() -> Message {
    Message::new(MessageId(0), NodeId(0), NodeId(2), SimTime::ZERO, SimDuration::from_secs(100), 10)
}

fn copy_with_tokens(tokens: u32) -> BufferedCopy {
    BufferedCopy { tokens, ..BufferedCopy::new(MessageId(0), SimTime::ZERO) }
}

fn ctx(local: u32, peer: u32) -> DecisionContext {
    DecisionContext {
        now:   SimTime::from_secs(100),
        local: NodeId(local),
        peer:  NodeId(peer),
        contact_start: SimTime::from_secs(90),
        estimated_contact_duration: None,
        local_occupancy: 0.0,
        peer_occupancy:  0.0,
        remaining_ttl_fraction: 1.0,
    }
}

const RELAY_FCL: &str = r#"FUNCTION_BLOCK relay
// two inputs, one output
VAR_INPUT
    ttl  : REAL;
    peer : REAL;
END_VAR
VAR_OUTPUT
    decision : REAL;
END_VAR
FUZZIFY ttl
    TERM low  := (0, 1) (0.5, 0);
    TERM high := (0.5, 0) (1, 1);
    RANGE := (0 .. 1);
END_FUZZIFY
FUZZIFY peer
    TERM weak   := trape 0 0 0.3 0.6;
    TERM strong := trian 0.4 1 1;
END_FUZZIFY
(* output: low scores drop,
   high scores send *)
DEFUZZIFY decision
    TERM discard := trian 0 0 0.2;
    TERM hold    := trian 0.2 0.35 0.5;
    TERM send    := trian 0.8 1 1;
    RANGE := (0 .. 1);
    METHOD : COG;
    DEFAULT := 0.3;
END_DEFUZZIFY
RULEBLOCK main
    AND : MIN;
    OR : MAX;
    ACT : MIN;
    ACCU : MAX;
    RULE 1 : IF ttl IS low THEN decision IS discard;
    RULE 2 : IF ttl IS high AND peer IS strong THEN decision IS send;
    RULE 3 : IF ttl IS high AND NOT (peer IS strong) THEN decision IS hold WITH 0.9;
END_RULEBLOCK
END_FUNCTION_BLOCK
"#;

fn relay_rules() -> RuleBase {
    parse_fcl(RELAY_FCL).unwrap()
}

fn relay_config() -> FuzzyConfig {
    FuzzyConfig::new(
        "relay.fcl",
        vec![
            FeatureBinding { feature: Feature::RemainingTtl, variable: "ttl".into() },
            FeatureBinding { feature: Feature::PeerDeliveryProbability, variable: "peer".into() },
        ],
    )
}

/// Minimal one-input rule base with the given rule block body.
fn single_input(body: &str) -> String {
    format!(
        "FUNCTION_BLOCK t\nVAR_INPUT x : REAL; END_VAR\nVAR_OUTPUT y : REAL; END_VAR\n\
         FUZZIFY x\nTERM lo := (0, 1) (1, 0);\nTERM hi := (0, 0) (1, 1);\nEND_FUZZIFY\n\
         DEFUZZIFY y\nTERM a := trian 0 0 1;\nTERM b := trian 0 1 1;\nMETHOD : COG;\nEND_DEFUZZIFY\n\
         RULEBLOCK r\n{body}\nEND_RULEBLOCK\nEND_FUNCTION_BLOCK\n"
    )
}

// ── Built-in policies ─────────────────────────────────────────────────────────

#[cfg(test)]
mod epidemic_tests {
    use super::*;

    #[test]
    fn forwards_to_destination_and_replicates_elsewhere() {
        let p = Epidemic;
        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 2)), RoutingDecision::Forward(NodeId(2)));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.name(), "epidemic");
    }

    #[test]
    fn direct_delivery_only_hands_to_destination() {
        let p = DirectDelivery;
        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 2)), RoutingDecision::Forward(NodeId(2)));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Hold);
    }

    #[test]
    fn sends_to_matches_targets() {
        assert!(RoutingDecision::Forward(NodeId(3)).sends_to(NodeId(3)));
        assert!(RoutingDecision::Replicate(vec![NodeId(1), NodeId(3)]).sends_to(NodeId(3)));
        assert!(!RoutingDecision::Hold.sends_to(NodeId(3)));
        assert!(!RoutingDecision::Drop(DropReason::Policy).sends_to(NodeId(3)));
    }
}

#[cfg(test)]
mod spray_and_wait_tests {
    use super::*;

    #[test]
    fn source_gets_configured_copies() {
        let mut p = SprayAndWait::new(SprayAndWaitParams { copies: 8, binary: true }).unwrap();
        assert_eq!(p.on_message_created(&message()), 8);
    }

    #[test]
    fn replicates_while_tokens_remain() {
        let p = SprayAndWait::new(SprayAndWaitParams::default()).unwrap();
        let m = message();
        assert_eq!(p.decide(&m, &copy_with_tokens(6), &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.decide(&m, &copy_with_tokens(1), &ctx(0, 1)), RoutingDecision::Hold);
        assert_eq!(p.decide(&m, &copy_with_tokens(1), &ctx(0, 2)), RoutingDecision::Forward(NodeId(2)));
    }

    #[test]
    fn binary_split_halves_budget() {
        let p = SprayAndWait::new(SprayAndWaitParams { copies: 7, binary: true }).unwrap();
        assert_eq!(p.split_copies(7), CopySplit { keep: 3, give: 4 });
        assert_eq!(p.split_copies(2), CopySplit { keep: 1, give: 1 });
    }

    #[test]
    fn source_spraying_hands_one_token() {
        let p = SprayAndWait::new(SprayAndWaitParams { copies: 6, binary: false }).unwrap();
        assert_eq!(p.split_copies(6), CopySplit { keep: 5, give: 1 });
    }

    #[test]
    fn zero_copies_rejected() {
        let err = SprayAndWait::new(SprayAndWaitParams { copies: 0, binary: true }).unwrap_err();
        assert!(matches!(err, RoutingError::Config(_)));
    }
}

#[cfg(test)]
mod prophet_tests {
    use super::*;

    #[test]
    fn encounter_sets_p_init_both_ways() {
        let mut p = Prophet::new(ProphetParams::default()).unwrap();
        p.on_contact_up(NodeId(0), NodeId(1), SimTime::ZERO);
        let preds = p.predictability();
        assert!((preds.get(NodeId(0), NodeId(1)) - 0.75).abs() < 1e-12);
        assert!((preds.get(NodeId(1), NodeId(0)) - 0.75).abs() < 1e-12);
        assert_eq!(preds.get(NodeId(0), NodeId(2)), 0.0);
    }

    #[test]
    fn transitive_update() {
        let mut p = Prophet::new(ProphetParams::default()).unwrap();
        p.on_contact_up(NodeId(0), NodeId(1), SimTime::ZERO);
        p.on_contact_up(NodeId(1), NodeId(2), SimTime::ZERO);
        // P(2,0) = P(2,1) * P(1,0) * beta
        let expected = 0.75 * 0.75 * 0.25;
        assert!((p.predictability().get(NodeId(2), NodeId(0)) - expected).abs() < 1e-12);
    }

    #[test]
    fn aging_decays_by_gamma_per_unit() {
        let mut p = Prophet::new(ProphetParams::default()).unwrap();
        p.on_contact_up(NodeId(0), NodeId(1), SimTime::ZERO);
        let mut preds = p.predictability().clone();
        preds.age(NodeId(0), SimTime::from_secs(30));
        assert!((preds.get(NodeId(0), NodeId(1)) - 0.75 * 0.98).abs() < 1e-12);
    }

    #[test]
    fn replicates_towards_better_carrier() {
        let mut p = Prophet::new(ProphetParams::default()).unwrap();
        p.on_contact_up(NodeId(1), NodeId(2), SimTime::ZERO);
        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Hold);
        assert_eq!(p.decide(&m, &c, &ctx(1, 2)), RoutingDecision::Forward(NodeId(2)));
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = ProphetParams { gamma: 1.5, ..ProphetParams::default() };
        assert!(Prophet::new(bad).is_err());
        let bad = ProphetParams { seconds_in_time_unit: 0.0, ..ProphetParams::default() };
        assert!(Prophet::new(bad).is_err());
    }
}

#[cfg(test)]
mod spray_and_focus_tests {
    use super::*;

    fn secs(s: u64) -> SimTime {
        SimTime::from_secs(s)
    }

    #[test]
    fn sprays_like_spray_and_wait() {
        let p = SprayAndFocus::new(SprayAndFocusParams { copies: 7, ..SprayAndFocusParams::default() }).unwrap();
        assert_eq!(p.name(), "spray_and_focus");
        assert_eq!(p.decide(&message(), &copy_with_tokens(7), &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.split_copies(7), CopySplit { keep: 3, give: 4 });
        assert_eq!(p.decide(&message(), &copy_with_tokens(1), &ctx(0, 2)), RoutingDecision::Forward(NodeId(2)));
    }

    #[test]
    fn last_copy_follows_fresher_sighting() {
        let mut p = SprayAndFocus::new(SprayAndFocusParams::default()).unwrap();
        let (m, c) = (message(), copy_with_tokens(1));
        // Nobody has met the destination yet.
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Hold);

        p.on_contact_up(NodeId(1), NodeId(2), secs(50));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Forward(NodeId(1)));
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Hold);

        // Node 0 now has the fresher sighting.
        p.on_contact_up(NodeId(0), NodeId(2), secs(80));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Hold);
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Forward(NodeId(0)));
    }

    #[test]
    fn sightings_spread_with_transitivity_delay() {
        let mut p = SprayAndFocus::new(SprayAndFocusParams::default()).unwrap();
        p.on_contact_up(NodeId(1), NodeId(2), secs(50));
        p.on_contact_up(NodeId(0), NodeId(1), secs(60));
        assert_eq!(p.last_encounter(NodeId(0), NodeId(1)), Some(secs(60)));
        assert_eq!(p.last_encounter(NodeId(0), NodeId(2)), Some(secs(40)));

        p.on_contact_up(NodeId(0), NodeId(2), secs(70));
        p.on_contact_up(NodeId(0), NodeId(1), secs(80));
        // Second-hand news only replaces older knowledge.
        assert_eq!(p.last_encounter(NodeId(1), NodeId(2)), Some(secs(60)));
        assert_eq!(p.last_encounter(NodeId(0), NodeId(2)), Some(secs(70)));
    }

    #[test]
    fn invalid_params_rejected() {
        let bad = SprayAndFocusParams { transitivity_delay: -1.0, ..SprayAndFocusParams::default() };
        assert!(matches!(SprayAndFocus::new(bad), Err(RoutingError::Config(_))));
        let bad = SprayAndFocusParams { copies: 0, ..SprayAndFocusParams::default() };
        assert!(SprayAndFocus::new(bad).is_err());
    }
}

#[cfg(test)]
mod bubble_rap_tests {
    use super::*;

    fn secs(s: u64) -> SimTime {
        SimTime::from_secs(s)
    }

    fn policy() -> BubbleRap {
        BubbleRap::new(BubbleRapParams { familiar_threshold: 100.0, window: 1_000.0 }).unwrap()
    }

    #[test]
    fn community_forms_from_cumulative_contact_time() {
        let mut p = policy();
        p.on_contact_down(NodeId(0), NodeId(1), secs(0), secs(60));
        assert!(!p.in_community(NodeId(0), NodeId(1)));
        p.on_contact_down(NodeId(1), NodeId(0), secs(100), secs(150));
        assert!(p.in_community(NodeId(0), NodeId(1)));
        assert!(p.in_community(NodeId(1), NodeId(0)));

        p.on_contact_down(NodeId(0), NodeId(2), secs(0), secs(99));
        assert_eq!(p.community(NodeId(0)).into_iter().collect::<Vec<_>>(), vec![NodeId(0), NodeId(1)]);
        assert!(p.in_community(NodeId(2), NodeId(2)));
    }

    #[test]
    fn centrality_averages_distinct_peers_per_window() {
        let mut p = policy();
        for (peer, t) in [(3, 10), (4, 20), (5, 30), (3, 40)] {
            p.on_contact_up(NodeId(1), NodeId(peer), secs(t));
        }
        p.on_contact_up(NodeId(0), NodeId(3), secs(50));
        assert_eq!(p.encounter_counts(NodeId(1)), vec![3]);
        assert_eq!(p.encounter_counts(NodeId(3)), vec![2]);

        // Inside the first window the partial count stands in.
        assert_eq!(p.global_centrality(NodeId(1), secs(500)), 3.0);
        assert_eq!(p.global_centrality(NodeId(1), secs(1_500)), 3.0);
        assert_eq!(p.global_centrality(NodeId(1), secs(2_500)), 1.5);
        assert_eq!(p.global_centrality(NodeId(0), secs(1_500)), 1.0);
        assert_eq!(p.global_centrality(NodeId(9), secs(1_500)), 0.0);
        assert_eq!(p.local_centrality(NodeId(1), secs(1_500)), 0.0);
    }

    #[test]
    fn climbs_global_centrality_outside_communities() {
        let mut p = policy();
        for peer in [3, 4, 5] {
            p.on_contact_up(NodeId(1), NodeId(peer), secs(10));
        }
        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Hold);
        assert_eq!(p.decide(&m, &c, &ctx(0, 2)), RoutingDecision::Forward(NodeId(2)));
    }

    #[test]
    fn hands_over_into_destination_community() {
        let mut p = policy();
        p.on_contact_down(NodeId(1), NodeId(2), secs(0), secs(200));
        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Forward(NodeId(1)));
        // Inside the community the copy stays put for outsiders.
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Hold);
    }

    #[test]
    fn uses_local_centrality_inside_community() {
        let mut p = policy();
        p.on_contact_down(NodeId(0), NodeId(2), secs(0), secs(200));
        p.on_contact_down(NodeId(1), NodeId(2), secs(0), secs(200));
        p.on_contact_up(NodeId(1), NodeId(2), secs(10));
        p.on_contact_up(NodeId(1), NodeId(3), secs(20));
        assert_eq!(p.local_centrality(NodeId(1), secs(100)), 1.0);
        assert_eq!(p.local_centrality(NodeId(0), secs(100)), 0.0);

        let (m, c) = (message(), copy_with_tokens(1));
        assert_eq!(p.decide(&m, &c, &ctx(0, 1)), RoutingDecision::Replicate(vec![NodeId(1)]));
        assert_eq!(p.decide(&m, &c, &ctx(1, 0)), RoutingDecision::Hold);
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(BubbleRap::new(BubbleRapParams { window: 0.0, ..BubbleRapParams::default() }).is_err());
        let bad = BubbleRapParams { familiar_threshold: f64::NAN, ..BubbleRapParams::default() };
        assert!(matches!(BubbleRap::new(bad), Err(RoutingError::Config(_))));
    }
}

// ── FCL parser ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod fcl_tests {
    use super::*;
    use crate::fuzzy::{Defuzzifier, Membership};

    #[test]
    fn parses_full_rule_base() {
        let rb = relay_rules();
        assert_eq!(rb.name, "relay");
        assert_eq!(rb.inputs.len(), 2);
        assert_eq!(rb.outputs.len(), 1);
        assert_eq!(rb.rule_count(), 3);
        assert_eq!(rb.inputs[0].range, (0.0, 1.0));
        // no RANGE: universe spans the term supports
        assert_eq!(rb.inputs[1].range, (0.0, 1.0));
        let out = &rb.outputs[0];
        assert_eq!(out.method, Defuzzifier::Cog);
        assert_eq!(out.default, Some(0.3));
        assert_eq!(out.var.terms[2].shape, Membership::Triangle(0.8, 1.0, 1.0));
        assert_eq!(rb.blocks[0].rules[2].weight, 0.9);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        let src = single_input("and : prod; rule 1 : if x is hi then y is b;");
        let rb = parse_fcl(&src.to_lowercase()).unwrap();
        assert_eq!(rb.rule_count(), 1);
    }

    #[test]
    fn membership_shapes() {
        let tri = Membership::Triangle(0.0, 1.0, 2.0);
        assert_eq!(tri.degree(0.5), 0.5);
        assert_eq!(tri.degree(1.0), 1.0);
        assert_eq!(tri.degree(2.5), 0.0);
        let trap = Membership::Trapezoid(0.0, 1.0, 2.0, 4.0);
        assert_eq!(trap.degree(1.5), 1.0);
        assert_eq!(trap.degree(3.0), 0.5);
        let pts = Membership::Points(vec![(0.0, 0.0), (1.0, 1.0), (2.0, 1.0)]);
        assert_eq!(pts.degree(-5.0), 0.0);
        assert_eq!(pts.degree(0.25), 0.25);
        assert_eq!(pts.degree(9.0), 1.0);
    }

    #[test]
    fn unknown_term_reports_its_line() {
        let src = single_input("RULE 1 : IF x IS hi THEN y IS b;\nRULE 2 : IF x IS medium THEN y IS a;");
        let err = parse_fcl(&src).unwrap_err();
        // RULEBLOCK opens on line 13, so RULE 2 sits on line 15
        assert_eq!(err.line, 15);
        assert!(err.msg.contains("medium"), "{err}");
    }

    #[test]
    fn unknown_output_variable() {
        let src = single_input("RULE 1 : IF x IS hi THEN z IS b;");
        let err = parse_fcl(&src).unwrap_err();
        assert!(err.msg.contains("\"z\""), "{err}");
    }

    #[test]
    fn missing_end_block() {
        let err = parse_fcl("FUNCTION_BLOCK t\nVAR_INPUT x : REAL; END_VAR\n").unwrap_err();
        assert!(err.msg.contains("END_FUNCTION_BLOCK"), "{err}");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unterminated_comment() {
        let err = parse_fcl("FUNCTION_BLOCK t\n(* open\n\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn unsupported_method() {
        let src = single_input("RULE 1 : IF x IS hi THEN y IS b;").replace("METHOD : COG", "METHOD : LM");
        let err = parse_fcl(&src).unwrap_err();
        assert!(err.msg.contains("LM"), "{err}");
    }

    #[test]
    fn fuzzify_of_undeclared_input() {
        let src = single_input("RULE 1 : IF x IS hi THEN y IS b;")
            .replace("END_FUNCTION_BLOCK", "FUZZIFY w\nTERM a := trian 0 1 2;\nEND_FUZZIFY\nEND_FUNCTION_BLOCK");
        let err = parse_fcl(&src).unwrap_err();
        assert!(err.msg.contains("undeclared"), "{err}");
    }

    #[test]
    fn malformed_triangle() {
        let src = single_input("RULE 1 : IF x IS hi THEN y IS b;").replace("trian 0 1 1", "trian 1 0 1");
        let err = parse_fcl(&src).unwrap_err();
        assert_eq!(err.line, 10);
    }

    #[test]
    fn empty_rule_block_rejected() {
        let err = parse_fcl(&single_input("AND : MIN;")).unwrap_err();
        assert!(err.msg.contains("no rules"), "{err}");
    }

    #[test]
    fn from_str_round_trips_through_error_type() {
        let err = "garbage".parse::<RuleBase>().unwrap_err();
        assert_eq!(err.line, 1);
        let routing: RoutingError = err.into();
        assert!(routing.to_string().starts_with("FCL line 1"));
    }
}

// ── Inference ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod engine_tests {
    use super::*;

    fn engine() -> FuzzyEngine {
        FuzzyEngine::new(relay_rules())
    }

    #[test]
    fn strong_peer_scores_high() {
        let out = engine().evaluate(&[1.0, 1.0]).unwrap();
        let v = out[0].unwrap();
        // centroid of trian 0.8 1 1
        assert!((v - 2.8 / 3.0).abs() < 1e-3, "{v}");
    }

    #[test]
    fn expiring_message_scores_low() {
        let v = engine().evaluate(&[0.0, 1.0]).unwrap()[0].unwrap();
        assert!(v < 0.1, "{v}");
    }

    #[test]
    fn no_rule_fired_uses_default() {
        // ttl = 0.5 is in neither `low` nor `high`
        let out = engine().evaluate(&[0.5, 1.0]).unwrap();
        assert_eq!(out[0], Some(0.3));
    }

    #[test]
    fn no_default_yields_none() {
        let src = RELAY_FCL.replace("    DEFAULT := 0.3;\n", "");
        let e = FuzzyEngine::new(parse_fcl(&src).unwrap());
        assert_eq!(e.evaluate(&[0.5, 1.0]).unwrap()[0], None);
    }

    #[test]
    fn inputs_are_clamped_to_range() {
        let e = engine();
        assert_eq!(e.evaluate(&[7.0, 1.0]).unwrap(), e.evaluate(&[1.0, 1.0]).unwrap());
    }

    #[test]
    fn mean_of_maximum() {
        let src = RELAY_FCL.replace("METHOD : COG", "METHOD : MM");
        let e = FuzzyEngine::new(parse_fcl(&src).unwrap());
        let v = e.evaluate(&[1.0, 1.0]).unwrap()[0].unwrap();
        assert!((v - 1.0).abs() < 1e-9, "{v}");
    }

    #[test]
    fn prod_and_asum_operators() {
        let src = single_input("AND : PROD;\nOR : ASUM;\nACT : PROD;\nRULE 1 : IF x IS lo OR x IS hi THEN y IS b;");
        let e = FuzzyEngine::new(parse_fcl(&src).unwrap()).with_resolution(2000);
        // lo = hi = 0.5 at x = 0.5, ASUM = 0.75; scaling keeps the centroid of `b`
        let v = e.evaluate(&[0.5]).unwrap()[0].unwrap();
        assert!((v - 2.0 / 3.0).abs() < 1e-3, "{v}");
    }

    #[test]
    fn named_evaluation() {
        let e = engine();
        let out = e.evaluate_named(&[("peer", 1.0), ("ttl", 1.0)]).unwrap();
        assert!(out["decision"] > 0.9);
        assert!(matches!(e.evaluate_named(&[("ttl", 1.0)]), Err(RoutingError::Config(_))));
        assert!(matches!(
            e.evaluate_named(&[("ttl", 1.0), ("peer", 1.0), ("speed", 1.0)]),
            Err(RoutingError::UnknownVariable(v)) if v == "speed"
        ));
    }

    #[test]
    fn wrong_arity_and_nan_rejected() {
        let e = engine();
        assert!(e.evaluate(&[1.0]).is_err());
        assert!(e.evaluate(&[f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn evaluation_is_pure() {
        let e = engine();
        let a = e.evaluate(&[0.8, 0.7]).unwrap();
        let b = e.evaluate(&[0.8, 0.7]).unwrap();
        assert_eq!(a, b);
    }
}

// ── Fuzzy policy ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod fuzzy_policy_tests {
    use super::*;

    fn policy() -> FuzzyPolicy {
        FuzzyPolicy::new(relay_rules(), &relay_config()).unwrap()
    }

    #[test]
    fn destination_always_gets_forward() {
        let p = policy();
        let mut c = ctx(0, 2);
        c.remaining_ttl_fraction = 0.0;
        assert_eq!(p.decide(&message(), &copy_with_tokens(1), &c), RoutingDecision::Forward(NodeId(2)));
    }

    #[test]
    fn expiring_message_is_dropped() {
        let p = policy();
        let mut c = ctx(0, 1);
        c.remaining_ttl_fraction = 0.0;
        assert_eq!(
            p.decide(&message(), &copy_with_tokens(1), &c),
            RoutingDecision::Drop(DropReason::Policy)
        );
    }

    #[test]
    fn unknown_peer_is_held() {
        let p = policy();
        assert_eq!(p.decide(&message(), &copy_with_tokens(1), &ctx(0, 1)), RoutingDecision::Hold);
    }

    #[test]
    fn peer_that_met_destination_gets_forward() {
        let mut p = policy();
        p.on_contact_up(NodeId(1), NodeId(2), SimTime::ZERO);
        // P(1,2) = 0.75, halfway between `hold` and `send`
        assert_eq!(p.decide(&message(), &copy_with_tokens(1), &ctx(0, 1)), RoutingDecision::Forward(NodeId(1)));
    }

    #[test]
    fn frequent_carrier_gets_replica() {
        let mut p = policy();
        for _ in 0..3 {
            p.on_contact_up(NodeId(1), NodeId(2), SimTime::ZERO);
        }
        assert_eq!(
            p.decide(&message(), &copy_with_tokens(1), &ctx(0, 1)),
            RoutingDecision::Replicate(vec![NodeId(1)])
        );
    }

    #[test]
    fn contact_duration_feature_prefers_contact_history() {
        let p = policy();
        let (m, c) = (message(), copy_with_tokens(1));
        // no history: falls back to the current contact's 10 s
        let v = p.feature_value(Feature::ContactDuration, &m, &c, &ctx(0, 1));
        assert!((v - 10.0 / 600.0).abs() < 1e-12);

        let mut known = ctx(0, 1);
        known.estimated_contact_duration = Some(SimDuration::from_secs(200));
        let v = p.feature_value(Feature::ContactDuration, &m, &c, &known);
        assert!((v - 200.0 / 600.0).abs() < 1e-12);

        known.estimated_contact_duration = Some(SimDuration::from_secs(6_000));
        assert_eq!(p.feature_value(Feature::ContactDuration, &m, &c, &known), 1.0);
    }

    #[test]
    fn hop_count_is_normalised_and_clamped() {
        let p = policy();
        let mut c = copy_with_tokens(1);
        c.hop_count = 5;
        assert_eq!(p.feature_value(Feature::HopCount, &message(), &c, &ctx(0, 1)), 0.5);
        c.hop_count = 50;
        assert_eq!(p.feature_value(Feature::HopCount, &message(), &c, &ctx(0, 1)), 1.0);
    }

    #[test]
    fn unbound_input_rejected() {
        let mut cfg = relay_config();
        cfg.bindings.pop();
        assert!(matches!(FuzzyPolicy::new(relay_rules(), &cfg), Err(RoutingError::Config(_))));
    }

    #[test]
    fn binding_to_unknown_variable_rejected() {
        let mut cfg = relay_config();
        cfg.bindings.push(FeatureBinding { feature: Feature::HopCount, variable: "hops".into() });
        assert!(matches!(
            FuzzyPolicy::new(relay_rules(), &cfg),
            Err(RoutingError::UnknownVariable(v)) if v == "hops"
        ));
    }

    #[test]
    fn unknown_output_rejected() {
        let mut cfg = relay_config();
        cfg.output = "score".into();
        assert!(matches!(FuzzyPolicy::new(relay_rules(), &cfg), Err(RoutingError::UnknownVariable(_))));
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let mut cfg = relay_config();
        cfg.thresholds.drop = 0.9;
        assert!(matches!(FuzzyPolicy::new(relay_rules(), &cfg), Err(RoutingError::Config(_))));
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod config_tests {
    use std::fs;

    use super::*;

    #[test]
    fn parses_tagged_policies() {
        let cfg: RoutingConfig = toml::from_str(r#"policy = "epidemic""#).unwrap();
        assert_eq!(cfg, RoutingConfig::Epidemic);

        let cfg: RoutingConfig = toml::from_str("policy = \"spray_and_wait\"\ncopies = 4\n").unwrap();
        assert_eq!(cfg, RoutingConfig::SprayAndWait(SprayAndWaitParams { copies: 4, binary: true }));

        let cfg: RoutingConfig = toml::from_str("policy = \"prophet\"\nbeta = 0.5\n").unwrap();
        let RoutingConfig::Prophet(p) = cfg else { panic!("expected prophet") };
        assert_eq!(p.beta, 0.5);
        assert_eq!(p.p_init, 0.75);

        let cfg: RoutingConfig =
            toml::from_str("policy = \"spray_and_focus\"\ncopies = 4\ntransitivity_delay = 0.0\n").unwrap();
        assert_eq!(
            cfg,
            RoutingConfig::SprayAndFocus(SprayAndFocusParams { copies: 4, binary: true, transitivity_delay: 0.0 })
        );

        let cfg: RoutingConfig = toml::from_str("policy = \"bubble_rap\"\nwindow = 3600.0\n").unwrap();
        assert_eq!(
            cfg,
            RoutingConfig::BubbleRap(BubbleRapParams { familiar_threshold: 700.0, window: 3_600.0 })
        );
    }

    #[test]
    fn unknown_policy_rejected() {
        assert!(toml::from_str::<RoutingConfig>(r#"policy = "flooding""#).is_err());
    }

    #[test]
    fn builds_named_policies() {
        for (cfg, name) in [
            (RoutingConfig::Epidemic, "epidemic"),
            (RoutingConfig::DirectDelivery, "direct_delivery"),
            (RoutingConfig::SprayAndWait(SprayAndWaitParams::default()), "spray_and_wait"),
            (RoutingConfig::Prophet(ProphetParams::default()), "prophet"),
            (RoutingConfig::SprayAndFocus(SprayAndFocusParams::default()), "spray_and_focus"),
            (RoutingConfig::BubbleRap(BubbleRapParams::default()), "bubble_rap"),
        ] {
            assert_eq!(cfg.name(), name);
            assert_eq!(cfg.build(None).unwrap().name(), name);
        }
    }

    #[test]
    fn fuzzy_rule_base_resolved_relative_to_scenario() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("relay.fcl"), RELAY_FCL).unwrap();
        let cfg: RoutingConfig = toml::from_str(
            r#"
            policy    = "fuzzy"
            rule_base = "relay.fcl"
            bindings  = [
                { feature = "remaining_ttl",             variable = "ttl"  },
                { feature = "peer_delivery_probability", variable = "peer" },
            ]

            [thresholds]
            replicate = 0.8
            "#,
        )
        .unwrap();
        let RoutingConfig::Fuzzy(ref f) = cfg else { panic!("expected fuzzy") };
        assert_eq!(f.thresholds.replicate, 0.8);
        assert_eq!(f.thresholds.forward, 0.5);
        assert_eq!(f.output, "decision");

        let policy = cfg.build(Some(dir.path())).unwrap();
        assert_eq!(policy.name(), "fuzzy");
    }

    #[test]
    fn missing_rule_base_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RoutingConfig::Fuzzy(relay_config());
        assert!(matches!(cfg.build(Some(dir.path())), Err(RoutingError::RuleBaseIo { .. })));
    }

    #[test]
    fn malformed_rule_base_surfaces_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("relay.fcl"), "FUNCTION_BLOCK x\nVAR_INPUT a : INT; END_VAR\n").unwrap();
        let cfg = RoutingConfig::Fuzzy(relay_config());
        match cfg.build(Some(dir.path())) {
            Err(RoutingError::Fcl(e)) => assert_eq!(e.line, 2),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected an FCL error"),
        }
    }
}
