// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Small hand-checkable runs of the whole pipeline.

use offsim_engine::config::{Limits, PolicyConfig, RampSchedule, RampStage, SimConfig};
use offsim_engine::controller::policy::SketchBased;
use offsim_engine::controller::{Offload, RuleBudget};
use offsim_engine::dispatcher::DualPathDispatcher;
use offsim_engine::flow::FlowTable;
use offsim_engine::metrics::TurnStats;
use offsim_engine::sketch::{HashParams, HeavyHitterSketch};
use offsim_engine::test_helpers::{single_size_traffic, start_test};
use offsim_engine::types::{FlowId, PacketBatch};
use serial_test::serial;

/// Admit new flows in the first turn only.
fn first_turn_only() -> RampSchedule {
    RampSchedule {
        stages: vec![RampStage::new(0, 1.0), RampStage::new(1, 0.0)],
        slow_start_turns: 0,
    }
}

#[test]
#[serial(scenarios)]
fn elephant_offloaded_at_threshold() {
    let engine = start_test(file!());

    let mut traffic = single_size_traffic(512, true);
    traffic.ramp = first_turn_only();
    let config = SimConfig {
        name: "elephant".to_string(),
        turns: 10,
        policy: PolicyConfig::Static { threshold: Some(4) },
        limits: Limits {
            new_flows_per_turn: 1,
            packets_per_turn: 1000,
            slow_path_capacity: 100,
            offload_rule_capacity: 10,
        },
        traffic,
        ..Default::default()
    };

    let mut context = engine.build(config).unwrap();
    let first = context.run_turn().clone();
    assert_eq!(first.generated, 4);
    assert_eq!(first.slow_path, 4);
    assert_eq!(first.offloaded, 1);
    assert!(context.flows().get(FlowId(1)).is_offloaded);

    let second = context.run_turn().clone();
    assert_eq!(second.fast_path, 64);
    assert_eq!(second.slow_path, 0);

    while !context.is_finished() {
        context.run_turn();
    }
    let flow = context.flows().get(FlowId(1));
    assert_eq!(flow.slow_path_count, 4);
    assert_eq!(flow.fast_path_count, 508);
    assert_eq!(flow.finish_turn(), Some(8));

    let summary = context.summary();
    assert_eq!(summary.flows_created, 1);
    assert_eq!(summary.fast_path, 508);
    assert_eq!(summary.slow_path, 4);
    assert_eq!(summary.dropped, 0);
    assert_eq!(summary.mean_fct_secs, 8.0);
}

#[test]
#[serial(scenarios)]
fn saturated_slow_path_returns_drops() {
    let engine = start_test(file!());

    let config = SimConfig {
        turns: 1,
        policy: PolicyConfig::Static { threshold: None },
        limits: Limits {
            new_flows_per_turn: 3,
            packets_per_turn: 0,
            slow_path_capacity: 10,
            offload_rule_capacity: 10,
        },
        traffic: single_size_traffic(8, false),
        ..Default::default()
    };

    let mut context = engine.build(config).unwrap();
    let stats = context.run_turn().clone();
    assert_eq!(stats.generated, 12);
    assert_eq!(stats.slow_path, 10);
    assert_eq!(stats.dropped, 2);

    // Created with 8, 4 placed in the batch, 2 of them returned
    let third = context.flows().get(FlowId(3));
    assert_eq!(third.remaining_packets(), 6);
    assert_eq!(third.slow_path_count, 2);
}

#[test]
#[serial(scenarios)]
fn sketch_offloads_only_the_heavy_flow() {
    let engine = start_test(file!());
    let limits = Limits::default();
    let dispatcher = DualPathDispatcher::new(engine.top(), &limits, true);

    let sketch = HeavyHitterSketch::new(HashParams::from_seed(11, 4), 4096, 4, 2, 32);
    let mut policy = SketchBased::with_sketch(sketch, 1);

    let mut flows = FlowTable::new();
    let heavy = flows.create(512, 0);
    let light = flows.create(512, 0);

    for turn in 0..5 {
        let batches = [
            PacketBatch::new(heavy, flows.get_mut(heavy).take_packets(10)),
            PacketBatch::new(light, flows.get_mut(light).take_packets(1)),
        ];
        let mut budget = RuleBudget::new(limits.offload_rule_capacity);
        let mut stats = TurnStats {
            turn,
            ..Default::default()
        };
        dispatcher.dispatch(turn, &batches, &mut flows, &mut policy, &mut budget, &mut stats);

        if turn == 3 {
            assert_eq!(policy.sketch().heavy_hitters(), vec![heavy]);
        }
        if turn == 4 {
            assert_eq!(stats.fast_path, 10);
            assert_eq!(stats.slow_path, 1);
        }

        policy.on_turn_end(engine.top(), &stats, &mut flows, &mut budget);
        let offloaded = turn >= 3;
        assert_eq!(flows.get(heavy).is_offloaded, offloaded, "turn {turn}");
        assert!(!flows.get(light).is_offloaded);
    }
}

#[test]
#[serial(scenarios)]
fn reactive_threshold_halves_to_floor() {
    let engine = start_test(file!());

    let config = SimConfig {
        turns: 3,
        policy: PolicyConfig::Reactive {
            initial_threshold: 4,
        },
        limits: Limits {
            new_flows_per_turn: 0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut context = engine.build(config).unwrap();
    assert_eq!(context.controller().threshold(), Some(4));
    while !context.is_finished() {
        context.run_turn();
    }
    let thresholds: Vec<_> = context.history().iter().map(|s| s.threshold).collect();
    assert_eq!(thresholds, vec![Some(2), Some(2), Some(2)]);
}

#[test]
#[serial(scenarios)]
fn reactive_threshold_doubles_on_rejection() {
    let engine = start_test(file!());

    // 10 small flows per turn all reach the threshold but only 2 rules fit
    let config = SimConfig {
        turns: 2,
        policy: PolicyConfig::Reactive {
            initial_threshold: 4,
        },
        limits: Limits {
            new_flows_per_turn: 10,
            packets_per_turn: 0,
            slow_path_capacity: 1000,
            offload_rule_capacity: 2,
        },
        traffic: single_size_traffic(4, false),
        ..Default::default()
    };

    let mut context = engine.build(config).unwrap();
    let stats = context.run_turn().clone();
    assert_eq!(stats.offloaded, 2);
    assert_eq!(stats.rejected, 8);
    assert_eq!(stats.threshold, Some(8));

    let stats = context.run_turn().clone();
    assert_eq!(stats.offloaded, 0);
    assert_eq!(stats.threshold, Some(4));
}
