use recovery_core::run_scenario;
use recovery_core::scenario::TraceEvent;
use recovery_core::EntityId;
use recovery_regression::{scenario_a, scenario_b, scenario_c};

fn heal_ticks(report: &recovery_core::SimulationReport) -> Vec<u64> {
    report
        .trace
        .iter()
        .filter(|e| e.event == TraceEvent::Healed)
        .map(|e| e.tick)
        .collect()
}

#[test]
fn steady_recovery_reaches_max_in_five_passes() {
    let report = run_scenario(&scenario_a().unwrap());
    assert_eq!(report.config.max_health, 20);
    assert_eq!(report.config.min_health, 1);
    assert_eq!(report.config.interval_ticks, 3);
    assert_eq!(heal_ticks(&report), vec![3, 6, 9, 12, 15]);
    assert_eq!(report.recoveries(), 1);

    let wolf = &report.creatures[0];
    assert_eq!(wolf.entity, EntityId(1));
    assert_eq!(wolf.health, 20);
    assert!(!wolf.tracked);
    assert!(!report.task_active, "task should stop once the registry drains");
    insta::assert_json_snapshot!("scenario_a_trace", report.trace);
}

#[test]
fn cooldown_holds_healing_for_fourteen_passes() {
    let report = run_scenario(&scenario_b().unwrap());
    assert_eq!(report.config.delay_ticks, 40);
    assert_eq!(report.config.interval_ticks, 3);
    // 40 - 13 * 3 = 1 left on the 14th pass, which clears it and heals.
    assert_eq!(heal_ticks(&report), vec![42, 45, 48, 51, 54]);
    assert_eq!(report.creatures[0].health, 20);
    assert!(!report.task_active);
}

#[test]
fn death_before_first_pass_leaves_no_trace() {
    let report = run_scenario(&scenario_c().unwrap());
    assert!(report.trace.is_empty());
    let wolf = &report.creatures[0];
    assert!(!wolf.alive);
    assert_eq!(wolf.health, 0);
    assert!(!wolf.tracked);
    assert!(!report.task_active);
}

#[test]
fn offline_owner_blocks_recovery_until_they_join() {
    let mut scenario = scenario_a().unwrap();
    scenario.owners[0].online = false;
    scenario.ticks = 30;
    scenario.timeline.push(recovery_core::scenario::TimelineEntry {
        tick: 10,
        action: recovery_core::scenario::Action::Join { owner: 1 },
    });

    let report = run_scenario(&scenario);
    assert_eq!(heal_ticks(&report), vec![12, 15, 18, 21, 24]);
    assert_eq!(report.creatures[0].health, 20);
}

#[test]
fn instant_fallback_heals_combat_damage() {
    let mut scenario = scenario_b().unwrap();
    scenario.scheduler_capacity = Some(0);
    scenario.ticks = 10;

    let report = run_scenario(&scenario);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "instant");
    assert_eq!(json["task_active"], false);
    assert_eq!(json["creatures"][0]["health"], 20);
    assert_eq!(json["creatures"][0]["tracked"], false);
    assert!(report.trace.is_empty());
}
