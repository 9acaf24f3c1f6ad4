//! Refresh orchestrator scenarios against a scripted read API.
//!
//! These cover the behaviours that only show up with several requests in
//! flight: out-of-order arrival, scope changes mid-fetch, the re-entrancy
//! guard, fallback annotation and the failed-versus-empty distinction.

mod common;

use std::time::Duration;

use common::{fixed_now, map_body, settle, Op, ScriptedApi, EMPTY_LIST, EMPTY_MAP};
use flomon_dashboard::config::DashboardConfig;
use flomon_dashboard::ingest::ApplyOutcome;
use flomon_dashboard::model::{DataKind, FetchError, Parameter, Scope, SeverityLevel, StatusSource};
use flomon_dashboard::refresh::{
    Availability, Command, EmptyState, RefreshOrchestrator, RefreshOutcome, RefreshPhase,
    SignalState,
};
use flomon_dashboard::series::RangeKey;

fn orchestrator(api: ScriptedApi, scope: Scope) -> RefreshOrchestrator<ScriptedApi> {
    let config = DashboardConfig {
        scope,
        ..DashboardConfig::default()
    };
    RefreshOrchestrator::new(api, config).with_clock(fixed_now)
}

fn sensor_ids(orch: &RefreshOrchestrator<ScriptedApi>) -> Vec<u64> {
    let view = orch.snapshot();
    let map = view.map.ready().expect("map should be ready");
    map.payload
        .sensors
        .iter()
        .filter_map(|s| s["id"].as_u64())
        .collect()
}

// ---------------------------------------------------------------------------
// Fence behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_late_response_to_older_request_is_discarded() {
    let api = ScriptedApi::new();
    api.gate(Op::Map);
    let orch = orchestrator(api, Scope::global());

    let (older, newer, ()) = tokio::join!(
        orch.refresh(DataKind::Map),
        orch.refresh(DataKind::Map),
        async {
            settle().await;
            assert_eq!(orch.api().pending_count(), 2, "both requests should be in flight");
            // Newer request answers first, older one straggles in after.
            orch.api().release(1, Ok(&map_body(&[2])));
            settle().await;
            orch.api().release(0, Ok(&map_body(&[1])));
        }
    );

    assert_eq!(newer, RefreshOutcome::Committed);
    assert_eq!(older, RefreshOutcome::StaleDiscarded);
    assert_eq!(sensor_ids(&orch), vec![2], "the stale response must not overwrite");
    assert_eq!(orch.phase(DataKind::Map), RefreshPhase::Idle);
}

#[tokio::test]
async fn test_scope_change_invalidates_in_flight_response() {
    let api = ScriptedApi::new();
    api.gate(Op::Readings);
    let orch = orchestrator(api, Scope::global());

    let (outcome, ()) = tokio::join!(orch.refresh(DataKind::Sensors), async {
        settle().await;
        orch.set_scope(Scope::municipality(3));
        orch.api().release_all(
            Op::Readings,
            Ok(r#"[{"sensor_type": "rainfall", "value": 9.0, "timestamp": "2024-05-01T12:59:00Z"}]"#),
        );
    });

    assert_eq!(outcome, RefreshOutcome::StaleDiscarded);
    let view = orch.snapshot();
    assert_eq!(view.scope, Scope::municipality(3));
    assert_eq!(view.sensors, Availability::Pending, "old-scope data must never be shown");
}

#[tokio::test]
async fn test_tick_is_skipped_while_trends_fetch_in_flight() {
    let api = ScriptedApi::new();
    for parameter in Parameter::ALL {
        api.gate(Op::Chart(parameter));
    }
    let orch = orchestrator(api, Scope::global());

    let (first, second, ()) = tokio::join!(
        orch.tick(DataKind::Trends),
        orch.tick(DataKind::Trends),
        async {
            settle().await;
            assert_eq!(
                orch.api().pending_count(),
                Parameter::ALL.len(),
                "only one trends fetch may be in flight"
            );
            for parameter in Parameter::ALL {
                orch.api().release_all(
                    Op::Chart(parameter),
                    Ok(r#"{"labels": ["2024-05-01T12:00:00Z"], "values": [1.0]}"#),
                );
            }
        }
    );

    assert_eq!(first, RefreshOutcome::Committed);
    assert_eq!(second, RefreshOutcome::Skipped);
}

#[tokio::test]
async fn test_explicit_refresh_supersedes_in_flight_tick() {
    let api = ScriptedApi::new();
    api.gate(Op::Map);
    let orch = orchestrator(api, Scope::global());

    let (ticked, refreshed, ()) = tokio::join!(
        orch.tick(DataKind::Map),
        orch.refresh(DataKind::Map),
        async {
            settle().await;
            orch.api().release(0, Ok(&map_body(&[1])));
            orch.api().release(0, Ok(&map_body(&[2])));
        }
    );

    assert_eq!(ticked, RefreshOutcome::StaleDiscarded);
    assert_eq!(refreshed, RefreshOutcome::Committed);
    assert_eq!(sensor_ids(&orch), vec![2]);
}

#[tokio::test]
async fn test_hung_fetch_times_out_and_next_tick_runs() {
    let api = ScriptedApi::new();
    api.gate(Op::Map);
    let mut config = DashboardConfig {
        scope: Scope::global(),
        ..DashboardConfig::default()
    };
    config.polling.map_secs = 1;
    let orch = RefreshOrchestrator::new(api, config).with_clock(fixed_now);

    // Nothing answers the first call.
    let first = tokio::time::timeout(Duration::from_secs(10), orch.tick(DataKind::Map))
        .await
        .expect("hung fetch should be abandoned");
    assert_eq!(first, RefreshOutcome::Failed);
    assert_eq!(orch.phase(DataKind::Map), RefreshPhase::Idle);
    match &orch.snapshot().map {
        Availability::Unavailable { reason } => assert_eq!(reason, "Unable to load map data"),
        other => panic!("expected unavailable map, got {:?}", other),
    }

    let (second, ()) = tokio::join!(orch.tick(DataKind::Map), async {
        settle().await;
        orch.api().release_all(Op::Map, Ok(&map_body(&[4])));
    });
    assert_eq!(second, RefreshOutcome::Committed, "next tick must not be skipped");
    assert_eq!(sensor_ids(&orch), vec![4]);
}

// ---------------------------------------------------------------------------
// Fallback and empty states
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_map_falls_back_to_global_and_is_annotated() {
    let api = ScriptedApi::new();
    let requested = Scope::barangay(3, 12);
    api.respond(Op::Map, requested, Ok(EMPTY_MAP));
    api.respond(Op::Map, Scope::municipality(3), Err(FetchError::Http(500)));
    api.respond(Op::Map, Scope::global(), Ok(&map_body(&[7])));
    let orch = orchestrator(api, requested);

    assert_eq!(orch.refresh(DataKind::Map).await, RefreshOutcome::Committed);

    assert_eq!(
        orch.api().calls_for(Op::Map),
        vec![requested, Scope::municipality(3), Scope::global()],
        "scopes must be tried narrowest first without skipping"
    );
    let view = orch.snapshot();
    let map = view.map.ready().unwrap();
    let note = map.annotation.expect("fallback should be annotated");
    assert_eq!(note.used, Scope::global());
    assert_eq!(note.message(), "showing data from all areas");
}

#[tokio::test]
async fn test_empty_everywhere_is_explicit_empty_state() {
    let api = ScriptedApi::new();
    let requested = Scope::municipality(3);
    api.respond(Op::Map, requested, Ok(EMPTY_MAP));
    api.respond(Op::Map, Scope::global(), Err(FetchError::Transport("timeout".into())));
    let orch = orchestrator(api, requested);

    assert_eq!(orch.refresh(DataKind::Map).await, RefreshOutcome::CommittedEmpty);
    let view = orch.snapshot();
    assert_eq!(view.map.ready().unwrap().empty, Some(EmptyState::NoDataAcrossScopes));
}

#[tokio::test]
async fn test_global_scope_empty_is_single_scope_empty_state() {
    let api = ScriptedApi::new();
    api.respond(Op::Map, Scope::global(), Ok(EMPTY_MAP));
    let orch = orchestrator(api, Scope::global());

    orch.refresh(DataKind::Map).await;
    assert_eq!(
        orch.snapshot().map.ready().unwrap().empty,
        Some(EmptyState::NoDataInScope)
    );
}

#[tokio::test]
async fn test_failure_replaces_previous_data_with_unavailable() {
    let api = ScriptedApi::new();
    api.respond(Op::Map, Scope::global(), Ok(&map_body(&[1])));
    let orch = orchestrator(api, Scope::global());
    assert_eq!(orch.refresh(DataKind::Map).await, RefreshOutcome::Committed);

    orch.api().respond(Op::Map, Scope::global(), Err(FetchError::Http(502)));
    assert_eq!(orch.refresh(DataKind::Map).await, RefreshOutcome::Failed);

    match orch.snapshot().map {
        Availability::Unavailable { reason } => assert_eq!(reason, "Unable to load map data"),
        other => panic!("expected unavailable map, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_sensor_values_render_as_dashes() {
    let api = ScriptedApi::new();
    api.respond(
        Op::Readings,
        Scope::global(),
        Ok(r#"{"results": [
            {"sensor_type": "water_level", "value": 2.35, "timestamp": "2024-05-01T12:55:00Z", "unit": "m"},
            {"sensor_type": "rainfall", "value": null, "timestamp": "2024-05-01T10:00:00Z", "unit": "mm"}
        ]}"#),
    );
    let orch = orchestrator(api, Scope::global());
    orch.refresh(DataKind::Sensors).await;

    let view = orch.snapshot();
    let sensors = view.sensors.ready().unwrap();
    assert_eq!(sensors.gauges.len(), Parameter::ALL.len());
    let water = sensors.gauge(Parameter::WaterLevel).unwrap();
    assert_eq!(water.display_value(), "2.35");
    assert_eq!(water.stale, Some(false));
    let rain = sensors.gauge(Parameter::Rainfall).unwrap();
    assert_eq!(rain.display_value(), "--");
    assert_eq!(rain.stale, Some(true), "three-hour-old reading is stale at 60 minutes");
    assert_eq!(sensors.gauge(Parameter::Humidity).unwrap().display_value(), "--");
    assert_eq!(view.last_updated, Some(fixed_now()));
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

const RAINFALL_EMERGENCY: &str = r#"{"data": [{
    "parameter": "rainfall", "unit": "mm",
    "latest": {"value": 55.0, "timestamp": "2024-05-01T12:50:00Z"},
    "severity": {"level": 4, "name": "Emergency"},
    "thresholds": {"advisory": 10, "watch": 20, "warning": 30, "emergency": 50, "catastrophic": 80}
}]}"#;

const FLOOD_WARNING: &str = r#"{"results": [{
    "id": 1, "severity_level": 3, "title": "Flood Warning",
    "description": "River rising", "affected_barangays": [12]
}]}"#;

#[tokio::test]
async fn test_threshold_above_declared_alert_drives_banner() {
    let api = ScriptedApi::new();
    api.respond(Op::Alerts, Scope::global(), Ok(FLOOD_WARNING));
    api.respond(Op::Thresholds, Scope::global(), Ok(RAINFALL_EMERGENCY));
    let orch = orchestrator(api, Scope::global());

    assert_eq!(orch.refresh(DataKind::Alerts).await, RefreshOutcome::Committed);

    let view = orch.snapshot();
    let status = view.status.ready().unwrap();
    assert_eq!(status.combined.level, SeverityLevel::EMERGENCY);
    assert_eq!(status.combined.source, StatusSource::Threshold);
    assert!(status.combined.explanation[0].starts_with("rainfall:"));
    assert_eq!(
        status.combined.headline.as_ref().unwrap().title,
        "Rainfall Alert: Emergency"
    );
    assert_eq!(status.parameters[0].next.level, Some(SeverityLevel::CATASTROPHIC));
}

#[tokio::test]
async fn test_one_failed_signal_is_marked_unknown_not_absent() {
    let api = ScriptedApi::new();
    api.respond(Op::Alerts, Scope::global(), Err(FetchError::Http(500)));
    api.respond(Op::Thresholds, Scope::global(), Ok(RAINFALL_EMERGENCY));
    let orch = orchestrator(api, Scope::global());

    orch.refresh(DataKind::Alerts).await;

    let view = orch.snapshot();
    let status = view.status.ready().unwrap();
    assert!(matches!(status.declared_signal, SignalState::Unavailable { .. }));
    assert_eq!(status.threshold_signal, SignalState::Known);
    assert_eq!(status.combined.level, SeverityLevel::EMERGENCY);
}

#[tokio::test]
async fn test_both_signals_failing_marks_status_unavailable() {
    let api = ScriptedApi::new();
    let orch = orchestrator(api, Scope::global());

    assert_eq!(orch.refresh(DataKind::Alerts).await, RefreshOutcome::Failed);
    let view = orch.snapshot();
    assert!(view.status.is_unavailable());
    assert_eq!(view.status_label(), "Normal");
}

#[tokio::test]
async fn test_barangay_prefilter_is_opt_in() {
    let api = ScriptedApi::new();
    let scope = Scope::barangay(3, 99);
    api.respond(Op::Alerts, scope, Ok(FLOOD_WARNING));
    api.respond(Op::Thresholds, scope, Ok(r#"{"data": []}"#));

    let mut config = DashboardConfig {
        scope,
        ..DashboardConfig::default()
    };
    config.alerts.prefilter_by_barangay = true;
    let orch = RefreshOrchestrator::new(api, config).with_clock(fixed_now);

    assert_eq!(orch.refresh(DataKind::Alerts).await, RefreshOutcome::CommittedEmpty);
    let view = orch.snapshot();
    assert_eq!(view.status.ready().unwrap().combined.level, SeverityLevel::NORMAL);
}

// ---------------------------------------------------------------------------
// Trends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_trend_series_are_aligned_onto_one_axis() {
    let api = ScriptedApi::new();
    api.respond(
        Op::Chart(Parameter::Temperature),
        Scope::global(),
        Ok(r#"{"labels": ["T1", "T2"], "values": [30, 31]}"#),
    );
    api.respond(
        Op::Chart(Parameter::Rainfall),
        Scope::global(),
        Ok(r#"{"labels": ["T2", "T3"], "values": [5, 12]}"#),
    );
    let orch = orchestrator(api, Scope::global());

    assert_eq!(orch.refresh(DataKind::Trends).await, RefreshOutcome::Committed);

    let view = orch.snapshot();
    let chart = &view.trends.ready().unwrap().chart;
    assert_eq!(chart.labels, vec!["T1", "T2", "T3"]);
    assert_eq!(chart.get("temperature").unwrap(), &[Some(30.0), Some(31.0), None]);
    assert_eq!(chart.get("rainfall").unwrap(), &[None, Some(5.0), Some(12.0)]);
    assert!(chart.get("humidity").is_none(), "failed parameters are left out");
}

#[tokio::test]
async fn test_range_change_refilters_trends() {
    let api = ScriptedApi::new();
    api.respond(
        Op::Chart(Parameter::WaterLevel),
        Scope::global(),
        Ok(r#"{"labels": ["2024-01-01T00:00Z", "2024-01-05T00:00Z", "2024-01-10T00:00Z"],
               "values": [1.0, 1.5, 2.0]}"#),
    );
    let orch = orchestrator(api, Scope::global());

    orch.set_range(RangeKey::Last7d);
    assert_eq!(orch.snapshot().trends, Availability::Pending);
    orch.refresh(DataKind::Trends).await;

    let view = orch.snapshot();
    let chart = &view.trends.ready().unwrap().chart;
    assert_eq!(chart.labels, vec!["2024-01-05T00:00Z", "2024-01-10T00:00Z"]);
    assert_eq!(chart.get("water_level").unwrap(), &[Some(1.5), Some(2.0)]);
}

// ---------------------------------------------------------------------------
// Apply thresholds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_unauthorized_apply_is_a_silent_no_op() {
    let api = ScriptedApi::new();
    api.respond(Op::Apply, Scope::global(), Err(FetchError::Http(403)));
    let orch = orchestrator(api, Scope::global());

    let outcome = orch.apply_thresholds(false).await;
    assert_eq!(outcome, Ok(ApplyOutcome::Unauthorized));
    assert!(orch.api().calls_for(Op::Alerts).is_empty(), "nothing should be refreshed");
}

#[tokio::test]
async fn test_applied_thresholds_refresh_status() {
    let api = ScriptedApi::new();
    api.respond(Op::Apply, Scope::global(), Ok(r#"{"created": 1}"#));
    api.respond(Op::Alerts, Scope::global(), Ok(EMPTY_LIST));
    api.respond(Op::Thresholds, Scope::global(), Ok(RAINFALL_EMERGENCY));
    let orch = orchestrator(api, Scope::global());

    assert!(matches!(orch.apply_thresholds(false).await, Ok(ApplyOutcome::Applied(_))));
    assert_eq!(orch.api().calls_for(Op::Alerts), vec![Scope::global()]);

    assert!(orch.apply_thresholds(true).await.is_ok());
    assert_eq!(orch.api().calls_for(Op::Alerts).len(), 1, "dry runs do not refresh");
}

#[tokio::test]
async fn test_server_error_on_apply_is_returned() {
    let api = ScriptedApi::new();
    api.respond(Op::Apply, Scope::global(), Err(FetchError::Http(500)));
    let orch = orchestrator(api, Scope::global());
    assert_eq!(orch.apply_thresholds(false).await, Err(FetchError::Http(500)));
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_loop_applies_scope_command_and_stops_on_shutdown() {
    let api = ScriptedApi::new();
    let scope = Scope::municipality(3);
    api.respond(Op::Map, scope, Ok(&map_body(&[5])));
    api.respond(Op::Map, Scope::global(), Ok(&map_body(&[1])));
    let orch = orchestrator(api, Scope::global());
    let mut updates = orch.subscribe();
    let (commands, receiver) = tokio::sync::mpsc::channel(8);

    let driver = async {
        commands.send(Command::SetScope(scope)).await.unwrap();
        loop {
            updates.changed().await.unwrap();
            let done = {
                let view = updates.borrow_and_update();
                view.scope == scope && view.map.ready().is_some()
            };
            if done {
                break;
            }
        }
        commands.send(Command::Shutdown).await.unwrap();
    };

    let ran = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(orch.run(receiver), driver);
    })
    .await;

    assert!(ran.is_ok(), "run loop should stop on shutdown");
    assert_eq!(sensor_ids(&orch), vec![5]);
}
