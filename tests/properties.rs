//! Properties that hold for every valid scenario.

use std::thread;
use tunsim::{reset, DemandProfile, DemandStep, Frame, Scenario, SegmentConfig, TwinError};
use tunsim_components::components::{IncidentType, IncidentWindow, WeatherType, WeatherWindow};
use tunsim_components::parameters::FanStageParameters;
use tunsim_core::standard_variables::{
    VAR_CAPACITY, VAR_CO, VAR_CONTROL_SIGNAL, VAR_DENSITY, VAR_FAN_STAGE, VAR_OUTFLOW,
    VAR_QUEUE, VAR_SPEED, VAR_SPEED_LIMIT, VAR_VISIBILITY, VAR_WEATHER_ACTIVE,
};

/// A busy tunnel with overlapping incidents and a spell of fog
fn stormy(n_segments: usize, demand: f64) -> Scenario {
    let mut scenario = Scenario::new(
        &format!("stormy_{}_{}", n_segments, demand),
        900.0,
        0.5,
        DemandProfile {
            base_veh_per_h: demand,
            peak_amplitude_veh_per_h: 0.4 * demand,
            peak_period_s: 300.0,
            steps: vec![DemandStep {
                t_start: 700.0,
                demand_veh_per_h: 0.5 * demand,
            }],
        },
        (0..n_segments)
            .map(|i| SegmentConfig::new(20.0 + 5.0 * i as f64, 75.0))
            .collect(),
    );
    scenario.incidents = vec![
        IncidentWindow {
            kind: IncidentType::Collision,
            t_start: 120.0,
            t_end: 400.0,
            severity: 0.7,
            segment: Some(n_segments - 1),
            capacity_drop: None,
            speed_limit: Some(60.0),
        },
        IncidentWindow {
            kind: IncidentType::VehicleFire,
            t_start: 200.0,
            t_end: 260.0,
            severity: 1.0,
            segment: None,
            capacity_drop: Some(0.8),
            speed_limit: None,
        },
    ];
    scenario.weather = vec![WeatherWindow {
        kind: WeatherType::Fog,
        t_start: 300.0,
        t_end: 600.0,
        severity: 0.6,
        speed_limit: None,
    }];
    scenario
}

fn run(scenario: &Scenario) -> Vec<Frame> {
    reset(scenario).unwrap().run_to_end().unwrap()
}

#[test]
fn state_stays_within_bounds() {
    for (n_segments, demand) in [(1, 2500.0), (3, 3400.0), (6, 4200.0)] {
        let scenario = stormy(n_segments, demand);
        let traffic = &scenario.traffic;
        for frame in run(&scenario) {
            for density in frame.segments(VAR_DENSITY.name) {
                assert!((0.0..=traffic.jam_density).contains(&density));
            }
            let speed_limit = frame.get(VAR_SPEED_LIMIT.name).unwrap();
            for speed in frame.segments(VAR_SPEED.name) {
                assert!((0.0..=traffic.free_flow_speed).contains(&speed));
                assert!(speed <= speed_limit, "{} above limit {}", speed, speed_limit);
            }
            for queue in frame.segments(VAR_QUEUE.name) {
                assert!(queue >= 0.0);
            }
            for (outflow, capacity) in frame
                .segments(VAR_OUTFLOW.name)
                .into_iter()
                .zip(frame.segments(VAR_CAPACITY.name))
            {
                assert!(outflow <= capacity + 1e-9);
            }
            for co in frame.segments(VAR_CO.name) {
                assert!(co >= 0.0 && co.is_finite());
            }
            for visibility in frame.segments(VAR_VISIBILITY.name) {
                assert!((0.0..=1.0).contains(&visibility));
            }
            let stage = frame.get(VAR_FAN_STAGE.name).unwrap();
            assert!([0.0, 1.0, 2.0, 3.0].contains(&stage));
        }
    }
}

#[test]
fn fan_stage_moves_one_level_at_a_time() {
    let frames = run(&stormy(3, 3400.0));
    let mut previous = 0.0;
    for frame in &frames {
        let stage = frame.get(VAR_FAN_STAGE.name).unwrap();
        assert!((stage - previous).abs() <= 1.0);
        previous = stage;
    }
}

#[test]
fn fan_stage_switches_on_thresholds() {
    let thresholds = FanStageParameters::default().thresholds;
    let frames = run(&stormy(3, 3400.0));

    let mut previous = 0usize;
    for frame in &frames {
        let stage = frame.get(VAR_FAN_STAGE.name).unwrap() as usize;
        let signal = frame.get(VAR_CONTROL_SIGNAL.name).unwrap();
        if stage > previous {
            assert!(signal >= thresholds[previous].upper);
        } else if stage < previous {
            assert!(signal <= thresholds[stage].lower);
        } else {
            if stage < 3 {
                assert!(signal < thresholds[stage].upper);
            }
            if stage > 0 {
                assert!(signal > thresholds[stage - 1].lower);
            }
        }
        previous = stage;
    }
}

#[test]
fn weather_lowers_speed_limit() {
    let frames = run(&stormy(2, 2500.0));
    // Fog of severity 0.6 without an override
    let fog = &frames[2 * 450];
    assert_eq!(fog.get(VAR_WEATHER_ACTIVE.name), Some(1.0));
    assert_eq!(fog.get(VAR_SPEED_LIMIT.name), Some(80.0 - 20.0 * 0.6));

    // Incident override while both are active
    let both = &frames[2 * 350];
    assert_eq!(both.get(VAR_SPEED_LIMIT.name), Some(60.0));

    assert_eq!(frames[2 * 650].get(VAR_SPEED_LIMIT.name), Some(80.0));
}

#[test]
fn speed_drops_to_a_lowered_limit() {
    let mut scenario = Scenario::new(
        "slow_zone",
        80.0,
        1.0,
        DemandProfile::constant(1800.0),
        vec![SegmentConfig::new(22.5, 80.0)],
    );
    scenario.incidents.push(IncidentWindow {
        kind: IncidentType::StalledVehicle,
        t_start: 10.0,
        t_end: 50.0,
        severity: 0.2,
        segment: None,
        capacity_drop: Some(0.0),
        speed_limit: Some(40.0),
    });
    let frames = run(&scenario);

    for frame in &frames[10..50] {
        assert_eq!(frame.get(VAR_SPEED_LIMIT.name), Some(40.0));
        assert!(frame.segment(VAR_SPEED.name, 0).unwrap() <= 40.0);
    }
    // and recovers gradually once the window closes
    let recovered = frames[50].segment(VAR_SPEED.name, 0).unwrap();
    assert!(recovered > 40.0 && recovered < 80.0);
    assert!(frames[79].segment(VAR_SPEED.name, 0).unwrap() > 75.0);
}

#[test]
fn identical_runs_are_identical() {
    let scenario = stormy(4, 3800.0);
    assert_eq!(run(&scenario), run(&scenario));
}

#[test]
fn runs_are_independent_across_threads() {
    let scenarios: Vec<Scenario> = [(1, 2500.0), (2, 3000.0), (4, 3800.0)]
        .iter()
        .map(|(n, demand)| stormy(*n, *demand))
        .collect();
    let expected: Vec<Vec<Frame>> = scenarios.iter().map(run).collect();

    let handles: Vec<_> = scenarios
        .into_iter()
        .map(|scenario| {
            let mut simulation = reset(&scenario).unwrap();
            thread::spawn(move || simulation.run_to_end().unwrap())
        })
        .collect();

    for (handle, expected) in handles.into_iter().zip(expected) {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn invalid_configuration_is_rejected_at_reset() {
    let field_of = |scenario: &Scenario| match reset(scenario) {
        Err(TwinError::Configuration { field, .. }) => field,
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    };

    let mut scenario = stormy(2, 2500.0);
    scenario.incidents[0].severity = 1.5;
    assert_eq!(field_of(&scenario), "incidents[0].severity");

    let mut scenario = stormy(2, 2500.0);
    scenario.incidents[0].segment = Some(2);
    assert_eq!(field_of(&scenario), "incidents[0].segment");

    let mut scenario = stormy(2, 2500.0);
    scenario.weather[0].t_end = scenario.weather[0].t_start;
    assert_eq!(field_of(&scenario), "weather[0].t_end");

    let mut scenario = stormy(2, 2500.0);
    scenario.fan_stage.thresholds[1].lower = 0.6;
    assert_eq!(field_of(&scenario), "fan_stage.thresholds[1]");

    let mut scenario = stormy(2, 2500.0);
    scenario.dt_s = 60.0;
    assert_eq!(field_of(&scenario), "dt_s");

    let mut scenario = stormy(2, 2500.0);
    scenario.segments[0].speed = 130.0;
    assert_eq!(field_of(&scenario), "segments[0].speed");

    let mut scenario = stormy(2, 2500.0);
    scenario.duration_s = 0.0;
    assert_eq!(field_of(&scenario), "duration_s");
}

#[test]
fn stepping_past_the_end_fails() {
    let mut scenario = stormy(1, 2000.0);
    scenario.duration_s = 2.0;
    let mut simulation = reset(&scenario).unwrap();
    assert_eq!(simulation.run_to_end().unwrap().len(), 4);
    assert!(simulation.is_finished());
    assert_eq!(simulation.step(), Err(TwinError::Finished));
}
