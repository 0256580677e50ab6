use matrix_code_core::EngineConfig;
use matrix_code_grid::CellGrid;
use matrix_code_system_effects::{Effect, EffectContext, EffectRequest, ReversalPhase, TimeReversal};
use matrix_code_system_simulation::{TimeScale, TimeScaleLink};

struct Run {
    scales: Vec<f32>,
    phases: Vec<ReversalPhase>,
    requests: Vec<(usize, EffectRequest)>,
}

fn run_to_idle(reversal: &mut TimeReversal, scale: &TimeScale, config: &EngineConfig) -> Run {
    let mut grid = CellGrid::new(10.0, 10.0);
    let mut run = Run {
        scales: vec![scale.get()],
        phases: Vec::new(),
        requests: Vec::new(),
    };

    for tick in 0..10_000 {
        let mut ctx = EffectContext {
            grid: &mut grid,
            config,
            frame: tick as u64,
        };
        let mut out = Vec::new();
        reversal.update(&mut ctx, &mut out);
        run.requests.extend(out.into_iter().map(|request| (tick, request)));
        run.scales.push(scale.get());
        if run.phases.last() != Some(&reversal.phase()) {
            run.phases.push(reversal.phase());
        }
        if !reversal.is_active() {
            break;
        }
    }
    run
}

fn trigger(reversal: &mut TimeReversal, config: &EngineConfig) -> bool {
    let mut grid = CellGrid::new(10.0, 10.0);
    let mut ctx = EffectContext {
        grid: &mut grid,
        config,
        frame: 0,
    };
    reversal.trigger(&mut ctx)
}

#[test]
fn trigger_without_a_live_simulation_is_refused() {
    let config = EngineConfig::default();
    let mut reversal = TimeReversal::new(TimeScaleLink::default());

    assert!(!trigger(&mut reversal, &config));
    assert_eq!(reversal.phase(), ReversalPhase::Idle);
    assert!(!reversal.is_active());
}

#[test]
fn phases_run_in_order_and_return_to_real_time() {
    let config = EngineConfig::default();
    let scale = TimeScale::default();
    let mut reversal = TimeReversal::new(scale.link());

    assert!(trigger(&mut reversal, &config));
    assert_eq!(reversal.phase(), ReversalPhase::SlowDown);
    assert!(!trigger(&mut reversal, &config), "already running");

    let run = run_to_idle(&mut reversal, &scale, &config);
    assert_eq!(
        run.phases,
        vec![
            ReversalPhase::SlowDown,
            ReversalPhase::Stop,
            ReversalPhase::Rewind,
            ReversalPhase::Reset,
            ReversalPhase::Idle,
        ]
    );
    assert_eq!(scale.get(), 1.0);

    let slowest = run.scales.iter().copied().fold(f32::INFINITY, f32::min);
    assert!((slowest - config.reversal.rewind_speed).abs() < 1e-4);
    assert!(run.scales.iter().any(|value| *value == 0.0), "stop holds zero");
}

#[test]
fn time_scale_never_jumps_more_than_the_ramp_step() {
    let mut config = EngineConfig::default();
    config.reversal.slowdown_ticks = 5;
    config.reversal.rewind_ramp_ticks = 2;
    config.reversal.rewind_ticks = 10;
    config.reversal.max_ramp_step = 0.08;
    let scale = TimeScale::default();
    let mut reversal = TimeReversal::new(scale.link());

    assert!(trigger(&mut reversal, &config));
    let run = run_to_idle(&mut reversal, &scale, &config);

    for (tick, pair) in run.scales.windows(2).enumerate() {
        let jump = (pair[1] - pair[0]).abs();
        assert!(
            jump <= config.reversal.max_ramp_step + 1e-4,
            "tick {tick}: {} -> {} jumps {jump}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn reset_requests_the_handoff_once_on_its_first_tick() {
    let config = EngineConfig::default();
    let scale = TimeScale::default();
    let mut reversal = TimeReversal::new(scale.link());

    assert!(trigger(&mut reversal, &config));
    let run = run_to_idle(&mut reversal, &scale, &config);

    assert_eq!(run.requests.len(), 1);
    let (tick, request) = &run.requests[0];
    assert_eq!(request, &EffectRequest::Trigger("ClearPulse".to_owned()));
    assert!(
        run.scales[*tick + 1] < 0.0,
        "handoff happens while the rate is still recovering"
    );
}

#[test]
fn empty_handoff_disables_the_request() {
    let mut config = EngineConfig::default();
    config.reversal.handoff.clear();
    let scale = TimeScale::default();
    let mut reversal = TimeReversal::new(scale.link());

    assert!(trigger(&mut reversal, &config));
    let run = run_to_idle(&mut reversal, &scale, &config);
    assert!(run.requests.is_empty());
}

#[test]
fn losing_the_simulation_mid_run_returns_to_idle() {
    let config = EngineConfig::default();
    let scale = TimeScale::default();
    let mut reversal = TimeReversal::new(scale.link());
    assert!(trigger(&mut reversal, &config));
    drop(scale);

    let mut grid = CellGrid::new(10.0, 10.0);
    let mut ctx = EffectContext {
        grid: &mut grid,
        config: &config,
        frame: 0,
    };
    reversal.update(&mut ctx, &mut Vec::new());
    assert_eq!(reversal.phase(), ReversalPhase::Idle);
}
