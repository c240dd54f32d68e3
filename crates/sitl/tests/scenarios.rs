use pwm_guard_core::event::EventSource;
use pwm_guard_core::parameters::{ParamValue, ParameterStore, PwmParams};
use pwm_guard_core::pins::Pins;
use pwm_guard_core::timer::RampWrap;
use pwm_guard_core::wex::{FaultConfig, FaultInputs, FaultState};
use pwm_guard_core::ConfigError;
use pwm_guard_sitl::scenario::{complementary_ramp, pattern_bench, scaled_four_channel};
use pwm_guard_sitl::{Action, AmplitudeSweep, Scenario, Schedule, SimulationError};

fn fixed_duty_params() -> PwmParams {
    PwmParams {
        ramp_steps: [0; 4],
        ..Default::default()
    }
}

#[test]
fn test_ramp_wraps_after_198_matches() {
    let mut sim = complementary_ramp(&PwmParams::default()).unwrap();
    sim.start().unwrap();
    sim.run_periods(198).unwrap();

    let stats = sim.dispatcher().stats();
    assert_eq!(stats.compare, [198; 4]);
    assert_eq!(sim.pwm().active_duty(0), Some(0));
    assert_eq!(sim.pwm().active_duty(1), Some(0));
    assert_eq!(sim.pwm().active_duty(2), Some(950));
    assert_eq!(sim.pwm().active_duty(3), Some(840));
}

#[test]
fn test_modulo_ramp_returns_to_zero_after_198_matches() {
    let params = PwmParams {
        ramp_wrap: RampWrap::Modulo,
        ..Default::default()
    };
    let mut sim = complementary_ramp(&params).unwrap();
    sim.start().unwrap();
    sim.run_periods(198).unwrap();

    // 198 times each step is a multiple of 990.
    assert_eq!(sim.dispatcher().stats().compare, [198; 4]);
    for channel in 0..4 {
        assert_eq!(sim.pwm().active_duty(channel), Some(0));
    }

    sim.run_periods(1).unwrap();
    assert_eq!(sim.pwm().active_duty(0), Some(5));
    assert_eq!(sim.pwm().active_duty(3), Some(35));
}

#[test]
fn test_fault_forces_and_clear_resumes_at_boundary() {
    let mut sim = complementary_ramp(&PwmParams::default()).unwrap();
    sim.start().unwrap();
    sim.run_periods(3).unwrap();

    assert!(sim.pwm_mut().fire_fault_event(0).unwrap());
    assert_eq!(sim.pwm().fault_status(), FaultState::Faulted);
    assert_eq!(sim.pwm().outputs(), Pins::empty());

    sim.step().unwrap();
    assert_eq!(sim.dispatcher().stats().fault, 1);
    assert_eq!(sim.pwm().outputs(), Pins::empty());

    // Latched: boundaries do not release the outputs.
    sim.run_periods(2).unwrap();
    assert_eq!(sim.pwm().fault_status(), FaultState::Faulted);
    assert!(sim.pwm().fault_forcing());

    assert!(sim.pwm_mut().clear_fault());
    assert!(!sim.pwm_mut().clear_fault());
    assert_eq!(sim.pwm().fault_status(), FaultState::Armed);
    assert!(sim.pwm().fault_forcing());

    sim.run_periods(1).unwrap();
    assert!(!sim.pwm().fault_forcing());

    let low_side_before = sim.summary().high_ticks[1];
    sim.run_periods(1).unwrap();
    assert!(sim.summary().high_ticks[1] > low_side_before);
}

#[test]
fn test_dead_time_prevents_overlap_under_alternating_duty() {
    let mut sim = complementary_ramp(&fixed_duty_params()).unwrap();
    let mut schedule = Schedule::new();
    for period in 0..100u64 {
        let duty = if period % 2 == 0 { 100 } else { 900 };
        for channel in 0..4 {
            schedule = schedule.at(period * 1000 + 500, Action::WriteDuty { channel, duty });
        }
    }
    sim.add_stimulus(Box::new(schedule));

    sim.start().unwrap();
    sim.run_periods(101).unwrap();

    let summary = sim.summary();
    assert!(summary.shoot_through_free());
    for pair in 0..4 {
        assert_eq!(summary.min_dead_band[pair], Some(3));
        assert!(summary.hand_overs[pair] >= 100);
    }
}

#[test]
fn test_latched_fault_survives_1000_periods() {
    let mut sim = complementary_ramp(&PwmParams::default()).unwrap();
    sim.start().unwrap();
    sim.pwm_mut().fire_fault_event(0).unwrap();

    sim.run_periods(1000).unwrap();

    let summary = sim.summary();
    assert_eq!(sim.pwm().fault_status(), FaultState::Faulted);
    assert_eq!(summary.forced_ticks, summary.ticks);
    assert!(summary.high_ticks.iter().all(|&ticks| ticks == 0));
    assert_eq!(sim.pwm().fault_detections(), 1);
}

#[test]
fn test_clear_while_armed_is_noop() {
    let mut sim = complementary_ramp(&PwmParams::default()).unwrap();
    sim.start().unwrap();
    sim.run_periods(1).unwrap();
    assert!(!sim.pwm_mut().clear_fault());
    assert_eq!(sim.pwm().fault_status(), FaultState::Armed);
    assert!(!sim.pwm().fault_forcing());
}

#[test]
fn test_complementary_preset_toggles_fault() {
    let mut sim = Scenario::ComplementaryRamp.build().unwrap();
    sim.start().unwrap();
    // 250 µs faulted, 250 µs released, twice.
    sim.run_for_us(1000).unwrap();

    assert_eq!(sim.pwm().fault_detections(), 2);
    assert_eq!(sim.dispatcher().stats().fault, 2);
    let summary = sim.summary();
    assert!(summary.forced_ticks > 0);
    assert!(summary.forced_ticks < summary.ticks);
    assert!(summary.shoot_through_free());
}

#[test]
fn test_amplitude_sweep_rewrites_and_clamps() {
    let mut sim = scaled_four_channel().unwrap();
    sim.add_stimulus(Box::new(AmplitudeSweep::new(vec![0x4000, 0xC000], 8000)));
    sim.start().unwrap();
    assert_eq!(sim.pwm().active_duty(3), Some(3188));

    sim.run_periods(1).unwrap();
    assert_eq!(sim.pwm().active_duty(0), Some(399));

    sim.run_periods(1).unwrap();
    assert_eq!(sim.pwm().active_duty(0), Some(1199));
    assert_eq!(sim.pwm().active_duty(3), Some(3999));
}

#[test]
fn test_pattern_bench_sequence() {
    let mut sim = Scenario::PatternBench.build().unwrap();
    sim.start().unwrap();

    sim.step().unwrap();
    assert_eq!(sim.pwm().outputs().bits(), 0x55);

    let step = sim.clock().us_to_ticks(25);
    sim.run_ticks(step - 1).unwrap();
    assert_eq!(sim.pwm().outputs().bits(), 0xAA);

    // Ten complementary steps later every pin is low again.
    sim.run_ticks(9 * step).unwrap();
    assert_eq!(sim.pwm().outputs(), Pins::empty());
}

#[test]
fn test_fault_overrides_pattern() {
    let mut sim = pattern_bench().unwrap();
    sim.pwm_mut()
        .route_event(0, EventSource::Software, FaultInputs::A)
        .unwrap();
    sim.pwm_mut()
        .configure_fault(FaultConfig::latched())
        .unwrap();
    sim.start().unwrap();

    sim.pwm_mut().set_pattern(0xFF);
    assert_eq!(sim.pwm().outputs(), Pins::all());

    sim.pwm_mut().fire_fault_event(0).unwrap();
    assert_eq!(sim.pwm().outputs(), Pins::empty());

    sim.pwm_mut().set_pattern(0x0F);
    assert_eq!(sim.pwm().outputs(), Pins::empty());
}

#[test]
fn test_parameter_store_drives_controller() {
    let mut store = ParameterStore::new();
    PwmParams::register_defaults(&mut store).unwrap();
    store.set("PWM_MAX_DUTY", ParamValue::Int(900)).unwrap();
    store.set("DT_LS", ParamValue::Int(10)).unwrap();
    store.set("DT_HS", ParamValue::Int(12)).unwrap();

    let params = PwmParams::from_store(&store).unwrap();
    let mut sim = complementary_ramp(&params).unwrap();
    sim.start().unwrap();
    sim.run_periods(50).unwrap();

    let summary = sim.summary();
    assert!(summary.shoot_through_free());
    assert_eq!(summary.min_dead_band[0], Some(10));
}

#[test]
fn test_parameter_margin_violation_rejected() {
    let mut store = ParameterStore::new();
    PwmParams::register_defaults(&mut store).unwrap();
    store.set("DT_LS", ParamValue::Int(10)).unwrap();

    let params = PwmParams::from_store(&store).unwrap();
    assert!(matches!(
        complementary_ramp(&params),
        Err(SimulationError::Config(
            ConfigError::InsufficientDutyMargin { .. }
        ))
    ));
}
