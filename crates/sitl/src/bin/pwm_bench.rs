//! Runs a preset scenario and prints its output trace summary.
//!
//! Usage:
//!   cargo run -p pwm_guard_sitl --bin pwm_bench -- [OPTIONS]
//!
//! Options:
//!   -s, --scenario <NAME>   complementary | scaled | pattern (default: complementary)
//!   -p, --periods <N>       Carrier periods to simulate (default: 200)
//!   --paced <FACTOR>        Pace against wall-clock time (1.0 = real time)
//!   --set <NAME=VALUE>      Override a PWM parameter (complementary only, repeatable)
//!   --json                  Print the summary as JSON

use std::env;
use std::process;

use pwm_guard_core::parameters::{ParamValue, ParameterStore, PwmParams};
use pwm_guard_sitl::scenario::{self, FAULT_TOGGLE_US};
use pwm_guard_sitl::{FaultToggle, Scenario, Simulation, SimulationError, TimeMode};

struct Args {
    scenario: Scenario,
    periods: u64,
    paced: Option<f32>,
    overrides: Vec<(String, ParamValue)>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args {
        scenario: Scenario::ComplementaryRamp,
        periods: 200,
        paced: None,
        overrides: Vec::new(),
        json: false,
    };

    let raw: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "-s" | "--scenario" => {
                i += 1;
                args.scenario = value(&raw, i, "scenario").parse().unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    process::exit(1);
                });
            }
            "-p" | "--periods" => {
                i += 1;
                args.periods = value(&raw, i, "periods").parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid value for --periods");
                    process::exit(1);
                });
            }
            "--paced" => {
                i += 1;
                let factor: f32 = value(&raw, i, "paced").parse().unwrap_or_else(|_| {
                    eprintln!("Error: invalid value for --paced");
                    process::exit(1);
                });
                args.paced = Some(factor);
            }
            "--set" => {
                i += 1;
                args.overrides.push(parse_override(value(&raw, i, "set")));
            }
            "--json" => args.json = true,
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if !args.overrides.is_empty() && args.scenario != Scenario::ComplementaryRamp {
        eprintln!("Error: --set only applies to the complementary scenario");
        process::exit(1);
    }

    args
}

fn value<'a>(raw: &'a [String], i: usize, name: &str) -> &'a str {
    raw.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("Error: --{name} requires a value");
        process::exit(1);
    })
}

fn parse_override(arg: &str) -> (String, ParamValue) {
    let Some((name, raw)) = arg.split_once('=') else {
        eprintln!("Error: --set expects NAME=VALUE, got {arg}");
        process::exit(1);
    };
    let value = match raw {
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        number => ParamValue::Int(number.parse().unwrap_or_else(|_| {
            eprintln!("Error: invalid value for {name}: {number}");
            process::exit(1);
        })),
    };
    (name.to_string(), value)
}

fn print_usage() {
    eprintln!(
        "Usage: pwm_bench [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 -s, --scenario <NAME>   complementary | scaled | pattern (default: complementary)\n\
         \x20 -p, --periods <N>       Carrier periods to simulate (default: 200)\n\
         \x20 --paced <FACTOR>        Pace against wall-clock time (1.0 = real time)\n\
         \x20 --set <NAME=VALUE>      Override a PWM parameter (complementary only)\n\
         \x20 --json                  Print the summary as JSON\n\
         \x20 -h, --help              Show this help"
    );
}

fn build(args: &Args) -> Result<Simulation, SimulationError> {
    if args.overrides.is_empty() {
        return args.scenario.build();
    }

    let mut store = ParameterStore::new();
    PwmParams::register_defaults(&mut store)?;
    for (name, value) in &args.overrides {
        store.set(name, *value)?;
    }
    let params = PwmParams::from_store(&store)?;
    let mut sim = scenario::complementary_ramp(&params)?;
    let toggle = FaultToggle::from_us(
        sim.clock(),
        params.fault_event_channel,
        FAULT_TOGGLE_US,
        FAULT_TOGGLE_US,
    );
    sim.add_stimulus(Box::new(toggle));
    Ok(sim)
}

async fn run(args: &Args) -> Result<Simulation, SimulationError> {
    let mut sim = build(args)?;
    if let Some(factor) = args.paced {
        sim.set_time_mode(TimeMode::Scaled { factor });
    }

    sim.start()?;
    match sim.time_mode() {
        TimeMode::FreeRunning => sim.run_periods(args.periods)?,
        TimeMode::Scaled { .. } => {
            let ticks_per_period = sim
                .pwm()
                .carrier()
                .map_or(0, |carrier| carrier.ticks_per_period() as u64);
            sim.run_paced(args.periods * ticks_per_period).await?;
        }
    }
    Ok(sim)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = parse_args();

    let sim = match run(&args).await {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if args.json {
        match sim.trace().summary_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let summary = sim.summary();
    let stats = sim.dispatcher().stats();
    println!("=== pwm_guard bench: {} ===", args.scenario);
    println!(
        "Clock: {} Hz, simulated {} ticks ({} us), {} periods",
        sim.clock().clock_hz(),
        summary.ticks,
        sim.clock().now_us(),
        summary.periods
    );
    println!(
        "Edges: {}{}, forced ticks: {}, fault detections: {}",
        summary.edges,
        if summary.truncated { " (log truncated)" } else { "" },
        summary.forced_ticks,
        sim.pwm().fault_detections()
    );
    println!(
        "Interrupts: {} fault, {:?} compare, {} overflow, {} unhandled",
        stats.fault, stats.compare, stats.overflow, stats.unhandled
    );
    for pair in 0..summary.overlap_ticks.len() {
        println!(
            "Pair {pair}: overlap {} ticks, {} hand-overs, min dead band {}",
            summary.overlap_ticks[pair],
            summary.hand_overs[pair],
            summary.min_dead_band[pair].map_or("-".to_string(), |band| band.to_string())
        );
    }
    for pin in 0..summary.high_ticks.len() {
        println!("P{pin}: {:.1}% high", summary.duty_fraction(pin) * 100.0);
    }
}
