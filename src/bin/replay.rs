//! Headless scenario runner
//!
//! Runs a JSON scenario at its fixed tick rate and prints a summary of the
//! mode changes. With a second argument the per-tick trajectories are written
//! there as JSON.

use rtsmove::logging;
use rtsmove::scenario::Scenario;
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.json> [trace_out.json]", args[0]);
        eprintln!("Runs a movement scenario headless and optionally saves the trajectory log");
        std::process::exit(1);
    }

    logging::init(env::var_os("RTSMOVE_VERBOSE").is_some());

    let scenario = Scenario::load(&args[1])?;
    let log = scenario.run()?;

    println!("=== Scenario: {} ===", if scenario.name.is_empty() { &args[1] } else { &scenario.name });
    log.print_events();

    if let Some(last) = log.last() {
        println!("=== Final positions (tick {}) ===", last.tick);
        for sample in &last.units {
            println!(
                "{:>5} ({:8.3}, {:8.3}) {:7.1}° {}",
                sample.agent.to_string(),
                sample.x,
                sample.z,
                sample.rotation,
                sample.mode
            );
        }
    }

    println!("\n=== Summary ===");
    println!("{}", log.summary());
    if let Some(sep) = log.min_separation() {
        println!("Closest approach: {:.3}", sep);
    }

    if let Some(out) = args.get(2) {
        log.save_to_file(out)?;
        println!("Trajectory written to {}", out);
    }

    Ok(())
}
