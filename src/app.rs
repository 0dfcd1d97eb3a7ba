//! Run loops
//!
//! `run_live` drives the simulation in real time against a controller on a
//! single-threaded runtime. `run_headless` steps the simulation as fast as
//! possible with no network at all.

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::AppConfig;
use crate::console::{Command, HELP};
use crate::simulation::{SpawnRequest, TrafficWorld};
use crate::sync::SyncClient;

/// Traffic to put on the road at startup
#[derive(Debug, Clone, Copy, Default)]
pub struct InitialTraffic(pub Option<SpawnRequest>);

fn build_world(config: &AppConfig) -> TrafficWorld {
    let mut world = TrafficWorld::new(config.simulation.clone());
    world.intersection_id = config.sync.intersection.clone();
    world
}

/// Whether the live loop should keep going after a command
enum Flow {
    Continue,
    Quit,
}

fn spawn_and_announce(world: &mut TrafficWorld, sync: &SyncClient, request: &SpawnRequest) {
    world.spawn_vehicles(request);
    sync.send_demand(*request.counts());
}

fn run_command(command: Command, world: &mut TrafficWorld, sync: &mut SyncClient) -> Flow {
    match command {
        Command::Spawn(request) => spawn_and_announce(world, sync, &request),
        Command::Scenario(scenario) => {
            let request = SpawnRequest(world.scenario_counts(scenario));
            info!("Scenario {}: {}", scenario, request.counts());
            spawn_and_announce(world, sync, &request);
        }
        Command::Switch(id) => sync.switch_intersection(&id, world),
        Command::Controller(url) => {
            if let Err(e) = sync.switch_controller(&url) {
                warn!("Keeping current controller: {}", e);
            }
        }
        Command::Reset => {
            world.reset(true);
            sync.reset_remote();
            sync.request_poll();
        }
        Command::Health => sync.check_health(),
        Command::Status => println!("{} | {}", world.status_line(), sync.status_line()),
        Command::Map => world.draw_map(),
        Command::Help => println!("{HELP}"),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

/// Run against the controller until ctrl-c, `quit`, or end of input
pub async fn run_live(config: AppConfig, initial: InitialTraffic) -> Result<()> {
    let mut world = build_world(&config);
    let mut sync = SyncClient::new(config.sync.clone()).context("Invalid controller settings")?;

    info!(
        "Syncing intersection '{}' with {}",
        sync.intersection(),
        config.sync.base_url
    );
    sync.start();

    if let Some(request) = initial.0 {
        spawn_and_announce(&mut world, &sync, &request);
    }

    let delta = config.runtime.tick_delta();
    let mut tick = interval(config.runtime.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poll = interval(config.sync.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut report = interval(config.sync.report_interval());
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status = interval(config.runtime.status_interval());
    status.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => world.tick(delta),
            _ = poll.tick() => sync.request_poll(),
            _ = report.tick() => sync.send_sensor_report(world.sensor_report()),
            _ = status.tick() => {
                info!("{} | {}", world.status_line(), sync.status_line());
            }
            Some(event) = sync.next_event() => {
                sync.handle_event(event, &mut world);
            }
            line = console.next_line(), if console_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if let Flow::Quit = run_command(command, &mut world, &mut sync) {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => console_open = false,
                Err(e) => {
                    warn!("Console closed: {}", e);
                    console_open = false;
                }
            },
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
        }
    }

    sync.shutdown();
    println!("=== Final State ===");
    world.print_summary();
    Ok(())
}

/// Run the simulation in headless mode (no network)
///
/// The signals stay at whatever the phase tracker starts with.
pub fn run_headless(config: &AppConfig, initial: InitialTraffic, ticks: u32, delta: f32) {
    println!("Running intersection simulation in headless mode...");
    println!("Ticks: {}, Delta: {}s", ticks, delta);

    // How many ticks make up one second of simulated time
    let ticks_per_second = (1.0 / delta).ceil().max(1.0) as u32;
    println!();

    let mut world = build_world(config);
    if let Some(request) = initial.0 {
        world.spawn_vehicles(&request);
    }

    println!("Initial state:");
    world.print_summary();
    world.draw_map();
    println!();

    let mut tick = 0;
    while tick < ticks {
        let ticks_to_run = ticks_per_second.min(ticks - tick);
        for _ in 0..ticks_to_run {
            tick += 1;
            world.tick(delta);
        }
        println!(
            "--- After tick {} ({:.1}s simulated time) ---",
            tick,
            tick as f32 * delta
        );
        println!("{}", world.status_line());
    }

    println!("=== Final State ===");
    world.print_summary();
    world.draw_map();

    info!("=== SIMULATION COMPLETE ===");
    info!("Total vehicles spawned: {}", world.stats.total_spawned);
    info!("Total vehicles passed: {}", world.stats.total_passed);
    info!("Active vehicles: {}", world.vehicles.len());
    info!("Average wait: {:.2}s", world.stats.average_wait());
}
