//! qrs: CLI binary for the path-integral simulator control client.
//!
//! Commands:
//! - run      Connect to the simulator and run the control loop

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use qrs_core::{Config, ModelKind, PiParams};
use qrs_logging::{
    now_ms, write_manifest_atomic, ControlCycleEventV1, NdjsonWriter, RunManifestV1,
    StepOutcomeEventV1, RUN_MANIFEST_VERSION,
};
use qrs_pi::PiController;
use qrs_proto::{ClientOptions, SimClient};

fn print_help() {
    eprintln!(
        r#"qrs - path-integral control client for a remote multi-agent flight simulator

USAGE:
    qrs <COMMAND> [OPTIONS]

COMMANDS:
    run                 Connect, initialize the task, and run the control loop

OPTIONS:
    -h, --help          Print this help message
    -V, --version       Print version

Run `qrs run --help` for the run options.
"#
    );
}

fn print_version() {
    println!("qrs {}", env!("CARGO_PKG_VERSION"));
}

fn model_name(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::FreeRollout => "free_rollout",
        ModelKind::Pursuit => "pursuit",
    }
}

fn cmd_run(args: &[String]) {
    let mut config_path: Option<String> = None;
    let mut steps_override: Option<u64> = None;
    let mut seed_override: Option<u64> = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!(
                    r#"qrs run

USAGE:
    qrs run --config cfg.yaml [--steps N] [--seed S]

OPTIONS:
    --config PATH   YAML configuration file (required)
    --steps N       Override the number of control cycles
    --seed S        Override the rollout noise seed
"#
                );
                return;
            }
            "--config" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --config");
                    process::exit(1);
                }
                config_path = Some(args[i + 1].clone());
                i += 2;
            }
            "--steps" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --steps");
                    process::exit(1);
                }
                steps_override = Some(args[i + 1].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --steps value: {}", args[i + 1]);
                    process::exit(1);
                }));
                i += 2;
            }
            "--seed" => {
                if i + 1 >= args.len() {
                    eprintln!("Missing value for --seed");
                    process::exit(1);
                }
                seed_override = Some(args[i + 1].parse().unwrap_or_else(|_| {
                    eprintln!("Invalid --seed value: {}", args[i + 1]);
                    process::exit(1);
                }));
                i += 2;
            }
            other => {
                eprintln!("Unknown option for `qrs run`: {}", other);
                eprintln!("Run `qrs run --help` for usage.");
                process::exit(1);
            }
        }
    }

    let Some(config_path) = config_path else {
        eprintln!("`qrs run` requires --config");
        process::exit(1);
    };

    if let Err(e) = run(Path::new(&config_path), steps_override, seed_override) {
        eprintln!("run failed: {}", e);
        process::exit(1);
    }
}

fn run(
    config_path: &Path,
    steps_override: Option<u64>,
    seed_override: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let config_bytes = fs::read(config_path)?;
    let config = Config::load(config_path)?;
    let mut params = PiParams::from_config(&config.pi)?;
    let seed = seed_override.unwrap_or(config.pi.seed);

    let conn = &config.connection;
    println!("Connecting to {}:{}", conn.host, conn.port);
    let recv_timeout = match conn.recv_timeout_secs {
        0 => None,
        s => Some(Duration::from_secs(s)),
    };
    let mut client = SimClient::connect(
        (conn.host.as_str(), conn.port),
        ClientOptions { recv_timeout },
    )?;

    let (mut state, info) = client.init(&conn.task, conn.real_time)?;
    println!(
        "{} initialized: timestep={} num_uavs={}",
        conn.task, info.timestep, info.num_uavs
    );

    // Reconcile the model's coarse step with what the simulator can
    // actually step: dS must be a whole number of simulator timesteps.
    let dtperstep_sim = (params.ds / info.timestep) as u32;
    let ds_sim = info.timestep * dtperstep_sim as f64;
    if (params.ds - ds_sim).abs() > 1e-12 {
        eprintln!(
            "WARNING: coarse step mismatch: dS (model) = {} vs dS (simulator) = {}",
            params.ds, ds_sim
        );
    }
    if params.units != info.num_uavs {
        eprintln!(
            "WARNING: agent count mismatch: units (model) = {} vs simulator = {}; \
             adopting the simulator's count",
            params.units, info.num_uavs
        );
        params = params.with_units(info.num_uavs);
    }

    let mut controller = PiController::new(params, config.pi.model, seed);

    // Run directory + event log + manifest.
    let run_id = format!("run-{}", now_ms());
    let run_dir = PathBuf::from(&config.run.log_dir).join(&run_id);
    fs::create_dir_all(&run_dir)?;
    let events_path = run_dir.join("events.ndjson");
    let mut events = NdjsonWriter::open_append_with_flush(&events_path, 10)?;

    let mut manifest = RunManifestV1 {
        run_manifest_version: RUN_MANIFEST_VERSION,
        run_id: run_id.clone(),
        created_ts_ms: now_ms(),
        git_hash: qrs_logging::try_git_hash(),
        config_hash: Some(qrs_logging::hash_config_bytes(&config_bytes)),
        task: conn.task.clone(),
        model: model_name(config.pi.model).to_string(),
        seed,
        sim_timestep: info.timestep,
        num_uavs: info.num_uavs,
        events_path: events_path.to_string_lossy().into_owned(),
        cycles_completed: 0,
        protocol_errors: 0,
    };
    let manifest_path = run_dir.join("run.json");
    write_manifest_atomic(&manifest_path, &manifest)?;

    let nsteps = steps_override
        .unwrap_or_else(|| ((config.run.duration_secs / params.dt) / params.dtperstep as f64) as u64);
    println!("Running {} control cycles (dS = {})", nsteps, ds_sim);

    for cycle in 0..nsteps {
        let decision = match controller.compute_control(&state.x) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("cycle {}: controller failed: {}", cycle, e);
                manifest.protocol_errors += 1;
                break;
            }
        };

        events.write_event(&ControlCycleEventV1 {
            event: "control_cycle",
            ts_ms: now_ms(),
            run_id: run_id.clone(),
            cycle,
            v_exp: decision.diagnostics.v_exp,
            v_max: decision.diagnostics.v_max,
            weight_sum: decision.diagnostics.weight_sum,
            ess: decision.diagnostics.ess,
            action: decision.action.clone(),
            state: state
                .x
                .iter()
                .flat_map(|xi| [xi[0], xi[1], xi[6], xi[7]])
                .collect(),
        })?;

        match client.step_velocity(ds_sim, &decision.sim_commands) {
            Ok(next) => {
                state = next;
                manifest.cycles_completed += 1;
                events.write_event(&StepOutcomeEventV1 {
                    event: "step_outcome",
                    ts_ms: now_ms(),
                    run_id: run_id.clone(),
                    cycle,
                    dt: ds_sim,
                    ok: true,
                    error: None,
                })?;
            }
            Err(e) => {
                eprintln!("cycle {}: step failed: {}", cycle, e);
                manifest.protocol_errors += 1;
                events.write_event(&StepOutcomeEventV1 {
                    event: "step_outcome",
                    ts_ms: now_ms(),
                    run_id: run_id.clone(),
                    cycle,
                    dt: ds_sim,
                    ok: false,
                    error: Some(e.to_string()),
                })?;
                break;
            }
        }
        println!("{} of {}", cycle + 1, nsteps);
    }

    events.flush()?;
    write_manifest_atomic(&manifest_path, &manifest)?;

    match client.quit() {
        Ok(()) => println!("quitting..."),
        Err(e) => eprintln!("not able to quit: {}", e),
    }
    println!(
        "done: {} cycles, {} errors",
        manifest.cycles_completed, manifest.protocol_errors
    );
    Ok(())
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("run") => cmd_run(&args[1..]),
        Some("-h") | Some("--help") | None => print_help(),
        Some("-V") | Some("--version") => print_version(),
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
            process::exit(1);
        }
    }
}
