// src/main.rs
//
// Standalone CLI driver for the vessel and cell components.
//
// Coupled runs pair two simulator processes through an external transport
// and are launched by the coupling framework, not from here; this binary
// covers standalone runs against an input dataset.
//
// Examples:
//
//   cargo run --release -- vessel input=data/clinical_image_3d.vti \
//         output=out/run steps=20 end_time=20 dt=1
//       -> vessel component over a clinical image, one snapshot per step.
//
//   cargo run --release -- cell config=run.json steps=5
//       -> cell component with parameters from a JSON file and a step
//          override.
//
// Typical outputs:
//   <output>_<component>_t_<time>.vti    snapshots on the output cadence
//   <output>_config.json                 the effective configuration

use std::path::{Path, PathBuf};

use angio_sim::config::RunConfig;
use angio_sim::driver::{RunMode, Simulation};
use angio_sim::error::SimResult;
use angio_sim::model::{CellModel, SimulationModel, VesselModel};
use angio_sim::params::{CellParams, VesselParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Component {
    Vessel,
    Cell,
}

impl Component {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "vessel" => Some(Self::Vessel),
            "cell" => Some(Self::Cell),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Vessel => "vessel",
            Self::Cell => "cell",
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"Usage:
  cargo run -- [vessel|cell] [config=FILE.json]
             [input=FILE.vti] [output=STEM]
             [steps=N] [end_time=VAL] [dt=VAL] [output_every=N]
             [substep=VAL] [initial_vessel_fraction=VAL]

Notes:
  - Standalone runs take geometry and initial fields from the input
    dataset; an input path is required.
  - Snapshots are written as <output>_<component>_t_<time>.vti, and the
    effective configuration as <output>_config.json.
"#
    );
}

fn run_simulation<M: SimulationModel>(model: M, cfg: &RunConfig) -> SimResult<()> {
    let settings = cfg.simulation_settings()?;
    let mut sim = Simulation::new(model, RunMode::Standalone, settings);
    let report = sim.run(None)?;
    println!(
        "finished: {} steps, t = {}, {} snapshots ({:?})",
        report.steps_completed, report.final_time, report.snapshots_written, report.stop_reason
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().collect();

    let mut component = Component::Vessel;
    let mut config_path: Option<PathBuf> = None;

    // Optional overrides applied on top of the config file.
    let mut input_override: Option<String> = None;
    let mut output_override: Option<String> = None;
    let mut steps_override: Option<usize> = None;
    let mut end_time_override: Option<f64> = None;
    let mut dt_override: Option<f64> = None;
    let mut output_every_override: Option<usize> = None;
    let mut substep_override: Option<f64> = None;
    let mut initial_fraction_override: Option<f64> = None;

    for arg in argv.iter().skip(1) {
        if arg == "-h" || arg == "--help" || arg == "help" {
            print_usage();
            return;
        }

        if let Some(c) = Component::from_str(arg) {
            component = c;
            continue;
        }

        if let Some(v) = arg.strip_prefix("config=") {
            config_path = Some(PathBuf::from(v));
            continue;
        }
        if let Some(v) = arg.strip_prefix("input=") {
            input_override = Some(v.to_string());
            continue;
        }
        if let Some(v) = arg.strip_prefix("output=") {
            output_override = Some(v.to_string());
            continue;
        }
        if let Some(v) = arg.strip_prefix("steps=") {
            steps_override = v.parse::<usize>().ok();
            continue;
        }
        if let Some(v) = arg.strip_prefix("end_time=") {
            end_time_override = v.parse::<f64>().ok();
            continue;
        }
        if let Some(v) = arg.strip_prefix("dt=") {
            dt_override = v.parse::<f64>().ok();
            continue;
        }
        if let Some(v) = arg.strip_prefix("output_every=") {
            output_every_override = v.parse::<usize>().ok();
            continue;
        }
        if let Some(v) = arg.strip_prefix("substep=") {
            substep_override = v.parse::<f64>().ok();
            continue;
        }
        if let Some(v) = arg.strip_prefix("initial_vessel_fraction=") {
            initial_fraction_override = v.parse::<f64>().ok();
            continue;
        }

        eprintln!("Warning: ignoring unknown argument '{arg}'");
    }

    let mut cfg = match &config_path {
        Some(path) => match RunConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => RunConfig::default(),
    };

    // Apply overrides
    if let Some(v) = input_override {
        cfg.io.input = Some(v);
    }
    if let Some(v) = output_override {
        cfg.io.output = Some(v);
    }
    if let Some(n) = steps_override {
        cfg.time.max_steps = n;
    }
    if let Some(t) = end_time_override {
        cfg.time.end_time = t;
    }
    if let Some(dt) = dt_override {
        cfg.time.increment = dt;
    }
    if let Some(n) = output_every_override {
        cfg.time.output_frequency = n.max(1);
    }
    if let Some(h) = substep_override {
        cfg.vessel.vessel_growth_substep = h;
    }
    if let Some(f) = initial_fraction_override {
        cfg.vessel.initial_volume_fraction = f;
    }

    println!("--- angio-sim run config ---");
    println!("component: {}", component.as_str());
    println!(
        "input:     {}",
        cfg.io.input.as_deref().unwrap_or("(none)")
    );
    println!(
        "output:    {}",
        cfg.io.output.as_deref().unwrap_or("(none)")
    );
    println!(
        "time:      dt={} steps={} end_time={} output_every={}",
        cfg.time.increment, cfg.time.max_steps, cfg.time.end_time, cfg.time.output_frequency
    );
    if component == Component::Vessel {
        println!(
            "vessel:    D_n={} D_s={} Vmax={} Veq={} growth={} regression={} substep={}",
            cfg.vessel.nutrient_diffusivity,
            cfg.vessel.stimulus_diffusivity,
            cfg.vessel.max_vessel_fraction,
            cfg.vessel.equilibrium_vessel_fraction,
            cfg.vessel.vessel_growth_rate,
            cfg.vessel.vessel_regression_rate,
            cfg.vessel.vessel_growth_substep
        );
    } else {
        println!(
            "cell:      proliferation_rate={} initial_volume={}",
            cfg.cell.proliferation_rate, cfg.cell.initial_volume
        );
    }
    println!("----------------------------");

    // Record the effective configuration next to the outputs.
    if let Some(stem) = cfg.io.output.clone() {
        let cfg_path = format!("{}_config.json", stem);
        if let Err(e) = cfg.write(Path::new(&cfg_path)) {
            eprintln!("Warning: could not write {cfg_path}: {e}");
        }
    }

    let result = match component {
        Component::Vessel => {
            let params: VesselParams = cfg.vessel.clone();
            run_simulation(VesselModel::new(params), &cfg)
        }
        Component::Cell => {
            let params: CellParams = cfg.cell.clone();
            run_simulation(CellModel::new(params), &cfg)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
