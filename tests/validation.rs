// tests/validation.rs
//
// Integration-style validation tests (model sanity checks and the
// driver/coupling protocol).
// Run with: cargo test
// Or only these tests: cargo test --test validation

use std::path::PathBuf;
use std::thread;

use angio_sim::coupling::{input_port, output_port, CouplingChannel, InMemoryChannel};
use angio_sim::driver::{RunMode, Simulation, SimulationSettings, StepSettings, StopReason};
use angio_sim::fields::FieldId;
use angio_sim::grid::Grid3;
use angio_sim::model::{CellModel, VesselModel};
use angio_sim::params::{CellParams, VesselParams};
use angio_sim::vti::{read_vti, write_vti, ImageDataset};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

fn temp_stem(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("angio_sim_it_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

/// Input dataset with a small proliferating blob around the domain centre.
/// Only three of the six expected cell-state arrays are present; the rest
/// must silently zero-fill.
fn write_blob_input(path: &PathBuf) -> Grid3 {
    let grid = Grid3::new(5, 5, 5, 1.0, [0.0; 3]).unwrap();
    let n = grid.n_points();

    let mut proliferating = vec![0.0; n];
    let mut quiescent = vec![0.0; n];
    let mut tumour = vec![0.0; n];
    for iz in 0..5 {
        for iy in 0..5 {
            for ix in 0..5 {
                let pos = grid.position(ix, iy, iz);
                let d2 = (pos[0] - 2.0).powi(2) + (pos[1] - 2.0).powi(2) + (pos[2] - 2.0).powi(2);
                if d2 < 1.5 * 1.5 {
                    let p = grid.index(ix, iy, iz);
                    proliferating[p] = 1.0;
                    tumour[p] = 1.0;
                }
            }
        }
    }
    quiescent[grid.index(2, 2, 2)] = 0.5;

    let mut dataset = ImageDataset::for_grid(&grid);
    dataset
        .arrays
        .push(("proliferating".to_string(), proliferating));
    dataset.arrays.push(("quiescent".to_string(), quiescent));
    dataset.arrays.push(("tumour".to_string(), tumour));
    write_vti(path, &dataset).unwrap();
    grid
}

fn stable_vessel_params() -> VesselParams {
    // Sub-step small enough that the explicit growth update is stable for
    // the largest gated rate in these scenarios (r0 <= 4/hr).
    VesselParams {
        vessel_growth_substep: 0.05,
        ..VesselParams::default()
    }
}

#[test]
fn standalone_vessel_run_over_an_input_image() {
    let input = temp_stem("blob_input.vti");
    write_blob_input(&input);
    let output = temp_stem("standalone_run");

    let settings = SimulationSettings {
        stepping: StepSettings {
            time_increment: 1.0,
            max_steps: 3,
            end_time: 100.0,
            output_frequency: 1,
            start_time: 0.0,
        },
        input_path: Some(input.clone()),
        output_path: Some(output.clone()),
        geometry: None,
    };

    let mut sim = Simulation::new(
        VesselModel::new(stable_vessel_params()),
        RunMode::Standalone,
        settings,
    );
    let report = sim.run(None).unwrap();

    assert_eq!(report.steps_completed, 3);
    assert_eq!(report.snapshots_written, 3);
    assert_eq!(report.final_time, 3.0);
    assert_eq!(report.stop_reason, StopReason::StepBudget);

    // Field store keeps the length invariant after the run.
    let fields = sim.fields().unwrap();
    fields.validate().unwrap();
    let n = sim.grid().unwrap().n_points();
    assert_eq!(n, 125);
    for id in FieldId::ALL {
        assert_eq!(fields.get(id).len(), n);
    }

    // Snapshots exist on the cadence and read back consistently.
    for t in ["0", "1", "2"] {
        let path = PathBuf::from(format!("{}_vessel_t_{}.vti", output.display(), t));
        assert!(path.exists(), "missing snapshot {}", path.display());
    }
    let last = read_vti(&PathBuf::from(format!(
        "{}_vessel_t_2.vti",
        output.display()
    )))
    .unwrap();
    assert_eq!(last.dims, [5, 5, 5]);
    assert_eq!(last.arrays.len(), 9);

    // Physics sanity: nutrient bounded by the ambient level, vessel
    // fraction bounded by the growth law's fixed points.
    let nutrient = last.array("nutrient").unwrap();
    for &v in nutrient {
        assert!(v >= 0.0 && v <= 40.0 + 1e-6, "nutrient out of range: {}", v);
    }
    let vessel = last.array("vessel").unwrap();
    for &v in vessel {
        assert!(v >= 0.0 && v <= 0.5 + 1e-9, "vessel out of range: {}", v);
    }
    // The healthy corner stays pinned at the ambient nutrient level (up
    // to the iterative solve tolerance).
    assert!(approx_eq(nutrient[0], 40.0, 1e-6));

    // Absent optional inputs zero-filled.
    let necrotic = last.array("necrotic").unwrap();
    assert!(necrotic.iter().all(|&v| v == 0.0));
}

#[test]
fn elapsed_time_cutoff_ends_the_run_early() {
    let input = temp_stem("cutoff_input.vti");
    write_blob_input(&input);
    let output = temp_stem("cutoff_run");

    let settings = SimulationSettings {
        stepping: StepSettings {
            time_increment: 1.0,
            max_steps: 10,
            end_time: 2.0,
            output_frequency: 1,
            start_time: 0.0,
        },
        input_path: Some(input),
        output_path: Some(output),
        geometry: None,
    };

    let mut sim = Simulation::new(
        VesselModel::new(stable_vessel_params()),
        RunMode::Standalone,
        settings,
    );
    let report = sim.run(None).unwrap();
    assert_eq!(report.steps_completed, 2);
    assert_eq!(report.final_time, 2.0);
    assert_eq!(report.stop_reason, StopReason::EndTime);
}

#[test]
fn snapshot_due_without_output_path_is_fatal() {
    let input = temp_stem("nopath_input.vti");
    write_blob_input(&input);

    let settings = SimulationSettings {
        stepping: StepSettings::default(),
        input_path: Some(input),
        output_path: None,
        geometry: None,
    };
    let mut sim = Simulation::new(
        VesselModel::new(stable_vessel_params()),
        RunMode::Standalone,
        settings,
    );
    assert!(sim.run(None).is_err());
}

const CELL_STATE_NAMES: [&str; 6] = [
    "proliferating",
    "quiescent",
    "apoptotic",
    "necrotic",
    "differentiated",
    "tumour",
];

#[test]
fn coupled_vessel_sends_this_steps_nutrient_solution() {
    // The vessel component runs coupled against a scripted cell peer.
    // Step 0: the peer reports an empty domain, so every point is pinned
    // and the nutrient answer is the ambient 40. Step 1: the peer reports
    // live tissue everywhere, so the nutrient the vessel sends back must
    // be the balance solved *from that same step's* cell state.
    let grid = Grid3::new(4, 4, 4, 1.0, [0.0; 3]).unwrap();
    let n = grid.n_points();
    let output = temp_stem("coupled_vessel");

    let (mut vessel_end, mut cell_end) = InMemoryChannel::pair();

    let peer = thread::spawn(move || {
        // Step 0: empty domain.
        for name in CELL_STATE_NAMES {
            cell_end.send(&output_port(name), &vec![0.0; n]).unwrap();
        }
        let step0 = cell_end.receive(&input_port("nutrient")).unwrap();

        // Step 1: fully proliferating domain.
        for name in CELL_STATE_NAMES {
            let values = if name == "proliferating" || name == "tumour" {
                vec![1.0; n]
            } else {
                vec![0.0; n]
            };
            cell_end.send(&output_port(name), &values).unwrap();
        }
        let step1 = cell_end.receive(&input_port("nutrient")).unwrap();
        (step0, step1)
    });

    let settings = SimulationSettings {
        stepping: StepSettings {
            time_increment: 1.0,
            max_steps: 2,
            end_time: 1.0e9,
            output_frequency: 1,
            start_time: 0.0,
        },
        input_path: None,
        output_path: Some(output),
        geometry: Some(grid),
    };
    let mut sim = Simulation::new(
        VesselModel::new(stable_vessel_params()),
        RunMode::Coupled,
        settings,
    );
    let report = sim.run(Some(&mut vessel_end)).unwrap();
    assert_eq!(report.steps_completed, 2);

    let (step0, step1) = peer.join().unwrap();
    assert_eq!(step0.len(), n);
    assert_eq!(step1.len(), n);

    // Step 0: everything healthy, nutrient pinned to ambient everywhere.
    assert!(step0.iter().all(|&v| v == 40.0));

    // Step 1: uniform live tissue, no pinned points. The steady state is
    // uniform with value source/reaction = (40 * 0.25) / (0.25 + 0.001).
    let expected = 10.0 / 0.251;
    for &v in &step1 {
        assert!(
            approx_eq(v, expected, 1e-6),
            "nutrient should reflect this step's cell state: got {}, expected {}",
            v,
            expected
        );
    }
}

#[test]
fn coupled_cell_model_skips_the_first_receive() {
    // The cell component runs coupled against a scripted vessel peer. Its
    // receive policy skips step 0, so the peer's script is: receive the
    // step-0 cell state, then alternate send/receive for step 1.
    let grid = Grid3::new(4, 4, 4, 1.0, [0.0; 3]).unwrap();
    let n = grid.n_points();
    let output = temp_stem("coupled_cell");

    let (mut cell_side, mut vessel_side) = InMemoryChannel::pair();

    let peer = thread::spawn(move || {
        // Step 0: the cell sends without receiving first.
        let mut step0 = Vec::new();
        for name in CELL_STATE_NAMES {
            step0.push(vessel_side.receive(&input_port(name)).unwrap());
        }

        // Step 1: supply a marker nutrient field, then take the update.
        vessel_side
            .send(&output_port("nutrient"), &vec![37.0; n])
            .unwrap();
        let mut step1 = Vec::new();
        for name in CELL_STATE_NAMES {
            step1.push(vessel_side.receive(&input_port(name)).unwrap());
        }
        (step0, step1)
    });

    // Spheroid of radius ~1.6 centred in the domain.
    let initial_volume = (4.0 / 3.0) * std::f64::consts::PI * 1.6f64.powi(3);
    let settings = SimulationSettings {
        stepping: StepSettings {
            time_increment: 1.0,
            max_steps: 2,
            end_time: 1.0e9,
            output_frequency: 1,
            start_time: 0.0,
        },
        input_path: None,
        output_path: Some(output),
        geometry: Some(grid),
    };
    let mut sim = Simulation::new(
        CellModel::new(CellParams {
            proliferation_rate: 1.0,
            initial_volume,
            centre: [1.5, 1.5, 1.5],
        }),
        RunMode::Coupled,
        settings,
    );
    let report = sim.run(Some(&mut cell_side)).unwrap();
    assert_eq!(report.steps_completed, 2);

    let (step0, step1) = peer.join().unwrap();

    // Step 0 carried a painted tumour of the initial radius.
    let tumour0: f64 = step0[5].iter().sum();
    assert!(tumour0 > 0.0);
    for values in &step0 {
        assert_eq!(values.len(), n);
    }

    // The spheroid only grows, and the marker nutrient field landed in the
    // cell's field store before its step-1 update ran.
    let tumour1: f64 = step1[5].iter().sum();
    assert!(tumour1 >= tumour0);
    let fields = sim.fields().unwrap();
    assert!(fields.nutrient.iter().all(|&v| v == 37.0));
    fields.validate().unwrap();
}

#[test]
fn received_vector_with_wrong_length_aborts_the_run() {
    let grid = Grid3::new(3, 3, 3, 1.0, [0.0; 3]).unwrap();
    let output = temp_stem("badlen_run");

    let (mut vessel_end, mut cell_end) = InMemoryChannel::pair();
    let peer = thread::spawn(move || {
        // 26 values against a 27-point grid.
        let _ = cell_end.send(&output_port("proliferating"), &vec![0.0; 26]);
    });

    let settings = SimulationSettings {
        stepping: StepSettings {
            max_steps: 2,
            end_time: 1.0e9,
            ..StepSettings::default()
        },
        input_path: None,
        output_path: Some(output),
        geometry: Some(grid),
    };
    let mut sim = Simulation::new(
        VesselModel::new(stable_vessel_params()),
        RunMode::Coupled,
        settings,
    );
    let err = sim.run(Some(&mut vessel_end)).unwrap_err();
    assert!(err.to_string().contains("proliferating"));
    peer.join().unwrap();
}
