use fsisim::fsi::{FlappingBeamDriver, FsiConfig, LogFile, StepStatus, LOG_HEADER};
use fsisim::StrError;
use russell_lab::approx_eq;
use std::fs;

const OUT_DIR: &str = "/tmp/fsisim/test_fsi_short_run";
const SAVE_FIGURE: bool = false;

fn short_config() -> FsiConfig {
    let mut config = FsiConfig::new();
    config.refine = 0;
    config.time_step = 0.01;
    config.time_span = 0.03;
    config
}

#[test]
fn test_fsi_short_run() -> Result<(), StrError> {
    let config = short_config();
    let mut driver = FlappingBeamDriver::new(&config)?;
    assert_eq!(driver.n_steps(), 0);
    assert_eq!(driver.sim_time(), 0.0);

    let path = format!("{}/flapping_beam.txt", OUT_DIR);
    let mut log = LogFile::create(&path)?;
    let summary = driver.run(&mut log)?;

    // the initial state plus one record per step
    assert!(summary.completed);
    assert_eq!(summary.stop_reason, "Completed");
    assert_eq!(summary.n_steps, 3);
    approx_eq(summary.sim_time, 0.03, 1e-15);
    assert_eq!(log.records().len(), 4);
    assert_eq!(log.records()[0].sim_time, 0.0);
    assert_eq!(log.records()[0].ale_norm, 0.0);
    assert_eq!(summary.last, log.records()[3]);
    assert!(summary.n_dof_flow > 0 && summary.n_dof_beam > 0 && summary.n_dof_ale > 0);

    // the beam falls along +y (body force per unit volume ρ g) and drags the ALE mesh along
    let last = summary.last;
    assert!(last.disp_a[1] > 0.0);
    assert!(last.ale_norm > 0.0);
    assert!(last.drag.is_finite() && last.lift.is_finite() && last.pressure_diff.is_finite());
    assert!(last.flow_iter >= 1 && last.beam_iter >= 1);
    for k in 1..4 {
        approx_eq(log.records()[k].sim_time, 0.01 * (k as f64), 1e-15);
        assert!(log.records()[k].disp_a[1] > log.records()[k - 1].disp_a[1]);
    }

    // the log file starts with the header and has one line per record
    let contents = fs::read_to_string(&path).map_err(|_| "cannot read file")?;
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(LOG_HEADER.trim_end()));
    assert_eq!(lines.count(), 4);

    // outputs
    summary.write_json(&format!("{}/summary.json", OUT_DIR))?;
    if SAVE_FIGURE {
        log.plot(&format!("{}/flapping_beam.svg", OUT_DIR))?;
    }
    Ok(())
}

#[test]
fn test_fsi_interface_follows_the_mesh() -> Result<(), StrError> {
    let config = short_config();
    let mut driver = FlappingBeamDriver::new(&config)?;
    let record = match driver.step()? {
        StepStatus::Accepted(record) => record,
        StepStatus::Stopped(reason) => panic!("step failed: {:?}", reason),
    };
    approx_eq(record.sim_time, 0.01, 1e-15);
    assert_eq!(driver.n_steps(), 1);

    // the fluid velocity on the interface equals the mesh velocity
    let geometry = driver.geometry();
    let ale = driver.ale();
    let ale_interfaces = geometry.ale_interfaces()?;
    for (k, (_, (f, flow_side))) in geometry.interfaces()?.into_iter().enumerate() {
        let (_, (a, ale_side)) = ale_interfaces[k];
        let fluid = driver.flow().side_fixed_dofs(f, flow_side)?;
        let mesh = ale.velocity().side_values(ale.mesh(), a, ale_side)?;
        assert_eq!(fluid.dims(), mesh.dims());
        let (nrow, ncol) = fluid.dims();
        for i in 0..nrow {
            for j in 0..ncol {
                approx_eq(fluid.get(i, j), mesh.get(i, j), 1e-15);
            }
        }
    }

    // the mesh velocity is the increment over the time step
    for n in 0..ale.velocity().nnode() {
        for c in 0..2 {
            approx_eq(ale.velocity().get(n, c), ale.increment().get(n, c) / 0.01, 1e-12);
        }
    }

    // the flow geometry stays valid and the beam tip moved
    assert_eq!(driver.flow().assembler().check_geometry(), None);
    assert!(record.disp_a[1] > 0.0);
    Ok(())
}

#[test]
fn test_fsi_short_run_captures_errors() {
    let mut config = short_config();
    config.time_step = -0.01;
    assert_eq!(
        FlappingBeamDriver::new(&config).err(),
        Some("cannot allocate FSI driver because config.validate() failed")
    );
    let mut config = short_config();
    config.refine = 7;
    assert_eq!(
        FlappingBeamDriver::new(&config).err(),
        Some("the number of refinements must be ≤ 6")
    );
}
