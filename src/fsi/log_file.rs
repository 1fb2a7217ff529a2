use crate::StrError;
use plotpy::{Curve, Plot};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Defines the header of the log file
pub const LOG_HEADER: &str =
    "# simTime drag lift pressureDiff dispAx dispAy aleNorm aleTime flowTime beamTime flowIter beamIter";

/// Holds the quantities of interest of one time step
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct LogRecord {
    /// Simulation time
    pub sim_time: f64,

    /// Force on the obstacle and the beam along x
    pub drag: f64,

    /// Force on the obstacle and the beam along y
    pub lift: f64,

    /// Pressure at the front of the obstacle minus pressure at the tip of the beam
    pub pressure_diff: f64,

    /// Displacement of the tip of the beam (point A)
    pub disp_a: [f64; 2],

    /// L2 norm of the ALE displacement
    pub ale_norm: f64,

    /// Accumulated wall time of the ALE stage (seconds)
    pub ale_time: f64,

    /// Accumulated wall time of the flow stage (seconds)
    pub flow_time: f64,

    /// Accumulated wall time of the beam stage (seconds)
    pub beam_time: f64,

    /// Number of iterations of the last flow step
    pub flow_iter: usize,

    /// Number of iterations of the last beam step
    pub beam_iter: usize,
}

impl LogRecord {
    /// Returns the space-separated line written to the log file
    pub fn line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {} {} {} {}",
            self.sim_time,
            self.drag,
            self.lift,
            self.pressure_diff,
            self.disp_a[0],
            self.disp_a[1],
            self.ale_norm,
            self.ale_time,
            self.flow_time,
            self.beam_time,
            self.flow_iter,
            self.beam_iter
        )
    }
}

/// Writes the time history of the quantities of interest
///
/// Each line is flushed immediately; hence, the file is complete up to the last accepted step
/// even if the simulation stops early.
pub struct LogFile {
    writer: BufWriter<File>,
    records: Vec<LogRecord>,
}

impl LogFile {
    /// Creates the file and writes the header
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn create<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let file = File::create(&path).map_err(|_| "cannot create file")?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", LOG_HEADER).map_err(|_| "cannot write file")?;
        Ok(LogFile {
            writer,
            records: Vec::new(),
        })
    }

    /// Appends a record
    pub fn write(&mut self, record: &LogRecord) -> Result<(), StrError> {
        writeln!(self.writer, "{}", record.line()).map_err(|_| "cannot write file")?;
        self.writer.flush().map_err(|_| "cannot flush file")?;
        self.records.push(*record);
        Ok(())
    }

    /// Returns all records written so far
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Plots drag, lift and the displacement of point A versus time (SVG)
    pub fn plot<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        if self.records.len() < 2 {
            return Err("at least two records are needed to plot the history");
        }
        let tt: Vec<_> = self.records.iter().map(|r| r.sim_time).collect();
        let drag: Vec<_> = self.records.iter().map(|r| r.drag).collect();
        let lift: Vec<_> = self.records.iter().map(|r| r.lift).collect();
        let ux: Vec<_> = self.records.iter().map(|r| r.disp_a[0]).collect();
        let uy: Vec<_> = self.records.iter().map(|r| r.disp_a[1]).collect();

        let mut curve_drag = Curve::new();
        let mut curve_lift = Curve::new();
        let mut curve_ux = Curve::new();
        let mut curve_uy = Curve::new();
        curve_drag.set_label("drag").draw(&tt, &drag);
        curve_lift.set_label("lift").set_line_color("#cd0000").draw(&tt, &lift);
        curve_ux.set_label("$u_x(A)$").draw(&tt, &ux);
        curve_uy.set_label("$u_y(A)$").set_line_color("#cd0000").draw(&tt, &uy);

        let mut plot = Plot::new();
        plot.set_gaps(0.35, 0.0)
            .set_subplot(1, 2, 1)
            .set_title("Force on the structure")
            .add(&curve_drag)
            .add(&curve_lift)
            .grid_labels_legend("time", "force");
        plot.set_subplot(1, 2, 2)
            .set_title("Displacement of the beam tip")
            .add(&curve_ux)
            .add(&curve_uy)
            .grid_labels_legend("time", "displacement");
        plot.set_figure_size_points(800.0, 300.0).save(full_path)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
