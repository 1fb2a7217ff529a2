use fsisim::fsi::{FlappingBeamDriver, FsiConfig, LogFile};
use fsisim::StrError;
use simple_logger::SimpleLogger;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "flapping_beam",
    about = "Runs the one-way fluid-structure interaction benchmark with a flapping beam"
)]
struct Options {
    /// Gravitational acceleration acting on the beam
    #[structopt(short = "l", long)]
    load: Option<f64>,

    /// Average inflow velocity
    #[structopt(short = "m", long)]
    mean_velocity: Option<f64>,

    /// Fluid kinematic viscosity
    #[structopt(short = "v", long)]
    viscosity: Option<f64>,

    /// Local stiffening degree for the ALE mesh
    #[structopt(short = "x", long)]
    chi: Option<f64>,

    /// Number of uniform refinements
    #[structopt(short = "r", long)]
    refine: Option<usize>,

    /// Time span
    #[structopt(short = "t", long)]
    time: Option<f64>,

    /// Time step
    #[structopt(short = "s", long)]
    step: Option<f64>,

    /// Theta of the flow scheme: 0 = explicit Euler, 0.5 = Crank-Nicolson, 1 = implicit Euler
    #[structopt(short = "f", long)]
    theta_fluid: Option<f64>,

    /// Uses Newton iterations for the flow instead of the IMEX scheme
    #[structopt(short = "i", long)]
    newton: bool,

    /// Uses large time steps during the warm-up phase
    #[structopt(short = "w", long)]
    warm_up: bool,

    /// Number of sampling points per patch (0 = no plotting)
    #[structopt(short = "p", long)]
    points: Option<usize>,

    /// Reads the configuration from a JSON file (command line options take precedence)
    #[structopt(short = "c", long)]
    config: Option<String>,

    /// Output directory
    #[structopt(short = "o", long, default_value = "/tmp/fsisim/flapping_beam")]
    out_dir: String,

    /// Prints debug messages
    #[structopt(long)]
    verbose: bool,
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();
    let level = if options.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(level)
        .init()
        .map_err(|_| "cannot initialize the logger")?;

    // configuration
    let mut config = match &options.config {
        Some(path) => FsiConfig::read_json(path)?,
        None => FsiConfig::new(),
    };
    if let Some(v) = options.load {
        config.loading = v;
    }
    if let Some(v) = options.mean_velocity {
        config.mean_velocity = v;
    }
    if let Some(v) = options.viscosity {
        config.viscosity = v;
    }
    if let Some(v) = options.chi {
        config.mesh_stiffening = v;
    }
    if let Some(v) = options.refine {
        config.refine = v;
    }
    if let Some(v) = options.time {
        config.time_span = v;
    }
    if let Some(v) = options.step {
        config.time_step = v;
    }
    if let Some(v) = options.theta_fluid {
        config.theta = v;
    }
    if let Some(v) = options.points {
        config.n_plot_points = v;
    }
    config.newton = config.newton || options.newton;
    config.warm_up = config.warm_up || options.warm_up;
    println!("{}", config);
    config.write_json(&format!("{}/config.json", options.out_dir))?;

    // run
    let mut driver = FlappingBeamDriver::new(&config)?;
    let path_log = format!("{}/flapping_beam.txt", options.out_dir);
    let mut log = LogFile::create(&path_log)?;
    let summary = driver.run(&mut log)?;
    summary.write_json(&format!("{}/summary.json", options.out_dir))?;
    if config.n_plot_points > 0 && log.records().len() > 1 {
        log.plot(&format!("{}/flapping_beam.svg", options.out_dir))?;
    }

    // message
    let thin_line = format!("{:─^1$}", "", path_log.len());
    println!("\n\n{}", thin_line);
    if summary.completed {
        println!("simulation complete after {} steps; the log file is:", summary.n_steps);
    } else {
        println!("simulation stopped ({}); the log file is:", summary.stop_reason);
    }
    println!("{}", path_log);
    println!("{}\n\n", thin_line);
    Ok(())
}
