use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rustpower_sedata::basic::solver::DefaultSolver;
use rustpower_sedata::io::pandapower::{self, Network};
use rustpower_sedata::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Measurement datasets for power-system state estimation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the measurement selection template of a network.
    Template(TemplateArgs),

    /// Build and write the DC sensitivity matrix.
    #[clap(name = "hmatrix")]
    HMatrix(HArgs),

    /// Solve the base case, generate measurements and scenario datasets.
    Generate(GenerateArgs),

    /// Power flow
    #[clap(name = "pf")]
    PowerFlow(PfArgs),
}

#[derive(Args)]
struct TemplateArgs {
    /// Pandapower case: CSV folder, zipped CSV folder or JSON file.
    #[arg(required = true)]
    input: PathBuf,

    /// Output file
    #[arg(short, long, default_value = "meas_template.csv")]
    output: PathBuf,
}

#[derive(Args)]
struct HArgs {
    #[arg(required = true)]
    input: PathBuf,

    #[arg(short, long, default_value = "h_all.csv")]
    output: PathBuf,

    /// Use the truncated line impedance base.
    #[arg(long, default_value_t = false)]
    truncated: bool,
}

#[derive(Args)]
struct GenerateArgs {
    #[arg(required = true)]
    input: PathBuf,

    /// Output directory for all artifacts.
    #[arg(short, long, default_value = "dataset")]
    output: PathBuf,

    /// JSON run configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Curated measurement template; the default selection is used otherwise.
    #[arg(short, long)]
    template: Option<PathBuf>,

    /// Overrides the configured number of clean scenarios.
    #[arg(short, long)]
    n_scenarios: Option<usize>,

    /// Overrides the configured seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct PfArgs {
    #[arg(required = true)]
    input: PathBuf,

    /// Linearized DC power flow.
    #[arg(long, default_value_t = false)]
    dc: bool,

    /// Termination tolerance on per unit P & Q mismatch.
    #[arg(long, default_value_t = 1e-8)]
    tol: f64,

    /// Maximum number of iterations.
    #[arg(long, default_value_t = 100)]
    max_it: usize,
}

fn load_network(path: &Path) -> Result<Network> {
    let net = if path.is_dir() {
        pandapower::load_csv_folder(path)
    } else if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("zip")) {
        pandapower::load_csv_zip(path)
    } else {
        pandapower::load_pandapower_json(path)
    };
    let net = net.with_context(|| format!("loading network from {}", path.display()))?;
    net.validate()?;
    info!(
        buses = net.n_buses(),
        lines = net.lines().len(),
        trafos = net.trafos().len(),
        loads = net.loads().len(),
        "network loaded"
    );
    Ok(net)
}

fn template(args: &TemplateArgs) -> Result<()> {
    let net = load_network(&args.input)?;
    let t = gen_meas_picker(&net);
    t.write_csv(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(rows = t.len(), path = %args.output.display(), "template written");
    Ok(())
}

fn hmatrix(args: &HArgs) -> Result<()> {
    let net = load_network(&args.input)?;
    let base = if args.truncated {
        ImpedanceBase::Truncated
    } else {
        ImpedanceBase::Exact
    };
    let h = gen_h4all(&net, base)?;
    h.write_csv(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    info!(rows = h.rows().len(), cols = h.n_buses(), "sensitivity matrix written");
    Ok(())
}

fn power_flow(args: &PfArgs) -> Result<()> {
    let net = load_network(&args.input)?;
    let res = if args.dc {
        DcPowerFlow::default().solve(&net)?
    } else {
        NewtonEngine::<DefaultSolver>::new(args.tol, args.max_it).solve(&net)?
    };
    info!(iterations = res.iterations, "power flow solved");
    println!("{}", res.bus_table());
    if !net.lines().is_empty() {
        println!("{}", res.line_table(&net));
    }
    if !net.trafos().is_empty() {
        println!("{}", res.trafo_table(&net));
    }
    Ok(())
}

fn generate(args: &GenerateArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::load(path).with_context(|| format!("reading {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(n) = args.n_scenarios {
        cfg.n_l_scenarios = n;
    }
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }
    cfg.validate()?;
    let mode = cfg.noise_mode()?;
    fs::create_dir_all(&args.output)?;
    let out = |name: &str| args.output.join(name);

    let engine = NewtonEngine::<DefaultSolver>::new(cfg.tolerance, cfg.max_iter);
    let mut base = Grid::from(load_network(&args.input)?);
    base.solve(&engine).context("base case power flow")?;

    let template = match &args.template {
        Some(path) => MeasTemplate::read_csv(path).with_context(|| format!("reading {}", path.display()))?,
        None => gen_meas_picker(&base.net),
    };
    template.write_csv(out("meas_template.csv"))?;

    let h = gen_h4all(&base.net, cfg.impedance_base)?;
    h.write_csv(out("h_all.csv"))?;
    let matrices = gen_meas(&mut base, &template, &h, cfg.inst_err)?;
    matrices.write_csv(&args.output)?;
    info!(measurements = base.measurement.len(), "base measurements generated");

    let mut rng = match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let threads = if cfg.parallel { 0 } else { 1 };
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    let clean = pool.install(|| gen_clean_scen_unfrm(&base, cfg.n_l_scenarios, &cfg.set_id, &engine, &mut rng))?;

    meas2features(&clean).write_csv(out("clean_meas.csv"))?;
    pf_states2features(&clean)?.write_csv(out("pf_states.csv"))?;

    let dc = DcPowerFlow { base: cfg.impedance_base };
    let mut dc_set = clean.clone();
    for grid in dc_set.grids.iter_mut() {
        grid.solve(&dc)?;
    }
    pfdc_states2features(&dc_set)?.write_csv(out("pfdc_states.csv"))?;

    let mut noisy = duplicate_scenarios(&clean, cfg.rpt_per_elmnt);
    gen_noisy_meas(&mut noisy.grids, mode, &mut rng)?;
    meas2features(&noisy).write_csv(out("noisy_meas.csv"))?;

    info!(
        clean = clean.len(),
        noisy = noisy.len(),
        failed = clean.failed.len(),
        dir = %args.output.display(),
        "dataset written"
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Template(args) => template(args),
        Commands::HMatrix(args) => hmatrix(args),
        Commands::Generate(args) => generate(args),
        Commands::PowerFlow(args) => power_flow(args),
    }
}
