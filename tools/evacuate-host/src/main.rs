use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use log::{error, info};

use host_evacuator::clock::SystemClock;
use host_evacuator::config::EvacuationConfig;
use host_evacuator::extensions::in_memory_cluster::InMemoryCluster;
use host_evacuator::precheck::{ensure_services_down, HostAlert, ProbeState, StateType};
use host_evacuator::{EvacuationReport, Evacuator};

fn init_logger() {
    use env_logger::Builder;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Evacuates VMs from a failed compute host, invoked as monitoring event handler
struct Args {
    /// Hostname of the compute node to evacuate
    compute_host: String,

    /// Current state of the host probe (UP, DOWN, UNREACHABLE or 0, 1, 2)
    state: ProbeState,

    /// Current state type of the host probe (HARD, SOFT)
    state_type: StateType,

    /// Path to YAML file with evacuation configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to YAML file describing the cluster to run against
    #[arg(long)]
    cluster: PathBuf,

    /// Trigger evacuation also when the host is unreachable
    #[arg(long, default_value_t = false)]
    unreachable_is_down: bool,

    /// Path to produced JSON file with evacuation report (printed to stdout if not set)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to produced CSV file with evacuation outcomes
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<EvacuationConfig, String> {
    let mut config = match &args.config {
        Some(path) => EvacuationConfig::from_file(&path.to_string_lossy()).map_err(|e| e.to_string())?,
        None => EvacuationConfig::default(),
    };
    config.unreachable_is_down |= args.unreachable_is_down;
    Ok(config)
}

fn save_report(report: &EvacuationReport, args: &Args) -> Result<(), String> {
    let json = serde_json::to_string_pretty(report).map_err(|e| e.to_string())?;
    match &args.output {
        Some(path) => std::fs::write(path, json).map_err(|e| e.to_string())?,
        None => println!("{}", json),
    }
    if let Some(path) = &args.csv {
        report.save_csv(&path.to_string_lossy()).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn run(args: &Args, config: &EvacuationConfig) -> Result<EvacuationReport, String> {
    let cluster = InMemoryCluster::from_file(&args.cluster.to_string_lossy()).map_err(|e| e.to_string())?;
    ensure_services_down(&cluster, &args.compute_host, &config.compute_services).map_err(|e| e.to_string())?;

    let evacuator =
        Evacuator::new(&cluster, &cluster, config, Rc::new(SystemClock::new())).map_err(|e| e.to_string())?;
    let report = evacuator.evacuate(&args.compute_host).map_err(|e| e.to_string())?;
    save_report(&report, args)?;
    Ok(report)
}

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse();

    let alert = HostAlert::new(&args.compute_host, args.state, args.state_type);
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };
    if !alert.requires_evacuation(config.unreachable_is_down) {
        info!(
            "{} is {} ({:?}), not evacuating",
            args.compute_host, args.state, args.state_type
        );
        return ExitCode::SUCCESS;
    }

    info!("{} is {} and confirmed, evacuating vms", args.compute_host, args.state);
    match run(&args, &config) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            for outcome in report.failures() {
                error!("{}: {}", outcome.vm_name, outcome.detail());
            }
            ExitCode::from(1)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(2)
        }
    }
}
