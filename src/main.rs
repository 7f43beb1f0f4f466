use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use pit_reservation::domain::access::identity::User;
use pit_reservation::domain::registry::probe::{DEFAULT_PROBE_SCRIPT, NodeDescriptor, NodeProbe, SshProbe, assign_indices};
use pit_reservation::domain::registry::registration::{NodeRegistration, register_node};
use pit_reservation::domain::registry::registry::Registry;
use pit_reservation::domain::reservation::summary::summarize;
use pit_reservation::domain::resource::node::{DEFAULT_SSH_PORT, DEFAULT_SSH_USER};
use pit_reservation::domain::resource::resource::JobRef;
use pit_reservation::domain::utils::id::{JobId, NodeId, UserId};
use pit_reservation::loader::parser::write_json_file;
use pit_reservation::{load_registry, load_request, load_reservation, logger};

/// Reserves CPU, GPU and port resources on the nodes of a cluster.
#[derive(Debug, Parser)]
#[command(name = "pit-reserve")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Place a cluster request on the registry.
    Reserve(ReserveArgs),
    /// Print the compact summary of a stored reservation.
    Summarize(SummarizeArgs),
    /// List the registered nodes or describe one of them.
    Nodes(NodesArgs),
    /// Run the probe script on a node and print what it reports.
    Probe(ProbeArgs),
    /// Probe a node and store it in the registry file.
    Register(RegisterArgs),
}

#[derive(Debug, Args)]
struct ReserveArgs {
    /// Registry document (nodes, aliases, groups, users).
    #[arg(long)]
    registry: String,

    /// Cluster request document.
    #[arg(long)]
    request: String,

    /// Id of the requesting user.
    #[arg(long)]
    user: String,

    /// Ignore node state and current jobs.
    #[arg(long)]
    simulation: bool,

    /// Occupy the reserved resources with this job and write the registry back.
    #[arg(long, conflicts_with = "simulation")]
    job: Option<String>,

    /// Write the reservation document to this file.
    #[arg(long)]
    output: Option<String>,
}

#[derive(Debug, Args)]
struct SummarizeArgs {
    /// Reservation document.
    #[arg(long)]
    reservation: String,
}

#[derive(Debug, Args)]
struct NodesArgs {
    #[arg(long)]
    registry: String,

    /// Print the full description of this node as JSON.
    #[arg(long)]
    node: Option<String>,
}

#[derive(Debug, Args)]
struct ProbeTarget {
    /// Shell script piped to the node.
    #[arg(long, default_value = DEFAULT_PROBE_SCRIPT)]
    script: PathBuf,

    /// Probe timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// `NAME=VALUE` pairs exported before the script runs.
    #[arg(long = "env", value_parser = parse_env_pair)]
    env: Vec<(String, String)>,
}

impl ProbeTarget {
    fn probe(&self) -> SshProbe {
        self.env
            .iter()
            .fold(SshProbe::new(self.script.clone()), |probe, (name, value)| probe.with_env(name, value))
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

#[derive(Debug, Args)]
struct ProbeArgs {
    #[arg(long)]
    address: String,

    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    port: u16,

    #[arg(long, default_value = DEFAULT_SSH_USER)]
    ssh_user: String,

    #[command(flatten)]
    target: ProbeTarget,
}

#[derive(Debug, Args)]
struct RegisterArgs {
    #[arg(long)]
    registry: String,

    /// Id of the requesting user, must be an admin.
    #[arg(long)]
    user: String,

    #[arg(long)]
    node: String,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    ssh_user: Option<String>,

    /// Keep only these CUDA device indices, e.g. `0,2`.
    #[arg(long, value_delimiter = ',')]
    cuda_devices: Option<Vec<u32>>,

    #[command(flatten)]
    target: ProbeTarget,
}

fn parse_env_pair(pair: &str) -> std::result::Result<(String, String), String> {
    pair.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", pair))
}

fn find_user(registry: &Registry, user: &str) -> Result<User> {
    registry.get_user(&UserId::new(user)).with_context(|| format!("unknown user '{}'", user))
}

fn reserve(args: ReserveArgs) -> Result<()> {
    let registry = load_registry(&args.registry).with_context(|| format!("failed to load registry '{}'", args.registry))?;
    let request = load_request(&args.request).with_context(|| format!("failed to load request '{}'", args.request))?;
    let user = find_user(&registry, &args.user)?;

    let reservation = match &args.job {
        Some(job) => {
            let reservation = registry.reserve_and_occupy(&request, &user, &JobRef::new(JobId::new(job.as_str())))?;
            write_json_file(&args.registry, &registry.to_dto()?)?;
            reservation
        }
        None => registry.reserve_cluster(&request, &user, args.simulation)?,
    };

    println!("{}", summarize(Some(&reservation)).green());
    if let Some(output) = &args.output {
        write_json_file(output, &reservation.to_dto())?;
        log::info!("Reservation written to '{}'.", output);
    }
    Ok(())
}

fn summarize_file(args: SummarizeArgs) -> Result<()> {
    let reservation = load_reservation(&args.reservation).with_context(|| format!("failed to load reservation '{}'", args.reservation))?;
    println!("{}", summarize(Some(&reservation)));
    Ok(())
}

fn nodes(args: NodesArgs) -> Result<()> {
    let registry = load_registry(&args.registry)?;

    if let Some(node) = &args.node {
        let dto = registry.describe_node(&NodeId::new(node.as_str()))?;
        println!("{}", serde_json::to_string_pretty(&dto)?);
        return Ok(());
    }

    let snapshot = registry.snapshot()?;
    for node in snapshot.catalog.nodes() {
        let state = if node.is_online() { node.state.to_string().green() } else { node.state.to_string().red() };
        println!("{} {}@{}:{} {} ({} resources)", node.id.to_string().bold(), node.ssh_user, node.address, node.port, state, node.resources().len());
        for (key, count) in node.inventory() {
            println!("    {} x {} {}", count, key.typ, key.name);
        }
    }
    Ok(())
}

async fn probe(args: ProbeArgs) -> Result<()> {
    let descriptor = NodeDescriptor { id: NodeId::new(args.address.as_str()), address: args.address, port: args.port, ssh_user: args.ssh_user };
    let discoveries = args.target.probe().probe(&descriptor).await?;

    for resource in assign_indices(discoveries) {
        println!("{} {}", resource.id().to_string().bold(), resource.name);
    }
    Ok(())
}

async fn register(args: RegisterArgs) -> Result<()> {
    let registry = load_registry(&args.registry)?;
    let user = find_user(&registry, &args.user)?;

    let mut registration = NodeRegistration::new(NodeId::new(args.node.as_str()));
    registration.address = args.address.clone();
    registration.port = args.port;
    registration.ssh_user = args.ssh_user.clone();
    registration.cuda_devices = args.cuda_devices.clone();

    let node = register_node(&registry, &args.target.probe(), &user, registration).await?;
    write_json_file(&args.registry, &registry.to_dto()?)?;

    println!("{} registered with {} resources.", node.id.to_string().green(), node.resources().len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init();

    let result = match cli.command {
        Commands::Reserve(args) => reserve(args),
        Commands::Summarize(args) => summarize_file(args),
        Commands::Nodes(args) => nodes(args),
        Commands::Probe(args) => probe(args).await,
        Commands::Register(args) => register(args).await,
    };

    if let Err(e) = &result {
        log::error!("{:#}", e);
        eprintln!("{} {:#}", "error:".red().bold(), e);
    }
    result
}
