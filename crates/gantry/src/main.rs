mod logging;
mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gantry_core::config::module::Implementation;
use gantry_core::kernel::constants;
use gantry_core::kernel::error::{Error, KernelLifecyclePhase, Result};
use gantry_core::remote::{RemoteClient, RemoteLocation};
use gantry_tcp::{TCP_SCHEME, TcpServer, TcpTransport};
use log::{error, info, warn};

/// Gantry: a dependency-injection service kernel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Extra active profile, added to those in GANTRY_PROFILES
    #[arg(long = "profile", global = true)]
    profiles: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the module graph and print the start order without starting anything
    Check {
        /// Primary configuration file
        #[arg(default_value = constants::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Directory of override files merged after the primary file
        #[arg(long)]
        override_dir: Option<PathBuf>,
    },
    /// Start every service and run until Ctrl-C
    Run {
        /// Primary configuration file
        #[arg(default_value = constants::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Directory of override files merged after the primary file
        #[arg(long)]
        override_dir: Option<PathBuf>,
        /// Serve this kernel's services to remote callers on the given address
        #[arg(long, num_args = 0..=1, default_missing_value = constants::DEFAULT_LISTEN_ADDR)]
        listen: Option<String>,
        /// Stop again right after a successful start
        #[arg(long)]
        once: bool,
    },
    /// Check that a remote service exists and accepts calls
    Probe {
        /// Address of the remote kernel, e.g. tcp://127.0.0.1:7700
        url: String,
        /// Qualified service name inside the remote kernel
        service: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let args = CliArgs::parse();

    match dispatch(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(args: CliArgs) -> Result<()> {
    let profiles = active_profiles(args.profiles);
    match args.command {
        Commands::Check { config, override_dir } => check(&config, override_dir, profiles),
        Commands::Run {
            config,
            override_dir,
            listen,
            once,
        } => run(&config, override_dir, listen, once, profiles).await,
        Commands::Probe { url, service } => probe(url, service).await,
    }
}

/// Profiles from `GANTRY_PROFILES` followed by the `--profile` flags.
fn active_profiles(flags: Vec<String>) -> Vec<String> {
    let from_env = std::env::var(constants::PROFILES_ENV).unwrap_or_default();
    from_env
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .chain(flags)
        .collect()
}

/// Explicit flag, then `GANTRY_OVERRIDE_DIR`, then `gantry.d` next to the
/// primary file when it exists.
fn override_dir(config: &Path, flag: Option<PathBuf>) -> Option<PathBuf> {
    flag.or_else(|| std::env::var_os(constants::OVERRIDE_DIR_ENV).map(PathBuf::from))
        .or_else(|| {
            let dir = config
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(constants::DEFAULT_OVERRIDE_DIR);
            dir.is_dir().then_some(dir)
        })
}

fn check(config: &Path, override_flag: Option<PathBuf>, profiles: Vec<String>) -> Result<()> {
    let kernel = services::kernel_builder(profiles).build();
    let loader = kernel.loader(config, override_dir(config, override_flag).as_deref())?;
    let modules = kernel.load(&loader)?;
    let graph = kernel.plan(&modules)?;

    println!("Start order ({} services):", graph.len());
    for (position, node) in graph.ordered().enumerate() {
        let origin = match &node.definition.implementation {
            Implementation::Local { type_name, .. } => format!("type {}", type_name),
            Implementation::Remote(location) => format!("remote {}", location),
        };
        println!("  {}. {} ({})", position + 1, node.name(), origin);
    }
    Ok(())
}

async fn run(
    config: &Path,
    override_flag: Option<PathBuf>,
    listen: Option<String>,
    once: bool,
    profiles: Vec<String>,
) -> Result<()> {
    let mut kernel = services::kernel_builder(profiles).build();
    kernel
        .start(config, override_dir(config, override_flag).as_deref())
        .await?;
    println!("Started {} service(s)", kernel.start_order().len());

    let server = match listen {
        Some(addr) => match TcpServer::bind(&addr, kernel.dispatcher()).await.and_then(TcpServer::spawn) {
            Ok(handle) => {
                println!("Listening on {}", handle.url());
                Some(handle)
            }
            Err(e) => {
                let report = kernel.stop().await;
                if !report.is_clean() {
                    warn!("{} service(s) failed to stop", report.failures.len());
                }
                return Err(e.into());
            }
        },
        None => None,
    };

    if !once {
        info!("Running; press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| Error::lifecycle(KernelLifecyclePhase::Shutdown, format!("waiting for Ctrl-C failed: {}", e)))?;
    }

    if let Some(handle) = server {
        if let Err(e) = handle.shutdown().await {
            warn!("Server shutdown: {}", e);
        }
    }
    let report = kernel.stop().await;
    for (service, err) in &report.failures {
        eprintln!("Failed to stop '{}': {}", service, err);
    }
    println!("Stopped {} service(s)", report.stopped.len());
    if report.is_clean() {
        Ok(())
    } else {
        Err(Error::Other(format!("{} service(s) failed to stop", report.failures.len())))
    }
}

async fn probe(url: String, service: String) -> Result<()> {
    let location = RemoteLocation::new(url, service, "probe");
    if location.scheme() != TCP_SCHEME {
        return Err(Error::Other(format!(
            "unsupported scheme '{}', expected {}://",
            location.scheme(),
            TCP_SCHEME
        )));
    }
    let client = RemoteClient::new(location.clone(), Arc::new(TcpTransport::new()));
    client.probe().await?;
    println!("{} is reachable", location);
    Ok(())
}
