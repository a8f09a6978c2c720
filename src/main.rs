use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use osops::config::{AuthConfig, Config, WaitConfig};
use osops::openstack::client::{format_api_error, OsClient};
use osops::ops::{port, volume, OpContext, RuntimeProperties};
use osops::resource::{
    get_all_resource_kinds, get_resource, Ownership, Reconciler, ResourceError, RestProvider,
    StateWaiter, WaitSpec,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// OpenStack volume and port operations
#[derive(Parser, Debug)]
#[command(name = "osops", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Keystone v3 URL (overrides OS_AUTH_URL)
    #[arg(long, global = true)]
    auth_url: Option<String>,

    /// Project to scope the token to (overrides OS_PROJECT_NAME)
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Region used for catalog lookups (overrides OS_REGION_NAME)
    #[arg(short, long, global = true)]
    region: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Block storage volumes
    Volume {
        #[command(subcommand)]
        action: VolumeCommand,
    },
    /// Network ports
    Port {
        #[command(subcommand)]
        action: PortCommand,
    },
    /// List the resource kinds this build knows about
    Kinds,
    /// Show the effective configuration, optionally saving the given flags
    Config {
        /// Write --auth-url/--project/--region into the config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand, Debug)]
enum VolumeCommand {
    /// Create or adopt a volume and wait until it is available
    Create {
        #[command(flatten)]
        node: NodeArgs,
        /// Device name to record for later attachment
        #[arg(long)]
        device_name: Option<String>,
        /// Size in GB of a new volume
        #[arg(long)]
        size: Option<u64>,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Delete a volume created by `volume create`
    Delete {
        #[command(flatten)]
        node: NodeArgs,
        /// Runtime properties JSON printed by `volume create`
        #[arg(long)]
        runtime: String,
    },
    /// Poll a volume until it reaches a status
    Wait {
        /// Volume id or name
        volume: String,
        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Show the attachment of a volume to a server
    Attachment {
        /// Volume id or name
        volume: String,
        /// Server id
        #[arg(long)]
        server: String,
    },
}

#[derive(Subcommand, Debug)]
enum PortCommand {
    /// Create or adopt a port
    Create {
        #[command(flatten)]
        node: NodeArgs,
        /// Network the port belongs to
        #[arg(long)]
        network: Option<String>,
    },
    /// Delete a port created by `port create`
    Delete {
        #[command(flatten)]
        node: NodeArgs,
        /// Runtime properties JSON printed by `port create`
        #[arg(long)]
        runtime: String,
    },
    /// Add a security group to a port
    ConnectSecurityGroup {
        /// Runtime properties JSON printed by `port create`
        #[arg(long)]
        runtime: String,
        /// Security group id
        #[arg(long)]
        security_group: String,
        /// Both ends are external: only check the group is already on the port
        #[arg(long)]
        external: bool,
    },
}

/// Node properties, from a YAML file and/or flags (flags win)
#[derive(clap::Args, Debug)]
struct NodeArgs {
    /// YAML file with the node properties
    #[arg(long)]
    properties: Option<PathBuf>,
    /// Name of the new resource, or id/name of the existing one
    #[arg(long)]
    resource_id: Option<String>,
    /// Adopt an existing resource instead of creating one
    #[arg(long)]
    use_external_resource: bool,
}

impl NodeArgs {
    fn load<T: DeserializeOwned>(&self) -> Result<T> {
        load_properties(self.properties.as_deref())
    }

    fn apply(&self, resource_id: &mut String, use_external_resource: &mut bool) {
        if let Some(id) = &self.resource_id {
            *resource_id = id.clone();
        }
        if self.use_external_resource {
            *use_external_resource = true;
        }
    }
}

#[derive(clap::Args, Debug)]
struct WaitArgs {
    /// Status to wait for (defaults to the kind's ready status)
    #[arg(long)]
    status: Option<String>,
    /// Maximum number of status checks
    #[arg(long)]
    attempts: Option<NonZeroU32>,
    /// Seconds between status checks
    #[arg(long)]
    interval: Option<f64>,
}

impl WaitArgs {
    fn spec(&self, defaults: &WaitConfig, ready_status: &str) -> Result<WaitSpec> {
        let mut spec = defaults.spec(self.status.as_deref().unwrap_or(ready_status));
        if let Some(attempts) = self.attempts {
            spec.max_attempts = attempts;
        }
        if let Some(interval) = self.interval {
            spec.interval = Duration::try_from_secs_f64(interval)
                .with_context(|| format!("Invalid interval: {}", interval))?;
        }
        Ok(spec)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled: cannot open {:?}: {}", log_path, e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("osops {} started with log level: {:?}", osops::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("osops").join("osops.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".osops").join("osops.log");
    }
    PathBuf::from("osops.log")
}

/// Read node properties from YAML; no file means all defaults
fn load_properties<T: DeserializeOwned>(path: Option<&Path>) -> Result<T> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read properties file {:?}", path))?,
        None => "{}".to_string(),
    };
    serde_yaml::from_str(&content).context("Failed to parse node properties")
}

fn parse_runtime(raw: &str) -> Result<RuntimeProperties> {
    serde_json::from_str(raw).context("Runtime properties must be a JSON object")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// User-facing message; API failures are mapped to short hints
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ResourceError>() {
        Some(ResourceError::Provider(inner)) => format_api_error(inner),
        Some(resource_err) => resource_err.to_string(),
        None => format_api_error(err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", describe_error(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    if let Command::Kinds = args.command {
        for kind in get_all_resource_kinds() {
            let display_name = get_resource(kind).map_or("", |def| def.display_name.as_str());
            println!("{}\t{}", kind, display_name);
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_explicit(path)?,
        None => Config::load(),
    };
    let cli_auth = AuthConfig {
        auth_url: args.auth_url,
        project_name: args.project,
        region: args.region,
        ..Default::default()
    };

    if let Command::Config { save } = args.command {
        config.auth = config.auth.overlay(cli_auth);
        if save {
            match &args.config {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            tracing::info!("Configuration saved");
        }
        return print_json(&config);
    }

    let settings = config.effective_auth(cli_auth)?;

    tracing::info!(
        "Using project: {}, region: {}",
        settings.project_name,
        settings.region.as_deref().unwrap_or("any")
    );

    let client = OsClient::new(settings)?;

    match args.command {
        Command::Volume { action } => run_volume(action, client, &config).await,
        Command::Port { action } => run_port(action, client).await,
        Command::Kinds | Command::Config { .. } => Ok(()),
    }
}

async fn run_volume(action: VolumeCommand, client: OsClient, config: &Config) -> Result<()> {
    let provider = RestProvider::new(client, "volume")?;
    let def = provider.definition();
    let ctx = OpContext::new(&provider, def);
    let ready_status = def.ready_status.as_deref().unwrap_or("available");

    match action {
        VolumeCommand::Create {
            node,
            device_name,
            size,
            wait,
        } => {
            let mut props: volume::VolumeProperties = node.load()?;
            node.apply(&mut props.resource_id, &mut props.use_external_resource);
            if let Some(device_name) = device_name {
                props.device_name = device_name;
            }
            if let Some(size) = size {
                props.volume.insert("size".to_string(), size.into());
            }

            let spec = wait.spec(&config.wait, ready_status)?;
            tracing::info!(
                "Waiting up to {:?} for volume to become '{}'",
                spec.max_wait(),
                spec.target_status
            );
            let runtime = volume::create(&ctx, &props, &spec).await?;
            print_json(&runtime)
        }
        VolumeCommand::Delete { node, runtime } => {
            let mut props: volume::VolumeProperties = node.load()?;
            node.apply(&mut props.resource_id, &mut props.use_external_resource);
            let mut runtime = parse_runtime(&runtime)?;

            volume::delete(&ctx, &props, &mut runtime).await?;
            print_json(&runtime)
        }
        VolumeCommand::Wait { volume, wait } => {
            let spec = wait.spec(&config.wait, ready_status)?;
            let handle = Reconciler::new(&provider)
                .name_field(&def.name_field)
                .resolve(&volume)
                .await?;
            let outcome = StateWaiter::new(&provider, &def.error_statuses)
                .wait_until(&handle.id, &spec)
                .await?;

            print_json(&serde_json::json!({
                "id": outcome.handle.id,
                "status": outcome.handle.status,
                "reached_target": outcome.reached_target,
            }))
        }
        VolumeCommand::Attachment { volume, server } => {
            let attachment = volume::get_attachment(&ctx, &volume, &server).await?;
            print_json(&attachment)
        }
    }
}

async fn run_port(action: PortCommand, client: OsClient) -> Result<()> {
    let provider = RestProvider::new(client, "port")?;
    let ctx = OpContext::new(&provider, provider.definition());

    match action {
        PortCommand::Create { node, network } => {
            let mut props: port::PortProperties = node.load()?;
            node.apply(&mut props.resource_id, &mut props.use_external_resource);

            let runtime = port::create(&ctx, &props, network.as_deref()).await?;
            print_json(&runtime)
        }
        PortCommand::Delete { node, runtime } => {
            let mut props: port::PortProperties = node.load()?;
            node.apply(&mut props.resource_id, &mut props.use_external_resource);
            let mut runtime = parse_runtime(&runtime)?;

            port::delete(&ctx, &props, &mut runtime).await?;
            print_json(&runtime)
        }
        PortCommand::ConnectSecurityGroup {
            runtime,
            security_group,
            external,
        } => {
            let runtime = parse_runtime(&runtime)?;
            port::connect_security_group(
                &ctx,
                &runtime,
                &security_group,
                Ownership::from_external(external),
            )
            .await?;
            print_json(&runtime)
        }
    }
}
