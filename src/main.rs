use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use polyglow::animations::{boot_sweep, builtin_animations};
use polyglow::config::{read_forced_animation, read_shape_selection, RuntimeConfig};
use polyglow::core::{
    AnimationRegistry, AnimationSupervisor, ProximityFilter, SensorPoller, SharedState, StopSignal,
};
use polyglow::geometry::Geometry;
use polyglow::hal::{MemorySink, SharedSink, SimulatedSensor};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// polyglow - animation runtime for addressable-LED sculptures
#[derive(Parser, Debug, Clone)]
#[command(name = "polyglow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory holding shape.txt, shapes/ and the optional
    /// control files
    #[arg(short = 'D', long = "data-dir", value_name = "DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Configuration file (defaults are used when absent)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// List registered animations and exit
    #[arg(short = 'l', long = "list")]
    list_animations: bool,

    /// Debug verbosity level (0=quiet, 1=info, 2=debug, 3=trace)
    #[arg(short = 'd', long = "debug", value_name = "LEVEL", default_value = "0")]
    debug: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger with verbosity based on -d/--debug flag
    let log_level = match cli.debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // Allow RUST_LOG to override CLI setting
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    warn!("Starting polyglow v{}", env!("CARGO_PKG_VERSION"));

    let registry = Arc::new(AnimationRegistry::discover(builtin_animations()));
    for err in registry.load_errors() {
        warn!("skipped animation during discovery: {err}");
    }

    if cli.list_animations {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from_path(path)?,
        None => {
            let default_path = cli.data_dir.join("config.json");
            match RuntimeConfig::load_from_path(&default_path) {
                Ok(config) => {
                    info!("loaded configuration from {}", default_path.display());
                    config
                }
                Err(err) => {
                    warn!("using default configuration: {err:#}");
                    RuntimeConfig::default()
                }
            }
        }
    };

    let shape_name = read_shape_selection(&cli.data_dir)?;
    let shape_path = cli.data_dir.join("shapes").join(format!("{shape_name}.json"));
    let geometry = Arc::new(
        Geometry::load(&shape_path)
            .with_context(|| format!("failed to load shape `{shape_name}`"))?,
    );
    info!(
        "shape `{}`: {} faces, {} LEDs, {} sensors",
        geometry.name,
        geometry.num_faces,
        geometry.led_count(),
        geometry.sensor_count
    );

    let forced = read_forced_animation(&cli.data_dir)?;
    if let Some(name) = &forced {
        info!("animation override requested: `{name}`");
    }

    let state = Arc::new(SharedState::new());
    let filter = Arc::new(ProximityFilter::new(config.filter, geometry.sensor_count));
    let sink = SharedSink::new(MemorySink::new(geometry.led_count()));

    boot_sweep(&sink, Duration::from_secs(1)).await?;

    let sensor = SimulatedSensor::new(config.simulated_sensors.max(geometry.sensor_count));
    let poller = SensorPoller::new(Box::new(sensor), filter.clone(), state.clone(), config.poller);
    let poller_stop = StopSignal::new();
    let poller_task = tokio::spawn(poller.run(poller_stop.clone()));

    let supervisor = AnimationSupervisor::new(
        registry,
        sink,
        geometry,
        state,
        filter,
        config.supervisor_config(forced),
    );
    let supervisor_stop = StopSignal::new();

    let result = match config.max_uptime() {
        Some(max_uptime) => {
            let run = supervisor.run(supervisor_stop.clone());
            tokio::pin!(run);
            tokio::select! {
                result = &mut run => result,
                _ = tokio::time::sleep(max_uptime) => {
                    warn!("maximum uptime of {max_uptime:?} reached, shutting down for restart");
                    supervisor_stop.trigger();
                    run.await
                }
            }
        }
        None => supervisor.run(supervisor_stop).await,
    };

    poller_stop.trigger();
    let _ = poller_task.await;
    result
}
