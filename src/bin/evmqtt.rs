// evmqtt CLI
// Publishes input device key events to MQTT until SIGINT or SIGTERM

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "pure-rust")]
use anyhow::Context;
#[cfg(feature = "pure-rust")]
use clap::Parser;

#[cfg(feature = "pure-rust")]
use evmqtt_core::discovery;
#[cfg(feature = "pure-rust")]
use evmqtt_core::{
    Config, EvdevProvider, GatewayController, GatewayError, MqttSettings, MqttTransport,
    Transport,
};

/// How long to wait for the broker's ConnAck before giving up
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Input device key events to MQTT, with Home Assistant autodiscovery
#[derive(Parser, Debug)]
#[command(name = "evmqtt")]
#[command(version)]
#[command(about = "Publish input device key events to MQTT", long_about = None)]
struct Args {
    /// Configuration file (TOML, or Home Assistant options JSON)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Enable info logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// List available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Discover and monitor every input device, ignoring the device list
    #[arg(long)]
    auto_discover: bool,
}

#[cfg(feature = "pure-rust")]
impl Args {
    fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else if self.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        }
    }
}

#[cfg(feature = "pure-rust")]
fn init_logging(args: &Args) {
    // RUST_LOG, when set, refines the level picked from the flags
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

#[cfg(feature = "pure-rust")]
fn list_devices() -> anyhow::Result<()> {
    let devices = discovery::list_devices(&EvdevProvider::new())
        .context("Error finding input devices")?;
    if devices.is_empty() {
        anyhow::bail!("No input devices found (check permissions on /dev/input)");
    }

    println!("Found {} input device(s):", devices.len());
    for (path, name) in &devices {
        println!("  {}: {}", path, name);
    }
    Ok(())
}

#[cfg(feature = "pure-rust")]
fn connect(config: &Config) -> anyhow::Result<Arc<MqttTransport>> {
    let settings = MqttSettings::new(config.serverip.clone(), config.port)
        .with_credentials(&config.username, &config.password);
    let transport = Arc::new(MqttTransport::new(settings));
    transport.connect().context("Failed to start MQTT client")?;
    if let Err(e) = transport.wait_for_connection(CONNECT_TIMEOUT) {
        let _ = transport.disconnect();
        return Err(e).context(format!(
            "MQTT connection to {}:{} not established within {}s",
            config.serverip,
            config.port,
            CONNECT_TIMEOUT.as_secs()
        ));
    }
    Ok(transport)
}

#[cfg(feature = "pure-rust")]
fn install_signal_handler(controller: Arc<GatewayController>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handler")?;
    std::thread::Builder::new()
        .name("evmqtt-signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("Received signal {}, shutting down", signal);
                controller.stop();
            }
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

#[cfg(feature = "pure-rust")]
fn run(args: &Args) -> anyhow::Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.auto_discover {
        config.auto_discover = true;
    }
    log::debug!("Loaded configuration: {:?}", config.redacted());

    let transport = connect(&config)?;
    let controller = Arc::new(GatewayController::new(
        config,
        transport.clone() as Arc<dyn Transport>,
        Arc::new(EvdevProvider::new()),
    ));

    install_signal_handler(controller.clone())?;

    match controller.start() {
        Ok(_) => {}
        // A signal arrived while devices were being opened
        Err(GatewayError::ShuttingDown) => return Ok(()),
        Err(e) => {
            controller.stop();
            return Err(e).context("Gateway failed to start");
        }
    }
    log::info!("evmqtt is running. Press Ctrl+C to exit.");

    controller.wait();
    // Monitors may all have ended on their own; still release the broker
    controller.stop();
    Ok(())
}

#[cfg(feature = "pure-rust")]
fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let result = if args.list_devices {
        list_devices()
    } else {
        run(&args)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// Stub for when pure-rust feature is not enabled
#[cfg(not(feature = "pure-rust"))]
fn main() {
    eprintln!("Error: evmqtt binary requires the 'pure-rust' feature to be enabled.");
    std::process::exit(1);
}
