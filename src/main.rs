use anyhow::Result;
use barcam::{
    BarcamConfig, BarcodeReader, CaptureBackend, EventBus, EventBusError, EventFilter,
    EventReceiver, FilePreferenceStore,
    KeyboardInputHandler, MemoryPreferenceStore, MockCaptureBackend, PreferenceStore,
    RawDetection, ScanEvent, SymbolType, V4l2Backend,
};
use clap::Parser;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "barcam")]
#[command(about = "Camera barcode scanner with debounced scan reporting")]
#[command(version)]
#[command(long_about = "Drives a camera capture session, recognizes barcodes on the live \
feed and reports each physical scan once as a JSON line on stdout. Values can also be \
typed in manually when the camera cannot read a code.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "barcam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the scanner")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Use the in-process mock camera instead of real hardware
    #[arg(long, help = "Run against a simulated camera replaying sample codes")]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting barcam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match BarcamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.mock {
        config.camera.backend = "mock".to_string();
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let preferences = open_preferences(&config);
    let backend = create_backend(&config);
    let event_bus = if args.debug {
        EventBus::with_debug_logging(config.system.event_bus_capacity)
    } else {
        EventBus::new(config.system.event_bus_capacity)
    };

    let interactive = std::io::stdin().is_terminal();
    let reports = EventReceiver::new(
        event_bus.subscribe(),
        EventFilter::EventTypes(vec!["barcode_scanned"]),
        "report-printer".to_string(),
    );
    let printer = tokio::spawn(print_reports(reports, interactive));

    let reader = BarcodeReader::builder()
        .config(&config)
        .backend(backend)
        .preferences(preferences)
        .event_bus(event_bus)
        .build()
        .map_err(|e| {
            error!("Failed to create barcode reader: {}", e);
            e
        })?;

    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let keyboard = if interactive {
        let handler = KeyboardInputHandler::new(commands_tx.clone());
        handler.start().await?;
        Some(handler)
    } else {
        None
    };

    // commands_tx stays alive, so without a terminal only a signal ends the run
    let reason = reader.run(commands_rx).await;
    drop(commands_tx);

    if let Some(keyboard) = keyboard {
        keyboard.stop().await?;
    }
    drop(reader);
    printer.abort();

    info!("barcam exited: {:?}", reason);
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("barcam={}", log_level)));

    // stdout carries the scan reports
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# barcam configuration file");
    println!("# Every key is optional; environment overrides use BARCAM_<SECTION>__<KEY>");
    println!();
    println!("{}", BarcamConfig::default().to_toml()?);
    Ok(())
}

fn open_preferences(config: &BarcamConfig) -> Arc<dyn PreferenceStore> {
    match FilePreferenceStore::open(&config.camera.preferences_path) {
        Ok(store) => {
            info!("Camera preference stored in {}", store.path().display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("Preference file unusable, camera choice will not persist: {}", e);
            Arc::new(MemoryPreferenceStore::new())
        }
    }
}

fn create_backend(config: &BarcamConfig) -> Arc<dyn CaptureBackend> {
    match config.camera.backend.as_str() {
        "mock" => {
            info!("Using mock camera backend");
            Arc::new(MockCaptureBackend::new().with_script(
                vec![
                    RawDetection::new(SymbolType::Ean13, "4006381333931"),
                    RawDetection::new(SymbolType::Qr, "https://example.org/item/42"),
                    RawDetection::new(SymbolType::Code128, "PKG-0001"),
                ],
                Duration::from_millis(900),
            ))
        }
        _ => Arc::new(V4l2Backend::new(config.camera.clone())),
    }
}

/// Write every report to stdout as one JSON line
async fn print_reports(mut reports: EventReceiver, raw_terminal: bool) {
    let line_end = if raw_terminal { "\r\n" } else { "\n" };

    loop {
        match reports.recv().await {
            Ok(ScanEvent::BarcodeScanned(report)) => match serde_json::to_string(&report) {
                Ok(line) => print!("{}{}", line, line_end),
                Err(e) => warn!("Failed to serialize scan report: {}", e),
            },
            Ok(_) => {}
            // already logged by the receiver; keep printing newer reports
            Err(EventBusError::Lagged { .. }) => {}
            Err(_) => break,
        }
    }
}
