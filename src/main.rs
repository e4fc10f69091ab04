//! text-recognition-bridge - command-line host for the recognition bridge
//!
//! Builds a bridge with the `TextRecognition` plugin and feeds it either
//! image files or newline-delimited JSON bridge calls.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, SendError};
use serde_json::{json, Map};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use text_recognition_bridge::config::{self, AppConfig, LoggingConfig};
use text_recognition_bridge::vision::TesseractRecognizer;
use text_recognition_bridge::{
    Bridge, BridgeBuilder, BridgeCall, BridgeResponse, TextRecognitionPlugin,
};

/// Text recognition bridge - on-device OCR behind a plugin bridge
#[derive(Parser, Debug)]
#[command(name = "text-recognition-bridge")]
#[command(about = "Recognize text in images through the TextRecognition bridge plugin")]
struct Args {
    /// Configuration file (defaults to the per-user config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize text in image files, one JSON response per file
    Recognize {
        /// Image files to recognize
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Format hint sent with every image (default: from the file extension)
        #[arg(long)]
        format: Option<String>,
    },
    /// Answer newline-delimited JSON bridge calls from stdin on stdout
    Serve,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::InitConfig { force } = args.command {
        return init_config(args.config.as_deref(), force);
    }

    let (config, source) = load_or_create_config(args.config.as_deref())?;
    init_logging(&config.logging)?;
    info!("Using configuration from {}", source);

    if !TesseractRecognizer::is_available(&config.recognizer) {
        warn!(
            "Tesseract could not load language data for '{}'; recognition calls will fail",
            config.recognizer.language
        );
    }

    let bridge = BridgeBuilder::new()
        .register_plugin(TextRecognitionPlugin::with_tesseract(&config))
        .build()?;

    let result = match args.command {
        Command::Recognize { files, format } => run_recognize(&bridge, &files, format.as_deref()),
        Command::Serve => run_serve(&bridge),
        Command::InitConfig { .. } => unreachable!("handled before the bridge starts"),
    };

    bridge.shutdown();
    result
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the config
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level {:?}", logging.level))?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Load configuration from file or fall back to defaults.
///
/// An explicitly named file must exist; the default location may not.
fn load_or_create_config(explicit: Option<&Path>) -> Result<(AppConfig, String)> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        return Ok((config, path.display().to_string()));
    }

    let config_path = config::default_config_path()?;
    if config_path.exists() {
        let config = config::load_config(&config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    Ok((AppConfig::default(), "built-in defaults".to_string()))
}

fn init_config(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config::default_config_path()?,
    };

    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config::save_config(&AppConfig::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Build a `recognize` call for an image file, sent as a data URL
fn file_call(path: &Path, format: Option<&str>) -> Result<BridgeCall> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let format = match format {
        Some(format) => format.to_string(),
        None => image::ImageFormat::from_path(path)
            .ok()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("jpeg")
            .to_string(),
    };

    let mut options = Map::new();
    options.insert(
        "image".to_string(),
        json!(format!("data:image/{format};base64,{}", STANDARD.encode(&bytes))),
    );
    options.insert("imageFormat".to_string(), json!(format));

    Ok(BridgeCall::new(TextRecognitionPlugin::NAME, "recognize", options))
}

fn run_recognize(bridge: &Bridge, files: &[PathBuf], format: Option<&str>) -> Result<()> {
    let calls = files
        .iter()
        .map(|path| file_call(path, format).map(|call| (path, call)))
        .collect::<Result<Vec<_>>>()?;

    // One calling thread per file, as a host shell would do per request
    let responses = std::thread::scope(|scope| {
        let handles: Vec<_> = calls
            .into_iter()
            .map(|(path, call)| scope.spawn(move || (path, bridge.dispatch(call))))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .collect::<std::result::Result<Vec<_>, _>>()
    })
    .map_err(|_| anyhow!("Recognition thread panicked"))?;

    let mut stdout = std::io::stdout().lock();
    for (path, response) in responses {
        let line = json!({ "file": path.display().to_string(), "response": response });
        writeln!(stdout, "{line}")?;
    }
    stdout.flush()?;
    Ok(())
}

fn run_serve(bridge: &Bridge) -> Result<()> {
    info!("Serving bridge calls on stdin");
    let (responses, outbox) = unbounded::<BridgeResponse>();

    std::thread::scope(|scope| -> Result<()> {
        let writer = scope.spawn(move || -> Result<()> {
            let mut stdout = std::io::stdout().lock();
            for response in outbox {
                writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
                stdout.flush()?;
            }
            Ok(())
        });

        for line in std::io::stdin().lock().lines() {
            // A writer that has exited can no longer answer anything
            if writer.is_finished() {
                warn!("Response writer has stopped; no longer reading stdin");
                break;
            }

            let line = line.context("Failed to read stdin")?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<BridgeCall>(&line) {
                Ok(call) => {
                    let responses = responses.clone();
                    scope.spawn(move || {
                        if let Err(SendError(response)) = responses.send(bridge.dispatch(call)) {
                            warn!(
                                "Response writer has stopped; dropping response to call {}",
                                response.call_id
                            );
                        }
                    });
                }
                Err(e) => {
                    error!("Rejecting malformed bridge call: {}", e);
                    let rejection = BridgeResponse::rejected(
                        "",
                        format!("Invalid bridge call: {e}"),
                        Some("INVALID_CALL".to_string()),
                    );
                    if responses.send(rejection).is_err() {
                        warn!("Response writer has stopped; no longer reading stdin");
                        break;
                    }
                }
            }
        }

        // Writer exits once every in-flight call has answered
        drop(responses);
        writer
            .join()
            .map_err(|_| anyhow!("Response writer panicked"))?
    })?;

    info!("stdin closed; stopping");
    Ok(())
}
