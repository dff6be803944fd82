mod surface;

use crate::surface::ConsoleSurface;
use marquee_core::{
    CoreError, MarqueeConfig, ProgressExtrapolator, ResyncRequest, StateStore, TextPresenter,
    TransitionSequencer,
};
use marquee_stream::{ConnectionState, HttpTransport, PushTransport, SnapshotApi, StreamClient};
use std::fs::File;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

const APP_NAME: &str = "marquee";

// The whole engine is single-threaded, cooperative and event-driven; a
// current-thread runtime is all it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let file_logging_enabled = check_file_logging_enabled();
    init_tracing(file_logging_enabled);

    let config = match MarqueeConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created a config template at {}. Edit it and restart.",
                path.display()
            );
            return;
        }
        Err(error) => {
            error!("{error}");
            std::process::exit(1);
        }
    };

    let base = match Url::parse(&config.stream.base_url) {
        Ok(base) => base,
        Err(error) => {
            error!("Invalid base_url in config: {error}");
            std::process::exit(1);
        }
    };

    let transport = match HttpTransport::new(&config.stream) {
        Ok(transport) => Arc::new(transport),
        Err(error) => {
            error!("Failed to set up the stream transport: {error}");
            std::process::exit(1);
        }
    };

    let surface = match ConsoleSurface::new(base) {
        Ok(surface) => Arc::new(surface),
        Err(error) => {
            error!("Failed to set up the display surface: {error}");
            std::process::exit(1);
        }
    };

    // Shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {error}");
    }

    let store = StateStore::new(config.display.idle_image.clone());
    let (resync_tx, resync_rx) = mpsc::channel::<ResyncRequest>(16);

    let presenter = Arc::new(TextPresenter::new(
        Arc::clone(&store),
        surface.clone(),
        config.display.status_fallback.clone(),
        cancel_token.clone(),
    ));
    let extrapolator = Arc::new(ProgressExtrapolator::new(
        Arc::clone(&store),
        surface.clone(),
        resync_tx,
        &config.progress,
        config.display.status_fallback.clone(),
        cancel_token.clone(),
    ));
    let sequencer = TransitionSequencer::new(
        Arc::clone(&store),
        surface,
        cancel_token.clone(),
    );
    let client = StreamClient::new(
        Arc::clone(&transport) as Arc<dyn PushTransport>,
        transport as Arc<dyn SnapshotApi>,
        Arc::clone(&store),
        &config.stream,
        cancel_token.clone(),
    );

    info!(
        "Starting {APP_NAME}: push channel at {}{}",
        config.stream.base_url, config.stream.push_path
    );

    tokio::spawn(log_connection_transitions(
        client.transitions(),
        cancel_token.clone(),
    ));
    let presenter_handle = presenter.start();
    let extrapolator_handle = extrapolator.start();
    let sequencer_handle = sequencer.start();
    let client_handle = Arc::clone(&client).start(resync_rx);

    cancel_token.cancelled().await;
    let _ = client_handle.await;
    let _ = sequencer_handle.await;
    let _ = extrapolator_handle.await;
    let _ = presenter_handle.await;
    info!("Shutdown complete");
}

/// Log connection state transitions for operator visibility.
async fn log_connection_transitions(
    mut transitions: broadcast::Receiver<ConnectionState>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            transition = transitions.recv() => match transition {
                Ok(state) => info!(?state, "Connection"),
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            }
        }
    }
}

/// Check if file logging is enabled by reading the config file.
/// This is done before full config loading so tracing can be set up first.
/// Returns `false` if the config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    // Minimal structs to parse just the logging.enabled field
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let config_path = MarqueeConfig::config_path();
    let Ok(content) = std::fs::read_to_string(&config_path) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|config| config.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if file_logging_enabled {
        let log_path = MarqueeConfig::config_path().with_file_name("marquee.log");

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(error) => {
                eprintln!("Failed to create log file at {}: {error}", log_path.display());
            }
        }
    }

    // Fallback: console only
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
