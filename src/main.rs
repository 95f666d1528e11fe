//! Twitch Relay Binary Entry Point
//!
//! This binary runs the complete relay pipeline.
//! Core functionality is provided by the `twitch_relay` library crate.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twitch_relay::{
    collector::Collector,
    config::AppConfig,
    event::{EventKind, EventSender, event_bus},
    publisher::{HttpEventSink, Publisher},
    shutdown::{ShutdownCoordinator, shutdown_signal},
    source::{ClipsSource, GamesSource, KrakenClient, StreamsSource, VideosSource},
    telemetry::{InfluxSink, Telemetry, TelemetryBuilder, TelemetryHandles},
};

/// Twitch Relay - Twitch listings to pub/sub event pipeline
#[derive(Parser, Debug)]
#[command(name = "twitch-relay", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (environment variables are used when it does not exist)
    #[arg(
        short,
        long,
        default_value = "configs/config.yaml",
        env = "RELAY_CONFIG"
    )]
    config: String,

    /// Disable the InfluxDB metrics pipeline entirely
    #[arg(long, visible_alias = "no-influx", env = "RELAY_NO_METRICS")]
    no_metrics: bool,

    /// Print the effective configuration (secrets redacted) at startup
    #[arg(long)]
    log_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,twitch_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Twitch Relay - event pipeline");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (file first, environment as fallback)
    tracing::info!("Loading configuration from: {}", cli.config);
    let config = AppConfig::load_or_env(&cli.config)?;

    tracing::info!(no_metrics = cli.no_metrics, "Metrics flag");
    if cli.log_config {
        tracing::info!("Effective configuration:\n{}", config.to_redacted_yaml()?);
    }

    let Connected {
        publisher,
        events,
        telemetry_handles,
    } = connect(&config, cli.no_metrics).await?;
    let telemetry = telemetry_handles
        .as_ref()
        .map(|handles| handles.telemetry.clone())
        .unwrap_or_else(Telemetry::disabled);

    // Spawn collectors and the publisher
    let mut coordinator = ShutdownCoordinator::new();
    let client = KrakenClient::new(config.twitch.timeout)?;
    spawn_collectors(&mut coordinator, &config, &client, &events, &telemetry);
    drop(events);
    coordinator.spawn_publisher(publisher);

    tracing::info!("Press Ctrl+C to shutdown");
    let report = coordinator.run_until(shutdown_signal()).await;
    if let Some(stats) = report.publish {
        tracing::info!(
            forwarded = stats.forwarded,
            dropped_disconnected = stats.dropped_disconnected,
            failed = stats.failed,
            "Publisher totals"
        );
    }

    if let Some(handles) = telemetry_handles {
        tracing::info!("Shutting down telemetry...");
        if let Err(e) = handles.shutdown().await {
            tracing::error!("Failed to shutdown telemetry: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Outbound half of the pipeline, ready for collectors to be attached.
struct Connected {
    publisher: Publisher<HttpEventSink>,
    events: EventSender,
    telemetry_handles: Option<TelemetryHandles>,
}

/// Probe the outbound sink, then start telemetry.
///
/// Nothing is spawned when the sink rejects or cannot reach the probe.
async fn connect(
    config: &AppConfig,
    no_metrics: bool,
) -> Result<Connected, Box<dyn std::error::Error>> {
    let (events, events_rx) = event_bus();
    let sink = HttpEventSink::new(config.publisher.to_sink_settings())?;
    tracing::info!("Connecting event sink at: {}", config.publisher.endpoint);
    let publisher = Publisher::connect(sink, events_rx).await?;

    let telemetry_handles = build_telemetry(config, no_metrics)?;
    Ok(Connected {
        publisher,
        events,
        telemetry_handles,
    })
}

/// Start the metrics pipeline unless disabled or unconfigured.
fn build_telemetry(
    config: &AppConfig,
    no_metrics: bool,
) -> Result<Option<TelemetryHandles>, Box<dyn std::error::Error>> {
    if no_metrics {
        tracing::info!("Metrics disabled by flag");
        return Ok(None);
    }
    let Some(ref metrics) = config.metrics else {
        tracing::info!("No metrics configuration, telemetry disabled");
        return Ok(None);
    };

    tracing::info!(
        "Reporting metrics to: {} (database: {})",
        metrics.address,
        metrics.database
    );
    let sink = InfluxSink::new(metrics.to_influx_settings())?;
    let handles = TelemetryBuilder::new(sink)
        .channel_capacity(metrics.channel_capacity)
        .flush_interval(metrics.flush_interval)
        .sample_interval(metrics.sample_interval)
        .build()?;
    Ok(Some(handles))
}

/// Spawn one collector per enabled source.
fn spawn_collectors(
    coordinator: &mut ShutdownCoordinator,
    config: &AppConfig,
    client: &KrakenClient,
    events: &EventSender,
    telemetry: &Telemetry,
) {
    for source in config.source_configs() {
        let client = client.clone();
        let events = events.clone();
        let telemetry = telemetry.clone();
        match source.kind {
            EventKind::Clip => coordinator.spawn_collector(Collector::new(
                ClipsSource::new(source, client),
                events,
                telemetry,
            )),
            EventKind::Game => coordinator.spawn_collector(Collector::new(
                GamesSource::new(source, client),
                events,
                telemetry,
            )),
            EventKind::Stream => coordinator.spawn_collector(Collector::new(
                StreamsSource::new(source, client),
                events,
                telemetry,
            )),
            EventKind::Video => coordinator.spawn_collector(Collector::new(
                VideosSource::new(source, client),
                events,
                telemetry,
            )),
        }
    }
}
