mod metrics;
mod state;
mod tui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use emberlog_client::{IncidentsApi, StreamClient, StreamEvent};
use emberlog_core::{
    merge_into, ApiConfig, FeedStats, API_BASE_ENV, Incident, IncidentQuery, IncidentView, MergeOutcome,
    ViewState, DEFAULT_CAP, DEFAULT_PAGE_SIZE,
};
use state::DashboardState;
use std::fs::OpenOptions;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;
use tui::TuiApp;

#[derive(Parser)]
#[command(name = "emberlog")]
#[command(about = "Live emergency-dispatch incident feed and dashboard")]
struct Cli {
    /// Base URL of the incidents API
    #[arg(long, global = true, env = API_BASE_ENV)]
    api_base: Option<String>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    /// Append logs to this file (the dashboard discards logs otherwise)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    metrics_addr: Option<SocketAddr>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive incident dashboard
    Tui {
        /// Rows per page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// Initial incident type filter
        #[arg(long = "type")]
        incident_type: Option<String>,
        /// Initial address search
        #[arg(long)]
        search: Option<String>,
    },
    /// Follow the live feed and log each new incident
    Watch {
        /// Maximum incidents held in memory
        #[arg(long, default_value_t = DEFAULT_CAP)]
        cap: usize,
    },
    /// Fetch one page of incidents and print it
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        #[arg(long = "type")]
        incident_type: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        /// Case-insensitive address substring
        #[arg(long)]
        search: Option<String>,
        /// Responding unit (repeatable)
        #[arg(long = "unit")]
        units: Vec<String>,
        /// Lower dispatch-time bound (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// Upper dispatch-time bound (RFC 3339)
        #[arg(long)]
        to: Option<String>,
        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let interactive = matches!(cli.command, Commands::Tui { .. });
    init_logging(cli.log_json, cli.log_file.as_deref(), interactive)?;

    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus metrics exporter")?;
        info!("Metrics listening on http://{}", addr);
    }

    let config = ApiConfig::new(cli.api_base.as_deref().unwrap_or_default())
        .context("Invalid API base URL")?;
    info!(api = config.base_url(), "Using incidents API");

    match cli.command {
        Commands::Tui {
            page_size,
            incident_type,
            search,
        } => {
            let mut view = ViewState::new(page_size);
            view.set_type_filter(incident_type.as_deref());
            view.set_search(search.as_deref().unwrap_or_default());

            let app = TuiApp::new(DashboardState::new(IncidentView::new(view)));
            let api = IncidentsApi::new(&config)?;
            let stream = StreamClient::new(config.stream_url())?;
            tui::run_tui(app, api, stream).await?;
        }
        Commands::Watch { cap } => {
            watch(&config, cap).await?;
        }
        Commands::List {
            page,
            page_size,
            incident_type,
            channel,
            search,
            units,
            from,
            to,
            json,
        } => {
            let query = IncidentQuery {
                page,
                page_size,
                incident_type,
                channel,
                address_search: search,
                from_dispatched_at: from,
                to_dispatched_at: to,
                units,
            };
            list(&config, &query, json).await?;
        }
    }

    Ok(())
}

fn init_logging(json: bool, log_file: Option<&Path>, interactive: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The dashboard owns the terminal; logs must not land on it.
    let (writer, ansi) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None if interactive => (BoxMakeWriter::new(io::sink), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn watch(config: &ApiConfig, cap: usize) -> anyhow::Result<()> {
    let client = StreamClient::new(config.stream_url())?;
    info!(url = client.url(), cap, "Watching live incidents");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = client.open(tx);
    let mut incidents: Vec<Incident> = Vec::new();
    let mut stats = FeedStats::default();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(StreamEvent::Status(state)) => {
                    stats.state = state;
                    metrics::set_stream_open(state == emberlog_core::LiveState::Open);
                    info!(%state, "Live feed status");
                    if state.is_terminal() {
                        break;
                    }
                }
                Some(StreamEvent::Incident(incident)) => {
                    stats.record_received();
                    metrics::record_received();
                    let id = incident.id;
                    let description = format!(
                        "{} at {} [{}] on {}",
                        incident.incident_type,
                        incident.address,
                        incident.units_label(),
                        incident.channel
                    );

                    match merge_into(&mut incidents, incident, cap) {
                        MergeOutcome::Inserted { evicted } => {
                            stats.record_evicted(evicted);
                            metrics::record_evicted(evicted);
                            info!(id, "New incident: {}", description);
                        }
                        MergeOutcome::Duplicate => {
                            stats.record_duplicate();
                            metrics::record_duplicate();
                            debug!(id, "Duplicate incident ignored");
                        }
                        MergeOutcome::Dropped => {
                            stats.record_evicted(1);
                            metrics::record_evicted(1);
                            debug!(id, "Incident older than everything held; not kept");
                        }
                    }
                }
                Some(StreamEvent::Rejected(reason)) => {
                    stats.record_rejected();
                    metrics::record_rejected();
                    warn!("Dropped invalid payload: {}", reason);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    handle.stop();
    handle.closed().await;

    info!(
        received = stats.received,
        rejected = stats.rejected,
        duplicates = stats.duplicates,
        held = incidents.len(),
        "Watch finished"
    );
    Ok(())
}

async fn list(config: &ApiConfig, query: &IncidentQuery, json: bool) -> anyhow::Result<()> {
    let api = IncidentsApi::new(config)?;
    let page = match api.fetch_page(query).await {
        Ok(page) => page,
        Err(e) => {
            metrics::record_page_fetch_failure();
            return Err(e).context("Failed to fetch incidents");
        }
    };

    for _ in 0..page.rejected {
        metrics::record_rejected();
    }
    if page.rejected > 0 {
        warn!("Dropped {} malformed incident(s) from the page", page.rejected);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    for incident in &page.items {
        println!(
            "{:<22} {:<20} {:<40} {:<16} {}",
            incident.display_time(),
            incident.incident_type,
            incident.address,
            incident.units_label(),
            incident.channel
        );
    }

    let pages = page
        .total_pages()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "?".to_string());
    let total = page
        .total
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());
    println!("Page {}/{} ({} incidents)", page.page, pages, total);
    Ok(())
}
