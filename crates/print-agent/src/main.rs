use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{AdapterStateRelay, Dispatcher, PrinterApi};
use domain::{PrintJob, PrinterEvent};
use infrastructure::{AdapterMonitor, AgentConfig, BroadcastEventPublisher};
use print_agent::{auto_connect, connect_options, dispatcher_config, session};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve JSON-lines requests on stdin (default)
    Run,
    /// Print a JSON job file on a configured printer and exit
    Print {
        #[arg(long, default_value_t = 0)]
        id: u8,
        /// File holding {"config": {...}, "data": [...]}
        job: PathBuf,
    },
    /// Print the self-test page on a configured printer and exit
    TestPage {
        #[arg(long, default_value_t = 0)]
        id: u8,
    },
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Logs go to stderr; stdout carries the JSON-lines protocol
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,print_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Print agent starting (pid {})", std::process::id());

    // 1. Load Configuration
    let config = AgentConfig::load(&args.config_dir)
        .with_context(|| format!("loading configuration from {}", args.config_dir))?;
    info!(
        max_connections = config.max_connections,
        transport = %config.defaults.transport,
        protocol = %config.defaults.protocol,
        printers = config.printers.len(),
        "Configuration loaded"
    );

    // 2. Transports, events, dispatcher
    let events = BroadcastEventPublisher::default();
    let dispatcher = Arc::new(Dispatcher::new(
        dispatcher_config(&config),
        Arc::new(config.transport_factory()),
        Arc::new(events.clone()),
    ));

    match args.command.unwrap_or(Command::Run) {
        Command::Run => serve(config, dispatcher, events).await,
        Command::Print { id, job } => {
            let text = tokio::fs::read_to_string(&job)
                .await
                .with_context(|| format!("reading job file {}", job.display()))?;
            let job: PrintJob = serde_json::from_str(&text)
                .with_context(|| format!("parsing job file {}", job.display()))?;
            one_shot(&config, &dispatcher, &events, id, |d| d.print(id, &job)).await
        }
        Command::TestPage { id } => {
            one_shot(&config, &dispatcher, &events, id, |d| d.print_test(id)).await
        }
    }
}

async fn serve(
    config: AgentConfig,
    dispatcher: Arc<Dispatcher>,
    events: BroadcastEventPublisher,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let event_rx = events.subscribe();

    // 3. Adapter monitoring
    let monitor = AdapterMonitor::new(
        config.bluetooth.clone(),
        Duration::from_millis(config.adapter_poll_ms),
    );
    let relay = AdapterStateRelay::new(Arc::new(events.clone()));
    let status = relay.status();
    let relay_handle = relay.spawn(monitor.subscribe(), cancel.clone());
    let monitor_handle = monitor.spawn(cancel.clone());

    // 4. Configured printers
    let connected = auto_connect(&dispatcher, &config).await;
    info!(connected, "Ready for requests");

    // 5. Request loop until EOF or Ctrl-C
    let api = PrinterApi::new(dispatcher.clone(), status);
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = session::serve(&api, stdin, tokio::io::stdout(), event_rx, cancel.clone()) => {
            if let Err(e) = result {
                warn!(error = %e, "Request loop ended with error");
            }
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Shutting down..."),
            Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
        },
    }

    dispatcher.destroy().await;
    cancel.cancel();
    let _ = relay_handle.await;
    let _ = monitor_handle.await;

    info!("Good bye!");
    Ok(())
}

async fn one_shot<F>(
    config: &AgentConfig,
    dispatcher: &Dispatcher,
    events: &BroadcastEventPublisher,
    id: u8,
    submit: F,
) -> Result<()>
where
    F: FnOnce(&Dispatcher) -> domain::error::Result<()>,
{
    let entry = config
        .printer(id)
        .ok_or_else(|| anyhow!("no printer with id {} in configuration", id))?;
    let mut event_rx = events.subscribe();

    dispatcher
        .connect(id, &entry.address, connect_options(entry))
        .await
        .with_context(|| format!("connecting to {}", entry.address))?;

    let result = match submit(dispatcher) {
        Ok(()) => dispatcher.flush(id).await,
        Err(e) => Err(e),
    };
    dispatcher.destroy().await;
    result.context("print failed")?;

    // Queued writes report failure through events only
    while let Ok(event) = event_rx.try_recv() {
        if let PrinterEvent::TaskFailed { task, error, .. } = event {
            return Err(anyhow!("{} failed: {}", task, error));
        }
    }
    info!(id, "Job sent");
    Ok(())
}

fn main() {
    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run()));

    if let Err(e) = result {
        eprintln!("fatal error: {:?}", e);
        std::process::exit(1);
    }
}
