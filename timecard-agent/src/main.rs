use crate::utils::init_logging;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use timecard::bridge::DEFAULT_WS_ADDR;
use timecard::{
    App, BridgePage, ExtensionBridge, FeatureFlags, FileStore, KeyValueStore, MemoryStore,
    PageEvent, ShortcutEngine, Timings,
};

pub mod utils;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Timecard agent - shortcuts, Azure DevOps import and grid filling for the Oracle timecard page"
)]
struct Args {
    /// Address the browser extension connects to
    #[arg(long, env = "TIMECARD_BIND", default_value = DEFAULT_WS_ADDR)]
    bind: String,

    /// Settings file (defaults to the user config directory)
    #[arg(long, env = "TIMECARD_STORE")]
    store: Option<PathBuf>,

    /// How long to wait for each page call, in milliseconds
    #[arg(long, default_value = "5000")]
    eval_timeout_ms: u64,

    /// Turn the Azure DevOps features on or off and remember the choice
    #[arg(long)]
    azure_devops: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging()?;

    let store_path = args.store.unwrap_or_else(FileStore::default_path);
    let settings = Arc::new(
        FileStore::open(&store_path)
            .with_context(|| format!("opening settings store {}", store_path.display()))?,
    );
    if let Some(enabled) = args.azure_devops {
        FeatureFlags {
            azure_devops: enabled,
        }
        .save(&*settings)
        .context("saving feature flags")?;
    }
    tracing::info!("Settings store: {}", store_path.display());

    let (bridge, mut events) =
        ExtensionBridge::start(&args.bind, ShortcutEngine::default().bindings())
            .await
            .with_context(|| format!("starting extension bridge on {}", args.bind))?;
    let page = Arc::new(BridgePage::new(
        bridge.clone(),
        Duration::from_millis(args.eval_timeout_ms),
    ));
    let settings: Arc<dyn KeyValueStore> = settings;
    let app = Arc::new(
        App::new(
            page.clone(),
            settings,
            Arc::new(MemoryStore::new()),
            Timings::default(),
        )
        .context("building timecard automation")?,
    );

    println!("Timecard agent listening on ws://{}", bridge.local_addr());
    println!("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::warn!("Extension bridge closed");
                    break;
                };
                if event == PageEvent::Connected {
                    if let Err(e) = page.install().await {
                        tracing::warn!(error = %e, "could not install page prelude");
                        continue;
                    }
                }
                app.handle(event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down timecard agent");
                break;
            }
        }
    }

    Ok(())
}
