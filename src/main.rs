use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kvwatch::gather_text;
use kvwatch::register_custom_metrics;
use kvwatch::MemoryStore;
use kvwatch::Result;
use kvwatch::WatchExit;
use kvwatch::Watcher;
use kvwatch::WatcherConfig;
use kvwatch::REGISTRY;
use rand::Rng;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

const PREFIX: &str = "services/";

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let settings = WatcherConfig::new()?.validate()?;
    info!(?settings, "configuration loaded");
    register_custom_metrics(&REGISTRY);

    // Initializing Shutdown Signal
    let shutdown = CancellationToken::new();

    let store = MemoryStore::new();
    let writer = tokio::spawn(write_bursts(store.clone(), shutdown.clone()));

    let watcher = Watcher::from_config(Arc::new(store), &settings);
    let (mut stream, handle) = watcher.watch_tree(PREFIX, shutdown.clone())?;

    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(shutdown).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    info!(watch = %handle.target(), "Waiting for CTRL+C signal...");
    while let Some(pairs) = stream.next().await {
        let keys: Vec<&str> = pairs.iter().map(|pair| pair.key.as_str()).collect();
        info!(count = pairs.len(), ?keys, "snapshot");
    }

    match handle.join().await? {
        WatchExit::Failed(err) => error!(%err, "watch failed"),
        exit => info!(?exit, "watch finished"),
    }
    writer.await?;

    println!("{}", gather_text(&REGISTRY));
    Ok(())
}

/// Registers and removes services in bursts, with quiet gaps in between
async fn write_bursts(
    store: MemoryStore,
    shutdown: CancellationToken,
) {
    let mut round = 0u64;
    loop {
        let (burst, pause) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1..=5), Duration::from_millis(rng.gen_range(500..3_000)))
        };

        for i in 0..burst {
            let key = format!("{PREFIX}svc-{}", (round + i) % 8);
            if round % 3 == 2 {
                store.delete(&key);
            } else {
                store.put(key, format!("10.0.0.{}:8080", i + 1));
            }
            sleep(Duration::from_millis(20)).await;
        }
        round += 1;

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(pause) => {}
        }
    }
}

async fn graceful_shutdown(shutdown: CancellationToken) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Ctrl+C detected.");
        },
    }

    shutdown.cancel();
    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
