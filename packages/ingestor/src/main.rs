use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use blockpulse_ingestor::publisher::{self, Publisher};
use blockpulse_ingestor::{
    BlockIngestionPipeline, ChainSource, DashboardState, IngestorConfig, NodeConnection, NodeError,
    RateLimiter, TransactionClassifier,
};

/// How often the window summary is logged
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = IngestorConfig::from_env()?;
    info!(
        "Starting ingestor: node {}, {} req/s, receipts {}",
        config.node.url, config.limiter.requests_per_second, config.pipeline.fetch_receipts
    );

    let mut connection = NodeConnection::new(config.node.clone());
    let source = match connection.connect().await {
        Ok(source) => source,
        Err(e) => {
            warn!("Initial connection failed: {}", e);
            connection.reconnect().await?
        }
    };
    let source = Arc::new(source);

    let limiter = RateLimiter::with_config(&config.limiter);
    let subscription = source.subscribe_new_blocks(&limiter).await?;

    let state = Arc::new(DashboardState::new(&config.windows));

    if let Some(url) = config.redis_url.as_deref() {
        match publisher::connect(url).await {
            Ok(redis) => {
                let publisher = Publisher::new(redis, config.redis_channel.clone());
                tokio::spawn(publisher::forward_events(publisher, state.subscribe()));
            }
            Err(e) => error!("Redis publisher disabled: {}", e),
        }
    }

    let summary_state = Arc::clone(&state);
    let summary_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SUMMARY_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let summary = summary_state.summary();
            info!(
                "Latest block {:?}: {} txs over window, avg {}/block, max {}, fees {}",
                summary_state.latest_block(),
                summary.total_txs,
                summary.avg_txs_per_block,
                summary.max_txs_per_block,
                summary.total_fees
            );
        }
    });

    let pipeline = Arc::new(BlockIngestionPipeline::new(
        source as Arc<dyn ChainSource>,
        limiter.clone(),
        Arc::new(TransactionClassifier::new(config.classifier.clone())),
        state,
        config.pipeline,
    ));

    let connection = Arc::new(Mutex::new(connection));
    let reconnect = move || {
        let connection = Arc::clone(&connection);
        let limiter = limiter.clone();
        async move {
            let source = Arc::new(connection.lock().await.reconnect().await?);
            let subscription = source.subscribe_new_blocks(&limiter).await?;
            Ok::<_, NodeError>((source as Arc<dyn ChainSource>, subscription))
        }
    };

    let result = pipeline
        .run_with_reconnect(subscription, reconnect, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    summary_task.abort();
    match result {
        Ok(()) => {
            info!("Ingestor stopped");
            Ok(())
        }
        Err(e) => {
            error!("Giving up on the node: {}", e);
            Err(e.into())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
