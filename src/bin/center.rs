use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sqlx::mysql::MySqlPoolOptions;
use state_monitor::{
    actors::emitter::EmitterHandle,
    actors::pipeline::{IngestPipeline, PipelineContext},
    cache::RedisFieldCache,
    config::read_config_file,
    policy::{PolicyEngine, PolicyResolver, store::MySqlPolicyStore},
    storage::{BatchCache, RollingReportStore, mysql::MySqlBackend},
    stream::kafka::{KafkaInbound, KafkaOutbound},
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "state_monitor_center";

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("state_monitor", LevelFilter::DEBUG),
        ("statemon_center", LevelFilter::DEBUG),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    info!("--------------------------------------------------");
    info!("Service Name: {SERVICE_NAME}");
    info!("Service Version: {}", env!("CARGO_PKG_VERSION"));
    info!("--------------------------------------------------");

    // storage: one pool, one rolling store, one shared write buffer
    let pool = MySqlPoolOptions::new()
        .max_connections(config.mysql.max_connections)
        .connect(&config.mysql.url)
        .await
        .context("connecting to MySQL")?;

    let store = Arc::new(RollingReportStore::new(
        Box::new(MySqlBackend::from_pool(pool.clone())),
        config.service.max_store_months,
    ));
    let batch = Arc::new(BatchCache::new(store));

    // policy resolution: key-value cache in front of the policy table
    let field_cache = RedisFieldCache::connect(&config.redis.url)
        .await
        .context("connecting to Redis")?;
    let resolver = PolicyResolver::new(
        Arc::new(field_cache),
        Arc::new(MySqlPolicyStore::new(pool)),
    );
    let policy = Arc::new(PolicyEngine::new(resolver));

    let outbound = KafkaOutbound::connect(&config.kafka.brokers, &config.kafka.produce_topic)
        .context("connecting outbound stream")?;
    let emitter = EmitterHandle::spawn(Arc::new(outbound));

    let ctx = PipelineContext {
        policy,
        batch: batch.clone(),
        emitter: emitter.clone(),
    };

    // every consumer instance gets its own subscription; they share one
    // batch buffer and one emitter on purpose, consolidating writes across
    // instances
    let mut pipelines = Vec::new();
    for _ in 0..config.service.consumer_instances {
        let inbound = KafkaInbound::connect(
            &config.kafka.brokers,
            &config.kafka.group_id,
            &config.kafka.consume_topics,
        )
        .context("connecting inbound stream")?;

        pipelines.push(IngestPipeline::spawn(
            Box::new(inbound),
            ctx.clone(),
            config.service.worker_pool_size,
        ));
    }

    info!(
        "{} pipeline(s) running with {} workers each",
        config.service.consumer_instances, config.service.worker_pool_size
    );

    shutdown_signal().await;
    info!("closing");

    for pipeline in pipelines {
        pipeline.shutdown().await;
    }
    emitter.shutdown().await;

    // drain whatever is still buffered; shutdown proceeds regardless
    if let Err(e) = batch.flush().await {
        error!("flush msg cache to storage error: {e}");
    }

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("receive signal interrupt"),
                    _ = sigterm.recv() => info!("receive signal terminate"),
                }
            }
            Err(e) => {
                error!("installing terminate handler failed: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("receive signal interrupt");
    }
}
