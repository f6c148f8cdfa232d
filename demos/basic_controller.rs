//! # Example: Controller lifecycle
//!
//! Registers a listing source and a channel-fed source, starts the controller,
//! runs one reconcile worker against its queue and stops after a few seconds.
//!
//! Run with: `RUST_LOG=debug cargo run --example basic_controller`

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use reconcile_controller::{
    BackoffPolicy, BackoffRateLimiter, ChannelSource, Controller, ControllerConfig, JitterPolicy,
    ListSource, LogWriter, Queue, QueueRef, SourceError, Subscribe, WatchSource,
};

/// Lists the initial set of objects; pretends to be slow.
async fn list_pods(_ctx: CancellationToken) -> Result<Vec<String>, SourceError> {
    tokio::time::sleep(Duration::from_millis(300)).await;
    Ok(vec!["default/web-0".into(), "default/web-1".into()])
}

/// Pops keys until the queue shuts down; fails each key once to show requeues.
async fn worker(controller: Arc<Controller<String>>, queue: QueueRef<String>) {
    while let Some(key) = queue.get().await {
        let span = controller.logger(Some(&key));
        let _enter = span.enter();

        if queue.num_requeues(&key) == 0 {
            warn!("transient failure, requeueing");
            queue.add_rate_limited(key.clone());
        } else {
            info!(requeues = queue.num_requeues(&key), "reconciled");
            queue.forget(&key);
        }
        queue.done(&key);
    }
    info!("worker exiting");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let backoff = BackoffPolicy {
        first: Duration::from_millis(100),
        max: Duration::from_secs(5),
        factor: 2.0,
        jitter: JitterPolicy::Equal,
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let controller: Arc<Controller<String>> = Arc::new(
        Controller::builder("pods")
            .with_config(
                ControllerConfig::default()
                    .with_cache_sync_timeout(Duration::from_secs(2))
                    .with_leader_elected(false),
            )
            .with_rate_limiter(Arc::new(BackoffRateLimiter::new(backoff)))
            .with_subscribers(subs)
            .build()?,
    );

    let (events, channel) = ChannelSource::channel("pod-events", 16);
    controller.watch(WatchSource::syncing(ListSource::new("pod-list", list_pods))).await?;
    controller.watch(WatchSource::plain(channel)).await?;

    let ctx = CancellationToken::new();
    let runner = {
        let controller = Arc::clone(&controller);
        let ctx = ctx.clone();
        tokio::spawn(async move { controller.start(ctx).await })
    };

    if !controller.wait_for_started(&ctx).await {
        return Ok(());
    }
    info!(
        leader_election = controller.need_leader_election(),
        "controller ready"
    );

    let Some(queue) = controller.queue().await else {
        return Ok(());
    };
    let consumer = tokio::spawn(worker(Arc::clone(&controller), queue));

    events.send("default/web-2".to_string()).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    ctx.cancel();
    runner.await??;
    consumer.await?;
    Ok(())
}
