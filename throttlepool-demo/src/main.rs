use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use throttlepool::RateLimitedPool;
use throttlepool_demo::config::Config;
use throttlepool_demo::tasks;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables and CLI arguments
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("throttlepool={}", config.log_level).parse()?)
                .add_directive(format!("throttlepool_demo={}", config.log_level).parse()?),
        )
        .init();

    let pool = Arc::new(RateLimitedPool::new(config.pool_config()?)?);
    let stop = Arc::new(AtomicBool::new(false));

    tracing::info!(
        "Submitting {} tasks to {} workers, {} per {}s",
        config.tasks.count,
        config.pool.workers,
        config.pool.max_per_interval,
        config.pool.interval_secs
    );

    // Ctrl-C stops submitting, releases a submitter blocked on the quota
    // and drains the queue
    let signal_watch = {
        let pool = Arc::clone(&pool);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Canceled. Waiting for dispatched tasks to finish");
                stop.store(true, Ordering::SeqCst);
                if let Err(e) = tokio::task::spawn_blocking(move || pool.shutdown(true)).await {
                    tracing::error!("Shutdown after Ctrl-C panicked: {}", e);
                }
            }
        })
    };

    // Submission blocks on the quota, so it runs off the async workers
    let submitted = {
        let pool = Arc::clone(&pool);
        let stop = Arc::clone(&stop);
        let task_settings = config.tasks.clone();
        tokio::task::spawn_blocking(move || {
            let mut rng = rand::thread_rng();
            let plan =
                tasks::generate_tasks(task_settings.count, task_settings.max_sleep_secs, &mut rng);
            tasks::submit_all(&pool, plan, &stop)
        })
        .await
    };

    let handles = match submitted {
        Ok(result) => result?,
        Err(e) => {
            tracing::error!("Submission task panicked: {}", e);
            return Err(anyhow::anyhow!("Submission task panicked"));
        }
    };

    let outcomes = futures::future::join_all(handles).await;
    let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    for error in outcomes.iter().filter_map(|outcome| outcome.as_ref().err()) {
        tracing::error!("Task failed: {}", error);
    }

    signal_watch.abort();
    let closing = Arc::clone(&pool);
    tokio::task::spawn_blocking(move || closing.shutdown(true)).await?;

    let stats = pool.stats();
    if config.json_summary {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        tracing::info!(
            "Done: {} submitted, {} completed, {} failed, {} waited for a new interval",
            stats.submitted,
            stats.completed,
            failed,
            stats.throttled
        );
    }

    Ok(())
}
