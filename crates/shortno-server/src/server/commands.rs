use anyhow::Context;
use shortno::{Error, Replenisher, ShortnoPool, ShortnoStore, Tick};
use std::{future::Future, io::Write, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Starts the replenishment loop and keeps it running until `shutdown`
/// resolves.
pub async fn run<S, F>(pool: &ShortnoPool<S>, shutdown: F) -> anyhow::Result<()>
where
    S: ShortnoStore,
    F: Future<Output = ()>,
{
    pool.start().context("failed to start replenishment")?;
    tracing::info!(
        digits = pool.config().digits,
        low_water_mark = pool.config().low_water_mark,
        batch_size = pool.config().batch_size,
        "Replenishment running"
    );

    shutdown.await;
    tracing::info!("Shutdown signal received, terminating gracefully...");
    pool.shutdown().await;
    Ok(())
}

/// Claims one value and writes it on its own line. Cancelling `token` before
/// a value is claimed aborts without claiming anything.
pub async fn allocate<S: ShortnoStore>(
    pool: &ShortnoPool<S>,
    token: &CancellationToken,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match pool.allocate_with(token).await {
        Ok(value) => {
            writeln!(out, "{value}")?;
            Ok(())
        }
        Err(Error::Exhausted) => {
            anyhow::bail!("pool is exhausted; run `refill` or wait for replenishment")
        }
        Err(e) => Err(e).context("allocation failed"),
    }
}

pub async fn mark_used<S: ShortnoStore>(
    pool: &ShortnoPool<S>,
    value: &str,
    owner: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    pool.record_used(value, owner)
        .await
        .with_context(|| format!("failed to record {value} as used by {owner}"))?;
    writeln!(out, "{value} used by {owner}")?;
    Ok(())
}

pub async fn stats<S: ShortnoStore>(
    pool: &ShortnoPool<S>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let stats = pool.stats().await.context("failed to read pool stats")?;
    writeln!(out, "total:    {}", stats.total)?;
    writeln!(out, "unlocked: {}", stats.unlocked)?;
    writeln!(out, "claimed:  {}", stats.claimed)?;
    writeln!(out, "used:     {}", stats.used)?;
    Ok(())
}

/// Runs exactly one replenishment pass. A pass that could not reach the
/// store is reported as an error.
pub async fn refill<S: ShortnoStore>(
    pool: &ShortnoPool<S>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let replenisher = Replenisher::new(Arc::clone(pool.store()), pool.config().clone())?;
    match replenisher.tick().await {
        Tick::Refilled { valid, report } => writeln!(
            out,
            "refilled: {valid} unlocked before, {} inserted, {} skipped",
            report.inserted, report.skipped
        )?,
        Tick::Sufficient { valid } => writeln!(
            out,
            "sufficient: {valid} unlocked (low-water mark {})",
            pool.config().low_water_mark
        )?,
        Tick::CountFailed => anyhow::bail!("could not read the unlocked count"),
        Tick::InsertFailed { valid } => {
            anyhow::bail!("batch insert failed with {valid} unlocked")
        }
    }
    Ok(())
}
