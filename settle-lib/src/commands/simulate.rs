use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::watch::FnSampler;
use clap::Parser;
use core::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use core::time::Duration;
use ohno::bail;
use std::sync::Arc;

const LOG_TARGET: &str = "  simulate";

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of items the simulated operation is asked to add
    #[arg(long, short = 'n', value_name = "COUNT", default_value_t = 3)]
    pub items: u64,

    /// Delay between two items arriving
    #[arg(long, value_name = "DURATION", default_value = "300ms", value_parser = humantime_serde::re::humantime::parse_duration)]
    pub interval: Duration,

    /// Number of items that never arrive
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub lose: u64,

    /// Items already in the container before the operation starts
    #[arg(long, value_name = "COUNT", default_value_t = 0)]
    pub existing: u64,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// A container filled by a background writer, standing in for an external subsystem.
#[derive(Debug, Default)]
struct SimulatedContainer {
    rows: AtomicI64,
    input_pending: AtomicBool,
}

impl SimulatedContainer {
    fn sampler(self: Arc<Self>) -> FnSampler<impl Fn() -> i64 + Send + Sync, impl Fn() -> bool + Send + Sync> {
        let rows = Arc::clone(&self);
        let input = self;
        FnSampler::new(
            move || rows.rows.load(Ordering::Acquire),
            move || !input.input_pending.load(Ordering::Acquire),
        )
    }

    /// Append `count` rows, one every `interval`, then mark the input as consumed.
    async fn fill(self: Arc<Self>, count: u64, interval: Duration) {
        for _ in 0..count {
            tokio::time::sleep(interval).await;
            let rows = self.rows.fetch_add(1, Ordering::AcqRel) + 1;
            log::debug!(target: LOG_TARGET, "Row appended, container now holds {rows}");
        }

        self.input_pending.store(false, Ordering::Release);
        log::debug!(target: LOG_TARGET, "Input consumed");
    }
}

pub async fn simulate<H: Host>(host: &mut H, args: &SimulateArgs) -> Result<()> {
    if args.lose > args.items {
        bail!("cannot lose {} of {} item(s)", args.lose, args.items);
    }

    let mut common = Common::new(host, &args.common)?;

    let container = Arc::new(SimulatedContainer {
        rows: AtomicI64::new(i64::try_from(args.existing).unwrap_or(i64::MAX)),
        input_pending: AtomicBool::new(true),
    });

    let opts = common.watch_options(args.existing);
    let sampler = Arc::clone(&container).sampler();
    let writer = tokio::spawn(Arc::clone(&container).fill(args.items - args.lose, args.interval));

    let outcome = common.watch(args.items, sampler, opts).await?;
    writer.abort();
    common.report(&outcome);

    Ok(())
}
