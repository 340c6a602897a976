use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::watch::Sampler;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::bail;
use std::fs;
use walkdir::WalkDir;

const LOG_TARGET: &str = "       dir";

#[derive(Parser, Debug)]
pub struct DirArgs {
    /// Directory whose entries are counted
    #[arg(value_name = "DIR")]
    pub path: Utf8PathBuf,

    /// Number of new entries to wait for
    #[arg(long, short = 'n', value_name = "COUNT")]
    pub expect: u64,

    /// File or directory holding the pending input; it counts as consumed once it is
    /// missing or empty. Without it, only the target or the hard timeout end the watch.
    #[arg(long, value_name = "PATH")]
    pub input: Option<Utf8PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Samples the number of entries directly inside a directory.
#[derive(Debug, Clone)]
pub struct DirSampler {
    dir: Utf8PathBuf,
    input: Option<Utf8PathBuf>,
}

impl DirSampler {
    #[must_use]
    pub const fn new(dir: Utf8PathBuf, input: Option<Utf8PathBuf>) -> Self {
        Self { dir, input }
    }
}

impl Sampler for DirSampler {
    fn count(&self) -> i64 {
        let entries = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::trace!(target: LOG_TARGET, "Skipping unreadable entry in '{}': {e}", self.dir);
                    None
                }
            })
            .count();

        i64::try_from(entries).unwrap_or(i64::MAX)
    }

    fn input_cleared(&self) -> bool {
        self.input.as_deref().is_some_and(is_consumed)
    }
}

/// A path is consumed once it is gone, an empty file, or an empty directory.
fn is_consumed(path: &Utf8Path) -> bool {
    match fs::metadata(path) {
        Err(_) => true,
        Ok(meta) if meta.is_dir() => fs::read_dir(path).map_or(true, |mut entries| entries.next().is_none()),
        Ok(meta) => meta.len() == 0,
    }
}

pub async fn process_dir<H: Host>(host: &mut H, args: &DirArgs) -> Result<()> {
    if !args.path.is_dir() {
        bail!("'{}' is not a directory", args.path);
    }

    let mut common = Common::new(host, &args.common)?;

    let sampler = DirSampler::new(args.path.clone(), args.input.clone());
    let baseline = u64::try_from(sampler.count()).unwrap_or(0);
    log::info!(target: LOG_TARGET, "Waiting for {} new entries in '{}' ({baseline} present)", args.expect, args.path);

    let opts = common.watch_options(baseline);
    let outcome = common.watch(args.expect, sampler, opts).await?;
    common.report(&outcome);

    Ok(())
}
