//! `rivets build`: write every bundled asset to an output directory.
//!
//! ```text
//! collect logical paths ──► par_iter ──► find_asset(bundle) ──► write_to
//!                                                          └──► write_to(.gz)
//! ```

use std::path::Path;
use std::time::Instant;

use anyhow::{Result, bail};
use rayon::prelude::*;
use rivets::environment::Environment;
use rivets::{debug, log};

use super::{BuildArgs, parse_filters, plural_count};

pub fn build_assets(env: &Environment, args: &BuildArgs) -> Result<()> {
    let started = Instant::now();
    let logical_paths: Vec<_> = env
        .each_logical_path(parse_filters(&args.filters)?)
        .map(|(logical_path, _)| logical_path)
        .collect();
    log!("build"; "{} found", plural_count(logical_paths.len(), "asset"));

    let failures: Vec<String> = logical_paths
        .par_iter()
        .filter_map(|logical_path| {
            write_asset(env, logical_path, &args.output, args.gzip)
                .err()
                .map(|e| format!("{logical_path}: {e:#}"))
        })
        .collect();

    for failure in &failures {
        log!("error"; "{}", failure);
    }
    if !failures.is_empty() {
        bail!("{} failed", plural_count(failures.len(), "asset"));
    }

    log!(
        "build"; "wrote {} to {} in {:.2?}",
        plural_count(logical_paths.len(), "asset"),
        args.output.display(),
        started.elapsed()
    );
    Ok(())
}

fn write_asset(env: &Environment, logical_path: &str, output: &Path, gzip: bool) -> Result<()> {
    let Some(asset) = env.find_asset(logical_path, true)? else {
        bail!("disappeared during build");
    };

    let target = output.join(asset.logical_path());
    asset.write_to(&target)?;
    if gzip {
        let mut gz = target.into_os_string();
        gz.push(".gz");
        asset.write_to(gz)?;
    }
    debug!("build"; "{} ({})", asset.logical_path(), plural_count(asset.length() as usize, "byte"));
    Ok(())
}
