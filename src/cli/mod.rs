//! Command-line interface.

mod args;
mod build;

pub use args::{BuildArgs, Cli, Commands};

use std::io::{Write, stdout};

use anyhow::{Context, Result};
use rivets::config::RivetsConfig;
use rivets::environment::{Environment, PathFilter};

/// Load `rivets.toml` and run the selected command.
pub fn run(cli: &Cli) -> Result<()> {
    let config = RivetsConfig::load(&cli.config)
        .with_context(|| format!("failed to load `{}`", cli.config.display()))?;
    let env = Environment::from_config(&config);
    rivets::debug!("config"; "root {}, {} search roots", env.root().display(), env.paths().len());

    match &cli.command {
        Commands::Compile { path, no_bundle } => compile(&env, path, !no_bundle),
        Commands::Resolve { path } => {
            println!("{}", env.resolve(path)?.display());
            Ok(())
        }
        Commands::List { filters } => {
            let mut out = stdout().lock();
            for (logical_path, _) in env.each_logical_path(parse_filters(filters)?) {
                writeln!(out, "{logical_path}")?;
            }
            Ok(())
        }
        Commands::Build { args } => build::build_assets(&env, args),
    }
}

fn compile(env: &Environment, path: &str, bundle: bool) -> Result<()> {
    let asset = env
        .find_asset(path, bundle)?
        .ok_or_else(|| rivets::Error::NotFound(path.to_string()))?;
    let mut out = stdout().lock();
    out.write_all(&asset.to_bytes()?)?;
    out.flush()?;
    Ok(())
}

/// `--filter` globs, matched against logical paths.
pub(crate) fn parse_filters(patterns: &[String]) -> Result<Vec<PathFilter>> {
    patterns
        .iter()
        .map(|pattern| {
            PathFilter::glob(pattern).with_context(|| format!("invalid filter `{pattern}`"))
        })
        .collect()
}

/// Format count with noun, handling pluralization
///
/// - `plural_count(1, "asset")` -> `"1 asset"`
/// - `plural_count(5, "asset")` -> `"5 assets"`
pub(crate) fn plural_count(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}
