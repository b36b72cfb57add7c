mod config;
mod db;
mod error;
mod inference;
mod ledger;
mod matcher;
mod providers;
mod rounds;
mod sync;
mod types;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::store::Store;
use crate::error::{AppError, Result};
use crate::sync::{Stage, SyncOptions, SyncRunner};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    let opts = match parse_args(std::env::args().skip(1)) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            print_usage();
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    match run(cfg, opts).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {e}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every attempted stage succeeded.
async fn run(cfg: Config, opts: SyncOptions) -> Result<bool> {
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    let runner = SyncRunner::new(cfg, Store::new(pool))?;
    let report = runner.run(&opts).await;
    Ok(report.success())
}

/// `Ok(None)` means help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<SyncOptions>> {
    let mut opts = SyncOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--daily" => opts.daily = true,
            "--stage" => {
                let name = args
                    .next()
                    .ok_or_else(|| AppError::Config("--stage requires a name".to_string()))?;
                let stage = Stage::parse(&name).ok_or_else(|| {
                    AppError::Config(format!("unknown stage {name:?}"))
                })?;
                opts.only = Some(stage);
            }
            "--help" | "-h" => return Ok(None),
            other => {
                return Err(AppError::Config(format!("unknown argument {other:?}")));
            }
        }
    }

    Ok(Some(opts))
}

fn print_usage() {
    println!("Usage: fantasy-sync [--daily] [--stage <name>]");
    println!();
    println!("  --daily          skip rarely-changing enrichment stages");
    println!("  --stage <name>   run a single stage, one of:");
    for stage in Stage::ALL {
        println!("                     {}", stage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<SyncOptions>> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn default_is_full_run() {
        let opts = parse(&[]).unwrap().unwrap();
        assert!(opts.only.is_none());
        assert!(!opts.daily);
    }

    #[test]
    fn daily_and_stage_flags() {
        let opts = parse(&["--daily"]).unwrap().unwrap();
        assert!(opts.daily);

        let opts = parse(&["--stage", "initial-squads"]).unwrap().unwrap();
        assert_eq!(opts.only, Some(Stage::InitialSquads));
    }

    #[test]
    fn bad_stage_is_rejected() {
        assert!(parse(&["--stage", "bogus"]).is_err());
        assert!(parse(&["--stage"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn help_short_circuits() {
        assert!(parse(&["--help"]).unwrap().is_none());
    }
}
