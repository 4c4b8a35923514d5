//! `fixity`: print cached BLAKE3 digests of files and directory trees.
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use exn::ResultExt;
use fixity_cache::{CacheStore, StoreHandle};
use fixity_config::Config;
use fixity_verifier::ContentVerifier;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("cache error")]
    Cache,
    #[display("could not check {}", _0.display())]
    Check(#[error(not(source))] PathBuf),
}

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the digest of each file, or of every file below each directory.
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Ignore cached digests and re-read every file.
        #[arg(short, long)]
        force: bool,
    },
    /// Remove expired entries from the cache.
    Purge,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let store = config.connect().await.or_raise(|| ErrorKind::Cache)?;
    match cli.command {
        Command::Check { paths, force } => {
            let verifier = ContentVerifier::new(store);
            for path in &paths {
                check(&verifier, path, force).await.or_raise(|| ErrorKind::Check(path.clone()))?;
            }
        },
        Command::Purge => {
            let purged = store.purge().await.or_raise(|| ErrorKind::Cache)?;
            println!("{purged}");
        },
    }
    Ok(())
}

async fn check(verifier: &ContentVerifier<StoreHandle>, path: &Path, force: bool) -> fixity_verifier::error::Result<()> {
    if tokio::fs::metadata(path).await.is_ok_and(|metadata| metadata.is_dir()) {
        for (file, digest) in verifier.check_directory(path, force).await? {
            println!("{digest}  {}", file.display());
        }
    } else {
        let digest = verifier.check_file(path, force).await?;
        println!("{digest}  {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_check() {
        let cli = Cli::try_parse_from(["fixity", "check", "--force", "f1", "d1", "--config", "fixity.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("fixity.toml")));
        match cli.command {
            Command::Check { paths, force } => {
                assert_eq!(paths, vec![PathBuf::from("f1"), PathBuf::from("d1")]);
                assert!(force);
            },
            Command::Purge => panic!("expected check"),
        }
    }

    #[test]
    fn check_needs_a_path() {
        assert!(Cli::try_parse_from(["fixity", "check"]).is_err());
    }
}
