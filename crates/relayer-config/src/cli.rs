// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::RoundRelayerConfig;
use anyhow::Context;
use std::path::PathBuf;
use structopt::StructOpt;

/// The Round Relayer Command-line tool
///
/// Relays at most one new round from the source ledger per invocation:
///
/// $ round-relayer -vvv --env-file ./relay.env
#[derive(StructOpt)]
#[structopt(name = "Round Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// A dotenv file to load before reading the environment.
    ///
    /// Defaults to `.env` in the working directory, if it exists.
    #[structopt(long = "env-file", value_name = "PATH", parse(from_os_str))]
    pub env_file: Option<PathBuf>,
}

/// Loads the configuration from the environment, after applying the
/// dotenv file selected by `opts`.
///
/// An explicitly passed env file must exist, the default `.env` is optional.
pub fn load_config(opts: &Opts) -> anyhow::Result<RoundRelayerConfig> {
    match opts.env_file.as_ref() {
        Some(path) => {
            dotenv::from_path(path).with_context(|| {
                format!("failed to load env file {}", path.display())
            })?;
            tracing::trace!("Loaded {}", path.display());
        }
        None => match dotenv::dotenv() {
            Ok(path) => tracing::trace!("Loaded {}", path.display()),
            Err(e) => tracing::debug!("No .env file loaded: {}", e),
        },
    }
    tracing::trace!("Loading Config from the environment ..");
    let config = crate::utils::load_from_env()
        .context("invalid relayer configuration")?;
    tracing::trace!("Config loaded..");
    Ok(config)
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
///
/// Returns `Ok(())` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `verbosity` - An i32 integer representing the verbosity level.
/// * `filter` -  An filter for the target crate, e.g. `round_relayer`.
pub fn setup_logger(verbosity: i32, filter: &str) -> anyhow::Result<()> {
    use tracing::Level;
    let log_level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    for target in [filter, "round_relays", round_relayer_utils::probe::TARGET]
    {
        env_filter =
            env_filter.add_directive(format!("{target}={log_level}").parse()?);
    }
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter)
        .pretty()
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;
    Ok(())
}
