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

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};

use super::*;

/// Loads the [`RoundRelayerConfig`] from the process environment.
///
/// Variable names are matched case-insensitively against the field names,
/// so `EVM_RPC` populates `evm_rpc`. Unrelated variables are ignored.
pub fn load_from_env() -> round_relayer_utils::Result<RoundRelayerConfig> {
    let builder = Config::builder().add_source(Environment::default());
    parse_from_builder(builder)
}

/// Try to parse the [`RoundRelayerConfig`] from the given sources.
pub fn parse_from_builder(
    builder: ConfigBuilder<DefaultState>,
) -> round_relayer_utils::Result<RoundRelayerConfig> {
    let cfg = builder.build()?;
    let config: Result<
        RoundRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Rejects values that deserialize fine but cannot drive a run.
pub fn postloading_process(
    config: RoundRelayerConfig,
) -> round_relayer_utils::Result<RoundRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");
    if config.scan_page_size == 0 {
        return Err(round_relayer_utils::Error::Generic(
            "SCAN_PAGE_SIZE must be greater than zero",
        ));
    }
    if config.collector_concurrency == 0 {
        return Err(round_relayer_utils::Error::Generic(
            "COLLECTOR_CONCURRENCY must be greater than zero",
        ));
    }
    if config.target_gas_price.wei().is_zero() {
        return Err(round_relayer_utils::Error::Generic(
            "TARGET_GAS_PRICE must be greater than zero",
        ));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [(&str, &str); 7] = [
        ("evm_rpc", "http://localhost:8545"),
        ("evm_bridge", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
        (
            "evm_seed",
            "test test test test test test test test test test test junk",
        ),
        ("ton_rpc", "http://localhost:8080/rpc"),
        (
            "round_relays_configuration",
            "0:3c6e8b1d0a7ab2e7a0b1e4c9b1c8d0a8f7e6d5c4b3a291807f6e5d4c3b2a1908",
        ),
        (
            "cell_encoder",
            "0:a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90",
        ),
        ("target_gas_price", "40"),
    ];

    fn builder_with(
        values: &[(&str, &str)],
    ) -> ConfigBuilder<DefaultState> {
        values.iter().fold(Config::builder(), |builder, (k, v)| {
            builder.set_override(*k, *v).expect("valid override")
        })
    }

    #[test]
    fn parses_required_values_and_fills_defaults() {
        let config = parse_from_builder(builder_with(&REQUIRED)).unwrap();
        assert_eq!(config.round_relays_configuration.workchain(), 0);
        assert_eq!(
            config.target_gas_price.wei(),
            ethers::types::U256::from(40_000_000_000u64)
        );
        assert_eq!(config.scan_page_size, defaults::scan_page_size());
        assert_eq!(config.scan_start_timestamp, 0);
        assert!(config.dry_run_before_submit);
        assert!(config.evm_explorer.is_none());
    }

    #[test]
    fn optional_values_are_coerced_from_strings() {
        let mut values = REQUIRED.to_vec();
        values.push(("scan_page_size", "10"));
        values.push(("dry_run_before_submit", "false"));
        values.push(("request_timeout", "500"));
        let config = parse_from_builder(builder_with(&values)).unwrap();
        assert_eq!(config.scan_page_size, 10);
        assert!(!config.dry_run_before_submit);
        assert_eq!(config.request_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn missing_required_value_names_it() {
        for (missing, _) in REQUIRED {
            let values: Vec<_> = REQUIRED
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = parse_from_builder(builder_with(&values))
                .expect_err("config should be rejected");
            assert!(
                err.to_string().contains(missing),
                "error `{err}` should mention `{missing}`"
            );
        }
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut values = REQUIRED.to_vec();
        values.push(("scan_page_size", "0"));
        assert!(parse_from_builder(builder_with(&values)).is_err());
    }
}
