//! Fuzz target for the `stratum.toml` parser.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_config_parser
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_migrate::StratumConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // The parser should never panic, only return errors
        if let Ok(config) = input.parse::<StratumConfig>() {
            let _ = config.migrations.info_request();
        }
    }
});
