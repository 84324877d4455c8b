//! Fuzz target: stored config blob decoding
//!
//! Feeds arbitrary bytes through the same postcard + validation path the
//! NVS adapter uses on boot and verifies:
//! - No panics under any byte sequence
//! - A blob that passes validation yields a usable carousel geometry
//!   (every compartment maps back to itself)
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use petfeeder::config::{FeederConfig, validate_config};

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = postcard::from_bytes::<FeederConfig>(data) else {
        return;
    };
    if validate_config(&cfg).is_err() {
        return;
    }

    let geometry = cfg.carousel_geometry();
    for idx in 0..geometry.total_compartments {
        assert_eq!(geometry.compartment_at(geometry.position_of(idx)), idx);
    }
    assert!(cfg.feeding_compartment < geometry.total_compartments);
});
