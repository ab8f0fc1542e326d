//! Property-based tests for StoreSettings serialization round-trip.
//!
//! Settings written by the settings engine must load back unchanged.

use proptest::prelude::*;
use threadwatch::types::settings::StoreSettings;

fn arb_store_settings() -> impl Strategy<Value = StoreSettings> {
    (
        0..600_000u64,
        0..600_000u64,
        1..4096usize,
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec("[a-z0-9.]{1,20}", 0..5),
    )
        .prop_map(
            |(persist_debounce_ms, change_debounce_ms, change_buffer, check_invariants, verbose_logs, archive_sites)| {
                StoreSettings {
                    persist_debounce_ms,
                    change_debounce_ms,
                    change_buffer,
                    check_invariants,
                    verbose_logs,
                    archive_sites,
                }
            },
        )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn store_settings_json_roundtrip(settings in arb_store_settings()) {
        let json = serde_json::to_string(&settings).unwrap();
        let restored: StoreSettings = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(restored, settings);
    }

    #[test]
    fn archive_site_lookup_matches_list(settings in arb_store_settings(), site in "[a-z0-9.]{1,20}") {
        let expected = settings.archive_sites.iter().any(|s| *s == site);
        prop_assert_eq!(settings.is_archive_site(&site), expected);
    }
}
