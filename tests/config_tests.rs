//! Config file loading and validation against real TOML fixtures,
//! rather than only in-memory `Settings::default()` values.

use std::io::Write;

use edgelord_core::app::config::Settings;

fn write_toml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn minimal_toml_loads_with_defaults() {
    let file = write_toml(
        r#"
        dry_run = true
        "#,
    );
    let settings = Settings::load(file.path()).unwrap();
    assert!(settings.dry_run);
    assert_eq!(settings.exchange.api_url, "https://clob.polymarket.com");
    assert!(settings.strategies.gabagool.enabled);
}

#[test]
fn markets_list_parses_into_subscriptions() {
    let file = write_toml(
        r#"
        dry_run = true

        [[markets]]
        market_id = "m1"
        condition_id = "c1"
        yes_token_id = "yes-1"
        no_token_id = "no-1"
        "#,
    );
    let settings = Settings::load(file.path()).unwrap();
    assert_eq!(settings.markets.len(), 1);
    assert_eq!(settings.markets[0].market_id, "m1");
}

#[test]
fn live_trading_without_wallet_key_fails_to_load() {
    std::env::remove_var("WALLET_PRIVATE_KEY");
    let file = write_toml("dry_run = false\n");
    let result = Settings::load(file.path());
    assert!(result.is_err());
}

#[test]
fn missing_file_is_an_error() {
    let result = Settings::load("/nonexistent/path/config.toml");
    assert!(result.is_err());
}
