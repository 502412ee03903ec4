//! Unit tests for the configuration snapshot.

use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::manifest::OptionKind;

#[fixture]
fn init_params() -> serde_json::Value {
    json!({
        "options": {"greeting": "gday"},
        "configuration": {
            "lightning-dir": "/home/node/.lightning/bitcoin",
            "rpc-file": "lightning-rpc",
            "network": "bitcoin",
            "startup": true
        }
    })
}

fn declared() -> Vec<ConfigOption> {
    vec![
        ConfigOption::new("greeting", OptionKind::String, "greeting").with_default(json!("hello")),
        ConfigOption::new("retries", OptionKind::Int, "retry count").with_default(json!(3)),
        ConfigOption::new("verbose", OptionKind::Flag, "chatty mode"),
    ]
}

#[rstest]
fn daemon_supplied_value_wins_over_default(init_params: serde_json::Value) {
    let snapshot = ConfigSnapshot::from_init(&init_params, &declared());
    assert_eq!(snapshot.option("greeting"), Some(&json!("gday")));
}

#[rstest]
fn declared_default_fills_omitted_option(init_params: serde_json::Value) {
    let snapshot = ConfigSnapshot::from_init(&init_params, &declared());
    assert_eq!(snapshot.option("retries"), Some(&json!(3)));
}

#[rstest]
fn option_without_value_or_default_is_absent(init_params: serde_json::Value) {
    let snapshot = ConfigSnapshot::from_init(&init_params, &declared());
    assert_eq!(snapshot.option("verbose"), None);
}

#[rstest]
fn daemon_identity_accessors(init_params: serde_json::Value) {
    let snapshot = ConfigSnapshot::from_init(&init_params, &declared());

    assert_eq!(snapshot.network(), Some("bitcoin"));
    assert_eq!(snapshot.lightning_dir(), Some("/home/node/.lightning/bitcoin"));
    assert_eq!(snapshot.rpc_file(), Some("lightning-rpc"));
    assert!(snapshot.startup());
}

#[test]
fn tolerates_missing_sections() {
    let snapshot = ConfigSnapshot::from_init(&json!({}), &[]);

    assert!(snapshot.options().is_empty());
    assert!(snapshot.configuration().is_empty());
    assert_eq!(snapshot.network(), None);
    assert!(snapshot.startup());
}
