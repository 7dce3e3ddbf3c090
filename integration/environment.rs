use std::env;

use kommand::process::Stdio;

use crate::{script, Report};

pub fn run() {
    env::set_var("KOMMAND_INHERITED", "parent");
    env::set_var("KOMMAND_REMOVED", "parent");

    // Overrides apply on top of the parent environment.
    let output = script("report")
        .env("KOMMAND_ADDED", "first")
        .env("KOMMAND_ADDED", "second")
        .env_remove("KOMMAND_REMOVED")
        .stdout(Stdio::piped())
        .output()
        .unwrap();
    let report: Report = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report.env.get("KOMMAND_INHERITED").map(String::as_str), Some("parent"));
    assert_eq!(report.env.get("KOMMAND_ADDED").map(String::as_str), Some("second"));
    assert!(!report.env.contains_key("KOMMAND_REMOVED"));

    // Clearing leaves only explicit variables.
    let output = script("report")
        .env_clear()
        .env("KOMMAND_ONLY", "value")
        .stdout(Stdio::piped())
        .output()
        .unwrap();
    let report: Report = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report.env.get("KOMMAND_ONLY").map(String::as_str), Some("value"));
    assert!(!report.env.contains_key("KOMMAND_INHERITED"));

    // Arguments arrive verbatim.
    let args = ["plain", "with space", "quote\"d", "", "back\\slash\\"];
    let output = script("report").args(args).stdout(Stdio::piped()).output().unwrap();
    let report: Report = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report.args, args);
}
