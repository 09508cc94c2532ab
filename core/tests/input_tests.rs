/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Tests for input validation and parsing functions

use beanaries_core::input::*;
use entity::project_config::DataSource;

#[test]
fn test_url_to_addr() {
    let addr = url_to_addr("127.0.0.1", 8080).unwrap();
    assert_eq!(addr.to_string(), "127.0.0.1:8080");

    let addr = url_to_addr("127.0.0.1", 65536).unwrap_err();
    assert_eq!(addr.to_string(), "port out of range 1-65535");

    let addr = url_to_addr("127.0.0.1", 0).unwrap_err();
    assert_eq!(addr.to_string(), "port out of range 1-65535");
}

#[test]
fn test_port_in_range() {
    assert_eq!(port_in_range("8001"), Ok(8001));
    assert!(port_in_range("0").is_err());
    assert!(port_in_range("abc").is_err());
}

#[test]
fn test_greater_than_zero() {
    assert_eq!(greater_than_zero::<usize>("5"), Ok(5));
    assert_eq!(
        greater_than_zero::<usize>("0"),
        Err("`0` is not larger than 0".to_string())
    );
    assert_eq!(
        greater_than_zero::<u64>("x"),
        Err("`x` is not a valid number".to_string())
    );
}

#[test]
fn test_parse_data_source() {
    assert_eq!(parse_data_source("obs"), Ok(DataSource::Obs));
    assert!(parse_data_source("circleci").is_err());
}

#[test]
fn test_resolve_secret() {
    assert_eq!(resolve_secret(&Some(" abc ".to_string()), &None), Some("abc".to_string()));
    assert_eq!(resolve_secret(&Some("".to_string()), &None), None);
    assert_eq!(resolve_secret(&None, &None), None);
    assert_eq!(resolve_secret(&None, &Some("/nonexistent/secret".to_string())), None);
}

#[test]
fn test_truncate_message() {
    assert_eq!(truncate_message("short", 10), "short");
    assert_eq!(truncate_message("exactly10!", 10), "exactly10!");
    assert_eq!(truncate_message("this is too long", 10), "this is...");

    let long = "é".repeat(3000);
    let truncated = truncate_message(&long, 2000);
    assert_eq!(truncated.chars().count(), 2000);
    assert!(truncated.ends_with("..."));
}
