//! Tests for resolve, versions, validate, platform, checksum, completions.

use super::{parse, parse_err};
use crate::cli::{exit_code, CliCommand};
use fetchbin_core::error::Error;
use fetchbin_core::platform::{Arch, Os, Platform};
use std::path::PathBuf;

#[test]
fn cli_parse_resolve() {
    match parse(&["fetchbin", "resolve", "latest", "-t", "yo.json", "--json"]) {
        CliCommand::Resolve {
            table,
            platform,
            json,
            ..
        } => {
            assert_eq!(table.table, PathBuf::from("yo.json"));
            assert!(platform.is_none());
            assert!(json);
        }
        _ => panic!("expected Resolve"),
    }
}

#[test]
fn cli_parse_versions_with_platform() {
    match parse(&["fetchbin", "versions", "-t", "yo.toml", "--platform", "linux/arm64"]) {
        CliCommand::Versions { platform, .. } => {
            assert_eq!(platform, Some(Platform::new(Os::Linux, Arch::Aarch64)));
        }
        _ => panic!("expected Versions"),
    }
}

#[test]
fn cli_parse_validate() {
    match parse(&["fetchbin", "validate", "--table", "yo.toml"]) {
        CliCommand::Validate { table } => assert_eq!(table.table, PathBuf::from("yo.toml")),
        _ => panic!("expected Validate"),
    }
}

#[test]
fn cli_parse_platform() {
    match parse(&["fetchbin", "platform"]) {
        CliCommand::Platform => {}
        _ => panic!("expected Platform"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["fetchbin", "checksum", "/tmp/yo.tar.gz"]) {
        CliCommand::Checksum { path } => assert_eq!(path, PathBuf::from("/tmp/yo.tar.gz")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["fetchbin", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
    parse_err(&["fetchbin", "completions", "tcsh"]);
}

#[test]
fn exit_codes_follow_error_class() {
    let err = anyhow::Error::new(Error::UnknownVersion("9.9.9".into()));
    assert_eq!(exit_code(&err), Error::UnknownVersion(String::new()).exit_code());
    let err = anyhow::Error::new(Error::Cancelled).context("installing yo");
    assert_eq!(exit_code(&err), 130);
    assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
}
