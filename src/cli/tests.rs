//! Unit tests for CLI commands

use crate::cli::{run, Cli, Commands};
use clap::Parser;
use std::fs;

#[test]
fn test_serve_command_with_overrides() {
    let cli = Cli::try_parse_from([
        "jolt", "serve", "--config", "app.yaml", "--port", "9000", "--address", "127.0.0.1",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve {
            config,
            port,
            address,
        } => {
            assert_eq!(config.to_string_lossy(), "app.yaml");
            assert_eq!(port, Some(9000));
            assert_eq!(address.as_deref(), Some("127.0.0.1"));
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_requires_config() {
    assert!(Cli::try_parse_from(["jolt", "serve"]).is_err());
}

#[test]
fn test_check_prints_compiled_stylesheet() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("site.css");
    fs::write(&file, "a {\n  color: red;\n}\n").unwrap();

    let mut out = Vec::new();
    run(&Commands::Check { file }, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), "a{color:red}");
}

#[test]
fn test_check_reports_template_error_line() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.jst");
    fs::write(&file, "<p>\n{% for %}\n</p>").unwrap();

    let mut out = Vec::new();
    let result = run(&Commands::Check { file: file.clone() }, &mut out);
    assert!(result.is_err());
    let printed = String::from_utf8(out).unwrap();
    assert!(printed.contains(&format!("{}:2", file.display())));
}

#[test]
fn test_check_accepts_script() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("health.jss");
    fs::write(&file, "{{ res.end('ok') }}\r\n").unwrap();

    let mut out = Vec::new();
    run(&Commands::Check { file }, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "{{ res.end('ok') }}\n\n");
}

#[test]
fn test_routes_lists_mounts_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("app.yaml");
    fs::write(
        &config,
        "mounts:\n  - { verb: zeta, kind: stylesheets, path: css }\n  - { verb: blog, kind: templates, path: views }\n",
    )
    .unwrap();

    let mut out = Vec::new();
    run(&Commands::Routes { config }, &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("/blog"));
    assert!(lines[0].contains("templates"));
    assert!(lines[1].starts_with("/zeta"));
}
