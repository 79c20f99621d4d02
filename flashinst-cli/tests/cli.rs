//! End-to-end tests for the flashinst commands on temporary images

use std::fs;
use std::path::Path;

use clap::Parser;
use flashinst_cli::cli::{Cli, run_to};

fn run(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("flashinst").chain(args.iter().copied()))?;
    let mut out = Vec::new();
    run_to(cli, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_install_then_cat() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");
    let payload = dir.path().join("game.js");
    fs::write(&payload, "console.log('hi')").unwrap();

    let msg = run(&["install", s(&image), "--payload", s(&payload)]).unwrap();
    assert!(msg.contains("17 bytes"));
    assert_eq!(fs::metadata(&image).unwrap().len(), 64 * 4096);

    let spec = format!("{}:/game.js", s(&image));
    assert_eq!(run(&["cat", &spec]).unwrap(), "console.log('hi')");
}

#[test]
fn test_install_bundled_script() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");

    run(&["install", s(&image), "--pages", "128"]).unwrap();

    let spec = format!("{}:/game.js", s(&image));
    assert_eq!(run(&["cat", &spec]).unwrap().as_bytes(), flashinst::GAME_JS);
    assert!(run(&["ls", s(&image)]).unwrap().contains("game.js"));
}

#[test]
fn test_reinstall_with_fixed_timestamp_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    let ts = "2024-05-01T12:00:00+00:00";

    for image in [&a, &b] {
        run(&["format", s(image)]).unwrap();
        run(&["install", s(image), "--timestamp", ts]).unwrap();
    }
    assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
}

#[test]
fn test_read_commands_leave_image_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");
    run(&["install", s(&image)]).unwrap();
    let before = fs::read(&image).unwrap();

    run(&["info", s(&image)]).unwrap();
    run(&["ls", s(&image)]).unwrap();
    run(&["cat", &format!("{}:/game.js", s(&image))]).unwrap();

    assert_eq!(fs::read(&image).unwrap(), before);
}

#[test]
fn test_no_format_fails_on_erased_image() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");
    fs::write(&image, vec![0xFF; 16 * 4096]).unwrap();

    let err = run(&["install", s(&image), "--no-format"]).unwrap_err();
    assert!(err.to_string().contains("not formatted"));
    assert!(fs::read(&image).unwrap().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_nested_target_needs_parents() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");

    let err = run(&["install", s(&image), "--target", "/www/game.js"]).unwrap_err();
    assert!(err.to_string().starts_with("Failed to create file /www/game.js"));

    run(&["install", s(&image), "--target", "/www/game.js", "--parents"]).unwrap();
    let listing = run(&["ls", &format!("{}:/www", s(&image))]).unwrap();
    assert!(listing.contains("game.js"));
}

#[test]
fn test_info_reports_label() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");
    run(&["format", s(&image), "--label", "arcade"]).unwrap();

    let info = run(&["info", s(&image)]).unwrap();
    assert!(info.contains("Label:    ARCADE"));
    assert!(info.contains("Fat12"));
}

#[test]
fn test_cat_requires_image_notation() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");
    run(&["format", s(&image)]).unwrap();
    assert!(run(&["cat", s(&image)]).is_err());
}

#[test]
fn test_no_format_on_missing_image_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");

    let err = run(&["install", s(&image), "--no-format"]).unwrap_err();
    assert!(err.to_string().contains("not formatted"));
    assert!(!image.exists());
}

#[test]
fn test_oversized_page_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("flash.bin");

    assert!(run(&["format", s(&image), "--pages", "4294967295"]).is_err());
    assert!(run(&["install", s(&image), "--pages", "100000"]).is_err());
    assert!(!image.exists());
}
