use std::fs;

use super::core::ensure_config_file_at;
use super::keybindings::{Action, BindAction};
use super::{CanvasModifier, Config};

fn parse(contents: &str) -> Config {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("infinidesk.toml");
    fs::write(&path, contents).unwrap();
    Config::load_from(&path)
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("nope.toml"));
    assert_eq!(config.scale, 1.0);
    assert_eq!(config.canvas_modifier, CanvasModifier::Super);
    assert!(config.startup.is_empty());
    assert!(config.keybinds.is_none());
}

#[test]
fn parse_error_falls_back_to_defaults() {
    let config = parse("scale = [this is not toml");
    assert_eq!(config.scale, 1.0);
}

#[test]
fn top_level_keys_are_read() {
    let config = parse(
        r#"
scale = 2.0
canvas_modifier = "alt"
startup = ["waybar", "swaybg -c 303030"]
"#,
    );
    assert_eq!(config.scale, 2.0);
    assert_eq!(config.canvas_modifier, CanvasModifier::Alt);
    assert_eq!(config.startup, vec!["waybar", "swaybg -c 303030"]);
}

#[test]
fn out_of_range_scale_is_clamped() {
    assert_eq!(parse("scale = 100.0").scale, 4.0);
    assert_eq!(parse("scale = -1.0").scale, 1.0);
}

#[test]
fn absent_keybinds_section_enables_defaults() {
    let config = parse("scale = 1.0");
    let binds = config.resolved_binds();
    assert_eq!(binds.len(), 9);
    assert!(
        binds
            .iter()
            .any(|b| b.action == BindAction::Action(Action::WindowSwitcher))
    );
}

#[test]
fn explicit_keybinds_replace_defaults() {
    let config = parse(
        r#"
[keybinds]
"super + t" = "exec:foot"
"super + w" = "close_window"
"#,
    );
    let binds = config.resolved_binds();
    assert_eq!(binds.len(), 2);
    assert!(
        binds
            .iter()
            .any(|b| b.action == BindAction::Exec("foot".to_string()))
    );
}

#[test]
fn empty_keybinds_section_disables_all_binds() {
    let config = parse("[keybinds]\n");
    assert!(config.resolved_binds().is_empty());
}

#[test]
fn malformed_bind_lines_are_skipped() {
    let config = parse(
        r#"
[keybinds]
"super + q" = "close_window"
"super + nosuchkey" = "exit"
"super + x" = "not_an_action"
"#,
    );
    let binds = config.resolved_binds();
    assert_eq!(binds.len(), 1);
    assert_eq!(binds[0].action, BindAction::Action(Action::CloseWindow));
}

#[test]
fn first_run_creates_documented_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("infinidesk.toml");

    ensure_config_file_at(&path).unwrap();
    assert!(path.exists());

    // The generated file parses and matches the built-in defaults.
    let config = Config::load_from(&path);
    assert_eq!(config.scale, 1.0);
    let binds = config.resolved_binds();
    assert_eq!(binds.len(), 9);

    // Second run leaves the file alone.
    ensure_config_file_at(&path).unwrap();
}
