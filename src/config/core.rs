use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use smithay::input::keyboard::Keysym;

use super::keybindings::{self, Keybind};
use super::paths::config_file_path;

/// Modifier that drives canvas gestures (window move, pan, zoom).
/// Configurable because Super is frequently swallowed by the host
/// compositor when running nested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasModifier {
    #[default]
    Super,
    Alt,
}

impl CanvasModifier {
    /// Whether a key event for `sym` is this modifier going down or up.
    /// Tracking works off the raw keysyms so the press registers even
    /// while another modifier is already held.
    pub fn matches_keysym(self, sym: Keysym) -> bool {
        match self {
            CanvasModifier::Super => matches!(sym, Keysym::Super_L | Keysym::Super_R),
            CanvasModifier::Alt => matches!(sym, Keysym::Alt_L | Keysym::Alt_R),
        }
    }
}

/// User configuration, deserialized from
/// `~/.config/infinidesk/infinidesk.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Output scale factor for HiDPI displays.
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Modifier for canvas gestures.
    #[serde(default)]
    pub canvas_modifier: CanvasModifier,

    /// Shell commands forked once on startup.
    #[serde(default)]
    pub startup: Vec<String>,

    /// Chord -> action/exec mapping. `None` (section absent) enables the
    /// built-in defaults; an empty table disables all binds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keybinds: Option<BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            canvas_modifier: CanvasModifier::default(),
            startup: Vec::new(),
            keybinds: None,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

impl Config {
    /// Loads the configuration, creating a documented default file on
    /// first run. Parse errors fall back to defaults with a warning so a
    /// broken config never prevents the compositor from starting.
    pub fn load() -> Result<Self> {
        let path = config_file_path()?;
        ensure_config_file(&path)?;
        Ok(Self::load_from(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("failed to read {}: {err}; using defaults", path.display());
                return Self::default();
            }
        };

        let mut config: Config = match toml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to parse {}: {err}; using defaults", path.display());
                return Self::default();
            }
        };

        config.validate_and_clamp();
        info!("loaded config from {}", path.display());
        config
    }

    fn validate_and_clamp(&mut self) {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            warn!("invalid scale {}, falling back to 1.0", self.scale);
            self.scale = 1.0;
        } else if !(0.25..=4.0).contains(&self.scale) {
            let clamped = self.scale.clamp(0.25, 4.0);
            warn!("scale {} out of range, clamped to {clamped}", self.scale);
            self.scale = clamped;
        }
    }

    /// Parses the keybind table, skipping malformed entries with a
    /// warning. The defaults apply only when the section is absent.
    pub fn resolved_binds(&self) -> Vec<Keybind> {
        let Some(table) = &self.keybinds else {
            return keybindings::default_binds();
        };

        let mut binds = Vec::with_capacity(table.len());
        for (chord, value) in table {
            match keybindings::parse_bind(chord, value) {
                Ok(bind) => binds.push(bind),
                Err(err) => warn!("skipping keybind {chord:?} = {value:?}: {err}"),
            }
        }
        binds
    }
}

/// Writes the documented default config on first run, creating parent
/// directories (mode 0755 comes from the process umask).
fn ensure_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let default_config = include_str!("../../config.example.toml");
    fs::write(path, default_config)
        .with_context(|| format!("writing default config to {}", path.display()))?;

    info!("created default config file: {}", path.display());
    Ok(())
}

/// Test-visible wrapper so the first-run path is covered without
/// touching the real HOME.
#[cfg(test)]
pub(super) fn ensure_config_file_at(path: &Path) -> Result<()> {
    ensure_config_file(path)
}
