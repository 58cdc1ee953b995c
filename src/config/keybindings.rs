//! Keybind chord grammar and the action table.
//!
//! A chord is a `+`-separated list of modifier tokens followed by an XKB
//! keysym name: `"super + shift + q"`. Values are either one of the
//! recognised action names or `"exec:<shell command>"`.

use std::fmt;

use smithay::input::keyboard::{Keysym, ModifiersState};
use thiserror::Error;
use xkbcommon::xkb;

/// Compositor actions that can be bound to a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CloseWindow,
    Exit,
    ToggleDrawing,
    ClearDrawings,
    UndoStroke,
    RedoStroke,
    GatherWindows,
    WindowSwitcher,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "close_window" => Action::CloseWindow,
            "exit" => Action::Exit,
            "toggle_drawing" => Action::ToggleDrawing,
            "clear_drawings" => Action::ClearDrawings,
            "undo_stroke" => Action::UndoStroke,
            "redo_stroke" => Action::RedoStroke,
            "gather_windows" => Action::GatherWindows,
            "window_switcher" => Action::WindowSwitcher,
            _ => return None,
        })
    }
}

/// What a bind does: a named compositor action or a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAction {
    Action(Action),
    Exec(String),
}

/// Modifier set of a chord, matched exactly against the keyboard state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModMask {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub logo: bool,
}

impl ModMask {
    pub fn matches(&self, state: &ModifiersState) -> bool {
        self.ctrl == state.ctrl
            && self.alt == state.alt
            && self.shift == state.shift
            && self.logo == state.logo
    }

    /// Whether the given keysym is one of this mask's modifier keys. Used
    /// by the switcher to detect release of the chord's modifier.
    pub fn contains_keysym(&self, sym: Keysym) -> bool {
        (self.alt && matches!(sym, Keysym::Alt_L | Keysym::Alt_R))
            || (self.logo && matches!(sym, Keysym::Super_L | Keysym::Super_R))
            || (self.ctrl && matches!(sym, Keysym::Control_L | Keysym::Control_R))
            || (self.shift && matches!(sym, Keysym::Shift_L | Keysym::Shift_R))
    }
}

impl fmt::Display for ModMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.logo {
            parts.push("super");
        }
        if self.alt {
            parts.push("alt");
        }
        if self.ctrl {
            parts.push("ctrl");
        }
        if self.shift {
            parts.push("shift");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// One parsed keybind: modifier mask + keysym + what it triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybind {
    pub modifiers: ModMask,
    pub keysym: Keysym,
    pub action: BindAction,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty chord")]
    EmptyChord,
    #[error("unknown modifier in chord {0:?}")]
    UnknownModifier(String),
    #[error("unknown keysym name {0:?}")]
    UnknownKeysym(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

/// Parses one `chord = value` pair from the `[keybinds]` table.
pub fn parse_bind(chord: &str, value: &str) -> Result<Keybind, ParseError> {
    let (modifiers, keysym) = parse_chord(chord)?;
    let action = parse_value(value)?;
    Ok(Keybind {
        modifiers,
        keysym,
        action,
    })
}

/// Parses a chord like `"super + shift + Tab"`. Modifier tokens are
/// case-insensitive; the final token is resolved as an XKB keysym name,
/// case-sensitive first and case-insensitive as a fallback.
pub fn parse_chord(chord: &str) -> Result<(ModMask, Keysym), ParseError> {
    let tokens: Vec<&str> = chord
        .split('+')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();

    let Some((&key_token, modifier_tokens)) = tokens.split_last() else {
        return Err(ParseError::EmptyChord);
    };

    let mut mask = ModMask::default();
    for token in modifier_tokens {
        match token.to_lowercase().as_str() {
            "super" => mask.logo = true,
            "alt" => mask.alt = true,
            "ctrl" => mask.ctrl = true,
            "shift" => mask.shift = true,
            _ => return Err(ParseError::UnknownModifier(chord.to_string())),
        }
    }

    let keysym = lookup_keysym(key_token)?;
    Ok((mask, keysym))
}

fn lookup_keysym(name: &str) -> Result<Keysym, ParseError> {
    let sym = xkb::keysym_from_name(name, xkb::KEYSYM_NO_FLAGS);
    if sym.raw() != xkb::keysyms::KEY_NoSymbol {
        return Ok(sym);
    }
    let sym = xkb::keysym_from_name(name, xkb::KEYSYM_CASE_INSENSITIVE);
    if sym.raw() != xkb::keysyms::KEY_NoSymbol {
        return Ok(sym);
    }
    Err(ParseError::UnknownKeysym(name.to_string()))
}

fn parse_value(value: &str) -> Result<BindAction, ParseError> {
    if let Some(command) = value.strip_prefix("exec:") {
        return Ok(BindAction::Exec(command.trim().to_string()));
    }
    Action::from_name(value)
        .map(BindAction::Action)
        .ok_or_else(|| ParseError::UnknownAction(value.to_string()))
}

/// The built-in binds, applied when the config has no `[keybinds]` table.
pub fn default_binds() -> Vec<Keybind> {
    const DEFAULTS: &[(&str, &str)] = &[
        ("super + Return", "exec:kitty"),
        ("super + q", "close_window"),
        ("super + Escape", "exit"),
        ("super + d", "toggle_drawing"),
        ("super + c", "clear_drawings"),
        ("super + u", "undo_stroke"),
        ("super + r", "redo_stroke"),
        ("super + g", "gather_windows"),
        ("alt + Tab", "window_switcher"),
    ];

    DEFAULTS
        .iter()
        .map(|(chord, value)| parse_bind(chord, value).expect("builtin binds always parse"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_chord() {
        let (mask, sym) = parse_chord("super + q").unwrap();
        assert!(mask.logo && !mask.alt && !mask.ctrl && !mask.shift);
        assert_eq!(sym, Keysym::q);
    }

    #[test]
    fn modifiers_in_any_order_and_case() {
        let (a, _) = parse_chord("Shift + Ctrl + t").unwrap();
        let (b, _) = parse_chord("CTRL+SHIFT+t").unwrap();
        assert_eq!(a, b);
        assert!(a.ctrl && a.shift);
    }

    #[test]
    fn whitespace_is_ignored() {
        let (mask, sym) = parse_chord("  alt   +  Tab ").unwrap();
        assert!(mask.alt);
        assert_eq!(sym, Keysym::Tab);
    }

    #[test]
    fn keysym_lookup_falls_back_to_case_insensitive() {
        // "escape" only resolves with the case-insensitive pass.
        let (_, sym) = parse_chord("super + escape").unwrap();
        assert_eq!(sym, Keysym::Escape);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_chord(""), Err(ParseError::EmptyChord));
        assert!(matches!(
            parse_chord("super + notakeyatall"),
            Err(ParseError::UnknownKeysym(_))
        ));
        assert!(matches!(
            parse_chord("hyper + q"),
            Err(ParseError::UnknownModifier(_))
        ));
    }

    #[test]
    fn parses_actions_and_exec() {
        let bind = parse_bind("super + g", "gather_windows").unwrap();
        assert_eq!(bind.action, BindAction::Action(Action::GatherWindows));

        let bind = parse_bind("super + Return", "exec: foot --fullscreen ").unwrap();
        assert_eq!(
            bind.action,
            BindAction::Exec("foot --fullscreen".to_string())
        );

        assert!(matches!(
            parse_bind("super + x", "frobnicate"),
            Err(ParseError::UnknownAction(_))
        ));
    }

    #[test]
    fn default_binds_cover_every_action() {
        let binds = default_binds();
        assert_eq!(binds.len(), 9);
        for action in [
            Action::CloseWindow,
            Action::Exit,
            Action::ToggleDrawing,
            Action::ClearDrawings,
            Action::UndoStroke,
            Action::RedoStroke,
            Action::GatherWindows,
            Action::WindowSwitcher,
        ] {
            assert!(
                binds
                    .iter()
                    .any(|bind| bind.action == BindAction::Action(action)),
                "missing default bind for {action:?}"
            );
        }
    }

    #[test]
    fn modifier_release_detection() {
        let (mask, _) = parse_chord("alt + Tab").unwrap();
        assert!(mask.contains_keysym(Keysym::Alt_L));
        assert!(mask.contains_keysym(Keysym::Alt_R));
        assert!(!mask.contains_keysym(Keysym::Super_L));
    }
}
