//! Configuration file support.
//!
//! Settings live at `~/.config/infinidesk/infinidesk.toml`: the output
//! scale, startup commands, the canvas-gesture modifier, and the keybind
//! table. A documented default file is written on first run; if the file
//! cannot be parsed the defaults are used so the compositor still starts.

pub mod keybindings;

mod core;
mod paths;

#[cfg(test)]
mod tests;

pub use core::{CanvasModifier, Config};
pub use keybindings::{Action, BindAction, Keybind, ModMask};
