//! Action dispatch for keybinds and startup commands.

use std::process::Command;

use log::{info, warn};

use crate::config::{Action, BindAction, ModMask};
use crate::state::Infinidesk;

/// Forks `/bin/sh -c <cmd>`. Children are never waited on; SIGCHLD is
/// ignored process-wide so they do not zombify.
pub fn spawn_command(cmd: &str) {
    info!("spawning: {cmd}");
    if let Err(err) = Command::new("/bin/sh").arg("-c").arg(cmd).spawn() {
        warn!("failed to spawn {cmd:?}: {err}");
    }
}

impl Infinidesk {
    /// Runs every configured startup command plus the `--startup` CLI
    /// one, after `WAYLAND_DISPLAY` has been published.
    pub fn run_startup_commands(&self, cli_command: Option<&str>) {
        for cmd in &self.config.startup {
            spawn_command(cmd);
        }
        if let Some(cmd) = cli_command {
            spawn_command(cmd);
        }
    }

    pub fn run_bind_action(&mut self, action: &BindAction, chord: ModMask) {
        match action {
            BindAction::Exec(cmd) => spawn_command(cmd),
            BindAction::Action(action) => self.run_action(*action, chord),
        }
    }

    pub fn run_action(&mut self, action: Action, chord: ModMask) {
        match action {
            Action::CloseWindow => self.close_topmost(),
            Action::Exit => {
                info!("exit requested");
                self.running = false;
            }
            Action::ToggleDrawing => {
                self.drawing.toggle_mode();
                if let Some(size) = self.primary_output().map(|o| o.logical_size()) {
                    self.drawing.panel.reposition(size.h);
                }
            }
            Action::ClearDrawings => self.drawing.clear_all(),
            Action::UndoStroke => self.drawing.undo_last(),
            Action::RedoStroke => self.drawing.redo_last(),
            Action::GatherWindows => self.gather_windows(),
            Action::WindowSwitcher => self.switcher_start(chord),
        }
    }
}
