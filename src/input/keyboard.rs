//! Keyboard routing: modifier tracking, keybind dispatch, and the fixed
//! switcher interception (Tab / Shift+Tab / Escape / modifier release).

use smithay::backend::input::KeyState;
use smithay::input::keyboard::{FilterResult, Keysym};
use smithay::utils::SERIAL_COUNTER;
use xkbcommon::xkb::Keycode;

use crate::config::{BindAction, ModMask};
use crate::state::Infinidesk;

/// What the key filter decided; executed after the seat call returns so
/// dispatch never re-enters the keyboard handle.
enum KeyAction {
    None,
    Bind(BindAction, ModMask),
    SwitcherNext,
    SwitcherPrev,
    SwitcherConfirm,
    SwitcherCancel,
}

impl Infinidesk {
    pub fn on_keyboard_key(&mut self, keycode: Keycode, key_state: KeyState, time: u32) {
        let Some(keyboard) = self.seat.get_keyboard() else {
            return;
        };
        let serial = SERIAL_COUNTER.next_serial();

        let action = keyboard.input::<KeyAction, _>(
            self,
            keycode,
            key_state,
            serial,
            time,
            |state, mods, handle| {
                // Track the canvas-gesture modifier regardless of routing.
                let canvas_modifier = state.config.canvas_modifier;
                if handle
                    .raw_syms()
                    .iter()
                    .any(|&sym| canvas_modifier.matches_keysym(sym))
                {
                    state.modifier_pressed = key_state == KeyState::Pressed;
                }

                // The active switcher owns the keyboard entirely.
                if state.switcher.active {
                    let sym = handle.modified_sym();
                    let action = match key_state {
                        KeyState::Pressed => match sym {
                            Keysym::Escape => KeyAction::SwitcherCancel,
                            Keysym::Tab | Keysym::ISO_Left_Tab => {
                                if mods.shift {
                                    KeyAction::SwitcherPrev
                                } else {
                                    KeyAction::SwitcherNext
                                }
                            }
                            _ => KeyAction::None,
                        },
                        KeyState::Released => {
                            let released_chord_mod = state.switcher_chord.is_some_and(|chord| {
                                handle.raw_syms().iter().any(|&sym| chord.contains_keysym(sym))
                            });
                            if released_chord_mod {
                                KeyAction::SwitcherConfirm
                            } else {
                                KeyAction::None
                            }
                        }
                    };
                    return FilterResult::Intercept(action);
                }

                if key_state == KeyState::Pressed {
                    // First matching bind wins.
                    for bind in &state.keybinds {
                        if !bind.modifiers.matches(mods) {
                            continue;
                        }
                        let hit = handle.modified_sym() == bind.keysym
                            || handle.raw_syms().iter().any(|&sym| sym == bind.keysym);
                        if hit {
                            return FilterResult::Intercept(KeyAction::Bind(
                                bind.action.clone(),
                                bind.modifiers,
                            ));
                        }
                    }
                }

                // Unhandled: deliver to the focused client.
                FilterResult::Forward
            },
        );

        match action {
            Some(KeyAction::Bind(bind, chord)) => self.run_bind_action(&bind, chord),
            Some(KeyAction::SwitcherNext) => {
                let ids = self.mapped_ids();
                self.switcher.next(&ids);
            }
            Some(KeyAction::SwitcherPrev) => {
                let ids = self.mapped_ids();
                self.switcher.prev(&ids);
            }
            Some(KeyAction::SwitcherConfirm) => self.switcher_confirm(),
            Some(KeyAction::SwitcherCancel) => self.switcher_cancel(),
            Some(KeyAction::None) | None => {}
        }
    }
}
