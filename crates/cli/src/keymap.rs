//! Key bindings for the dashboard.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One binding: the key chords that trigger it and its help text.
pub struct Binding {
    keys: &'static [(KeyModifiers, KeyCode)],
    pub label: &'static str,
    pub help: &'static str,
}

impl Binding {
    pub fn matches(&self, event: KeyEvent) -> bool {
        self.keys
            .iter()
            .any(|(modifiers, code)| event.modifiers == *modifiers && event.code == *code)
    }
}

/// The dashboard's bindings, grouped by the mode they apply in.
pub struct Keymap {
    /// Restart the supervised command.
    pub reload: Binding,
    /// Enter command editing.
    pub edit_command: Binding,
    /// Leave the dashboard.
    pub quit: Binding,
    /// While editing: run the edited command.
    pub save: Binding,
    /// While editing: discard the edit.
    pub cancel: Binding,
    /// While editing: leave the dashboard entirely.
    pub editing_quit: Binding,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            reload: Binding {
                keys: &[(KeyModifiers::NONE, KeyCode::Char('r'))],
                label: "r",
                help: "reload",
            },
            edit_command: Binding {
                keys: &[(KeyModifiers::NONE, KeyCode::Char('e'))],
                label: "e",
                help: "edit command",
            },
            quit: Binding {
                keys: &[
                    (KeyModifiers::NONE, KeyCode::Char('q')),
                    (KeyModifiers::NONE, KeyCode::Esc),
                    (KeyModifiers::CONTROL, KeyCode::Char('c')),
                ],
                label: "q",
                help: "quit",
            },
            save: Binding {
                keys: &[(KeyModifiers::NONE, KeyCode::Enter)],
                label: "enter",
                help: "run",
            },
            cancel: Binding {
                keys: &[(KeyModifiers::NONE, KeyCode::Esc)],
                label: "esc",
                help: "cancel",
            },
            editing_quit: Binding {
                keys: &[(KeyModifiers::CONTROL, KeyCode::Char('c'))],
                label: "ctrl-c",
                help: "quit",
            },
        }
    }
}

impl Keymap {
    /// The bindings shown in the footer for the current mode.
    pub fn help_entries(&self, editing: bool) -> Vec<&Binding> {
        if editing {
            vec![&self.save, &self.cancel, &self.editing_quit]
        } else {
            vec![&self.reload, &self.edit_command, &self.quit]
        }
    }
}
