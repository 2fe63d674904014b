//! Dashboard state, kept separate from terminal I/O so transitions are plain
//! functions over plain data.

use crossterm::event::{KeyCode, KeyEvent};

use burrow_core::logs::{LogBuffer, LogLine};

use crate::keymap::Keymap;

/// Whether the terminal dimensions are known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
}

/// What the keyboard currently controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Viewing,
    Editing,
}

/// Side effect requested by a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Restart the supervised command (possibly just edited).
    Restart,
    Quit,
}

pub struct App {
    pub phase: Phase,
    pub mode: Mode,
    pub logs: LogBuffer,
    /// Lines scrolled up from the bottom; zero follows new output.
    pub scroll: usize,
    pub command: Vec<String>,
    /// Command line under edit while in [`Mode::Editing`].
    pub input: String,
    /// Granted tunnel URL, `None` until the lease arrives.
    pub public_url: Option<String>,
    pub spinner_frame: usize,
}

impl App {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            phase: Phase::Loading,
            mode: Mode::Viewing,
            logs: LogBuffer::default(),
            scroll: 0,
            command,
            input: String::new(),
            public_url: None,
            spinner_frame: 0,
        }
    }

    /// Records the terminal dimensions being known.
    pub fn handle_resize(&mut self) {
        self.phase = Phase::Ready;
    }

    /// Records the granted public URL.
    pub fn set_public_url(&mut self, url: String) {
        self.public_url = Some(url);
    }

    pub fn push_log(&mut self, line: LogLine) {
        self.logs.push(line);
    }

    pub fn tick(&mut self) {
        self.spinner_frame = self.spinner_frame.wrapping_add(1);
    }

    /// Applies one key event and returns the side effect it asks for.
    pub fn handle_key(&mut self, keymap: &Keymap, event: KeyEvent) -> Action {
        match self.mode {
            Mode::Viewing => self.handle_viewing_key(keymap, event),
            Mode::Editing => self.handle_editing_key(keymap, event),
        }
    }

    fn handle_viewing_key(&mut self, keymap: &Keymap, event: KeyEvent) -> Action {
        if keymap.quit.matches(event) {
            return Action::Quit;
        }
        if self.phase == Phase::Ready {
            if keymap.reload.matches(event) {
                return Action::Restart;
            }
            if keymap.edit_command.matches(event) {
                self.mode = Mode::Editing;
                self.input = self.command.join(" ");
                return Action::None;
            }
        }
        match event.code {
            KeyCode::Up => self.scroll_up(1),
            KeyCode::Down => self.scroll_down(1),
            KeyCode::PageUp => self.scroll_up(10),
            KeyCode::PageDown => self.scroll_down(10),
            KeyCode::End => self.scroll = 0,
            _ => {}
        }
        Action::None
    }

    fn handle_editing_key(&mut self, keymap: &Keymap, event: KeyEvent) -> Action {
        if keymap.editing_quit.matches(event) {
            return Action::Quit;
        }
        if keymap.cancel.matches(event) {
            self.mode = Mode::Viewing;
            self.input.clear();
            return Action::None;
        }
        if keymap.save.matches(event) {
            // Naive whitespace split; an emptied command still goes through
            // the restart protocol and surfaces as an error in the pane.
            self.command = self.input.split_whitespace().map(String::from).collect();
            self.mode = Mode::Viewing;
            self.input.clear();
            return Action::Restart;
        }
        match event.code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            _ => {}
        }
        Action::None
    }

    fn scroll_up(&mut self, lines: usize) {
        self.scroll = (self.scroll + lines).min(self.logs.len().saturating_sub(1));
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::logs::LogSource;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (App, Keymap) {
        let mut app = App::new(vec!["npm".to_string(), "start".to_string()]);
        app.handle_resize();
        (app, Keymap::default())
    }

    #[test]
    fn test_reload_requests_restart() {
        let (mut app, keymap) = app();
        assert_eq!(app.handle_key(&keymap, key(KeyCode::Char('r'))), Action::Restart);
        assert_eq!(app.command, vec!["npm", "start"]);
    }

    #[test]
    fn test_quit_from_viewing() {
        let (mut app, keymap) = app();
        assert_eq!(app.handle_key(&keymap, key(KeyCode::Char('q'))), Action::Quit);
    }

    #[test]
    fn test_edit_seeds_input_with_current_command() {
        let (mut app, keymap) = app();
        app.handle_key(&keymap, key(KeyCode::Char('e')));
        assert_eq!(app.mode, Mode::Editing);
        assert_eq!(app.input, "npm start");
    }

    #[test]
    fn test_saving_an_edit_replaces_command_and_restarts() {
        let (mut app, keymap) = app();
        app.handle_key(&keymap, key(KeyCode::Char('e')));
        app.input.clear();
        for c in "echo hi".chars() {
            app.handle_key(&keymap, key(KeyCode::Char(c)));
        }
        let action = app.handle_key(&keymap, key(KeyCode::Enter));

        assert_eq!(action, Action::Restart);
        assert_eq!(app.command, vec!["echo", "hi"]);
        assert_eq!(app.mode, Mode::Viewing);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_cancel_leaves_command_untouched() {
        let (mut app, keymap) = app();
        app.handle_key(&keymap, key(KeyCode::Char('e')));
        app.handle_key(&keymap, key(KeyCode::Char('x')));
        let action = app.handle_key(&keymap, key(KeyCode::Esc));

        assert_eq!(action, Action::None);
        assert_eq!(app.mode, Mode::Viewing);
        assert_eq!(app.command, vec!["npm", "start"]);
    }

    #[test]
    fn test_saving_an_empty_edit_still_restarts() {
        let (mut app, keymap) = app();
        app.handle_key(&keymap, key(KeyCode::Char('e')));
        app.input.clear();
        let action = app.handle_key(&keymap, key(KeyCode::Enter));

        // The supervisor rejects the empty command and reports it in the
        // pane; the state machine does not special-case it.
        assert_eq!(action, Action::Restart);
        assert!(app.command.is_empty());
    }

    #[test]
    fn test_reload_and_edit_ignored_while_loading() {
        let mut app = App::new(vec!["npm".to_string(), "start".to_string()]);
        let keymap = Keymap::default();
        assert_eq!(app.handle_key(&keymap, key(KeyCode::Char('r'))), Action::None);
        assert_eq!(app.handle_key(&keymap, key(KeyCode::Char('e'))), Action::None);
        assert_eq!(app.mode, Mode::Viewing);
        assert_eq!(app.handle_key(&keymap, key(KeyCode::Char('q'))), Action::Quit);
    }

    #[test]
    fn test_ctrl_c_quits_even_while_editing() {
        let (mut app, keymap) = app();
        app.handle_key(&keymap, key(KeyCode::Char('e')));
        let action = app.handle_key(
            &keymap,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert_eq!(action, Action::Quit);
    }

    #[test]
    fn test_first_resize_leaves_loading() {
        let mut app = App::new(vec![]);
        assert_eq!(app.phase, Phase::Loading);
        app.handle_resize();
        assert_eq!(app.phase, Phase::Ready);
    }

    #[test]
    fn test_public_url_is_recorded() {
        let (mut app, _keymap) = app();
        assert_eq!(app.public_url, None);
        app.set_public_url("https://witty-mole-12.localtunnel.me".to_string());
        assert_eq!(
            app.public_url.as_deref(),
            Some("https://witty-mole-12.localtunnel.me")
        );
    }

    #[test]
    fn test_scroll_is_bounded_by_log_length() {
        let (mut app, keymap) = app();
        for i in 0..5 {
            app.push_log(LogLine::new(LogSource::Stdout, format!("line {i}")));
        }
        app.handle_key(&keymap, key(KeyCode::PageUp));
        assert_eq!(app.scroll, 4);
        app.handle_key(&keymap, key(KeyCode::End));
        assert_eq!(app.scroll, 0);
    }
}
