//! The `burrow` binary: argument parsing, the terminal dashboard, and the
//! headless standalone mode.

pub mod app;
pub mod cli_args;
pub mod keymap;
pub mod standalone;
pub mod tui;
pub mod view;
