//! Prompt primitives for interactive fixing.
//!
//! Confirmations and selections return `None` when the user cancels (Esc, `q`, or a terminal
//! error); the interactive fixer treats that as a request to quit the whole run.
//!
//! Text input has no keyboard cancel. It returns `None` only on a terminal error, and callers
//! treat an emptied answer as "skip this issue".

use dialoguer::{Confirm, Input, Select};

/// Sentinel options appended to selection lists.
pub const SKIP: &str = "[skip]";
pub const QUIT: &str = "[quit]";
pub const CLEAR_FIELD: &str = "[clear field]";
pub const REMOVE_FIELD: &str = "[remove field]";
pub const ENTER_MANUALLY: &str = "[enter manually]";

pub trait Prompter {
    /// Yes/no question.
    fn confirm(&mut self, label: &str) -> Option<bool>;
    /// Pick one of `options`; returns the chosen option text.
    fn select_one(&mut self, label: &str, options: &[String]) -> Option<String>;
    /// Free-text answer, pre-filled with `default` when given. Clearing the line yields an
    /// empty answer.
    fn input_text(&mut self, label: &str, default: Option<&str>) -> Option<String>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&mut self, label: &str) -> Option<bool> {
        Confirm::new()
            .with_prompt(label)
            .default(true)
            .interact_opt()
            .ok()
            .flatten()
    }

    fn select_one(&mut self, label: &str, options: &[String]) -> Option<String> {
        if options.is_empty() {
            return None;
        }
        let index = Select::new()
            .with_prompt(label)
            .items(options)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()?;
        options.get(index).cloned()
    }

    fn input_text(&mut self, label: &str, default: Option<&str>) -> Option<String> {
        let mut input = Input::<String>::new().with_prompt(label).allow_empty(true);
        if let Some(default) = default {
            input = input.with_initial_text(default);
        }
        input.interact_text().ok()
    }
}
