// Status and prompts go to stderr so stdout carries nothing but assistant
// text and explicit listings.

use std::path::Path;

use colored::Colorize;

use crate::config::Settings;

pub fn error(message: &str) {
    eprintln!("{}", message.red());
}

pub fn success(message: &str) {
    eprintln!("{}", message.green());
}

pub fn status(message: &str) {
    eprintln!("{message}");
}

pub fn prompt_you() {
    eprint!("\n{} ", "You:".blue());
}

pub fn assistant_header() {
    eprintln!("\n{}", "Assistant:".blue());
}

pub fn banner(settings: &Settings, path: &Path) {
    eprintln!("\n{} {}", "nvchat".bold(), settings.summary());
    eprintln!(
        "{}",
        format!("Conversation file: {}", path.display()).green()
    );
    eprintln!("Type your message and end it with Ctrl+D. See /help for commands.\n");
}
