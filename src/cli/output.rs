use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

// User-facing lines go to stderr; stdout carries decrypted data.

static QUIET: AtomicBool = AtomicBool::new(false);

/// Suppress everything except errors.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Print a success message.
pub fn success(msg: &str) {
    if !is_quiet() {
        eprintln!("  {} {}", "✓".green(), msg);
    }
}

/// Print a warning message.
pub fn warning(msg: &str) {
    if !is_quiet() {
        eprintln!("  {} {}", "⚠".yellow(), msg);
    }
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    if !is_quiet() {
        eprintln!("\n{}", msg.bold());
    }
}

/// Print an indented secondary line.
pub fn detail(msg: &str) {
    if !is_quiet() {
        eprintln!("    {}", msg.dimmed());
    }
}
