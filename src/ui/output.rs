//! ui::output
//!
//! Human-readable output on stderr.
//!
//! # Design
//!
//! Stdout carries only the JSON report, so every human line goes to stderr.
//! Progress lines respect the quiet flag; the final status line and errors
//! are always shown.

use std::fmt::Display;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet mode - status line and errors only
    Quiet,
    /// Normal mode - progress lines too
    #[default]
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Whether progress lines are printed.
    pub fn shows_progress(&self) -> bool {
        *self != Verbosity::Quiet
    }

    /// Whether debug lines are printed.
    pub fn shows_debug(&self) -> bool {
        *self == Verbosity::Debug
    }
}

/// Print a progress line (respects quiet mode).
pub fn progress(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_progress() {
        eprintln!("{}", message);
    }
}

/// Print the final status line (always shown).
pub fn status(message: impl Display) {
    eprintln!("{}", message);
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_debug() {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_debug() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn visibility() {
        assert!(!Verbosity::Quiet.shows_progress());
        assert!(Verbosity::Normal.shows_progress());
        assert!(!Verbosity::Normal.shows_debug());
        assert!(Verbosity::Debug.shows_progress());
        assert!(Verbosity::Debug.shows_debug());
    }
}
