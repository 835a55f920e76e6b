//! Minimal ANSI color helpers for the diagnostic renderer.
//!
//! No color crate appears anywhere in the dependency tree this project
//! inherited, so diagnostics colorize themselves by hand, the way
//! `src/error.rs`'s `Style` module does.

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const YELLOW: &str = "\x1b[33m";

pub fn red(text: &str) -> String {
    format!("{RED}{text}{RESET}")
}

pub fn blue(text: &str) -> String {
    format!("{BLUE}{text}{RESET}")
}

pub fn yellow(text: &str) -> String {
    format!("{YELLOW}{text}{RESET}")
}

pub fn bold_red(text: &str) -> String {
    format!("{BOLD}{RED}{text}{RESET}")
}

pub fn bold_blue(text: &str) -> String {
    format!("{BOLD}{BLUE}{text}{RESET}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn red_wraps_text_in_red_escape_and_reset() {
        let s = red("ERROR");
        assert!(s.starts_with(RED));
        assert!(s.ends_with(RESET));
        assert!(s.contains("ERROR"));
    }

    #[test]
    fn bold_red_combines_both_codes() {
        let s = bold_red("ERROR");
        assert!(s.starts_with(BOLD));
        assert!(s.contains(RED));
    }

    #[test]
    fn yellow_used_for_file_position_anchor() {
        let s = yellow("main.gl:3:1:");
        assert!(s.contains("main.gl:3:1:"));
    }
}
