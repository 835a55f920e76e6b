//! Source buffer, line index and diagnostic sink shared by every pipeline
//! stage, grounded on `examples/original_source/src/handler.hpp`/`.cpp`.

use crate::style;
use crate::token::Position;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;

/// The 42-entry diagnostic catalog, reproduced verbatim (by index) from
/// `examples/original_source/src/verifier.hpp`'s `all_errors_` table, plus
/// one supplemental entry (43) for private field access (§9 of
/// SPEC_FULL.md). `%` is the single substitution placeholder.
pub const DIAGNOSTICS: &[&str] = &[
    "main function is missing",
    "duplicate function declaration: %",
    "invalid main function signature: %",
    "identifier redeclared in the same scope: %",
    "identifier declared void: %",
    "incompatible type for this binary operator: %",
    "incompatible type for this assignment: %",
    "LHS of assignment must be a variable",
    "variable not declared in this scope: %",
    "incompatible type for this unary operator: %",
    "missing return stmt: %",
    "incompatible type for return: %",
    "no such function with name: %",
    "main function may not call itself",
    "incorrect parameters for function: %",
    "duplicate extern declaration: %",
    "user functions can't utilise variatics: %",
    "variatic type may only be last specified type in extern declaration",
    "character literal can only have one character in it",
    "while stmt condition is not boolean: %",
    "cannot mutate constant variable: %",
    "unused variable: %",
    "unused function: %",
    "unused extern: %",
    "if statement condition is not boolean: %",
    "address-of operand can only be performed to allocated variables",
    "can't get address of a constant variable: %",
    "invalid type cast operation: %",
    "prefix/postfix operators may only be applied to lvalue types",
    "can't initialise variable without type or value: %",
    "duplicate global var declaration: %",
    "excess elements provided in array init expression: %",
    "array initialised with 0 elements",
    "incompatible type for array initialiser expression: %",
    "array index expression may only be performed on array or pointer types: %",
    "type of array index must be either a signed or unsigned integer: %",
    "duplicate enum declarations: %",
    "enum declared with no fields",
    "no such enum exists: %",
    "no such field present on enum: %",
    "enum declared with duplicate fields: %",
    "unused enum: %",
    "unknown type declared: %",
    "field '%' is private",
];

pub fn diagnostic_template(code: usize) -> &'static str {
    DIAGNOSTICS
        .get(code)
        .unwrap_or_else(|| panic!("unknown diagnostic code {code}"))
}

fn render_template(code: usize, token: &str) -> String {
    let template = diagnostic_template(code);
    if template.contains('%') {
        template.replacen('%', token, 1)
    } else {
        template.to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CliFlags {
    pub tokens_mode: bool,
    pub parser_mode: bool,
    pub llvm_mode: bool,
    pub assembly_mode: bool,
    pub run_exe: bool,
    pub quiet: bool,
    pub output: Option<String>,
}

/// Distinguishes "freshly read" from "already cached" from "I/O failure",
/// resolving the ambiguity `Handler::add_file` has in the original (§9).
#[derive(Debug, PartialEq, Eq)]
pub enum AddFileOutcome {
    Loaded,
    AlreadyCached,
}

#[derive(Debug)]
struct FileEntry {
    lines: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Handler {
    files: HashMap<String, FileEntry>,
    pub flags: CliFlags,
    num_errors: usize,
}

impl Handler {
    pub fn new(flags: CliFlags) -> Self {
        Handler {
            files: HashMap::new(),
            flags,
            num_errors: 0,
        }
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn has_errors(&self) -> bool {
        self.num_errors > 0
    }

    /// Reads and caches `path`'s contents under `filename`. Idempotent:
    /// a second call for an already-cached filename is a no-op that
    /// reports which case occurred instead of collapsing both into `false`.
    pub fn add_file(&mut self, filename: &str, path: &std::path::Path) -> io::Result<AddFileOutcome> {
        if self.files.contains_key(filename) {
            return Ok(AddFileOutcome::AlreadyCached);
        }
        let contents = fs::read_to_string(path)?;
        let lines = contents.lines().map(str::to_string).collect();
        self.files.insert(filename.to_string(), FileEntry { lines });
        Ok(AddFileOutcome::Loaded)
    }

    /// Registers in-memory source text directly, bypassing the filesystem
    /// (used by tests and by `--tokens`/`--parser` pipelines fed a string).
    pub fn add_source(&mut self, filename: &str, source: &str) {
        let lines = source.lines().map(str::to_string).collect();
        self.files.insert(filename.to_string(), FileEntry { lines });
    }

    fn line(&self, filename: &str, line_num: u32) -> Option<&str> {
        self.files
            .get(filename)
            .and_then(|f| f.lines.get((line_num as usize).wrapping_sub(1)))
            .map(String::as_str)
    }

    fn line_count(&self, filename: &str) -> usize {
        self.files.get(filename).map_or(0, |f| f.lines.len())
    }

    /// `ERROR:` — increments the error count.
    pub fn report_error(&mut self, filename: &str, code: usize, token: &str, pos: Position) {
        self.num_errors += 1;
        let message = render_template(code, token);
        println!("{}", style::bold_red(&format!("ERROR: {message}")));
        self.log_lines(filename, pos);
    }

    /// `MINOR ERROR:` — suppressed under `--quiet`; never counts toward the
    /// abort threshold.
    pub fn report_minor_error(&mut self, filename: &str, code: usize, token: &str, pos: Position) {
        if self.flags.quiet {
            return;
        }
        let message = render_template(code, token);
        println!("{}", style::bold_blue(&format!("MINOR ERROR: {message}")));
        self.log_lines(filename, pos);
    }

    /// Fatal I/O error, reported to stderr; callers exit non-zero afterward.
    pub fn report_io_error(&self, message: &str) {
        eprintln!("{}", style::red(&format!("ERROR: {message}")));
    }

    /// Prints `filename:line:col:` followed by up to 5 lines of context
    /// centered on `pos.line_start`, clamped to the file's bounds.
    ///
    /// The original C++ computes `line - 2` in an unsigned type, which
    /// underflows (and so prints nothing) for errors on line 1 or 2; this
    /// is fixed here with `saturating_sub` (see DESIGN.md).
    fn log_lines(&self, filename: &str, pos: Position) {
        let header = format!("{filename}:{}:{}:", pos.line_start, pos.col_start);
        println!("{}", style::yellow(&header));

        let total = self.line_count(filename) as u32;
        let first = pos.line_start.saturating_sub(2).max(1);
        let last = pos.line_start.saturating_add(2).min(total.max(1));
        for n in first..=last {
            if let Some(text) = self.line(filename, n) {
                println!("{n:>5} | {text}");
            }
        }
    }
}

impl fmt::Display for AddFileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddFileOutcome::Loaded => write!(f, "loaded"),
            AddFileOutcome::AlreadyCached => write!(f, "already cached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_catalog_has_expected_length_and_ordering() {
        assert_eq!(diagnostic_template(0), "main function is missing");
        assert_eq!(
            diagnostic_template(20),
            "cannot mutate constant variable: %"
        );
        assert_eq!(diagnostic_template(42), "unknown type declared: %");
    }

    #[test]
    fn render_template_substitutes_single_placeholder() {
        assert_eq!(
            render_template(8, "x"),
            "variable not declared in this scope: x"
        );
        assert_eq!(render_template(0, "unused"), "main function is missing");
    }

    #[test]
    fn add_file_distinguishes_cache_hit_from_fresh_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.gl");
        fs::write(&path, "fn main() void {}").unwrap();
        let mut handler = Handler::new(CliFlags::default());
        assert_eq!(
            handler.add_file("main.gl", &path).unwrap(),
            AddFileOutcome::Loaded
        );
        assert_eq!(
            handler.add_file("main.gl", &path).unwrap(),
            AddFileOutcome::AlreadyCached
        );
    }

    #[test]
    fn report_error_increments_count_and_minor_does_not() {
        let mut handler = Handler::new(CliFlags::default());
        handler.add_source("t.gl", "fn main() void {}");
        handler.report_error("t.gl", 0, "", Position::point(1, 1));
        assert_eq!(handler.num_errors(), 1);
        handler.report_minor_error("t.gl", 21, "x", Position::point(1, 1));
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn quiet_flag_suppresses_minor_errors_without_affecting_majors() {
        let mut handler = Handler::new(CliFlags {
            quiet: true,
            ..Default::default()
        });
        handler.add_source("t.gl", "x");
        handler.report_minor_error("t.gl", 21, "x", Position::point(1, 1));
        assert_eq!(handler.num_errors(), 0);
    }

    #[test]
    fn context_window_does_not_panic_on_first_line_errors() {
        let mut handler = Handler::new(CliFlags::default());
        handler.add_source("t.gl", "fn main() void {}\nreturn;\n");
        handler.log_lines("t.gl", Position::point(1, 1));
    }
}
