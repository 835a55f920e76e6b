//! End-to-end pipeline tests covering the concrete scenarios and boundary
//! behaviours from the front-end's external-interface contract: a clean
//! program verifies with zero diagnostics, while each distinguished error
//! class (missing main, type mismatch, duplicate declaration, undeclared
//! variable, malformed initializer, non-boolean condition, empty array
//! literal) surfaces through the shared `Handler`'s error count.

use glyphc::handler::{CliFlags, Handler};
use glyphc::intern::Interner;
use glyphc::{compile_source, CompileError};

fn errors_for(source: &str) -> usize {
    let mut handler = Handler::new(CliFlags::default());
    let mut interner = Interner::new();
    match compile_source(&mut handler, &mut interner, "t.gl", source) {
        Ok(_) => 0,
        Err(CompileError::Semantic { error_count }) => error_count,
        Err(other) => panic!("expected a semantic outcome, got {other}"),
    }
}

#[test]
fn s1_minimal_main_compiles_clean() {
    assert_eq!(errors_for("fn main() void { return; }"), 0);
}

#[test]
fn s2_missing_main_is_diagnostic_zero() {
    assert_eq!(errors_for("fn f() i64 { return 0; }"), 1);
}

#[test]
fn s3_type_mismatch_in_let_is_an_error() {
    assert_eq!(
        errors_for("fn main() void { let x: i64 = true; return; }"),
        1
    );
}

#[test]
fn s4_duplicate_function_is_an_error() {
    assert_eq!(
        errors_for(
            "fn main() void { return; } fn main() void { return; }"
        ),
        1
    );
}

#[test]
fn s5_undeclared_variable_is_an_error() {
    assert_eq!(
        errors_for("fn main() void { let y: i64 = x; return; }"),
        1
    );
}

#[test]
fn s6_valid_arithmetic_compiles_clean() {
    assert_eq!(
        errors_for("fn main() void { let x: i64 = 1 + 2 * 3; return; }"),
        0
    );
}

#[test]
fn empty_source_file_is_a_missing_main_error() {
    assert_eq!(errors_for(""), 1);
}

#[test]
fn let_without_type_or_initializer_is_an_error() {
    assert_eq!(errors_for("fn main() void { let x; return; }"), 1);
}

#[test]
fn while_with_non_boolean_condition_is_an_error() {
    assert_eq!(
        errors_for("fn main() void { while (1) { return; } return; }"),
        1
    );
}

#[test]
fn if_with_non_boolean_condition_is_an_error() {
    assert_eq!(
        errors_for("fn main() void { if (1) { return; } return; }"),
        1
    );
}

#[test]
fn empty_array_literal_is_an_error() {
    assert_eq!(
        errors_for("fn main() void { let xs: i64[1] = []; return; }"),
        1
    );
}

#[test]
fn parse_failure_is_reported_as_a_distinct_syntactic_error() {
    let mut handler = Handler::new(CliFlags::default());
    let mut interner = Interner::new();
    let result = compile_source(&mut handler, &mut interner, "t.gl", "fn main( void {");
    assert!(matches!(result, Err(CompileError::Parse(_))));
}

#[test]
fn quiet_flag_suppresses_minor_errors_but_not_the_abort() {
    let mut handler = Handler::new(CliFlags { quiet: true, ..Default::default() });
    let mut interner = Interner::new();
    let source = "fn main() void { let unused: i64 = 1; return; }";
    let result = compile_source(&mut handler, &mut interner, "t.gl", source);
    assert!(result.is_ok(), "unused-variable is a minor error and should not abort");
}
