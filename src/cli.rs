//! Command-line interface for the compiler driver.
//!
//! A single flat command rather than the teacher's subcommand tree
//! (`src/cli.rs`'s `largo` `Commands` enum), since the front-end compiles
//! one file at a time (§6) — but kept in the same `#[derive(Parser)]` idiom.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::info;

use crate::backend::{Backend, NullBackend};
use crate::compile::{self, CompileError};
use crate::handler::{CliFlags, Handler};
use crate::intern::Interner;
use crate::lexer::Lexer;
use crate::printer::AstPrinter;

#[derive(Parser)]
#[command(name = "glyphc")]
#[command(about = "Ahead-of-time compiler for Glyph", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Source file to compile
    pub source: PathBuf,

    /// Dump lexed tokens and exit
    #[arg(long)]
    pub tokens: bool,

    /// Dump the parsed AST and exit
    #[arg(long)]
    pub parser: bool,

    /// Emit LLVM IR (`<out>.ll`) instead of an executable
    #[arg(long)]
    pub llvm: bool,

    /// Emit assembly (`.s`) rather than an object file
    #[arg(long)]
    pub asm: bool,

    /// Run the produced executable after a successful build
    #[arg(long)]
    pub run: bool,

    /// Suppress minor-error diagnostics
    #[arg(long)]
    pub quiet: bool,

    /// Output file name
    #[arg(short = 'o', long, default_value = "a.out")]
    pub output: String,
}

impl Cli {
    fn flags(&self) -> CliFlags {
        CliFlags {
            tokens_mode: self.tokens,
            parser_mode: self.parser,
            llvm_mode: self.llvm,
            assembly_mode: self.asm,
            run_exe: self.run,
            quiet: self.quiet,
            output: Some(self.output.clone()),
        }
    }
}

/// Entry point for the CLI: parses arguments, drives the pipeline, and maps
/// the outcome onto the exit codes §6 specifies (0 on success, non-zero on
/// any I/O, lex, parse, or semantic error).
pub fn run_cli() -> ExitCode {
    let cli = Cli::parse();
    let flags = cli.flags();
    let mut handler = Handler::new(flags);
    let mut interner = Interner::new();

    match run(&cli, &mut handler, &mut interner) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match &err {
                CompileError::Io(msg) => handler.report_io_error(msg),
                CompileError::Semantic { error_count } => {
                    info!("aborting: {error_count} semantic error(s)");
                }
                _ => {}
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, handler: &mut Handler, interner: &mut Interner) -> Result<(), CompileError> {
    if cli.tokens {
        return run_tokens(&cli.source, handler, interner);
    }
    if cli.parser {
        return run_parser(&cli.source, handler, interner);
    }

    let unit = compile::compile_file(handler, interner, &cli.source)?;
    info!(
        "{}: {} function(s) verified",
        cli.source.display(),
        unit.module.functions.len()
    );

    if cli.llvm || cli.asm {
        let ext = if cli.asm { "s" } else { "ll" };
        let out_path = Path::new(&cli.output).with_extension(ext);
        compile::emit_placeholder_ir(&unit, &out_path)?;
        return Ok(());
    }

    // Native object/executable emission and linking are out of scope (§1);
    // a real backend would be driven here via `Backend::emit_module`.
    let mut backend = NullBackend::default();
    let _ = backend.emit_module(&unit.ast, &unit.module);

    if cli.run {
        info!("--run requested but no linked executable exists to run (§1 out of scope)");
    }

    Ok(())
}

fn run_tokens(path: &Path, handler: &mut Handler, interner: &mut Interner) -> Result<(), CompileError> {
    let filename = path.to_string_lossy().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| CompileError::Io(e.to_string()))?;
    handler.add_source(&filename, &source);

    let mut lexer = Lexer::new(&filename, &source);
    let tokens = lexer.tokenize(handler, interner).map_err(CompileError::Lex)?;
    for tok in &tokens {
        println!(
            "{:?} {:?} @{}:{}",
            tok.kind,
            interner.resolve(tok.lexeme),
            tok.pos.line_start,
            tok.pos.col_start
        );
    }
    Ok(())
}

fn run_parser(path: &Path, handler: &mut Handler, interner: &mut Interner) -> Result<(), CompileError> {
    let filename = path.to_string_lossy().to_string();
    let source = std::fs::read_to_string(path).map_err(|e| CompileError::Io(e.to_string()))?;
    let (ast, module, _) = compile::parse_source(handler, interner, &filename, &source)?;
    let dump = AstPrinter::new(&ast, interner).print_module(&module);
    print!("{dump}");
    Ok(())
}
