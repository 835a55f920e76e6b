//! `glyphc`: an ahead-of-time compiler front-end for Glyph, a small
//! statically typed imperative language — lexer, recursive-descent parser,
//! and a scope-aware semantic verifier, plus the `Visitor`/`Backend` seams
//! a native code generator would plug into.

pub mod ast;
pub mod backend;
pub mod cli;
pub mod compile;
pub mod handler;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod scope;
pub mod style;
pub mod token;
pub mod types;
pub mod verifier;
pub mod visitor;

pub use ast::{Ast, Module};
pub use compile::{compile_file, compile_source, CompileError, CompiledUnit};
pub use handler::{CliFlags, Handler};
pub use intern::{Interner, Symbol};
pub use lexer::Lexer;
pub use parser::Parser;
pub use types::Type;
pub use verifier::Verifier;
