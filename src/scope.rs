//! Scope-structured symbol table, grounded on
//! `examples/original_source/src/verifier.hpp`/`.cpp`'s `SymbolTable`.
//!
//! `retrieve_one_level` intentionally does **not** look across lexical
//! scopes: once the backward scan crosses into a lower level, the search
//! stops. A nested block therefore cannot see an outer local — only
//! function parameters and same-level locals resolve. This contradicts
//! classical block scoping but is preserved exactly, per spec §9/§4.4.1.

use crate::ast::{Ast, DeclId, DeclKind};
use crate::handler::Handler;
use crate::intern::{Interner, Symbol};
use crate::token::Position;

struct TableEntry {
    ident: Symbol,
    level: u32,
    decl: DeclId,
}

pub struct SymbolTable {
    entries: Vec<TableEntry>,
    level: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            entries: Vec::new(),
            level: 1,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn open_scope(&mut self) {
        self.level += 1;
    }

    /// Pops all trailing entries at the current level, then decrements.
    pub fn close_scope(&mut self) {
        while matches!(self.entries.last(), Some(e) if e.level == self.level) {
            self.entries.pop();
        }
        self.level -= 1;
    }

    pub fn insert(&mut self, ident: Symbol, decl: DeclId) {
        self.entries.push(TableEntry {
            ident,
            level: self.level,
            decl,
        });
    }

    fn remove(&mut self, ident: Symbol, level: u32) {
        if let Some(pos) = self
            .entries
            .iter()
            .rposition(|e| e.ident == ident && e.level == level)
        {
            self.entries.remove(pos);
        }
    }

    /// Scans backward through entries at the **current** level only;
    /// returns the first match or `None` the moment the scan crosses into
    /// a lower level.
    pub fn retrieve_one_level(&self, ident: Symbol) -> Option<DeclId> {
        for entry in self.entries.iter().rev() {
            if entry.level != self.level {
                return None;
            }
            if entry.ident == ident {
                return Some(entry.decl);
            }
        }
        None
    }

    /// Declares `decl` under `ident` at the current scope level, applying
    /// the shadowing rule from `verifier.cpp::declare_variable`: a
    /// parameter redeclaration is a full error and the existing entry
    /// wins; a local-variable redeclaration is a minor error and the new
    /// declaration replaces the old one.
    pub fn declare_variable(
        &mut self,
        handler: &mut Handler,
        ast: &Ast,
        interner: &Interner,
        filename: &str,
        ident: Symbol,
        decl: DeclId,
        pos: Position,
    ) {
        if let Some(existing) = self.retrieve_one_level(ident) {
            let existing_pos = ast.decl(existing).pos;
            let message = format!(
                "'{}'. Previously declared at line {}, column {}",
                interner.resolve(ident),
                existing_pos.line_start,
                existing_pos.col_start
            );
            let is_para = matches!(ast.decl(decl).kind, DeclKind::ParaDecl);
            if is_para {
                handler.report_error(filename, 3, &message, pos);
                return;
            }
            handler.report_minor_error(filename, 3, &message, pos);
            self.remove(ident, self.level);
        }
        self.insert(ident, decl);
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DeclNode;
    use crate::types::Type;

    fn decl(ast: &mut Ast, ident: Symbol, kind: DeclKind) -> DeclId {
        ast.alloc_decl(DeclNode {
            ident,
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos: Position::point(1, 1),
            parent: None,
            kind,
        })
    }

    #[test]
    fn retrieve_one_level_does_not_cross_scope_boundaries() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let d = decl(&mut ast, x, DeclKind::ParaDecl);

        let mut table = SymbolTable::new();
        table.insert(x, d);
        table.open_scope();
        assert_eq!(table.retrieve_one_level(x), None);
    }

    #[test]
    fn retrieve_one_level_finds_same_level_entry() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let d = decl(&mut ast, x, DeclKind::ParaDecl);

        let mut table = SymbolTable::new();
        table.insert(x, d);
        assert_eq!(table.retrieve_one_level(x), Some(d));
    }

    #[test]
    fn close_scope_restores_previous_entry_set() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let y = interner.intern("y");
        let dx = decl(&mut ast, x, DeclKind::ParaDecl);
        let dy = decl(&mut ast, y, DeclKind::ParaDecl);

        let mut table = SymbolTable::new();
        table.insert(x, dx);
        table.open_scope();
        table.insert(y, dy);
        assert_eq!(table.level(), 2);
        table.close_scope();
        assert_eq!(table.level(), 1);
        assert_eq!(table.retrieve_one_level(x), Some(dx));
        assert_eq!(table.retrieve_one_level(y), None);
    }

    #[test]
    fn scope_depth_never_goes_negative_across_matched_pairs() {
        let mut table = SymbolTable::new();
        table.open_scope();
        table.open_scope();
        table.close_scope();
        table.close_scope();
        assert_eq!(table.level(), 1);
    }

    #[test]
    fn declare_variable_parameter_collision_keeps_existing_and_errors() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let mut handler = Handler::new(Default::default());
        handler.add_source("t.gl", "fn f(x: i64, x: i64) void {}");
        let x = interner.intern("x");
        let first = decl(&mut ast, x, DeclKind::ParaDecl);
        let second = decl(&mut ast, x, DeclKind::ParaDecl);

        let mut table = SymbolTable::new();
        table.insert(x, first);
        table.declare_variable(&mut handler, &ast, &interner, "t.gl", x, second, Position::point(1, 14));

        assert_eq!(handler.num_errors(), 1);
        assert_eq!(table.retrieve_one_level(x), Some(first));
    }

    #[test]
    fn declare_variable_local_collision_replaces_with_minor_error() {
        let mut ast = Ast::new();
        let mut interner = Interner::new();
        let mut handler = Handler::new(Default::default());
        handler.add_source("t.gl", "let x = 1; let x = 2;");
        let x = interner.intern("x");
        let first = decl(&mut ast, x, DeclKind::LocalVarDecl { init: None });
        let second = decl(&mut ast, x, DeclKind::LocalVarDecl { init: None });

        let mut table = SymbolTable::new();
        table.insert(x, first);
        table.declare_variable(&mut handler, &ast, &interner, "t.gl", x, second, Position::point(1, 13));

        assert_eq!(handler.num_errors(), 0);
        assert_eq!(table.retrieve_one_level(x), Some(second));
    }
}
