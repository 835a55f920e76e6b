//! `--parser` AST dump: one logical line per node, each line naming the
//! node's kind, its source position, then an indented block of children.
//! Grounded on `examples/original_source/src/ast_printer.hpp` (if present)
//! and on the general shape of `handler.rs`'s own line-oriented reporting.

use crate::ast::{Ast, DeclId, DeclKind, ExprId, ExprKind, Module, StmtId, StmtKind};
use crate::intern::Interner;
use std::fmt::Write as _;

pub struct AstPrinter<'a> {
    ast: &'a Ast,
    interner: &'a Interner,
    out: String,
    indent: usize,
}

impl<'a> AstPrinter<'a> {
    pub fn new(ast: &'a Ast, interner: &'a Interner) -> Self {
        AstPrinter { ast, interner, out: String::new(), indent: 0 }
    }

    pub fn print_module(mut self, module: &Module) -> String {
        self.line(&format!("Module {}", module.filepath));
        self.indent += 1;
        for &d in &module.externs {
            self.print_decl(d);
        }
        for &d in &module.enums {
            self.print_decl(d);
        }
        for &d in &module.globals {
            self.print_decl(d);
        }
        for &d in &module.classes {
            self.print_decl(d);
        }
        for &d in &module.functions {
            self.print_decl(d);
        }
        self.indent -= 1;
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        let _ = writeln!(self.out, "{text}");
    }

    fn print_decl(&mut self, id: DeclId) {
        let decl = self.ast.decl(id);
        let name = self.interner.resolve(decl.ident).to_string();
        let pos = decl.pos;
        match &decl.kind {
            DeclKind::ParaDecl => self.line(&format!("Param {name}: {:?} @{}:{}", decl.ty, pos.line_start, pos.col_start)),
            DeclKind::LocalVarDecl { init } => {
                self.line(&format!("LocalVar {name}: {:?} @{}:{}", decl.ty, pos.line_start, pos.col_start));
                if let Some(e) = *init {
                    self.indent += 1;
                    self.print_expr(e);
                    self.indent -= 1;
                }
            }
            DeclKind::GlobalVarDecl { init } => {
                self.line(&format!("GlobalVar {name}: {:?} @{}:{}", decl.ty, pos.line_start, pos.col_start));
                if let Some(e) = *init {
                    self.indent += 1;
                    self.print_expr(e);
                    self.indent -= 1;
                }
            }
            DeclKind::Function { params, return_type, body } => {
                self.line(&format!("Function {name} -> {:?} @{}:{}", return_type, pos.line_start, pos.col_start));
                self.indent += 1;
                for &p in params {
                    self.print_decl(p);
                }
                let body = *body;
                self.print_stmt(body);
                self.indent -= 1;
            }
            DeclKind::Extern { param_types, return_type, is_variadic, .. } => {
                self.line(&format!(
                    "Extern {name}({:?}{}) -> {:?} @{}:{}",
                    param_types,
                    if *is_variadic { ", ..." } else { "" },
                    return_type,
                    pos.line_start,
                    pos.col_start
                ));
            }
            DeclKind::EnumDecl { fields } => {
                self.line(&format!("Enum {name} @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                for &f in fields {
                    self.line(self.interner.resolve(f));
                }
                self.indent -= 1;
            }
            DeclKind::ClassDecl { fields, methods, constructors, destructors } => {
                self.line(&format!("Class {name} @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                for &f in fields {
                    self.print_decl(f);
                }
                for &c in constructors {
                    self.print_decl(c);
                }
                for &m in methods {
                    self.print_decl(m);
                }
                for &d in destructors {
                    self.print_decl(d);
                }
                self.indent -= 1;
            }
            DeclKind::ClassFieldDecl => self.line(&format!("Field {name}: {:?} @{}:{}", decl.ty, pos.line_start, pos.col_start)),
            DeclKind::MethodDecl { params, return_type, body } => {
                self.line(&format!("Method {name} -> {:?} @{}:{}", return_type, pos.line_start, pos.col_start));
                self.indent += 1;
                for &p in params {
                    self.print_decl(p);
                }
                let body = *body;
                self.print_stmt(body);
                self.indent -= 1;
            }
            DeclKind::ConstructorDecl { params, body } => {
                self.line(&format!("Constructor {name} @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                for &p in params {
                    self.print_decl(p);
                }
                let body = *body;
                self.print_stmt(body);
                self.indent -= 1;
            }
            DeclKind::DestructorDecl { body } => {
                self.line(&format!("Destructor ~{name} @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                let body = *body;
                self.print_stmt(body);
                self.indent -= 1;
            }
        }
    }

    fn print_stmt(&mut self, id: StmtId) {
        let stmt = self.ast.stmt(id);
        let pos = stmt.pos;
        match &stmt.kind {
            StmtKind::Empty => self.line("Empty"),
            StmtKind::Compound(stmts) => {
                self.line(&format!("Compound @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                let stmts = stmts.clone();
                for s in stmts {
                    self.print_stmt(s);
                }
                self.indent -= 1;
            }
            StmtKind::LocalVar(decl_id) => {
                let decl_id = *decl_id;
                self.print_decl(decl_id);
            }
            StmtKind::Return(expr) => {
                self.line(&format!("Return @{}:{}", pos.line_start, pos.col_start));
                if let Some(e) = *expr {
                    self.indent += 1;
                    self.print_expr(e);
                    self.indent -= 1;
                }
            }
            StmtKind::Expr(expr) => {
                let expr = *expr;
                self.print_expr(expr);
            }
            StmtKind::While { cond, body } => {
                self.line(&format!("While @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                let (cond, body) = (*cond, *body);
                self.print_expr(cond);
                self.print_stmt(body);
                self.indent -= 1;
            }
            StmtKind::If { cond, then_branch, first_elif, else_branch } => {
                self.line(&format!("If @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                let (cond, then_branch, first_elif, else_branch) = (*cond, *then_branch, *first_elif, *else_branch);
                self.print_expr(cond);
                self.print_stmt(then_branch);
                if let Some(elif) = first_elif {
                    self.print_stmt(elif);
                }
                if let Some(e) = else_branch {
                    self.print_stmt(e);
                }
                self.indent -= 1;
            }
            StmtKind::ElseIf { cond, body, next } => {
                self.line(&format!("ElseIf @{}:{}", pos.line_start, pos.col_start));
                self.indent += 1;
                let (cond, body, next) = (*cond, *body, *next);
                self.print_expr(cond);
                self.print_stmt(body);
                self.indent -= 1;
                if let Some(n) = next {
                    self.print_stmt(n);
                }
            }
        }
    }

    fn print_expr(&mut self, id: ExprId) {
        let expr = self.ast.expr(id);
        let pos = expr.pos;
        let header = |kind: &str, extra: &str| format!("{kind}{extra} : {:?} @{}:{}", expr.ty, pos.line_start, pos.col_start);
        match &expr.kind {
            ExprKind::Empty => self.line(&header("Empty", "")),
            ExprKind::Assignment { lhs, op, rhs } => {
                self.line(&header("Assignment", &format!(" {op:?}")));
                self.indent += 1;
                let (lhs, rhs) = (*lhs, *rhs);
                self.print_expr(lhs);
                self.print_expr(rhs);
                self.indent -= 1;
            }
            ExprKind::Binary { lhs, op, rhs } => {
                self.line(&header("Binary", &format!(" {op:?}")));
                self.indent += 1;
                let (lhs, rhs) = (*lhs, *rhs);
                self.print_expr(lhs);
                self.print_expr(rhs);
                self.indent -= 1;
            }
            ExprKind::Unary { op, operand } => {
                self.line(&header("Unary", &format!(" {op:?}")));
                self.indent += 1;
                let operand = *operand;
                self.print_expr(operand);
                self.indent -= 1;
            }
            ExprKind::Int(v) => self.line(&header("Int", &format!(" {v}"))),
            ExprKind::UInt(v) => self.line(&header("UInt", &format!(" {v}"))),
            ExprKind::Decimal(v) => self.line(&header("Decimal", &format!(" {v}"))),
            ExprKind::Bool(v) => self.line(&header("Bool", &format!(" {v}"))),
            ExprKind::Char(v) => self.line(&header("Char", &format!(" '{v}'"))),
            ExprKind::String(sym) => self.line(&header("String", &format!(" {:?}", self.interner.resolve(*sym)))),
            ExprKind::Var { name, .. } => self.line(&header("Var", &format!(" {}", self.interner.resolve(*name)))),
            ExprKind::Call { name, args, .. } => {
                self.line(&header("Call", &format!(" {}", self.interner.resolve(*name))));
                self.indent += 1;
                for &a in args {
                    self.print_expr(a);
                }
                self.indent -= 1;
            }
            ExprKind::Cast { expr, target } => {
                self.line(&header("Cast", &format!(" as {:?}", target)));
                self.indent += 1;
                let expr = *expr;
                self.print_expr(expr);
                self.indent -= 1;
            }
            ExprKind::ArrayInit { elements } => {
                self.line(&header("ArrayInit", ""));
                self.indent += 1;
                for &e in elements {
                    self.print_expr(e);
                }
                self.indent -= 1;
            }
            ExprKind::ArrayIndex { base, index } => {
                self.line(&header("ArrayIndex", ""));
                self.indent += 1;
                let (base, index) = (*base, *index);
                self.print_expr(base);
                self.print_expr(index);
                self.indent -= 1;
            }
            ExprKind::EnumAccess { enum_name, field } => {
                self.line(&header(
                    "EnumAccess",
                    &format!(" {}::{}", self.interner.resolve(*enum_name), self.interner.resolve(*field)),
                ));
            }
            ExprKind::FieldAccess { base, field } => {
                self.line(&header("FieldAccess", &format!(".{}", self.interner.resolve(*field))));
                self.indent += 1;
                let base = *base;
                self.print_expr(base);
                self.indent -= 1;
            }
            ExprKind::MethodAccess { base, method, args } => {
                self.line(&header("MethodAccess", &format!(".{}()", self.interner.resolve(*method))));
                self.indent += 1;
                let base = *base;
                self.print_expr(base);
                for &a in args {
                    self.print_expr(a);
                }
                self.indent -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{CliFlags, Handler};
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    #[test]
    fn prints_one_line_per_node_with_indentation() {
        let source = "fn main() void { let x: i64 = 1 + 2; return; }";
        let mut interner = Interner::new();
        let mut handler = Handler::new(CliFlags::default());
        handler.add_source("t.gl", source);
        let tokens = Lexer::new("t.gl", source).tokenize(&mut handler, &mut interner).unwrap();
        let mut ast = Ast::new();
        let module = Parser::new(tokens, &interner).parse(&mut ast, "t.gl".to_string()).unwrap();
        let dump = AstPrinter::new(&ast, &interner).print_module(&module);
        assert!(dump.contains("Function main"));
        assert!(dump.contains("Binary"));
    }
}
