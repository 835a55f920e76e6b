//! Visitor contract the out-of-scope code generator plugs into.
//!
//! The original's virtual double-dispatch (`node->visit(visitor)`) is
//! replaced with a single `walk_*` free function per node category that
//! pattern-matches the sum-type tag, per spec §9's design note and
//! `src/visitor.rs`'s default-method-calls-a-walk-function shape in the
//! teacher.

use crate::ast::{Ast, DeclId, DeclKind, ExprId, ExprKind, StmtId, StmtKind};

pub trait Visitor: Sized {
    fn visit_decl(&mut self, ast: &Ast, id: DeclId) {
        walk_decl(self, ast, id);
    }

    fn visit_stmt(&mut self, ast: &Ast, id: StmtId) {
        walk_stmt(self, ast, id);
    }

    fn visit_expr(&mut self, ast: &Ast, id: ExprId) {
        walk_expr(self, ast, id);
    }
}

pub fn walk_decl<V: Visitor>(v: &mut V, ast: &Ast, id: DeclId) {
    match &ast.decl(id).kind {
        DeclKind::ParaDecl | DeclKind::ClassFieldDecl => {}
        DeclKind::LocalVarDecl { init } | DeclKind::GlobalVarDecl { init } => {
            if let Some(init) = init {
                v.visit_expr(ast, *init);
            }
        }
        DeclKind::Function { params, body, .. } | DeclKind::MethodDecl { params, body, .. } => {
            for &p in params {
                v.visit_decl(ast, p);
            }
            v.visit_stmt(ast, *body);
        }
        DeclKind::ConstructorDecl { params, body } => {
            for &p in params {
                v.visit_decl(ast, p);
            }
            v.visit_stmt(ast, *body);
        }
        DeclKind::DestructorDecl { body } => v.visit_stmt(ast, *body),
        DeclKind::Extern { .. } | DeclKind::EnumDecl { .. } => {}
        DeclKind::ClassDecl {
            fields,
            methods,
            constructors,
            destructors,
        } => {
            for &f in fields {
                v.visit_decl(ast, f);
            }
            for &m in methods {
                v.visit_decl(ast, m);
            }
            for &c in constructors {
                v.visit_decl(ast, c);
            }
            for &d in destructors {
                v.visit_decl(ast, d);
            }
        }
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, ast: &Ast, id: StmtId) {
    match &ast.stmt(id).kind {
        StmtKind::Empty => {}
        StmtKind::Compound(stmts) => {
            for &s in stmts {
                v.visit_stmt(ast, s);
            }
        }
        StmtKind::LocalVar(decl) => v.visit_decl(ast, *decl),
        StmtKind::Return(expr) => {
            if let Some(e) = expr {
                v.visit_expr(ast, *e);
            }
        }
        StmtKind::Expr(expr) => v.visit_expr(ast, *expr),
        StmtKind::While { cond, body } => {
            v.visit_expr(ast, *cond);
            v.visit_stmt(ast, *body);
        }
        StmtKind::If {
            cond,
            then_branch,
            first_elif,
            else_branch,
        } => {
            v.visit_expr(ast, *cond);
            v.visit_stmt(ast, *then_branch);
            if let Some(elif) = first_elif {
                v.visit_stmt(ast, *elif);
            }
            if let Some(e) = else_branch {
                v.visit_stmt(ast, *e);
            }
        }
        StmtKind::ElseIf { cond, body, next } => {
            v.visit_expr(ast, *cond);
            v.visit_stmt(ast, *body);
            if let Some(n) = next {
                v.visit_stmt(ast, *n);
            }
        }
    }
}

pub fn walk_expr<V: Visitor>(v: &mut V, ast: &Ast, id: ExprId) {
    match &ast.expr(id).kind {
        ExprKind::Empty
        | ExprKind::Int(_)
        | ExprKind::UInt(_)
        | ExprKind::Decimal(_)
        | ExprKind::Bool(_)
        | ExprKind::Char(_)
        | ExprKind::String(_)
        | ExprKind::Var { .. }
        | ExprKind::EnumAccess { .. } => {}
        ExprKind::Assignment { lhs, rhs, .. } | ExprKind::Binary { lhs, rhs, .. } => {
            v.visit_expr(ast, *lhs);
            v.visit_expr(ast, *rhs);
        }
        ExprKind::Unary { operand, .. } => v.visit_expr(ast, *operand),
        ExprKind::Call { args, .. } => {
            for &a in args {
                v.visit_expr(ast, a);
            }
        }
        ExprKind::Cast { expr, .. } => v.visit_expr(ast, *expr),
        ExprKind::ArrayInit { elements } => {
            for &e in elements {
                v.visit_expr(ast, e);
            }
        }
        ExprKind::ArrayIndex { base, index } => {
            v.visit_expr(ast, *base);
            v.visit_expr(ast, *index);
        }
        ExprKind::FieldAccess { base, .. } => v.visit_expr(ast, *base),
        ExprKind::MethodAccess { base, args, .. } => {
            v.visit_expr(ast, *base);
            for &a in args {
                v.visit_expr(ast, a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclNode, ExprNode};
    use crate::intern::Symbol;
    use crate::token::Position;
    use crate::types::Type;

    struct Counter {
        exprs: usize,
    }

    impl Visitor for Counter {
        fn visit_expr(&mut self, ast: &Ast, id: ExprId) {
            self.exprs += 1;
            walk_expr(self, ast, id);
        }
    }

    #[test]
    fn walk_expr_visits_every_nested_operand() {
        let mut ast = Ast::new();
        let one = ast.alloc_expr(ExprNode {
            ty: Type::UNKNOWN,
            pos: Position::default(),
            parent: None,
            kind: ExprKind::Int(1),
        });
        let two = ast.alloc_expr(ExprNode {
            ty: Type::UNKNOWN,
            pos: Position::default(),
            parent: None,
            kind: ExprKind::Int(2),
        });
        let sum = ast.alloc_expr(ExprNode {
            ty: Type::UNKNOWN,
            pos: Position::default(),
            parent: None,
            kind: ExprKind::Binary {
                lhs: one,
                op: crate::ast::Operator::Add,
                rhs: two,
            },
        });

        let mut counter = Counter { exprs: 0 };
        counter.visit_expr(&ast, sum);
        assert_eq!(counter.exprs, 3);
    }

    #[test]
    fn walk_decl_descends_into_function_body() {
        let mut ast = Ast::new();
        let ret = ast.alloc_stmt(crate::ast::StmtNode {
            pos: Position::default(),
            parent: None,
            kind: StmtKind::Return(None),
        });
        let body = ast.alloc_stmt(crate::ast::StmtNode {
            pos: Position::default(),
            parent: None,
            kind: StmtKind::Compound(vec![ret]),
        });
        let func = ast.alloc_decl(DeclNode {
            ident: Symbol::EMPTY,
            ty: Type::VOID,
            is_mut: false,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos: Position::default(),
            parent: None,
            kind: DeclKind::Function {
                params: vec![],
                return_type: Type::VOID,
                body,
            },
        });

        struct StmtCounter(usize);
        impl Visitor for StmtCounter {
            fn visit_stmt(&mut self, ast: &Ast, id: StmtId) {
                self.0 += 1;
                walk_stmt(self, ast, id);
            }
        }
        let mut counter = StmtCounter(0);
        counter.visit_decl(&ast, func);
        assert_eq!(counter.0, 2);
    }
}
