//! Semantic verifier: one pass per function body over the AST, resolving
//! identifiers against a `SymbolTable`, inferring and checking types, and
//! recording usage flags, grounded on
//! `examples/original_source/src/verifier.hpp`/`.cpp`.
//!
//! Unlike `visitor.rs`'s read-only walk (built for the out-of-scope code
//! generator), checking mutates every visited node's `type` field and the
//! declarations' usage flags, so the verifier keeps its own traversal
//! rather than implementing `Visitor`.

use crate::ast::{Ast, DeclId, DeclKind, ExprId, ExprKind, Module, Operator, StmtId, StmtKind};
use crate::handler::Handler;
use crate::intern::{Interner, Symbol};
use crate::scope::SymbolTable;
use crate::token::Position;
use crate::types::{Primitive, Type};

struct FnCtx {
    is_main: bool,
    has_return: bool,
    return_type: Type,
    locals: Vec<DeclId>,
}

pub struct Verifier {
    table: SymbolTable,
}

impl Verifier {
    pub fn new() -> Self {
        Verifier { table: SymbolTable::new() }
    }

    pub fn check_module(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, module: &Module) {
        self.check_duplicate_externs(handler, ast, interner, module);
        self.check_extern_variadics(handler, ast, interner, module);
        self.check_duplicate_enums(handler, ast, interner, module);
        self.check_duplicate_globals(handler, ast, interner, module);
        self.check_duplicate_functions(handler, ast, interner, module);

        for &g in &module.globals {
            self.check_global_var(handler, ast, interner, module, g);
        }
        for &f in &module.functions {
            self.check_function(handler, ast, interner, module, f);
        }
        for &c in &module.classes {
            self.check_class(handler, ast, interner, module, c);
        }

        self.check_main_present(handler, ast, interner, module);
        self.check_unused(handler, ast, interner, module);
    }

    // ---- global-scope one-shot checks ----------------------------------

    fn check_duplicate_functions(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        let mut seen: Vec<(Symbol, String)> = Vec::new();
        for &f in &module.functions {
            let decl = ast.decl(f);
            let key = (decl.ident, decl.mangled_params(ast));
            if seen.contains(&key) {
                handler.report_error(&module.filepath, 1, interner.resolve(decl.ident), decl.pos);
            } else {
                seen.push(key);
            }
        }
    }

    fn check_duplicate_externs(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        let mut seen: Vec<Symbol> = Vec::new();
        for &e in &module.externs {
            let decl = ast.decl(e);
            if seen.contains(&decl.ident) {
                handler.report_error(&module.filepath, 15, interner.resolve(decl.ident), decl.pos);
            } else {
                seen.push(decl.ident);
            }
        }
    }

    /// `...` is only meaningful, and only well-formed, as the sole trailing
    /// entry of an extern's type list (§6); `parse_type_list` already
    /// flagged a second occurrence or a non-trailing one as malformed.
    fn check_extern_variadics(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        for &e in &module.externs {
            let decl = ast.decl(e);
            if let DeclKind::Extern { variadic_malformed: true, .. } = &decl.kind {
                handler.report_error(&module.filepath, 17, interner.resolve(decl.ident), decl.pos);
            }
        }
    }

    /// `...` is the extern-only variadic marker (§6); reject it on any
    /// user-declared function/method/constructor parameter.
    fn check_no_variadic_params(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, filename: &str, fn_ident: Symbol, params: &[DeclId]) {
        for &p in params {
            if ast.decl(p).ty.equals(&Type::Primitive(Primitive::Variadic)) {
                handler.report_error(filename, 16, interner.resolve(fn_ident), ast.decl(p).pos);
            }
        }
    }

    fn check_duplicate_globals(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        let mut seen: Vec<Symbol> = Vec::new();
        for &g in &module.globals {
            let decl = ast.decl(g);
            if seen.contains(&decl.ident) {
                handler.report_error(&module.filepath, 30, interner.resolve(decl.ident), decl.pos);
            } else {
                seen.push(decl.ident);
            }
        }
    }

    fn check_duplicate_enums(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        let mut seen: Vec<Symbol> = Vec::new();
        for &e in &module.enums {
            let decl = ast.decl(e);
            if seen.contains(&decl.ident) {
                handler.report_error(&module.filepath, 36, interner.resolve(decl.ident), decl.pos);
                continue;
            }
            seen.push(decl.ident);
            let DeclKind::EnumDecl { fields } = &decl.kind else { continue };
            if fields.is_empty() {
                handler.report_error(&module.filepath, 37, interner.resolve(decl.ident), decl.pos);
            }
            let mut seen_fields: Vec<Symbol> = Vec::new();
            for &field in fields {
                if seen_fields.contains(&field) {
                    handler.report_error(&module.filepath, 40, interner.resolve(decl.ident), decl.pos);
                } else {
                    seen_fields.push(field);
                }
            }
        }
    }

    fn check_main_present(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        let found = module.functions.iter().any(|&f| interner.resolve(ast.decl(f).ident) == "main");
        if !found {
            handler.report_error(&module.filepath, 0, "", Position::point(1, 1));
        }
    }

    fn check_unused(&self, handler: &mut Handler, ast: &Ast, interner: &Interner, module: &Module) {
        for &f in &module.functions {
            let d = ast.decl(f);
            if !d.is_used && interner.resolve(d.ident) != "main" {
                handler.report_minor_error(&module.filepath, 22, interner.resolve(d.ident), d.pos);
            }
        }
        for &e in &module.externs {
            let d = ast.decl(e);
            if !d.is_used {
                handler.report_minor_error(&module.filepath, 23, interner.resolve(d.ident), d.pos);
            }
        }
        for &en in &module.enums {
            let d = ast.decl(en);
            if !d.is_used {
                handler.report_minor_error(&module.filepath, 41, interner.resolve(d.ident), d.pos);
            }
        }
    }

    // ---- declarations ---------------------------------------------------

    fn check_global_var(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, module: &Module, decl_id: DeclId) {
        let filename = module.filepath.clone();
        let pos = ast.decl(decl_id).pos;
        let ident = ast.decl(decl_id).ident;
        let declared_ty = resolve_named_type(ast, interner, module, handler, &filename, &ast.decl(decl_id).ty.clone(), pos);
        let init = match &ast.decl(decl_id).kind {
            DeclKind::GlobalVarDecl { init } => *init,
            _ => return,
        };
        self.check_var_decl_init(handler, ast, interner, module, decl_id, &filename, ident, declared_ty, init, pos);
        self.table.insert(ident, decl_id);
    }

    fn check_var_decl_init(
        &mut self,
        handler: &mut Handler,
        ast: &mut Ast,
        interner: &Interner,
        module: &Module,
        decl_id: DeclId,
        filename: &str,
        ident: Symbol,
        declared_ty: Type,
        init: Option<ExprId>,
        pos: Position,
    ) {
        if declared_ty.equals(&Type::Primitive(Primitive::Variadic)) {
            handler.report_error(filename, 16, interner.resolve(ident), pos);
            ast.decl_mut(decl_id).ty = Type::ERROR;
            return;
        }
        match init {
            Some(init_expr) => {
                self.check_expr(handler, ast, interner, None, module, init_expr);
                let init_ty = ast.expr(init_expr).ty.clone();
                if declared_ty.is_unknown() {
                    ast.decl_mut(decl_id).ty = init_ty;
                } else if !init_ty.is_error() && !declared_ty.equals(&init_ty) {
                    let msg = format!("expected {:?}, got {:?}", declared_ty, init_ty);
                    handler.report_error(filename, 6, &msg, pos);
                    ast.decl_mut(decl_id).ty = Type::ERROR;
                } else {
                    ast.decl_mut(decl_id).ty = declared_ty;
                }
                if let (Type::Array(_, Some(n)), ExprKind::ArrayInit { elements }) =
                    (&ast.decl(decl_id).ty.clone(), &ast.expr(init_expr).kind)
                {
                    if elements.len() as u64 > *n {
                        handler.report_error(filename, 31, interner.resolve(ident), pos);
                    }
                }
            }
            None => {
                if declared_ty.is_unknown() {
                    handler.report_error(filename, 29, interner.resolve(ident), pos);
                } else {
                    ast.decl_mut(decl_id).ty = declared_ty;
                }
            }
        }
    }

    fn check_function(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, module: &Module, decl_id: DeclId) {
        let filename = module.filepath.clone();
        let (params, body, return_type) = match &ast.decl(decl_id).kind {
            DeclKind::Function { params, body, return_type } => (params.clone(), *body, return_type.clone()),
            _ => return,
        };
        let ident = ast.decl(decl_id).ident;
        let is_main = interner.resolve(ident) == "main";
        if is_main && (!return_type.is_void() || !params.is_empty()) {
            handler.report_error(&filename, 2, interner.resolve(ident), ast.decl(decl_id).pos);
        }
        self.check_no_variadic_params(handler, ast, interner, &filename, ident, &params);

        self.table.open_scope();
        for &p in &params {
            let pty = resolve_named_type(ast, interner, module, handler, &filename, &ast.decl(p).ty.clone(), ast.decl(p).pos);
            ast.decl_mut(p).ty = pty.clone();
            if pty.is_void() {
                handler.report_error(&filename, 4, interner.resolve(ast.decl(p).ident), ast.decl(p).pos);
            }
            let pident = ast.decl(p).ident;
            let ppos = ast.decl(p).pos;
            self.table.declare_variable(handler, ast, interner, &filename, pident, p, ppos);
        }

        let mut ctx = FnCtx { is_main, has_return: false, return_type: return_type.clone(), locals: Vec::new() };
        self.check_stmt(handler, ast, interner, &mut ctx, module, body);

        if !return_type.is_void() && !ctx.has_return {
            handler.report_error(&filename, 10, interner.resolve(ident), ast.decl(decl_id).pos);
        }
        for local in ctx.locals {
            if !ast.decl(local).is_used {
                let name = ast.decl(local).ident;
                let pos = ast.decl(local).pos;
                handler.report_minor_error(&filename, 21, interner.resolve(name), pos);
            }
        }
        self.table.close_scope();
    }

    fn check_class(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, module: &Module, decl_id: DeclId) {
        let filename = module.filepath.clone();
        let (fields, methods, constructors, destructors) = match &ast.decl(decl_id).kind {
            DeclKind::ClassDecl { fields, methods, constructors, destructors } => {
                (fields.clone(), methods.clone(), constructors.clone(), destructors.clone())
            }
            _ => return,
        };
        for &f in &fields {
            let pos = ast.decl(f).pos;
            let ty = resolve_named_type(ast, interner, module, handler, &filename, &ast.decl(f).ty.clone(), pos);
            ast.decl_mut(f).ty = ty;
        }
        for &m in &methods {
            let (params, body, return_type) = match &ast.decl(m).kind {
                DeclKind::MethodDecl { params, body, return_type } => (params.clone(), *body, return_type.clone()),
                _ => continue,
            };
            self.check_no_variadic_params(handler, ast, interner, &filename, ast.decl(m).ident, &params);
            self.table.open_scope();
            for &p in &params {
                let pident = ast.decl(p).ident;
                let ppos = ast.decl(p).pos;
                self.table.declare_variable(handler, ast, interner, &filename, pident, p, ppos);
            }
            let mut ctx = FnCtx { is_main: false, has_return: false, return_type, locals: Vec::new() };
            self.check_stmt(handler, ast, interner, &mut ctx, module, body);
            self.table.close_scope();
        }
        for &c in &constructors {
            let (params, body) = match &ast.decl(c).kind {
                DeclKind::ConstructorDecl { params, body } => (params.clone(), *body),
                _ => continue,
            };
            self.check_no_variadic_params(handler, ast, interner, &filename, ast.decl(c).ident, &params);
            self.table.open_scope();
            for &p in &params {
                let pident = ast.decl(p).ident;
                let ppos = ast.decl(p).pos;
                self.table.declare_variable(handler, ast, interner, &filename, pident, p, ppos);
            }
            let mut ctx = FnCtx { is_main: false, has_return: false, return_type: Type::VOID, locals: Vec::new() };
            self.check_stmt(handler, ast, interner, &mut ctx, module, body);
            self.table.close_scope();
        }
        for &d in &destructors {
            let body = match &ast.decl(d).kind {
                DeclKind::DestructorDecl { body } => *body,
                _ => continue,
            };
            self.table.open_scope();
            let mut ctx = FnCtx { is_main: false, has_return: false, return_type: Type::VOID, locals: Vec::new() };
            self.check_stmt(handler, ast, interner, &mut ctx, module, body);
            self.table.close_scope();
        }
    }

    // ---- statements -------------------------------------------------------

    fn check_stmt(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, ctx: &mut FnCtx, module: &Module, stmt_id: StmtId) {
        let filename = module.filepath.clone();
        match &ast.stmt(stmt_id).kind {
            StmtKind::Empty => {}
            StmtKind::Compound(stmts) => {
                let stmts = stmts.clone();
                for s in stmts {
                    self.check_stmt(handler, ast, interner, ctx, module, s);
                }
            }
            StmtKind::LocalVar(decl_id) => {
                let decl_id = *decl_id;
                let pos = ast.decl(decl_id).pos;
                let ident = ast.decl(decl_id).ident;
                let declared_ty = resolve_named_type(ast, interner, module, handler, &filename, &ast.decl(decl_id).ty.clone(), pos);
                let init = match &ast.decl(decl_id).kind {
                    DeclKind::LocalVarDecl { init } => *init,
                    _ => None,
                };
                self.check_var_decl_init(handler, ast, interner, module, decl_id, &filename, ident, declared_ty, init, pos);
                self.table.declare_variable(handler, ast, interner, &filename, ident, decl_id, pos);
                ctx.locals.push(decl_id);
            }
            StmtKind::Return(expr) => {
                ctx.has_return = true;
                let expr = *expr;
                let return_type = ctx.return_type.clone();
                match expr {
                    Some(e) => {
                        self.check_expr(handler, ast, interner, Some(ctx), module, e);
                        let ety = ast.expr(e).ty.clone();
                        let pos = ast.expr(e).pos;
                        if !ety.is_error() && !return_type.equals_soft(&ety) {
                            handler.report_error(&filename, 11, &format!("{:?}", ety), pos);
                        }
                    }
                    None => {
                        if !return_type.is_void() {
                            handler.report_error(&filename, 11, "void", ast.stmt(stmt_id).pos);
                        }
                    }
                }
            }
            StmtKind::Expr(expr) => {
                let expr = *expr;
                self.check_expr(handler, ast, interner, Some(ctx), module, expr);
            }
            StmtKind::While { cond, body } => {
                let (cond, body) = (*cond, *body);
                self.check_expr(handler, ast, interner, Some(ctx), module, cond);
                let cty = ast.expr(cond).ty.clone();
                if !cty.is_error() && !cty.is_bool() {
                    handler.report_error(&filename, 19, &format!("{:?}", cty), ast.expr(cond).pos);
                }
                self.table.open_scope();
                self.check_stmt(handler, ast, interner, ctx, module, body);
                self.table.close_scope();
            }
            StmtKind::If { cond, then_branch, first_elif, else_branch } => {
                let (cond, then_branch, first_elif, else_branch) = (*cond, *then_branch, *first_elif, *else_branch);
                self.check_expr(handler, ast, interner, Some(ctx), module, cond);
                let cty = ast.expr(cond).ty.clone();
                if !cty.is_error() && !cty.is_bool() {
                    handler.report_error(&filename, 24, &format!("{:?}", cty), ast.expr(cond).pos);
                }
                self.table.open_scope();
                self.check_stmt(handler, ast, interner, ctx, module, then_branch);
                self.table.close_scope();
                if let Some(elif) = first_elif {
                    self.check_stmt(handler, ast, interner, ctx, module, elif);
                }
                if let Some(e) = else_branch {
                    self.table.open_scope();
                    self.check_stmt(handler, ast, interner, ctx, module, e);
                    self.table.close_scope();
                }
            }
            StmtKind::ElseIf { cond, body, next } => {
                let (cond, body, next) = (*cond, *body, *next);
                self.check_expr(handler, ast, interner, Some(ctx), module, cond);
                let cty = ast.expr(cond).ty.clone();
                if !cty.is_error() && !cty.is_bool() {
                    handler.report_error(&filename, 24, &format!("{:?}", cty), ast.expr(cond).pos);
                }
                self.table.open_scope();
                self.check_stmt(handler, ast, interner, ctx, module, body);
                self.table.close_scope();
                if let Some(n) = next {
                    self.check_stmt(handler, ast, interner, ctx, module, n);
                }
            }
        }
    }

    // ---- expressions --------------------------------------------------------

    fn check_expr(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        match &ast.expr(expr_id).kind {
            ExprKind::Empty => ast.expr_mut(expr_id).ty = Type::VOID,
            ExprKind::Int(_) => ast.expr_mut(expr_id).ty = Type::I64,
            ExprKind::UInt(_) => ast.expr_mut(expr_id).ty = Type::Primitive(Primitive::U64),
            ExprKind::Decimal(_) => ast.expr_mut(expr_id).ty = Type::Primitive(Primitive::F64),
            ExprKind::Bool(_) => ast.expr_mut(expr_id).ty = Type::BOOL,
            ExprKind::Char(_) => ast.expr_mut(expr_id).ty = Type::Primitive(Primitive::I8),
            ExprKind::String(_) => ast.expr_mut(expr_id).ty = Type::pointer_to(Type::Primitive(Primitive::I8)),
            ExprKind::Var { name, .. } => {
                let name = *name;
                if let Some(decl_id) = self.table.retrieve_one_level(name) {
                    ast.decl_mut(decl_id).is_used = true;
                    let ty = ast.decl(decl_id).ty.clone();
                    let node = ast.expr_mut(expr_id);
                    node.ty = ty;
                    if let ExprKind::Var { resolved, .. } = &mut node.kind {
                        *resolved = Some(decl_id);
                    }
                } else {
                    handler.report_error(&filename, 8, interner.resolve(name), pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                }
            }
            ExprKind::EnumAccess { enum_name, field } => {
                let (enum_name, field) = (*enum_name, *field);
                match module.enums.iter().find(|&&e| ast.decl(e).ident == enum_name).copied() {
                    None => {
                        handler.report_error(&filename, 38, interner.resolve(enum_name), pos);
                        ast.expr_mut(expr_id).ty = Type::ERROR;
                    }
                    Some(enum_id) => {
                        let has_field = matches!(&ast.decl(enum_id).kind, DeclKind::EnumDecl { fields } if fields.contains(&field));
                        if !has_field {
                            handler.report_error(&filename, 39, interner.resolve(field), pos);
                            ast.expr_mut(expr_id).ty = Type::ERROR;
                        } else {
                            ast.decl_mut(enum_id).is_used = true;
                            ast.expr_mut(expr_id).ty = Type::Enum(enum_id, enum_name);
                        }
                    }
                }
            }
            ExprKind::Assignment { .. } => self.check_assignment(handler, ast, interner, ctx, module, expr_id),
            ExprKind::Binary { .. } => self.check_binary(handler, ast, interner, ctx, module, expr_id),
            ExprKind::Unary { .. } => self.check_unary(handler, ast, interner, ctx, module, expr_id),
            ExprKind::Call { .. } => self.check_call(handler, ast, interner, ctx, module, expr_id),
            ExprKind::Cast { .. } => self.check_cast(handler, ast, interner, ctx, module, expr_id),
            ExprKind::ArrayInit { .. } => self.check_array_init(handler, ast, interner, ctx, module, expr_id),
            ExprKind::ArrayIndex { .. } => self.check_array_index(handler, ast, interner, ctx, module, expr_id),
            ExprKind::FieldAccess { .. } => self.check_field_access(handler, ast, interner, ctx, module, expr_id),
            ExprKind::MethodAccess { .. } => self.check_method_access(handler, ast, interner, ctx, module, expr_id),
        }
    }

    fn check_assignment(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (lhs, op, rhs) = match &ast.expr(expr_id).kind {
            ExprKind::Assignment { lhs, op, rhs } => (*lhs, *op, *rhs),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, lhs);
        self.check_expr(handler, ast, interner, ctx, module, rhs);

        let lhs_ty = ast.expr(lhs).ty.clone();
        let rhs_ty = ast.expr(rhs).ty.clone();
        if !matches!(ast.expr(lhs).kind, ExprKind::Var { .. }) {
            handler.report_error(&filename, 7, "", pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        if let ExprKind::Var { resolved: Some(decl_id), .. } = ast.expr(lhs).kind {
            ast.decl_mut(decl_id).is_reassigned = true;
            if !ast.decl(decl_id).is_mut {
                let name = interner.resolve(ast.decl(decl_id).ident).to_string();
                handler.report_error(&filename, 20, &name, pos);
            }
        }
        let _ = op;
        if !lhs_ty.is_error() && !rhs_ty.is_error() && !lhs_ty.equals(&rhs_ty) {
            let msg = format!("expected {:?}, got {:?}", lhs_ty, rhs_ty);
            handler.report_error(&filename, 6, &msg, pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
        } else {
            ast.expr_mut(expr_id).ty = lhs_ty;
        }
    }

    fn check_binary(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (lhs, op, rhs) = match &ast.expr(expr_id).kind {
            ExprKind::Binary { lhs, op, rhs } => (*lhs, *op, *rhs),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, lhs);
        self.check_expr(handler, ast, interner, ctx, module, rhs);
        let lty = ast.expr(lhs).ty.clone();
        let rty = ast.expr(rhs).ty.clone();
        if lty.is_error() || rty.is_error() {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }

        let result = match op {
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
                (lty.equals(&Type::I64) && rty.equals(&Type::I64)).then_some(Type::I64)
            }
            Operator::Lt | Operator::LtEq | Operator::Gt | Operator::GtEq => {
                (lty.equals(&Type::I64) && rty.equals(&Type::I64)).then_some(Type::BOOL)
            }
            Operator::Eq | Operator::NotEq => {
                ((lty.equals(&Type::I64) && rty.equals(&Type::I64)) || (lty.is_bool() && rty.is_bool())).then_some(Type::BOOL)
            }
            Operator::And | Operator::Or => (lty.is_bool() && rty.is_bool()).then_some(Type::BOOL),
            _ => None,
        };
        match result {
            Some(ty) => ast.expr_mut(expr_id).ty = ty,
            None => {
                let msg = format!("{:?} {:?} {:?}", lty, op, rty);
                handler.report_error(&filename, 5, &msg, pos);
                ast.expr_mut(expr_id).ty = Type::ERROR;
            }
        }
    }

    fn check_unary(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (op, operand) = match &ast.expr(expr_id).kind {
            ExprKind::Unary { op, operand } => (*op, *operand),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx, module, operand);
        let oty = ast.expr(operand).ty.clone();
        if oty.is_error() {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        match op {
            Operator::Not => {
                if oty.is_bool() {
                    ast.expr_mut(expr_id).ty = Type::BOOL;
                } else {
                    handler.report_error(&filename, 9, &format!("{:?}", oty), pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                }
            }
            Operator::Neg | Operator::Pos => {
                if oty.equals(&Type::I64) {
                    ast.expr_mut(expr_id).ty = Type::I64;
                } else {
                    handler.report_error(&filename, 9, &format!("{:?}", oty), pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                }
            }
            Operator::Deref => match oty {
                Type::Pointer(inner) => ast.expr_mut(expr_id).ty = *inner,
                _ => {
                    handler.report_error(&filename, 9, &format!("{:?}", oty), pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                }
            },
            Operator::AddrOf => {
                if !ast.expr(operand).kind.is_lvalue() {
                    handler.report_error(&filename, 25, "", pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                } else if let ExprKind::Var { resolved: Some(decl_id), .. } = ast.expr(operand).kind {
                    if !ast.decl(decl_id).is_mut {
                        let name = interner.resolve(ast.decl(decl_id).ident).to_string();
                        handler.report_error(&filename, 26, &name, pos);
                        ast.expr_mut(expr_id).ty = Type::ERROR;
                    } else {
                        ast.expr_mut(expr_id).ty = Type::pointer_to(oty);
                    }
                } else {
                    ast.expr_mut(expr_id).ty = Type::pointer_to(oty);
                }
            }
            Operator::PreIncr | Operator::PreDecr | Operator::PostIncr | Operator::PostDecr => {
                if !ast.expr(operand).kind.is_lvalue() || !oty.is_int() {
                    handler.report_error(&filename, 28, "", pos);
                    ast.expr_mut(expr_id).ty = Type::ERROR;
                } else {
                    ast.expr_mut(expr_id).ty = oty;
                }
            }
            _ => unreachable!("not a unary operator"),
        }
    }

    fn check_call(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (name, args) = match &ast.expr(expr_id).kind {
            ExprKind::Call { name, args, .. } => (*name, args.clone()),
            _ => return,
        };
        for &a in &args {
            self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, a);
        }

        let is_self_recursive_main = ctx.as_deref().map_or(false, |c| c.is_main) && interner.resolve(name) == "main";
        if is_self_recursive_main {
            handler.report_error(&filename, 13, "", pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }

        if let Some(target) = module.functions.iter().find(|&&f| ast.decl(f).ident == name).copied() {
            let (params, return_type) = match &ast.decl(target).kind {
                DeclKind::Function { params, return_type, .. } => (params.clone(), return_type.clone()),
                _ => unreachable!(),
            };
            let ok = params.len() == args.len()
                && params.iter().zip(args.iter()).all(|(&p, &a)| ast.decl(p).ty.equals_soft(&ast.expr(a).ty));
            if !ok {
                handler.report_error(&filename, 14, interner.resolve(name), pos);
                ast.expr_mut(expr_id).ty = Type::ERROR;
            } else {
                ast.decl_mut(target).is_used = true;
                let node = ast.expr_mut(expr_id);
                node.ty = return_type;
                if let ExprKind::Call { resolved, .. } = &mut node.kind {
                    *resolved = Some(target);
                }
            }
            return;
        }

        if let Some(target) = module.externs.iter().find(|&&e| ast.decl(e).ident == name).copied() {
            let (param_types, return_type, is_variadic) = match &ast.decl(target).kind {
                DeclKind::Extern { param_types, return_type, is_variadic, .. } => {
                    (param_types.clone(), return_type.clone(), *is_variadic)
                }
                _ => unreachable!(),
            };
            let count_ok = if is_variadic { args.len() >= param_types.len() } else { args.len() == param_types.len() };
            let types_ok =
                count_ok && param_types.iter().zip(args.iter()).all(|(pt, &a)| pt.equals_soft(&ast.expr(a).ty));
            if !types_ok {
                handler.report_error(&filename, 14, interner.resolve(name), pos);
                ast.expr_mut(expr_id).ty = Type::ERROR;
            } else {
                ast.decl_mut(target).is_used = true;
                let node = ast.expr_mut(expr_id);
                node.ty = return_type;
                if let ExprKind::Call { resolved, .. } = &mut node.kind {
                    *resolved = Some(target);
                }
            }
            return;
        }

        if let Some(class_id) = module.classes.iter().find(|&&c| ast.decl(c).ident == name).copied() {
            let class_ty = ast.decl(class_id).ty.clone();
            let node = ast.expr_mut(expr_id);
            node.ty = class_ty;
            if let ExprKind::Call { resolved, .. } = &mut node.kind {
                *resolved = Some(class_id);
            }
            return;
        }

        handler.report_error(&filename, 12, interner.resolve(name), pos);
        ast.expr_mut(expr_id).ty = Type::ERROR;
    }

    fn check_cast(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (inner, target) = match &ast.expr(expr_id).kind {
            ExprKind::Cast { expr, target } => (*expr, target.clone()),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx, module, inner);
        let source_ty = ast.expr(inner).ty.clone();
        let target = resolve_named_type(ast, interner, module, handler, &filename, &target, pos);
        if source_ty.is_error() {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        let compatible = (source_ty.is_numeric() && target.is_numeric())
            || (source_ty.is_pointer() && target.is_pointer())
            || (source_ty.is_enum() && target.is_int())
            || (source_ty.is_int() && target.is_enum());
        if !compatible {
            handler.report_error(&filename, 27, &format!("{:?} as {:?}", source_ty, target), pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
        } else {
            ast.expr_mut(expr_id).ty = target;
        }
    }

    fn check_array_init(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let elements = match &ast.expr(expr_id).kind {
            ExprKind::ArrayInit { elements } => elements.clone(),
            _ => return,
        };
        if elements.is_empty() {
            handler.report_error(&filename, 32, "", pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        for &e in &elements {
            self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, e);
        }
        let base = ast.expr(elements[0]).ty.clone();
        let mut all_ok = !base.is_error();
        for &e in &elements[1..] {
            let ety = ast.expr(e).ty.clone();
            if !ety.is_error() && !base.equals_soft(&ety) {
                handler.report_error(&filename, 33, &format!("{:?}", ety), ast.expr(e).pos);
                all_ok = false;
            }
        }
        ast.expr_mut(expr_id).ty = if all_ok {
            Type::array_of(base, Some(elements.len() as u64))
        } else {
            Type::ERROR
        };
    }

    fn check_array_index(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let filename = module.filepath.clone();
        let pos = ast.expr(expr_id).pos;
        let (base, index) = match &ast.expr(expr_id).kind {
            ExprKind::ArrayIndex { base, index } => (*base, *index),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, base);
        self.check_expr(handler, ast, interner, ctx, module, index);
        let bty = ast.expr(base).ty.clone();
        let ity = ast.expr(index).ty.clone();
        if bty.is_error() || ity.is_error() {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        let elem = match &bty {
            Type::Array(inner, _) | Type::Pointer(inner) => Some((**inner).clone()),
            _ => None,
        };
        let Some(elem) = elem else {
            handler.report_error(&filename, 34, &format!("{:?}", bty), pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        };
        if !ity.is_int() {
            handler.report_error(&filename, 35, &format!("{:?}", ity), ast.expr(index).pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        ast.expr_mut(expr_id).ty = elem;
    }

    fn check_field_access(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let pos = ast.expr(expr_id).pos;
        let (base, field) = match &ast.expr(expr_id).kind {
            ExprKind::FieldAccess { base, field } => (*base, *field),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx, module, base);
        let bty = ast.expr(base).ty.clone();
        let Type::Class(class_id, _) = bty else {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        };
        if ast.decl(class_id).field_is_private(ast, interner, field) {
            handler.report_error(&module.filepath, 43, interner.resolve(field), pos);
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        }
        match ast.decl(class_id).get_field(ast, field) {
            Some(field_decl) => ast.expr_mut(expr_id).ty = ast.decl(field_decl).ty.clone(),
            None => ast.expr_mut(expr_id).ty = Type::ERROR,
        }
    }

    fn check_method_access(&mut self, handler: &mut Handler, ast: &mut Ast, interner: &Interner, mut ctx: Option<&mut FnCtx>, module: &Module, expr_id: ExprId) {
        let pos = ast.expr(expr_id).pos;
        let (base, method, args) = match &ast.expr(expr_id).kind {
            ExprKind::MethodAccess { base, method, args } => (*base, *method, args.clone()),
            _ => return,
        };
        self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, base);
        for &a in &args {
            self.check_expr(handler, ast, interner, ctx.as_deref_mut(), module, a);
        }
        let bty = ast.expr(base).ty.clone();
        let Type::Class(class_id, _) = bty else {
            ast.expr_mut(expr_id).ty = Type::ERROR;
            return;
        };
        match ast.decl(class_id).get_method(ast, method) {
            Some(method_decl) => {
                ast.decl_mut(method_decl).is_used = true;
                let return_type = match &ast.decl(method_decl).kind {
                    DeclKind::MethodDecl { return_type, .. } => return_type.clone(),
                    _ => Type::ERROR,
                };
                ast.expr_mut(expr_id).ty = return_type;
            }
            None => {
                handler.report_error(&module.filepath, 12, interner.resolve(method), pos);
                ast.expr_mut(expr_id).ty = Type::ERROR;
            }
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves `Murky` type references (and `Murky`s nested inside `Pointer`
/// / `Array`) against the module's enum and class declarations.
fn resolve_named_type(ast: &Ast, interner: &Interner, module: &Module, handler: &mut Handler, filename: &str, ty: &Type, pos: Position) -> Type {
    match ty {
        Type::Murky(name) => {
            if let Some(&id) = module.enums.iter().find(|&&e| ast.decl(e).ident == *name) {
                Type::Enum(id, *name)
            } else if let Some(&id) = module.classes.iter().find(|&&c| ast.decl(c).ident == *name) {
                Type::Class(id, *name)
            } else {
                handler.report_error(filename, 42, interner.resolve(*name), pos);
                Type::ERROR
            }
        }
        Type::Pointer(inner) => Type::pointer_to(resolve_named_type(ast, interner, module, handler, filename, inner, pos)),
        Type::Array(inner, len) => Type::array_of(resolve_named_type(ast, interner, module, handler, filename, inner, pos), *len),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::CliFlags;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn verify(source: &str) -> (Handler, Ast, Interner, Module) {
        let mut interner = Interner::new();
        let mut handler = Handler::new(CliFlags::default());
        handler.add_source("t.gl", source);
        let mut lexer = Lexer::new("t.gl", source);
        let tokens = lexer.tokenize(&mut handler, &mut interner).unwrap();
        let mut ast = Ast::new();
        let module = Parser::new(tokens, &interner).parse(&mut ast, "t.gl".to_string()).unwrap();
        let mut verifier = Verifier::new();
        verifier.check_module(&mut handler, &mut ast, &interner, &module);
        (handler, ast, interner, module)
    }

    fn find_local(ast: &Ast, interner: &Interner, body: StmtId, name: &str) -> Option<DeclId> {
        match &ast.stmt(body).kind {
            StmtKind::Compound(stmts) => stmts.iter().find_map(|&s| find_local(ast, interner, s, name)),
            StmtKind::LocalVar(decl_id) if interner.resolve(ast.decl(*decl_id).ident) == name => Some(*decl_id),
            _ => None,
        }
    }

    #[test]
    fn s1_minimal_main_verifies_clean() {
        let (handler, _, _, _) = verify("fn main() void { return; }");
        assert_eq!(handler.num_errors(), 0);
    }

    #[test]
    fn s2_missing_main_reports_diagnostic_zero() {
        let (handler, _, _, _) = verify("fn f() i64 { return 0; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn s3_type_mismatch_reports_diagnostic_six() {
        let (handler, _, _, _) = verify("fn main() void { let x: i64 = true; return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn s4_duplicate_function_reports_diagnostic_one() {
        let (handler, _, _, _) = verify(
            "fn f(a: i64) i64 { return a; }\nfn f(a: i64) i64 { return a; }\nfn main() void { return; }",
        );
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn s5_undeclared_variable_reports_diagnostic_eight() {
        let (handler, _, _, _) = verify("fn main() void { return x; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn s6_valid_arithmetic_verifies_clean_and_types_as_i64() {
        let (handler, ast, interner, module) = verify("fn main() void { let x: i64 = 1 + 2 * 3; return; }");
        assert_eq!(handler.num_errors(), 0);
        let main_fn = module.functions[0];
        let body = match &ast.decl(main_fn).kind {
            DeclKind::Function { body, .. } => *body,
            _ => unreachable!(),
        };
        let x = find_local(&ast, &interner, body, "x").expect("local x");
        assert!(ast.decl(x).ty.equals(&Type::I64));
    }

    #[test]
    fn reassigning_non_mut_local_is_an_error() {
        let (handler, _, _, _) = verify("fn main() void { let x: i64 = 1; x = 2; return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn mut_local_may_be_reassigned_with_matching_type() {
        let (handler, _, _, _) = verify("fn main() void { let mut x: i64 = 1; x = 2; return; }");
        assert_eq!(handler.num_errors(), 0);
    }

    #[test]
    fn while_with_non_boolean_condition_is_diagnostic_nineteen() {
        let (handler, _, _, _) = verify("fn main() void { while (1) { } return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn nested_block_cannot_see_outer_local_per_preserved_quirk() {
        let (handler, _, _, _) = verify("fn main() void { let x: i64 = 1; if (true) { x = 2; } return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn empty_array_initializer_is_diagnostic_thirty_two() {
        let (handler, _, _, _) = verify("fn main() void { let x: i64[] = []; return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn calling_main_from_within_main_is_diagnostic_thirteen() {
        let (handler, _, _, _) = verify("fn main() void { main(); return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn extern_variadic_may_only_be_the_trailing_entry() {
        let (handler, _, _, _) = verify("extern f(..., i64) void;\nfn main() void { return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn extern_trailing_variadic_is_well_formed() {
        let (handler, _, _, _) = verify("extern f(i64, ...) void;\nfn main() void { return; }");
        assert_eq!(handler.num_errors(), 0);
    }

    #[test]
    fn user_function_parameter_cannot_be_variadic() {
        let (handler, _, _, _) = verify("fn f(x: ...) void { return; }\nfn main() void { return; }");
        assert_eq!(handler.num_errors(), 1);
    }

    #[test]
    fn local_variable_cannot_be_declared_variadic() {
        let (handler, _, _, _) = verify("fn main() void { let x: ... = 1; return; }");
        assert_eq!(handler.num_errors(), 1);
    }
}
