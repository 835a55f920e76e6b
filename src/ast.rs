//! The AST: a tagged-variant tree of declarations, statements and
//! expressions, stored in index-addressed arenas rather than a
//! class-per-node, shared-ownership hierarchy.
//!
//! Back-edges (`Var -> Decl`, `Type -> Decl`, `child -> parent`) would form
//! cycles in a reference-counted tree. Here they're plain `Id` values into
//! arenas owned by `Ast`; freeing the arena releases the whole graph at
//! once, so there's nothing to break a cycle in.

use crate::intern::{Interner, Symbol};
use crate::token::Position;
use crate::types::Type;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            fn new(index: usize) -> Self {
                $name(index as u32)
            }

            fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(DeclId);
define_id!(StmtId);
define_id!(ExprId);

/// A reference to any arena-owned node, used for the generic `parent` link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId {
    Decl(DeclId),
    Stmt(StmtId),
    Expr(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Assign,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    Neg,
    Pos,
    AddrOf,
    Deref,
    PreIncr,
    PreDecr,
    PostIncr,
    PostDecr,
}

impl Operator {
    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            Operator::Assign
                | Operator::PlusEq
                | Operator::MinusEq
                | Operator::StarEq
                | Operator::SlashEq
        )
    }
}

#[derive(Debug)]
pub struct DeclNode {
    pub ident: Symbol,
    pub ty: Type,
    pub is_mut: bool,
    pub is_pub: bool,
    pub is_used: bool,
    pub is_reassigned: bool,
    /// Statement-number / depth-number pair used to mangle nested names as
    /// `.{stmt}_{depth}` (`decl.hpp`'s `get_append()`).
    pub statement_num: u32,
    pub depth_num: u32,
    pub pos: Position,
    pub parent: Option<NodeId>,
    pub kind: DeclKind,
}

#[derive(Debug)]
pub enum DeclKind {
    ParaDecl,
    LocalVarDecl { init: Option<ExprId> },
    GlobalVarDecl { init: Option<ExprId> },
    Function { params: Vec<DeclId>, return_type: Type, body: StmtId },
    Extern {
        param_types: Vec<Type>,
        return_type: Type,
        is_variadic: bool,
        /// Set when `...` appeared more than once, or anywhere but the
        /// final position, in the declaration's type list (diagnostic 17).
        variadic_malformed: bool,
    },
    EnumDecl { fields: Vec<Symbol> },
    ClassDecl {
        fields: Vec<DeclId>,
        methods: Vec<DeclId>,
        constructors: Vec<DeclId>,
        destructors: Vec<DeclId>,
    },
    ClassFieldDecl,
    MethodDecl { params: Vec<DeclId>, return_type: Type, body: StmtId },
    ConstructorDecl { params: Vec<DeclId>, body: StmtId },
    DestructorDecl { body: StmtId },
}

impl DeclNode {
    /// The dot-terminated parameter-type mangling key used for duplicate
    /// detection and later name-mangling, mirroring `Function::get_type_output`.
    pub fn mangled_params(&self, ast: &Ast) -> String {
        let params: &[DeclId] = match &self.kind {
            DeclKind::Function { params, .. } => params,
            DeclKind::MethodDecl { params, .. } => params,
            DeclKind::ConstructorDecl { params, .. } => params,
            _ => return String::new(),
        };
        let mut out = String::new();
        for &p in params {
            out.push_str(&format!("{:?}", ast.decl(p).ty));
            out.push('.');
        }
        out
    }

    pub fn name_mangle_suffix(&self) -> String {
        format!(".{}_{}", self.statement_num, self.depth_num)
    }

    /// Looks up a field by name on this `ClassDecl`, mirroring `decl.hpp`'s
    /// `ClassDecl::get_field`. `None` on a non-class node.
    pub fn get_field(&self, ast: &Ast, ident: Symbol) -> Option<DeclId> {
        let DeclKind::ClassDecl { fields, .. } = &self.kind else { return None };
        fields.iter().copied().find(|&f| ast.decl(f).ident == ident)
    }

    pub fn field_exists(&self, ast: &Ast, ident: Symbol) -> bool {
        self.get_field(ast, ident).is_some()
    }

    /// True if `ident` begins with `_`, the leading-underscore privacy
    /// convention `decl.hpp`'s `field_is_private` implements.
    pub fn field_is_private(&self, ast: &Ast, interner: &Interner, ident: Symbol) -> bool {
        if !self.field_exists(ast, ident) {
            return false;
        }
        interner.resolve(ident).starts_with('_')
    }

    /// The field's position within `ClassDecl::fields`, used to compute a
    /// struct member's storage offset (`decl.hpp`'s `get_index_for_field`).
    pub fn get_index_for_field(&self, ast: &Ast, ident: Symbol) -> Option<usize> {
        let DeclKind::ClassDecl { fields, .. } = &self.kind else { return None };
        fields.iter().position(|&f| ast.decl(f).ident == ident)
    }

    pub fn get_method(&self, ast: &Ast, ident: Symbol) -> Option<DeclId> {
        let DeclKind::ClassDecl { methods, .. } = &self.kind else { return None };
        methods.iter().copied().find(|&m| ast.decl(m).ident == ident)
    }

    pub fn method_exists(&self, ast: &Ast, ident: Symbol) -> bool {
        self.get_method(ast, ident).is_some()
    }
}

#[derive(Debug)]
pub struct StmtNode {
    pub pos: Position,
    pub parent: Option<NodeId>,
    pub kind: StmtKind,
}

#[derive(Debug)]
pub enum StmtKind {
    Empty,
    Compound(Vec<StmtId>),
    LocalVar(DeclId),
    Return(Option<ExprId>),
    Expr(ExprId),
    While { cond: ExprId, body: StmtId },
    If {
        cond: ExprId,
        then_branch: StmtId,
        first_elif: Option<StmtId>,
        else_branch: Option<StmtId>,
    },
    /// Chained alternative to `If`; `next` is the following `ElseIf` in the
    /// chain, or `None` when this is the last `else if`.
    ElseIf { cond: ExprId, body: StmtId, next: Option<StmtId> },
}

#[derive(Debug)]
pub struct ExprNode {
    pub ty: Type,
    pub pos: Position,
    pub parent: Option<NodeId>,
    pub kind: ExprKind,
}

#[derive(Debug)]
pub enum ExprKind {
    Empty,
    Assignment { lhs: ExprId, op: Operator, rhs: ExprId },
    Binary { lhs: ExprId, op: Operator, rhs: ExprId },
    Unary { op: Operator, operand: ExprId },
    Int(i64),
    UInt(u64),
    Decimal(f64),
    Bool(bool),
    Char(char),
    String(Symbol),
    Var { name: Symbol, resolved: Option<DeclId> },
    Call { name: Symbol, args: Vec<ExprId>, resolved: Option<DeclId> },
    Cast { expr: ExprId, target: Type },
    ArrayInit { elements: Vec<ExprId> },
    ArrayIndex { base: ExprId, index: ExprId },
    EnumAccess { enum_name: Symbol, field: Symbol },
    FieldAccess { base: ExprId, field: Symbol },
    MethodAccess { base: ExprId, method: Symbol, args: Vec<ExprId> },
}

impl ExprKind {
    /// An lvalue is an expression addressable in memory: currently only
    /// `Var`, `ArrayIndex` and `FieldAccess`.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            ExprKind::Var { .. } | ExprKind::ArrayIndex { .. } | ExprKind::FieldAccess { .. }
        )
    }
}

/// Owns every Decl/Stmt/Expr node allocated while parsing one source file.
#[derive(Debug, Default)]
pub struct Ast {
    decls: Vec<DeclNode>,
    stmts: Vec<StmtNode>,
    exprs: Vec<ExprNode>,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    pub fn alloc_decl(&mut self, node: DeclNode) -> DeclId {
        self.decls.push(node);
        DeclId::new(self.decls.len() - 1)
    }

    pub fn alloc_stmt(&mut self, node: StmtNode) -> StmtId {
        self.stmts.push(node);
        StmtId::new(self.stmts.len() - 1)
    }

    pub fn alloc_expr(&mut self, node: ExprNode) -> ExprId {
        self.exprs.push(node);
        ExprId::new(self.exprs.len() - 1)
    }

    pub fn decl(&self, id: DeclId) -> &DeclNode {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut DeclNode {
        &mut self.decls[id.index()]
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.exprs[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }
}

/// Ordered lists of top-level declarations parsed from one source file.
#[derive(Debug, Default)]
pub struct Module {
    pub filepath: String,
    pub functions: Vec<DeclId>,
    pub externs: Vec<DeclId>,
    pub enums: Vec<DeclId>,
    pub classes: Vec<DeclId>,
    pub globals: Vec<DeclId>,
}

impl Module {
    pub fn new(filepath: String) -> Self {
        Module {
            filepath,
            ..Default::default()
        }
    }

    pub fn function_with_name_exists(&self, ast: &Ast, ident: Symbol) -> bool {
        self.functions.iter().any(|&id| ast.decl(id).ident == ident)
    }
}

#[derive(Debug, Default)]
pub struct AllModules {
    pub modules: Vec<Module>,
    pub main_module: Option<usize>,
}

impl AllModules {
    pub fn new() -> Self {
        AllModules::default()
    }

    pub fn add_module(&mut self, module: Module) -> usize {
        self.modules.push(module);
        self.modules.len() - 1
    }

    pub fn add_main_module(&mut self, module: Module) -> usize {
        let idx = self.add_module(module);
        self.main_module = Some(idx);
        idx
    }

    pub fn module_exists_from_filename(&self, filepath: &str) -> bool {
        self.modules.iter().any(|m| m.filepath == filepath)
    }

    pub fn main_module(&self) -> Option<&Module> {
        self.main_module.map(|idx| &self.modules[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_decl(ast: &mut Ast, ident: Symbol) -> DeclId {
        ast.alloc_decl(DeclNode {
            ident,
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos: Position::default(),
            parent: None,
            kind: DeclKind::ParaDecl,
        })
    }

    #[test]
    fn arena_ids_are_distinct_per_allocation() {
        let mut ast = Ast::new();
        let a = dummy_decl(&mut ast, Symbol::EMPTY);
        let b = dummy_decl(&mut ast, Symbol::EMPTY);
        assert_ne!(a, b);
        assert_eq!(ast.decl_count(), 2);
    }

    #[test]
    fn lvalue_classification_matches_spec_glossary() {
        assert!(ExprKind::Var { name: Symbol::EMPTY, resolved: None }.is_lvalue());
        assert!(!ExprKind::Int(1).is_lvalue());
    }

    #[test]
    fn name_mangle_suffix_uses_statement_and_depth() {
        let decl = DeclNode {
            ident: Symbol::EMPTY,
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 3,
            depth_num: 2,
            pos: Position::default(),
            parent: None,
            kind: DeclKind::ParaDecl,
        };
        assert_eq!(decl.name_mangle_suffix(), ".3_2");
    }

    #[test]
    fn main_module_designation_is_tracked() {
        let mut all = AllModules::new();
        all.add_module(Module::new("lib.gl".into()));
        all.add_main_module(Module::new("main.gl".into()));
        assert_eq!(all.main_module().unwrap().filepath, "main.gl");
    }

    #[test]
    fn class_decl_lookup_helpers_resolve_fields_and_methods_by_name() {
        let mut interner = Interner::new();
        let mut ast = Ast::new();
        let x = interner.intern("x");
        let secret = interner.intern("_secret");
        let foo = interner.intern("foo");
        let missing = interner.intern("missing");

        let x_field = dummy_decl(&mut ast, x);
        let secret_field = dummy_decl(&mut ast, secret);
        let foo_method = dummy_decl(&mut ast, foo);
        let class = ast.alloc_decl(DeclNode {
            ident: interner.intern("Widget"),
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos: Position::default(),
            parent: None,
            kind: DeclKind::ClassDecl {
                fields: vec![x_field, secret_field],
                methods: vec![foo_method],
                constructors: vec![],
                destructors: vec![],
            },
        });
        let class_decl = ast.decl(class);

        assert!(class_decl.field_exists(&ast, x));
        assert!(!class_decl.field_exists(&ast, missing));
        assert_eq!(class_decl.get_field(&ast, x), Some(x_field));
        assert_eq!(class_decl.get_index_for_field(&ast, x), Some(0));
        assert_eq!(class_decl.get_index_for_field(&ast, secret), Some(1));
        assert_eq!(class_decl.get_index_for_field(&ast, missing), None);
        assert!(!class_decl.field_is_private(&ast, &interner, x));
        assert!(class_decl.field_is_private(&ast, &interner, secret));
        assert!(!class_decl.field_is_private(&ast, &interner, missing));

        assert!(class_decl.method_exists(&ast, foo));
        assert!(!class_decl.method_exists(&ast, missing));
        assert_eq!(class_decl.get_method(&ast, foo), Some(foo_method));
    }
}
