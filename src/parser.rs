//! Recursive-descent parser producing the typed AST, grounded on
//! `examples/original_source/src/parser.hpp` (method shape/precedence
//! chain) and extended with the richer grammar (cast, relational
//! operators, postfix forms) spec.md's grammar adds on top of it.
//!
//! Fails fast: the first grammar mismatch returns a `ParseError`: there is
//! no error recovery (spec §4.3's "Failure semantics"). The original's
//! direct `exit()` call is replaced with this `Result`, per the REDESIGN
//! FLAGS note in spec §9 — the driver turns an `Err` into a process exit.

use crate::ast::{Ast, DeclId, DeclKind, DeclNode, ExprId, ExprKind, ExprNode, Module, NodeId, Operator, StmtId, StmtKind, StmtNode};
use crate::intern::{Interner, Symbol};
use crate::token::{Position, Token, TokenKind};
use crate::types::{Primitive, Type};
use std::fmt;

#[derive(Debug)]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.pos.line_start, self.pos.col_start, self.message
        )
    }
}

impl std::error::Error for ParseError {}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    interner: &'a Interner,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, interner: &'a Interner) -> Self {
        Parser {
            tokens,
            pos: 0,
            interner,
        }
    }

    // ---- cursor helpers -------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = *self.current();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn try_consume(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn consume(&mut self, kind: TokenKind) -> PResult<Token> {
        self.try_consume(kind).ok_or_else(|| self.syntactic_error(kind))
    }

    fn syntactic_error(&self, expected: TokenKind) -> ParseError {
        let tok = self.current();
        ParseError {
            message: format!(
                "expected {:?}, found '{}'",
                expected,
                self.interner.resolve(tok.lexeme)
            ),
            pos: tok.pos,
        }
    }

    fn start(&self) -> Position {
        self.current().pos
    }

    /// Closes a production's span over everything consumed since `start`.
    fn finish(&self, start: Position) -> Position {
        let last = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)];
        start.merge(last.pos)
    }

    fn parse_ident(&mut self) -> PResult<Symbol> {
        Ok(self.consume(TokenKind::Ident)?.lexeme)
    }

    // ---- types ------------------------------------------------------------

    /// `name` (primitive or Murky) followed by optional `[size?]` (array)
    /// **xor** one-or-more trailing `*` (pointer nesting).
    fn parse_type(&mut self) -> PResult<Type> {
        let base = match self.current().kind {
            TokenKind::Void => {
                self.advance();
                Type::VOID
            }
            TokenKind::Bool => {
                self.advance();
                Type::BOOL
            }
            TokenKind::I8 => {
                self.advance();
                Type::Primitive(Primitive::I8)
            }
            TokenKind::I32 => {
                self.advance();
                Type::Primitive(Primitive::I32)
            }
            TokenKind::I64 => {
                self.advance();
                Type::I64
            }
            TokenKind::U8 => {
                self.advance();
                Type::Primitive(Primitive::U8)
            }
            TokenKind::U32 => {
                self.advance();
                Type::Primitive(Primitive::U32)
            }
            TokenKind::U64 => {
                self.advance();
                Type::Primitive(Primitive::U64)
            }
            TokenKind::F32 => {
                self.advance();
                Type::Primitive(Primitive::F32)
            }
            TokenKind::F64 => {
                self.advance();
                Type::Primitive(Primitive::F64)
            }
            TokenKind::Variadic => {
                self.advance();
                Type::Primitive(Primitive::Variadic)
            }
            TokenKind::Ident => {
                let sym = self.advance().lexeme;
                Type::Murky(sym)
            }
            _ => return Err(self.syntactic_error(TokenKind::Ident)),
        };

        if self.check(TokenKind::LBracket) {
            self.advance();
            let length = if self.check(TokenKind::IntLiteral) {
                let tok = self.advance();
                self.interner.resolve(tok.lexeme).parse::<u64>().ok()
            } else {
                None
            };
            self.consume(TokenKind::RBracket)?;
            return Ok(Type::array_of(base, length));
        }

        let mut ty = base;
        while self.try_consume(TokenKind::Star).is_some() {
            ty = Type::pointer_to(ty);
        }
        Ok(ty)
    }

    fn parse_para_list(&mut self, ast: &mut Ast) -> PResult<Vec<DeclId>> {
        self.consume(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let start = self.start();
            let ident = self.parse_ident()?;
            self.consume(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            let pos = self.finish(start);
            let id = ast.alloc_decl(DeclNode {
                ident,
                ty,
                is_mut: false,
                is_pub: false,
                is_used: false,
                is_reassigned: false,
                statement_num: 0,
                depth_num: 0,
                pos,
                parent: None,
                kind: DeclKind::ParaDecl,
            });
            params.push(id);
            if self.try_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        Ok(params)
    }

    /// Returns `(param_types, is_variadic, variadic_malformed)`. `...` is
    /// only well-formed as the single, final entry of the list; a second
    /// occurrence or one followed by more types sets `variadic_malformed`
    /// rather than failing to parse — that's a semantic concern (diagnostic
    /// 17), not a grammar error.
    fn parse_type_list(&mut self) -> PResult<(Vec<Type>, bool, bool)> {
        self.consume(TokenKind::LParen)?;
        let mut types = Vec::new();
        let mut is_variadic = false;
        let mut variadic_malformed = false;
        while !self.check(TokenKind::RParen) {
            if self.check(TokenKind::Variadic) {
                self.advance();
                if is_variadic || !self.check(TokenKind::RParen) {
                    variadic_malformed = true;
                }
                is_variadic = true;
            } else {
                if is_variadic {
                    variadic_malformed = true;
                }
                types.push(self.parse_type()?);
            }
            if self.try_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        Ok((types, is_variadic, variadic_malformed))
    }

    fn parse_arg_list(&mut self, ast: &mut Ast) -> PResult<Vec<ExprId>> {
        self.consume(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expr(ast)?);
            if self.try_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.consume(TokenKind::RParen)?;
        Ok(args)
    }

    // ---- statements ---------------------------------------------------

    pub fn parse_compound_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        let start = self.start();
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            stmts.push(self.parse_stmt(ast)?);
        }
        self.consume(TokenKind::RBrace)?;
        let pos = self.finish(start);
        let id = ast.alloc_stmt(StmtNode {
            pos,
            parent: None,
            kind: StmtKind::Compound(stmts.clone()),
        });
        for s in stmts {
            ast.stmt_mut(s).parent = Some(NodeId::Stmt(id));
        }
        Ok(id)
    }

    fn parse_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        match self.current().kind {
            TokenKind::Semicolon => {
                let pos = self.start();
                self.advance();
                Ok(ast.alloc_stmt(StmtNode {
                    pos,
                    parent: None,
                    kind: StmtKind::Empty,
                }))
            }
            TokenKind::LBrace => self.parse_compound_stmt(ast),
            TokenKind::Let => self.parse_local_var_stmt(ast),
            TokenKind::Return => self.parse_return_stmt(ast),
            TokenKind::While => self.parse_while_stmt(ast),
            TokenKind::If => self.parse_if_stmt(ast),
            _ => {
                let start = self.start();
                let expr = self.parse_expr(ast)?;
                self.consume(TokenKind::Semicolon)?;
                let pos = self.finish(start);
                Ok(ast.alloc_stmt(StmtNode {
                    pos,
                    parent: None,
                    kind: StmtKind::Expr(expr),
                }))
            }
        }
    }

    fn parse_local_var_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        let start = self.start();
        self.consume(TokenKind::Let)?;
        let is_mut = self.try_consume(TokenKind::Mut).is_some();
        let ident = self.parse_ident()?;
        let annotated = if self.try_consume(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.try_consume(TokenKind::Assign).is_some() {
            Some(self.parse_expr(ast)?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        let pos = self.finish(start);
        let ty = annotated.unwrap_or(Type::UNKNOWN);
        let decl = ast.alloc_decl(DeclNode {
            ident,
            ty,
            is_mut,
            is_pub: false,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::LocalVarDecl { init },
        });
        let stmt = ast.alloc_stmt(StmtNode {
            pos,
            parent: None,
            kind: StmtKind::LocalVar(decl),
        });
        ast.decl_mut(decl).parent = Some(NodeId::Stmt(stmt));
        Ok(stmt)
    }

    fn parse_return_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        let start = self.start();
        self.consume(TokenKind::Return)?;
        let expr = if !self.check(TokenKind::Semicolon) {
            Some(self.parse_expr(ast)?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        let pos = self.finish(start);
        Ok(ast.alloc_stmt(StmtNode {
            pos,
            parent: None,
            kind: StmtKind::Return(expr),
        }))
    }

    fn parse_while_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        let start = self.start();
        self.consume(TokenKind::While)?;
        self.consume(TokenKind::LParen)?;
        let cond = self.parse_expr(ast)?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_compound_stmt(ast)?;
        let pos = self.finish(start);
        let id = ast.alloc_stmt(StmtNode {
            pos,
            parent: None,
            kind: StmtKind::While { cond, body },
        });
        ast.stmt_mut(body).parent = Some(NodeId::Stmt(id));
        Ok(id)
    }

    fn parse_if_stmt(&mut self, ast: &mut Ast) -> PResult<StmtId> {
        let start = self.start();
        self.consume(TokenKind::If)?;
        self.consume(TokenKind::LParen)?;
        let cond = self.parse_expr(ast)?;
        self.consume(TokenKind::RParen)?;
        let then_branch = self.parse_compound_stmt(ast)?;

        let mut elif_ids = Vec::new();
        while self.check(TokenKind::ElseIf) {
            let elif_start = self.start();
            self.advance();
            self.consume(TokenKind::LParen)?;
            let econd = self.parse_expr(ast)?;
            self.consume(TokenKind::RParen)?;
            let ebody = self.parse_compound_stmt(ast)?;
            let epos = self.finish(elif_start);
            let eid = ast.alloc_stmt(StmtNode {
                pos: epos,
                parent: None,
                kind: StmtKind::ElseIf {
                    cond: econd,
                    body: ebody,
                    next: None,
                },
            });
            elif_ids.push(eid);
        }
        for pair in elif_ids.windows(2) {
            if let StmtKind::ElseIf { next, .. } = &mut ast.stmt_mut(pair[0]).kind {
                *next = Some(pair[1]);
            }
        }
        let first_elif = elif_ids.first().copied();

        let else_branch = if self.try_consume(TokenKind::Else).is_some() {
            Some(self.parse_compound_stmt(ast)?)
        } else {
            None
        };
        let pos = self.finish(start);
        Ok(ast.alloc_stmt(StmtNode {
            pos,
            parent: None,
            kind: StmtKind::If {
                cond,
                then_branch,
                first_elif,
                else_branch,
            },
        }))
    }

    // ---- expressions: precedence chain, low to high -----------------------

    fn parse_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        let start = self.start();
        let mut e = self.parse_assignment_expr(ast)?;
        if self.try_consume(TokenKind::As).is_some() {
            let target = self.parse_type()?;
            let pos = self.finish(start);
            e = ast.alloc_expr(ExprNode {
                ty: Type::UNKNOWN,
                pos,
                parent: None,
                kind: ExprKind::Cast { expr: e, target },
            });
        }
        Ok(e)
    }

    fn assignment_operator(&self) -> Option<Operator> {
        match self.current().kind {
            TokenKind::Assign => Some(Operator::Assign),
            TokenKind::PlusEq => Some(Operator::PlusEq),
            TokenKind::MinusEq => Some(Operator::MinusEq),
            TokenKind::StarEq => Some(Operator::StarEq),
            TokenKind::SlashEq => Some(Operator::SlashEq),
            _ => None,
        }
    }

    fn parse_assignment_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        let start = self.start();
        let lhs = self.parse_logical_or_expr(ast)?;
        if let Some(op) = self.assignment_operator() {
            self.advance();
            let rhs = self.parse_assignment_expr(ast)?; // right-associative
            let pos = self.finish(start);
            return Ok(ast.alloc_expr(ExprNode {
                ty: Type::UNKNOWN,
                pos,
                parent: None,
                kind: ExprKind::Assignment { lhs, op, rhs },
            }));
        }
        Ok(lhs)
    }

    fn parse_binary_level(
        &mut self,
        ast: &mut Ast,
        next: fn(&mut Self, &mut Ast) -> PResult<ExprId>,
        ops: &[(TokenKind, Operator)],
    ) -> PResult<ExprId> {
        let start = self.start();
        let mut lhs = next(self, ast)?;
        while let Some(&(_, op)) = ops.iter().find(|(k, _)| self.check(*k)) {
            self.advance();
            let rhs = next(self, ast)?;
            let pos = self.finish(start);
            lhs = ast.alloc_expr(ExprNode {
                ty: Type::UNKNOWN,
                pos,
                parent: None,
                kind: ExprKind::Binary { lhs, op, rhs },
            });
        }
        Ok(lhs)
    }

    fn parse_logical_or_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(ast, Self::parse_logical_and_expr, &[(TokenKind::OrOr, Operator::Or)])
    }

    fn parse_logical_and_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(ast, Self::parse_equality_expr, &[(TokenKind::AndAnd, Operator::And)])
    }

    fn parse_equality_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(
            ast,
            Self::parse_relational_expr,
            &[(TokenKind::EqEq, Operator::Eq), (TokenKind::NotEq, Operator::NotEq)],
        )
    }

    fn parse_relational_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(
            ast,
            Self::parse_additive_expr,
            &[
                (TokenKind::Lt, Operator::Lt),
                (TokenKind::LtEq, Operator::LtEq),
                (TokenKind::Gt, Operator::Gt),
                (TokenKind::GtEq, Operator::GtEq),
            ],
        )
    }

    fn parse_additive_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(
            ast,
            Self::parse_multiplicative_expr,
            &[(TokenKind::Plus, Operator::Add), (TokenKind::Minus, Operator::Sub)],
        )
    }

    fn parse_multiplicative_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        self.parse_binary_level(
            ast,
            Self::parse_unary_expr,
            &[
                (TokenKind::Star, Operator::Mul),
                (TokenKind::Slash, Operator::Div),
                (TokenKind::Percent, Operator::Mod),
            ],
        )
    }

    fn parse_unary_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        let start = self.start();
        let op = match self.current().kind {
            TokenKind::Bang => Some(Operator::Not),
            TokenKind::Plus => Some(Operator::Pos),
            TokenKind::Minus => Some(Operator::Neg),
            TokenKind::Star => Some(Operator::Deref),
            TokenKind::Amp => Some(Operator::AddrOf),
            TokenKind::PlusPlus => Some(Operator::PreIncr),
            TokenKind::MinusMinus => Some(Operator::PreDecr),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary_expr(ast)?;
            let pos = self.finish(start);
            return Ok(ast.alloc_expr(ExprNode {
                ty: Type::UNKNOWN,
                pos,
                parent: None,
                kind: ExprKind::Unary { op, operand },
            }));
        }
        if self.check(TokenKind::LBracket) {
            return self.parse_array_init(ast, start);
        }
        self.parse_postfix_expr(ast)
    }

    fn parse_array_init(&mut self, ast: &mut Ast, start: Position) -> PResult<ExprId> {
        self.consume(TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expr(ast)?);
            if self.try_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.consume(TokenKind::RBracket)?;
        let pos = self.finish(start);
        Ok(ast.alloc_expr(ExprNode {
            ty: Type::UNKNOWN,
            pos,
            parent: None,
            kind: ExprKind::ArrayInit { elements },
        }))
    }

    fn parse_postfix_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        let start = self.start();
        let mut e = self.parse_primary_expr(ast)?;
        loop {
            match self.current().kind {
                TokenKind::LParen => {
                    let name = match &ast.expr(e).kind {
                        ExprKind::Var { name, .. } => *name,
                        _ => {
                            return Err(ParseError {
                                message: "call target must be an identifier".to_string(),
                                pos: self.current().pos,
                            })
                        }
                    };
                    let args = self.parse_arg_list(ast)?;
                    let pos = self.finish(start);
                    e = ast.alloc_expr(ExprNode {
                        ty: Type::UNKNOWN,
                        pos,
                        parent: None,
                        kind: ExprKind::Call { name, args, resolved: None },
                    });
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr(ast)?;
                    self.consume(TokenKind::RBracket)?;
                    let pos = self.finish(start);
                    e = ast.alloc_expr(ExprNode {
                        ty: Type::UNKNOWN,
                        pos,
                        parent: None,
                        kind: ExprKind::ArrayIndex { base: e, index },
                    });
                }
                TokenKind::ColonColon => {
                    let enum_name = match &ast.expr(e).kind {
                        ExprKind::Var { name, .. } => *name,
                        _ => {
                            return Err(ParseError {
                                message: "enum access target must be an identifier".to_string(),
                                pos: self.current().pos,
                            })
                        }
                    };
                    self.advance();
                    let field = self.parse_ident()?;
                    let pos = self.finish(start);
                    e = ast.alloc_expr(ExprNode {
                        ty: Type::UNKNOWN,
                        pos,
                        parent: None,
                        kind: ExprKind::EnumAccess { enum_name, field },
                    });
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.parse_ident()?;
                    if self.check(TokenKind::LParen) {
                        let args = self.parse_arg_list(ast)?;
                        let pos = self.finish(start);
                        e = ast.alloc_expr(ExprNode {
                            ty: Type::UNKNOWN,
                            pos,
                            parent: None,
                            kind: ExprKind::MethodAccess { base: e, method: field, args },
                        });
                    } else {
                        let pos = self.finish(start);
                        e = ast.alloc_expr(ExprNode {
                            ty: Type::UNKNOWN,
                            pos,
                            parent: None,
                            kind: ExprKind::FieldAccess { base: e, field },
                        });
                    }
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    let pos = self.finish(start);
                    e = ast.alloc_expr(ExprNode {
                        ty: Type::UNKNOWN,
                        pos,
                        parent: None,
                        kind: ExprKind::Unary { op: Operator::PostIncr, operand: e },
                    });
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    let pos = self.finish(start);
                    e = ast.alloc_expr(ExprNode {
                        ty: Type::UNKNOWN,
                        pos,
                        parent: None,
                        kind: ExprKind::Unary { op: Operator::PostDecr, operand: e },
                    });
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary_expr(&mut self, ast: &mut Ast) -> PResult<ExprId> {
        let tok = *self.current();
        match tok.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::Var { name: tok.lexeme, resolved: None },
                }))
            }
            TokenKind::IntLiteral => {
                self.advance();
                let value: i64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0);
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::Int(value),
                }))
            }
            TokenKind::FloatLiteral => {
                self.advance();
                let value: f64 = self.interner.resolve(tok.lexeme).parse().unwrap_or(0.0);
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::Decimal(value),
                }))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::Bool(tok.kind == TokenKind::True),
                }))
            }
            TokenKind::StringLiteral => {
                self.advance();
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::String(tok.lexeme),
                }))
            }
            TokenKind::CharLiteral => {
                self.advance();
                let ch = self.interner.resolve(tok.lexeme).chars().next().unwrap_or('\0');
                Ok(ast.alloc_expr(ExprNode {
                    ty: Type::UNKNOWN,
                    pos: tok.pos,
                    parent: None,
                    kind: ExprKind::Char(ch),
                }))
            }
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_expr(ast)?;
                self.consume(TokenKind::RParen)?;
                Ok(e)
            }
            _ => Err(self.syntactic_error(TokenKind::Ident)),
        }
    }

    // ---- top level ------------------------------------------------------

    pub fn parse(&mut self, ast: &mut Ast, filepath: String) -> PResult<Module> {
        let mut module = Module::new(filepath);
        while !self.check(TokenKind::Eof) {
            self.parse_top_level_decl(ast, &mut module)?;
        }
        Ok(module)
    }

    fn parse_top_level_decl(&mut self, ast: &mut Ast, module: &mut Module) -> PResult<()> {
        let is_pub = self.try_consume(TokenKind::Pub).is_some();
        match self.current().kind {
            TokenKind::Fn => {
                let id = self.parse_function(ast, is_pub)?;
                module.functions.push(id);
            }
            TokenKind::Extern => {
                let id = self.parse_extern(ast, is_pub)?;
                module.externs.push(id);
            }
            TokenKind::Enum => {
                let id = self.parse_enum(ast, is_pub)?;
                module.enums.push(id);
            }
            TokenKind::Let => {
                let id = self.parse_global_var(ast, is_pub)?;
                module.globals.push(id);
            }
            TokenKind::Class => {
                let id = self.parse_class(ast, is_pub)?;
                module.classes.push(id);
            }
            _ => return Err(self.syntactic_error(TokenKind::Fn)),
        }
        Ok(())
    }

    fn parse_function(&mut self, ast: &mut Ast, is_pub: bool) -> PResult<DeclId> {
        let start = self.start();
        self.consume(TokenKind::Fn)?;
        let ident = self.parse_ident()?;
        let params = self.parse_para_list(ast)?;
        let return_type = self.parse_type()?;
        let body = self.parse_compound_stmt(ast)?;
        let pos = self.finish(start);
        let id = ast.alloc_decl(DeclNode {
            ident,
            ty: return_type.clone(),
            is_mut: false,
            is_pub,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::Function { params: params.clone(), return_type, body },
        });
        for p in params {
            ast.decl_mut(p).parent = Some(NodeId::Decl(id));
        }
        ast.stmt_mut(body).parent = Some(NodeId::Decl(id));
        Ok(id)
    }

    fn parse_extern(&mut self, ast: &mut Ast, is_pub: bool) -> PResult<DeclId> {
        let start = self.start();
        self.consume(TokenKind::Extern)?;
        let ident = self.parse_ident()?;
        let (param_types, is_variadic, variadic_malformed) = self.parse_type_list()?;
        let return_type = self.parse_type()?;
        self.consume(TokenKind::Semicolon)?;
        let pos = self.finish(start);
        Ok(ast.alloc_decl(DeclNode {
            ident,
            ty: return_type.clone(),
            is_mut: false,
            is_pub,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::Extern { param_types, return_type, is_variadic, variadic_malformed },
        }))
    }

    fn parse_enum(&mut self, ast: &mut Ast, is_pub: bool) -> PResult<DeclId> {
        let start = self.start();
        self.consume(TokenKind::Enum)?;
        let ident = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            fields.push(self.parse_ident()?);
            if self.try_consume(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.consume(TokenKind::RBrace)?;
        let pos = self.finish(start);
        let id = ast.alloc_decl(DeclNode {
            ident,
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::EnumDecl { fields },
        });
        ast.decl_mut(id).ty = Type::Enum(id, ident);
        Ok(id)
    }

    fn parse_global_var(&mut self, ast: &mut Ast, is_pub: bool) -> PResult<DeclId> {
        let start = self.start();
        self.consume(TokenKind::Let)?;
        let is_mut = self.try_consume(TokenKind::Mut).is_some();
        let ident = self.parse_ident()?;
        let annotated = if self.try_consume(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.try_consume(TokenKind::Assign).is_some() {
            Some(self.parse_expr(ast)?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon)?;
        let pos = self.finish(start);
        let ty = annotated.unwrap_or(Type::UNKNOWN);
        Ok(ast.alloc_decl(DeclNode {
            ident,
            ty,
            is_mut,
            is_pub,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::GlobalVarDecl { init },
        }))
    }

    /// Mode-dispatched class body: an identifier equal to the class name
    /// followed by `(` is a constructor; `~ident(...)` is a destructor;
    /// `fn ident` is a method; any other `ident: type` is a field.
    fn parse_class(&mut self, ast: &mut Ast, is_pub: bool) -> PResult<DeclId> {
        let start = self.start();
        self.consume(TokenKind::Class)?;
        let ident = self.parse_ident()?;
        let class_name = self.interner.resolve(ident).to_string();
        self.consume(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut constructors = Vec::new();
        let mut destructors = Vec::new();

        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Tilde) {
                let dstart = self.start();
                self.advance();
                self.parse_ident()?;
                self.consume(TokenKind::LParen)?;
                self.consume(TokenKind::RParen)?;
                let body = self.parse_compound_stmt(ast)?;
                let pos = self.finish(dstart);
                destructors.push(ast.alloc_decl(DeclNode {
                    ident,
                    ty: Type::VOID,
                    is_mut: false,
                    is_pub: false,
                    is_used: false,
                    is_reassigned: false,
                    statement_num: 0,
                    depth_num: 0,
                    pos,
                    parent: None,
                    kind: DeclKind::DestructorDecl { body },
                }));
            } else if self.check(TokenKind::Ident)
                && self.interner.resolve(self.current().lexeme) == class_name
                && self.peek_kind(1) == TokenKind::LParen
            {
                let cstart = self.start();
                self.advance();
                let params = self.parse_para_list(ast)?;
                let body = self.parse_compound_stmt(ast)?;
                let pos = self.finish(cstart);
                constructors.push(ast.alloc_decl(DeclNode {
                    ident,
                    ty: Type::VOID,
                    is_mut: false,
                    is_pub: false,
                    is_used: false,
                    is_reassigned: false,
                    statement_num: 0,
                    depth_num: 0,
                    pos,
                    parent: None,
                    kind: DeclKind::ConstructorDecl { params, body },
                }));
            } else if self.check(TokenKind::Fn) {
                let mstart = self.start();
                self.advance();
                let mident = self.parse_ident()?;
                let params = self.parse_para_list(ast)?;
                let return_type = self.parse_type()?;
                let body = self.parse_compound_stmt(ast)?;
                let pos = self.finish(mstart);
                methods.push(ast.alloc_decl(DeclNode {
                    ident: mident,
                    ty: return_type.clone(),
                    is_mut: false,
                    is_pub: false,
                    is_used: false,
                    is_reassigned: false,
                    statement_num: 0,
                    depth_num: 0,
                    pos,
                    parent: None,
                    kind: DeclKind::MethodDecl { params, return_type, body },
                }));
            } else {
                let fstart = self.start();
                let fident = self.parse_ident()?;
                self.consume(TokenKind::Colon)?;
                let fty = self.parse_type()?;
                self.consume(TokenKind::Semicolon)?;
                let pos = self.finish(fstart);
                fields.push(ast.alloc_decl(DeclNode {
                    ident: fident,
                    ty: fty,
                    is_mut: true,
                    is_pub: false,
                    is_used: false,
                    is_reassigned: false,
                    statement_num: 0,
                    depth_num: 0,
                    pos,
                    parent: None,
                    kind: DeclKind::ClassFieldDecl,
                }));
            }
        }
        self.consume(TokenKind::RBrace)?;
        let pos = self.finish(start);
        let id = ast.alloc_decl(DeclNode {
            ident,
            ty: Type::UNKNOWN,
            is_mut: false,
            is_pub,
            is_used: false,
            is_reassigned: false,
            statement_num: 0,
            depth_num: 0,
            pos,
            parent: None,
            kind: DeclKind::ClassDecl { fields, methods, constructors, destructors },
        });
        ast.decl_mut(id).ty = Type::Class(id, ident);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_source(source: &str) -> (Ast, Module, Interner) {
        let mut interner = Interner::new();
        let mut handler = crate::handler::Handler::new(Default::default());
        let mut lexer = Lexer::new("t.gl", source);
        let tokens = lexer.tokenize(&mut handler, &mut interner).unwrap();
        let mut ast = Ast::new();
        let module = Parser::new(tokens, &interner).parse(&mut ast, "t.gl".to_string()).unwrap();
        (ast, module, interner)
    }

    #[test]
    fn parses_minimal_main() {
        let (ast, module, _) = parse_source("fn main() void { return; }");
        assert_eq!(module.functions.len(), 1);
        let f = ast.decl(module.functions[0]);
        assert!(f.ty.is_void());
    }

    #[test]
    fn arithmetic_precedence_binds_multiplication_tighter_than_addition() {
        let (ast, module, _) = parse_source("fn main() void { let x: i64 = 1 + 2 * 3; return; }");
        let f = ast.decl(module.functions[0]);
        let (DeclKind::Function { body, .. }) = &f.kind else { unreachable!() };
        let StmtKind::Compound(stmts) = &ast.stmt(*body).kind else { unreachable!() };
        let StmtKind::LocalVar(decl) = &ast.stmt(stmts[0]).kind else { unreachable!() };
        let DeclKind::LocalVarDecl { init } = &ast.decl(*decl).kind else { unreachable!() };
        let ExprKind::Binary { lhs, op, rhs } = &ast.expr(init.unwrap()).kind else { unreachable!() };
        assert_eq!(*op, Operator::Add);
        assert!(matches!(ast.expr(*lhs).kind, ExprKind::Int(1)));
        assert!(matches!(ast.expr(*rhs).kind, ExprKind::Binary { op: Operator::Mul, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let (ast, module, _) = parse_source("fn main() void { x = y = 1; }");
        let f = ast.decl(module.functions[0]);
        let DeclKind::Function { body, .. } = &f.kind else { unreachable!() };
        let StmtKind::Compound(stmts) = &ast.stmt(*body).kind else { unreachable!() };
        let StmtKind::Expr(expr) = &ast.stmt(stmts[0]).kind else { unreachable!() };
        let ExprKind::Assignment { rhs, .. } = &ast.expr(*expr).kind else { unreachable!() };
        assert!(matches!(ast.expr(*rhs).kind, ExprKind::Assignment { .. }));
    }

    #[test]
    fn cast_wraps_the_whole_assignment_level_expression() {
        let (ast, module, _) = parse_source("fn main() void { let x: i64 = 1 + 2 as i64; return; }");
        let f = ast.decl(module.functions[0]);
        let DeclKind::Function { body, .. } = &f.kind else { unreachable!() };
        let StmtKind::Compound(stmts) = &ast.stmt(*body).kind else { unreachable!() };
        let StmtKind::LocalVar(decl) = &ast.stmt(stmts[0]).kind else { unreachable!() };
        let DeclKind::LocalVarDecl { init } = &ast.decl(*decl).kind else { unreachable!() };
        assert!(matches!(ast.expr(init.unwrap()).kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn duplicate_function_declarations_both_parse_successfully() {
        let (_, module, _) = parse_source(
            "fn f(a: i64) i64 { return a; }\nfn f(a: i64) i64 { return a; }\nfn main() void { return; }",
        );
        assert_eq!(module.functions.len(), 3);
    }

    #[test]
    fn class_body_dispatches_fields_constructor_and_methods() {
        let (ast, module, _) = parse_source(
            "class Point { x: i64; y: i64; Point(a: i64, b: i64) { } fn sum() i64 { return 0; } }",
        );
        let class = ast.decl(module.classes[0]);
        let DeclKind::ClassDecl { fields, methods, constructors, .. } = &class.kind else { unreachable!() };
        assert_eq!(fields.len(), 2);
        assert_eq!(methods.len(), 1);
        assert_eq!(constructors.len(), 1);
    }

    #[test]
    fn if_else_if_chain_links_through_next() {
        let (ast, module, _) = parse_source(
            "fn main() void { if (true) { } else_if (false) { } else_if (true) { } else { } return; }",
        );
        let f = ast.decl(module.functions[0]);
        let DeclKind::Function { body, .. } = &f.kind else { unreachable!() };
        let StmtKind::Compound(stmts) = &ast.stmt(*body).kind else { unreachable!() };
        let StmtKind::If { first_elif, else_branch, .. } = &ast.stmt(stmts[0]).kind else { unreachable!() };
        let StmtKind::ElseIf { next, .. } = &ast.stmt(first_elif.unwrap()).kind else { unreachable!() };
        assert!(next.is_some());
        assert!(else_branch.is_some());
    }

    #[test]
    fn array_type_and_pointer_type_are_mutually_exclusive_suffixes() {
        let (ast, module, _) = parse_source("fn f(a: i64[3], b: i64*) void { }");
        let f = ast.decl(module.functions[0]);
        let DeclKind::Function { params, .. } = &f.kind else { unreachable!() };
        assert!(ast.decl(params[0]).ty.is_array());
        assert!(ast.decl(params[1]).ty.is_pointer());
    }
}
