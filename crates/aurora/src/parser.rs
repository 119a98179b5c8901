//! Recursive-descent parser for Aurora.
//!
//! Builds a typed AST with partial type inference during parsing: a
//! `local_types` map (populated by parameters and `let`/`var`
//! declarations) resolves variable references, and member accesses are
//! resolved eagerly whenever the class declaration is already
//! registered. Anything the parser cannot know yet is typed `Unknown`
//! and refined during code generation.
//!
//! Parse errors are fatal for the current compilation: every failed
//! `expect` reports E2001 to the diagnostic engine and unwinds through
//! `ParseAbort`; there is no error recovery.

use std::collections::HashMap;

use aurora_ast::*;

use crate::Compiler;
use crate::lexer::{Lexer, Token, TokenKind};

/// Marker for the non-resumable parse abort; the diagnostic has
/// already been reported when this is returned.
#[derive(Debug)]
pub struct ParseAbort;

pub type PResult<T> = Result<T, ParseAbort>;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    compiler: &'a Compiler,
    local_types: HashMap<String, Type>,
    current_class: Option<Type>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, compiler: &'a Compiler) -> Self {
        let mut lexer = Lexer::new(source, compiler);
        let current = lexer.next_token();
        Parser {
            lexer,
            current,
            compiler,
            local_types: HashMap::new(),
            current_class: None,
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if self.current.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> PResult<()> {
        if self.current.kind != kind {
            return Err(self.error(message));
        }
        self.advance();
        Ok(())
    }

    fn error(&self, message: &str) -> ParseAbort {
        let mut full_message = message.to_string();
        if !self.current.value.is_empty() {
            full_message.push_str(&format!(" (got '{}')", self.current.value));
        }
        self.compiler.diagnostics.borrow_mut().report_error(
            "E2001",
            full_message,
            self.current.location("<input>"),
        );
        ParseAbort
    }

    // ===== Program structure =====

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut program = Program::default();

        while !self.check(TokenKind::Eof) {
            match self.current.kind {
                TokenKind::Package => {
                    program.package = Some(self.parse_package()?);
                }
                TokenKind::Import => {
                    let import = self.parse_import()?;
                    program.imports.push(import);
                }
                TokenKind::Extern => {
                    // Deprecated; accepted for backward compatibility and
                    // otherwise ignored.
                    self.parse_extern()?;
                }
                TokenKind::Fn => {
                    program.functions.push(self.parse_function()?);
                }
                TokenKind::Class => {
                    program.classes.push(self.parse_class_or_object(false)?);
                }
                TokenKind::Object => {
                    program.classes.push(self.parse_class_or_object(true)?);
                }
                _ => {
                    return Err(
                        self.error("Expected 'import', 'fn', 'class', 'object', or 'extern'")
                    );
                }
            }
        }

        Ok(program)
    }

    fn parse_package(&mut self) -> PResult<PackageDecl> {
        self.expect(TokenKind::Package, "Expected 'package'")?;

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected package name after 'package'"));
        }
        let mut name = self.current.value.clone();
        self.advance();
        while self.match_token(TokenKind::Dot) {
            if !self.check(TokenKind::Identifier) {
                return Err(self.error("Expected identifier after '.' in package name"));
            }
            name.push('.');
            name.push_str(&self.current.value);
            self.advance();
        }

        self.match_token(TokenKind::Semicolon);
        Ok(PackageDecl { name })
    }

    fn parse_import(&mut self) -> PResult<ImportDecl> {
        self.expect(TokenKind::Import, "Expected 'import'")?;

        let module_path = match self.current.kind {
            TokenKind::StringLiteral => {
                let path = self.current.value.clone();
                self.advance();
                path
            }
            TokenKind::Identifier => {
                let mut path = self.current.value.clone();
                self.advance();
                while self.match_token(TokenKind::Dot) {
                    if !self.check(TokenKind::Identifier) {
                        return Err(self.error("Expected identifier after '.' in import path"));
                    }
                    path.push('.');
                    path.push_str(&self.current.value);
                    self.advance();
                }
                path
            }
            _ => {
                return Err(
                    self.error("Expected module path after 'import' (string or identifier)")
                );
            }
        };

        self.match_token(TokenKind::Semicolon);
        Ok(ImportDecl { module_path })
    }

    // Built-in functions are registered by the compiler; `extern` is a
    // legacy no-op that still has to parse.
    fn parse_extern(&mut self) -> PResult<Prototype> {
        self.expect(TokenKind::Extern, "Expected 'extern'")?;

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected function name after 'extern'"));
        }
        let name = self.current.value.clone();
        self.advance();

        self.expect(TokenKind::LeftParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if !self.check(TokenKind::Identifier) {
                    return Err(self.error("Expected parameter name"));
                }
                // Legacy extern parameters are always double.
                params.push(Parameter::new(self.current.value.clone(), Type::Double));
                self.advance();
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen, "Expected ')' after parameters")?;
        self.match_token(TokenKind::Semicolon);

        Ok(Prototype::new(name, params, Type::Double))
    }

    fn parse_function(&mut self) -> PResult<Function> {
        self.expect(TokenKind::Fn, "Expected 'fn'")?;

        let proto = self.parse_prototype()?;

        self.local_types.clear();
        for param in &proto.params {
            self.local_types
                .insert(param.name.clone(), param.ty.clone());
        }

        let body = self.parse_block()?;
        Ok(Function { proto, body })
    }

    fn parse_prototype(&mut self) -> PResult<Prototype> {
        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected function name"));
        }
        let name = self.current.value.clone();
        let (line, column) = (self.current.line, self.current.column);
        self.advance();

        self.expect(TokenKind::LeftParen, "Expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if !self.check(TokenKind::Identifier) {
                    return Err(self.error("Expected parameter name"));
                }
                let param_name = self.current.value.clone();
                self.advance();

                // Untyped parameters default to double for legacy sources.
                let param_ty = if self.match_token(TokenKind::Colon) {
                    self.parse_type()?
                } else {
                    Type::Double
                };
                params.push(Parameter::new(param_name, param_ty));

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen, "Expected ')' after parameters")?;

        let return_type = if self.match_token(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::Void
        };

        let mut proto = Prototype::new(name, params, return_type);
        proto.set_location(line, column);
        Ok(proto)
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LeftBrace, "Expected '{'")?;

        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }

        self.expect(TokenKind::RightBrace, "Expected '}'")?;
        Ok(statements)
    }

    // ===== Statements =====

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.current.kind {
            TokenKind::Return => self.parse_return(),
            TokenKind::Let | TokenKind::Var => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::Break => {
                self.advance();
                self.match_token(TokenKind::Semicolon);
                Ok(Stmt::Break(BreakStmt))
            }
            TokenKind::Continue => {
                self.advance();
                self.match_token(TokenKind::Semicolon);
                Ok(Stmt::Continue(ContinueStmt))
            }
            _ => {
                let expr = self.parse_expression()?;

                if self.match_token(TokenKind::Equal) {
                    let value = self.parse_expression()?;
                    self.match_token(TokenKind::Semicolon);
                    return Ok(Stmt::Assign(AssignStmt {
                        target: expr,
                        value,
                    }));
                }

                self.match_token(TokenKind::Semicolon);
                Ok(Stmt::Expr(ExprStmt { expr }))
            }
        }
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::Return, "Expected 'return'")?;

        let value = if !self.check(TokenKind::Semicolon)
            && !self.check(TokenKind::RightBrace)
            && !self.check(TokenKind::Eof)
        {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.match_token(TokenKind::Semicolon);
        Ok(Stmt::Return(ReturnStmt { value }))
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let mutable = if self.match_token(TokenKind::Var) {
            true
        } else {
            self.expect(TokenKind::Let, "Expected 'let' or 'var'")?;
            false
        };

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected variable name"));
        }
        let name = self.current.value.clone();
        self.advance();

        let annotated = if self.match_token(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        if !self.match_token(TokenKind::Equal) {
            return Err(self.error("Variable declaration requires initializer"));
        }
        let init = self.parse_expression()?;

        let ty = annotated.unwrap_or_else(|| init.ty());
        self.local_types.insert(name.clone(), ty.clone());

        self.match_token(TokenKind::Semicolon);
        Ok(Stmt::VarDecl(VarDeclStmt {
            name,
            ty,
            init,
            mutable,
        }))
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::If, "Expected 'if'")?;

        let condition = self.parse_expression()?;
        let then_branch = self.parse_block()?;

        let mut else_branch = Vec::new();
        if self.match_token(TokenKind::Else) {
            if self.check(TokenKind::If) {
                else_branch.push(self.parse_if()?);
            } else {
                else_branch = self.parse_block()?;
            }
        }

        Ok(Stmt::If(IfStmt {
            condition,
            then_branch,
            else_branch,
        }))
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::While, "Expected 'while'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(Stmt::While(WhileStmt { condition, body }))
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::For, "Expected 'for'")?;

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected loop variable name after 'for'"));
        }
        let var_name = self.current.value.clone();
        self.advance();

        self.expect(TokenKind::In, "Expected 'in' after loop variable")?;

        let start = self.parse_expression()?;
        self.expect(TokenKind::DotDot, "Expected '..' for range in for loop")?;
        let end = self.parse_expression()?;

        let loop_var_ty = match start.ty() {
            Type::Double => Type::Double,
            _ => Type::Int,
        };
        let shadowed = self.local_types.insert(var_name.clone(), loop_var_ty);

        let body = self.parse_block()?;

        match shadowed {
            Some(prev) => {
                self.local_types.insert(var_name.clone(), prev);
            }
            None => {
                self.local_types.remove(&var_name);
            }
        }

        Ok(Stmt::For(ForStmt {
            var_name,
            start,
            end,
            step: None,
            body,
        }))
    }

    fn parse_loop(&mut self) -> PResult<Stmt> {
        self.expect(TokenKind::Loop, "Expected 'loop'")?;
        let body = self.parse_block()?;
        Ok(Stmt::Loop(LoopStmt { body }))
    }

    // ===== Expressions =====
    //
    // Precedence, loosest first: ternary, ??, ||, &&, comparisons,
    // bitwise, additive, multiplicative, unary, postfix, primary.

    pub fn parse_expression(&mut self) -> PResult<Expr> {
        let expr = self.parse_null_coalesce()?;

        if self.check(TokenKind::Question) {
            self.advance();
            let then_expr = self.parse_expression()?;
            self.expect(TokenKind::Colon, "Expected ':' in ternary expression")?;
            let else_expr = self.parse_expression()?;
            return Ok(Expr::Ternary(TernaryExpr {
                condition: Box::new(expr),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            }));
        }

        Ok(expr)
    }

    fn parse_null_coalesce(&mut self) -> PResult<Expr> {
        let left = self.parse_logical_or()?;

        if self.match_token(TokenKind::QuestionQuestion) {
            // Right-associative: a ?? b ?? c == a ?? (b ?? c)
            let right = self.parse_null_coalesce()?;
            return Ok(Expr::Binary(BinaryExpr {
                op: BinaryOp::NullCoalesce,
                left: Box::new(left),
                right: Box::new(right),
            }));
        }

        Ok(left)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.match_token(TokenKind::Or) {
            let right = self.parse_logical_and()?;
            left = Expr::Binary(BinaryExpr {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.match_token(TokenKind::And) {
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryExpr {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bitwise()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::LessEq => BinaryOp::LessEq,
                TokenKind::GreaterEq => BinaryOp::GreaterEq,
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_bitwise()?;
            left = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_bitwise(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Ampersand => BinaryOp::BitAnd,
                TokenKind::Pipe => BinaryOp::BitOr,
                TokenKind::Caret => BinaryOp::BitXor,
                TokenKind::LeftShift => BinaryOp::Shl,
                TokenKind::RightShift => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(BinaryExpr {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.current.kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryExpr {
                op,
                expr: Box::new(expr),
            }));
        }

        self.parse_postfix()
    }

    /// Could the token begin an expression? Used to decide whether a
    /// `?` after a postfix expression is a null-check or the start of a
    /// ternary.
    fn starts_expression(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::IntLiteral
                | TokenKind::DoubleLiteral
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::This
                | TokenKind::Identifier
                | TokenKind::LeftParen
                | TokenKind::LeftBracket
                | TokenKind::Not
                | TokenKind::Minus
                | TokenKind::Tilde
        )
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current.kind {
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightBracket, "Expected ']' after array index")?;
                    expr = Expr::Index(IndexExpr {
                        array: Box::new(expr),
                        index: Box::new(index),
                    });
                }
                TokenKind::Dot => {
                    self.advance();
                    expr = self.parse_member(expr)?;
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    if !self.check(TokenKind::Identifier) {
                        return Err(self.error("Expected member name after '?.'"));
                    }
                    let member = self.current.value.clone();
                    self.advance();

                    let inner = expr
                        .ty()
                        .optional_inner()
                        .cloned()
                        .unwrap_or(Type::Unknown);
                    let member_ty = self.member_type(&inner, &member);
                    expr = Expr::SafeNav(SafeNavExpr {
                        object: Box::new(expr),
                        member,
                        ty: Type::optional(member_ty),
                    });
                }
                TokenKind::Not => {
                    self.advance();
                    expr = Expr::ForceUnwrap(ForceUnwrapExpr {
                        expr: Box::new(expr),
                    });
                }
                TokenKind::Question => {
                    // `x?` is a null-check only when the `?` cannot open
                    // a ternary; otherwise leave it for parse_expression.
                    let next = self.lexer.peek_token();
                    if Self::starts_expression(next.kind) {
                        break;
                    }
                    self.advance();
                    expr = Expr::NullCheck(NullCheckExpr {
                        expr: Box::new(expr),
                    });
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_member(&mut self, object: Expr) -> PResult<Expr> {
        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected member name after '.'"));
        }
        let member = self.current.value.clone();
        self.advance();

        if self.match_token(TokenKind::LeftParen) {
            let mut args = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    args.push(self.parse_expression()?);
                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen, "Expected ')' after arguments")?;

            let ty = self.infer_method_return_type(&object.ty(), &member);
            return Ok(Expr::MemberCall(MemberCallExpr {
                object: Box::new(object),
                method: member,
                args,
                ty,
            }));
        }

        let ty = self.member_type(&object.ty(), &member);
        Ok(Expr::Member(MemberExpr {
            object: Box::new(object),
            member,
            ty,
        }))
    }

    /// Field type looked up through the class registry when the class
    /// declaration is already available.
    fn member_type(&self, obj_ty: &Type, member: &str) -> Type {
        let registry = self.compiler.registry.borrow();
        match obj_ty.as_class() {
            Some(id) => registry
                .decl(id)
                .and_then(|decl| decl.find_field(member))
                .map(|field| field.ty.clone())
                .unwrap_or(Type::Unknown),
            None => Type::Unknown,
        }
    }

    /// Method return types resolve eagerly when the class declaration
    /// is registered; otherwise `Unknown`, refined at code generation.
    fn infer_method_return_type(&self, obj_ty: &Type, method: &str) -> Type {
        let registry = self.compiler.registry.borrow();
        match obj_ty.as_class() {
            Some(id) => registry
                .decl(id)
                .and_then(|decl| decl.find_method(method))
                .map(|m| m.return_type.clone())
                .unwrap_or(Type::Unknown),
            None => Type::Unknown,
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        match self.current.kind {
            TokenKind::IntLiteral => {
                let value: i64 = self.current.value.parse().map_err(|_| {
                    self.error("Integer literal does not fit a 64-bit signed integer")
                })?;
                self.advance();
                Ok(Expr::IntLit(IntLitExpr { value }))
            }
            TokenKind::DoubleLiteral => {
                let value: f64 = self
                    .current
                    .value
                    .parse()
                    .map_err(|_| self.error("Malformed double literal"))?;
                self.advance();
                Ok(Expr::DoubleLit(DoubleLitExpr { value }))
            }
            TokenKind::StringLiteral => {
                let value = self.current.value.clone();
                self.advance();
                Ok(Expr::StringLit(StringLitExpr { value }))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(TokenKind::True);
                self.advance();
                Ok(Expr::BoolLit(BoolLitExpr { value }))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::NullLit(NullLitExpr))
            }
            TokenKind::This => {
                self.advance();
                let ty = self.current_class.clone().unwrap_or(Type::Unknown);
                Ok(Expr::This(ThisExpr { ty }))
            }
            TokenKind::Identifier => {
                let name = self.current.value.clone();
                self.advance();

                if self.check(TokenKind::LeftParen) {
                    return self.parse_call(name);
                }

                let ty = self
                    .local_types
                    .get(&name)
                    .cloned()
                    .unwrap_or(Type::Unknown);
                Ok(Expr::Var(VarExpr { name, ty }))
            }
            TokenKind::LeftBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(TokenKind::RightBracket) {
                    loop {
                        elements.push(self.parse_expression()?);
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightBracket, "Expected ']' after array elements")?;

                // Element type comes from the first element; empty
                // literals default to int.
                let elem_ty = elements.first().map(|e| e.ty()).unwrap_or(Type::Int);
                Ok(Expr::ArrayLit(ArrayLitExpr {
                    elements,
                    ty: Type::array(elem_ty),
                }))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "Expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(self.error("Expected expression")),
        }
    }

    fn parse_call(&mut self, callee: String) -> PResult<Expr> {
        self.expect(TokenKind::LeftParen, "Expected '('")?;

        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "Expected ')' after arguments")?;

        // A call whose callee names a registered class is a
        // construction expression.
        let class = {
            let registry = self.compiler.registry.borrow();
            registry.has_class(&callee).then(|| {
                registry
                    .lookup(&callee)
                    .expect("registered class must intern")
            })
        };
        if let Some(class) = class {
            return Ok(Expr::New(NewExpr {
                class,
                args,
                ty: Type::Class(class),
            }));
        }

        Ok(Expr::Call(CallExpr {
            callee,
            args,
            ty: Type::Unknown,
        }))
    }

    // ===== Types =====

    pub fn parse_type(&mut self) -> PResult<Type> {
        // Array types: [ElementType]
        if self.match_token(TokenKind::LeftBracket) {
            let element = self.parse_type()?;
            self.expect(TokenKind::RightBracket, "Expected ']' after array element type")?;
            let ty = Type::array(element);
            return Ok(self.wrap_optional(ty));
        }

        match self.current.kind {
            TokenKind::TypeInt => {
                self.advance();
                Ok(self.wrap_optional(Type::Int))
            }
            TokenKind::TypeDouble => {
                self.advance();
                Ok(self.wrap_optional(Type::Double))
            }
            TokenKind::TypeBool => {
                self.advance();
                Ok(self.wrap_optional(Type::Bool))
            }
            TokenKind::TypeString => {
                self.advance();
                Ok(self.wrap_optional(Type::String))
            }
            TokenKind::TypeVoid => {
                self.advance();
                Ok(Type::Void)
            }
            TokenKind::Fn => {
                self.advance();
                self.expect(TokenKind::LeftParen, "Expected '(' after 'fn'")?;

                let mut params = Vec::new();
                if !self.check(TokenKind::RightParen) {
                    loop {
                        params.push(self.parse_type()?);
                        if !self.match_token(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightParen, "Expected ')' after function parameters")?;

                let ret = if self.match_token(TokenKind::Arrow) {
                    self.parse_type()?
                } else {
                    Type::Void
                };
                Ok(Type::Function {
                    ret: Box::new(ret),
                    params,
                })
            }
            TokenKind::Identifier => {
                let name = self.current.value.clone();
                self.advance();
                let ty = self.compiler.registry.borrow_mut().class_type(&name);
                Ok(self.wrap_optional(ty))
            }
            _ => Err(self.error("Expected type name")),
        }
    }

    fn wrap_optional(&mut self, ty: Type) -> Type {
        if self.match_token(TokenKind::Question) {
            Type::optional(ty)
        } else {
            ty
        }
    }

    // ===== Classes and objects =====

    fn parse_class_or_object(&mut self, is_singleton: bool) -> PResult<ClassId> {
        if is_singleton {
            self.expect(TokenKind::Object, "Expected 'object'")?;
        } else {
            self.expect(TokenKind::Class, "Expected 'class'")?;
        }

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected class/object name"));
        }
        let class_name = self.current.value.clone();
        let (line, column) = (self.current.line, self.current.column);
        self.advance();

        // Register the class type early so member and parameter types
        // inside the body (and later declarations) can refer to it.
        let class_ty = self.compiler.registry.borrow_mut().class_type(&class_name);
        let class_id = class_ty.as_class().expect("class_type returns a class");
        let prev_class = self.current_class.replace(class_ty.clone());

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        // Primary constructor: class Name(pub let x: T, var y: U)
        if self.match_token(TokenKind::LeftParen) {
            let mut primary_params = Vec::new();

            if !self.check(TokenKind::RightParen) {
                loop {
                    let mut is_public = true;
                    if self.match_token(TokenKind::Pub) {
                        is_public = true;
                    } else if self.match_token(TokenKind::Priv) {
                        is_public = false;
                    }

                    if !self.match_token(TokenKind::Var) && !self.match_token(TokenKind::Let) {
                        return Err(
                            self.error("Expected 'let' or 'var' in primary constructor parameter")
                        );
                    }

                    if !self.check(TokenKind::Identifier) {
                        return Err(self.error("Expected parameter name in primary constructor"));
                    }
                    let field_name = self.current.value.clone();
                    self.advance();

                    self.expect(TokenKind::Colon, "Expected ':' after parameter name")?;
                    let field_ty = self.parse_type()?;

                    fields.push(FieldDecl {
                        name: field_name.clone(),
                        ty: field_ty.clone(),
                        is_public,
                        initializer: None,
                    });
                    primary_params.push(Parameter::new(field_name, field_ty));

                    if !self.match_token(TokenKind::Comma) {
                        break;
                    }
                }
            }

            self.expect(
                TokenKind::RightParen,
                "Expected ')' after primary constructor parameters",
            )?;

            if !primary_params.is_empty() {
                let mut ctor_body = Vec::new();
                for param in &primary_params {
                    let this_expr = Expr::This(ThisExpr {
                        ty: class_ty.clone(),
                    });
                    let member = Expr::Member(MemberExpr {
                        object: Box::new(this_expr),
                        member: param.name.clone(),
                        ty: param.ty.clone(),
                    });
                    let value = Expr::Var(VarExpr {
                        name: param.name.clone(),
                        ty: param.ty.clone(),
                    });
                    ctor_body.push(Stmt::Assign(AssignStmt {
                        target: member,
                        value,
                    }));
                }

                methods.push(MethodDecl {
                    name: "constructor".to_string(),
                    params: primary_params,
                    return_type: Type::Void,
                    body: ctor_body,
                    is_public: true,
                    is_static: false,
                    is_constructor: true,
                });
            }
        }

        // The body is optional for classes declared entirely through a
        // primary constructor: `class P(let x: int, let y: int)`.
        if self.match_token(TokenKind::LeftBrace) {
            while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                let mut is_public = true;
                if self.match_token(TokenKind::Pub) {
                    is_public = true;
                } else if self.match_token(TokenKind::Priv) {
                    is_public = false;
                }

                match self.current.kind {
                    TokenKind::Constructor | TokenKind::Fn | TokenKind::Static => {
                        methods.push(self.parse_method(is_public)?);
                    }
                    TokenKind::Let | TokenKind::Var => {
                        fields.push(self.parse_field(is_public)?);
                    }
                    _ => {
                        return Err(
                            self.error("Expected field or method declaration in class/object")
                        );
                    }
                }
            }

            self.expect(TokenKind::RightBrace, "Expected '}' after class/object body")?;
        }

        let mut decl = ClassDecl {
            name: class_name,
            fields,
            methods,
            is_singleton,
            line,
            column,
        };
        decl.generate_implicit_constructor(class_ty);

        self.compiler
            .registry
            .borrow_mut()
            .register_decl(class_id, decl);
        self.current_class = prev_class;

        Ok(class_id)
    }

    fn parse_field(&mut self, is_public: bool) -> PResult<FieldDecl> {
        if !self.match_token(TokenKind::Var) {
            self.expect(TokenKind::Let, "Expected 'let' or 'var' for field")?;
        }

        if !self.check(TokenKind::Identifier) {
            return Err(self.error("Expected field name"));
        }
        let name = self.current.value.clone();
        self.advance();

        self.expect(TokenKind::Colon, "Expected ':' after field name")?;
        let ty = self.parse_type()?;

        let initializer = if self.match_token(TokenKind::Equal) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.match_token(TokenKind::Semicolon);
        Ok(FieldDecl {
            name,
            ty,
            is_public,
            initializer,
        })
    }

    fn parse_method(&mut self, is_public: bool) -> PResult<MethodDecl> {
        let is_static = self.match_token(TokenKind::Static);

        let is_constructor = if self.match_token(TokenKind::Constructor) {
            true
        } else {
            self.expect(TokenKind::Fn, "Expected 'fn' for method")?;
            false
        };

        let name = if is_constructor {
            "constructor".to_string()
        } else {
            if !self.check(TokenKind::Identifier) {
                return Err(self.error("Expected method name"));
            }
            let name = self.current.value.clone();
            self.advance();
            name
        };

        self.expect(TokenKind::LeftParen, "Expected '(' after method name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if !self.check(TokenKind::Identifier) {
                    return Err(self.error("Expected parameter name"));
                }
                let param_name = self.current.value.clone();
                self.advance();

                let param_ty = if self.match_token(TokenKind::Colon) {
                    self.parse_type()?
                } else {
                    Type::Double
                };
                params.push(Parameter::new(param_name, param_ty));

                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::RightParen, "Expected ')' after parameters")?;

        let return_type = if self.match_token(TokenKind::Arrow) {
            self.parse_type()?
        } else {
            Type::Void
        };

        self.local_types.clear();
        for param in &params {
            self.local_types
                .insert(param.name.clone(), param.ty.clone());
        }

        let body = self.parse_block()?;

        Ok(MethodDecl {
            name,
            params,
            return_type,
            body,
            is_public,
            is_static,
            is_constructor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (Compiler, Program) {
        let compiler = Compiler::new_silent();
        let program = {
            let mut parser = Parser::new(source, &compiler);
            parser.parse_program().expect("parse failed")
        };
        assert!(!compiler.has_errors(), "diagnostics during parse");
        (compiler, program)
    }

    #[test]
    fn parses_function_with_typed_params() {
        let (_c, program) = parse("fn add(a: int, b: int) -> int { return a + b; }");
        assert_eq!(program.functions.len(), 1);
        let f = &program.functions[0];
        assert_eq!(f.proto.name, "add");
        assert_eq!(f.proto.params.len(), 2);
        assert_eq!(f.proto.params[0].ty, Type::Int);
        assert_eq!(f.proto.return_type, Type::Int);
    }

    #[test]
    fn untyped_params_default_to_double_and_missing_arrow_to_void() {
        let (_c, program) = parse("fn poke(x) { }");
        let proto = &program.functions[0].proto;
        assert_eq!(proto.params[0].ty, Type::Double);
        assert_eq!(proto.return_type, Type::Void);
    }

    #[test]
    fn variable_references_get_types_from_local_map() {
        let (_c, program) = parse("fn main() -> int { let x: int = 1; return x; }");
        let body = &program.functions[0].body;
        let Stmt::Return(ret) = &body[1] else {
            panic!("expected return");
        };
        let Some(Expr::Var(var)) = &ret.value else {
            panic!("expected variable reference");
        };
        assert_eq!(var.ty, Type::Int);
    }

    #[test]
    fn var_decl_infers_type_from_initializer() {
        let (_c, program) = parse("fn main() { var s = \"hi\"; let d = 1.5; let a = [1, 2]; }");
        let body = &program.functions[0].body;
        let tys: Vec<Type> = body
            .iter()
            .map(|s| match s {
                Stmt::VarDecl(v) => v.ty.clone(),
                _ => panic!("expected var decl"),
            })
            .collect();
        assert_eq!(tys[0], Type::String);
        assert_eq!(tys[1], Type::Double);
        assert_eq!(tys[2], Type::array(Type::Int));
    }

    #[test]
    fn precedence_multiplication_binds_tighter() {
        let (_c, program) = parse("fn main() -> int { return 2 + 3 * 4; }");
        let Stmt::Return(ret) = &program.functions[0].body[0] else {
            panic!();
        };
        let Some(Expr::Binary(add)) = &ret.value else {
            panic!("expected binary add at top");
        };
        assert_eq!(add.op, BinaryOp::Add);
        let Expr::Binary(mul) = add.right.as_ref() else {
            panic!("expected mul on the right");
        };
        assert_eq!(mul.op, BinaryOp::Mul);
    }

    #[test]
    fn ternary_and_null_coalesce_parse() {
        let (_c, program) =
            parse("fn pick(a: int?, b: int) -> int { return a ?? b; }\nfn m(c: bool) -> int { return c ? 1 : 2; }");
        let Stmt::Return(ret) = &program.functions[0].body[0] else {
            panic!();
        };
        let Some(Expr::Binary(b)) = &ret.value else {
            panic!("expected ?? binary");
        };
        assert_eq!(b.op, BinaryOp::NullCoalesce);

        let Stmt::Return(ret) = &program.functions[1].body[0] else {
            panic!();
        };
        assert!(matches!(ret.value, Some(Expr::Ternary(_))));
    }

    #[test]
    fn postfix_null_check_in_if_condition() {
        let (_c, program) = parse("fn main(a: int?) -> int { if a? { return 1; } return 0; }");
        let Stmt::If(ifs) = &program.functions[0].body[0] else {
            panic!("expected if");
        };
        assert!(matches!(ifs.condition, Expr::NullCheck(_)));
    }

    #[test]
    fn optional_types_and_force_unwrap() {
        let (_c, program) = parse("fn main() -> int { let a: int? = null; return a!; }");
        let body = &program.functions[0].body;
        let Stmt::VarDecl(decl) = &body[0] else {
            panic!();
        };
        assert_eq!(decl.ty, Type::optional(Type::Int));
        assert!(matches!(decl.init, Expr::NullLit(_)));
        let Stmt::Return(ret) = &body[1] else { panic!() };
        assert!(matches!(ret.value, Some(Expr::ForceUnwrap(_))));
    }

    #[test]
    fn for_loop_over_range() {
        let (_c, program) =
            parse("fn main() -> int { var s: int = 0; for i in 0..3 { s = s + i; } return s; }");
        let Stmt::For(f) = &program.functions[0].body[1] else {
            panic!("expected for");
        };
        assert_eq!(f.var_name, "i");
        assert!(f.step.is_none());
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn class_with_primary_constructor_desugars() {
        let (compiler, program) = parse("class P(let x: int, let y: int)\nfn main() -> int { let p = P(3, 4); return p.x + p.y; }");
        assert_eq!(program.classes.len(), 1);

        let registry = compiler.registry.borrow();
        let decl = registry.decl(program.classes[0]).expect("registered");
        assert_eq!(decl.fields.len(), 2);
        assert_eq!(decl.fields[0].name, "x");
        assert_eq!(decl.fields[1].name, "y");

        let ctor = decl.constructors().next().expect("primary ctor");
        assert_eq!(ctor.params.len(), 2);
        assert_eq!(ctor.body.len(), 2);

        // P(3, 4) after the class is registered parses as a New expression.
        let Stmt::VarDecl(decl_stmt) = &program.functions[0].body[0] else {
            panic!();
        };
        assert!(matches!(decl_stmt.init, Expr::New(_)));

        // p.x resolves the declared field type.
        let Stmt::Return(ret) = &program.functions[0].body[1] else {
            panic!();
        };
        let Some(Expr::Binary(add)) = &ret.value else {
            panic!();
        };
        let Expr::Member(member) = add.left.as_ref() else {
            panic!("expected member access");
        };
        assert_eq!(member.ty, Type::Int);
    }

    #[test]
    fn implicit_constructor_synthesized_for_plain_class() {
        let (compiler, program) = parse("class V { var a: int = 0\n var b: double = 0.0 }");
        let registry = compiler.registry.borrow();
        let decl = registry.decl(program.classes[0]).unwrap();
        let ctor = decl.constructors().next().expect("implicit ctor");
        assert_eq!(ctor.params.len(), 2);
        assert_eq!(ctor.params[0].ty, Type::Int);
        assert_eq!(ctor.params[1].ty, Type::Double);
    }

    #[test]
    fn constructor_overloads_coexist() {
        let (compiler, program) = parse(
            "class C { constructor(x: int) { this.v = x } constructor(x: double) { this.v = 100 } var v: int = 0 }",
        );
        let registry = compiler.registry.borrow();
        let decl = registry.decl(program.classes[0]).unwrap();
        assert_eq!(decl.constructors().count(), 2);
        assert!(decl.find_method_with_sig("constructor", &[Type::Int]).is_some());
        assert!(decl
            .find_method_with_sig("constructor", &[Type::Double])
            .is_some());
    }

    #[test]
    fn object_parses_as_singleton_class() {
        let (compiler, program) = parse("object Config { let version: int = 1\n fn get() -> int { return 1 } }");
        let registry = compiler.registry.borrow();
        let decl = registry.decl(program.classes[0]).unwrap();
        assert!(decl.is_singleton);
        assert!(decl.find_method("get").is_some());
    }

    #[test]
    fn method_call_return_type_resolved_when_class_known() {
        let (_c, program) = parse(
            "class A { fn f() -> double { return 1.0 } }\nfn main() -> double { let a = A(); return a.f(); }",
        );
        let Stmt::Return(ret) = &program.functions[0].body[1] else {
            panic!();
        };
        let Some(Expr::MemberCall(call)) = &ret.value else {
            panic!("expected member call");
        };
        assert_eq!(call.ty, Type::Double);
    }

    #[test]
    fn imports_and_package() {
        let (_c, program) = parse("package com.example.app\nimport math.utils\nimport \"lib/io\"\nfn main() { }");
        assert_eq!(program.package.as_ref().unwrap().name, "com.example.app");
        assert_eq!(program.imports.len(), 2);
        assert_eq!(program.imports[0].module_path, "math.utils");
        assert_eq!(program.imports[1].module_path, "lib/io");
    }

    #[test]
    fn extern_declaration_is_accepted_and_ignored() {
        let (_c, program) = parse("extern printd(x);\nfn main() { }");
        assert_eq!(program.functions.len(), 1);
    }

    #[test]
    fn parse_error_reports_e2001_and_aborts() {
        let compiler = Compiler::new_silent();
        let mut parser = Parser::new("fn main( {", &compiler);
        assert!(parser.parse_program().is_err());

        let diags = compiler.diagnostics.borrow();
        assert!(diags.has_errors());
        assert_eq!(diags.diagnostics()[0].code, "E2001");
    }

    #[test]
    fn unknown_call_type_stays_unresolved_until_codegen() {
        let (_c, program) = parse("fn main() { helper(); }");
        let Stmt::Expr(es) = &program.functions[0].body[0] else {
            panic!();
        };
        let Expr::Call(call) = &es.expr else { panic!() };
        assert_eq!(call.ty, Type::Unknown);
    }

    #[test]
    fn function_type_annotation() {
        let (_c, program) = parse("fn apply(f: fn(int) -> int) -> void { }");
        let ty = &program.functions[0].proto.params[0].ty;
        assert_eq!(
            *ty,
            Type::Function {
                ret: Box::new(Type::Int),
                params: vec![Type::Int],
            }
        );
    }
}
