use crate::{
    ast::{
        BinaryOperator, Enum, Expr, ExprKind, Field, Function, FunctionKind, Ident, Impl, Interface,
        Item, Name, Param, Path, Program, Signature, Stmt, StmtKind, Struct, TypeExpr,
        UnaryOperator,
    },
    lexer::extract,
    token::{Span, Spanned, Token, TokenKind},
    types::well_known,
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// Parses a whole program from already lexed tokens. Both the surface syntax
/// and the canonical form are accepted, and may be mixed.
pub fn parse_program(
    src: &str,
    tokens: &[Token],
    ident_interner: &mut Interner<str>,
) -> Result<Program> {
    let mut p = Parser::new(src, tokens, ident_interner);
    let program = p.parse_program()?;
    tracing::debug!(
        items = program.items.len(),
        body = program.body.len(),
        "parsed program"
    );
    Ok(program)
}

pub fn parse_expr(src: &str, tokens: &[Token], ident_interner: &mut Interner<str>) -> Result<Expr> {
    let mut p = Parser::new(src, tokens, ident_interner);
    let expr = p.parse_expr()?;
    p.consume(TokenKind::Eof)?;
    Ok(expr)
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner<str>,
    cursor: usize,
}

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        loop {
            while self.take(TokenKind::Semicolon) {}
            let item = match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Fn => Item::Function(self.parse_function(true)?),
                TokenKind::Struct => Item::Struct(self.parse_struct()?),
                TokenKind::Interface => Item::Interface(self.parse_interface()?),
                TokenKind::Impl => Item::Impl(self.parse_impl()?),
                TokenKind::Enum => Item::Enum(self.parse_enum()?),
                _ => {
                    let stmt = self.parse_stmt()?;
                    program.body.push(stmt);
                    continue;
                }
            };
            program.items.push(item);
        }
        Ok(program)
    }

    /// Parses `fn header block`. Only top-level declarations may be named by
    /// a full path.
    fn parse_function(&mut self, allow_path: bool) -> Result<Function> {
        let start = self.consume(TokenKind::Fn)?;
        let (name, params, return_ty) = self.parse_header(allow_path)?;
        let (body, end) = self.parse_block()?;
        Ok(Function {
            name,
            params,
            return_ty,
            body,
            kind: FunctionKind::Free,
            span: start.span().to(end),
        })
    }

    /// Parses both `(Name [p T]...) -> T` and `Name [p T]... -> T`.
    fn parse_header(&mut self, allow_path: bool) -> Result<(Path, Vec<Param>, Option<TypeExpr>)> {
        let canonical = self.take(TokenKind::LParen);
        let name = self.parse_name()?;
        if !allow_path && !name.is_single() {
            return Err(name.span().wrap(Error::QualifiedNestedName));
        }

        let mut params = Vec::new();
        while self.is(TokenKind::LBracket) {
            let param = self.parse_param(params.is_empty())?;
            params.push(param);
        }
        if canonical {
            self.consume(TokenKind::RParen)?;
        }

        let return_ty = if self.take(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok((name, params, return_ty))
    }

    /// Parses `[name type]`, or `[self]` in receiver position.
    fn parse_param(&mut self, first: bool) -> Result<Param> {
        self.consume(TokenKind::LBracket)?;
        let name = self.parse_ident()?;
        let ty = if self.is(TokenKind::Identifier) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.consume(TokenKind::RBracket)?;

        if ty.is_none() && !(first && name.name == well_known::SELF) {
            let error = Error::UntypedParameter(self.ident_interner.get(name).into());
            return Err(name.span.wrap(error));
        }
        Ok(Param { name, ty })
    }

    fn parse_struct(&mut self) -> Result<Struct> {
        let start = self.consume(TokenKind::Struct)?;
        let name = self.parse_ident()?;
        let type_param = if self.take(TokenKind::Less) {
            let param = self.parse_ident()?;
            self.consume(TokenKind::Greater)?;
            Some(param)
        } else {
            None
        };

        let mut s = Struct {
            name,
            type_param,
            fields: Vec::new(),
            statics: Vec::new(),
            methods: Vec::new(),
            span: Span::DUMMY,
        };
        self.consume(TokenKind::LBrace)?;
        loop {
            while self.take(TokenKind::Semicolon) {}
            match self.peek().kind {
                TokenKind::RBrace => break,
                TokenKind::LBracket => s.fields.push(self.parse_field()?),
                TokenKind::Static => {
                    self.advance();
                    s.statics.push(self.parse_field()?);
                }
                TokenKind::Fn => s.methods.push(self.parse_function(false)?),
                _ => return Err(self.expected("a field, static or method")),
            }
        }
        let end = self.consume(TokenKind::RBrace)?;
        s.span = start.span().to(end.span());
        Ok(s)
    }

    fn parse_field(&mut self) -> Result<Field> {
        self.consume(TokenKind::LBracket)?;
        let name = self.parse_ident()?;
        let ty = self.parse_type()?;
        self.consume(TokenKind::RBracket)?;
        Ok(Field { name, ty })
    }

    fn parse_interface(&mut self) -> Result<Interface> {
        let start = self.consume(TokenKind::Interface)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        loop {
            while self.take(TokenKind::Semicolon) {}
            if self.is(TokenKind::RBrace) {
                break;
            }
            let fn_token = self.consume(TokenKind::Fn)?;
            let (path, params, return_ty) = self.parse_header(false)?;
            let span = fn_token.span().to(self.previous().span());
            methods.push(Signature {
                name: path.last(),
                params,
                return_ty,
                span,
            });
        }
        let end = self.consume(TokenKind::RBrace)?;
        Ok(Interface {
            name,
            methods,
            span: start.span().to(end.span()),
        })
    }

    fn parse_impl(&mut self) -> Result<Impl> {
        let start = self.consume(TokenKind::Impl)?;
        let interface = self.parse_ident()?;
        self.consume(TokenKind::For)?;
        let target = self.parse_ident()?;

        let mut methods = Vec::new();
        let mut end = target.span;
        if self.take(TokenKind::LBrace) {
            loop {
                while self.take(TokenKind::Semicolon) {}
                if self.is(TokenKind::RBrace) {
                    break;
                }
                methods.push(self.parse_function(false)?);
            }
            end = self.consume(TokenKind::RBrace)?.span();
        }
        Ok(Impl {
            interface,
            target,
            methods,
            span: start.span().to(end),
        })
    }

    fn parse_enum(&mut self) -> Result<Enum> {
        let start = self.consume(TokenKind::Enum)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while self.except([TokenKind::RBrace]) {
            variants.push(self.parse_ident()?);
            self.take(TokenKind::Comma);
        }
        let end = self.consume(TokenKind::RBrace)?;
        Ok(Enum {
            name,
            variants,
            span: start.span().to(end.span()),
        })
    }

    /// Parses `{ stmt* }`, returning the statements and the whole span.
    fn parse_block(&mut self) -> Result<(Vec<Stmt>, Span)> {
        let start = self.consume(TokenKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            while self.take(TokenKind::Semicolon) {}
            if !self.except([TokenKind::RBrace]) {
                break;
            }
            body.push(self.parse_stmt()?);
        }
        let end = self.consume(TokenKind::RBrace)?;
        Ok((body, start.span().to(end.span())))
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.peek();
        let kind = match start.kind {
            TokenKind::Fn => StmtKind::Function(Box::new(self.parse_function(false)?)),
            TokenKind::Return => {
                self.advance();
                let value = if self.is_stmt_end() {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                StmtKind::Return(value)
            }
            TokenKind::Let => {
                self.advance();
                let name = self.parse_ident()?;
                let ty = if self.is(TokenKind::Identifier) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                StmtKind::Let { name, ty, value }
            }
            TokenKind::If => return self.parse_if(),
            TokenKind::While => {
                self.advance();
                let predicate = self.parse_expr()?;
                let (body, _) = self.parse_block()?;
                StmtKind::While { predicate, body }
            }
            TokenKind::For => {
                self.advance();
                let binding = self.parse_ident()?;
                self.consume(TokenKind::In)?;
                let iterable = self.parse_expr()?;
                let (body, _) = self.parse_block()?;
                StmtKind::For {
                    binding,
                    iterable,
                    body,
                }
            }
            TokenKind::LBrace => {
                let (body, span) = self.parse_block()?;
                return Ok(Stmt {
                    kind: StmtKind::Block(body),
                    span,
                });
            }
            TokenKind::LParen if self.nth(1).kind.starts_canonical_stmt() => {
                return self.parse_canonical_stmt();
            }
            _ => {
                let expr = self.parse_expr()?;
                if self.take(TokenKind::Assign) {
                    let value = self.parse_expr()?;
                    self.check_assignment_target(&expr)?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };
        Ok(Stmt {
            kind,
            span: start.span().to(self.previous().span()),
        })
    }

    /// Parses `if c { } [else { } | else if ...]`.
    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::If)?;
        let predicate = self.parse_expr()?;
        let (then_body, mut span) = self.parse_block()?;
        let else_body = if self.take(TokenKind::Else) {
            if self.is(TokenKind::If) {
                let nested = self.parse_if()?;
                span = nested.span;
                Some(vec![nested])
            } else {
                let (body, else_span) = self.parse_block()?;
                span = else_span;
                Some(body)
            }
        } else {
            None
        };
        Ok(Stmt {
            kind: StmtKind::If {
                predicate,
                then_body,
                else_body,
            },
            span: start.span().to(span),
        })
    }

    /// Parses the parenthesised statement forms, such as `(set x 1)`.
    fn parse_canonical_stmt(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::LParen)?;
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Return => {
                let value = if self.is(TokenKind::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                StmtKind::Return(value)
            }
            TokenKind::Let => {
                let (name, ty) = if self.take(TokenKind::LBracket) {
                    let name = self.parse_ident()?;
                    let ty = self.parse_type()?;
                    self.consume(TokenKind::RBracket)?;
                    (name, Some(ty))
                } else {
                    (self.parse_ident()?, None)
                };
                let value = self.parse_expr()?;
                StmtKind::Let { name, ty, value }
            }
            TokenKind::Set => {
                let target = self.parse_operand()?;
                self.check_assignment_target(&target)?;
                let value = self.parse_expr()?;
                StmtKind::Assign { target, value }
            }
            TokenKind::If => {
                let predicate = self.parse_expr()?;
                let (then_body, _) = self.parse_block()?;
                let else_body = if self.take(TokenKind::Else) {
                    Some(self.parse_block()?.0)
                } else {
                    None
                };
                StmtKind::If {
                    predicate,
                    then_body,
                    else_body,
                }
            }
            TokenKind::While => {
                let predicate = self.parse_expr()?;
                let (body, _) = self.parse_block()?;
                StmtKind::While { predicate, body }
            }
            TokenKind::For => {
                let binding = self.parse_ident()?;
                let iterable = self.parse_expr()?;
                let (body, _) = self.parse_block()?;
                StmtKind::For {
                    binding,
                    iterable,
                    body,
                }
            }
            _ => unreachable!("checked by starts_canonical_stmt"),
        };
        let end = self.consume(TokenKind::RParen)?;
        Ok(Stmt {
            kind,
            span: start.span().to(end.span()),
        })
    }

    fn check_assignment_target(&self, target: &Expr) -> Result<()> {
        match target.kind {
            ExprKind::Name(_) | ExprKind::Member { .. } | ExprKind::Static { .. } => Ok(()),
            _ => Err(target.span.wrap(Error::InvalidAssignmentTarget)),
        }
    }

    fn is_stmt_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let name = self.parse_ident()?;
        let (arg, span) = if self.take(TokenKind::Less) {
            let arg = self.parse_type()?;
            let end = self.consume(TokenKind::Greater)?;
            (Some(Box::new(arg)), name.span.to(end.span()))
        } else {
            (None, name.span)
        };
        Ok(TypeExpr { name, arg, span })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        })
    }

    /// Parses an identifier or a `/`-joined path.
    fn parse_name(&mut self) -> Result<Path> {
        if self.is(TokenKind::Path) {
            let token = self.advance();
            let segments = extract::path(token, self.src)
                .into_iter()
                .map(|(segment, span)| Ident {
                    name: self.ident_interner.intern(segment),
                    span,
                })
                .collect();
            return Ok(Path { segments });
        }
        self.parse_ident().map(Path::single)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let lhs = self.parse_prefix()?;
        self.parse_infix(lhs, min_bp)
    }

    /// Continues a Pratt parse with an already parsed left-hand side.
    fn parse_infix(&mut self, mut lhs: Expr, min_bp: u8) -> Result<Expr> {
        loop {
            let op_token = self.peek();
            let Some((lbp, rbp)) = Self::infix_binding_power(op_token.kind) else {
                // Not an infix operator
                break;
            };
            if lbp < min_bp {
                // Operator binds less tightly than the minimum required
                break;
            }
            self.advance(); // Operator
            lhs = self.parse_led(op_token, lhs, rbp)?;
        }
        Ok(lhs)
    }

    /// Parses a prefix operator application or an operand.
    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.peek();
        match token.kind {
            TokenKind::Minus => {
                self.advance();
                let expr = self.parse_expr_bp(PREFIX_NEG_BP)?;
                Ok(negate(token.span(), expr))
            }
            TokenKind::Not => {
                self.advance();
                let expr = self.parse_expr_bp(PREFIX_NOT_BP)?;
                Ok(unary(UnaryOperator::Not, token.span(), expr))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_led(&mut self, op_token: Token, lhs: Expr, rbp: u8) -> Result<Expr> {
        let op = match op_token.kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            TokenKind::Percent => BinaryOperator::Rem,
            TokenKind::EqEq => BinaryOperator::Eq,
            TokenKind::NotEq => BinaryOperator::NotEq,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::LessEq => BinaryOperator::LtEq,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::GreaterEq => BinaryOperator::GtEq,
            TokenKind::And => BinaryOperator::And,
            TokenKind::Or => BinaryOperator::Or,
            _ => unreachable!("checked by infix_binding_power"),
        };
        // Parse right operand with correct precedence
        let rhs = self.parse_expr_bp(rbp)?;
        let span = lhs.span.to(rhs.span);
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        })
    }

    /// Parses a call argument: prefix operators and postfix accesses, but no
    /// infix operators.
    fn parse_operand(&mut self) -> Result<Expr> {
        let token = self.peek();
        match token.kind {
            TokenKind::Minus => {
                self.advance();
                let expr = self.parse_operand()?;
                Ok(negate(token.span(), expr))
            }
            TokenKind::Not => {
                self.advance();
                let expr = self.parse_operand()?;
                Ok(unary(UnaryOperator::Not, token.span(), expr))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.peek();
        let kind = match token.kind {
            TokenKind::Identifier => {
                if let Some(generic) = self.try_parse_generic_static() {
                    return Ok(generic);
                }
                let ident = self.parse_ident()?;
                ExprKind::Name(Name {
                    path: Path::single(ident),
                    res: None,
                })
            }
            TokenKind::Path => {
                let path = self.parse_name()?;
                ExprKind::Name(Name { path, res: None })
            }
            TokenKind::Number => {
                self.advance();
                let Ok(parsed) = extract::int(token, self.src) else {
                    return Err(token.span().wrap(Error::ParseInt));
                };
                ExprKind::Int(parsed)
            }
            TokenKind::String => {
                self.advance();
                ExprKind::String(extract::string(token, self.src))
            }
            TokenKind::EscapedString => {
                self.advance();
                ExprKind::String(extract::escaped_string(token, self.src))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::LParen => return self.parse_parenthesized(),
            _ => return Err(self.expected("an expression")),
        };
        Ok(Expr {
            kind,
            span: token.span(),
        })
    }

    /// Parses `Name<Type>.member` if present, leaving the cursor untouched
    /// otherwise (so that `a < b` still parses as a comparison).
    fn try_parse_generic_static(&mut self) -> Option<Expr> {
        let name = self.peek();
        let less = self.nth(1);
        if less.kind != TokenKind::Less || !name.span().touches(less.span()) {
            return None;
        }

        let saved = self.cursor;
        let parsed = self.parse_type().and_then(|ty| {
            self.consume(TokenKind::Dot)?;
            let member = self.parse_ident()?;
            Ok((ty, member))
        });
        match parsed {
            Ok((ty, member)) => {
                let span = ty.span.to(member.span);
                Some(Expr {
                    kind: ExprKind::Static { ty, member },
                    span,
                })
            }
            Err(_) => {
                self.cursor = saved;
                None
            }
        }
    }

    /// Parses `.member` accesses and adjacent `(args, ...)` calls.
    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            let c = self.peek();
            if c.kind == TokenKind::Dot {
                self.advance();
                let member = self.parse_ident()?;
                let span = expr.span.to(member.span);
                expr = Expr {
                    kind: ExprKind::Member {
                        target: Box::new(expr),
                        member,
                    },
                    span,
                };
            } else if c.kind == TokenKind::LParen
                && self.previous().span().touches(c.span())
                && is_callee(&expr)
            {
                self.advance();
                let mut args = Vec::new();
                while self.except([TokenKind::RParen]) {
                    args.push(self.parse_expr()?);
                    if !self.take(TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.consume(TokenKind::RParen)?;
                let span = expr.span.to(end.span());
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    span,
                };
            } else {
                break Ok(expr);
            }
        }
    }

    /// Parses what follows a `(` in expression position: an infix group, a
    /// prefix call, or a plain grouping.
    fn parse_parenthesized(&mut self) -> Result<Expr> {
        let open = self.consume(TokenKind::LParen)?;
        let first = self.parse_operand()?;

        let next = self.peek();
        let mut expr = if Self::infix_binding_power(next.kind).is_some()
            && !self.is_negative_argument()
        {
            self.parse_infix(first, 0)?
        } else if next.kind == TokenKind::RParen {
            if is_callee(&first) {
                let span = first.span;
                Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(first),
                        args: Vec::new(),
                    },
                    span,
                }
            } else {
                first
            }
        } else {
            let mut args = Vec::new();
            while self.except([TokenKind::RParen]) {
                args.push(self.parse_operand()?);
            }
            let span = first.span;
            Expr {
                kind: ExprKind::Call {
                    callee: Box::new(first),
                    args,
                },
                span,
            }
        };
        let close = self.consume(TokenKind::RParen)?;
        expr.span = open.span().to(close.span());
        Ok(expr)
    }

    /// Whether the current `-` starts a negative argument, as in `(f x -1)`:
    /// whitespace before it, none between it and its operand.
    fn is_negative_argument(&self) -> bool {
        let minus = self.peek();
        minus.kind == TokenKind::Minus
            && !self.previous().span().touches(minus.span())
            && minus.span().touches(self.nth(1).span())
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8)> {
        let bp = match kind {
            TokenKind::Or => (1, 2),
            TokenKind::And => (3, 4),
            TokenKind::EqEq | TokenKind::NotEq => (5, 6),
            TokenKind::Less | TokenKind::LessEq | TokenKind::Greater | TokenKind::GreaterEq => {
                (7, 8)
            }
            TokenKind::Plus | TokenKind::Minus => (9, 10),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => (11, 12),
            _ => return None,
        };
        Some(bp)
    }
}

/// `not` binds looser than comparisons: `not a == b` is `not (a == b)`.
const PREFIX_NOT_BP: u8 = 5;
const PREFIX_NEG_BP: u8 = 13;

fn unary(op: UnaryOperator, op_span: Span, expr: Expr) -> Expr {
    let span = op_span.to(expr.span);
    Expr {
        kind: ExprKind::Unary {
            op,
            expr: Box::new(expr),
        },
        span,
    }
}

/// Folds `-` applied to an integer literal into the literal itself.
fn negate(op_span: Span, expr: Expr) -> Expr {
    match expr.kind {
        ExprKind::Int(value) => Expr {
            kind: ExprKind::Int(-value),
            span: op_span.to(expr.span),
        },
        _ => unary(UnaryOperator::Neg, op_span, expr),
    }
}

fn is_callee(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Name(_) | ExprKind::Member { .. } | ExprKind::Static { .. }
    )
}

impl TokenKind {
    fn starts_canonical_stmt(self) -> bool {
        matches!(
            self,
            TokenKind::Return
                | TokenKind::Let
                | TokenKind::Set
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
        )
    }
}

impl<'src, 'tok, 'ident> Parser<'src, 'tok, 'ident> {
    fn new(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner<str>,
    ) -> Parser<'src, 'tok, 'ident> {
        // Register well-known names
        well_known::register(ident_interner);
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
        }
    }
}

impl Parser<'_, '_, '_> {
    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        self.nth(0)
    }

    /// Returns the token `n` positions ahead of the current one.
    fn nth(&self, n: usize) -> Token {
        match self.tokens.get(self.cursor + n) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the last consumed token.
    fn previous(&self) -> Token {
        match self.cursor.checked_sub(1) {
            Some(i) => self.tokens[i],
            None => Token::new(TokenKind::Eof, Span::DUMMY),
        }
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if c.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// returns an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }

    /// Returns true while the current token does *not* match one of the
    /// provided ones. [`TokenKind::Eof`] is implicitly included in the list.
    ///
    /// This won't advance the cursor.
    fn except(&self, except: impl IntoIterator<Item = TokenKind>) -> bool {
        let c = self.peek().kind;
        c != TokenKind::Eof && except.into_iter().all(|e| e != c)
    }

    fn expected(&self, expected: &'static str) -> Spanned<Error> {
        let c = self.peek();
        c.span().wrap(Error::Expected {
            actual: c.kind,
            expected,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected {actual:?}, expected {expected:?}")]
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    #[error("unexpected {actual:?}, expected {expected}")]
    Expected {
        actual: TokenKind,
        expected: &'static str,
    },
    #[error("integer literal out of range")]
    ParseInt,
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("nested declarations must be named by a single identifier")]
    QualifiedNestedName,
    #[error("parameter {0} must have a type")]
    UntypedParameter(Box<str>),
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_precedence() {
            let expr = "1 * 2 + 3 - 4 % 5";
            let tree_ok = "
                binary Sub (0..17)
                  binary Add (0..9)
                    binary Mul (0..5)
                      int 1 (0..1)
                      int 2 (4..5)
                    int 3 (8..9)
                  binary Rem (12..17)
                    int 4 (12..13)
                    int 5 (16..17)
            ";
        }

        fn test_logical_precedence() {
            let expr = "a or b and not c == d";
            let tree_ok = "
                binary Or (0..21)
                  name a (0..1)
                  binary And (5..21)
                    name b (5..6)
                    unary Not (11..21)
                      binary Eq (15..21)
                        name c (15..16)
                        name d (20..21)
            ";
        }

        fn test_infix_group() {
            let expr = "(a + b) * 2";
            let tree_ok = "
                binary Mul (0..11)
                  binary Add (0..7)
                    name a (1..2)
                    name b (5..6)
                  int 2 (10..11)
            ";
        }

        fn test_prefix_call() {
            let expr = "(Add 1 (Mul x 2))";
            let tree_ok = "
                call (0..17)
                  name Add (1..4)
                  int 1 (5..6)
                  call (7..16)
                    name Mul (8..11)
                    name x (12..13)
                    int 2 (14..15)
            ";
        }

        fn test_negative_argument() {
            let expr = "(f x -2)";
            let tree_ok = "
                call (0..8)
                  name f (1..2)
                  name x (3..4)
                  int -2 (5..7)
            ";
        }

        fn test_spaced_minus_is_infix() {
            let expr = "(x - 2)";
            let tree_ok = "
                binary Sub (0..7)
                  name x (1..2)
                  int 2 (5..6)
            ";
        }

        fn test_zero_argument_call() {
            let expr = "(v.Length)";
            let tree_ok = "
                call (0..10)
                  member Length (1..9)
                    name v (1..2)
            ";
        }

        fn test_grouped_literal_is_not_a_call() {
            let expr = "(42)";
            let tree_ok = "int 42 (0..4)";
        }

        fn test_path_call() {
            let expr = "(Factorial/Accumulator n 1)";
            let tree_ok = "
                call (0..27)
                  name Factorial/Accumulator (1..22)
                  name n (23..24)
                  int 1 (25..26)
            ";
        }

        fn test_postfix_method_call() {
            let expr = "Vector2.New(1, 2).Add(v)";
            let tree_ok = "
                call (0..24)
                  member Add (0..21)
                    call (0..17)
                      member New (0..11)
                        name Vector2 (0..7)
                      int 1 (12..13)
                      int 2 (15..16)
                  name v (22..23)
            ";
        }

        fn test_generic_static() {
            let expr = "Array<Int>.New(5)";
            let tree_ok = "
                call (0..17)
                  static Array<Int>.New (0..14)
                  int 5 (15..16)
            ";
        }

        fn test_comparison_is_not_generic() {
            let expr = "a<b";
            let tree_ok = "
                binary Lt (0..3)
                  name a (0..1)
                  name b (2..3)
            ";
        }

        fn test_negation_of_expression() {
            let expr = "-x * 2";
            let tree_ok = "
                binary Mul (0..6)
                  unary Neg (0..2)
                    name x (1..2)
                  int 2 (5..6)
            ";
        }

        fn test_string_literals() {
            let expr = r#"(Print "a\tb" "plain")"#;
            let tree_ok = r#"
                call (0..22)
                  name Print (1..6)
                  string "a\tb" (7..13)
                  string "plain" (14..21)
            "#;
        }

        fn test_surface_function() {
            let program = "
                fn Add [x int] [y int] -> int {
                    fn Add2 [a int] [b int] -> int {
                        return a + b
                    }
                    return (Add2 x y)
                }
            ";
            let tree_ok = "
                fn Add [x int] [y int] -> int (17..216)
                  fn Add2 [a int] [b int] -> int (69..160)
                    return (126..138)
                      binary Add (133..138)
                        name a (133..134)
                        name b (137..138)
                  return (181..198)
                    call (188..198)
                      name Add2 (189..193)
                      name x (194..195)
                      name y (196..197)
            ";
        }

        fn test_canonical_function() {
            let program = "fn (Add/Add2 [a int] [b int]) -> int { (return (a + b)) }";
            let tree_ok = "
                fn Add/Add2 [a int] [b int] -> int (0..57)
                  return (39..55)
                    binary Add (47..54)
                      name a (48..49)
                      name b (52..53)
            ";
        }

        fn test_struct_and_method() {
            let program = "
                struct Vector2 {
                    [x int]
                    [y int]
                    static [Count int]
                    fn Add [self] [other Vector2] -> Vector2 {
                        return Vector2.New(self.x + other.x, self.y + other.y)
                    }
                }
            ";
            let tree_ok = "
                struct Vector2 (17..310)
                  field x int
                  field y int
                  static Count int
                  fn Add [self] [other Vector2] -> Vector2 (149..292)
                    return (216..270)
                      call (223..270)
                        member New (223..234)
                          name Vector2 (223..230)
                        binary Add (235..251)
                          member x (235..241)
                            name self (235..239)
                          member x (244..251)
                            name other (244..249)
                        binary Add (253..269)
                          member y (253..259)
                            name self (253..257)
                          member y (262..269)
                            name other (262..267)
            ";
        }

        fn test_interface_impl_enum() {
            let program = "
                interface Animal { fn GetSpecies [self] -> string }
                impl Animal for Dog {
                    fn GetSpecies [self] -> string { return \"canis familiaris\" }
                }
                enum RockType { Igneous Sedimentary }
            ";
            let tree_ok = r#"
                interface Animal (17..68)
                  signature GetSpecies [self] -> string
                impl Animal for Dog (85..205)
                  fn GetSpecies [self] -> string (127..187)
                    return (160..185)
                      string "canis familiaris" (167..185)
                enum RockType (222..259)
                  variant Igneous
                  variant Sedimentary
            "#;
        }

        fn test_statements() {
            let program = "
                let total int = 0
                for i in (Range 0 3) { total = total + i; }
                if total == 3 { (Print total) } else if total > 3 { } else { }
                while not false { }
            ";
            let tree_ok = "
                body
                  let total int (17..34)
                    int 0 (33..34)
                  for i (51..94)
                    call (60..71)
                      name Range (61..66)
                      int 0 (67..68)
                      int 3 (69..70)
                    assign (74..91)
                      name total (74..79)
                      binary Add (82..91)
                        name total (82..87)
                        name i (90..91)
                  if (111..173)
                    binary Eq (114..124)
                      name total (114..119)
                      int 3 (123..124)
                    then
                      call (127..140)
                        name Print (128..133)
                        name total (134..139)
                    else
                      if (148..173)
                        binary Gt (151..160)
                          name total (151..156)
                          int 3 (159..160)
                        then
                        else
                  while (190..209)
                    unary Not (196..205)
                      bool false (200..205)
            ";
        }

        fn test_canonical_statements() {
            let program = "(let [n int] 1) (set n (n * 2)) (while (n < 10) { (set n (n + 1)) })";
            let tree_ok = "
                body
                  let n int (0..15)
                    int 1 (13..14)
                  assign (16..31)
                    name n (21..22)
                    binary Mul (23..30)
                      name n (24..25)
                      int 2 (28..29)
                  while (32..68)
                    binary Lt (39..47)
                      name n (40..41)
                      int 10 (44..46)
                    assign (50..65)
                      name n (55..56)
                      binary Add (57..64)
                        name n (58..59)
                        int 1 (62..63)
            ";
        }

        fn test_untyped_parameter() {
            let program = "fn F [x] { }";
            let expected_errors = &["6..7: parameter x must have a type"];
        }

        fn test_invalid_assignment_target() {
            let program = "(f x) = 1";
            let expected_errors = &["0..5: invalid assignment target"];
        }

        fn test_qualified_nested_name() {
            let program = "fn A { fn A/B { } }";
            let expected_errors = &["10..13: nested declarations must be named by a single identifier"];
        }

        fn test_missing_brace() {
            let program = "fn A {";
            let expected_errors = &["6..6: unexpected Eof, expected RBrace"];
        }

        fn test_missing_expression() {
            let program = "let x = ";
            let expected_errors = &["8..8: unexpected Eof, expected an expression"];
        }
    );
}
