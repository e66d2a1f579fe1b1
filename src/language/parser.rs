use crate::language::ast::{Expr, Program, Stmt};
use crate::language::cexpr::{LetKind, Op1, Op2};
use crate::language::errors::{SyntaxError, SyntaxErrors};
use crate::language::span::Span;
use crate::language::token::{Token, TokenKind};
use nom::{
    IResult, Parser as NomParser,
    branch::alt,
    bytes::complete::{is_not, tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, map_res, opt, recognize},
    sequence::{delimited, pair, preceded},
};

pub fn parse(source: &str) -> Result<Program, SyntaxErrors> {
    let tokens = tokenize(source).map_err(|err| SyntaxErrors::new(vec![err]))?;
    let mut parser = Parser::new(tokens);
    let program = parser.program();
    if parser.errors.is_empty() {
        Ok(program)
    } else {
        Err(SyntaxErrors::new(parser.errors))
    }
}

// ---------------------------------------------------------------------------
// Lexing
// ---------------------------------------------------------------------------

fn lex_number(input: &str) -> IResult<&str, TokenKind> {
    map_res(
        recognize(pair(digit1, opt(preceded(char('.'), digit1)))),
        |s: &str| s.parse::<f64>().map(TokenKind::Number),
    )
    .parse(input)
}

fn lex_string(input: &str) -> IResult<&str, TokenKind> {
    map(
        delimited(char('"'), opt(is_not("\"\n")), char('"')),
        |s: Option<&str>| TokenKind::String(s.unwrap_or("").to_string()),
    )
    .parse(input)
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    let (rest, word) = recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)?;
    let kind = match word {
        "function" => TokenKind::Function,
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "var" => TokenKind::Var,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        "new" => TokenKind::New,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "undefined" => TokenKind::Undefined,
        "this" => TokenKind::This,
        "typeof" => TokenKind::Typeof,
        other => TokenKind::Identifier(other.to_string()),
    };
    Ok((rest, kind))
}

fn lex_wide_symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(tag("&&"), |_| TokenKind::AmpersandAmpersand),
        map(tag("||"), |_| TokenKind::PipePipe),
        map(tag("=="), |_| TokenKind::EqEq),
        map(tag("!="), |_| TokenKind::BangEq),
        map(tag("<="), |_| TokenKind::LtEq),
        map(tag(">="), |_| TokenKind::GtEq),
        map(tag("++"), |_| TokenKind::PlusPlus),
        map(tag("--"), |_| TokenKind::MinusMinus),
    ))
    .parse(input)
}

fn lex_symbol(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(tag("!"), |_| TokenKind::Bang),
        map(tag("="), |_| TokenKind::Eq),
        map(tag("<"), |_| TokenKind::Lt),
        map(tag(">"), |_| TokenKind::Gt),
        map(tag("+"), |_| TokenKind::Plus),
        map(tag("-"), |_| TokenKind::Minus),
        map(tag("*"), |_| TokenKind::Star),
        map(tag("/"), |_| TokenKind::Slash),
        map(tag("%"), |_| TokenKind::Percent),
        map(tag("."), |_| TokenKind::Dot),
        map(tag(","), |_| TokenKind::Comma),
        map(tag(":"), |_| TokenKind::Colon),
        map(tag(";"), |_| TokenKind::Semi),
        map(tag("("), |_| TokenKind::LParen),
        map(tag(")"), |_| TokenKind::RParen),
        map(tag("{"), |_| TokenKind::LBrace),
        map(tag("}"), |_| TokenKind::RBrace),
        map(tag("["), |_| TokenKind::LBracket),
        map(tag("]"), |_| TokenKind::RBracket),
    ))
    .parse(input)
}

fn lex_token(input: &str) -> IResult<&str, TokenKind> {
    alt((lex_number, lex_string, lex_word, lex_wide_symbol, lex_symbol)).parse(input)
}

fn skip_trivia(mut rest: &str) -> &str {
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("//") {
            rest = match after.find('\n') {
                Some(idx) => &after[idx + 1..],
                None => "",
            };
        } else if trimmed.len() != rest.len() {
            rest = trimmed;
        } else {
            return rest;
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        rest = skip_trivia(rest);
        let start = source.len() - rest.len();
        if rest.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
            return Ok(tokens);
        }
        match lex_token(rest) {
            Ok((next, kind)) => {
                let end = source.len() - next.len();
                tokens.push(Token {
                    kind,
                    span: Span::new(start, end),
                });
                rest = next;
            }
            Err(_) => {
                let ch = rest.chars().next().unwrap_or('\0');
                return Err(SyntaxError::new(
                    format!("Unexpected character `{ch}`"),
                    Span::new(start, start + ch.len_utf8()),
                )
                .with_label("not a valid token"));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, SyntaxError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            let found = self.peek();
            Err(SyntaxError::new(
                format!(
                    "Expected {} but found {}",
                    kind.describe(),
                    found.kind.describe()
                ),
                found.span,
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<(String, Span), SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier(name) => {
                self.bump();
                Ok((name, token.span))
            }
            other => Err(SyntaxError::new(
                format!("Expected an identifier but found {}", other.describe()),
                token.span,
            )),
        }
    }

    fn recover_to_stmt_boundary(&mut self) {
        while !matches!(self.peek().kind, TokenKind::Eof | TokenKind::Semi) {
            self.bump();
        }
        self.eat(&TokenKind::Semi);
    }

    fn program(&mut self) -> Program {
        let body = self.stmts_until(&TokenKind::Eof);
        Program { body }
    }

    fn stmts_until(&mut self, end: &TokenKind) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at(end) && !self.at(&TokenKind::Eof) {
            match self.stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.recover_to_stmt_boundary();
                }
            }
        }
        stmts
    }

    fn stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => self.decl(),
            TokenKind::If => self.if_stmt(),
            TokenKind::Return => {
                let start = self.bump().span;
                let value = if self.at(&TokenKind::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                let end = self.expect(&TokenKind::Semi)?.span;
                Ok(Stmt::Return {
                    value,
                    span: start.merge(end),
                })
            }
            _ => {
                let expr = self.expr()?;
                let span = expr.span();
                let end = self.expect(&TokenKind::Semi)?.span;
                Ok(Stmt::Expr {
                    expr,
                    span: span.merge(end),
                })
            }
        }
    }

    fn decl(&mut self) -> Result<Stmt, SyntaxError> {
        let keyword = self.bump();
        let kind = match keyword.kind {
            TokenKind::Const => LetKind::Const,
            TokenKind::Var => LetKind::Var,
            _ => LetKind::Let,
        };
        let (name, _) = self.expect_identifier()?;
        self.expect(&TokenKind::Eq)?;
        let value = self.expr()?;
        let end = self.expect(&TokenKind::Semi)?.span;
        Ok(Stmt::Decl {
            kind,
            name,
            value,
            span: keyword.span.merge(end),
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.bump().span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let then = self.stmts_until(&TokenKind::RBrace);
        let mut end = self.expect(&TokenKind::RBrace)?.span;
        let els = if self.eat(&TokenKind::Else) {
            self.expect(&TokenKind::LBrace)?;
            let els = self.stmts_until(&TokenKind::RBrace);
            end = self.expect(&TokenKind::RBrace)?.span;
            els
        } else {
            Vec::new()
        };
        Ok(Stmt::If {
            cond,
            then,
            els,
            span: start.merge(end),
        })
    }

    fn expr(&mut self) -> Result<Expr, SyntaxError> {
        let target = self.or_expr()?;
        if self.at(&TokenKind::Eq) {
            let eq_span = self.bump().span;
            match target {
                Expr::Id(..) | Expr::Member { .. } => {}
                _ => {
                    return Err(SyntaxError::new(
                        "Invalid assignment target",
                        target.span(),
                    )
                    .with_help("only identifiers and property accesses can be assigned to"));
                }
            }
            let value = self.expr()?;
            let span = target.span().merge(value.span()).merge(eq_span);
            return Ok(Expr::Assign {
                target: Box::new(target),
                value: Box::new(value),
                span,
            });
        }
        Ok(target)
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.and_expr()?;
        while self.eat(&TokenKind::PipePipe) {
            let right = self.and_expr()?;
            left = binary(Op2::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.equality()?;
        while self.eat(&TokenKind::AmpersandAmpersand) {
            let right = self.equality()?;
            left = binary(Op2::And, left, right);
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.eat(&TokenKind::EqEq) {
                Op2::Eq
            } else if self.eat(&TokenKind::BangEq) {
                Op2::NotEq
            } else {
                return Ok(left);
            };
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.eat(&TokenKind::Lt) {
                Op2::Lt
            } else if self.eat(&TokenKind::LtEq) {
                Op2::LtEq
            } else if self.eat(&TokenKind::Gt) {
                Op2::Gt
            } else if self.eat(&TokenKind::GtEq) {
                Op2::GtEq
            } else {
                return Ok(left);
            };
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                Op2::Add
            } else if self.eat(&TokenKind::Minus) {
                Op2::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                Op2::Mul
            } else if self.eat(&TokenKind::Slash) {
                Op2::Div
            } else if self.eat(&TokenKind::Percent) {
                Op2::Mod
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let op = match token.kind {
            TokenKind::Bang => Op1::Not,
            TokenKind::Minus => Op1::Neg,
            TokenKind::Typeof => Op1::Typeof,
            _ => return self.postfix(),
        };
        self.bump();
        let expr = self.unary()?;
        let span = token.span.merge(expr.span());
        Ok(Expr::Unary {
            op,
            expr: Box::new(expr),
            span,
        })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let (property, prop_span) = self.expect_identifier()?;
                let span = expr.span().merge(prop_span);
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    span,
                };
            } else if self.at(&TokenKind::LParen) {
                let (args, end) = self.arguments()?;
                let span = expr.span().merge(end);
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else if self.at(&TokenKind::PlusPlus) || self.at(&TokenKind::MinusMinus) {
                let token = self.bump();
                if !matches!(expr, Expr::Id(..) | Expr::Member { .. }) {
                    return Err(SyntaxError::new(
                        "Invalid increment target",
                        expr.span(),
                    )
                    .with_help("only identifiers and property accesses can be incremented"));
                }
                let delta = if token.kind == TokenKind::PlusPlus {
                    1.0
                } else {
                    -1.0
                };
                let span = expr.span().merge(token.span);
                expr = Expr::IncrDecr {
                    target: Box::new(expr),
                    delta,
                    span,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<(Vec<Expr>, Span), SyntaxError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&TokenKind::RParen)?.span;
        Ok((args, end))
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.bump();
                Ok(Expr::Num(n, token.span))
            }
            TokenKind::String(s) => {
                self.bump();
                Ok(Expr::Str(s, token.span))
            }
            TokenKind::True => {
                self.bump();
                Ok(Expr::Bool(true, token.span))
            }
            TokenKind::False => {
                self.bump();
                Ok(Expr::Bool(false, token.span))
            }
            TokenKind::Undefined => {
                self.bump();
                Ok(Expr::Undefined(token.span))
            }
            TokenKind::This => {
                self.bump();
                Ok(Expr::This(token.span))
            }
            TokenKind::Identifier(name) => {
                self.bump();
                Ok(Expr::Id(name, token.span))
            }
            TokenKind::Function => self.function(),
            TokenKind::New => {
                let start = self.bump().span;
                let mut callee = self.primary()?;
                while self.eat(&TokenKind::Dot) {
                    let (property, prop_span) = self.expect_identifier()?;
                    let span = callee.span().merge(prop_span);
                    callee = Expr::Member {
                        object: Box::new(callee),
                        property,
                        span,
                    };
                }
                let (args, end) = self.arguments()?;
                Ok(Expr::New {
                    callee: Box::new(callee),
                    args,
                    span: start.merge(end),
                })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                let start = self.bump().span;
                let mut items = Vec::new();
                if !self.at(&TokenKind::RBracket) {
                    loop {
                        items.push(self.expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(&TokenKind::RBracket)?.span;
                Ok(Expr::Array(items, start.merge(end)))
            }
            TokenKind::LBrace => {
                let start = self.bump().span;
                let mut props = Vec::new();
                if !self.at(&TokenKind::RBrace) {
                    loop {
                        let (name, _) = self.expect_identifier()?;
                        self.expect(&TokenKind::Colon)?;
                        props.push((name, self.expr()?));
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = self.expect(&TokenKind::RBrace)?.span;
                Ok(Expr::Object(props, start.merge(end)))
            }
            other => Err(SyntaxError::new(
                format!("Expected an expression but found {}", other.describe()),
                token.span,
            )),
        }
    }

    fn function(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.bump().span;
        let name = match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.bump();
                Some(name)
            }
            _ => None,
        };
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let (param, _) = self.expect_identifier()?;
                params.push(param);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.stmts_until(&TokenKind::RBrace);
        let end = self.expect(&TokenKind::RBrace)?.span;
        Ok(Expr::Function {
            name,
            params,
            body,
            span: start.merge(end),
        })
    }
}

fn binary(op: Op2, left: Expr, right: Expr) -> Expr {
    let span = left.span().merge(right.span());
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_tracks_spans() {
        let tokens = tokenize("let x = 12;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[1].span, Span::new(4, 5));
        assert_eq!(tokens[3].kind, TokenKind::Number(12.0));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn tokenize_skips_comments() {
        let tokens = tokenize("// intro\nx;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier("x".to_string()));
    }

    #[test]
    fn tokenize_rejects_stray_characters() {
        let err = tokenize("let $x = 1;").unwrap_err();
        assert!(err.message.contains('$'));
    }

    #[test]
    fn parses_precedence() {
        let program = parse("const y = 1 + 2 * 3;").unwrap();
        match &program.body[0] {
            Stmt::Decl { value, .. } => match value {
                Expr::Binary { op: Op2::Add, right, .. } => {
                    assert!(matches!(**right, Expr::Binary { op: Op2::Mul, .. }));
                }
                other => panic!("expected addition, got {other:?}"),
            },
            other => panic!("expected decl, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_and_call() {
        let program = parse("let f = function(a, b) { return a + b; }; f(1, 2);").unwrap();
        assert_eq!(program.body.len(), 2);
        match &program.body[1] {
            Stmt::Expr { expr: Expr::Call { args, .. }, .. } => assert_eq!(args.len(), 2),
            other => panic!("expected call statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_new_with_member_callee() {
        let program = parse("let p = new geom.Point(1, 2);").unwrap();
        match &program.body[0] {
            Stmt::Decl { value: Expr::New { callee, .. }, .. } => {
                assert!(matches!(**callee, Expr::Member { .. }));
            }
            other => panic!("expected new expression, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_assignment_target() {
        let errors = parse("1 = 2;").unwrap_err();
        assert!(errors.errors[0].message.contains("assignment"));
    }

    #[test]
    fn reports_with_spans() {
        let errors = parse("let = 3;").unwrap_err();
        let err = &errors.errors[0];
        assert!(err.message.contains("identifier"));
        assert_eq!(err.span.start, 4);
    }
}
