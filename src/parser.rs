//! Recursive-descent parser with precedence climbing for arithmetic and
//! logical operators. Builds an arena-allocated expression tree; never
//! panics on ill-formed input (collects structured syntax errors instead).

use crate::arena::Arena;
use crate::ast::{ArithOp, CompareOp, Expr, ExprKind, LogicalOp};
use crate::error::Diagnostic;
use crate::intern::Interner;
use crate::lexer::duration_minutes_from_raw;
use crate::token::{Span, Token, TokenType};

pub struct Parser<'src, 'arena> {
    tokens: &'src [Token],
    pos: usize,
    arena: &'arena Arena<Expr<'arena>>,
    interner: &'src Interner,
    errors: Vec<Diagnostic>,
}

impl<'src, 'arena> Parser<'src, 'arena> {
    pub fn new(tokens: &'src [Token], arena: &'arena Arena<Expr<'arena>>, interner: &'src Interner) -> Self {
        Parser { tokens, pos: 0, arena, interner, errors: Vec::new() }
    }

    pub fn parse(mut self) -> (Option<&'arena Expr<'arena>>, Vec<Diagnostic>) {
        let root = self.parse_formula();
        if !self.check(TokenType::EOF) {
            let tok = self.current();
            self.error(format!("unexpected trailing token {:?}", tok.kind), tok.span);
        }
        (root, self.errors)
    }

    // ---- token stream helpers ----

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: TokenType) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenType) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let tok = self.current().clone();
            self.error(format!("expected {:?}, found {:?}", kind, tok.kind), tok.span);
            None
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(Diagnostic::syntax(message, span));
    }

    fn lexeme(&self, token: &Token) -> &'src str {
        self.interner.resolve(token.lexeme)
    }

    fn alloc(&self, kind: ExprKind<'arena>, span: Span) -> &'arena Expr<'arena> {
        self.arena.alloc(Expr::new(kind, span))
    }

    // ---- grammar ----

    fn parse_formula(&mut self) -> Option<&'arena Expr<'arena>> {
        if self.check(TokenType::IF) {
            self.parse_if_expr()
        } else {
            self.parse_expression()
        }
    }

    fn parse_if_expr(&mut self) -> Option<&'arena Expr<'arena>> {
        let if_tok = self.advance(); // 'if'
        self.expect(TokenType::LPAREN)?;
        let cond = self.parse_condition()?;
        self.expect(TokenType::RPAREN)?;
        self.expect(TokenType::LBRACE)?;
        let true_branch = self.parse_expression()?;
        self.expect(TokenType::RBRACE)?;

        let false_branch = if self.check(TokenType::ELSE) {
            self.advance();
            if self.check(TokenType::IF) {
                self.parse_if_expr()
            } else {
                self.expect(TokenType::LBRACE)?;
                let branch = self.parse_expression()?;
                self.expect(TokenType::RBRACE)?;
                Some(branch)
            }
        } else {
            None
        };

        let end = false_branch.map(|b| b.span.end).unwrap_or(true_branch.span.end);
        Some(self.alloc(ExprKind::Conditional { cond, true_branch, false_branch }, Span::new(if_tok.span.start, end)))
    }

    fn parse_expression(&mut self) -> Option<&'arena Expr<'arena>> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current().kind {
                TokenType::PLUS => ArithOp::Add,
                TokenType::MINUS => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            let span = Span::new(left.span.start, right.span.end);
            left = self.alloc(ExprKind::BinaryOp { op, left, right }, span);
        }
        Some(left)
    }

    fn parse_term(&mut self) -> Option<&'arena Expr<'arena>> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current().kind {
                TokenType::MULTIPLY => ArithOp::Mul,
                TokenType::DIVIDE => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            let span = Span::new(left.span.start, right.span.end);
            left = self.alloc(ExprKind::BinaryOp { op, left, right }, span);
        }
        Some(left)
    }

    fn parse_factor(&mut self) -> Option<&'arena Expr<'arena>> {
        let tok = self.current().clone();
        match tok.kind {
            TokenType::MINUS => {
                self.advance();
                let inner = self.parse_factor()?;
                match &inner.kind {
                    ExprKind::NumberLit { value } => {
                        Some(self.alloc(ExprKind::NumberLit { value: -value }, Span::new(tok.span.start, inner.span.end)))
                    }
                    ExprKind::DurationLit { minutes, raw } => Some(self.alloc(
                        ExprKind::DurationLit { minutes: -minutes, raw: *raw },
                        Span::new(tok.span.start, inner.span.end),
                    )),
                    _ => {
                        self.error("unary '-' may only apply to a number or duration literal", tok.span);
                        None
                    }
                }
            }
            TokenType::PRIMITIVE => {
                self.advance();
                Some(self.alloc(ExprKind::Primitive { name: tok.lexeme }, tok.span))
            }
            TokenType::FUNCTION => self.parse_function_call(tok),
            TokenType::AT => {
                self.advance();
                Some(self.alloc(ExprKind::Reference { key: tok.lexeme }, tok.span))
            }
            TokenType::DURATION => {
                self.advance();
                let minutes = duration_minutes_from_raw(self.lexeme(&tok));
                Some(self.alloc(ExprKind::DurationLit { minutes, raw: tok.lexeme }, tok.span))
            }
            TokenType::NUMBER => {
                self.advance();
                let value: f64 = self.lexeme(&tok).parse().unwrap_or(0.0);
                Some(self.alloc(ExprKind::NumberLit { value }, tok.span))
            }
            TokenType::STRING => {
                self.advance();
                Some(self.alloc(ExprKind::StringLit { value: tok.lexeme }, tok.span))
            }
            TokenType::DATE_LITERAL => {
                self.advance();
                self.parse_date_literal(&tok)
            }
            TokenType::DIRECTION => {
                self.advance();
                Some(self.alloc(ExprKind::Direction { name: tok.lexeme }, tok.span))
            }
            TokenType::BASE => self.parse_base(tok),
            kind if is_condition_var_token(kind) => {
                self.advance();
                Some(self.alloc(ExprKind::ConditionVar { name: tok.lexeme }, tok.span))
            }
            TokenType::LPAREN => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenType::RPAREN)?;
                Some(inner)
            }
            TokenType::IF => self.parse_if_expr(),
            _ => {
                self.error(format!("unexpected token {:?} in expression", tok.kind), tok.span);
                None
            }
        }
    }

    fn parse_date_literal(&mut self, tok: &Token) -> Option<&'arena Expr<'arena>> {
        let text = self.lexeme(tok);
        let (day_str, month_str) = text.split_once('-')?;
        let day: u32 = day_str.parse().ok()?;
        let month = month_abbrev_to_number(month_str)?;
        Some(self.alloc(ExprKind::DateLiteral { day, month }, tok.span))
    }

    fn parse_function_call(&mut self, tok: Token) -> Option<&'arena Expr<'arena>> {
        self.advance(); // function name
        self.expect(TokenType::LPAREN)?;
        let mut args = Vec::new();
        if !self.check(TokenType::RPAREN) {
            args.push(self.parse_expression()?);
            while self.check(TokenType::COMMA) {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        let close = self.expect(TokenType::RPAREN)?;
        let args_slice = self.arena.alloc_slice(args);
        Some(self.alloc(ExprKind::Function { name: tok.lexeme, args: args_slice }, Span::new(tok.span.start, close.span.end)))
    }

    fn parse_base(&mut self, tok: Token) -> Option<&'arena Expr<'arena>> {
        let name_text = self.lexeme(&tok);
        if name_text == "custom" {
            // lookahead for '(' to distinguish the `custom(start, end)` form
            // from a bare `custom` identifier use (never valid, but the
            // parser only needs to decide which production to take).
            if self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenType::LPAREN) {
                self.advance(); // 'custom'
                self.advance(); // '('
                let start_expr = self.parse_expression()?;
                self.expect(TokenType::COMMA)?;
                let end_expr = self.parse_expression()?;
                let close = self.expect(TokenType::RPAREN)?;
                return Some(self.alloc(
                    ExprKind::Base { name: tok.lexeme, custom_args: Some((start_expr, end_expr)) },
                    Span::new(tok.span.start, close.span.end),
                ));
            }
        }
        self.advance();
        Some(self.alloc(ExprKind::Base { name: tok.lexeme, custom_args: None }, tok.span))
    }

    // ---- condition grammar (only reachable inside if-conditions) ----

    fn parse_condition(&mut self) -> Option<&'arena Expr<'arena>> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Option<&'arena Expr<'arena>> {
        let mut left = self.parse_logical_and()?;
        while self.check(TokenType::OR) {
            self.advance();
            let right = self.parse_logical_and()?;
            let span = Span::new(left.span.start, right.span.end);
            left = self.alloc(ExprKind::LogicalOp { op: LogicalOp::Or, left, right }, span);
        }
        Some(left)
    }

    fn parse_logical_and(&mut self) -> Option<&'arena Expr<'arena>> {
        let mut left = self.parse_logical_not()?;
        while self.check(TokenType::AND) {
            self.advance();
            let right = self.parse_logical_not()?;
            let span = Span::new(left.span.start, right.span.end);
            left = self.alloc(ExprKind::LogicalOp { op: LogicalOp::And, left, right }, span);
        }
        Some(left)
    }

    fn parse_logical_not(&mut self) -> Option<&'arena Expr<'arena>> {
        if self.check(TokenType::NOT) {
            let tok = self.advance();
            let operand = self.parse_logical_not()?;
            let span = Span::new(tok.span.start, operand.span.end);
            Some(self.alloc(ExprKind::Not { operand }, span))
        } else {
            self.parse_comparison()
        }
    }

    /// Implements the disambiguation rule for a leading `(` inside a
    /// condition: the parenthesised inner is parsed with the full
    /// `condition` grammar (so a pure sub-condition like `(lat > 50 &&
    /// lat < 60)` or a bare grouped expression like `(sunset - sunrise)`
    /// both parse), then a trailing comparison operator after the `)` is
    /// permitted and builds an outer `Comparison` node.
    fn parse_comparison(&mut self) -> Option<&'arena Expr<'arena>> {
        let left = if self.check(TokenType::LPAREN) {
            let open = self.advance();
            let inner = self.parse_condition()?;
            let close = self.expect(TokenType::RPAREN)?;
            let _ = (open, close);
            inner
        } else {
            self.parse_expression()?
        };

        if let Some(op) = compare_op_for(self.current().kind) {
            self.advance();
            let right = self.parse_expression()?;
            let span = Span::new(left.span.start, right.span.end);
            Some(self.alloc(ExprKind::Comparison { op, left, right }, span))
        } else {
            Some(left)
        }
    }
}

fn compare_op_for(kind: TokenType) -> Option<CompareOp> {
    match kind {
        TokenType::GT => Some(CompareOp::Gt),
        TokenType::LT => Some(CompareOp::Lt),
        TokenType::GTE => Some(CompareOp::Gte),
        TokenType::LTE => Some(CompareOp::Lte),
        TokenType::EQ => Some(CompareOp::Eq),
        TokenType::NEQ => Some(CompareOp::Neq),
        _ => None,
    }
}

fn is_condition_var_token(kind: TokenType) -> bool {
    matches!(
        kind,
        TokenType::LATITUDE
            | TokenType::LONGITUDE
            | TokenType::DAY_LENGTH
            | TokenType::MONTH
            | TokenType::DAY
            | TokenType::DAY_OF_YEAR
            | TokenType::DATE
            | TokenType::SEASON
    )
}

fn month_abbrev_to_number(abbrev: &str) -> Option<u32> {
    const MONTHS: &[&str] = &["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];
    MONTHS.iter().position(|m| *m == abbrev).map(|i| i as u32 + 1)
}
