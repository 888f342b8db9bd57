//! Pratt-precedence expression parser shared by FHIRPath expressions and
//! CQL expression bodies (spec.md §4.1). Postfix `.`, `[]`, `()` bind
//! tighter than any prefix/infix operator, matching the precedence table.

use crate::error::{ParseError, ParseResult};
use crate::token::{Token, TokenKind};
use ql_ast::{
    BinaryOperator, Expr, ExprKind, LiteralValue, QueryExpr, QuerySource, ReturnClause, SortKey,
    TypeOp, UnaryOperator,
};
use ql_diagnostics::{Position, Span};
use smallvec::SmallVec;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_expression_entry(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expr(0)?;
        self.expect_eof()?;
        Ok(expr)
    }

    fn expect_eof(&mut self) -> ParseResult<()> {
        if matches!(self.peek().kind, TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error(format!("unexpected trailing token {:?}", self.peek().kind)))
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {:?}, found {:?}",
                kind,
                self.peek().kind
            )))
        }
    }

    fn error(&self, message: String) -> ParseError {
        let tok = self.peek();
        ParseError::at_point(message, tok.start, tok.line, tok.column)
    }

    fn span_from(&self, start: &Token) -> Span {
        let end = &self.tokens[self.pos.saturating_sub(1).max(0)];
        Span::new(
            Position {
                offset: start.start,
                line: start.line,
                column: start.column,
            },
            Position {
                offset: end.end,
                line: end.line,
                column: end.column,
            },
        )
    }

    // ---- Pratt core ------------------------------------------------

    fn parse_expr(&mut self, min_bp: u8) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((op, (left_bp, right_bp))) = self.peek_binary_operator() else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.advance();

            lhs = match op {
                BinaryOperator::Is | BinaryOperator::As => {
                    let type_name = self.parse_type_name()?;
                    Expr::new(
                        ExprKind::TypeExpr {
                            op: if op == BinaryOperator::Is {
                                TypeOp::Is
                            } else {
                                TypeOp::As
                            },
                            expr: Box::new(lhs),
                            type_name,
                        },
                        self.span_from(&start),
                    )
                }
                BinaryOperator::Between => {
                    let low = self.parse_expr(right_bp)?;
                    self.expect(&TokenKind::And)?;
                    let high = self.parse_expr(right_bp)?;
                    // Desugar `x between low and high` into
                    // `x >= low and x <= high`, matching CQL semantics.
                    let ge = Expr::new(
                        ExprKind::Binary {
                            op: BinaryOperator::GreaterOrEqual,
                            left: Box::new(lhs.clone()),
                            right: Box::new(low),
                        },
                        self.span_from(&start),
                    );
                    let le = Expr::new(
                        ExprKind::Binary {
                            op: BinaryOperator::LessOrEqual,
                            left: Box::new(lhs),
                            right: Box::new(high),
                        },
                        self.span_from(&start),
                    );
                    Expr::new(
                        ExprKind::Binary {
                            op: BinaryOperator::And,
                            left: Box::new(ge),
                            right: Box::new(le),
                        },
                        self.span_from(&start),
                    )
                }
                _ => {
                    let rhs = self.parse_expr(right_bp)?;
                    Expr::new(
                        ExprKind::Binary {
                            op,
                            left: Box::new(lhs),
                            right: Box::new(rhs),
                        },
                        self.span_from(&start),
                    )
                }
            };
        }

        Ok(lhs)
    }

    fn peek_binary_operator(&self) -> Option<(BinaryOperator, (u8, u8))> {
        let op = match &self.peek().kind {
            TokenKind::Implies => BinaryOperator::Implies,
            TokenKind::Or => BinaryOperator::Or,
            TokenKind::Xor => BinaryOperator::Xor,
            TokenKind::And => BinaryOperator::And,
            TokenKind::Equal => BinaryOperator::Equal,
            TokenKind::NotEqual => BinaryOperator::NotEqual,
            TokenKind::Equivalent => BinaryOperator::Equivalent,
            TokenKind::NotEquivalent => BinaryOperator::NotEquivalent,
            TokenKind::Less => BinaryOperator::Less,
            TokenKind::LessEqual => BinaryOperator::LessOrEqual,
            TokenKind::Greater => BinaryOperator::Greater,
            TokenKind::GreaterEqual => BinaryOperator::GreaterOrEqual,
            TokenKind::In => BinaryOperator::In,
            TokenKind::Contains => BinaryOperator::Contains,
            TokenKind::Overlaps => BinaryOperator::Overlaps,
            TokenKind::Before => BinaryOperator::Before,
            TokenKind::After => BinaryOperator::After,
            TokenKind::Meets => BinaryOperator::Meets,
            TokenKind::Starts => BinaryOperator::Starts,
            TokenKind::Ends => BinaryOperator::Ends,
            TokenKind::During => BinaryOperator::During,
            TokenKind::Includes => BinaryOperator::Includes,
            TokenKind::Is => BinaryOperator::Is,
            TokenKind::As => BinaryOperator::As,
            TokenKind::Pipe => BinaryOperator::Union,
            TokenKind::Between => BinaryOperator::Between,
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Subtract,
            TokenKind::Ampersand => BinaryOperator::Concat,
            TokenKind::Star => BinaryOperator::Multiply,
            TokenKind::Slash => BinaryOperator::Divide,
            TokenKind::Div => BinaryOperator::IntegerDivide,
            TokenKind::Mod => BinaryOperator::Modulo,
            TokenKind::Caret => BinaryOperator::Power,
            _ => return None,
        };
        Some((op, op.binding_power()))
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let kind = match &self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expr(UNARY_BP)?;
                ExprKind::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                }
            }
            TokenKind::Plus => {
                self.advance();
                let operand = self.parse_expr(UNARY_BP)?;
                ExprKind::Unary {
                    op: UnaryOperator::Positive,
                    operand: Box::new(operand),
                }
            }
            TokenKind::Not => {
                self.advance();
                let operand = self.parse_expr(UNARY_BP)?;
                ExprKind::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                }
            }
            _ => return self.parse_postfix(),
        };
        Ok(Expr::new(kind, self.span_from(&start)))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let mut expr = self.parse_primary()?;
        loop {
            match &self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    expr = self.parse_member(expr, &start)?;
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr(0)?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        self.span_from(&start),
                    );
                }
                _ => break,
            }
        }
        if self.looks_like_query_tail() {
            expr = self.parse_query_tail(expr, &start)?;
        }
        Ok(expr)
    }

    /// An identifier immediately followed by `let`/`where`/`return`/`sort`
    /// is a query alias, not a path member (`Encounter E where ...`).
    fn looks_like_query_tail(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Identifier(_))
            && matches!(
                self.peek_at(1).kind,
                TokenKind::Let | TokenKind::Where | TokenKind::Return | TokenKind::Sort
            )
    }

    fn parse_member(&mut self, receiver: Expr, start: &Token) -> ParseResult<Expr> {
        let name = self.parse_identifier_name()?;
        if self.check(&TokenKind::LParen) {
            let args = self.parse_arg_list()?;
            return Ok(Expr::new(
                ExprKind::MethodCall {
                    receiver: Box::new(receiver),
                    name,
                    args,
                },
                self.span_from(start),
            ));
        }
        Ok(Expr::new(
            ExprKind::Path {
                receiver: Box::new(receiver),
                member: name,
            },
            self.span_from(start),
        ))
    }

    fn parse_arg_list(&mut self) -> ParseResult<SmallVec<[Expr; 4]>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = SmallVec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr(0)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_identifier_name(&mut self) -> ParseResult<String> {
        match self.advance().kind {
            TokenKind::Identifier(s) | TokenKind::DelimitedIdentifier(s) => Ok(s),
            // Keywords are valid identifiers in member/function position
            // (FHIRPath allows `.as()`, `.contains()`, `.where()`, etc.).
            other => keyword_as_identifier(&other)
                .ok_or_else(|| self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    fn parse_type_name(&mut self) -> ParseResult<String> {
        let mut name = self.parse_identifier_name()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.parse_identifier_name()?);
        }
        Ok(name)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        if let TokenKind::Identifier(word) = &self.peek().kind {
            if is_duration_precision(word) && matches!(self.peek_at(1).kind, TokenKind::Between) {
                return self.parse_duration_between();
            }
            if word == "difference" && matches!(self.peek_at(1).kind, TokenKind::In) {
                if let TokenKind::Identifier(precision) = &self.peek_at(2).kind {
                    if is_duration_precision(precision) && matches!(self.peek_at(3).kind, TokenKind::Between)
                    {
                        return self.parse_difference_between();
                    }
                }
            }
        }
        let start = self.peek().clone();
        let kind = match self.peek().kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                if let TokenKind::String(unit) = self.peek().kind.clone() {
                    self.advance();
                    ExprKind::Literal(LiteralValue::Quantity {
                        value: n.to_string(),
                        unit,
                    })
                } else if let Some(unit) = self.try_bare_unit_keyword() {
                    ExprKind::Literal(LiteralValue::Quantity {
                        value: n.to_string(),
                        unit,
                    })
                } else {
                    ExprKind::Literal(LiteralValue::Integer(n as i32))
                }
            }
            TokenKind::Long(n) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Long(n))
            }
            TokenKind::Decimal(s) => {
                self.advance();
                if let TokenKind::String(unit) = self.peek().kind.clone() {
                    self.advance();
                    ExprKind::Literal(LiteralValue::Quantity { value: s, unit })
                } else if let Some(unit) = self.try_bare_unit_keyword() {
                    ExprKind::Literal(LiteralValue::Quantity { value: s, unit })
                } else {
                    ExprKind::Literal(LiteralValue::Decimal(s))
                }
            }
            TokenKind::String(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::String(s))
            }
            TokenKind::Date(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Date(s))
            }
            TokenKind::DateTime(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::DateTime(s))
            }
            TokenKind::Time(s) => {
                self.advance();
                ExprKind::Literal(LiteralValue::Time(s))
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Literal(LiteralValue::Boolean(true))
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Literal(LiteralValue::Boolean(false))
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Literal(LiteralValue::Null)
            }
            TokenKind::SpecialVariable(name) => {
                self.advance();
                ExprKind::Variable(format!("${name}"))
            }
            TokenKind::EnvironmentVariable(name) => {
                self.advance();
                ExprKind::Variable(format!("%{name}"))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr(0)?;
                self.expect(&TokenKind::RParen)?;
                inner.kind
            }
            TokenKind::LBrace => return self.parse_list_or_tuple_literal(),
            TokenKind::LBracket => return self.parse_bracketed(),
            TokenKind::If => return self.parse_if(),
            TokenKind::Case => return self.parse_case(),
            TokenKind::Identifier(name) => {
                self.advance();
                if name == "Interval" && self.check(&TokenKind::LBracket) {
                    return self.parse_interval_literal();
                }
                if name == "Tuple" && self.check(&TokenKind::LBrace) {
                    return self.parse_tuple_literal();
                }
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_arg_list()?;
                    ExprKind::Call { name, args }
                } else {
                    ExprKind::Identifier(name)
                }
            }
            TokenKind::DelimitedIdentifier(name) => {
                self.advance();
                ExprKind::Identifier(name)
            }
            other => return Err(self.error(format!("unexpected token {other:?}"))),
        };
        Ok(Expr::new(kind, self.span_from(&start)))
    }

    /// Bare calendar-duration units (`1 year`, `3 days`) appear without
    /// quotes in both languages.
    fn try_bare_unit_keyword(&mut self) -> Option<String> {
        if let TokenKind::Identifier(word) = &self.peek().kind {
            if is_duration_precision(word) {
                let word = word.clone();
                self.advance();
                return Some(word);
            }
        }
        None
    }

    /// CQL's `<precision> between <low> and <high>` duration-between
    /// expression (spec.md §4.3), e.g. `years between @1990-05-15 and
    /// @2024-05-15`. Desugared into a call to the `DurationBetween`
    /// special form so the evaluator has a single dispatch site.
    fn parse_duration_between(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        let precision = match self.advance().kind {
            TokenKind::Identifier(word) => word,
            other => return Err(self.error(format!("expected duration precision, found {other:?}"))),
        };
        self.expect(&TokenKind::Between)?;
        let (_, right_bp) = BinaryOperator::Between.binding_power();
        let low = self.parse_expr(right_bp)?;
        self.expect(&TokenKind::And)?;
        let high = self.parse_expr(right_bp)?;
        let precision_arg = Expr::new(
            ExprKind::Literal(LiteralValue::String(precision)),
            self.span_from(&start),
        );
        Ok(Expr::new(
            ExprKind::Call {
                name: "DurationBetween".to_string(),
                args: SmallVec::from_vec(vec![precision_arg, low, high]),
            },
            self.span_from(&start),
        ))
    }

    /// CQL's `difference in <precision> between <low> and <high>`
    /// expression (spec.md §4.3), distinct from `<precision> between low
    /// and high`: this counts boundary crossings at `precision` rather
    /// than a full duration. Desugared into a call to the
    /// `DifferenceBetween` special form.
    fn parse_difference_between(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.advance(); // "difference"
        self.expect(&TokenKind::In)?;
        let precision = match self.advance().kind {
            TokenKind::Identifier(word) => word,
            other => return Err(self.error(format!("expected duration precision, found {other:?}"))),
        };
        self.expect(&TokenKind::Between)?;
        let (_, right_bp) = BinaryOperator::Between.binding_power();
        let low = self.parse_expr(right_bp)?;
        self.expect(&TokenKind::And)?;
        let high = self.parse_expr(right_bp)?;
        let precision_arg = Expr::new(
            ExprKind::Literal(LiteralValue::String(precision)),
            self.span_from(&start),
        );
        Ok(Expr::new(
            ExprKind::Call {
                name: "DifferenceBetween".to_string(),
                args: SmallVec::from_vec(vec![precision_arg, low, high]),
            },
            self.span_from(&start),
        ))
    }

    fn parse_list_or_tuple_literal(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::LBrace)?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                items.push(self.parse_expr(0)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::ListLiteral(items), self.span_from(&start)))
    }

    fn parse_tuple_literal(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let name = self.parse_identifier_name()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expr(0)?;
                fields.push((name, value));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::TupleLiteral(fields), self.span_from(&start)))
    }

    fn parse_interval_literal(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::LBracket)?;
        let low_closed = true;
        let low = Some(Box::new(self.parse_expr(0)?));
        self.expect(&TokenKind::Comma)?;
        let high = Some(Box::new(self.parse_expr(0)?));
        let high_closed = if self.eat(&TokenKind::RBracket) {
            true
        } else {
            self.expect(&TokenKind::RParen)?;
            false
        };
        Ok(Expr::new(
            ExprKind::IntervalLiteral {
                low,
                high,
                low_closed,
                high_closed,
            },
            self.span_from(&start),
        ))
    }

    /// `[` as a primary token introduces either a CQL retrieve
    /// (`[Condition: "Diabetes"]`) or the start of a query over a bare
    /// list literal already handled by `{...}`; retrieves are the only
    /// bracketed primary form.
    fn parse_bracketed(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::LBracket)?;
        let type_name = self.parse_type_name()?;
        let valueset = if self.eat(&TokenKind::Colon) {
            match self.advance().kind {
                TokenKind::String(s) => Some(s),
                other => return Err(self.error(format!("expected value set name, found {other:?}"))),
            }
        } else {
            None
        };
        self.expect(&TokenKind::RBracket)?;
        let mut args: SmallVec<[Expr; 4]> = SmallVec::new();
        args.push(Expr::new(
            ExprKind::Literal(LiteralValue::String(type_name)),
            self.span_from(&start),
        ));
        if let Some(vs) = valueset {
            args.push(Expr::new(
                ExprKind::Literal(LiteralValue::String(vs)),
                self.span_from(&start),
            ));
        }
        let retrieve = Expr::new(
            ExprKind::Call {
                name: "Retrieve".to_string(),
                args,
            },
            self.span_from(&start),
        );
        self.parse_query_tail(retrieve, &start)
    }

    fn parse_if(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::If)?;
        let condition = self.parse_expr(0)?;
        self.expect(&TokenKind::Then)?;
        let then_branch = self.parse_expr(0)?;
        let else_branch = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_expr(0)?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch,
            },
            self.span_from(&start),
        ))
    }

    fn parse_case(&mut self) -> ParseResult<Expr> {
        let start = self.peek().clone();
        self.expect(&TokenKind::Case)?;
        let comparand = if self.check(&TokenKind::When) {
            None
        } else {
            Some(Box::new(self.parse_expr(0)?))
        };
        let mut whens = Vec::new();
        while self.eat(&TokenKind::When) {
            let when = self.parse_expr(0)?;
            self.expect(&TokenKind::Then)?;
            let then = self.parse_expr(0)?;
            whens.push((when, then));
        }
        self.expect(&TokenKind::Else)?;
        let else_branch = Box::new(self.parse_expr(0)?);
        self.expect(&TokenKind::End)?;
        Ok(Expr::new(
            ExprKind::Case {
                comparand,
                whens,
                else_branch,
            },
            self.span_from(&start),
        ))
    }

    /// Optional query tail attached after a retrieve or any source
    /// expression: `alias (let ...)* (where ...)? (return ...)? (sort by
    /// ...)?` (spec.md §4.3 "Queries").
    fn parse_query_tail(&mut self, source: Expr, start: &Token) -> ParseResult<Expr> {
        let alias = if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            name
        } else {
            return Ok(source);
        };

        let mut lets = Vec::new();
        while self.eat(&TokenKind::Let) {
            let name = self.parse_identifier_name()?;
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expr(0)?;
            lets.push((name, value));
        }

        let where_clause = if self.eat(&TokenKind::Where) {
            Some(self.parse_expr(0)?)
        } else {
            None
        };

        let ret = if self.eat(&TokenKind::Return) {
            let distinct = if self.eat(&TokenKind::All) {
                false
            } else {
                self.eat(&TokenKind::Distinct);
                true
            };
            Some(ReturnClause {
                expr: self.parse_expr(0)?,
                distinct,
            })
        } else {
            None
        };

        let mut sort = Vec::new();
        if self.eat(&TokenKind::Sort) {
            self.eat(&TokenKind::By);
            loop {
                let expr = self.parse_expr(0)?;
                let descending = if self.eat(&TokenKind::Desc) {
                    true
                } else {
                    self.eat(&TokenKind::Asc);
                    false
                };
                sort.push(SortKey { expr, descending });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }

        Ok(Expr::new(
            ExprKind::Query(Box::new(QueryExpr {
                sources: vec![QuerySource { expr: source, alias }],
                lets,
                where_clause,
                ret,
                sort,
            })),
            self.span_from(start),
        ))
    }
}

const UNARY_BP: u8 = 25;

const DURATION_PRECISIONS: &[&str] = &[
    "year", "years", "month", "months", "week", "weeks", "day", "days", "hour", "hours",
    "minute", "minutes", "second", "seconds", "millisecond", "milliseconds",
];

fn is_duration_precision(word: &str) -> bool {
    DURATION_PRECISIONS.contains(&word)
}

fn keyword_as_identifier(kind: &TokenKind) -> Option<String> {
    let s = match kind {
        TokenKind::And => "and",
        TokenKind::Or => "or",
        TokenKind::Xor => "xor",
        TokenKind::Not => "not",
        TokenKind::In => "in",
        TokenKind::Contains => "contains",
        TokenKind::Overlaps => "overlaps",
        TokenKind::Before => "before",
        TokenKind::After => "after",
        TokenKind::Meets => "meets",
        TokenKind::Starts => "starts",
        TokenKind::Ends => "ends",
        TokenKind::During => "during",
        TokenKind::Includes => "includes",
        TokenKind::Is => "is",
        TokenKind::As => "as",
        TokenKind::Div => "div",
        TokenKind::Mod => "mod",
        TokenKind::Where => "where",
        TokenKind::Return => "return",
        TokenKind::Context => "context",
        TokenKind::Default => "default",
        TokenKind::All => "all",
        TokenKind::Distinct => "distinct",
        TokenKind::By => "by",
        TokenKind::Let => "let",
        TokenKind::Version => "version",
        _ => return None,
    };
    Some(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Expr {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(&tokens).parse_expression_entry().unwrap()
    }

    #[test]
    fn parses_precedence_correctly() {
        // spec.md §8 scenario 1: 1 + 2 * 3 == 7, i.e. `*` binds tighter.
        let expr = parse("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary {
                op: BinaryOperator::Add,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinaryOperator::Multiply,
                    ..
                }
            )),
            other => panic!("expected addition at top level, got {other:?}"),
        }
    }

    #[test]
    fn parses_path_navigation() {
        let expr = parse("Patient.name.family");
        assert!(matches!(expr.kind, ExprKind::Path { .. }));
    }

    #[test]
    fn parses_method_call_with_lambda_body() {
        let expr = parse("Patient.name.where(use = 'official')");
        match expr.kind {
            ExprKind::MethodCall { name, args, .. } => {
                assert_eq!(name, "where");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected method call, got {other:?}"),
        }
    }

    #[test]
    fn parses_interval_literal() {
        let expr = parse("Interval[3, 5]");
        assert!(matches!(
            expr.kind,
            ExprKind::IntervalLiteral {
                low_closed: true,
                high_closed: true,
                ..
            }
        ));
    }

    #[test]
    fn parses_quantity_literal() {
        let expr = parse("1 'kg'");
        assert!(matches!(
            expr.kind,
            ExprKind::Literal(LiteralValue::Quantity { .. })
        ));
    }

    #[test]
    fn parses_between_as_conjunction() {
        let expr = parse("3 between 1 and 5");
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOperator::And,
                ..
            }
        ));
    }

    #[test]
    fn parses_retrieve_query_with_where_and_return() {
        let expr = parse(
            r#"[Condition] C where C.clinicalStatus = 'active' return C.onsetDateTime"#,
        );
        match expr.kind {
            ExprKind::Query(query) => {
                assert_eq!(query.sources[0].alias, "C");
                assert!(query.where_clause.is_some());
                assert!(query.ret.is_some());
            }
            other => panic!("expected query, got {other:?}"),
        }
    }

    #[test]
    fn parses_case_expression() {
        let expr = parse("case when 1 > 0 then 'pos' else 'non-pos' end");
        assert!(matches!(expr.kind, ExprKind::Case { .. }));
    }

    #[test]
    fn parses_if_then_else() {
        let expr = parse("if true then 1 else 0");
        assert!(matches!(expr.kind, ExprKind::If { .. }));
    }

    #[test]
    fn parses_is_type_expression() {
        let expr = parse("Patient.birthDate is Date");
        match expr.kind {
            ExprKind::TypeExpr { op, type_name, .. } => {
                assert_eq!(op, TypeOp::Is);
                assert_eq!(type_name, "Date");
            }
            other => panic!("expected type expression, got {other:?}"),
        }
    }
}
