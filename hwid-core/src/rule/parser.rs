//! Pratt parser for rule expressions
//!
//! Precedence, lowest to highest: `or`, `and`, `not`, comparisons and `in`,
//! `+ -`, `* / %`, unary minus, calls and primaries. Comparisons do not chain.

use hwid_error::RuleError;

use super::lexer::{tokenize, Token, TokenKind};
use crate::constants::rule::MAX_EXPRESSION_DEPTH;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// (left, right) binding power
    fn binding_power(self) -> (u8, u8) {
        match self {
            Self::Or => (1, 2),
            Self::And => (3, 4),
            Self::Eq | Self::NotEq | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::In => (7, 8),
            Self::Add | Self::Sub => (9, 10),
            Self::Mul | Self::Div | Self::Rem => (11, 12),
        }
    }

    fn is_comparison(self) -> bool {
        self.binding_power().0 == 7
    }

    fn from_token(kind: &TokenKind) -> Option<Self> {
        Some(match kind {
            TokenKind::Or => Self::Or,
            TokenKind::And => Self::And,
            TokenKind::EqEq => Self::Eq,
            TokenKind::NotEq => Self::NotEq,
            TokenKind::Lt => Self::Lt,
            TokenKind::Le => Self::Le,
            TokenKind::Gt => Self::Gt,
            TokenKind::Ge => Self::Ge,
            TokenKind::In => Self::In,
            TokenKind::Plus => Self::Add,
            TokenKind::Minus => Self::Sub,
            TokenKind::Star => Self::Mul,
            TokenKind::Slash => Self::Div,
            TokenKind::Percent => Self::Rem,
            _ => return None,
        })
    }
}

const NOT_BP: u8 = 5;
const NEG_BP: u8 = 13;

/// Rule expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    List(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a complete expression
    pub fn parse(expr: &str) -> Result<Self, RuleError> {
        let tokens = tokenize(expr)?;
        let mut parser = Parser {
            expr,
            tokens,
            pos: 0,
            depth: 0,
        };
        let ast = parser.expression(0)?;
        let trailing = parser.peek();
        if trailing.kind != TokenKind::Eof {
            return Err(parser.error_at(trailing.offset, "unexpected trailing input"));
        }
        Ok(ast)
    }
}

struct Parser<'a> {
    expr: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token {
        // tokenize always ends with Eof
        self.tokens[self.pos.min(self.tokens.len() - 1)].clone()
    }

    fn advance(&mut self) -> Token {
        let token = self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), RuleError> {
        let token = self.advance();
        if token.kind == kind {
            Ok(())
        } else {
            Err(self.error_at(token.offset, format!("expected {}", what)))
        }
    }

    fn error_at(&self, offset: usize, reason: impl Into<String>) -> RuleError {
        RuleError::Syntax {
            expr: self.expr.to_string(),
            offset,
            reason: reason.into(),
        }
    }

    fn enter(&mut self, offset: usize) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_EXPRESSION_DEPTH {
            return Err(self.error_at(
                offset,
                format!("nesting deeper than {}", MAX_EXPRESSION_DEPTH),
            ));
        }
        Ok(())
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, RuleError> {
        let start = self.peek().offset;
        self.enter(start)?;
        let mut lhs = self.prefix()?;

        let mut seen_comparison = false;
        loop {
            let token = self.peek();
            let Some(op) = BinaryOp::from_token(&token.kind) else {
                break;
            };
            let (left_bp, right_bp) = op.binding_power();
            if left_bp < min_bp {
                break;
            }
            if op.is_comparison() {
                if seen_comparison {
                    return Err(self.error_at(token.offset, "comparisons cannot be chained"));
                }
                seen_comparison = true;
            }
            self.advance();
            let rhs = self.expression(right_bp)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        self.depth -= 1;
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, RuleError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(n) => Ok(Expr::Literal(Literal::Int(n))),
            TokenKind::Float(n) => Ok(Expr::Literal(Literal::Float(n))),
            TokenKind::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            TokenKind::True => Ok(Expr::Literal(Literal::Bool(true))),
            TokenKind::False => Ok(Expr::Literal(Literal::Bool(false))),
            TokenKind::None => Ok(Expr::Literal(Literal::None)),
            TokenKind::Minus => {
                let operand = self.expression(NEG_BP)?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            TokenKind::Not => {
                let operand = self.expression(NOT_BP)?;
                Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)))
            }
            TokenKind::LParen => {
                let inner = self.expression(0)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let items = self.sequence(TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            TokenKind::Ident(name) => {
                if self.peek().kind != TokenKind::LParen {
                    return Err(self.error_at(
                        token.offset,
                        format!("bare name {:?}, only function calls are allowed", name),
                    ));
                }
                self.advance();
                let args = self.sequence(TokenKind::RParen, "')'")?;
                Ok(Expr::Call { name, args })
            }
            TokenKind::Eof => Err(self.error_at(token.offset, "unexpected end of expression")),
            other => Err(self.error_at(token.offset, format!("unexpected token {:?}", other))),
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed
    fn sequence(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, RuleError> {
        let mut items = Vec::new();
        loop {
            if self.peek().kind == close {
                self.advance();
                return Ok(items);
            }
            items.push(self.expression(0)?);
            let token = self.advance();
            if token.kind == close {
                return Ok(items);
            }
            if token.kind != TokenKind::Comma {
                return Err(self.error_at(token.offset, format!("expected ',' or {}", what)));
            }
        }
    }
}
