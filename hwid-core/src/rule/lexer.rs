//! Tokenizer for rule expressions

use hwid_error::RuleError;

use crate::constants::rule::MAX_EXPRESSION_LEN;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    None,
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset in the expression
    pub offset: usize,
}

struct Lexer<'a> {
    expr: &'a str,
    input: &'a [u8],
    cursor: usize,
}

/// Split an expression into tokens, ending with `Eof`
pub(crate) fn tokenize(expr: &str) -> Result<Vec<Token>, RuleError> {
    if expr.len() > MAX_EXPRESSION_LEN {
        return Err(syntax(
            expr,
            0,
            format!("expression longer than {} bytes", MAX_EXPRESSION_LEN),
        ));
    }

    let mut lexer = Lexer {
        expr,
        input: expr.as_bytes(),
        cursor: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

fn syntax(expr: &str, offset: usize, reason: impl Into<String>) -> RuleError {
    RuleError::Syntax {
        expr: expr.to_string(),
        offset,
        reason: reason.into(),
    }
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> Result<Token, RuleError> {
        self.skip_whitespace();
        let offset = self.cursor;
        let Some(byte) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset,
            });
        };

        let kind = match byte {
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b',' => self.single(TokenKind::Comma),
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'*' => self.single(TokenKind::Star),
            b'/' => self.single(TokenKind::Slash),
            b'%' => self.single(TokenKind::Percent),
            b'=' => self.pair(b'=', TokenKind::EqEq, "expected '=='")?,
            b'!' => self.pair(b'=', TokenKind::NotEq, "expected '!='")?,
            b'<' => self.optional_eq(TokenKind::Le, TokenKind::Lt),
            b'>' => self.optional_eq(TokenKind::Ge, TokenKind::Gt),
            b'"' | b'\'' => self.string(byte)?,
            b'0'..=b'9' | b'.' => self.number()?,
            b if b.is_ascii_alphabetic() || b == b'_' => self.word(),
            _ => {
                let c = self.expr[offset..].chars().next().unwrap_or('?');
                return Err(syntax(self.expr, offset, format!("unexpected character {:?}", c)));
            }
        };
        Ok(Token { kind, offset })
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.cursor += 1;
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.cursor += 1;
        kind
    }

    fn pair(&mut self, second: u8, kind: TokenKind, reason: &str) -> Result<TokenKind, RuleError> {
        if self.input.get(self.cursor + 1) == Some(&second) {
            self.cursor += 2;
            Ok(kind)
        } else {
            Err(syntax(self.expr, self.cursor, reason))
        }
    }

    fn optional_eq(&mut self, with_eq: TokenKind, without: TokenKind) -> TokenKind {
        if self.input.get(self.cursor + 1) == Some(&b'=') {
            self.cursor += 2;
            with_eq
        } else {
            self.cursor += 1;
            without
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, RuleError> {
        let start = self.cursor;
        self.cursor += 1;
        let mut value = String::new();
        loop {
            let rest = &self.expr[self.cursor..];
            let Some(c) = rest.chars().next() else {
                return Err(syntax(self.expr, start, "unterminated string"));
            };
            self.cursor += c.len_utf8();
            match c {
                c if c as u32 == quote as u32 => return Ok(TokenKind::Str(value)),
                '\\' => {
                    let Some(escaped) = self.expr[self.cursor..].chars().next() else {
                        return Err(syntax(self.expr, start, "unterminated string"));
                    };
                    self.cursor += escaped.len_utf8();
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '\\' | '\'' | '"' => value.push(escaped),
                        // Unknown escapes are kept so regex classes like \d survive
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                c => value.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, RuleError> {
        let start = self.cursor;
        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' if !is_float => is_float = true,
                _ => break,
            }
            self.cursor += 1;
        }
        let text = &self.expr[start..self.cursor];
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| syntax(self.expr, start, format!("invalid number {:?}", text)))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| syntax(self.expr, start, format!("integer {} out of range", text)))
        }
    }

    fn word(&mut self) -> TokenKind {
        let start = self.cursor;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.cursor += 1;
        }
        match &self.expr[start..self.cursor] {
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            name => TokenKind::Ident(name.to_string()),
        }
    }
}
