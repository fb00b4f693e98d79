//! Whitelisted expression parser.
//!
//! Turns user text into an [`Expr`]. Only the identifiers in [`lookup`]
//! are accepted; anything else is rejected with a [`ParseError`] pointing
//! at the offending span, so user text can never reach anything but the
//! closed vocabulary below.
//!
//! Supported syntax:
//! - numbers: `3`, `2.5`, `1e-3`
//! - operators: `+ - * /`, `^` or `**` for powers (right associative)
//! - implicit multiplication: `2x`, `3(x+1)`, `(x+1)(x-1)`, `xy`, `2pi`
//! - function calls with parentheses: `sin(x)`, `log(2x)`

use tracing::debug;

use crate::error::ParseError;
use crate::expr::{Constant, Expr, Function, Variable};
use crate::number::Number;

/// Longest accepted input, in bytes.
pub const MAX_INPUT_LEN: usize = 500;

/// Deepest accepted nesting of parentheses and operators.
pub const MAX_DEPTH: usize = 64;

/// A whitelisted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Var(Variable),
    Const(Constant),
    Func(Function),
}

/// The closed identifier table.
pub fn lookup(name: &str) -> Option<Symbol> {
    let symbol = match name {
        "x" => Symbol::Var(Variable::X),
        "y" => Symbol::Var(Variable::Y),
        "pi" | "π" => Symbol::Const(Constant::Pi),
        "E" | "e" => Symbol::Const(Constant::E),
        "sin" => Symbol::Func(Function::Sin),
        "cos" => Symbol::Func(Function::Cos),
        "tan" => Symbol::Func(Function::Tan),
        "asin" => Symbol::Func(Function::Asin),
        "acos" => Symbol::Func(Function::Acos),
        "atan" => Symbol::Func(Function::Atan),
        "exp" => Symbol::Func(Function::Exp),
        "log" | "ln" => Symbol::Func(Function::Log),
        "sqrt" => Symbol::Func(Function::Sqrt),
        "abs" => Symbol::Func(Function::Abs),
        _ => return None,
    };
    Some(symbol)
}

const IDENTIFIERS: &[&str] = &[
    "asin", "acos", "atan", "sqrt", "sin", "cos", "tan", "exp", "log", "abs", "ln", "pi", "π",
    "x", "y", "E", "e",
];

/// Parse user text into a canonical expression.
pub fn parse(text: &str) -> Result<Expr, ParseError> {
    if text.len() > MAX_INPUT_LEN {
        return Err(ParseError::new(
            format!("expression is too long (limit {} characters)", MAX_INPUT_LEN),
            text,
            MAX_INPUT_LEN,
            0,
        ));
    }
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ParseError::new("expression is empty", text, 0, text.len()));
    }
    let mut parser = Parser {
        src: text,
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(token, "unexpected input after expression"));
    }
    debug!(input = text, parsed = %expr, "parsed expression");
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(Number),
    Ident(Symbol),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
    len: usize,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        let single = |kind| Token {
            kind,
            start,
            len: c.len_utf8(),
        };
        match c {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push(single(TokenKind::Plus));
                i += 1;
            }
            '-' | '−' => {
                tokens.push(single(TokenKind::Minus));
                i += 1;
            }
            '*' if matches!(chars.get(i + 1), Some((_, '*'))) => {
                tokens.push(Token {
                    kind: TokenKind::Caret,
                    start,
                    len: 2,
                });
                i += 2;
            }
            '*' | '·' | '×' => {
                tokens.push(single(TokenKind::Star));
                i += 1;
            }
            '/' => {
                tokens.push(single(TokenKind::Slash));
                i += 1;
            }
            '^' => {
                tokens.push(single(TokenKind::Caret));
                i += 1;
            }
            '(' => {
                tokens.push(single(TokenKind::LParen));
                i += 1;
            }
            ')' => {
                tokens.push(single(TokenKind::RParen));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let (token, next) = lex_number(src, &chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_alphabetic() => {
                let mut end = i;
                while end < chars.len() && chars[end].1.is_alphabetic() {
                    end += 1;
                }
                let word_end = chars.get(end).map_or(src.len(), |(offset, _)| *offset);
                let word = &src[start..word_end];
                tokens.extend(split_identifier(src, word, start)?);
                i = end;
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", other),
                    src,
                    start,
                    other.len_utf8(),
                ));
            }
        }
    }
    Ok(tokens)
}

fn lex_number(
    src: &str,
    chars: &[(usize, char)],
    mut i: usize,
) -> Result<(Token, usize), ParseError> {
    let start = chars[i].0;
    let mut is_float = false;
    while i < chars.len() && chars[i].1.is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i].1 == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].1.is_ascii_digit() {
            i += 1;
        }
    }
    // scientific notation only when digits follow, so `2e` stays `2*E`
    if i < chars.len() && matches!(chars[i].1, 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j].1, '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].1.is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
        }
    }
    let end = chars.get(i).map_or(src.len(), |(offset, _)| *offset);
    let text = &src[start..end];
    let invalid = || ParseError::new(format!("invalid number `{}`", text), src, start, end - start);

    let number = if is_float {
        let value: f64 = text.parse().map_err(|_| invalid())?;
        if !value.is_finite() {
            return Err(invalid());
        }
        Number::float(value)
    } else {
        match text.parse::<i64>() {
            Ok(n) => Number::int(n),
            Err(_) => Number::float(text.parse().map_err(|_| invalid())?),
        }
    };
    Ok((
        Token {
            kind: TokenKind::Number(number),
            start,
            len: end - start,
        },
        i,
    ))
}

/// Split a run of letters into whitelisted identifiers, longest match
/// first: `xy` is `x y`, `pix` is `pi x`, `xsin` is `x sin`.
fn split_identifier(src: &str, word: &str, offset: usize) -> Result<Vec<Token>, ParseError> {
    if let Some(symbol) = lookup(word) {
        return Ok(vec![Token {
            kind: TokenKind::Ident(symbol),
            start: offset,
            len: word.len(),
        }]);
    }

    let mut tokens = Vec::new();
    let mut rest = word;
    let mut at = offset;
    while !rest.is_empty() {
        let matched = IDENTIFIERS
            .iter()
            .filter(|name| rest.starts_with(**name))
            .max_by_key(|name| name.len());
        match matched.and_then(|name| lookup(name).map(|symbol| (name, symbol))) {
            Some((name, symbol)) => {
                tokens.push(Token {
                    kind: TokenKind::Ident(symbol),
                    start: at,
                    len: name.len(),
                });
                rest = &rest[name.len()..];
                at += name.len();
            }
            None => {
                return Err(ParseError::new(
                    format!("unknown identifier `{}`", word),
                    src,
                    offset,
                    word.len(),
                ));
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: &str) -> ParseError {
        ParseError::new(message, self.src, token.start, token.len)
    }

    fn error_at_end(&self, message: &str) -> ParseError {
        ParseError::new(message, self.src, self.src.len(), 0)
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let offset = self.peek().map_or(self.src.len(), |t| t.start);
            return Err(ParseError::new(
                "expression is nested too deeply",
                self.src,
                offset,
                0,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let mut terms = vec![self.term()?];
        loop {
            match self.peek_kind() {
                Some(TokenKind::Plus) => {
                    self.advance();
                    terms.push(self.term()?);
                }
                Some(TokenKind::Minus) => {
                    self.advance();
                    terms.push(-self.term()?);
                }
                _ => break,
            }
        }
        self.leave();
        Ok(Expr::sum(terms))
    }

    /// term := unary (('*' | '/') unary | power)*
    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut factors = vec![self.unary()?];
        loop {
            match self.peek_kind() {
                Some(TokenKind::Star) => {
                    self.advance();
                    factors.push(self.unary()?);
                }
                Some(TokenKind::Slash) => {
                    self.advance();
                    let divisor = self.unary()?;
                    factors.push(Expr::pow(divisor, Expr::int(-1)));
                }
                // implicit multiplication: an operand directly follows
                Some(TokenKind::Number(_) | TokenKind::Ident(_) | TokenKind::LParen) => {
                    factors.push(self.power()?);
                }
                _ => break,
            }
        }
        Ok(Expr::product(factors))
    }

    /// unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.advance();
                self.enter()?;
                let operand = self.unary()?;
                self.leave();
                Ok(-operand)
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.enter()?;
                let operand = self.unary();
                self.leave();
                operand
            }
            _ => self.power(),
        }
    }

    /// power := primary ('^' unary)?
    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.primary()?;
        if matches!(self.peek_kind(), Some(TokenKind::Caret)) {
            self.advance();
            self.enter()?;
            let exponent = self.unary()?;
            self.leave();
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    /// primary := number | variable | constant | function '(' expression ')' | '(' expression ')'
    fn primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.advance() else {
            return Err(self.error_at_end("expression ends unexpectedly"));
        };
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Num(n)),
            TokenKind::Ident(Symbol::Var(v)) => Ok(Expr::Var(v)),
            TokenKind::Ident(Symbol::Const(c)) => Ok(Expr::Const(c)),
            TokenKind::Ident(Symbol::Func(f)) => {
                if !matches!(self.peek_kind(), Some(TokenKind::LParen)) {
                    return Err(self.error_at(
                        &token,
                        &format!("expected `(` after function `{}`", f.name()),
                    ));
                }
                let arg = self.parenthesized()?;
                Ok(Expr::func(f, arg))
            }
            TokenKind::LParen => {
                self.pos -= 1;
                self.parenthesized()
            }
            _ => Err(self.error_at(&token, "expected a number, variable or `(`")),
        }
    }

    fn parenthesized(&mut self) -> Result<Expr, ParseError> {
        let open = self.advance();
        let inner = self.expression()?;
        match self.advance() {
            Some(Token {
                kind: TokenKind::RParen,
                ..
            }) => Ok(inner),
            Some(token) => Err(self.error_at(&token, "expected `)`")),
            None => match open {
                Some(open) => Err(self.error_at(&open, "unclosed `(`")),
                None => Err(self.error_at_end("expected `)`")),
            },
        }
    }
}
