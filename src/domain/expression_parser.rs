//! Factor expression parser.
//!
//! Recursive descent parser for the expression grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
//! ```
//!
//! Operator names are resolved against the registry while parsing, and each
//! argument is parsed according to the operator's signature. Column names are
//! left unresolved here; the evaluator binds them against a panel.

use crate::domain::error::{FactorError, ParseError};
use crate::domain::expression::{Argument, BinaryOp, Expr, UnaryOp};
use crate::domain::operator::{Operator, ParamKind};

/// Maximum nesting of parentheses, calls and unary minus.
pub const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

fn grammar(message: impl Into<String>, position: usize) -> FactorError {
    FactorError::Grammar(ParseError {
        message: message.into(),
        position,
    })
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn describe_next(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), FactorError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(grammar(
                format!("expected '{}', found {}", expected, self.describe_next()),
                self.pos,
            )),
        }
    }

    fn descend(&mut self) -> Result<(), FactorError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(grammar(
                format!("expression nested deeper than {} levels", MAX_DEPTH),
                self.pos,
            ));
        }
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn read_digits(&mut self) -> usize {
        let mut digits = 0;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else {
                break;
            }
        }
        digits
    }

    fn parse_number(&mut self) -> Result<f64, FactorError> {
        self.skip_whitespace();
        let start = self.pos;

        let mut digits = self.read_digits();
        if self.peek() == Some('.') {
            self.advance();
            digits += self.read_digits();
        }
        if digits == 0 {
            return Err(grammar("expected number", start));
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            let exp_start = self.pos;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            if self.read_digits() == 0 {
                return Err(grammar("expected exponent digits", exp_start));
            }
        }

        if self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(grammar(
                format!("invalid number: {}", self.peek_token(start)),
                start,
            ));
        }

        let num_str = &self.input[start..self.pos];
        num_str
            .parse::<f64>()
            .map_err(|_| grammar(format!("invalid number: {}", num_str), start))
    }

    /// Text from `start` up to the next delimiter, for error messages.
    fn peek_token(&self, start: usize) -> &'a str {
        let rest = &self.input[start..];
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn parse_expression(&mut self) -> Result<Expr, FactorError> {
        self.descend()?;
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.ascend();
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, FactorError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, FactorError> {
        self.skip_whitespace();
        if self.peek() == Some('-') {
            self.advance();
            self.descend()?;
            let operand = self.parse_unary()?;
            self.ascend();
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FactorError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' => Ok(Expr::Literal(self.parse_number()?)),
            Some('(') => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_char(')')?;
                Ok(expr)
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.parse_reference(),
            _ => Err(grammar(
                format!("expected expression, found {}", self.describe_next()),
                self.pos,
            )),
        }
    }

    fn parse_reference(&mut self) -> Result<Expr, FactorError> {
        let start = self.pos;
        let name = self.read_identifier();

        if self.peek() == Some('.') {
            return Err(grammar("attribute access is not supported", self.pos));
        }

        self.skip_whitespace();
        if self.peek() == Some('(') {
            return match Operator::from_name(name) {
                Some(operator) => self.parse_call(operator),
                None => Err(FactorError::UnresolvedReference {
                    name: name.to_string(),
                    position: start,
                }),
            };
        }

        if Operator::is_reserved(name) {
            return Err(grammar(
                format!("operator '{}' must be called with arguments", name),
                start,
            ));
        }

        Ok(Expr::Column {
            name: name.to_string(),
            position: start,
        })
    }

    fn parse_call(&mut self, operator: Operator) -> Result<Expr, FactorError> {
        self.expect_char('(')?;
        self.descend()?;

        let signature = operator.signature();
        let arity = signature.arity();
        let arity_error = |found: &str, position: usize| {
            grammar(
                format!(
                    "{} expects {} argument{} {}, found {}",
                    operator,
                    arity,
                    if arity == 1 { "" } else { "s" },
                    signature,
                    found
                ),
                position,
            )
        };

        let mut args = Vec::with_capacity(arity);
        for (i, kind) in signature.params.iter().enumerate() {
            self.skip_whitespace();
            if i > 0 {
                if self.peek() == Some(')') {
                    return Err(arity_error(&i.to_string(), self.pos));
                }
                self.expect_char(',')?;
                self.skip_whitespace();
            }
            if self.peek() == Some(')') {
                return Err(arity_error(&i.to_string(), self.pos));
            }
            args.push(self.parse_argument(operator, *kind)?);
        }

        self.skip_whitespace();
        if self.peek() == Some(',') {
            return Err(arity_error("more", self.pos));
        }
        self.expect_char(')')?;
        self.ascend();

        Ok(Expr::Call { operator, args })
    }

    fn parse_argument(
        &mut self,
        operator: Operator,
        kind: ParamKind,
    ) -> Result<Argument, FactorError> {
        match kind {
            ParamKind::Series => Ok(Argument::Series(self.parse_expression()?)),
            ParamKind::Window => self.parse_window(operator).map(Argument::Window),
            ParamKind::Scalar => self.parse_scalar(operator).map(Argument::Scalar),
        }
    }

    fn parse_window(&mut self, operator: Operator) -> Result<usize, FactorError> {
        self.skip_whitespace();
        let start = self.pos;
        let digits = self.read_digits();
        let trailing = self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if digits == 0 || trailing {
            return Err(grammar(
                format!(
                    "{} window must be a positive integer literal, found '{}'",
                    operator,
                    self.peek_token(start)
                ),
                start,
            ));
        }

        let num_str = &self.input[start..self.pos];
        let window = num_str
            .parse::<usize>()
            .map_err(|_| grammar(format!("invalid integer: {}", num_str), start))?;
        if window == 0 {
            return Err(grammar(
                format!("{} window must be at least 1", operator),
                start,
            ));
        }
        Ok(window)
    }

    fn parse_scalar(&mut self, operator: Operator) -> Result<f64, FactorError> {
        self.skip_whitespace();
        let negative = self.peek() == Some('-');
        if negative {
            self.advance();
        }
        self.skip_whitespace();
        let start = self.pos;
        if !self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            return Err(grammar(
                format!("{} expects a numeric literal, found {}", operator, self.describe_next()),
                start,
            ));
        }
        let value = self.parse_number()?;
        Ok(if negative { -value } else { value })
    }

    fn parse(&mut self) -> Result<Expr, FactorError> {
        if let Some((position, ch)) = self.input.char_indices().find(|(_, c)| !c.is_ascii()) {
            return Err(grammar(
                format!("non-ASCII character '{}'", ch),
                position,
            ));
        }

        let expr = self.parse_expression()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(grammar(
                format!("unexpected input after expression: '{}'", self.remaining()),
                self.pos,
            ));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, FactorError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
