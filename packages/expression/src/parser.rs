//! Recursive descent parser for formulas, plus constant folding and the
//! `text {formula} text` template form.

use crate::ast::{Ast, AstKind, BinaryOp, UnaryOp};
use crate::builtins;
use crate::error::{FormatError, FormatResult};
use crate::evaluator::{index_into, member_of};
use crate::lexer::{self, SpannedToken, Token};
use crate::ops;
use crate::scope::Scope;
use crate::value::Value;
use std::ops::Range;

/// Parses `text` as one formula and folds it against `scope`. `base` is the
/// offset of `text` inside the enclosing attribute value.
pub fn parse_formula(text: &str, base: usize, scope: &Scope) -> FormatResult<Ast> {
    Ok(fold(parse_ast(text, base)?, scope))
}

/// Parses without folding.
pub fn parse_ast(text: &str, base: usize) -> FormatResult<Ast> {
    let tokens = lexer::tokenize(text, base)?;
    let mut parser = Parser {
        source: text,
        base,
        tokens,
        pos: 0,
    };
    let ast = parser.parse_expression()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(ast),
        Some((token, range)) => Err(FormatError::UnexpectedToken {
            expected: "end of formula".to_string(),
            found: token.to_string(),
            range: range.clone(),
        }),
    }
}

struct Parser<'src> {
    source: &'src str,
    base: usize,
    tokens: Vec<SpannedToken<'src>>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn end_range(&self) -> Range<usize> {
        let end = self.base + self.source.len();
        end..end
    }

    fn advance(&mut self) -> Option<SpannedToken<'src>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token<'_>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token<'_>) -> FormatResult<Range<usize>> {
        match self.advance() {
            Some((token, range)) if token == expected => Ok(range),
            Some((token, range)) => Err(FormatError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.to_string(),
                range,
            }),
            None => Err(FormatError::UnexpectedEnd {
                expected: expected.to_string(),
                range: self.end_range(),
            }),
        }
    }

    fn parse_expression(&mut self) -> FormatResult<Ast> {
        let condition = self.parse_binary(0)?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.parse_expression()?;
        self.expect(Token::Colon)?;
        let otherwise = self.parse_expression()?;
        let range = condition.range.start..otherwise.range.end;
        Ok(Ast::new(
            AstKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            range,
        ))
    }

    /// Precedence climbing over the binary operator levels.
    fn parse_binary(&mut self, level: usize) -> FormatResult<Ast> {
        const LEVELS: usize = 6;
        if level == LEVELS {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|t| binary_op(t, level)) {
            self.pos += 1;
            let right = self.parse_binary(level + 1)?;
            left = Ast::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormatResult<Ast> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Negate,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let (_, range) = self.advance().unwrap_or((Token::Minus, self.end_range()));
        let operand = self.parse_unary()?;
        let range = range.start..operand.range.end;
        Ok(Ast::new(
            AstKind::Unary {
                op,
                operand: Box::new(operand),
            },
            range,
        ))
    }

    fn parse_postfix(&mut self) -> FormatResult<Ast> {
        let mut ast = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Some((Token::Ident(member), range)) => {
                        let range = ast.range.start..range.end;
                        ast = Ast::new(
                            AstKind::Member {
                                object: Box::new(ast),
                                member: member.to_string(),
                            },
                            range,
                        );
                    }
                    Some((token, range)) => {
                        return Err(FormatError::UnexpectedToken {
                            expected: "member name".to_string(),
                            found: token.to_string(),
                            range,
                        })
                    }
                    None => {
                        return Err(FormatError::UnexpectedEnd {
                            expected: "member name".to_string(),
                            range: self.end_range(),
                        })
                    }
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expression()?;
                let close = self.expect(Token::RBracket)?;
                let range = ast.range.start..close.end;
                ast = Ast::new(
                    AstKind::Index {
                        object: Box::new(ast),
                        index: Box::new(index),
                    },
                    range,
                );
            } else {
                return Ok(ast);
            }
        }
    }

    fn parse_primary(&mut self) -> FormatResult<Ast> {
        let Some((token, range)) = self.advance() else {
            return Err(FormatError::UnexpectedEnd {
                expected: "a value".to_string(),
                range: self.end_range(),
            });
        };
        match token {
            Token::Number(n) => {
                let raw = &self.source[range.start - self.base..range.end - self.base];
                let value = if raw.bytes().all(|b| b.is_ascii_digit()) {
                    raw.parse::<i64>().map(Value::Int).unwrap_or(Value::Scalar(n))
                } else {
                    Value::Scalar(n)
                };
                Ok(Ast::literal(value, range))
            }
            Token::Str(raw) => Ok(Ast::literal(Value::String(lexer::unescape(raw)), range)),
            Token::True => Ok(Ast::literal(Value::Bool(true), range)),
            Token::False => Ok(Ast::literal(Value::Bool(false), range)),
            Token::Ident(name) => {
                if !self.eat(&Token::LParen) {
                    return Ok(Ast::name(name, range));
                }
                let (args, close) = self.parse_sequence(Token::RParen)?;
                Ok(Ast::call(name, args, range.start..close.end))
            }
            Token::LParen => {
                let inner = self.parse_expression()?;
                let close = self.expect(Token::RParen)?;
                Ok(Ast::new(inner.kind, range.start..close.end))
            }
            Token::LBracket => {
                let (items, close) = self.parse_sequence(Token::RBracket)?;
                Ok(Ast::new(AstKind::List(items), range.start..close.end))
            }
            other => Err(FormatError::UnexpectedToken {
                expected: "a value".to_string(),
                found: other.to_string(),
                range,
            }),
        }
    }

    /// Comma separated expressions up to `close` (already past the opener).
    fn parse_sequence(&mut self, close: Token<'_>) -> FormatResult<(Vec<Ast>, Range<usize>)> {
        let mut items = Vec::new();
        if let Some((token, range)) = self.tokens.get(self.pos) {
            if *token == close {
                let range = range.clone();
                self.pos += 1;
                return Ok((items, range));
            }
        }
        loop {
            items.push(self.parse_expression()?);
            if !self.eat(&Token::Comma) {
                let range = self.expect(close)?;
                return Ok((items, range));
            }
        }
    }
}

fn binary_op(token: &Token<'_>, level: usize) -> Option<BinaryOp> {
    let op = match (level, token) {
        (0, Token::OrOr) => BinaryOp::Or,
        (1, Token::AndAnd) => BinaryOp::And,
        (2, Token::EqEq) => BinaryOp::Equals,
        (2, Token::NotEq) => BinaryOp::NotEquals,
        (3, Token::Lt) => BinaryOp::LessThan,
        (3, Token::LtEq) => BinaryOp::LessThanOrEqual,
        (3, Token::Gt) => BinaryOp::GreaterThan,
        (3, Token::GtEq) => BinaryOp::GreaterThanOrEqual,
        (4, Token::Plus) => BinaryOp::Add,
        (4, Token::Minus) => BinaryOp::Subtract,
        (5, Token::Star) => BinaryOp::Multiply,
        (5, Token::Slash) => BinaryOp::Divide,
        (5, Token::Percent) => BinaryOp::Modulo,
        _ => return None,
    };
    Some(op)
}

/// Folds literal-only subtrees. Names are never folded except builtin
/// constants that nothing in `scope` shadows, and host functions are never
/// called. Operations that fail (say, division by zero) stay unfolded so
/// the error surfaces at evaluation.
pub fn fold(ast: Ast, scope: &Scope) -> Ast {
    let range = ast.range.clone();
    let kind = match ast.kind {
        AstKind::Literal(_) => return ast,
        AstKind::Name(name) => {
            if !scope.shadows(&name) {
                if let Some(value) = builtins::constant(&name) {
                    return Ast::literal(value, range);
                }
            }
            AstKind::Name(name)
        }
        AstKind::List(items) => {
            let items: Vec<Ast> = items.into_iter().map(|i| fold(i, scope)).collect();
            match literals(&items) {
                Some(values) => return Ast::literal(Value::List(values), range),
                None => AstKind::List(items),
            }
        }
        AstKind::Unary { op, operand } => {
            let operand = fold(*operand, scope);
            if let Some(Ok(value)) = operand.as_literal().map(|v| ops::unary(op, v.clone())) {
                return Ast::literal(value, range);
            }
            AstKind::Unary {
                op,
                operand: Box::new(operand),
            }
        }
        AstKind::Binary { op, left, right } => {
            let left = fold(*left, scope);
            let right = fold(*right, scope);
            if let (Some(a), Some(b)) = (left.as_literal(), right.as_literal()) {
                if let Ok(value) = ops::binary(op, a.clone(), b.clone()) {
                    return Ast::literal(value, range);
                }
            }
            AstKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        AstKind::Conditional {
            condition,
            then,
            otherwise,
        } => {
            let condition = fold(*condition, scope);
            let then = fold(*then, scope);
            let otherwise = fold(*otherwise, scope);
            if let (Some(Value::Bool(c)), true, true) =
                (condition.as_literal(), then.is_literal(), otherwise.is_literal())
            {
                return if *c { then } else { otherwise };
            }
            AstKind::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        }
        AstKind::Call { function, args } => {
            let args: Vec<Ast> = args.into_iter().map(|a| fold(a, scope)).collect();
            if builtins::is_builtin(&function) && !scope.shadows(&function) {
                if let Some(values) = literals(&args) {
                    if let Ok(value) = builtins::call(&function, values) {
                        return Ast::literal(value, range);
                    }
                }
            }
            AstKind::Call { function, args }
        }
        AstKind::Member { object, member } => {
            let object = fold(*object, scope);
            if let Some(Ok(value)) = object.as_literal().map(|v| member_of(v.clone(), &member)) {
                return Ast::literal(value, range);
            }
            AstKind::Member {
                object: Box::new(object),
                member,
            }
        }
        AstKind::Index { object, index } => {
            let object = fold(*object, scope);
            let index = fold(*index, scope);
            if let (Some(o), Some(i)) = (object.as_literal(), index.as_literal()) {
                if let Ok(value) = index_into(o.clone(), i.clone()) {
                    return Ast::literal(value, range);
                }
            }
            AstKind::Index {
                object: Box::new(object),
                index: Box::new(index),
            }
        }
        AstKind::Interpolation(parts) => {
            let parts: Vec<Ast> = parts.into_iter().map(|p| fold(p, scope)).collect();
            match literals(&parts) {
                Some(values) => {
                    let text: String = values.iter().map(ToString::to_string).collect();
                    return Ast::literal(Value::String(text), range);
                }
                None => AstKind::Interpolation(parts),
            }
        }
    };
    Ast::new(kind, range)
}

fn literals(items: &[Ast]) -> Option<Vec<Value>> {
    items.iter().map(|i| i.as_literal().cloned()).collect()
}

/// Index of the `}` closing the `{` at `open`, skipping quoted strings.
pub(crate) fn find_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// If the whole (trimmed) text is a single `{formula}`, returns the inner
/// text and its offset.
pub fn braced(text: &str) -> Option<(&str, usize)> {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len();
    if start >= end || !text[start..].starts_with('{') {
        return None;
    }
    let close = find_close(text, start)?;
    (close + 1 == end).then(|| (&text[start + 1..close], start + 1))
}

/// Parses interpolated text: `Hello {name}`; `{{` and `}}` are literal
/// braces. Text without formulas yields a string literal.
pub fn parse_template(text: &str, base: usize, scope: &Scope) -> FormatResult<Ast> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut literal_start = 0;
    let mut i = 0;
    let bytes = text.as_bytes();

    while i < text.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                literal.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                literal.push('}');
                i += 2;
            }
            b'}' => {
                return Err(FormatError::UnmatchedBrace {
                    range: base + i..base + i + 1,
                })
            }
            b'{' => {
                let close = find_close(text, i).ok_or(FormatError::UnclosedBrace {
                    range: base + i..base + i + 1,
                })?;
                if !literal.is_empty() {
                    parts.push(Ast::literal(
                        Value::String(std::mem::take(&mut literal)),
                        base + literal_start..base + i,
                    ));
                }
                parts.push(parse_ast(&text[i + 1..close], base + i + 1)?);
                i = close + 1;
                literal_start = i;
            }
            _ => {
                let c = text[i..].chars().next().unwrap_or_default();
                literal.push(c);
                i += c.len_utf8().max(1);
            }
        }
    }
    if !literal.is_empty() || parts.is_empty() {
        parts.push(Ast::literal(
            Value::String(literal),
            base + literal_start..base + text.len(),
        ));
    }

    let ast = if parts.len() == 1 && parts[0].is_literal() {
        parts.remove(0)
    } else {
        Ast::new(AstKind::Interpolation(parts), base..base + text.len())
    };
    Ok(fold(ast, scope))
}
