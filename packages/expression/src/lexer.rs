//! Lexer for formulas (the text between `{` and `}`) using logos

use crate::error::{FormatError, FormatResult};
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token<'src> {
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    #[regex(r"'([^'\\]|\\.)*'", |lex| { let s = lex.slice(); &s[1..s.len() - 1] })]
    Str(&'src str),

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::True => "true",
            Token::False => "false",
            Token::Ident(name) => return write!(f, "'{}'", name),
            Token::Number(n) => return write!(f, "{}", n),
            Token::Str(s) => return write!(f, "\"{}\"", s),
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
        };
        write!(f, "'{}'", text)
    }
}

pub type SpannedToken<'src> = (Token<'src>, Range<usize>);

/// Tokenizes `source`, shifting every range by `base` so ranges refer to the
/// enclosing attribute text.
pub fn tokenize(source: &str, base: usize) -> FormatResult<Vec<SpannedToken<'_>>> {
    Token::lexer(source)
        .spanned()
        .map(|(token, range)| {
            let range = range.start + base..range.end + base;
            match token {
                Ok(token) => Ok((token, range)),
                Err(()) => Err(FormatError::UnexpectedCharacter { range }),
            }
        })
        .collect()
}

/// Resolves backslash escapes in a string literal body.
pub fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("width * 0.5 + .25", 0).unwrap();
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Ident("width"),
                Token::Star,
                Token::Number(0.5),
                Token::Plus,
                Token::Number(0.25),
            ]
        );
    }

    #[test]
    fn test_ranges_are_shifted() {
        let tokens = tokenize("a<=b", 10).unwrap();
        assert_eq!(tokens[1], (Token::LtEq, 11..13));
    }

    #[test]
    fn test_strings_and_escapes() {
        let tokens = tokenize(r#"'it\'s' "x""#, 0).unwrap();
        assert_eq!(tokens[0].0, Token::Str(r"it\'s"));
        assert_eq!(unescape(r"it\'s"), "it's");
        assert_eq!(tokens[1].0, Token::Str("x"));
    }

    #[test]
    fn test_bad_character() {
        assert_eq!(
            tokenize("a # b", 3),
            Err(FormatError::UnexpectedCharacter { range: 5..6 })
        );
    }
}
