//! Parser for Loki/PromQL-style label matcher expressions, e.g.
//! `{app="api", env!="dev", job=~"ingest|index"}`.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use lokube_types::{LabelMatcher, MatchOp, Selector};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatcherParseError {
    #[error("expected {expected} at position {position}")]
    Unexpected {
        expected: &'static str,
        position: usize,
    },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid escape sequence in string literal")]
    InvalidEscape,

    #[error("invalid label matcher regex: {0}")]
    InvalidRegex(String),
}

/// Parses a matcher expression into a selector. `{}` selects everything.
pub fn parse_matchers(input: &str) -> Result<Selector, MatcherParseError> {
    Parser {
        input,
        chars: input.char_indices().peekable(),
    }
    .run()
}

struct Parser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl Parser<'_> {
    fn run(&mut self) -> Result<Selector, MatcherParseError> {
        self.skip_ws();
        self.expect('{', "'{'")?;
        let mut matchers = Vec::new();
        self.skip_ws();
        if self.eat('}') {
            self.end()?;
            return Ok(Selector::new(matchers));
        }
        loop {
            self.skip_ws();
            let name = self.ident()?;
            self.skip_ws();
            let op = self.op()?;
            self.skip_ws();
            let value = self.string()?;
            matchers.push(
                LabelMatcher::new(name, op, value)
                    .map_err(|err| MatcherParseError::InvalidRegex(err.to_string()))?,
            );
            self.skip_ws();
            if self.eat(',') {
                self.skip_ws();
                // Trailing comma before the closing brace is allowed.
                if self.eat('}') {
                    break;
                }
                continue;
            }
            if self.eat('}') {
                break;
            }
            return Err(self.unexpected("',' or '}'"));
        }
        self.end()?;
        Ok(Selector::new(matchers))
    }

    fn position(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn unexpected(&mut self, expected: &'static str) -> MatcherParseError {
        MatcherParseError::Unexpected {
            expected,
            position: self.position(),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, want: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == want) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: char, expected: &'static str) -> Result<(), MatcherParseError> {
        if self.eat(want) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn end(&mut self) -> Result<(), MatcherParseError> {
        self.skip_ws();
        if self.chars.peek().is_none() {
            Ok(())
        } else {
            Err(self.unexpected("end of input"))
        }
    }

    fn ident(&mut self) -> Result<String, MatcherParseError> {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.peek().copied() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            self.chars.next();
            name.push(c);
        }
        if name.is_empty() {
            return Err(self.unexpected("label name"));
        }
        Ok(name)
    }

    fn op(&mut self) -> Result<MatchOp, MatcherParseError> {
        if self.eat('=') {
            if self.eat('~') {
                return Ok(MatchOp::Re);
            }
            return Ok(MatchOp::Eq);
        }
        if self.eat('!') {
            if self.eat('=') {
                return Ok(MatchOp::Neq);
            }
            if self.eat('~') {
                return Ok(MatchOp::Nre);
            }
            return Err(self.unexpected("'=' or '~'"));
        }
        Err(self.unexpected("matcher operator"))
    }

    fn string(&mut self) -> Result<String, MatcherParseError> {
        self.expect('"', "'\"'")?;
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(MatcherParseError::UnterminatedString),
                Some((_, '"')) => return Ok(value),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, '"')) => value.push('"'),
                    Some((_, '\\')) => value.push('\\'),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    _ => return Err(MatcherParseError::InvalidEscape),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }
}
