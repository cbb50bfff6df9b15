//! Recursive-descent parser for the SPDX license expression grammar (§4.6):
//!
//! ```text
//! expr    = or
//! or      = and (("OR" | "/") and)*          ; "/" is the deprecated OR
//! and     = with ("AND" with)*
//! with    = "(" or ")" | simple ("WITH" exception-id)?
//! simple  = license-id "+"?
//! ```
//!
//! Identifiers match `[A-Za-z0-9.-]+`; `AND`/`OR`/`WITH` are recognized
//! only in exactly that case, matching the grammar's keyword spelling.

use crate::error::{Result, SpdxError};
use crate::types::LicenseExpression;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Slash,
    Word(String),
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-'
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>> {
    let bytes = text.as_bytes();
    let mut pos = 0usize;
    let mut tokens = Vec::new();
    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;
        match c {
            '(' => {
                tokens.push((Token::LParen, start));
                pos += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                pos += 1;
            }
            '/' => {
                tokens.push((Token::Slash, start));
                pos += 1;
            }
            _ if is_id_char(c) => {
                while pos < bytes.len() && is_id_char(bytes[pos] as char) {
                    pos += 1;
                }
                let mut word = text[start..pos].to_string();
                if pos < bytes.len() && bytes[pos] as char == '+' {
                    word.push('+');
                    pos += 1;
                }
                tokens.push((Token::Word(word), start));
            }
            other => return Err(SpdxError::UnexpectedToken { found: other.to_string(), pos: start }),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn pos_at(&self, index: usize) -> usize {
        self.tokens.get(index).map_or(self.end, |(_, p)| *p)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<LicenseExpression> {
        let mut parts = vec![self.parse_and()?];
        loop {
            if self.peek_is_word("OR") {
                self.advance();
                parts.push(self.parse_and()?);
            } else if matches!(self.peek(), Some(Token::Slash)) {
                self.advance();
                parts.push(self.parse_and()?);
            } else {
                break;
            }
        }
        Ok(if parts.len() == 1 { parts.pop().unwrap() } else { LicenseExpression::Or(parts) })
    }

    fn parse_and(&mut self) -> Result<LicenseExpression> {
        let mut parts = vec![self.parse_with()?];
        while self.peek_is_word("AND") {
            self.advance();
            parts.push(self.parse_with()?);
        }
        Ok(if parts.len() == 1 { parts.pop().unwrap() } else { LicenseExpression::And(parts) })
    }

    fn parse_with(&mut self) -> Result<LicenseExpression> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.advance();
            let inner = self.parse_or()?;
            match self.advance() {
                Some(Token::RParen) => return Ok(inner),
                _ => return Err(SpdxError::UnmatchedParen { pos: self.pos_at(self.pos.saturating_sub(1)) }),
            }
        }

        let simple = self.parse_simple()?;
        if self.peek_is_word("WITH") {
            self.advance();
            let exception_pos = self.pos_at(self.pos);
            return match self.advance() {
                Some(Token::Word(word)) if !is_keyword(&word) => {
                    Ok(LicenseExpression::With { license: Box::new(simple), exception: word })
                }
                Some(tok) => Err(SpdxError::UnexpectedToken { found: format!("{tok:?}"), pos: exception_pos }),
                None => Err(SpdxError::UnexpectedEnd),
            };
        }
        Ok(simple)
    }

    fn parse_simple(&mut self) -> Result<LicenseExpression> {
        let token_pos = self.pos_at(self.pos);
        match self.advance() {
            Some(Token::Word(word)) if !is_keyword(&word) => {
                let (id, or_later) = match word.strip_suffix('+') {
                    Some(stripped) => (stripped.to_string(), true),
                    None => (word, false),
                };
                Ok(LicenseExpression::License { id, or_later })
            }
            Some(tok) => Err(SpdxError::UnexpectedToken { found: format!("{tok:?}"), pos: token_pos }),
            None => Err(SpdxError::UnexpectedEnd),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "AND" | "OR" | "WITH")
}

pub fn parse_license_expression(text: &str) -> Result<LicenseExpression> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(SpdxError::Empty);
    }
    let end = text.len();
    let mut parser = Parser { tokens, pos: 0, end };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        let (tok, pos) = &parser.tokens[parser.pos];
        return Err(SpdxError::TrailingInput { found: format!("{tok:?}"), pos: *pos });
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_license_id() {
        let expr = parse_license_expression("MIT").unwrap();
        assert_eq!(expr, LicenseExpression::License { id: "MIT".into(), or_later: false });
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_license_expression("LGPL-2.1 OR MIT AND BSD-3-Clause").unwrap();
        let LicenseExpression::Or(parts) = expr else { panic!("expected Or at the top level") };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[1], LicenseExpression::And(inner) if inner.len() == 2));
    }

    #[test]
    fn parens_group_an_or_inside_an_and() {
        let expr = parse_license_expression("MIT AND (Apache-2.0 OR BSD-3-Clause)").unwrap();
        let LicenseExpression::And(parts) = expr else { panic!("expected And at the top level") };
        assert!(matches!(&parts[1], LicenseExpression::Or(inner) if inner.len() == 2));
    }

    #[test]
    fn with_clause_attaches_to_the_preceding_license() {
        let expr = parse_license_expression("GPL-2.0-only WITH Classpath-exception-2.0").unwrap();
        assert_eq!(
            expr,
            LicenseExpression::With {
                license: Box::new(LicenseExpression::License { id: "GPL-2.0-only".into(), or_later: false }),
                exception: "Classpath-exception-2.0".into(),
            }
        );
    }

    #[test]
    fn or_later_suffix_sets_the_flag() {
        let expr = parse_license_expression("GPL-2.0-only+").unwrap();
        assert_eq!(expr, LicenseExpression::License { id: "GPL-2.0-only".into(), or_later: true });
    }

    #[test]
    fn slash_is_a_deprecated_or() {
        let expr = parse_license_expression("MIT/Apache-2.0").unwrap();
        assert!(matches!(expr, LicenseExpression::Or(parts) if parts.len() == 2));
    }

    #[test]
    fn unmatched_open_paren_is_rejected() {
        let err = parse_license_expression("(MIT AND Apache-2.0").unwrap_err();
        assert!(matches!(err, SpdxError::UnmatchedParen { .. }));
    }

    #[test]
    fn trailing_tokens_after_a_complete_expression_are_rejected() {
        let err = parse_license_expression("MIT)").unwrap_err();
        assert!(matches!(err, SpdxError::TrailingInput { .. }));
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(matches!(parse_license_expression("   "), Err(SpdxError::Empty)));
    }
}
