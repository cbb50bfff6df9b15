//! PEP 508 environment marker grammar and evaluation (§4.5).
//!
//! ```text
//! marker_or    = marker_and ("or" marker_or)?
//! marker_and   = marker_expr ("and" marker_and)?
//! marker_expr  = marker_var op marker_var | "(" marker_or ")"
//! marker_var   = wsp* (known_name | python_str)
//! op           = "<=" | "<" | "!=" | "==" | ">=" | ">" | "~=" | "===" |
//!                "in" | "not" wsp+ "in"
//! ```

use std::collections::HashSet;
use std::str::FromStr;

use crate::error::{PypiError, Result};
use pep440_rs::{Version, VersionSpecifiers};

/// The canonical Python runtime compiled into the core — the constant
/// platform values markers are evaluated against.
pub struct Environment;

impl Environment {
    pub fn value(name: &str) -> Option<&'static str> {
        match name {
            "os_name" => Some("posix"),
            "sys_platform" => Some("linux"),
            "platform_machine" => Some("x86_64"),
            "platform_python_implementation" => Some("CPython"),
            "platform_release" => Some("6.1.0"),
            "platform_system" => Some("Linux"),
            "platform_version" => Some("#1 SMP"),
            "python_version" => Some("3.11"),
            "python_full_version" => Some("3.11.8"),
            "implementation_name" => Some("cpython"),
            "implementation_version" => Some("3.11.8"),
            _ => None,
        }
    }
}

const KNOWN_NAMES: &[&str] = &[
    "os_name",
    "sys_platform",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_version",
    "python_full_version",
    "implementation_name",
    "implementation_version",
    "extra",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Var {
    Name(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Le,
    Lt,
    Ne,
    Eq,
    Ge,
    Gt,
    Compatible,
    Arbitrary,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Or(Box<Marker>, Box<Marker>),
    And(Box<Marker>, Box<Marker>),
    Compare(Var, Op, Var),
}

struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.text[self.pos..].starts_with(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek_word(&mut self, word: &str) -> bool {
        self.skip_ws();
        self.text[self.pos..].starts_with(word)
            && self.text[self.pos + word.len()..]
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric() && c != '_')
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.peek_word(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn eat_char(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.text[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }
}

pub fn parse(text: &str) -> Result<Marker> {
    let mut tokens = Tokens::new(text);
    let m = parse_or(&mut tokens)?;
    tokens.skip_ws();
    if !tokens.rest().is_empty() {
        return Err(PypiError::MarkerParse(format!(
            "trailing input after marker: {:?}",
            tokens.rest()
        )));
    }
    Ok(m)
}

fn parse_or(tokens: &mut Tokens) -> Result<Marker> {
    let lhs = parse_and(tokens)?;
    if tokens.eat_word("or") {
        let rhs = parse_or(tokens)?;
        return Ok(Marker::Or(Box::new(lhs), Box::new(rhs)));
    }
    Ok(lhs)
}

fn parse_and(tokens: &mut Tokens) -> Result<Marker> {
    let lhs = parse_expr(tokens)?;
    if tokens.eat_word("and") {
        let rhs = parse_and(tokens)?;
        return Ok(Marker::And(Box::new(lhs), Box::new(rhs)));
    }
    Ok(lhs)
}

fn parse_expr(tokens: &mut Tokens) -> Result<Marker> {
    if tokens.eat_char('(') {
        let inner = parse_or(tokens)?;
        if !tokens.eat_char(')') {
            return Err(PypiError::MarkerParse("unterminated ( in marker".into()));
        }
        return Ok(inner);
    }
    let lhs = parse_var(tokens)?;
    let op = parse_op(tokens)?;
    let rhs = parse_var(tokens)?;
    if op == Op::Compatible
        && (Version::from_str(&resolve(&lhs)).is_err() || Version::from_str(&resolve(&rhs)).is_err())
    {
        return Err(PypiError::MarkerParse(
            "'~=' requires both operands to be versions".into(),
        ));
    }
    Ok(Marker::Compare(lhs, op, rhs))
}

fn parse_var(tokens: &mut Tokens) -> Result<Var> {
    tokens.skip_ws();
    let rest = tokens.rest();
    if rest.starts_with('\'') || rest.starts_with('"') {
        let quote = rest.chars().next().unwrap();
        let body = &rest[1..];
        let Some(end) = body.find(quote) else {
            return Err(PypiError::MarkerParse("unterminated string in marker".into()));
        };
        let value = body[..end].to_string();
        tokens.pos += 1 + end + 1;
        return Ok(Var::Str(value));
    }
    for name in KNOWN_NAMES {
        if tokens.peek_word(name) {
            tokens.eat_word(name);
            return Ok(Var::Name((*name).to_string()));
        }
    }
    Err(PypiError::MarkerParse(format!(
        "expected a marker variable at {:?}",
        tokens.rest()
    )))
}

fn parse_op(tokens: &mut Tokens) -> Result<Op> {
    tokens.skip_ws();
    let rest = tokens.rest();
    let (op, len) = if rest.starts_with("<=") {
        (Op::Le, 2)
    } else if rest.starts_with(">=") {
        (Op::Ge, 2)
    } else if rest.starts_with("==") {
        (Op::Eq, 2)
    } else if rest.starts_with("!=") {
        (Op::Ne, 2)
    } else if rest.starts_with("~=") {
        (Op::Compatible, 2)
    } else if rest.starts_with("===") {
        (Op::Arbitrary, 3)
    } else if rest.starts_with('<') {
        (Op::Lt, 1)
    } else if rest.starts_with('>') {
        (Op::Gt, 1)
    } else if tokens.peek_word("not") {
        tokens.eat_word("not");
        tokens.skip_ws();
        if !tokens.eat_word("in") {
            return Err(PypiError::MarkerParse("expected 'in' after 'not'".into()));
        }
        return Ok(Op::NotIn);
    } else if tokens.peek_word("in") {
        tokens.eat_word("in");
        return Ok(Op::In);
    } else {
        return Err(PypiError::MarkerParse(format!(
            "expected a comparison operator at {:?}",
            tokens.rest()
        )));
    };
    tokens.pos += len;
    Ok(op)
}

/// Evaluate a parsed marker against the compiled-in environment and the
/// extras currently requested for this criterion.
pub fn eval(marker: &Marker, extras: &HashSet<String>) -> Result<bool> {
    match marker {
        Marker::Or(a, b) => Ok(eval(a, extras)? || eval(b, extras)?),
        Marker::And(a, b) => Ok(eval(a, extras)? && eval(b, extras)?),
        Marker::Compare(lhs, op, rhs) => eval_compare(lhs, op, rhs, extras),
    }
}

fn var_is_extra(var: &Var) -> bool {
    matches!(var, Var::Name(n) if n == "extra")
}

fn resolve(var: &Var) -> String {
    match var {
        Var::Str(s) => s.clone(),
        Var::Name(n) => Environment::value(n).unwrap_or_default().to_string(),
    }
}

fn eval_compare(lhs: &Var, op: &Op, rhs: &Var, extras: &HashSet<String>) -> Result<bool> {
    if var_is_extra(lhs) || var_is_extra(rhs) {
        if !matches!(op, Op::Eq) {
            return Err(PypiError::MarkerParse(
                "'extra' may only be compared with '=='".into(),
            ));
        }
        let other = if var_is_extra(lhs) { resolve(rhs) } else { resolve(lhs) };
        return Ok(extras.contains(&other));
    }

    let (left, right) = (resolve(lhs), resolve(rhs));

    if !matches!(op, Op::Arbitrary) {
        if let (Ok(lv), Ok(rv)) = (Version::from_str(&left), Version::from_str(&right)) {
            return Ok(match op {
                Op::Le => lv <= rv,
                Op::Lt => lv < rv,
                Op::Eq => lv == rv,
                Op::Ne => lv != rv,
                Op::Ge => lv >= rv,
                Op::Gt => lv > rv,
                Op::Compatible => {
                    let spec = VersionSpecifiers::from_str(&format!("~={right}"))
                        .map_err(|e| PypiError::MarkerParse(e.to_string()))?;
                    spec.contains(&lv)
                }
                Op::Arbitrary | Op::In | Op::NotIn => unreachable!("handled elsewhere"),
            });
        }
        debug_assert!(!matches!(op, Op::Compatible), "parse rejects non-version '~=' operands");
    }

    Ok(match op {
        Op::Le => left <= right,
        Op::Lt => left < right,
        Op::Eq | Op::Arbitrary => left == right,
        Op::Ne => left != right,
        Op::Ge => left >= right,
        Op::Gt => left > right,
        Op::In => right.contains(&left),
        Op::NotIn => !right.contains(&left),
        Op::Compatible => unreachable!("handled above"),
    })
}
