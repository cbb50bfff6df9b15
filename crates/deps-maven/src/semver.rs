//! `MavenSemver`: Maven's `ComparableVersion` tokenized dialect plus its
//! bracket version-range syntax. No crate in the workspace's dependency
//! stack speaks either, so both are hand-rolled here.

use std::cmp::Ordering;

use deps_core::{Difference, SemverSystem};

#[derive(Debug, Default)]
pub struct MavenSemver;

/// One piece of a dot/hyphen-split version string: either a numeric run
/// or a qualifier word. Maven alternates between the two kinds at every
/// transition between digit and non-digit, not just at `.`/`-`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Numeric(u64),
    Qualifier(String),
}

/// Maven's well-known qualifier order, lowest to highest. An unrecognized
/// qualifier sorts after all of these and before nothing; ties among
/// unrecognized qualifiers fall back to lexicographic order.
fn qualifier_rank(q: &str) -> Option<i32> {
    match q.to_lowercase().as_str() {
        "alpha" => Some(0),
        "beta" => Some(1),
        "milestone" => Some(2),
        "rc" | "cr" => Some(3),
        "snapshot" => Some(4),
        "" | "ga" | "final" | "release" => Some(5),
        "sp" => Some(6),
        _ => None,
    }
}

fn tokenize(version: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;

    let mut flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        let token = if let Ok(n) = current.parse::<u64>() {
            Token::Numeric(n)
        } else {
            Token::Qualifier(std::mem::take(current).to_lowercase())
        };
        if !matches!(token, Token::Qualifier(ref s) if s.is_empty()) {
            tokens.push(token);
        }
        current.clear();
    };

    for c in version.chars() {
        if c == '.' || c == '-' {
            flush(&mut current, &mut tokens);
            current_is_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if let Some(prev) = current_is_digit {
            if prev != is_digit {
                flush(&mut current, &mut tokens);
            }
        }
        current_is_digit = Some(is_digit);
        current.push(c);
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn token_cmp(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Numeric(x), Token::Numeric(y)) => x.cmp(y),
        (Token::Qualifier(x), Token::Qualifier(y)) => {
            match (qualifier_rank(x), qualifier_rank(y)) {
                (Some(rx), Some(ry)) => rx.cmp(&ry),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => x.cmp(y),
            }
        }
        // A numeric token outranks a qualifier token at the same
        // position (1.0-alpha < 1.0, 1.0 < 1.0-1) except qualifiers
        // that rank below "release" (alpha/beta/milestone/rc/snapshot),
        // which still sort before the implied trailing zero.
        (Token::Numeric(_), Token::Qualifier(q)) => match qualifier_rank(q) {
            Some(r) if r < 5 => Ordering::Greater,
            _ => Ordering::Less,
        },
        (Token::Qualifier(q), Token::Numeric(_)) => match qualifier_rank(q) {
            Some(r) if r < 5 => Ordering::Less,
            _ => Ordering::Greater,
        },
    }
}

fn compare_tokens(a: &[Token], b: &[Token]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ta = a.get(i).cloned().unwrap_or(Token::Numeric(0));
        let tb = b.get(i).cloned().unwrap_or(Token::Numeric(0));
        let ord = token_cmp(&ta, &tb);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// `[1.0,2.0)`, `[1.5,)`, `(,1.0]`, a bare version naming a soft
/// requirement, or `[1.0]` for a hard pin.
#[derive(Debug, Clone)]
struct Range {
    lower: Option<(String, bool)>,
    upper: Option<(String, bool)>,
}

fn parse_range(spec: &str) -> Option<Range> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }
    let first = spec.chars().next()?;
    let last = spec.chars().last()?;
    if first != '[' && first != '(' {
        // Soft requirement: matches only itself exactly.
        return Some(Range { lower: Some((spec.to_string(), true)), upper: Some((spec.to_string(), true)) });
    }
    if (first != '[' && first != '(') || (last != ']' && last != ')') {
        return None;
    }
    let lower_inclusive = first == '[';
    let upper_inclusive = last == ']';
    let inner = &spec[1..spec.len() - 1];
    let Some((lo, hi)) = inner.split_once(',') else {
        return None;
    };
    let lower = if lo.trim().is_empty() { None } else { Some((lo.trim().to_string(), lower_inclusive)) };
    let upper = if hi.trim().is_empty() { None } else { Some((hi.trim().to_string(), upper_inclusive)) };
    Some(Range { lower, upper })
}

fn range_contains(range: &Range, version: &str) -> bool {
    let tv = tokenize(version);
    if let Some((lo, inclusive)) = &range.lower {
        let ord = compare_tokens(&tv, &tokenize(lo));
        let ok = if *inclusive { ord != Ordering::Less } else { ord == Ordering::Greater };
        if !ok {
            return false;
        }
    }
    if let Some((hi, inclusive)) = &range.upper {
        let ord = compare_tokens(&tv, &tokenize(hi));
        let ok = if *inclusive { ord != Ordering::Greater } else { ord == Ordering::Less };
        if !ok {
            return false;
        }
    }
    true
}

impl SemverSystem for MavenSemver {
    fn parseable(&self, version: &str) -> bool {
        !version.trim().is_empty()
    }

    fn constraint_parseable(&self, constraint: &str) -> bool {
        parse_range(constraint).is_some()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        compare_tokens(&tokenize(a), &tokenize(b))
    }

    fn is_prerelease(&self, version: &str) -> bool {
        tokenize(version).iter().any(|t| match t {
            Token::Qualifier(q) => matches!(qualifier_rank(q), Some(r) if r < 5),
            Token::Numeric(_) => false,
        })
    }

    fn matches(&self, constraint: &str, version: &str) -> bool {
        if self.is_prerelease(version) {
            return false;
        }
        self.matches_prerelease(constraint, version)
    }

    fn matches_prerelease(&self, constraint: &str, version: &str) -> bool {
        let Some(range) = parse_range(constraint) else {
            return false;
        };
        range_contains(&range, version)
    }

    fn difference(&self, a: &str, b: &str) -> Option<Difference> {
        let (ta, tb) = (tokenize(a), tokenize(b));
        let major = |tokens: &[Token]| match tokens.first() {
            Some(Token::Numeric(n)) => Some(*n),
            _ => None,
        };
        let minor = |tokens: &[Token]| match tokens.get(1) {
            Some(Token::Numeric(n)) => Some(*n),
            _ => None,
        };
        if major(&ta) != major(&tb) {
            return Some(Difference::Major);
        }
        if minor(&ta) != minor(&tb) {
            return Some(Difference::Minor);
        }
        if compare_tokens(&ta, &tb) != Ordering::Equal {
            return Some(if self.is_prerelease(a) != self.is_prerelease(b) {
                Difference::Prerelease
            } else {
                Difference::Patch
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_precedence() {
        let s = MavenSemver;
        assert_eq!(s.compare("1.2", "1.10"), Ordering::Less);
        assert_eq!(s.compare("1.0.0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn qualifier_precedence() {
        let s = MavenSemver;
        assert_eq!(s.compare("1.0-alpha", "1.0-beta"), Ordering::Less);
        assert_eq!(s.compare("1.0-beta", "1.0-rc"), Ordering::Less);
        assert_eq!(s.compare("1.0-rc", "1.0"), Ordering::Less);
        assert_eq!(s.compare("1.0", "1.0-sp"), Ordering::Less);
        assert_eq!(s.compare("1.0-SNAPSHOT", "1.0"), Ordering::Less);
    }

    #[test]
    fn detects_prerelease() {
        let s = MavenSemver;
        assert!(s.is_prerelease("1.0-SNAPSHOT"));
        assert!(s.is_prerelease("2.0-M1"));
        assert!(s.is_prerelease("2.0-alpha-1"));
        assert!(!s.is_prerelease("2.0"));
        assert!(!s.is_prerelease("2.0-sp1"));
    }

    #[test]
    fn soft_requirement_matches_only_itself() {
        let s = MavenSemver;
        assert!(s.matches("1.5", "1.5"));
        assert!(!s.matches("1.5", "1.6"));
    }

    #[test]
    fn bracket_range_bounds() {
        let s = MavenSemver;
        assert!(s.matches("[1.0,2.0)", "1.5"));
        assert!(!s.matches("[1.0,2.0)", "2.0"));
        assert!(s.matches("[1.0,2.0]", "2.0"));
        assert!(s.matches("[1.5,)", "99.0"));
        assert!(!s.matches("[1.5,)", "1.0"));
    }

    #[test]
    fn matches_excludes_prerelease_unless_constraint_is_exact() {
        let s = MavenSemver;
        assert!(!s.matches("[1.0,2.0)", "1.5-SNAPSHOT"));
        assert!(s.matches_prerelease("[1.0,2.0)", "1.5-SNAPSHOT"));
    }

    #[test]
    fn difference_classifies_change_kind() {
        let s = MavenSemver;
        assert_eq!(s.difference("1.0.0", "2.0.0"), Some(Difference::Major));
        assert_eq!(s.difference("1.0.0", "1.1.0"), Some(Difference::Minor));
        assert_eq!(s.difference("1.0.0", "1.0.1"), Some(Difference::Patch));
        assert_eq!(s.difference("1.0.0", "1.0.0-SNAPSHOT"), Some(Difference::Prerelease));
        assert_eq!(s.difference("1.0.0", "1.0.0"), None);
    }
}
