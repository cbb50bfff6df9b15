//! `ParseMetadata` (§4.5, §6): RFC-822-style PyPI METADATA/PKG-INFO
//! headers, tolerant of a missing body.

use crate::dependency::{Dependency, parse_dependency};
use crate::error::{PypiError, Result};

/// Parsed distribution metadata. Only the fields the resolver needs are
/// retained; other headers are available via `headers` for callers that
/// want them (e.g. `Summary`, `Home-page`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub requires_dist: Vec<Dependency>,
    pub requires_python: Option<String>,
    pub headers: Vec<(String, String)>,
}

/// `value == "UNKNOWN"` means the header is absent (a PyPI convention
/// from old setuptools uploads).
fn present(value: &str) -> Option<&str> {
    if value == "UNKNOWN" { None } else { Some(value) }
}

pub fn parse_metadata(text: &[u8]) -> Result<Metadata> {
    let text = std::str::from_utf8(text).map_err(|_| PypiError::InvalidUtf8)?;

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        // Headers end at the first blank line; everything after is body
        // (the long description) and is ignored here.
        if line.is_empty() {
            break;
        }
        // RFC-822 continuation lines start with whitespace.
        if line.starts_with([' ', '\t']) {
            if let Some(last) = headers.last_mut() {
                last.1.push('\n');
                last.1.push_str(line.trim_start());
            }
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    let mut name = None;
    let mut version = None;
    let mut requires_python = None;
    let mut requires_dist = Vec::new();

    for (key, value) in &headers {
        match key.as_str() {
            "Name" if name.is_none() => name = present(value).map(str::to_string),
            "Version" if version.is_none() => version = present(value).map(str::to_string),
            "Requires-Python" if requires_python.is_none() => {
                requires_python = present(value).map(str::to_string);
            }
            "Requires-Dist" => {
                if let Some(v) = present(value) {
                    requires_dist.push(parse_dependency(v)?);
                }
            }
            _ => {}
        }
    }

    Ok(Metadata {
        name: name.ok_or(PypiError::MissingHeader("Name"))?,
        version: version.ok_or(PypiError::MissingHeader("Version"))?,
        requires_dist,
        requires_python,
        headers,
    })
}
