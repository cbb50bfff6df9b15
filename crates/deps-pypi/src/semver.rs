//! `Pep440Semver`: the PyPI version dialect over the `pep440_rs` crate.

use std::cmp::Ordering;
use std::str::FromStr;

use deps_core::{Difference, SemverSystem};
use pep440_rs::{Version, VersionSpecifiers};

#[derive(Debug, Default)]
pub struct Pep440Semver;

/// The numeric release segments before any pre/post/dev/local suffix,
/// read directly off the string rather than through `pep440_rs`'s
/// internals (mirrors `deps_npm::semver::numeric_core`).
fn release_segments(version: &str) -> Vec<u64> {
    let core = version
        .trim_start_matches(|c: char| c == 'v' || c == 'V')
        .split(['!']) // drop an epoch prefix, if any
        .next_back()
        .unwrap_or(version);
    let stop = core
        .find(['a', 'A', 'b', 'B', 'c', 'C', 'r', 'R', '.', '-', '_', '+'].as_ref())
        .map(|i| {
            // only stop at a `.` that precedes a non-numeric run (release
            // segments themselves are dot-separated digits)
            if core.as_bytes()[i] == b'.' {
                core.len()
            } else {
                i
            }
        })
        .unwrap_or(core.len());
    core[..stop]
        .split('.')
        .filter_map(|p| p.parse::<u64>().ok())
        .collect()
}

impl SemverSystem for Pep440Semver {
    fn parseable(&self, version: &str) -> bool {
        Version::from_str(version).is_ok()
    }

    fn constraint_parseable(&self, constraint: &str) -> bool {
        VersionSpecifiers::from_str(constraint).is_ok()
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        let va = Version::from_str(a).expect("caller checked parseable");
        let vb = Version::from_str(b).expect("caller checked parseable");
        va.cmp(&vb)
    }

    fn is_prerelease(&self, version: &str) -> bool {
        Version::from_str(version)
            .map(|v| v.any_prerelease())
            .unwrap_or(false)
    }

    fn matches(&self, constraint: &str, version: &str) -> bool {
        let Ok(specs) = VersionSpecifiers::from_str(constraint) else {
            return false;
        };
        let Ok(v) = Version::from_str(version) else {
            return false;
        };
        if v.any_prerelease() && !constraint_admits_prerelease(constraint) {
            return false;
        }
        specs.contains(&v)
    }

    fn matches_prerelease(&self, constraint: &str, version: &str) -> bool {
        let Ok(specs) = VersionSpecifiers::from_str(constraint) else {
            return false;
        };
        let Ok(v) = Version::from_str(version) else {
            return false;
        };
        specs.contains(&v)
    }

    fn difference(&self, a: &str, b: &str) -> Option<Difference> {
        if !self.parseable(a) || !self.parseable(b) {
            return None;
        }
        let (ra, rb) = (release_segments(a), release_segments(b));
        for i in 0..ra.len().max(rb.len()) {
            let (pa, pb) = (ra.get(i).copied().unwrap_or(0), rb.get(i).copied().unwrap_or(0));
            if pa != pb {
                return Some(match i {
                    0 => Difference::Major,
                    1 => Difference::Minor,
                    _ => Difference::Patch,
                });
            }
        }
        if self.is_prerelease(a) != self.is_prerelease(b) {
            return Some(Difference::Prerelease);
        }
        None
    }
}

/// Whether `constraint` has a pre-release lower bound — PEP 440's rule
/// that lets a specifier admit pre-release candidates even when the
/// requester didn't ask for pre-releases explicitly. Scans each
/// comma-separated clause's version operand rather than walking
/// `VersionSpecifiers`' internal clause representation.
fn constraint_admits_prerelease(constraint: &str) -> bool {
    constraint.split(',').any(|clause| {
        let operand = clause.trim().trim_start_matches(
            |c: char| matches!(c, '<' | '>' | '=' | '!' | '~'),
        );
        Version::from_str(operand.trim())
            .map(|v| v.any_prerelease())
            .unwrap_or(false)
    })
}
