//! Built-in SPDX license and exception identifier tables (§4.6).
//!
//! Embedded as static slices rather than fetched at runtime: this crate
//! parses and canonicalizes expressions, it does not talk to a license
//! registry. Trimmed to the common OSI identifiers exercised by the
//! resolvers and their tests, not the full SPDX license-list.

pub(crate) const LICENSE_IDS: &[&str] = &[
    "0BSD",
    "AGPL-3.0-only",
    "AGPL-3.0-or-later",
    "Apache-2.0",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSL-1.0",
    "CC0-1.0",
    "CDDL-1.0",
    "CDDL-1.1",
    "EPL-1.0",
    "EPL-2.0",
    "GPL-2.0-only",
    "GPL-2.0-or-later",
    "GPL-3.0-only",
    "GPL-3.0-or-later",
    "ISC",
    "LGPL-2.1-only",
    "LGPL-2.1-or-later",
    "LGPL-3.0-only",
    "LGPL-3.0-or-later",
    "MIT",
    "MPL-2.0",
    "Python-2.0",
    "Unlicense",
    "WTFPL",
    "Zlib",
];

pub(crate) const EXCEPTION_IDS: &[&str] = &[
    "Bison-exception-2.2",
    "Classpath-exception-2.0",
    "Font-exception-2.0",
    "GCC-exception-3.1",
    "LLVM-exception",
    "Linux-syscall-note",
    "OpenSSL-exception",
];

/// Case-insensitive lookup returning the registered spelling.
pub(crate) fn canonical_license_id(id: &str) -> Option<&'static str> {
    LICENSE_IDS.iter().copied().find(|known| known.eq_ignore_ascii_case(id))
}

pub(crate) fn canonical_exception_id(id: &str) -> Option<&'static str> {
    EXCEPTION_IDS.iter().copied().find(|known| known.eq_ignore_ascii_case(id))
}
