// SPDX-License-Identifier: MIT OR Apache-2.0
//! vigil-matcher
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Multi-pattern matcher for banner and HTTP-response text. A matcher
//! holds up to a few hundred compiled patterns, each tagged with a kind
//! and a `vendor/product` name; one [`Matcher::match_data`] pass records
//! every pattern that matched plus the span of capture group 1, and
//! [`Matcher::next_match`] yields the matched ids in ascending order.
//!
//! Each pattern runs independently against the input. A merged automaton
//! over hundreds of heterogeneous patterns with captures is not worth the
//! complexity at this fan-out.

use regex::bytes::Regex;
use thiserror::Error;

/// What a pattern identifies when it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchKind {
    /// Sentinel for untyped patterns.
    #[default]
    Unknown,
    /// A software component; the pattern name is `vendor/product`.
    Component,
}

/// A pattern definition for [`Matcher::load`].
#[derive(Debug, Clone, Copy)]
pub struct PatternDef<'a> {
    /// Kind reported for matches of this pattern.
    pub kind: MatchKind,
    /// `vendor/product` name, lowercase by convention.
    pub name: &'a str,
    /// The regular expression source.
    pub pattern: &'a str,
}

/// Errors from matcher construction and matching.
#[derive(Debug, Error)]
pub enum MatcherError {
    /// A pattern failed to compile.
    #[error("pattern {pattern:?}: {source}")]
    Pattern {
        /// The offending pattern source.
        pattern: String,
        /// The underlying regex diagnostic.
        #[source]
        source: regex::Error,
    },

    /// `compile` was called twice.
    #[error("matcher is already compiled")]
    AlreadyCompiled,

    /// An operation that needs a compiled matcher ran before `compile`.
    #[error("matcher is not compiled")]
    NotCompiled,

    /// `add` was called after `compile`.
    #[error("cannot add patterns to a compiled matcher")]
    AddAfterCompile,
}

#[derive(Debug)]
struct Pattern {
    regex: Regex,
    kind: MatchKind,
    name: String,
    has_capture: bool,
    // match state from the last match_data call
    matched: bool,
    capture: Option<(usize, usize)>,
}

/// The regex-set matcher.
#[derive(Debug, Default)]
pub struct Matcher {
    patterns: Vec<Pattern>,
    compiled: bool,
    cursor: usize,
    last_error: Option<String>,
}

impl Matcher {
    /// Create an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an untyped, unnamed pattern. Returns the pattern id.
    pub fn add(&mut self, pattern: &str) -> Result<usize, MatcherError> {
        self.add_with(MatchKind::Unknown, "", pattern)
    }

    /// Add a pattern with a kind and name. Returns the pattern id.
    ///
    /// Ids are assigned monotonically from zero in `add` order.
    pub fn add_with(
        &mut self,
        kind: MatchKind,
        name: &str,
        pattern: &str,
    ) -> Result<usize, MatcherError> {
        if self.compiled {
            return Err(self.record(MatcherError::AddAfterCompile));
        }

        let regex = match Regex::new(pattern) {
            Ok(r) => r,
            Err(source) => {
                return Err(self.record(MatcherError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                }));
            }
        };

        let id = self.patterns.len();
        self.patterns.push(Pattern {
            has_capture: regex.captures_len() > 1,
            regex,
            kind,
            name: name.to_string(),
            matched: false,
            capture: None,
        });
        Ok(id)
    }

    /// Finalize the pattern set. No more patterns can be added afterwards;
    /// a second call fails.
    pub fn compile(&mut self) -> Result<(), MatcherError> {
        if self.compiled {
            return Err(self.record(MatcherError::AlreadyCompiled));
        }
        self.compiled = true;
        Ok(())
    }

    /// Add every definition and compile. Returns the number of patterns.
    pub fn load(&mut self, defs: &[PatternDef<'_>]) -> Result<usize, MatcherError> {
        for def in defs {
            self.add_with(def.kind, def.name, def.pattern)?;
        }
        self.compile()?;
        Ok(self.patterns.len())
    }

    /// Number of patterns added so far.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// `true` when no patterns have been added.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Match `data` against every pattern, recording matches and capture
    /// spans, and reset the iteration cursor.
    pub fn match_data(&mut self, data: &[u8]) -> Result<(), MatcherError> {
        if !self.compiled {
            return Err(self.record(MatcherError::NotCompiled));
        }

        for p in &mut self.patterns {
            p.matched = false;
            p.capture = None;
            if p.has_capture {
                if let Some(caps) = p.regex.captures(data) {
                    p.matched = true;
                    p.capture = caps.get(1).map(|m| (m.start(), m.end()));
                }
            } else {
                p.matched = p.regex.is_match(data);
            }
        }

        self.cursor = 0;
        Ok(())
    }

    /// Yield the next matched pattern id in ascending order, or `None`
    /// once all matches from the last [`Matcher::match_data`] are consumed.
    pub fn next_match(&mut self) -> Option<usize> {
        while self.cursor < self.patterns.len() {
            let id = self.cursor;
            self.cursor += 1;
            if self.patterns[id].matched {
                return Some(id);
            }
        }
        None
    }

    /// Kind of pattern `id`.
    pub fn kind_of(&self, id: usize) -> Option<MatchKind> {
        self.patterns.get(id).map(|p| p.kind)
    }

    /// Name of pattern `id`.
    pub fn name_of(&self, id: usize) -> Option<&str> {
        self.patterns.get(id).map(|p| p.name.as_str())
    }

    /// Content of capture group 1 of pattern `id` within `data`.
    ///
    /// `data` must be the buffer passed to the last
    /// [`Matcher::match_data`] call; the recorded span indexes into it.
    /// Returns `None` when the pattern did not match or captured nothing.
    pub fn substring<'d>(&self, id: usize, data: &'d [u8]) -> Option<&'d [u8]> {
        let p = self.patterns.get(id)?;
        if !p.matched {
            return None;
        }
        let (start, end) = p.capture?;
        data.get(start..end)
    }

    /// Human-readable diagnostic from the most recent failed operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn record(&mut self, err: MatcherError) -> MatcherError {
        self.last_error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::{MatchKind, Matcher, MatcherError, PatternDef};

    #[test]
    fn ids_are_monotonic_and_matches_ascend() {
        let inputs: &[(&str, &[u8])] = &[
            ("", b""),
            ("", b"trololo"),
            ("foo", b"foo"),
            ("bar", b"foo\0bar"),
        ];

        let mut m = Matcher::new();
        for (i, (re, _)) in inputs.iter().enumerate() {
            assert_eq!(m.add(re).unwrap(), i);
        }
        m.compile().unwrap();

        for (i, (_, data)) in inputs.iter().enumerate() {
            m.match_data(data).unwrap();
            let mut ids = Vec::new();
            while let Some(id) = m.next_match() {
                ids.push(id);
            }
            assert!(ids.contains(&i), "pattern {i} should match its input");
            let mut sorted = ids.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(ids, sorted, "ids must ascend without repeats");
            assert_eq!(m.next_match(), None, "iteration stays exhausted");
        }
    }

    #[test]
    fn bad_patterns_fail_at_add() {
        for bad in ["foo[", "foo\\", "foo("] {
            let mut m = Matcher::new();
            let err = m.add(bad).unwrap_err();
            assert!(matches!(err, MatcherError::Pattern { .. }), "{bad}");
            assert!(m.last_error().is_some());
        }
    }

    #[test]
    fn non_matching_patterns_stay_silent() {
        let cases: &[(&str, &[u8])] = &[
            ("foo", b""),
            ("foo", b"bar"),
            ("baz", b"foo\0bar"),
        ];
        let mut m = Matcher::new();
        for (re, _) in cases {
            m.add(re).unwrap();
        }
        m.compile().unwrap();

        for (i, (_, data)) in cases.iter().enumerate() {
            m.match_data(data).unwrap();
            while let Some(id) = m.next_match() {
                assert_ne!(id, i, "pattern {i} must not match its input");
            }
        }
    }

    #[test]
    fn substrings_come_from_group_one() {
        let data = b"foo adam bar bertil baz cesar";
        let mut m = Matcher::new();
        m.add("foo ([a-z]+)").unwrap();
        m.add("bar ([a-z]+)").unwrap();
        m.add("baz ([a-z]+)").unwrap();
        m.compile().unwrap();
        m.match_data(data).unwrap();

        let expected: [&[u8]; 3] = [b"adam", b"bertil", b"cesar"];
        let mut seen = 0;
        while let Some(id) = m.next_match() {
            assert_eq!(m.substring(id, data), Some(expected[id]));
            seen += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn http_server_banner_scenario() {
        let mut m = Matcher::new();
        m.add_with(
            MatchKind::Component,
            "nginx/nginx",
            "\\r?\\n[Ss]erver: ?nginx/?([0-9.]+)?",
        )
        .unwrap();
        m.add_with(
            MatchKind::Component,
            "apache/http_server",
            "\\r?\\n[Ss]erver: ?[Aa]pache/?([0-9.]+)?",
        )
        .unwrap();
        m.compile().unwrap();

        let data = b"HTTP/2 301 \r\nServer: nginx/1.14.2\r\n";
        m.match_data(data).unwrap();
        assert_eq!(m.next_match(), Some(0));
        assert_eq!(m.next_match(), None);
        assert_eq!(m.substring(0, data), Some(&b"1.14.2"[..]));
        assert_eq!(m.kind_of(0), Some(MatchKind::Component));
        assert_eq!(m.name_of(0), Some("nginx/nginx"));
    }

    #[test]
    fn optional_capture_may_be_absent() {
        let mut m = Matcher::new();
        m.add_with(
            MatchKind::Component,
            "nginx/nginx",
            "\\r?\\n[Ss]erver: ?nginx/?([0-9.]+)?",
        )
        .unwrap();
        m.compile().unwrap();

        let data = b"HTTP/2 301 \r\nserver: nginx\r\n";
        m.match_data(data).unwrap();
        assert_eq!(m.next_match(), Some(0));
        assert_eq!(m.substring(0, data), None);
    }

    #[test]
    fn lifecycle_violations() {
        let mut m = Matcher::new();
        m.add("x").unwrap();
        assert!(matches!(m.match_data(b"x"), Err(MatcherError::NotCompiled)));
        m.compile().unwrap();
        assert!(matches!(m.compile(), Err(MatcherError::AlreadyCompiled)));
        assert!(matches!(m.add("y"), Err(MatcherError::AddAfterCompile)));
        assert_eq!(m.last_error(), Some("cannot add patterns to a compiled matcher"));
    }

    #[test]
    fn load_adds_and_compiles() {
        let defs = [
            PatternDef {
                kind: MatchKind::Component,
                name: "openssh/openssh",
                pattern: "^SSH-[0-9.]+-OpenSSH_([0-9a-z.]+)?",
            },
            PatternDef {
                kind: MatchKind::Unknown,
                name: "",
                pattern: "^220 ",
            },
        ];
        let mut m = Matcher::new();
        assert_eq!(m.load(&defs).unwrap(), 2);

        let data = b"SSH-2.0-OpenSSH_8.4p1 Debian-5\r\n";
        m.match_data(data).unwrap();
        assert_eq!(m.next_match(), Some(0));
        assert_eq!(m.substring(0, data), Some(&b"8.4p1"[..]));
    }
}
