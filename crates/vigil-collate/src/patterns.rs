// SPDX-License-Identifier: MIT OR Apache-2.0
//! The component identification pattern table.
//!
//! Matched against HTTP response headers and banners. Names are
//! `vendor/product`, lowercase, no spaces. Patterns match the raw bytes
//! of a response, so header matches anchor on the preceding line break.

use std::io::BufRead;

use vigil_csv::CsvReader;
use vigil_matcher::{MatchKind, Matcher, PatternDef};

use crate::error::CollateError;

/// Patterns applied to banner data by the `matches` mode.
pub const BANNER_PATTERNS: &[PatternDef<'static>] = &[
    PatternDef {
        kind: MatchKind::Component,
        name: "nginx/nginx",
        pattern: "\\r?\\n[Ss]erver: ?nginx/?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "drupal/drupal",
        pattern: "\r?\n[Xx]-[Gg]enerator: ?[Dd]rupal ?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "drupal/drupal",
        pattern: "\r?\n[Xx]-[Dd]rupal",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "magento/magento",
        pattern: "\r?\n[Xx]-[Mm]agento",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "microsoft/asp.net",
        pattern: "\r?\n[Xx]-[Pp]owered-[Bb]y: ?ASP.NET",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "easyengine/easyengine",
        pattern: "\r?\n[Xx]-[Pp]owered-[Bb]y: ?[Ee]asy[Ee]ngine ?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "litespeed/litespeed",
        pattern: "\r?\n[Ss]erver: ?[Ll]ite[Ss]peed",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "litespeed/litespeed",
        pattern: "\r?\n[Xx]-[Ll]ite[Ss]peed",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "php/php",
        pattern: "\r?\n[Xx]-[Pp]owered-[Bb]y: ?PHP/?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "amazon/awselb",
        pattern: "\r?\n[Ss]erver: ?awselb/?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "amazon/s3",
        pattern: "\r?\n[Ss]erver: ?[Aa]mazon[sS]3",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "cloudflare/cloudflare",
        pattern: "\r?\n[Ss]erver: ?[Cc]loud[Ff]lare",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "cloudflare/cloudfront",
        pattern: "\r?\n[Ss]erver: ?[Cc]loud[Ff]ront",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "apache/apache",
        pattern: "\r?\n[Ss]erver: ?[Aa]pache/?([0-9.]+)?",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "redhat/centos",
        pattern: "\r?\n[Ss]erver:[^\r\n]+\\([Cc]ent[Oo][Ss]\\)",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "debian/debian",
        pattern: "\r?\n[Ss]erver:[^\r\n]+\\([Dd]ebian\\)",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "canonical/ubuntu",
        pattern: "\r?\n[Ss]erver:[^\r\n]+\\([Uu]buntu\\)",
    },
    PatternDef {
        kind: MatchKind::Component,
        name: "openssl/openssl",
        pattern: "\r?\n[Ss]erver:[^\r\n]+[Oo]pen[Ss][Ss][Ll]/?([0-9][A-Za-z0-9.-]+)?",
    },
];

/// Build a matcher from the built-in banner pattern table.
pub fn builtin_matcher() -> Result<Matcher, CollateError> {
    let mut matcher = Matcher::new();
    matcher.load(BANNER_PATTERNS)?;
    Ok(matcher)
}

/// Load a pattern table from CSV rows of `type,name,pattern` and
/// compile it. Returns the number of patterns loaded.
///
/// The type column is `component` or `unknown`; anything else is an
/// input-format error, as is a row missing its pattern column.
pub fn load_pattern_csv<R: BufRead>(
    matcher: &mut Matcher,
    input: &mut R,
) -> Result<usize, CollateError> {
    let mut reader = CsvReader::new();
    let mut loaded = 0;

    while reader.read_row(input)? {
        if reader.ncols() == 1 && reader.elem(0) == Some("") {
            continue;
        }
        let kind = match reader.elem(0) {
            Some("component") => MatchKind::Component,
            Some("unknown") => MatchKind::Unknown,
            other => {
                return Err(CollateError::BadEvent(format!(
                    "bad pattern type {:?}",
                    other.unwrap_or_default()
                )))
            }
        };
        let name = reader.elem(1).unwrap_or_default().to_string();
        let Some(pattern) = reader.elem(2) else {
            return Err(CollateError::BadEvent("pattern row without pattern".into()));
        };

        matcher.add_with(kind, &name, pattern)?;
        loaded += 1;
    }

    matcher.compile()?;
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::{builtin_matcher, load_pattern_csv, BANNER_PATTERNS};
    use vigil_matcher::Matcher;

    struct Case {
        data: &'static [u8],
        name: &'static str,
        version: Option<&'static str>,
    }

    // Positive vectors: each banner must match its component and capture
    // the expected version.
    const POSITIVES: &[Case] = &[
        Case {
            data: b"HTTP/2 301 \r\nserver: nginx\r\n",
            name: "nginx/nginx",
            version: None,
        },
        Case {
            data: b"HTTP/2 301 \r\nServer: nginx/1.14.2\r\n",
            name: "nginx/nginx",
            version: Some("1.14.2"),
        },
        Case {
            data: b"HTTP/2 301 \r\nX-Generator: Drupal 8 (https://www.drupal.org)\r\n",
            name: "drupal/drupal",
            version: Some("8"),
        },
        Case {
            data: b"HTTP/2 200 \r\nX-Powered-By: PHP/7.3.2\r\n",
            name: "php/php",
            version: Some("7.3.2"),
        },
        Case {
            data: b"HTTP/1.1 200 OK\r\nServer: Apache/2.4.38 (Debian)\r\n",
            name: "apache/apache",
            version: Some("2.4.38"),
        },
        Case {
            data: b"HTTP/1.1 200 OK\r\nServer: Apache/2.4.38 (Debian)\r\n",
            name: "debian/debian",
            version: None,
        },
        Case {
            data: b"HTTP/1.1 200 OK\r\nServer: Apache/2.4.6 (CentOS) OpenSSL/1.0.2k-fips\r\n",
            name: "openssl/openssl",
            version: Some("1.0.2k-fips"),
        },
        Case {
            data: b"HTTP/1.1 403 Forbidden\r\nServer: cloudflare\r\n",
            name: "cloudflare/cloudflare",
            version: None,
        },
        Case {
            data: b"HTTP/1.1 200 OK\r\nServer: AmazonS3\r\n",
            name: "amazon/s3",
            version: None,
        },
    ];

    // Negative vectors: banners that must not match the component.
    const NEGATIVES: &[(&[u8], &str)] = &[
        (b"HTTP/2 301 \r\nServer: Apache\r\n", "nginx/nginx"),
        (b"nginx without a header break", "nginx/nginx"),
        (b"HTTP/2 200 \r\nX-Powered-By: Python\r\n", "php/php"),
    ];

    fn compiled() -> Matcher {
        builtin_matcher().unwrap()
    }

    #[test]
    fn csv_pattern_files_load() {
        let csv = "component,openbsd/openssh,^SSH-[0-9.]+-OpenSSH_([0-9a-z.]+)?\r\n\
            unknown,,^220 \r\n";
        let mut m = Matcher::new();
        let n = load_pattern_csv(&mut m, &mut std::io::Cursor::new(csv)).unwrap();
        assert_eq!(n, 2);

        let data = b"SSH-2.0-OpenSSH_8.4p1\r\n";
        m.match_data(data).unwrap();
        assert_eq!(m.next_match(), Some(0));
        assert_eq!(m.substring(0, data), Some(&b"8.4p1"[..]));
        assert_eq!(m.name_of(0), Some("openbsd/openssh"));
    }

    #[test]
    fn csv_pattern_files_reject_bad_rows() {
        let mut m = Matcher::new();
        let bad_type = "widget,x/y,abc\r\n";
        assert!(load_pattern_csv(&mut m, &mut std::io::Cursor::new(bad_type)).is_err());

        let mut m = Matcher::new();
        let short_row = "component,x/y\r\n";
        assert!(load_pattern_csv(&mut m, &mut std::io::Cursor::new(short_row)).is_err());
    }

    #[test]
    fn positive_vectors_match_with_versions() {
        let mut m = compiled();
        for case in POSITIVES {
            m.match_data(case.data).unwrap();
            let mut found = None;
            while let Some(id) = m.next_match() {
                if m.name_of(id) == Some(case.name) {
                    found = Some(id);
                    break;
                }
            }
            let id = found.unwrap_or_else(|| {
                panic!(
                    "{} should match {:?}",
                    case.name,
                    String::from_utf8_lossy(case.data)
                )
            });
            let version = m
                .substring(id, case.data)
                .map(|v| std::str::from_utf8(v).unwrap());
            assert_eq!(version, case.version, "{}", case.name);
        }
    }

    #[test]
    fn negative_vectors_stay_silent() {
        let mut m = compiled();
        for (data, name) in NEGATIVES {
            m.match_data(data).unwrap();
            while let Some(id) = m.next_match() {
                assert_ne!(
                    m.name_of(id),
                    Some(*name),
                    "{} must not match {:?}",
                    name,
                    String::from_utf8_lossy(data)
                );
            }
        }
    }

    #[test]
    fn names_are_vendor_product_lowercase() {
        for def in BANNER_PATTERNS {
            let (vendor, product) = def.name.split_once('/').expect("vendor/product");
            assert!(!vendor.is_empty() && !product.is_empty());
            assert!(
                def.name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "/._-".contains(c)),
                "{}",
                def.name
            );
        }
    }
}
