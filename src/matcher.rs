//! Single-pattern matching under the three rule dialects.
//!
//! A rule pattern is evaluated against a subject string under one of:
//!
//! - `plain`: byte-exact equality
//! - `regexp`: regular expression, searched anywhere in the subject
//! - `path`: ant-style glob over `/`-separated paths, where `?` matches
//!   one non-separator character, `*` a run of non-separator characters,
//!   and `**` a run of whole segments (so `**/foo` matches `foo` itself and
//!   `any/prefix/foo`)
//!
//! An empty pattern or dialect never matches: a rule without a pattern is
//! vacuous, not a wildcard. An invalid regular expression also evaluates to
//! false instead of raising.

use regex::Regex;

/// Evaluate `pattern` under `dialect` against `subject`. The dialect tag is
/// matched case-insensitively.
pub fn matches(pattern: &str, dialect: &str, subject: &str) -> bool {
    if pattern.is_empty() || dialect.is_empty() {
        return false;
    }

    match dialect.to_ascii_lowercase().as_str() {
        crate::config::MATCH_PLAIN => pattern == subject,
        crate::config::MATCH_REGEXP => regex_matches(pattern, subject),
        crate::config::MATCH_PATH => regex_matches(&ant_to_regex(pattern), subject),
        _ => false,
    }
}

/// Regex search with invalid expressions treated as non-matching.
pub fn regex_matches(pattern: &str, subject: &str) -> bool {
    Regex::new(pattern)
        .map(|re| re.is_match(subject))
        .unwrap_or(false)
}

/// Compile an ant-style glob into an anchored regular expression.
///
/// Segment-wise translation: `**` between separators consumes zero or more
/// whole segments, a trailing `/**` consumes an optional suffix, and within
/// a segment `*`/`?` never cross a separator.
fn ant_to_regex(pattern: &str) -> String {
    let segments: Vec<&str> = pattern.split('/').collect();
    let last = segments.len() - 1;

    let mut out = String::from("^");
    let mut need_sep = false;

    for (i, segment) in segments.iter().enumerate() {
        if *segment == "**" {
            if i == last {
                if need_sep {
                    out.push_str("(?:/.*)?");
                } else {
                    out.push_str(".*");
                }
                need_sep = false;
            } else {
                if need_sep {
                    out.push('/');
                    need_sep = false;
                }
                out.push_str("(?:[^/]+/)*");
            }
            continue;
        }

        if need_sep {
            out.push('/');
        }
        for ch in segment.chars() {
            match ch {
                '*' => out.push_str("[^/]*"),
                '?' => out.push_str("[^/]"),
                _ => out.push_str(&regex::escape(&ch.to_string())),
            }
        }
        need_sep = true;
    }

    out.push('$');
    out
}
