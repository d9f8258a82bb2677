//! Small text helpers for the front end: excerpts, relative dates, slugs.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Plain-text excerpt of at most `max_chars` characters.
/// Markup is dropped and whitespace collapsed; a truncated excerpt is cut at
/// a word boundary where possible and ends in `…`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let plain = collapse_whitespace(&strip_tags(text));
    if plain.chars().count() <= max_chars {
        return plain;
    }

    let cut: String = plain.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    let mut result = trimmed
        .trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .to_string();
    result.push('…');
    result
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

const UNITS: &[(i64, &str)] = &[
    (365 * 24 * 3600, "year"),
    (30 * 24 * 3600, "month"),
    (7 * 24 * 3600, "week"),
    (24 * 3600, "day"),
    (3600, "hour"),
    (60, "minute"),
];

/// "3 hours ago" style age of `then`, using only the largest whole unit.
/// Anything under a minute, including timestamps in the future, is "just now".
pub fn time_ago(then: NaiveDateTime, now: NaiveDateTime) -> String {
    let secs = (now - then).num_seconds();
    for (unit_secs, name) in UNITS {
        if secs >= *unit_secs {
            let n = secs / unit_secs;
            let plural = if n == 1 { "" } else { "s" };
            return format!("{} {}{} ago", n, name, plural);
        }
    }
    "just now".to_string()
}

/// URL slug for an article title. Non-ASCII letters are transliterated; a
/// title with nothing usable falls back to `article-<unix time>`.
pub fn slugify_title(title: &str, now: DateTime<Utc>) -> String {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        format!("article-{}", now.timestamp())
    } else {
        slug
    }
}
