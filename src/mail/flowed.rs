//! `format=flowed; delsp=yes` unfolding (RFC 3676).

use std::sync::LazyLock;

use regex::Regex;

static QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:>\s*)+").unwrap());

const SIGNATURE_SEPARATOR: &str = "-- ";

fn quote_prefix(line: &str) -> Option<&str> {
    QUOTE.find(line).map(|m| m.as_str())
}

/// Join soft-broken lines. The trailing space of a soft break is deleted
/// and nothing is inserted in its place.
///
/// Lines only join when both are unquoted or both carry the same quote
/// prefix; the prefix of the second line is dropped.
pub fn unfold_flowed(text: &str) -> String {
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();

    let mut i = 0;
    while i + 1 < lines.len() {
        if !lines[i].ends_with(' ') || lines[i] == SIGNATURE_SEPARATOR {
            i += 1;
            continue;
        }

        let next = &lines[i + 1];
        let tail = match quote_prefix(&lines[i]) {
            Some(quote) => (quote_prefix(next) == Some(quote)).then(|| next[quote.len()..].to_owned()),
            None => quote_prefix(next).is_none().then(|| next.clone()),
        };

        match tail {
            Some(tail) => {
                let line = &mut lines[i];
                line.pop();
                line.push_str(&tail);
                lines.remove(i + 1);
            }
            None => i += 1,
        }
    }

    lines.join("\n")
}
