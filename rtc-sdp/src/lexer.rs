//! Line-oriented tokenizer for `type=value` SDP lines (RFC 4566 §5).

use crate::error::{Error, Result};

pub(crate) struct Line<'a> {
    pub(crate) key: char,
    pub(crate) value: &'a str,
}

pub(crate) fn lines(text: &str) -> impl Iterator<Item = Result<Line<'_>>> {
    text.lines()
        .map(str::trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut parts = line.splitn(2, '=');
            let key = parts.next().unwrap_or("");
            let value = parts.next();
            match (key.chars().next(), key.len(), value) {
                (Some(key), 1, Some(value)) => Ok(Line { key, value }),
                _ => Err(Error::MalformedLine(line.to_string())),
            }
        })
}

/// Splits an attribute value of the form `name:rest` into its two halves;
/// valueless attributes (e.g. `a=sendrecv`, `a=rtcp-mux`) have no colon.
pub(crate) fn split_attribute(value: &str) -> (&str, Option<&str>) {
    match value.split_once(':') {
        Some((name, rest)) => (name, Some(rest)),
        None => (value, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_lines() {
        let collected: Vec<_> = lines("v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\n")
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(collected[0].key, 'v');
        assert_eq!(collected[0].value, "0");
        assert_eq!(collected[1].key, 'o');
    }

    #[test]
    fn rejects_line_with_no_equals() {
        let mut it = lines("not-a-line");
        assert!(it.next().unwrap().is_err());
    }

    #[test]
    fn attribute_split_handles_valueless_flags() {
        assert_eq!(split_attribute("sendrecv"), ("sendrecv", None));
        assert_eq!(split_attribute("ice-ufrag:F7gI"), ("ice-ufrag", Some("F7gI")));
        assert_eq!(
            split_attribute("fingerprint:sha-256 AA:BB:CC"),
            ("fingerprint", Some("sha-256 AA:BB:CC"))
        );
    }
}
