//! Header storage: an ordered multimap that preserves insertion order and
//! unknown headers verbatim, with compact-form name expansion per RFC 3261
//! §7.3.3 (`m`→Contact, `f`→From, `t`→To, `i`→Call-ID, `v`→Via, `l`→
//! Content-Length, `c`→Content-Type).

use std::fmt;

/// Canonical header name, case-insensitively compared, displayed in the
/// long form regardless of how it was received.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderName(String);

impl HeaderName {
    pub fn new(raw: &str) -> Self {
        HeaderName(expand_compact_form(raw).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for HeaderName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(expand_compact_form(other))
    }
}

fn expand_compact_form(name: &str) -> &str {
    match name {
        "m" | "Contact" => "Contact",
        "f" | "From" => "From",
        "t" | "To" => "To",
        "i" | "Call-ID" => "Call-ID",
        "v" | "Via" => "Via",
        "l" | "Content-Length" => "Content-Length",
        "c" | "Content-Type" => "Content-Type",
        "k" | "Supported" => "Supported",
        "s" | "Subject" => "Subject",
        "e" | "Content-Encoding" => "Content-Encoding",
        other => other,
    }
}

/// Headers that RFC 3261 allows to appear as several header lines *or* as
/// one line with comma-joined values, and whose relative order within the
/// multi-value list is semantically significant (routing headers).
pub fn is_order_significant(name: &str) -> bool {
    matches!(
        expand_compact_form(name),
        "Via" | "Route" | "Record-Route"
    )
}

#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(HeaderName, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .push((HeaderName::new(name.as_ref()), value.into()));
    }

    /// Insert, replacing every existing header with this name.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let hname = HeaderName::new(name.as_ref());
        self.entries.retain(|(n, _)| n != &hname);
        self.entries.push((hname, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let target = HeaderName::new(name);
        self.entries
            .iter()
            .find(|(n, _)| *n == target)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let target = HeaderName::new(name);
        self.entries
            .iter()
            .filter(|(n, _)| *n == target)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    pub fn remove_first(&mut self, name: &str) -> Option<String> {
        let target = HeaderName::new(name);
        let idx = self.entries.iter().position(|(n, _)| *n == target)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_form_expands_on_insert() {
        let mut h = Headers::new();
        h.push("m", "sip:alice@example.com");
        assert_eq!(h.get("Contact"), Some("sip:alice@example.com"));
        assert_eq!(h.get("m"), Some("sip:alice@example.com"));
    }

    #[test]
    fn multi_header_preserves_order() {
        let mut h = Headers::new();
        h.push("Via", "SIP/2.0/UDP a.example.com");
        h.push("Via", "SIP/2.0/UDP b.example.com");
        let all = h.get_all("Via");
        assert_eq!(all, vec!["SIP/2.0/UDP a.example.com", "SIP/2.0/UDP b.example.com"]);
    }

    #[test]
    fn unknown_header_round_trips_verbatim() {
        let mut h = Headers::new();
        h.push("X-Custom-Trace", "abc123");
        assert_eq!(h.get("X-Custom-Trace"), Some("abc123"));
    }

    #[test]
    fn set_replaces_all_existing() {
        let mut h = Headers::new();
        h.push("To", "sip:a@x.com");
        h.set("To", "sip:b@x.com");
        assert_eq!(h.get_all("To"), vec!["sip:b@x.com"]);
    }
}
