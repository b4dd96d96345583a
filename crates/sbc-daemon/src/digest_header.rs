//! Minimal `Authorization: Digest ...` header parsing, RFC 2617 §3.2.2.

#[derive(Debug, Clone)]
pub struct DigestAuth {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
}

/// Parses the comma-separated `key="value"` pairs of a Digest
/// `Authorization`/`Proxy-Authorization` header value. Returns `None` if
/// any required field is missing.
pub fn parse(raw: &str) -> Option<DigestAuth> {
    let rest = raw.trim().strip_prefix("Digest ")?;
    let mut username = None;
    let mut realm = None;
    let mut nonce = None;
    let mut uri = None;
    let mut response = None;

    for part in split_params(rest) {
        let (key, value) = part.split_once('=')?;
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "username" => username = Some(value.to_string()),
            "realm" => realm = Some(value.to_string()),
            "nonce" => nonce = Some(value.to_string()),
            "uri" => uri = Some(value.to_string()),
            "response" => response = Some(value.to_string()),
            _ => {}
        }
    }

    Some(DigestAuth { username: username?, realm: realm?, nonce: nonce?, uri: uri?, response: response? })
}

/// Splits on commas that are not inside a quoted value.
fn split_params(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(input[start..].trim());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_digest_header() {
        let raw = r#"Digest username="alice", realm="sbc.local", nonce="abc.def", uri="sip:sbc.local", response="9f8e7d""#;
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.realm, "sbc.local");
        assert_eq!(parsed.nonce, "abc.def");
        assert_eq!(parsed.response, "9f8e7d");
    }

    #[test]
    fn missing_required_field_yields_none() {
        let raw = r#"Digest username="alice", realm="sbc.local""#;
        assert!(parse(raw).is_none());
    }

    #[test]
    fn non_digest_scheme_yields_none() {
        assert!(parse(r#"Basic dXNlcjpwYXNz"#).is_none());
    }
}
