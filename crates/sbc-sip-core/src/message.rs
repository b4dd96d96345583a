//! SIP request/response framing, parsing, and serialization.

use crate::error::{Error, Result};
use crate::header::Headers;
use crate::method::Method;
use crate::status::StatusCode;
use crate::uri::Uri;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub request_uri: Uri,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(r) => &r.headers,
            Message::Response(r) => &r.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(r) => &r.body,
            Message::Response(r) => &r.body,
        }
    }

    pub fn call_id(&self) -> Option<&str> {
        self.headers().get("Call-ID")
    }

    /// Parses `CSeq: <number> <METHOD>` into its numeric sequence.
    pub fn cseq_number(&self) -> Option<u32> {
        self.headers()
            .get("CSeq")?
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    }

    pub fn branch(&self) -> Option<String> {
        let via = self.headers().get("Via")?;
        via.split(';')
            .find_map(|p| p.trim().strip_prefix("branch="))
            .map(str::to_string)
    }
}

impl Request {
    pub fn new(method: Method, request_uri: Uri) -> Self {
        Request {
            method,
            request_uri,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        let reason = status.reason_phrase().to_string();
        Response {
            status,
            reason,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Builds a response that copies the dialog-identifying headers
    /// (Via, From, To, Call-ID, CSeq) out of the originating request, as
    /// every SIP response generator does.
    pub fn for_request(request: &Request, status: StatusCode) -> Self {
        let mut response = Response::new(status);
        for name in ["Via", "From", "To", "Call-ID", "CSeq"] {
            for value in request.headers.get_all(name) {
                response.headers.push(name, value.to_string());
            }
        }
        response
    }
}

/// Serializes a request to wire format (`\r\n`-terminated headers, blank
/// line, body), adding `Content-Length` from the actual body length.
pub fn serialize_request(request: &Request) -> Vec<u8> {
    let mut out = format!(
        "{} {} SIP/2.0\r\n",
        request.method, request.request_uri
    );
    serialize_headers(&mut out, &request.headers, request.body.len());
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&request.body);
    bytes
}

pub fn serialize_response(response: &Response) -> Vec<u8> {
    let mut out = format!("SIP/2.0 {} {}\r\n", response.status.0, response.reason);
    serialize_headers(&mut out, &response.headers, response.body.len());
    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&response.body);
    bytes
}

fn serialize_headers(out: &mut String, headers: &Headers, body_len: usize) {
    let mut wrote_content_length = false;
    for (name, value) in headers.iter() {
        if name.as_str() == "Content-Length" {
            wrote_content_length = true;
            out.push_str(&format!("Content-Length: {body_len}\r\n"));
            continue;
        }
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    if !wrote_content_length {
        out.push_str(&format!("Content-Length: {body_len}\r\n"));
    }
    out.push_str("\r\n");
}

/// Parses a full SIP message from a byte buffer, as received from a single
/// UDP datagram or a framed TCP segment. Requires the whole message
/// (headers + body) to be present; returns [`Error::Incomplete`] for a
/// TCP stream that hasn't yet delivered `Content-Length` bytes of body.
pub fn parse_message(input: &[u8]) -> Result<Message> {
    let text = std::str::from_utf8(input)
        .map_err(|e| Error::InvalidHeader(format!("non-utf8 message: {e}")))?;
    let header_end = text
        .find("\r\n\r\n")
        .ok_or_else(|| Error::InvalidHeader("no header/body separator".into()))?;
    let header_block = &text[..header_end];
    let body_start = header_end + 4;

    let mut lines = header_block.split("\r\n");
    let start_line = lines.next().ok_or(Error::Incomplete)?;

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;
        headers.push(name.trim(), value.trim().to_string());
    }

    let declared_len: Option<usize> = headers.get("Content-Length").and_then(|v| v.parse().ok());
    let available = input.len().saturating_sub(body_start);
    let body = match declared_len {
        Some(len) => {
            if available < len {
                return Err(Error::Incomplete);
            }
            input[body_start..body_start + len].to_vec()
        }
        None => input[body_start..].to_vec(),
    };
    if let Some(len) = declared_len {
        if body.len() != len {
            return Err(Error::ContentLengthMismatch {
                expected: len,
                actual: body.len(),
            });
        }
    }

    if let Some(rest) = start_line.strip_prefix("SIP/2.0 ") {
        let (code, reason) = rest
            .split_once(' ')
            .ok_or_else(|| Error::InvalidStatusLine(start_line.to_string()))?;
        let code: u16 = code
            .parse()
            .map_err(|_| Error::InvalidStatusLine(start_line.to_string()))?;
        Ok(Message::Response(Response {
            status: StatusCode(code),
            reason: reason.to_string(),
            headers,
            body,
        }))
    } else {
        let mut parts = start_line.split(' ');
        let method = parts
            .next()
            .ok_or_else(|| Error::InvalidRequestLine(start_line.to_string()))?;
        let uri = parts
            .next()
            .ok_or_else(|| Error::InvalidRequestLine(start_line.to_string()))?;
        let version = parts.next().unwrap_or("");
        if version != "SIP/2.0" {
            return Err(Error::InvalidRequestLine(start_line.to_string()));
        }
        Ok(Message::Request(Request {
            method: Method::from_str(method)?,
            request_uri: Uri::from_str(uri)?,
            headers,
            body,
        }))
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.request_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invite() -> Vec<u8> {
        let body = "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\ns=-\r\nc=IN IP4 192.0.2.1\r\nt=0 0\r\nm=audio 10000 RTP/AVP 0\r\n";
        format!(
            "INVITE sip:+15550001@sbc.local SIP/2.0\r\n\
Via: SIP/2.0/UDP 192.0.2.1:5060;branch=z9hG4bK776a\r\n\
From: <sip:caller@192.0.2.1>;tag=abc\r\n\
To: <sip:+15550001@sbc.local>\r\n\
Call-ID: call-1@192.0.2.1\r\n\
CSeq: 1 INVITE\r\n\
Content-Type: application/sdp\r\n\
Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    #[test]
    fn parses_invite_with_sdp_body() {
        let msg = parse_message(&sample_invite()).unwrap();
        match msg {
            Message::Request(req) => {
                assert_eq!(req.method, Method::Invite);
                assert_eq!(req.headers.get("Call-ID"), Some("call-1@192.0.2.1"));
                assert!(req.body.starts_with(b"v=0"));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn content_length_mismatch_is_rejected() {
        let raw = "INVITE sip:bob@example.com SIP/2.0\r\n\
Call-ID: abc\r\n\
Content-Length: 999\r\n\r\nshort body";
        assert!(matches!(
            parse_message(raw.as_bytes()),
            Err(Error::Incomplete) | Err(Error::ContentLengthMismatch { .. })
        ));
    }

    #[test]
    fn serialize_then_parse_round_trips_structurally() {
        let mut req = Request::new(Method::Bye, Uri::sip("example.com").with_user("bob"));
        req.headers.push("Via", "SIP/2.0/UDP a.example.com;branch=z9hG4bK1");
        req.headers.push("From", "<sip:alice@example.com>;tag=1");
        req.headers.push("To", "<sip:bob@example.com>;tag=2");
        req.headers.push("Call-ID", "xyz");
        req.headers.push("CSeq", "2 BYE");
        let wire = serialize_request(&req);
        let reparsed = parse_message(&wire).unwrap();
        match reparsed {
            Message::Request(r) => {
                assert_eq!(r.method, Method::Bye);
                assert_eq!(r.headers.get("Call-ID"), Some("xyz"));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn response_for_request_copies_dialog_headers() {
        let mut req = Request::new(Method::Invite, Uri::sip("example.com"));
        req.headers.push("Via", "SIP/2.0/UDP a;branch=z9hG4bK1");
        req.headers.push("Call-ID", "abc");
        req.headers.push("CSeq", "1 INVITE");
        let resp = Response::for_request(&req, StatusCode::TRYING);
        assert_eq!(resp.headers.get("Call-ID"), Some("abc"));
        assert_eq!(resp.status, StatusCode::TRYING);
    }
}
