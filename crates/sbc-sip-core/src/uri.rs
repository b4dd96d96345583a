//! SIP URI: `sip:user@host:port;param=value`, the subset this core needs
//! for request-lines, To/From/Contact headers, and Route/Record-Route.

use crate::error::{Error, Result};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    multi::many0,
    sequence::{pair, preceded, tuple},
    IResult,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Sip,
    Sips,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Sip => "sip",
            Scheme::Sips => "sips",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: Scheme,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: BTreeMap<String, Option<String>>,
}

impl Uri {
    pub fn sip(host: impl Into<String>) -> Self {
        Uri {
            scheme: Scheme::Sip,
            user: None,
            host: host.into(),
            port: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_deref())
    }

    pub fn transport(&self) -> Option<&str> {
        self.param("transport")
    }

    /// `user@host` without scheme/port/params — used as an Address-of-Record.
    pub fn aor(&self) -> String {
        match &self.user {
            Some(u) => format!("{u}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{user}@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        for (k, v) in &self.params {
            match v {
                Some(v) => write!(f, ";{k}={v}")?,
                None => write!(f, ";{k}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        all_consuming(parse_uri)(s)
            .map(|(_, uri)| uri)
            .map_err(|_| Error::InvalidUri(s.to_string()))
    }
}

fn is_user_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.!~*'()+&=,;?/%".contains(c)
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == ':'
}

fn parse_scheme(input: &str) -> IResult<&str, Scheme> {
    alt((
        map(tag("sips:"), |_| Scheme::Sips),
        map(tag("sip:"), |_| Scheme::Sip),
    ))(input)
}

fn parse_userinfo(input: &str) -> IResult<&str, String> {
    map(
        tuple((take_while1(is_user_char), char('@'))),
        |(u, _): (&str, char)| u.to_string(),
    )(input)
}

fn parse_port(input: &str) -> IResult<&str, u16> {
    preceded(char(':'), map_res(digit1, |d: &str| d.parse::<u16>()))(input)
}

fn parse_param(input: &str) -> IResult<&str, (String, Option<String>)> {
    preceded(
        char(';'),
        map(
            pair(
                take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
                opt(preceded(
                    char('='),
                    take_while(|c: char| c != ';' && c != '?' && c != ' '),
                )),
            ),
            |(k, v): (&str, Option<&str>)| (k.to_string(), v.map(str::to_string)),
        ),
    )(input)
}

fn parse_uri(input: &str) -> IResult<&str, Uri> {
    let (input, scheme) = parse_scheme(input)?;
    let (input, user) = opt(parse_userinfo)(input)?;
    let (input, host) = take_while1(is_host_char)(input)?;
    let (input, port) = opt(parse_port)(input)?;
    let (input, params) = many0(parse_param)(input)?;
    Ok((
        input,
        Uri {
            scheme,
            user,
            host: host.to_string(),
            port,
            params: params.into_iter().collect(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_uri() {
        let uri: Uri = "sip:example.com".parse().unwrap();
        assert_eq!(uri.scheme, Scheme::Sip);
        assert_eq!(uri.user, None);
        assert_eq!(uri.host, "example.com");
    }

    #[test]
    fn parses_user_port_and_params() {
        let uri: Uri = "sip:alice@example.com:5060;transport=udp".parse().unwrap();
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.port, Some(5060));
        assert_eq!(uri.transport(), Some("udp"));
        assert_eq!(uri.aor(), "alice@example.com");
    }

    #[test]
    fn round_trips_through_display() {
        let original = "sip:bob@10.0.0.5:5080;transport=tcp";
        let uri: Uri = original.parse().unwrap();
        let reparsed: Uri = uri.to_string().parse().unwrap();
        assert_eq!(uri, reparsed);
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!("alice@example.com".parse::<Uri>().is_err());
    }

    #[test]
    fn builder_matches_parsed() {
        let built = Uri::sip("example.com").with_user("bob").with_port(5060);
        let parsed: Uri = "sip:bob@example.com:5060".parse().unwrap();
        assert_eq!(built, parsed);
    }
}
