use std::fmt;
use std::str::FromStr;

/// The SIP methods this core supports, per spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Register,
    Invite,
    Ack,
    Cancel,
    Bye,
    Options,
    Message,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Register => "REGISTER",
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Cancel => "CANCEL",
            Method::Bye => "BYE",
            Method::Options => "OPTIONS",
            Method::Message => "MESSAGE",
        })
    }
}

impl FromStr for Method {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s {
            "REGISTER" => Ok(Method::Register),
            "INVITE" => Ok(Method::Invite),
            "ACK" => Ok(Method::Ack),
            "CANCEL" => Ok(Method::Cancel),
            "BYE" => Ok(Method::Bye),
            "OPTIONS" => Ok(Method::Options),
            "MESSAGE" => Ok(Method::Message),
            other => Err(crate::error::Error::InvalidRequestLine(format!(
                "unknown method: {other}"
            ))),
        }
    }
}
