//! Dialog state: identity, route set, and CSeq bookkeeping, per spec.md
//! §4.8. Grounded on the teacher's `registrar-core::location` entry/lookup
//! shape for the map this module's owner keeps dialogs in, adapted from a
//! string-keyed contact list to a dialog-key-to-`Dialog` table.

use crate::error::{Error, Result};
use sbc_sip_core::{Headers, Request, Response, Uri};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DialogKey {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl DialogKey {
    pub fn new(call_id: impl Into<String>, local_tag: impl Into<String>, remote_tag: impl Into<String>) -> Self {
        DialogKey { call_id: call_id.into(), local_tag: local_tag.into(), remote_tag: remote_tag.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Uac,
    Uas,
}

#[derive(Debug, Clone)]
pub struct Dialog {
    pub key: DialogKey,
    pub role: Role,
    /// Route set as this side must send requests: for a UAC this is
    /// Record-Route reversed; for a UAS it's taken as-received.
    pub route_set: Vec<Uri>,
    pub remote_target: Uri,
    pub local_cseq: u32,
    pub remote_cseq: u32,
}

impl Dialog {
    /// Builds a dialog from the 2xx response to an INVITE the local side
    /// sent (UAC role).
    pub fn from_invite_2xx_uac(request: &Request, response: &Response, local_tag: &str, remote_tag: &str) -> Result<Self> {
        let mut route_set = parse_record_route(&response.headers)?;
        route_set.reverse();
        let remote_target = contact_uri(&response.headers)?;
        let call_id = response.headers.get("Call-ID").unwrap_or_default().to_string();
        Ok(Dialog {
            key: DialogKey::new(call_id, local_tag, remote_tag),
            role: Role::Uac,
            route_set,
            remote_target,
            local_cseq: request.headers.get("CSeq").and_then(cseq_number).unwrap_or(1),
            remote_cseq: 0,
        })
    }

    /// Builds a dialog from the INVITE request this side answered (UAS role).
    pub fn from_invite_2xx_uas(request: &Request, local_tag: &str, remote_tag: &str) -> Result<Self> {
        let route_set = parse_record_route(&request.headers)?;
        let remote_target = contact_uri(&request.headers)?;
        let call_id = request.headers.get("Call-ID").unwrap_or_default().to_string();
        Ok(Dialog {
            key: DialogKey::new(call_id, local_tag, remote_tag),
            role: Role::Uas,
            route_set,
            remote_target,
            local_cseq: 1,
            remote_cseq: request.headers.get("CSeq").and_then(cseq_number).unwrap_or(0),
        })
    }

    /// Validates and records the CSeq of an in-dialog request from the
    /// remote party: must be strictly increasing (spec.md §5).
    pub fn observe_remote_cseq(&mut self, cseq: u32) -> Result<()> {
        if cseq <= self.remote_cseq && self.remote_cseq != 0 {
            return Err(Error::OutOfOrderCseq { last_seen: self.remote_cseq, got: cseq });
        }
        self.remote_cseq = cseq;
        Ok(())
    }

    /// Allocates and returns the next local CSeq for an outgoing in-dialog
    /// request.
    pub fn next_local_cseq(&mut self) -> u32 {
        self.local_cseq += 1;
        self.local_cseq
    }

    /// Loose-routing per RFC 3261 §16.12: strip a Route header pointing at
    /// this element and target the request-URI directly, otherwise pass
    /// the full route set through unchanged.
    pub fn resolve_target(&self, this_element: &str) -> (Uri, Vec<Uri>) {
        match self.route_set.first() {
            Some(first) if first.host == this_element => {
                (self.remote_target.clone(), self.route_set[1..].to_vec())
            }
            _ => (self.route_set.first().cloned().unwrap_or_else(|| self.remote_target.clone()), self.route_set.clone()),
        }
    }
}

fn cseq_number(raw: &str) -> Option<u32> {
    raw.split_whitespace().next()?.parse().ok()
}

fn parse_record_route(headers: &Headers) -> Result<Vec<Uri>> {
    headers
        .get_all("Record-Route")
        .into_iter()
        .map(|raw| Uri::from_str(strip_display_name(raw)).map_err(|_| Error::DialogNotFound(String::new(), String::new(), String::new())))
        .collect()
}

fn contact_uri(headers: &Headers) -> Result<Uri> {
    let raw = headers.get("Contact").ok_or_else(|| Error::DialogNotFound(String::new(), String::new(), String::new()))?;
    Uri::from_str(strip_display_name(raw)).map_err(|_| Error::DialogNotFound(String::new(), String::new(), String::new()))
}

/// Strips `<...>` wrapping and any leading display name, as headers like
/// `Contact: "Alice" <sip:alice@example.com>` carry both.
fn strip_display_name(raw: &str) -> &str {
    match (raw.find('<'), raw.find('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw.trim(),
    }
}
