//! REGISTER handling: digest authentication and location-binding storage,
//! per spec.md §4.8. The binding table is grounded directly on the
//! teacher's `registrar-core::registrar::location::LocationService`
//! (`DashMap<String, Vec<ContactInfo>>`, dedup-by-URI-then-push on add),
//! adapted from `async`/`Result`-per-call to synchronous calls guarded by
//! `DashMap`'s own locking, since this registrar has no I/O of its own.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SipUser {
    pub aor: String,
    /// Precomputed `MD5(username:realm:password)` per RFC 2617.
    pub ha1: String,
    pub realm: String,
    pub failed_auth_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl SipUser {
    pub fn new(aor: impl Into<String>, ha1: impl Into<String>, realm: impl Into<String>) -> Self {
        SipUser {
            aor: aor.into(),
            ha1: ha1.into(),
            realm: realm.into(),
            failed_auth_attempts: 0,
            locked_until: None,
            last_seen: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactBinding {
    pub contact_uri: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub received_from_ip: String,
}

pub struct RegistrarConfig {
    pub nonce_secret: Vec<u8>,
    pub nonce_window: ChronoDuration,
    pub server_cap_expires: u32,
    pub max_auth_attempts: u32,
    pub lockout_duration: ChronoDuration,
}

impl RegistrarConfig {
    pub fn new(nonce_secret: impl Into<Vec<u8>>) -> Self {
        RegistrarConfig {
            nonce_secret: nonce_secret.into(),
            nonce_window: ChronoDuration::minutes(5),
            server_cap_expires: 3600,
            max_auth_attempts: 5,
            lockout_duration: ChronoDuration::minutes(30),
        }
    }
}

pub struct Registrar {
    config: RegistrarConfig,
    users: DashMap<String, SipUser>,
    bindings: DashMap<String, Vec<ContactBinding>>,
}

impl Registrar {
    pub fn new(config: RegistrarConfig) -> Self {
        Registrar { config, users: DashMap::new(), bindings: DashMap::new() }
    }

    pub fn add_user(&self, user: SipUser) {
        self.users.insert(user.aor.clone(), user);
    }

    pub fn find_user(&self, aor: &str) -> Option<SipUser> {
        self.users.get(aor).map(|u| u.clone())
    }

    /// Issues a nonce binding the current time into the value itself, so
    /// freshness can be checked without server-side nonce storage.
    pub fn issue_nonce(&self, now: DateTime<Utc>) -> String {
        let issued_at = now.timestamp();
        let mac = self.mac_for(issued_at);
        format!("{issued_at}.{mac}")
    }

    fn mac_for(&self, issued_at: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.config.nonce_secret).expect("HMAC accepts any key length");
        mac.update(issued_at.to_string().as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    fn verify_nonce(&self, nonce: &str, now: DateTime<Utc>) -> Result<()> {
        let (issued_at_raw, mac) = nonce.split_once('.').ok_or(Error::StaleNonce)?;
        let issued_at: i64 = issued_at_raw.parse().map_err(|_| Error::StaleNonce)?;
        if mac != self.mac_for(issued_at) {
            return Err(Error::StaleNonce);
        }
        let age = now - DateTime::from_timestamp(issued_at, 0).ok_or(Error::StaleNonce)?;
        if age > self.config.nonce_window || age < ChronoDuration::zero() {
            return Err(Error::StaleNonce);
        }
        Ok(())
    }

    /// Validates a digest-auth REGISTER against the named user's HA1,
    /// updating attempt counters and lockout state.
    pub fn authenticate(
        &self,
        aor: &str,
        method: &str,
        digest_uri: &str,
        nonce: &str,
        response: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut user = self.users.get_mut(aor).ok_or_else(|| Error::UnknownUser(aor.to_string()))?;
        if let Some(locked_until) = user.locked_until {
            if now < locked_until {
                return Err(Error::UserLocked(aor.to_string()));
            }
        }
        self.verify_nonce(nonce, now)?;

        let expected = digest_response(&user.ha1, method, digest_uri, nonce);
        if expected != response {
            user.failed_auth_attempts += 1;
            if user.failed_auth_attempts >= self.config.max_auth_attempts {
                user.locked_until = Some(now + self.config.lockout_duration);
                warn!(%aor, attempts = user.failed_auth_attempts, "account locked after repeated auth failures");
            }
            return Err(Error::DigestMismatch);
        }

        user.failed_auth_attempts = 0;
        user.last_seen = Some(now);
        Ok(())
    }

    /// Upserts or removes a location binding; `requested_expires == 0`
    /// deletes the matching contact. Returns the resulting binding list.
    pub fn upsert_binding(
        &self,
        aor: &str,
        contact_uri: &str,
        requested_expires: u32,
        user_agent: Option<String>,
        received_from_ip: String,
        now: DateTime<Utc>,
    ) -> Vec<ContactBinding> {
        let mut entry = self.bindings.entry(aor.to_string()).or_default();
        entry.retain(|c| c.contact_uri != contact_uri);
        if requested_expires > 0 {
            let capped = requested_expires.min(self.config.server_cap_expires);
            entry.push(ContactBinding {
                contact_uri: contact_uri.to_string(),
                expires_at: now + ChronoDuration::seconds(i64::from(capped)),
                user_agent,
                received_from_ip,
            });
        }
        let remaining = entry.clone();
        if remaining.is_empty() {
            drop(entry);
            self.bindings.remove(aor);
        }
        remaining
    }

    pub fn find_bindings(&self, aor: &str) -> Vec<ContactBinding> {
        self.bindings.get(aor).map(|b| b.clone()).unwrap_or_default()
    }

    pub fn is_registered(&self, aor: &str) -> bool {
        self.bindings.get(aor).is_some_and(|b| !b.is_empty())
    }
}

fn digest_response(ha1: &str, method: &str, digest_uri: &str, nonce: &str) -> String {
    let ha2 = hex_encode(&Md5::digest(format!("{method}:{digest_uri}").as_bytes()));
    hex_encode(&Md5::digest(format!("{ha1}:{nonce}:{ha2}").as_bytes()))
}

pub fn ha1(username: &str, realm: &str, password: &str) -> String {
    hex_encode(&Md5::digest(format!("{username}:{realm}:{password}").as_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn registrar() -> Registrar {
        Registrar::new(RegistrarConfig::new(b"test-secret".to_vec()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn nonce_round_trips_within_window() {
        let reg = registrar();
        let n = now();
        let nonce = reg.issue_nonce(n);
        reg.verify_nonce(&nonce, n + ChronoDuration::minutes(2)).unwrap();
    }

    #[test]
    fn nonce_goes_stale_outside_window() {
        let reg = registrar();
        let n = now();
        let nonce = reg.issue_nonce(n);
        assert!(reg.verify_nonce(&nonce, n + ChronoDuration::minutes(10)).is_err());
    }

    #[test]
    fn tampered_nonce_is_rejected() {
        let reg = registrar();
        let nonce = reg.issue_nonce(now());
        let tampered = format!("{nonce}x");
        assert!(reg.verify_nonce(&tampered, now()).is_err());
    }

    #[test]
    fn correct_digest_authenticates() {
        let reg = registrar();
        let password_hash = ha1("alice", "sbc.example.com", "secret");
        reg.add_user(SipUser::new("alice@sbc.example.com", password_hash, "sbc.example.com"));
        let n = now();
        let nonce = reg.issue_nonce(n);
        let response = digest_response(&ha1("alice", "sbc.example.com", "secret"), "REGISTER", "sip:sbc.example.com", &nonce);
        reg.authenticate("alice@sbc.example.com", "REGISTER", "sip:sbc.example.com", &nonce, &response, n).unwrap();
    }

    #[test]
    fn wrong_digest_increments_failures_and_locks_after_max() {
        let reg = registrar();
        reg.add_user(SipUser::new("bob@sbc.example.com", ha1("bob", "sbc.example.com", "secret"), "sbc.example.com"));
        let n = now();
        let nonce = reg.issue_nonce(n);
        for _ in 0..5 {
            let _ = reg.authenticate("bob@sbc.example.com", "REGISTER", "sip:sbc.example.com", &nonce, "wrong", n);
        }
        let user = reg.find_user("bob@sbc.example.com").unwrap();
        assert_eq!(user.failed_auth_attempts, 5);
        assert!(user.locked_until.is_some());
        let result = reg.authenticate("bob@sbc.example.com", "REGISTER", "sip:sbc.example.com", &nonce, "wrong", n);
        assert!(matches!(result, Err(Error::UserLocked(_))));
    }

    #[test]
    fn binding_upsert_dedups_by_contact_uri() {
        let reg = registrar();
        let n = now();
        reg.upsert_binding("alice@sbc.example.com", "sip:alice@192.0.2.1:5060", 3600, None, "192.0.2.1".into(), n);
        let bindings = reg.upsert_binding("alice@sbc.example.com", "sip:alice@192.0.2.1:5060", 1800, None, "192.0.2.1".into(), n);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].expires_at, n + ChronoDuration::seconds(1800));
    }

    #[test]
    fn expires_zero_removes_binding() {
        let reg = registrar();
        let n = now();
        reg.upsert_binding("alice@sbc.example.com", "sip:alice@192.0.2.1:5060", 3600, None, "192.0.2.1".into(), n);
        let bindings = reg.upsert_binding("alice@sbc.example.com", "sip:alice@192.0.2.1:5060", 0, None, "192.0.2.1".into(), n);
        assert!(bindings.is_empty());
        assert!(!reg.is_registered("alice@sbc.example.com"));
    }

    #[test]
    fn expires_is_capped_to_server_maximum() {
        let reg = registrar();
        let n = now();
        let bindings = reg.upsert_binding("alice@sbc.example.com", "sip:alice@192.0.2.1:5060", 999_999, None, "192.0.2.1".into(), n);
        assert_eq!(bindings[0].expires_at, n + ChronoDuration::seconds(3600));
    }
}
