//! C8 → C9 routing decision for an incoming INVITE, per spec.md §4.8.

use crate::error::{Error, Result};
use crate::registrar::Registrar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trunk {
    pub name: String,
    pub uri: String,
    pub supports_outbound: bool,
    /// Lower sorts first.
    pub preference: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// `to_user` is a locally registered AOR and the caller is an
    /// authenticated local user: bridge to the registered contact.
    LocalCall { contact_uri: String },
    /// Authenticated local caller placing a call to a non-local `to`:
    /// route out through the named trunk.
    Outbound { trunk: Trunk },
    /// Unauthenticated or external caller: the system default, bridge to
    /// the AI backend.
    InboundToAi,
}

/// Decides how an INVITE should be handled, given whether its `From` was
/// authenticated as a local user and the set of trunks configured for
/// outbound use.
pub fn route_invite(registrar: &Registrar, to_aor: &str, from_is_authenticated_local: bool, trunks: &[Trunk]) -> Result<RoutingDecision> {
    if from_is_authenticated_local && registrar.is_registered(to_aor) {
        let bindings = registrar.find_bindings(to_aor);
        let contact_uri = bindings.first().map(|b| b.contact_uri.clone()).ok_or_else(|| Error::NoBinding(to_aor.to_string()))?;
        return Ok(RoutingDecision::LocalCall { contact_uri });
    }

    if from_is_authenticated_local {
        let mut candidates: Vec<&Trunk> = trunks.iter().filter(|t| t.supports_outbound).collect();
        candidates.sort_by_key(|t| t.preference);
        return candidates.first().map(|t| RoutingDecision::Outbound { trunk: (*t).clone() }).ok_or(Error::NoOutboundTrunk);
    }

    Ok(RoutingDecision::InboundToAi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::RegistrarConfig;
    use chrono::Utc;

    fn registrar_with_local_binding(aor: &str, contact: &str) -> Registrar {
        let reg = Registrar::new(RegistrarConfig::new(b"secret".to_vec()));
        reg.upsert_binding(aor, contact, 3600, None, "192.0.2.1".into(), Utc::now());
        reg
    }

    #[test]
    fn authenticated_call_to_registered_aor_routes_locally() {
        let reg = registrar_with_local_binding("alice@sbc.local", "sip:alice@192.0.2.1:5060");
        let decision = route_invite(&reg, "alice@sbc.local", true, &[]).unwrap();
        assert_eq!(decision, RoutingDecision::LocalCall { contact_uri: "sip:alice@192.0.2.1:5060".into() });
    }

    #[test]
    fn authenticated_call_to_unregistered_aor_goes_outbound() {
        let reg = Registrar::new(RegistrarConfig::new(b"secret".to_vec()));
        let trunk = Trunk { name: "carrier-a".into(), uri: "sip:carrier-a.example.com".into(), supports_outbound: true, preference: 1 };
        let decision = route_invite(&reg, "+15551234567", true, std::slice::from_ref(&trunk)).unwrap();
        assert_eq!(decision, RoutingDecision::Outbound { trunk });
    }

    #[test]
    fn outbound_without_trunk_is_rejected() {
        let reg = Registrar::new(RegistrarConfig::new(b"secret".to_vec()));
        let result = route_invite(&reg, "+15551234567", true, &[]);
        assert!(matches!(result, Err(Error::NoOutboundTrunk)));
    }

    #[test]
    fn outbound_picks_lowest_preference_trunk() {
        let reg = Registrar::new(RegistrarConfig::new(b"secret".to_vec()));
        let low = Trunk { name: "primary".into(), uri: "sip:primary.example.com".into(), supports_outbound: true, preference: 1 };
        let high = Trunk { name: "backup".into(), uri: "sip:backup.example.com".into(), supports_outbound: true, preference: 9 };
        let decision = route_invite(&reg, "+15551234567", true, &[high.clone(), low.clone()]).unwrap();
        assert_eq!(decision, RoutingDecision::Outbound { trunk: low });
    }

    #[test]
    fn unauthenticated_external_call_bridges_to_ai() {
        let reg = Registrar::new(RegistrarConfig::new(b"secret".to_vec()));
        let decision = route_invite(&reg, "alice@sbc.local", false, &[]).unwrap();
        assert_eq!(decision, RoutingDecision::InboundToAi);
    }
}
