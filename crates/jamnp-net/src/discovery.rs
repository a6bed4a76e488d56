//! Peer discovery (SPEC_FULL §4.5 "Static peer discovery").
//!
//! JAM validators are a closed set published in `ValidatorMetadata`, not an
//! open mesh found by LAN broadcast or a DHT, so there is exactly one
//! `Discovery` implementation: resolving a validator index to the endpoint
//! its metadata already carries. The trait still exists (mirroring the
//! teacher's `Discovery` shape) so a consumer can be written against the
//! interface rather than the concrete resolver.

use jamnp_core::ids::{Endpoint, ValidatorIndex};

use crate::validator_set::ValidatorSetManager;

/// Resolves a validator index to its current network endpoint, if any.
pub trait Discovery: Send + Sync {
    fn resolve(&self, validator: ValidatorIndex) -> Option<Endpoint>;
}

/// The one real implementation: reads current/previous/next off a
/// [`ValidatorSetManager`] (current preferred, falling back to previous then
/// next, matching `ValidatorSetManager::find_by_endpoint`'s search order).
pub struct ValidatorSetDiscovery<'a> {
    validator_set: &'a ValidatorSetManager,
}

impl<'a> ValidatorSetDiscovery<'a> {
    pub fn new(validator_set: &'a ValidatorSetManager) -> Self {
        Self { validator_set }
    }
}

impl Discovery for ValidatorSetDiscovery<'_> {
    fn resolve(&self, validator: ValidatorIndex) -> Option<Endpoint> {
        for set in [self.validator_set.current(), self.validator_set.previous(), self.validator_set.next()] {
            if let Some(meta) = set.get(&validator) {
                if let Some(endpoint) = &meta.endpoint {
                    return Some(endpoint.clone());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamnp_core::ids::ValidatorMetadata;
    use std::collections::HashMap;

    #[test]
    fn resolves_from_current_then_falls_back() {
        let mut genesis = HashMap::new();
        genesis.insert(0u16, ValidatorMetadata::new([1u8; 32], [1u8; 32], Some(Endpoint::new("10.0.0.1", 1, [1u8; 32]))));
        let vset = ValidatorSetManager::new(0, genesis);
        let discovery = ValidatorSetDiscovery::new(&vset);

        assert_eq!(discovery.resolve(0).unwrap().host, "10.0.0.1");
        assert!(discovery.resolve(99).is_none());
    }
}
