//! Bridge configuration

use std::net::Ipv4Addr;

/// Multicast group the discovery responder joins, an arbitrary address in
/// the administratively scoped block. Shared with the caller-side tooling.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 172, 243, 75);

/// Well-known discovery port.
pub const DISCOVERY_PORT: u16 = 1900;

/// Search target both ends of the discovery exchange must agree on.
pub const SEARCH_TARGET: &str = "drawbridge:run";

/// Construction-time settings for `Bridge::start`.
///
/// The defaults are the protocol constants. Tests pass `discovery_port: 0`
/// to get an OS-assigned port and query it unicast.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub multicast_group: Ipv4Addr,
    pub discovery_port: u16,
    pub search_target: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            multicast_group: MULTICAST_GROUP,
            discovery_port: DISCOVERY_PORT,
            search_target: SEARCH_TARGET.to_string(),
        }
    }
}
