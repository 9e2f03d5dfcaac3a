use ipnetwork::Ipv4Network;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Returns the numerically smallest host address in `subnet` that isn't in
/// `used`, skipping the network and broadcast addresses (C1).
///
/// `/31` and `/32` have no conventional host range and always return `None`.
/// An invalid subnet never panics; it simply yields no allocation.
pub fn next_free_host(subnet: &Ipv4Network, used: &HashSet<Ipv4Addr>) -> Option<Ipv4Addr> {
    if subnet.prefix() > 30 {
        return None;
    }

    subnet.iter().find(|host| {
        *host != subnet.network() && *host != subnet.broadcast() && !used.contains(host)
    })
}

/// Parses a subnet string the way the persistence layer stores it
/// (e.g. `"10.0.0.0/24"`), returning `None` rather than erroring on anything
/// malformed or non-IPv4.
pub fn parse_subnet(subnet: &str) -> Option<Ipv4Network> {
    subnet.parse().ok()
}
