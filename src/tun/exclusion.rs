//! Full-tunnel exclusion set
//!
//! Thirty IPv4 blocks that together cover the public address space while
//! leaving out 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 and everything from
//! 224.0.0.0 upwards. Installing these through the tunnel sends public traffic
//! there without replacing the default route, so LAN and multicast traffic
//! keep their existing path.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;

const EXCLUSION_BLOCKS: [([u8; 4], u8); 30] = [
    ([0, 0, 0, 0], 5),
    ([8, 0, 0, 0], 7),
    ([11, 0, 0, 0], 8),
    ([12, 0, 0, 0], 6),
    ([16, 0, 0, 0], 4),
    ([32, 0, 0, 0], 3),
    ([64, 0, 0, 0], 2),
    ([128, 0, 0, 0], 3),
    ([160, 0, 0, 0], 5),
    ([168, 0, 0, 0], 6),
    ([172, 0, 0, 0], 12),
    ([172, 32, 0, 0], 11),
    ([172, 64, 0, 0], 10),
    ([172, 128, 0, 0], 9),
    ([173, 0, 0, 0], 8),
    ([174, 0, 0, 0], 7),
    ([176, 0, 0, 0], 4),
    ([192, 0, 0, 0], 9),
    ([192, 128, 0, 0], 11),
    ([192, 160, 0, 0], 13),
    ([192, 169, 0, 0], 16),
    ([192, 170, 0, 0], 15),
    ([192, 172, 0, 0], 14),
    ([192, 176, 0, 0], 12),
    ([192, 192, 0, 0], 10),
    ([193, 0, 0, 0], 8),
    ([194, 0, 0, 0], 7),
    ([196, 0, 0, 0], 6),
    ([200, 0, 0, 0], 5),
    ([208, 0, 0, 0], 4),
];

/// The ordered exclusion blocks
pub fn exclusion_set() -> Vec<Ipv4Network> {
    EXCLUSION_BLOCKS
        .iter()
        .filter_map(|(octets, prefix)| Ipv4Network::new(Ipv4Addr::from(*octets), *prefix).ok())
        .collect()
}

/// Whether two networks share any address
pub fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}
