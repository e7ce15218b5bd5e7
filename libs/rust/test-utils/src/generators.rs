//! Shared proptest generators.

use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use uuid::Uuid;

/// Generate random user identifiers.
pub fn user_id_strategy() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

/// Generate printable subject strings, including non-ASCII.
pub fn printable_subject_strategy() -> impl Strategy<Value = String> {
    "\\PC{1,64}"
}

/// Generate printable origin strings.
pub fn printable_origin_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        client_ip_strategy().prop_map(|ip| ip.to_string()),
        "\\PC{1,45}",
    ]
}

/// Generate IPv4 and IPv6 client addresses.
pub fn client_ip_strategy() -> impl Strategy<Value = IpAddr> {
    prop_oneof![
        any::<[u8; 4]>().prop_map(|o| IpAddr::V4(Ipv4Addr::from(o))),
        any::<[u16; 8]>().prop_map(|s| IpAddr::V6(Ipv6Addr::from(s))),
    ]
}

/// Generate two distinct client addresses.
pub fn distinct_ip_pair_strategy() -> impl Strategy<Value = (IpAddr, IpAddr)> {
    (client_ip_strategy(), client_ip_strategy()).prop_filter("addresses must differ", |(a, b)| a != b)
}

/// Generate TTL values (1 second to 30 days).
pub fn ttl_strategy() -> impl Strategy<Value = Duration> {
    (1u64..2_592_000).prop_map(Duration::from_secs)
}
