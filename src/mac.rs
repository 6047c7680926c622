use pnet::datalink::MacAddr;
use rand::Rng;

/// Leading octet of every forged client address.
pub(crate) const SPOOFED_OUI_PREFIX: u8 = 0x00;

/// Fresh client hardware address: first octet pinned to 0x00, the other five
/// drawn uniformly from 0..=255.
pub(crate) fn spoofed_client_mac<R: Rng>(rng: &mut R) -> MacAddr {
    let mut mac = [0u8; 6];
    mac[0] = SPOOFED_OUI_PREFIX;
    rng.fill(&mut mac[1..]);
    MacAddr::new(mac[0], mac[1], mac[2], mac[3], mac[4], mac[5])
}
