//! DHCP DISCOVER frame assembly.
//!
//! One [`FrameBuilder`] owns a fixed 64 KiB buffer that is zeroed and rebuilt
//! for every frame. The sections are written through pnet's mutable packet
//! views (Ethernet, IPv4, UDP) and the DHCP payload is encoded with dhcproto.
//! Lengths and the IPv4 header checksum are filled in by the finalisation
//! steps once the payload size is known.

use crate::checksum;
use crate::mac::spoofed_client_mac;
use anyhow::{Context, bail};
use dhcproto::{Encodable, Encoder, v4};
use pnet::datalink::MacAddr;
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::{Ipv4Flags, MutableIpv4Packet};
use pnet::packet::udp::MutableUdpPacket;
use rand::Rng;
use std::net::Ipv4Addr;
use std::ops::Range;

pub(crate) const FRAME_CAPACITY: usize = 65536;

pub(crate) const ETHERNET_HEADER_LEN: usize = 14;
pub(crate) const IPV4_HEADER_LEN: usize = 20;
pub(crate) const UDP_HEADER_LEN: usize = 8;
/// BOOTP fixed fields (236 bytes) plus the magic cookie.
pub(crate) const DHCP_FIXED_LEN: usize = 240;

pub(crate) const DHCP_CLIENT_PORT: u16 = 68;
pub(crate) const DHCP_SERVER_PORT: u16 = 67;

/// Message Type = DISCOVER, then End.
pub(crate) const DISCOVER_OPTIONS: [u8; 4] = [53, 1, 1, 255];

const IPV4_VERSION: u8 = 4;
const IPV4_IHL_WORDS: u8 = 5;
const IPV4_TTL: u8 = 64;
const IPV4_CHECKSUM_OFFSET: usize = 10;

const UDP_OFFSET: usize = ETHERNET_HEADER_LEN + IPV4_HEADER_LEN;
const DHCP_OFFSET: usize = UDP_OFFSET + UDP_HEADER_LEN;

/// A frame ready for transmission, borrowed from the builder's buffer.
#[derive(Debug)]
pub(crate) struct Discover<'a> {
    pub(crate) client_mac: MacAddr,
    pub(crate) xid: u32,
    pub(crate) bytes: &'a [u8],
}

pub(crate) struct FrameBuilder {
    buf: Box<[u8]>,
}

impl FrameBuilder {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0u8; FRAME_CAPACITY].into_boxed_slice(),
        }
    }

    /// Zeroes the buffer and writes a complete Ethernet + IPv4 + UDP + DHCP
    /// DISCOVER frame with a fresh spoofed MAC, transaction ID and IP
    /// identification.
    pub(crate) fn build<R: Rng>(&mut self, rng: &mut R) -> anyhow::Result<Discover<'_>> {
        self.buf.fill(0);

        let client_mac = spoofed_client_mac(rng);
        let xid: u32 = rng.random();
        let identification: u16 = rng.random();

        let dhcp = encode_discover(client_mac, xid)?;
        let udp_len = UDP_HEADER_LEN + dhcp.len();
        let ip_len = IPV4_HEADER_LEN + udp_len;
        let frame_len = ETHERNET_HEADER_LEN + ip_len;
        if frame_len > self.buf.len() {
            bail!("DISCOVER frame of {frame_len} bytes exceeds the {FRAME_CAPACITY}-byte buffer");
        }

        self.write_ethernet(client_mac)?;
        self.write_ipv4(identification)?;
        self.write_udp(&dhcp)?;
        self.finalize_lengths(ip_len, udp_len)?;
        self.finalize_ipv4_checksum();

        Ok(Discover {
            client_mac,
            xid,
            bytes: &self.buf[..frame_len],
        })
    }

    fn write_ethernet(&mut self, source: MacAddr) -> anyhow::Result<()> {
        let mut eth = MutableEthernetPacket::new(&mut self.buf[..ETHERNET_HEADER_LEN])
            .context("frame buffer too small for Ethernet header")?;
        eth.set_destination(MacAddr::broadcast());
        eth.set_source(source);
        eth.set_ethertype(EtherTypes::Ipv4);
        Ok(())
    }

    fn write_ipv4(&mut self, identification: u16) -> anyhow::Result<()> {
        let mut ip = MutableIpv4Packet::new(&mut self.buf[ipv4_header_range()])
            .context("frame buffer too small for IPv4 header")?;
        ip.set_version(IPV4_VERSION);
        ip.set_header_length(IPV4_IHL_WORDS);
        ip.set_dscp(0);
        ip.set_ecn(0);
        ip.set_identification(identification);
        ip.set_flags(Ipv4Flags::DontFragment);
        ip.set_fragment_offset(0);
        ip.set_ttl(IPV4_TTL);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Udp);
        ip.set_source(Ipv4Addr::UNSPECIFIED);
        ip.set_destination(Ipv4Addr::BROADCAST);
        Ok(())
    }

    // UDP checksum is optional over IPv4 and stays zero.
    fn write_udp(&mut self, dhcp: &[u8]) -> anyhow::Result<()> {
        let end = DHCP_OFFSET + dhcp.len();
        let mut udp = MutableUdpPacket::new(&mut self.buf[UDP_OFFSET..end])
            .context("frame buffer too small for UDP datagram")?;
        udp.set_source(DHCP_CLIENT_PORT);
        udp.set_destination(DHCP_SERVER_PORT);
        udp.set_checksum(0);
        udp.set_payload(dhcp);
        Ok(())
    }

    fn finalize_lengths(&mut self, ip_len: usize, udp_len: usize) -> anyhow::Result<()> {
        let ip_total = u16::try_from(ip_len).context("IPv4 total length overflows u16")?;
        let udp_total = u16::try_from(udp_len).context("UDP length overflows u16")?;

        MutableUdpPacket::new(&mut self.buf[UDP_OFFSET..DHCP_OFFSET])
            .context("frame buffer too small for UDP header")?
            .set_length(udp_total);
        MutableIpv4Packet::new(&mut self.buf[ipv4_header_range()])
            .context("frame buffer too small for IPv4 header")?
            .set_total_length(ip_total);
        Ok(())
    }

    fn finalize_ipv4_checksum(&mut self) {
        let range = ipv4_header_range();
        let field = range.start + IPV4_CHECKSUM_OFFSET;
        self.buf[field..field + 2].fill(0);
        let sum = checksum::ipv4_header_checksum(&self.buf[range]);
        self.buf[field..field + 2].copy_from_slice(&sum.to_be_bytes());
        debug_assert!(checksum::verify(&self.buf[ipv4_header_range()]));
    }
}

fn ipv4_header_range() -> Range<usize> {
    ETHERNET_HEADER_LEN..UDP_OFFSET
}

/// BOOTREQUEST/DISCOVER carrying only the Message Type option. sname, file
/// and the chaddr tail past the six MAC octets stay zero.
fn encode_discover(client_mac: MacAddr, xid: u32) -> anyhow::Result<Vec<u8>> {
    let chaddr = [
        client_mac.0,
        client_mac.1,
        client_mac.2,
        client_mac.3,
        client_mac.4,
        client_mac.5,
    ];

    let mut msg = v4::Message::default();
    msg.set_opcode(v4::Opcode::BootRequest)
        .set_htype(v4::HType::Eth)
        .set_chaddr(&chaddr)
        .set_hops(0)
        .set_xid(xid)
        .set_secs(0)
        .set_flags(v4::Flags::default().set_broadcast())
        .set_ciaddr(Ipv4Addr::UNSPECIFIED);
    msg.opts_mut()
        .insert(v4::DhcpOption::MessageType(v4::MessageType::Discover));

    let mut buf = Vec::with_capacity(DHCP_FIXED_LEN + DISCOVER_OPTIONS.len());
    let mut e = Encoder::new(&mut buf);
    msg.encode(&mut e).context("encoding DHCP DISCOVER")?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::{Decodable, Decoder};
    use pnet::packet::Packet;
    use pnet::packet::ethernet::EthernetPacket;
    use pnet::packet::ipv4::{self, Ipv4Packet};
    use pnet::packet::udp::UdpPacket;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const DHCP_MAGIC_COOKIE: u32 = 0x6382_5363;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x5eed)
    }

    #[test]
    fn frame_and_header_lengths() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        assert_eq!(frame.bytes.len(), ETHERNET_HEADER_LEN + 272);

        let ip = Ipv4Packet::new(&frame.bytes[ETHERNET_HEADER_LEN..]).unwrap();
        assert_eq!(ip.get_total_length(), 272);

        let udp = UdpPacket::new(&frame.bytes[UDP_OFFSET..]).unwrap();
        assert_eq!(udp.get_length(), 252);
        assert_eq!(udp.payload().len(), DHCP_FIXED_LEN + DISCOVER_OPTIONS.len());
    }

    #[test]
    fn ethernet_header() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        let eth = EthernetPacket::new(frame.bytes).unwrap();

        assert_eq!(eth.get_destination(), MacAddr::broadcast());
        assert_eq!(&frame.bytes[..6], &[0xff; 6]);
        assert_eq!(eth.get_source(), frame.client_mac);
        assert_eq!(eth.get_source().0, 0x00);
        assert_eq!(eth.get_ethertype(), EtherTypes::Ipv4);
    }

    #[test]
    fn ipv4_header_fields() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        let ip = Ipv4Packet::new(&frame.bytes[ETHERNET_HEADER_LEN..]).unwrap();

        assert_eq!(ip.get_version(), 4);
        assert_eq!(ip.get_header_length(), 5);
        assert_eq!(ip.get_dscp(), 0);
        assert_eq!(ip.get_ecn(), 0);
        assert_eq!(ip.get_flags(), Ipv4Flags::DontFragment);
        assert_eq!(ip.get_fragment_offset(), 0);
        assert_eq!(ip.get_ttl(), 64);
        assert_eq!(ip.get_next_level_protocol(), IpNextHeaderProtocols::Udp);
        assert_eq!(ip.get_source(), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(ip.get_destination(), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(&frame.bytes[20..22], &[0x40, 0x00]);
    }

    #[test]
    fn ipv4_checksum_round_trips() {
        let mut builder = FrameBuilder::new();
        let mut rng = rng();
        for _ in 0..64 {
            let frame = builder.build(&mut rng).unwrap();
            let header = &frame.bytes[ipv4_header_range()];
            assert!(checksum::verify(header));

            let carried = u16::from_be_bytes([header[10], header[11]]);
            let mut zeroed = header.to_vec();
            zeroed[10..12].fill(0);
            assert_eq!(checksum::ipv4_header_checksum(&zeroed), carried);

            let ip = Ipv4Packet::new(header).unwrap();
            assert_eq!(ipv4::checksum(&ip), carried);
        }
    }

    #[test]
    fn udp_header_fields() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        let udp = UdpPacket::new(&frame.bytes[UDP_OFFSET..]).unwrap();

        assert_eq!(udp.get_source(), 68);
        assert_eq!(udp.get_destination(), 67);
        assert_eq!(udp.get_checksum(), 0);
    }

    #[test]
    fn dhcp_payload_is_bit_exact() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        let dhcp = &frame.bytes[DHCP_OFFSET..];
        let mac = frame.client_mac;

        assert_eq!(&dhcp[..4], &[1, 1, 6, 0]);
        assert_eq!(&dhcp[4..8], &frame.xid.to_be_bytes());
        assert_eq!(&dhcp[8..10], &[0, 0]);
        assert_eq!(&dhcp[10..12], &[0x80, 0x00]);
        assert!(dhcp[12..28].iter().all(|&b| b == 0));
        assert_eq!(&dhcp[28..34], &[mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]);
        assert!(dhcp[34..44].iter().all(|&b| b == 0));
        assert!(dhcp[44..236].iter().all(|&b| b == 0), "sname/file must stay zero");
        assert_eq!(&dhcp[236..240], &DHCP_MAGIC_COOKIE.to_be_bytes());
        assert_eq!(&dhcp[240..], &DISCOVER_OPTIONS);
    }

    #[test]
    fn dhcp_payload_decodes_as_discover() {
        let mut builder = FrameBuilder::new();
        let frame = builder.build(&mut rng()).unwrap();
        let msg = v4::Message::decode(&mut Decoder::new(&frame.bytes[DHCP_OFFSET..])).unwrap();

        assert_eq!(msg.opcode(), v4::Opcode::BootRequest);
        assert_eq!(msg.xid(), frame.xid);
        assert!(msg.flags().broadcast());
        let mac = frame.client_mac;
        assert_eq!(&msg.chaddr()[..6], &[mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]);
        assert_eq!(
            msg.opts().get(v4::OptionCode::MessageType),
            Some(&v4::DhcpOption::MessageType(v4::MessageType::Discover))
        );
    }

    #[test]
    fn every_build_uses_fresh_identity() {
        let mut builder = FrameBuilder::new();
        let mut rng = rng();
        let first = builder.build(&mut rng).map(|f| (f.client_mac, f.xid)).unwrap();
        let second = builder.build(&mut rng).map(|f| (f.client_mac, f.xid)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn stale_bytes_are_cleared_between_frames() {
        let mut builder = FrameBuilder::new();
        builder.buf.fill(0xaa);
        let len = builder.build(&mut rng()).unwrap().bytes.len();

        assert!(builder.buf[len..].iter().all(|&b| b == 0));
        assert!(builder.buf[DHCP_OFFSET + 44..DHCP_OFFSET + 236].iter().all(|&b| b == 0));
    }
}
