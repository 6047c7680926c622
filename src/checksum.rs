/// One's-complement sum of big-endian 16-bit words with end-around carry,
/// complemented. Callers zero the checksum field before summing a header.
pub(crate) fn ipv4_header_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut words = header.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let Some(&byte) = words.remainder().first() {
        sum += u32::from(byte) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

/// A header carrying a correct checksum sums to 0xffff, so the folded
/// complement is zero.
pub(crate) fn verify(header: &[u8]) -> bool {
    ipv4_header_checksum(header) == 0
}
