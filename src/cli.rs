use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use std::time::Duration;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// Floods a LAN segment with forged DHCP DISCOVER broadcasts, one random
/// client MAC per frame, until interrupted.
#[derive(Debug, Parser)]
#[command(name = "dhcp-starve", version, about)]
pub(crate) struct Cli {
    /// Interface to transmit on (e.g. eth0)
    #[arg(value_name = "interface_name", value_parser = NonEmptyStringValueParser::new())]
    pub(crate) interface: String,

    /// DISCOVER frames to send per second
    #[arg(
        value_name = "requests_per_second",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub(crate) rate: u32,
}

impl Cli {
    pub(crate) fn delay(&self) -> Duration {
        inter_packet_delay(self.rate)
    }
}

/// Microseconds between frames, truncated the same way the pacing has always
/// been computed: `1_000_000 / rps`.
pub(crate) fn inter_packet_delay(rate: u32) -> Duration {
    Duration::from_micros(MICROS_PER_SECOND / u64::from(rate.max(1)))
}
