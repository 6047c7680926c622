use crate::frame::FrameBuilder;
use crate::link::FrameSink;
use anyhow::Context;
use colored::Colorize;
use rand::Rng;
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stats {
    pub(crate) sent: u64,
    pub(crate) failed: u64,
}

/// Fixed-interval tick. The first tick completes immediately. A zero delay
/// (rates above one million per second) just yields to the runtime.
struct Pacer {
    interval: Option<Interval>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        let interval = (!delay.is_zero()).then(|| {
            let mut interval = time::interval(delay);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { interval }
    }

    async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

/// Builds and sends one DISCOVER per tick until `shutdown` resolves, then
/// closes `sink`. One line per accepted frame goes to `out`; send failures
/// are reported on stderr and do not stop the loop.
pub(crate) async fn run<S, R, F, W>(
    sink: &mut S,
    delay: Duration,
    rng: &mut R,
    shutdown: F,
    out: &mut W,
) -> anyhow::Result<Stats>
where
    S: FrameSink,
    R: Rng,
    F: Future<Output = io::Result<()>>,
    W: Write,
{
    let mut frames = FrameBuilder::new();
    let mut pacer = Pacer::new(delay);
    let mut stats = Stats::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            signal = &mut shutdown => {
                signal.context("failed to listen for Ctrl+C")?;
                break;
            }
            _ = pacer.tick() => {}
        }
        if sink.is_closed() {
            break;
        }

        let frame = frames.build(rng)?;
        match sink.send_frame(frame.bytes) {
            Ok(()) => {
                stats.sent += 1;
                writeln!(
                    out,
                    "{} {}",
                    "Sent DHCP Discover with MAC:".green(),
                    frame.client_mac
                )?;
            }
            Err(e) => {
                stats.failed += 1;
                eprintln!(
                    "{} (MAC {}, xid {:#010x}): {}",
                    "sendto failed".red(),
                    frame.client_mac,
                    frame.xid,
                    e
                );
            }
        }
    }

    sink.close();
    Ok(stats)
}
