use crate::error::StartupError;
use pnet::datalink::{self, Channel::Ethernet, DataLinkSender, NetworkInterface};
use std::io;

/// Where finished frames go. The emitter only ever talks to this trait, so the
/// raw socket can be swapped for an in-memory sink.
pub(crate) trait FrameSink {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Releases the underlying transmit handle. Returns `true` only for the
    /// call that actually closed it; later calls are no-ops.
    fn close(&mut self) -> bool;

    fn is_closed(&self) -> bool;
}

/// Raw link-layer transmit side bound to a single interface.
pub(crate) struct LinkHandle {
    name: String,
    index: u32,
    tx: Option<Box<dyn DataLinkSender>>,
}

impl LinkHandle {
    fn new(interface: &NetworkInterface, tx: Box<dyn DataLinkSender>) -> Self {
        Self {
            name: interface.name.clone(),
            index: interface.index,
            tx: Some(tx),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn index(&self) -> u32 {
        self.index
    }
}

impl FrameSink for LinkHandle {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        let tx = self.tx.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("link on {} is closed", self.name))
        })?;
        tx.send_to(frame, None)
            .unwrap_or_else(|| Err(io::Error::other("datalink sender has no room for the frame")))
    }

    fn close(&mut self) -> bool {
        self.tx.take().is_some()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_none()
    }
}

/// Opening `AF_PACKET` sockets needs root (or CAP_NET_RAW, which we do not
/// probe for).
pub(crate) fn require_privileges() -> Result<(), StartupError> {
    if is_privileged() {
        Ok(())
    } else {
        Err(StartupError::NotPrivileged)
    }
}

#[cfg(unix)]
fn is_privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_privileged() -> bool {
    true
}

pub(crate) fn resolve_interface(name: &str) -> Result<NetworkInterface, StartupError> {
    find_interface(datalink::interfaces(), name)
}

fn find_interface(
    interfaces: Vec<NetworkInterface>,
    name: &str,
) -> Result<NetworkInterface, StartupError> {
    let available: Vec<String> = interfaces.iter().map(|i| i.name.clone()).collect();
    interfaces
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| StartupError::InterfaceNotFound {
            name: name.to_string(),
            available,
        })
}

/// Opens the Ethernet channel on `interface`. The receive half is dropped
/// straight away; nothing is ever read back.
pub(crate) fn open(interface: &NetworkInterface) -> Result<LinkHandle, StartupError> {
    match datalink::channel(interface, Default::default()) {
        Ok(Ethernet(tx, _)) => Ok(LinkHandle::new(interface, tx)),
        Ok(_) => Err(StartupError::UnsupportedChannel),
        Err(e) => Err(StartupError::Channel(e)),
    }
}
