// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event-loop seam.
//!
//! The core only needs to register and deregister read interest on raw
//! descriptors; the loop itself belongs to the hosting process.
//! [`PollLoop`] is a small mio-backed loop for processes that do not bring
//! their own.

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token};
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// Read-interest registration on the hosting event loop.
pub trait EventRegistry {
    /// Watch `fd` for readability. `name` is for diagnostics only.
    fn add_reader(&mut self, fd: RawFd, name: &str) -> io::Result<()>;

    /// Stop watching `fd`.
    fn remove_reader(&mut self, fd: RawFd) -> io::Result<()>;
}

/// Level of indirection for callers holding the loop behind `&mut`.
impl<T: EventRegistry + ?Sized> EventRegistry for &mut T {
    fn add_reader(&mut self, fd: RawFd, name: &str) -> io::Result<()> {
        (**self).add_reader(fd, name)
    }

    fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
        (**self).remove_reader(fd)
    }
}

/// mio `Poll` keyed by descriptor.
pub struct PollLoop {
    poll: Poll,
    events: Events,
    names: HashMap<RawFd, String>,
}

impl PollLoop {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(64),
            names: HashMap::new(),
        })
    }

    /// Diagnostic name of a registered descriptor.
    pub fn name(&self, fd: RawFd) -> Option<&str> {
        self.names.get(&fd).map(String::as_str)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Independent handle for registering descriptors while this loop is
    /// owned elsewhere.
    pub fn registrar(&self) -> io::Result<PollRegistrar> {
        Ok(PollRegistrar {
            registry: self.poll.registry().try_clone()?,
        })
    }

    /// Wait for readiness and return the readable descriptors.
    ///
    /// `None` waits indefinitely. An interrupted wait returns no descriptors.
    pub fn poll_readable(&mut self, timeout: Option<Duration>) -> io::Result<Vec<RawFd>> {
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }
        Ok(self
            .events
            .iter()
            .filter(|event| event.is_readable())
            .map(|event| event.token().0 as RawFd)
            .collect())
    }
}

fn register(registry: &Registry, fd: RawFd, name: &str) -> io::Result<()> {
    let token = usize::try_from(fd)
        .map(Token)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "negative descriptor"))?;
    registry.register(&mut SourceFd(&fd), token, Interest::READABLE)?;
    log::debug!("[EVT] watching fd {} ({})", fd, name);
    Ok(())
}

impl EventRegistry for PollLoop {
    fn add_reader(&mut self, fd: RawFd, name: &str) -> io::Result<()> {
        register(self.poll.registry(), fd, name)?;
        self.names.insert(fd, name.to_string());
        Ok(())
    }

    fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
        self.poll.registry().deregister(&mut SourceFd(&fd))?;
        if let Some(name) = self.names.remove(&fd) {
            log::debug!("[EVT] released fd {} ({})", fd, name);
        }
        Ok(())
    }
}

/// Registration handle cloned from a [`PollLoop`].
///
/// Descriptors registered here are reported by the owning loop's
/// [`PollLoop::poll_readable`], but not by [`PollLoop::name`].
pub struct PollRegistrar {
    registry: Registry,
}

impl EventRegistry for PollRegistrar {
    fn add_reader(&mut self, fd: RawFd, name: &str) -> io::Result<()> {
        register(&self.registry, fd, name)
    }

    fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
        self.registry.deregister(&mut SourceFd(&fd))?;
        log::debug!("[EVT] released fd {}", fd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn test_poll_reports_readable_socket() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_nonblocking(true).unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();

        let mut evt = PollLoop::new().unwrap();
        evt.add_reader(rx.as_raw_fd(), "Command Listener").unwrap();
        assert_eq!(evt.name(rx.as_raw_fd()), Some("Command Listener"));

        tx.send_to(&[1, 2, 3], rx.local_addr().unwrap()).unwrap();
        let ready = evt.poll_readable(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(ready, vec![rx.as_raw_fd()]);

        evt.remove_reader(rx.as_raw_fd()).unwrap();
        assert!(evt.is_empty());
    }

    #[test]
    fn test_registrar_feeds_owning_loop() {
        let rx = UdpSocket::bind("127.0.0.1:0").unwrap();
        rx.set_nonblocking(true).unwrap();
        let tx = UdpSocket::bind("127.0.0.1:0").unwrap();

        let mut evt = PollLoop::new().unwrap();
        let mut registrar = evt.registrar().unwrap();
        registrar.add_reader(rx.as_raw_fd(), "Multicast Listener").unwrap();

        tx.send_to(&[7], rx.local_addr().unwrap()).unwrap();
        let ready = evt.poll_readable(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(ready, vec![rx.as_raw_fd()]);
        registrar.remove_reader(rx.as_raw_fd()).unwrap();
    }
}
