// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared multicast command listeners.
//!
//! Any number of subscriptions share one socket per (group, port). A socket
//! is opened, joined and registered with the event loop on the first
//! subscription to its service, and left, deregistered and closed as soon as
//! its last subscription is removed.
//!
//! Delivery uses the legacy calling convention: the first byte of each
//! datagram is the command id, the rest is the payload. A subscription with a
//! negative filter receives every command.

use crate::config::{multicast_interface, ServiceDirectory, MAX_IP_PACKET_SIZE};
use crate::error::Result;
use crate::event::EventRegistry;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::os::unix::io::{AsRawFd, RawFd};

/// Subscription callback: `(socket, command id, payload, source)`.
pub type MulticastCallback = Box<dyn FnMut(&UdpSocket, u8, &[u8], SocketAddr)>;

/// Opens the listening socket for a (group, port).
pub type SocketOpener = Box<dyn FnMut(Ipv4Addr, u16) -> io::Result<UdpSocket>>;

/// Filter value matching every command id.
pub const WILDCARD: i32 = -1;

/// Bind `0.0.0.0:port` with address reuse, join `group` on the configured
/// interface and switch to non-blocking reads.
pub fn open_multicast_socket(group: Ipv4Addr, port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())?;

    let iface = multicast_interface();
    socket.join_multicast_v4(&group, &iface)?;
    log::debug!("[MCAST] join_multicast_v4({}) on {} port {}", group, iface, port);

    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

fn leave_group(socket: &UdpSocket, group: Ipv4Addr) {
    let iface = multicast_interface();
    if let Err(e) = socket.leave_multicast_v4(&group, &iface) {
        log::warn!("[MCAST] leave_multicast_v4({}) on {} failed: {}", group, iface, e);
    }
}

struct Subscription {
    filter: i32,
    callback: MulticastCallback,
}

impl Subscription {
    fn matches(&self, cmd: u8) -> bool {
        self.filter < 0 || self.filter == i32::from(cmd)
    }
}

struct McastSocketState {
    group: Ipv4Addr,
    port: u16,
    socket: UdpSocket,
    /// Most recent first.
    subscriptions: Vec<Subscription>,
}

impl McastSocketState {
    fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

/// Multicast subscriptions for one process.
pub struct MulticastManager<R: EventRegistry> {
    services: ServiceDirectory,
    events: R,
    opener: SocketOpener,
    sockets: Vec<McastSocketState>,
    rx_buf: Vec<u8>,
}

impl<R: EventRegistry> MulticastManager<R> {
    /// Manager using [`open_multicast_socket`].
    pub fn new(services: ServiceDirectory, events: R) -> Self {
        Self::with_opener(services, events, Box::new(open_multicast_socket))
    }

    /// Manager with a custom socket opener.
    pub fn with_opener(services: ServiceDirectory, events: R, opener: SocketOpener) -> Self {
        Self {
            services,
            events,
            opener,
            sockets: Vec::new(),
            rx_buf: vec![0u8; MAX_IP_PACKET_SIZE],
        }
    }

    pub fn events(&self) -> &R {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut R {
        &mut self.events
    }

    /// Number of open listening sockets.
    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Descriptor of the socket serving `service`, if open.
    pub fn socket_fd(&self, service: &str) -> Option<RawFd> {
        let (group, port) = self.services.multicast(service).ok()?;
        self.find(group, port).map(|i| self.sockets[i].fd())
    }

    /// Number of subscriptions on the socket serving `service`.
    pub fn subscription_count(&self, service: &str) -> usize {
        self.services
            .multicast(service)
            .ok()
            .and_then(|(group, port)| self.find(group, port))
            .map_or(0, |i| self.sockets[i].subscriptions.len())
    }

    fn find(&self, group: Ipv4Addr, port: u16) -> Option<usize> {
        self.sockets
            .iter()
            .position(|s| s.group == group && s.port == port)
    }

    /// Subscribe `callback` to commands matching `filter` on `service`.
    ///
    /// On resolution, open, join or registration failure nothing is left
    /// registered and the error is returned after logging.
    pub fn subscribe(&mut self, service: &str, filter: i32, callback: MulticastCallback) -> Result<()> {
        let (group, port) = self.services.multicast(service).map_err(|e| {
            log::warn!("[MCAST] cannot resolve multicast service {}", service);
            e
        })?;

        let index = match self.find(group, port) {
            Some(index) => index,
            None => self.open(service, group, port)?,
        };

        self.sockets[index].subscriptions.insert(0, Subscription { filter, callback });
        log::debug!(
            "[MCAST] subscribed {} filter={} ({} on socket)",
            service,
            filter,
            self.sockets[index].subscriptions.len()
        );
        Ok(())
    }

    fn open(&mut self, service: &str, group: Ipv4Addr, port: u16) -> Result<usize> {
        let socket = (self.opener)(group, port).map_err(|e| {
            log::warn!("[MCAST] failed to open multicast group for {}: {}", service, e);
            e
        })?;

        if let Err(e) = self.events.add_reader(socket.as_raw_fd(), "Multicast Listener") {
            log::warn!("[MCAST] failed to watch multicast socket for {}: {}", service, e);
            leave_group(&socket, group);
            return Err(e.into());
        }

        log::info!("[MCAST] listening on {}:{} for {}", group, port, service);
        self.sockets.push(McastSocketState {
            group,
            port,
            socket,
            subscriptions: Vec::new(),
        });
        Ok(self.sockets.len() - 1)
    }

    /// Remove every subscription on `service` whose filter equals `filter`.
    ///
    /// Closes the socket when no subscriptions remain. Returns the number of
    /// subscriptions removed.
    pub fn unsubscribe(&mut self, service: &str, filter: i32) -> usize {
        let Some(index) = self
            .services
            .multicast(service)
            .ok()
            .and_then(|(group, port)| self.find(group, port))
        else {
            return 0;
        };

        let state = &mut self.sockets[index];
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.filter != filter);
        let removed = before - state.subscriptions.len();

        if state.subscriptions.is_empty() {
            let state = self.sockets.remove(index);
            self.close(state);
        }
        removed
    }

    /// Drop every subscription and close every socket.
    pub fn cleanup(&mut self) {
        for state in std::mem::take(&mut self.sockets) {
            self.close(state);
        }
    }

    /// Leave the group, deregister, then close the socket.
    fn close(&mut self, state: McastSocketState) {
        leave_group(&state.socket, state.group);
        if let Err(e) = self.events.remove_reader(state.fd()) {
            log::warn!("[MCAST] deregister fd {} failed: {}", state.fd(), e);
        }
        log::info!("[MCAST] closed listener on {}:{}", state.group, state.port);
        drop(state);
    }

    /// Deliver pending datagrams on `fd` to matching subscriptions.
    ///
    /// Reads until the socket would block. Returns the number of datagrams
    /// delivered; an fd this manager does not own yields 0.
    pub fn on_readable(&mut self, fd: RawFd) -> io::Result<usize> {
        let Some(state) = self.sockets.iter_mut().find(|s| s.socket.as_raw_fd() == fd) else {
            return Ok(0);
        };

        let buf = &mut self.rx_buf;
        let mut delivered = 0;
        loop {
            let (len, src) = match state.socket.recv_from(buf) {
                Ok(r) => r,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if len == 0 {
                continue;
            }

            let cmd = buf[0];
            log::info!("[MCAST] received command 0x{:02x} from {}", cmd, src);
            for sub in state.subscriptions.iter_mut().filter(|s| s.matches(cmd)) {
                (sub.callback)(&state.socket, cmd, &buf[1..len], src);
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl<R: EventRegistry> Drop for MulticastManager<R> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Default)]
    struct Watched(HashSet<RawFd>);

    impl EventRegistry for Watched {
        fn add_reader(&mut self, fd: RawFd, _name: &str) -> io::Result<()> {
            self.0.insert(fd);
            Ok(())
        }

        fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
            self.0.remove(&fd);
            Ok(())
        }
    }

    fn loopback_opener() -> SocketOpener {
        Box::new(|_, _| {
            let socket = UdpSocket::bind("127.0.0.1:0")?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        })
    }

    fn services() -> ServiceDirectory {
        let mut dir = ServiceDirectory::new();
        dir.insert_multicast("telemetry", 50010, Ipv4Addr::new(239, 192, 0, 10))
            .insert("unicast-only", 50020);
        dir
    }

    #[test]
    fn test_unresolvable_service_leaves_nothing() {
        let mut mgr = MulticastManager::with_opener(services(), Watched::default(), loopback_opener());
        assert!(mgr.subscribe("unicast-only", WILDCARD, Box::new(|_, _, _, _| {})).is_err());
        assert!(mgr.subscribe("missing", WILDCARD, Box::new(|_, _, _, _| {})).is_err());
        assert_eq!(mgr.socket_count(), 0);
        assert!(mgr.events().0.is_empty());
    }

    #[test]
    fn test_open_failure_leaves_nothing() {
        let opener: SocketOpener =
            Box::new(|_, _| Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "no route")));
        let mut mgr = MulticastManager::with_opener(services(), Watched::default(), opener);
        assert!(mgr.subscribe("telemetry", 3, Box::new(|_, _, _, _| {})).is_err());
        assert_eq!(mgr.socket_count(), 0);
        assert!(mgr.events().0.is_empty());
    }

    #[test]
    fn test_one_socket_per_group() {
        let mut mgr = MulticastManager::with_opener(services(), Watched::default(), loopback_opener());
        mgr.subscribe("telemetry", WILDCARD, Box::new(|_, _, _, _| {})).unwrap();
        mgr.subscribe("telemetry", 7, Box::new(|_, _, _, _| {})).unwrap();

        assert_eq!(mgr.socket_count(), 1);
        assert_eq!(mgr.subscription_count("telemetry"), 2);
        let fd = mgr.socket_fd("telemetry").unwrap();
        assert!(mgr.events().0.contains(&fd));

        assert_eq!(mgr.unsubscribe("telemetry", 9), 0);
        assert_eq!(mgr.socket_count(), 1);
        assert_eq!(mgr.unsubscribe("telemetry", 7), 1);
        assert_eq!(mgr.unsubscribe("telemetry", WILDCARD), 1);
        assert_eq!(mgr.socket_count(), 0);
        assert!(mgr.events().0.is_empty());
    }

    /// Records whether each descriptor was still open when it was deregistered.
    #[derive(Default)]
    struct OpenAtRemoval(Vec<(RawFd, bool)>);

    impl EventRegistry for OpenAtRemoval {
        fn add_reader(&mut self, _fd: RawFd, _name: &str) -> io::Result<()> {
            Ok(())
        }

        fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
            let poll = mio::Poll::new()?;
            let mut source = mio::unix::SourceFd(&fd);
            let open = poll
                .registry()
                .register(&mut source, mio::Token(0), mio::Interest::READABLE)
                .is_ok();
            self.0.push((fd, open));
            Ok(())
        }
    }

    #[test]
    fn test_teardown_survives_failed_leave_and_closes_last() {
        // Loopback sockets never joined the group, so every leave fails.
        let mut mgr = MulticastManager::with_opener(services(), OpenAtRemoval::default(), loopback_opener());
        mgr.subscribe("telemetry", 4, Box::new(|_, _, _, _| {})).unwrap();
        let fd = mgr.socket_fd("telemetry").unwrap();

        assert_eq!(mgr.unsubscribe("telemetry", 4), 1);
        assert_eq!(mgr.socket_count(), 0);
        assert_eq!(mgr.events().0, vec![(fd, true)]);
    }

    #[test]
    fn test_watch_failure_leaves_nothing() {
        struct Refusing;
        impl EventRegistry for Refusing {
            fn add_reader(&mut self, _fd: RawFd, _name: &str) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::OutOfMemory, "loop full"))
            }
            fn remove_reader(&mut self, _fd: RawFd) -> io::Result<()> {
                Ok(())
            }
        }

        let mut mgr = MulticastManager::with_opener(services(), Refusing, loopback_opener());
        assert!(mgr.subscribe("telemetry", 4, Box::new(|_, _, _, _| {})).is_err());
        assert_eq!(mgr.socket_count(), 0);
    }

    #[test]
    fn test_cleanup_on_drop_deregisters() {
        let watched = Rc::new(RefCell::new(Watched::default()));

        struct Shared(Rc<RefCell<Watched>>);
        impl EventRegistry for Shared {
            fn add_reader(&mut self, fd: RawFd, name: &str) -> io::Result<()> {
                self.0.borrow_mut().add_reader(fd, name)
            }
            fn remove_reader(&mut self, fd: RawFd) -> io::Result<()> {
                self.0.borrow_mut().remove_reader(fd)
            }
        }

        {
            let mut mgr = MulticastManager::with_opener(
                services(),
                Shared(Rc::clone(&watched)),
                loopback_opener(),
            );
            mgr.subscribe("telemetry", 1, Box::new(|_, _, _, _| {})).unwrap();
            assert_eq!(watched.borrow().0.len(), 1);
        }
        assert!(watched.borrow().0.is_empty());
    }
}
