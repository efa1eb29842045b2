//! UDP broadcast of snapshots.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use sensorhub_types::SensorSnapshot;
use tracing::debug;

use crate::{SinkError, SnapshotSink};

/// Sends each snapshot as a single JSON datagram.
///
/// Delivery is fire-and-forget: a failed send is reported to the caller
/// but never retried, and nothing is buffered.
#[derive(Debug)]
pub struct UdpBroadcastSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpBroadcastSink {
    /// Bind an ephemeral socket and send to `target` (e.g.
    /// `"255.255.255.255:5005"`).
    pub fn new(target: &str) -> Result<Self, SinkError> {
        let target = target
            .to_socket_addrs()
            .map_err(|_| SinkError::Address(target.to_string()))?
            .next()
            .ok_or_else(|| SinkError::Address(target.to_string()))?;

        let bind: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.set_broadcast(target.is_ipv4())?;
        debug!("UDP sink bound to {} sending to {}", socket.local_addr()?, target);

        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl SnapshotSink for UdpBroadcastSink {
    fn name(&self) -> &str {
        "udp"
    }

    fn emit(&mut self, snapshot: &SensorSnapshot) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(snapshot)?;
        self.socket.send_to(&payload, self.target)?;
        Ok(())
    }
}
