use std::{
    io::ErrorKind,
    net::{IpAddr, SocketAddr},
};

use shared::error::CameraError;
use tokio::{net::UdpSocket, task::JoinHandle};
use tracing::{debug, warn};

use crate::{FrameSender, Reassembler};

const MAX_DATAGRAM_LEN: usize = 65_536;

/// UDP endpoint the camera streams live view to. The receive task is aborted when this is dropped.
pub struct LiveViewSocket {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl LiveViewSocket {
    /// Binds an ephemeral port on `address` and starts feeding datagrams into a fresh [`Reassembler`].
    pub async fn bind(address: IpAddr, frames: FrameSender) -> Result<Self, CameraError> {
        let socket = UdpSocket::bind(SocketAddr::new(address, 0))
            .await
            .map_err(|source| CameraError::Bind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| CameraError::Bind {
            address: address.to_string(),
            source,
        })?;
        debug!(%local_addr, "live view socket bound");

        let task = tokio::spawn(receive_loop(socket, Reassembler::new(frames)));
        Ok(Self { local_addr, task })
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for LiveViewSocket {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn receive_loop(socket: UdpSocket, mut reassembler: Reassembler) {
    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, _peer)) => {
                reassembler.process_datagram(&buf[..len]);
            }
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::Interrupted | ErrorKind::WouldBlock
                ) =>
            {
                debug!(error = %err, "transient live view receive error");
            }
            Err(err) => {
                warn!(error = %err, "live view receive loop stopped");
                break;
            }
        }
    }
}
