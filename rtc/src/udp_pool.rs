//! UDP I/O pool (C1, T1): owns a bound socket and a receive loop that hands
//! each datagram to a caller-supplied async handler, one at a time.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::pool::{Pool, MAX_UDP_SIZE};
use tokio::net::UdpSocket;
use tokio::sync::watch;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpPoolConfig {
    pub max_datagram_size: usize,
    pub pool_capacity: usize,
}

impl Default for UdpPoolConfig {
    fn default() -> Self {
        Self {
            max_datagram_size: MAX_UDP_SIZE,
            pool_capacity: 32,
        }
    }
}

type DatagramHandler = Box<dyn Fn(SocketAddr, Vec<u8>, usize) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// A bound UDP socket plus the bounded buffer pool its receive loop borrows
/// from. `send` performs a single `sendto`; the receive loop is started
/// separately via [`UdpIoPool::spawn_receive_loop`] once the caller has a
/// handler ready (the multiplex demuxer wired to STUN/DTLS/SRTP).
pub struct UdpIoPool {
    socket: Arc<UdpSocket>,
    pool: Arc<Pool>,
    max_datagram_size: usize,
}

impl UdpIoPool {
    pub async fn bind(addr: SocketAddr, config: &UdpPoolConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            pool: Arc::new(Pool::new(config.max_datagram_size, config.pool_capacity)),
            max_datagram_size: config.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Performs a single `sendto`.
    pub async fn send_to(&self, endpoint: SocketAddr, bytes: &[u8]) -> Result<()> {
        self.socket.send_to(bytes, endpoint).await?;
        Ok(())
    }

    /// Spawns the receive loop as its own task (T1). Runs until `stop` is
    /// set to `true`; `handler` is awaited to completion before the next
    /// `recv_from`, serializing per-socket packet processing as required.
    pub fn spawn_receive_loop(&self, handler: DatagramHandler, mut stop: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let socket = self.socket.clone();
        let pool = self.pool.clone();
        let max_datagram_size = self.max_datagram_size;

        tokio::spawn(async move {
            loop {
                let mut buf = pool.acquire();
                buf.resize(max_datagram_size, 0);

                tokio::select! {
                    _ = stop.changed() => {
                        if *stop.borrow() {
                            break;
                        }
                    }
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, from)) => {
                                handler(from, buf, len).await;
                            }
                            Err(e) => {
                                log::warn!("udp_pool: recv_from failed: {e}");
                                pool.release(buf);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Awaits a previously spawned receive loop's termination.
    pub async fn stop_async(handle: tokio::task::JoinHandle<()>, stop: &watch::Sender<bool>) {
        let _ = stop.send(true);
        let _ = handle.await;
    }
}
