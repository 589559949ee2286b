//! TCP endpoint wrapper.
//!
//! Socket framing itself is ambient plumbing — the spec's own Non-goals
//! place "the TCP wire framing" out of scope beyond the TLV layout.
//! This module supplies just enough of it to drive [`FrameSource`] and
//! [`FrameSink`] against a real non-blocking socket with reconnect and
//! a health-check ping; the integrity pipeline itself only ever sees
//! those two traits (see `asi_common::wire`), so it is equally drivable
//! by the in-memory doubles used in `asi_worker`'s tests.

use asi_common::config::EndpointConfig;
use asi_common::consts::TLV_FRAME_LEN;
use asi_common::wire::{FrameSink, FrameSource};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use tracing::{info, warn};

/// A reconnecting, non-blocking TCP client for one endpoint (VAM or CM).
pub struct TcpEndpoint {
    name: &'static str,
    addr: String,
    connect_timeout: Duration,
    reconnect_attempts: u32,
    reconnect_backoff: Duration,
    stream: Option<TcpStream>,
    read_buf: Vec<u8>,
}

impl TcpEndpoint {
    pub fn new(name: &'static str, cfg: &EndpointConfig, connect_timeout_ms: u64, reconnect_attempts: u32, reconnect_backoff_ms: u64) -> Self {
        Self {
            name,
            addr: format!("{}:{}", cfg.host, cfg.port),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            reconnect_attempts,
            reconnect_backoff: Duration::from_millis(reconnect_backoff_ms),
            stream: None,
            read_buf: Vec::with_capacity(TLV_FRAME_LEN * 4),
        }
    }

    fn ensure_connected(&mut self) -> std::io::Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let mut last_err = None;
        for attempt in 0..self.reconnect_attempts.max(1) {
            match self.try_connect() {
                Ok(stream) => {
                    info!(endpoint = self.name, "connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!(endpoint = self.name, attempt, error = %e, "connect failed");
                    last_err = Some(e);
                    std::thread::sleep(self.reconnect_backoff);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| std::io::Error::new(ErrorKind::TimedOut, "connect failed")))
    }

    fn try_connect(&self) -> std::io::Result<TcpStream> {
        let addrs: Vec<_> = std::net::ToSocketAddrs::to_socket_addrs(&self.addr)?.collect();
        let addr = addrs
            .into_iter()
            .next()
            .ok_or_else(|| std::io::Error::new(ErrorKind::AddrNotAvailable, "no addresses"))?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Send a 4-byte ping and require the round trip to complete within
    /// `deadline`.
    pub fn health_check(&mut self, deadline: Duration) -> bool {
        if self.ensure_connected().is_err() {
            return false;
        }
        let start = std::time::Instant::now();
        let ping = [0xA5u8; 4];
        if let Some(stream) = self.stream.as_mut() {
            if stream.write_all(&ping).is_err() {
                self.stream = None;
                return false;
            }
            let mut resp = [0u8; 4];
            loop {
                match stream.read_exact(&mut resp) {
                    Ok(()) => return true,
                    Err(e) if e.kind() == ErrorKind::WouldBlock => {
                        if start.elapsed() > deadline {
                            return false;
                        }
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => {
                        self.stream = None;
                        return false;
                    }
                }
            }
        }
        false
    }
}

impl FrameSource for TcpEndpoint {
    fn try_recv(&mut self) -> std::io::Result<Option<[u8; TLV_FRAME_LEN]>> {
        self.ensure_connected()?;
        let stream = self.stream.as_mut().expect("connected");

        let mut chunk = [0u8; TLV_FRAME_LEN];
        match stream.read(&mut chunk) {
            Ok(0) => {
                self.stream = None;
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "peer closed"))
            }
            Ok(n) => {
                self.read_buf.extend_from_slice(&chunk[..n]);
                if self.read_buf.len() >= TLV_FRAME_LEN {
                    let frame: [u8; TLV_FRAME_LEN] = self.read_buf[..TLV_FRAME_LEN].try_into().unwrap();
                    self.read_buf.drain(..TLV_FRAME_LEN);
                    Ok(Some(frame))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                self.stream = None;
                Err(e)
            }
        }
    }
}

impl FrameSink for TcpEndpoint {
    fn send(&mut self, frame: &[u8; TLV_FRAME_LEN]) -> std::io::Result<()> {
        self.ensure_connected()?;
        let stream = self.stream.as_mut().expect("connected");
        match stream.write_all(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.stream = None;
                Err(e)
            }
        }
    }
}

/// An in-memory [`FrameSource`]/[`FrameSink`] double for tests — no
/// socket, just queued frames (mirrors the teacher's pattern of testing
/// SHM-consuming logic against a fake segment rather than a live one).
#[derive(Default)]
pub struct MemoryChannel {
    pub inbound: std::collections::VecDeque<[u8; TLV_FRAME_LEN]>,
    pub outbound: Vec<[u8; TLV_FRAME_LEN]>,
}

impl FrameSource for MemoryChannel {
    fn try_recv(&mut self) -> std::io::Result<Option<[u8; TLV_FRAME_LEN]>> {
        Ok(self.inbound.pop_front())
    }
}

impl FrameSink for MemoryChannel {
    fn send(&mut self, frame: &[u8; TLV_FRAME_LEN]) -> std::io::Result<()> {
        self.outbound.push(*frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_channel_round_trips_frames() {
        let mut chan = MemoryChannel::default();
        let frame = [7u8; TLV_FRAME_LEN];
        chan.inbound.push_back(frame);
        assert_eq!(chan.try_recv().unwrap(), Some(frame));
        assert_eq!(chan.try_recv().unwrap(), None);

        chan.send(&frame).unwrap();
        assert_eq!(chan.outbound, vec![frame]);
    }
}
