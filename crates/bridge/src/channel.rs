// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{BridgeError, BridgeResult, CHANNEL_TAG};
use simwire_core::ByteFifo;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Which logical byte stream a channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Command,
    Console,
}

impl ChannelRole {
    /// Prefix used when mirroring flushed output to stdout.
    fn echo_prefix(self) -> &'static str {
        match self {
            ChannelRole::Command => "> ",
            ChannelRole::Console => "",
        }
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRole::Command => write!(f, "command"),
            ChannelRole::Console => write!(f, "console"),
        }
    }
}

/// What a non-blocking read pass produced this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    /// No client, no data ready, or no queue space left.
    Idle,
    /// This many bytes were merged into the read-ahead queue.
    Bytes(usize),
    /// EOF or a hard error; the connection was torn down.
    Disconnected,
}

/// One logical TCP channel: a listening socket, at most one live client
/// connection, and the transmit assembly buffer collecting core output
/// headed for that client.
///
/// A channel starts unconnected. Accepting binds it to a client; any read
/// EOF/error or send error tears the connection down again, and the
/// listener picks up the next client on a later tick.
#[derive(Debug)]
pub struct Channel {
    role: ChannelRole,
    listener: TcpListener,
    stream: Option<TcpStream>,
    txbuf: Vec<u8>,
    flush_capacity: usize,
    echo_stdout: bool,
}

impl Channel {
    /// Bind this channel's listener on all interfaces. A bind failure is
    /// fatal: a channel that can never accept is useless, so the error
    /// propagates instead of being retried.
    pub fn listen(role: ChannelRole, port: u16, flush_capacity: usize) -> BridgeResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .and_then(|l| l.set_nonblocking(true).map(|_| l))
            .map_err(|source| BridgeError::Bind { role, port, source })?;
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("{} channel listening on port {}", role, addr.port());
        }
        Ok(Self {
            role,
            listener,
            stream: None,
            txbuf: Vec::with_capacity(flush_capacity),
            flush_capacity,
            echo_stdout: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Mirror flushed output to stdout (command lines get a `"> "` prefix).
    pub fn set_echo_stdout(&mut self, echo: bool) {
        self.echo_stdout = echo;
    }

    /// Actual listener address; useful after binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept a pending client if one is waiting. Non-blocking: at most one
    /// active connection per channel, later attempts stay queued in the OS
    /// backlog until this one goes away.
    pub(crate) fn poll_accept(&mut self) -> bool {
        if self.stream.is_some() {
            return false;
        }
        match self.listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    tracing::warn!("{}: dropping {}: {}", self.role, peer, e);
                    return false;
                }
                tracing::info!("{} channel connected to {}", self.role, peer);
                self.stream = Some(stream);
                true
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(e) => {
                tracing::warn!("{} accept failed: {}", self.role, e);
                false
            }
        }
    }

    /// Pull whatever the client has ready, bounded by the queue's remaining
    /// space, and merge it. `tag` sets bit 7 on each byte read, the
    /// command-channel framing on a shared wire.
    ///
    /// `WouldBlock` means no data this tick; only a zero-length read (true
    /// EOF) or a hard error tears the connection down.
    pub(crate) fn read_into(&mut self, fifo: &mut ByteFifo, tag: bool) -> ReadOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return ReadOutcome::Idle;
        };
        let mut buf = [0u8; 256];
        let want = fifo.remaining().min(buf.len());
        if want == 0 {
            return ReadOutcome::Idle;
        }
        match stream.read(&mut buf[..want]) {
            Ok(0) => {
                self.teardown("peer closed");
                ReadOutcome::Disconnected
            }
            Ok(n) => {
                if tag {
                    for byte in &mut buf[..n] {
                        *byte |= CHANNEL_TAG;
                    }
                }
                fifo.extend_from_slice(&buf[..n]);
                ReadOutcome::Bytes(n)
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                ReadOutcome::Idle
            }
            Err(e) => {
                self.teardown(&e.to_string());
                ReadOutcome::Disconnected
            }
        }
    }

    /// Append one byte of core output to the assembly buffer, flushing on a
    /// line terminator or when the buffer reaches capacity. Returns the
    /// flushed byte count when a flush happened.
    pub(crate) fn push_byte(&mut self, byte: u8) -> Option<usize> {
        self.txbuf.push(byte);
        if byte == b'\n' || self.txbuf.len() >= self.flush_capacity {
            return Some(self.flush());
        }
        None
    }

    /// Write the assembly buffer to the client as one send and clear it.
    /// Returns the byte count handed to the OS. With no client connected
    /// the buffered output is dropped. A short write is logged and the
    /// unsent tail dropped; only an outright send error tears down.
    pub(crate) fn flush(&mut self) -> usize {
        if self.txbuf.is_empty() {
            return 0;
        }
        if self.echo_stdout {
            print!(
                "{}{}",
                self.role.echo_prefix(),
                String::from_utf8_lossy(&self.txbuf)
            );
            let _ = io::stdout().flush();
        }
        let sent = match self.stream.as_mut() {
            None => {
                tracing::debug!(
                    "{}: no client, dropping {} buffered bytes",
                    self.role,
                    self.txbuf.len()
                );
                0
            }
            Some(stream) => match stream.write(&self.txbuf) {
                Ok(n) => {
                    if n < self.txbuf.len() {
                        tracing::warn!(
                            "{}: only sent {} bytes of {}",
                            self.role,
                            n,
                            self.txbuf.len()
                        );
                    }
                    n
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::warn!("{}: only sent 0 bytes of {}", self.role, self.txbuf.len());
                    0
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.teardown(&reason);
                    0
                }
            },
        };
        self.txbuf.clear();
        sent
    }

    /// Final flush: terminate any partial line so nothing is silently
    /// lost, then drop the connection. Idempotent.
    pub(crate) fn finish(&mut self) {
        if !self.txbuf.is_empty() {
            self.txbuf.push(b'\n');
            self.flush();
        }
        self.stream = None;
    }

    /// Drop the client connection and its buffered receive state. The
    /// listener stays open, so the channel is eligible for re-accept on the
    /// next tick.
    pub(crate) fn teardown(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            tracing::info!("closing {} connection: {}", self.role, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpStream;
    use std::time::{Duration, Instant};

    fn test_channel(flush_capacity: usize) -> Channel {
        Channel::listen(ChannelRole::Console, 0, flush_capacity).unwrap()
    }

    fn connect(chan: &mut Channel) -> TcpStream {
        let addr = chan.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !chan.poll_accept() {
            assert!(Instant::now() < deadline, "accept never completed");
        }
        client
    }

    fn read_until(chan: &mut Channel, fifo: &mut ByteFifo, tag: bool) -> ReadOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match chan.read_into(fifo, tag) {
                ReadOutcome::Idle => {
                    assert!(Instant::now() < deadline, "no data arrived");
                }
                outcome => return outcome,
            }
        }
    }

    #[test]
    fn test_accept_is_nonblocking_and_single_client() {
        let mut chan = test_channel(16);
        assert!(!chan.poll_accept());
        let _client = connect(&mut chan);
        assert!(chan.is_connected());
        assert!(!chan.poll_accept());
    }

    #[test]
    fn test_read_tags_command_bytes() {
        let mut chan = test_channel(16);
        let mut client = connect(&mut chan);
        client.write_all(&[0x41, 0x42]).unwrap();

        let mut fifo = ByteFifo::new(16);
        let outcome = read_until(&mut chan, &mut fifo, true);
        assert!(matches!(outcome, ReadOutcome::Bytes(_)));
        assert_eq!(fifo.pop(), Some(0xC1));
        assert_eq!(fifo.pop(), Some(0xC2));
    }

    #[test]
    fn test_eof_tears_down_and_allows_reaccept() {
        let mut chan = test_channel(16);
        let client = connect(&mut chan);
        drop(client);

        let mut fifo = ByteFifo::new(16);
        assert_eq!(
            read_until(&mut chan, &mut fifo, false),
            ReadOutcome::Disconnected
        );
        assert!(!chan.is_connected());

        let _next = connect(&mut chan);
        assert!(chan.is_connected());
    }

    #[test]
    fn test_flush_on_line_terminator() {
        let mut chan = test_channel(16);
        let mut client = connect(&mut chan);

        assert!(chan.push_byte(b'h').is_none());
        assert!(chan.push_byte(b'i').is_none());
        assert_eq!(chan.push_byte(b'\n'), Some(3));

        let mut got = [0u8; 3];
        client.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"hi\n");
    }

    #[test]
    fn test_flush_when_buffer_full() {
        let mut chan = test_channel(4);
        let mut client = connect(&mut chan);

        for &b in b"abc" {
            assert!(chan.push_byte(b).is_none());
        }
        assert_eq!(chan.push_byte(b'd'), Some(4));

        let mut got = [0u8; 4];
        client.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"abcd");
    }

    #[test]
    fn test_finish_terminates_partial_line() {
        let mut chan = test_channel(16);
        let mut client = connect(&mut chan);

        chan.push_byte(b'o');
        chan.push_byte(b'k');
        chan.finish();
        assert!(!chan.is_connected());

        let mut got = [0u8; 3];
        client.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"ok\n");
    }

    #[test]
    fn test_flush_without_client_drops_buffer() {
        let mut chan = test_channel(16);
        chan.push_byte(b'x');
        assert_eq!(chan.push_byte(b'\n'), Some(0));
    }
}
