// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::{Channel, ChannelRole, ReadOutcome};
use crate::stats::BridgeStats;
use crate::{BridgeResult, TickDriver};
use simwire_core::{ByteFifo, CharTimer, ClockedCore, UartWire};
use std::io;
use std::net::SocketAddr;

/// Single-channel bridge: one TCP console connected to the core's serial
/// wire with UART character timing in both directions.
///
/// The bridge owns everything it mutates: the channel, the read-ahead
/// queue, and the two character timers. One `tick()` call services socket
/// I/O, feeds and drains the wire, and advances the core exactly once.
pub struct PipeBridge<C: ClockedCore> {
    core: C,
    wire: UartWire,
    console: Channel,
    rx_fifo: ByteFifo,
    /// Gates bytes clocked into the core (inter-character spacing).
    rx_timer: CharTimer,
    /// Models character time of core output; drives `tx_busy`.
    tx_timer: CharTimer,
    stats: BridgeStats,
    started: bool,
}

impl<C: ClockedCore> PipeBridge<C> {
    pub fn new(core: C, port: u16, char_ticks: u32, capacity: usize) -> BridgeResult<Self> {
        Ok(Self {
            core,
            wire: UartWire::new(),
            console: Channel::listen(ChannelRole::Console, port, capacity)?,
            rx_fifo: ByteFifo::new(capacity),
            rx_timer: CharTimer::new(char_ticks),
            tx_timer: CharTimer::new(char_ticks),
            stats: BridgeStats::default(),
            started: false,
        })
    }

    pub fn set_echo_stdout(&mut self, echo: bool) {
        self.console.set_echo_stdout(echo);
    }

    /// Listener address; useful after binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.console.local_addr()
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Whether any client byte has ever been clocked into the core.
    pub fn started(&self) -> bool {
        self.started
    }
}

impl<C: ClockedCore> TickDriver for PipeBridge<C> {
    /// One simulated clock edge. Fixed order: acceptor pass and ingress
    /// act on pre-tick state, then the core advances, then egress acts on
    /// its post-tick outputs, matching a synchronous-clocked peripheral.
    fn tick(&mut self) -> BridgeResult<()> {
        self.stats.ticks += 1;
        if self.console.poll_accept() {
            self.stats.accepts += 1;
        }

        self.wire.rx_strobe = false;
        if self.rx_timer.is_idle() {
            if self.rx_fifo.is_empty() {
                match self.console.read_into(&mut self.rx_fifo, false) {
                    ReadOutcome::Bytes(n) => self.stats.socket_bytes_in += n as u64,
                    ReadOutcome::Disconnected => self.stats.teardowns += 1,
                    ReadOutcome::Idle => {}
                }
            }
            if let Some(byte) = self.rx_fifo.pop() {
                self.wire.rx_strobe = true;
                self.wire.rx_data = byte;
                self.rx_timer.start();
                self.started = true;
                self.stats.core_bytes_in += 1;
            }
        } else {
            self.rx_timer.tick();
        }

        self.core.advance_one_tick(&mut self.wire)?;

        if self.tx_timer.is_idle() {
            if self.wire.tx_strobe {
                self.stats.core_bytes_out += 1;
                let was_connected = self.console.is_connected();
                if let Some(sent) = self.console.push_byte(self.wire.tx_data) {
                    self.stats.flushes += 1;
                    self.stats.socket_bytes_out += sent as u64;
                    if was_connected && !self.console.is_connected() {
                        self.stats.teardowns += 1;
                    }
                }
            }
        } else {
            self.tx_timer.tick();
        }
        if self.wire.tx_strobe && !self.wire.tx_busy {
            self.tx_timer.start();
        }
        self.wire.tx_busy = !self.tx_timer.is_idle();

        Ok(())
    }

    fn shutdown(&mut self) {
        self.console.finish();
    }

    fn stats(&self) -> &BridgeStats {
        &self.stats
    }
}

impl<C: ClockedCore> Drop for PipeBridge<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
