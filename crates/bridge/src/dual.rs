// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::channel::{Channel, ChannelRole, ReadOutcome};
use crate::stats::BridgeStats;
use crate::{BridgeResult, TickDriver, CHANNEL_TAG};
use simwire_core::{ByteFifo, CharTimer, ClockedCore, UartWire};
use std::io;
use std::net::SocketAddr;

/// Dual-channel bridge: a command and a console TCP channel sharing one
/// serial wire into the core.
///
/// Channel framing on the shared wire is bit 7 of every byte: command
/// traffic carries it set (payload in bits 0-6), console traffic carries
/// it clear. Ingress tags command bytes as they are merged into the
/// read-ahead queue; egress routes on the tag and strips it.
pub struct DualPipeBridge<C: ClockedCore> {
    core: C,
    wire: UartWire,
    command: Channel,
    console: Channel,
    rx_fifo: ByteFifo,
    rx_timer: CharTimer,
    tx_timer: CharTimer,
    stats: BridgeStats,
    started: bool,
}

impl<C: ClockedCore> DualPipeBridge<C> {
    pub fn new(
        core: C,
        command_port: u16,
        console_port: u16,
        char_ticks: u32,
        capacity: usize,
    ) -> BridgeResult<Self> {
        Ok(Self {
            core,
            wire: UartWire::new(),
            command: Channel::listen(ChannelRole::Command, command_port, capacity)?,
            console: Channel::listen(ChannelRole::Console, console_port, capacity)?,
            rx_fifo: ByteFifo::new(capacity),
            rx_timer: CharTimer::new(char_ticks),
            tx_timer: CharTimer::new(char_ticks),
            stats: BridgeStats::default(),
            started: false,
        })
    }

    pub fn set_echo_stdout(&mut self, echo: bool) {
        self.command.set_echo_stdout(echo);
        self.console.set_echo_stdout(echo);
    }

    pub fn command_addr(&self) -> io::Result<SocketAddr> {
        self.command.local_addr()
    }

    pub fn console_addr(&self) -> io::Result<SocketAddr> {
        self.console.local_addr()
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    /// Whether any client byte has ever been clocked into the core.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Merge pending client bytes into the shared read-ahead queue, the
    /// command channel first. Command bytes are tagged as they are read;
    /// bytes already queued from the other channel are never touched.
    fn refill(&mut self) {
        let fifo = &mut self.rx_fifo;
        let stats = &mut self.stats;
        for (chan, tag) in [(&mut self.command, true), (&mut self.console, false)] {
            if fifo.is_full() {
                break;
            }
            match chan.read_into(fifo, tag) {
                ReadOutcome::Bytes(n) => stats.socket_bytes_in += n as u64,
                ReadOutcome::Disconnected => stats.teardowns += 1,
                ReadOutcome::Idle => {}
            }
        }
    }
}

impl<C: ClockedCore> TickDriver for DualPipeBridge<C> {
    /// One simulated clock edge; same fixed ordering as the single-channel
    /// driver, with bit-7 tagging on ingress and routing on egress.
    fn tick(&mut self) -> BridgeResult<()> {
        self.stats.ticks += 1;
        if self.command.poll_accept() {
            self.stats.accepts += 1;
        }
        if self.console.poll_accept() {
            self.stats.accepts += 1;
        }

        self.wire.rx_strobe = false;
        if self.rx_timer.is_idle() {
            if self.rx_fifo.is_empty() {
                self.refill();
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
                let byte = self.wire.tx_data;
                let dest = if byte & CHANNEL_TAG != 0 {
                    &mut self.command
                } else {
                    &mut self.console
                };
                let was_connected = dest.is_connected();
                if let Some(sent) = dest.push_byte(byte & !CHANNEL_TAG) {
                    self.stats.flushes += 1;
                    self.stats.socket_bytes_out += sent as u64;
                    if was_connected && !dest.is_connected() {
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
        self.command.finish();
        self.console.finish();
    }

    fn stats(&self) -> &BridgeStats {
        &self.stats
    }
}

impl<C: ClockedCore> Drop for DualPipeBridge<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
