// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! TCP side of the bridge: channels owning listener and client sockets,
//! and the tick drivers that multiplex them onto a simulated core's
//! serial wire with UART character timing.
//!
//! Everything here is single-threaded and tick-driven. All socket I/O is
//! non-blocking with zero timeout, so one pass per simulated clock edge
//! never stalls the simulation; work that cannot complete this tick is
//! deferred through the read-ahead queue and the character timers.

pub mod channel;
pub mod dual;
pub mod single;
pub mod stats;

pub use channel::{Channel, ChannelRole};
pub use dual::DualPipeBridge;
pub use single::PipeBridge;
pub use stats::BridgeStats;

use simwire_core::SimulationError;

/// Bit 7 marks a byte as command-channel traffic on the shared wire;
/// bits 0-6 carry the payload. This is the only framing between the two
/// channels.
pub const CHANNEL_TAG: u8 = 0x80;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to bind {role} listener on port {port}: {source}")]
    Bind {
        role: ChannelRole,
        port: u16,
        source: std::io::Error,
    },
    #[error(transparent)]
    Core(#[from] SimulationError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// The per-clock-tick driver surface shared by both bridge variants.
pub trait TickDriver {
    /// Advance the bridge and its core by one simulated clock tick.
    fn tick(&mut self) -> BridgeResult<()>;

    /// Flush partial output (with a terminator appended) and drop client
    /// connections; no trailing line is silently lost.
    fn shutdown(&mut self);

    fn stats(&self) -> &BridgeStats;
}
