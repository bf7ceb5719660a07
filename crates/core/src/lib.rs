// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Socket-free building blocks for the SimWire bridge: the wire-signal
//! bundle shared with a simulated core, byte queues, and character timing.

pub mod fifo;
pub mod loopback;
pub mod timing;
pub mod wire;

pub use fifo::ByteFifo;
pub use loopback::LoopbackCore;
pub use timing::CharTimer;
pub use wire::UartWire;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("simulated core fault: {0}")]
    CoreFault(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait representing an opaque clock-stepped core with a UART-style
/// serial interface.
///
/// On every tick the bridge drives `rx_strobe`, `rx_data` and `tx_busy`
/// on the wire, advances the core exactly once, then samples `tx_strobe`
/// and `tx_data`. Implementations must drive `tx_strobe` every tick:
/// high for exactly the ticks on which `tx_data` carries a valid byte.
pub trait ClockedCore {
    fn advance_one_tick(&mut self, wire: &mut UartWire) -> SimResult<()>;
}
