// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;

/// Byte and event counters for one bridge instance.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BridgeStats {
    pub ticks: u64,
    pub accepts: u64,
    pub teardowns: u64,
    /// Bytes pulled from client sockets into the read-ahead queue.
    pub socket_bytes_in: u64,
    /// Bytes handed back to client sockets across all flushes.
    pub socket_bytes_out: u64,
    /// Bytes clocked into the core.
    pub core_bytes_in: u64,
    /// Bytes captured from the core's transmitter.
    pub core_bytes_out: u64,
    pub flushes: u64,
}

impl BridgeStats {
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_carries_counters() {
        let stats = BridgeStats {
            ticks: 7,
            core_bytes_in: 3,
            ..Default::default()
        };
        let snap = stats.snapshot();
        assert_eq!(snap["ticks"], 7);
        assert_eq!(snap["core_bytes_in"], 3);
    }
}
