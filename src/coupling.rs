// src/coupling.rs
//
// Field exchange with peer simulators running on overlapping timescales.
//
// The transport itself lives outside this crate; the driver only needs the
// two named-vector operations below. Ports follow the `<field>_in` /
// `<field>_out` convention, with the wiring between one side's `_out` and
// the other side's `_in` owned by the coupling configuration.
//
// Both operations block until the peer supplies or accepts data. This is a
// rendezvous, not a queue: coupled components proceed in strict alternating
// lockstep, and a receive with no peer on the other end blocks forever.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::error::{SimError, SimResult};

pub const INPUT_SUFFIX: &str = "_in";
pub const OUTPUT_SUFFIX: &str = "_out";

/// Port name for receiving a field.
pub fn input_port(field_name: &str) -> String {
    format!("{}{}", field_name, INPUT_SUFFIX)
}

/// Port name for sending a field.
pub fn output_port(field_name: &str) -> String {
    format!("{}{}", field_name, OUTPUT_SUFFIX)
}

fn base_name(port: &str) -> &str {
    port.strip_suffix(INPUT_SUFFIX)
        .or_else(|| port.strip_suffix(OUTPUT_SUFFIX))
        .unwrap_or(port)
}

/// Bidirectional named-vector exchange with one peer.
pub trait CouplingChannel: Send {
    /// Send a vector on the named output port; blocks until the peer takes it.
    fn send(&mut self, port: &str, values: &[f64]) -> SimResult<()>;

    /// Receive a vector from the named input port; blocks until the peer sends.
    fn receive(&mut self, port: &str) -> SimResult<Vec<f64>>;
}

/// In-process rendezvous channel pair.
///
/// Stands in for the external transport in tests and single-process runs:
/// `pair()` wires each side's output ports to the same-named input ports of
/// the other side. Because the protocol is deterministic lockstep, a
/// message arriving for a different field than the one being received is a
/// protocol violation, not something to queue.
pub struct InMemoryChannel {
    tx: SyncSender<(String, Vec<f64>)>,
    rx: Receiver<(String, Vec<f64>)>,
}

impl InMemoryChannel {
    /// Create two connected endpoints.
    pub fn pair() -> (InMemoryChannel, InMemoryChannel) {
        // Bound 0 makes every send wait for the matching receive.
        let (tx_a, rx_b) = sync_channel(0);
        let (tx_b, rx_a) = sync_channel(0);
        (
            InMemoryChannel { tx: tx_a, rx: rx_a },
            InMemoryChannel { tx: tx_b, rx: rx_b },
        )
    }
}

impl CouplingChannel for InMemoryChannel {
    fn send(&mut self, port: &str, values: &[f64]) -> SimResult<()> {
        self.tx
            .send((port.to_string(), values.to_vec()))
            .map_err(|_| SimError::coupling(format!("peer disconnected while sending '{}'", port)))
    }

    fn receive(&mut self, port: &str) -> SimResult<Vec<f64>> {
        let (name, values) = self.rx.recv().map_err(|_| {
            SimError::coupling(format!("peer disconnected while receiving '{}'", port))
        })?;
        if base_name(&name) != base_name(port) {
            return Err(SimError::coupling(format!(
                "expected field '{}' on port '{}', peer sent '{}'",
                base_name(port),
                port,
                name
            )));
        }
        Ok(values)
    }
}
