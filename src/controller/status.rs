// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controller status published for observability.
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};

use crate::controller::safety_gate::GateDecision;
use crate::controller::types::{ControlMode, Twist, Wrench};
use crate::exception::{ControllerException, ControllerResult};

/// Snapshot of what the controller is doing.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Default)]
pub struct ControllerStatus {
    pub mode: ControlMode,
    pub contact: bool,
    /// true in position mode once the target pose is reached.
    pub is_arrived: bool,
    pub decision: GateDecision,
    /// Number of ticks since activation.
    pub ticks: u64,
    /// Number of ticks which exceeded the tolerated period.
    pub overruns: u64,
    /// Time since activation in \[s\].
    pub elapsed: f64,
    pub last_command: Twist,
    pub wrench: Wrench,
}

impl ControllerStatus {
    /// Encodes the status for publication.
    pub fn to_bytes(&self) -> ControllerResult<Vec<u8>> {
        serialize(self).map_err(|error| ControllerException::SerializationException {
            message: format!("Cannot encode controller status: {}", error),
        })
    }

    /// Decodes a status published with [`to_bytes`](`Self::to_bytes`).
    pub fn from_bytes(bytes: &[u8]) -> ControllerResult<Self> {
        deserialize(bytes).map_err(|error| ControllerException::SerializationException {
            message: format!("Cannot decode controller status: {}", error),
        })
    }
}

/// Receives the status of a running control loop.
///
/// Called from the control loop thread, implementations must not block.
pub trait StatusPublisher: Send {
    fn publish(&mut self, status: &ControllerStatus);
}
