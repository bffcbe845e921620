// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ring buffer log of the last control ticks.
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::controller::robot_state::RobotState;
use crate::controller::safety_gate::GateDecision;
use crate::controller::types::{ControlMode, Twist};

/// One row of the log contains the robot state of a tick and the twist committed in it.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Record {
    /// Robot state read at the beginning of the tick.
    pub state: RobotState,
    /// Twist committed in the tick, after rate limiting and gating.
    pub command: Twist,
    /// Mode which was active in the tick.
    pub mode: ControlMode,
    pub decision: GateDecision,
}

impl Record {
    /// creates a string representation based on the debug formatter
    pub fn log(&self) -> String {
        format!("{:?}", self)
    }
}

/// Keeps the last `log_size` records. Memory is allocated once at creation, logging a
/// tick never allocates.
pub(crate) struct Logger {
    records: VecDeque<Record>,
    log_size: usize,
}

impl Logger {
    pub fn new(log_size: usize) -> Self {
        Logger {
            records: VecDeque::with_capacity(log_size),
            log_size,
        }
    }

    pub fn log(&mut self, record: Record) {
        if self.log_size == 0 {
            return;
        }
        if self.records.len() == self.log_size {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Returns the logged records, oldest first, and empties the log.
    pub fn flush(&mut self) -> Vec<Record> {
        self.records.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::logger::{Logger, Record};
    use crate::controller::robot_state::RobotState;
    use crate::controller::safety_gate::GateDecision;
    use crate::controller::types::ControlMode;

    fn record(x: f64) -> Record {
        Record {
            state: RobotState::default(),
            command: [x, 0., 0., 0., 0., 0.],
            mode: ControlMode::Velocity,
            decision: GateDecision::Pass,
        }
    }

    #[test]
    fn logger_keeps_latest_records_in_order() {
        let mut logger = Logger::new(3);
        for i in 0..5 {
            logger.log(record(i as f64));
        }
        let records = logger.flush();
        let logged: Vec<f64> = records.iter().map(|r| r.command[0]).collect();
        assert_eq!(logged, vec![2., 3., 4.]);
        assert!(logger.flush().is_empty());
        logger.log(record(7.));
        assert_eq!(logger.flush().len(), 1);
    }

    #[test]
    fn disabled_logger_stays_empty() {
        let mut logger = Logger::new(0);
        logger.log(record(1.));
        assert!(logger.flush().is_empty());
    }

    #[test]
    fn record_log_uses_debug_representation() {
        assert!(record(0.5).log().contains("Velocity"));
    }
}
