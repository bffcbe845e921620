// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the inbound command channels.
//!
//! Target pose, target velocity and target acceleration all write the same
//! [`CommandSlot`], so that the last writer decides the mode and mode and payload are
//! published together. The contact flag lives in its own atomic. Neither cell is ever
//! locked: writers swap in a new slot, the control loop reads the latest published one.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::debug;

use crate::controller::types::{Command, TargetPose, Twist};
use crate::utils::all_finite;

/// The latest command together with the number of commands accepted since the last reset.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct CommandSlot {
    pub command: Command,
    /// Zero if no command has been accepted since the channels were reset.
    pub sequence: u64,
}

impl CommandSlot {
    /// true if the command was written by a producer rather than being the reset default.
    pub fn is_populated(&self) -> bool {
        self.sequence > 0
    }
}

struct SharedChannels {
    command: ArcSwap<CommandSlot>,
    contact: AtomicBool,
}

/// Cheaply clonable handle to the command channels of one controller.
///
/// All write operations can be called from any thread at any time, concurrently with the
/// control loop.
#[derive(Clone)]
pub struct CommandChannels {
    shared: Arc<SharedChannels>,
}

impl Default for CommandChannels {
    fn default() -> Self {
        CommandChannels::new()
    }
}

impl CommandChannels {
    pub fn new() -> Self {
        CommandChannels {
            shared: Arc::new(SharedChannels {
                command: ArcSwap::from_pointee(CommandSlot::default()),
                contact: AtomicBool::new(false),
            }),
        }
    }

    /// Sets a new target pose and switches to position mode.
    ///
    /// # Arguments
    /// * `values` - 3x4 target pose in column-major format.
    /// # Return
    /// false if the target contained a NaN or infinite value and was discarded.
    pub fn write_target_pose(&self, values: TargetPose) -> bool {
        self.publish(&values, Command::Position(values))
    }

    /// Sets a new target twist and switches to velocity mode.
    ///
    /// # Return
    /// false if the twist contained a NaN or infinite value and was discarded.
    pub fn write_target_velocity(&self, values: Twist) -> bool {
        self.publish(&values, Command::Velocity(values))
    }

    /// Sets a new target Cartesian acceleration and switches to acceleration mode.
    ///
    /// # Return
    /// false if the acceleration contained a NaN or infinite value and was discarded.
    pub fn write_target_acceleration(&self, values: Twist) -> bool {
        self.publish(&values, Command::Acceleration(values))
    }

    /// Sets whether the end effector is in contact.
    pub fn write_contact(&self, contact: bool) {
        self.shared.contact.store(contact, Ordering::SeqCst);
    }

    /// Like [`write_target_pose`](`Self::write_target_pose`) for a raw message buffer, which
    /// is discarded unless it holds exactly 12 values.
    pub fn write_target_pose_slice(&self, data: &[f64]) -> bool {
        match decode(data) {
            Some(values) => self.write_target_pose(values),
            None => discard("target pose", data.len()),
        }
    }

    /// Like [`write_target_velocity`](`Self::write_target_velocity`) for a raw message buffer,
    /// which is discarded unless it holds exactly 6 values.
    pub fn write_target_velocity_slice(&self, data: &[f64]) -> bool {
        match decode(data) {
            Some(values) => self.write_target_velocity(values),
            None => discard("target velocity", data.len()),
        }
    }

    /// Like [`write_target_acceleration`](`Self::write_target_acceleration`) for a raw message
    /// buffer, which is discarded unless it holds exactly 6 values.
    pub fn write_target_acceleration_slice(&self, data: &[f64]) -> bool {
        match decode(data) {
            Some(values) => self.write_target_acceleration(values),
            None => discard("target acceleration", data.len()),
        }
    }

    /// Latest published command. Never blocks.
    pub fn command(&self) -> CommandSlot {
        **self.shared.command.load()
    }

    /// Latest contact flag. Never blocks.
    pub fn contact(&self) -> bool {
        self.shared.contact.load(Ordering::SeqCst)
    }

    /// Forgets all commands, the next read yields the default position target with
    /// sequence zero. The contact flag is kept.
    pub(crate) fn reset(&self) {
        self.shared.command.store(Arc::new(CommandSlot::default()));
    }

    fn publish(&self, values: &[f64], command: Command) -> bool {
        if !all_finite(values) {
            debug!(
                "discarding {:?} command with non-finite values",
                command.mode()
            );
            return false;
        }
        self.shared.command.rcu(|slot| CommandSlot {
            command,
            sequence: slot.sequence + 1,
        });
        true
    }
}

fn decode<const N: usize>(data: &[f64]) -> Option<[f64; N]> {
    <[f64; N]>::try_from(data).ok()
}

fn discard(channel: &str, length: usize) -> bool {
    debug!("discarding {} message with {} values", channel, length);
    false
}
