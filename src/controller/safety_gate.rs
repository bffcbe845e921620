// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the safety gate, the last stage every twist passes before it is committed.
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::controller::rate_limiting::TwistLimits;
use crate::controller::types::Twist;

/// Why the gate let a twist pass or replaced it with a deceleration towards zero.
#[derive(Serialize_repr, Deserialize_repr, Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum GateDecision {
    /// The synthesized twist was committed.
    Pass = 0,
    /// The end effector is in contact, decelerating.
    Contact = 1,
    /// No command has been received since activation, decelerating.
    NoCommand = 2,
    /// The measured pose or the synthesized twist is not usable, decelerating.
    InvalidInput = 3,
}

impl Default for GateDecision {
    fn default() -> Self {
        GateDecision::Pass
    }
}

/// Everything the gate checks besides the candidate twist itself.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GateInputs {
    pub contact: bool,
    /// true if a producer has written a command since activation.
    pub populated: bool,
    /// true if the measured end effector pose is a finite homogeneous transformation.
    pub pose_valid: bool,
}

/// Output of the gate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GateOutput {
    pub twist: Twist,
    pub decision: GateDecision,
}

/// Overrides synthesized twists with a rate-limited deceleration to zero when it is not safe
/// to follow them. Its output is always within `limits` with respect to the last command.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SafetyGate {
    limits: TwistLimits,
}

impl SafetyGate {
    pub fn new(limits: TwistLimits) -> Self {
        SafetyGate { limits }
    }

    /// Decides which twist is committed this tick.
    /// # Arguments
    /// * `candidate` - Twist proposed by the velocity synthesizer.
    /// * `inputs` - Contact flag and validity of the inputs of this tick.
    /// * `last_command` - Twist committed in the previous tick.
    pub fn apply(&self, candidate: &Twist, inputs: &GateInputs, last_command: &Twist) -> GateOutput {
        let decision = if inputs.contact {
            GateDecision::Contact
        } else if !inputs.populated {
            GateDecision::NoCommand
        } else if !inputs.pose_valid || candidate.iter().any(|x| !x.is_finite()) {
            GateDecision::InvalidInput
        } else {
            GateDecision::Pass
        };
        let twist = match decision {
            GateDecision::Pass => self.limits.limit(candidate, last_command),
            _ => self.decelerate(last_command),
        };
        GateOutput { twist, decision }
    }

    /// One tick of decelerating `last_command` towards zero.
    pub fn decelerate(&self, last_command: &Twist) -> Twist {
        self.limits.limit(&[0.; 6], last_command)
    }
}
