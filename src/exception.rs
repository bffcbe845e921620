// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains exception and Result definitions
use thiserror::Error;

/// Represents all kind of errors which can stop a controller from being activated or
/// from running its control loop.
///
/// Invalid commands received while the controller is running are not errors. They are
/// discarded by the [`CommandChannels`](`crate::controller::command_channels::CommandChannels`).
#[derive(Error, Debug)]
pub enum ControllerException {
    /// ConfigurationException is thrown if a hardware handle cannot be acquired, the
    /// joint names are malformed or a configured limit is invalid.
    #[error("{message:?}")]
    ConfigurationException { message: String },

    /// ParameterException is thrown if a parameter file cannot be read or parsed.
    #[error("{message:?}")]
    ParameterException { message: String },

    /// RealTimeException is thrown if the real-time priority cannot be set
    #[error("{message:?}")]
    RealTimeException { message: String },

    /// ControlLoopException is thrown if the control loop thread cannot be started or
    /// terminated abnormally.
    #[error("{message:?}")]
    ControlLoopException { message: String },

    /// SerializationException is thrown if a controller status cannot be encoded or decoded.
    #[error("{message:?}")]
    SerializationException { message: String },
}

/// creates a ConfigurationException from a static string slice
pub(crate) fn create_configuration_exception(message: &'static str) -> ControllerException {
    ControllerException::ConfigurationException {
        message: message.to_string(),
    }
}

/// Result type which can have ControllerException as Error
pub type ControllerResult<T> = Result<T, ControllerException>;
