// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! The hierarchy follows the failure classes a device adapter can run into:
//! configuration defects, payload decode failures, out-of-range values and
//! transport failures. None of them is fatal to the bridge once it runs;
//! only startup failures (configuration, broker connection) stop the
//! process.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration is invalid or a device is misconfigured.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during message bus communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An inbound payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A value is outside its allowed domain.
    #[error("value error: {0}")]
    Value(#[from] ValueError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },

    /// An invalid power state string was provided.
    #[error("invalid power state: {0}")]
    InvalidPowerState(String),
}

/// Errors related to message bus communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The transport refused the publish request.
    #[error("publish to {topic} rejected: {reason}")]
    PublishRejected {
        /// Topic of the rejected message.
        topic: String,
        /// Why the transport refused it.
        reason: String,
    },
}

/// Errors related to decoding inbound payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors related to loading and validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has the wrong shape.
    #[error("cannot decode configuration: {0}")]
    Decode(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A required field is missing or empty.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The broker URL cannot be parsed.
    #[error("invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    /// A device requires an option that is not configured.
    #[error("device {device}: option \"{option}\" is missing")]
    MissingOption {
        /// Name of the device.
        device: String,
        /// Name of the missing option.
        option: String,
    },

    /// Two devices of the same class share a name.
    #[error("duplicate {class} device name: {name}")]
    DuplicateDevice {
        /// Device class label.
        class: String,
        /// The duplicated device name.
        name: String,
    },

    /// A device class holds more devices than its identity range.
    #[error("too many {class} devices: {count} configured, at most {max} allowed")]
    TooManyDevices {
        /// Device class label.
        class: String,
        /// Number of configured devices.
        count: usize,
        /// Size of the identity range.
        max: usize,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
