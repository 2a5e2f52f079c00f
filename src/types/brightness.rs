// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Brightness type for dimmable lights.
//!
//! Both the accessory side and every dimmer family on the bus express
//! brightness as a percentage, so one constrained type serves both.

use std::fmt;

use crate::error::{ParseError, ValueError};

/// Brightness level as a percentage (0-100).
///
/// # Examples
///
/// ```
/// use hap_mqtt::types::Brightness;
///
/// let level = Brightness::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(Brightness::MIN.value(), 0);
/// assert_eq!(Brightness::MAX.value(), 100);
///
/// assert!(Brightness::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Brightness(u8);

impl Brightness {
    /// Minimum brightness (0%).
    pub const MIN: Self = Self(0);

    /// Maximum brightness (100%).
    pub const MAX: Self = Self(100);

    /// Creates a new brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        Self::try_from(i64::from(value))
    }

    /// Returns the brightness percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns `true` if the level is zero.
    #[must_use]
    pub const fn is_off(&self) -> bool {
        self.0 == 0
    }

    /// Parses a decimal ASCII payload such as `"42"`.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the payload is not an integer
    /// or is outside 0-100.
    ///
    /// # Examples
    ///
    /// ```
    /// use hap_mqtt::types::Brightness;
    ///
    /// assert_eq!(Brightness::parse("42").unwrap().value(), 42);
    /// assert!(Brightness::parse("dim").is_err());
    /// assert!(Brightness::parse("150").is_err());
    /// ```
    pub fn parse(payload: &str) -> Result<Self, ParseError> {
        let raw: i64 = payload
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| ParseError::InvalidValue {
                field: "brightness".to_string(),
                message: format!("{payload:?}: {e}"),
            })?;

        Self::try_from(raw).map_err(|e| ParseError::InvalidValue {
            field: "brightness".to_string(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Brightness {
    type Error = ValueError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(v) if v <= 100 => Ok(Self(v)),
            _ => Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: value,
            }),
        }
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}
