//! Handle identifiers.
//!
//! Handles are allocated by the registry and travel through the core as plain
//! integers. Host environments hand them over as floating-point numbers, so
//! anything that is not a finite, non-negative, 32-bit integer is folded into
//! [`HandleId::INVALID`], which every registry treats as "not found".

use std::fmt;

/// Opaque identifier of one open resource in a [`HandleRegistry`](crate::HandleRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(i32);

impl HandleId {
    /// Sentinel that never matches an allocated handle.
    pub const INVALID: HandleId = HandleId(-1);

    /// Wrap a raw id, normalizing negative values to [`HandleId::INVALID`].
    pub fn new(raw: i32) -> Self {
        if raw < 0 {
            Self::INVALID
        } else {
            Self(raw)
        }
    }

    /// Coerce a host number into a handle id.
    ///
    /// # Examples
    ///
    /// ```
    /// use bridge_traits::HandleId;
    ///
    /// assert_eq!(HandleId::from_host_number(12.0).get(), 12);
    /// assert_eq!(HandleId::from_host_number(f64::NAN), HandleId::INVALID);
    /// assert_eq!(HandleId::from_host_number(3.7), HandleId::INVALID);
    /// ```
    pub fn from_host_number(value: f64) -> Self {
        if !value.is_finite() || value < 0.0 || value > i32::MAX as f64 || value.fract() != 0.0 {
            return Self::INVALID;
        }
        Self(value as i32)
    }

    pub fn get(self) -> i32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
