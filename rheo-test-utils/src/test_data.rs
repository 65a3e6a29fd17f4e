// Copyright 2025 Umberto Gotti <umberto.gotti@umbertogotti.dev>
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

//! Small data factories shared by the operator test suites.

/// A reading from a named device, the structured item the suites pass
/// through operators when a bare integer is not enough.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reading {
    pub device: String,
    pub value: i64,
}

impl Reading {
    pub fn new(device: impl Into<String>, value: i64) -> Self {
        Self {
            device: device.into(),
            value,
        }
    }
}

pub fn thermostat(value: i64) -> Reading {
    Reading::new("thermostat", value)
}

pub fn barometer(value: i64) -> Reading {
    Reading::new("barometer", value)
}

pub fn hygrometer(value: i64) -> Reading {
    Reading::new("hygrometer", value)
}
