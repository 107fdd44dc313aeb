//! A/B slot resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::channel::{ChannelError, ControlChannel, DeviceMode, parse_variable};

const CURRENT_SLOT_VARIABLE: &str = "current-slot";
const SLOT_SUFFIX_PROPERTY: &str = "ro.boot.slot_suffix";

/// Active partition slot on A/B devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Slot `a`.
    A,
    /// Slot `b`.
    B,
}

impl Slot {
    /// Parses `a`, `_a`, `b`, or `_b`; anything else is `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().trim_start_matches('_') {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }
}

/// Reads the active slot from whichever interface the device is on.
///
/// Devices without A/B partitions report nothing, which yields `Ok(None)`.
///
/// # Errors
///
/// Returns the channel error when the device cannot be queried, including
/// [`ChannelError::DeviceGone`] when it reports no usable mode.
pub fn current_slot(
    device: &dyn ControlChannel,
    timeout: Duration,
) -> Result<Option<Slot>, ChannelError> {
    match device.mode()? {
        DeviceMode::Bootloader => {
            let args = [String::from("getvar"), String::from(CURRENT_SLOT_VARIABLE)];
            let output = device.execute_bootloader(&args, timeout)?;
            Ok(parse_variable(&output, CURRENT_SLOT_VARIABLE).and_then(|value| Slot::parse(&value)))
        }
        DeviceMode::Online => Ok(device
            .property(SLOT_SUFFIX_PROPERTY)?
            .and_then(|value| Slot::parse(&value))),
        DeviceMode::Unavailable => Err(ChannelError::DeviceGone {
            serial: device.serial().to_owned(),
        }),
    }
}
