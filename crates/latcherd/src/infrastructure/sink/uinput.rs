//! Linux uinput output sink.
//!
//! Registers the single virtual device the rest of the system sees. The
//! capability set is computed once at creation and immutable afterwards:
//! every key/button code up to a bounded ceiling (common virtual-device
//! backends reject codes past `KEY_MAX`), plus the four relative axes needed
//! to pass pointer motion and both wheels through. The uinput builder does
//! not expose LED or MSC capability registration, so those optional classes
//! are not advertised.
//!
//! Writes are buffered by the kernel until a `SYN_REPORT` is emitted, which
//! is exactly the [`OutputSink::sync`] contract.

#![cfg(target_os = "linux")]

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key, RelativeAxisType};
use latcher_core::{KeyCode, KeyValue, RawEventRecord};
use tracing::info;

use super::{OutputSink, SinkError};

/// Fixed product name of the virtual device.
pub const DEVICE_NAME: &str = "Latcher";

/// Fixed product version of the virtual device.
const DEVICE_VERSION: u16 = 0x3;

/// Highest key/button code advertised by the virtual device.
const KEY_CODE_CEILING: u16 = 767;

/// The process-wide uinput virtual device.
pub struct UinputSink {
    device: VirtualDevice,
}

impl UinputSink {
    /// Registers the virtual device with the kernel.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Create`] when the node cannot be registered
    /// (no `/dev/uinput`, insufficient permissions, driver absent).
    pub fn create() -> Result<Self, SinkError> {
        let mut keys = AttributeSet::<Key>::new();
        for code in 0..=KEY_CODE_CEILING {
            keys.insert(Key::new(code));
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .map_err(SinkError::Create)?
            .name(DEVICE_NAME)
            .input_id(InputId::new(BusType::BUS_USB, 0x1, 0x1, DEVICE_VERSION))
            .with_keys(&keys)
            .map_err(SinkError::Create)?
            .with_relative_axes(&axes)
            .map_err(SinkError::Create)?
            .build()
            .map_err(SinkError::Create)?;

        info!(name = DEVICE_NAME, "virtual output device created");
        Ok(Self { device })
    }
}

impl OutputSink for UinputSink {
    fn forward(&mut self, event: &RawEventRecord) -> Result<(), SinkError> {
        let raw = InputEvent::new(EventType(event.event_type), event.code, event.value);
        self.device.emit(&[raw]).map_err(SinkError::Write)
    }

    fn write_key(&mut self, code: KeyCode, value: KeyValue) -> Result<(), SinkError> {
        let event = InputEvent::new(EventType::KEY, code, value.as_raw());
        self.device.emit(&[event]).map_err(SinkError::Write)
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        let report = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        self.device.emit(&[report]).map_err(SinkError::Write)
    }
}
