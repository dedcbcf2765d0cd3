//! Recording output sink for tests.
//!
//! Records every operation in order behind a shared handle so tests can
//! assert on exact write-groups (writes plus their terminating sync). Can be
//! armed to fail to exercise the worker's fatal-write path.

use std::io;
use std::sync::{Arc, Mutex};

use latcher_core::{KeyCode, KeyValue, RawEventRecord};

use super::{OutputSink, SinkError};

/// One recorded sink operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOp {
    Forward(RawEventRecord),
    Key { code: KeyCode, value: KeyValue },
    Sync,
}

/// Shared view into a [`MockOutputSink`]'s recording.
#[derive(Debug, Default)]
pub struct SinkRecording {
    ops: Mutex<Vec<SinkOp>>,
    fail_writes: Mutex<bool>,
}

impl SinkRecording {
    /// All operations recorded so far, in order.
    pub fn ops(&self) -> Vec<SinkOp> {
        self.ops.lock().expect("lock poisoned").clone()
    }

    /// Synthetic key transitions only, in order.
    pub fn key_writes(&self) -> Vec<(KeyCode, KeyValue)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SinkOp::Key { code, value } => Some((code, value)),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded report boundaries.
    pub fn sync_count(&self) -> usize {
        self.ops()
            .into_iter()
            .filter(|op| matches!(op, SinkOp::Sync))
            .count()
    }

    /// Makes every subsequent write and sync fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().expect("lock poisoned") = true;
    }

    fn record(&self, op: SinkOp) -> Result<(), SinkError> {
        if *self.fail_writes.lock().expect("lock poisoned") {
            return Err(SinkError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock sink closed",
            )));
        }
        self.ops.lock().expect("lock poisoned").push(op);
        Ok(())
    }
}

/// An [`OutputSink`] that records instead of writing to the kernel.
#[derive(Debug, Default)]
pub struct MockOutputSink {
    recording: Arc<SinkRecording>,
}

impl MockOutputSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recording(&self) -> Arc<SinkRecording> {
        Arc::clone(&self.recording)
    }
}

impl OutputSink for MockOutputSink {
    fn forward(&mut self, event: &RawEventRecord) -> Result<(), SinkError> {
        self.recording.record(SinkOp::Forward(*event))
    }

    fn write_key(&mut self, code: KeyCode, value: KeyValue) -> Result<(), SinkError> {
        self.recording.record(SinkOp::Key { code, value })
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        self.recording.record(SinkOp::Sync)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_are_recorded_in_order() {
        // Arrange
        let mut sink = MockOutputSink::new();
        let recording = sink.recording();

        // Act
        sink.write_key(30, KeyValue::Down).unwrap();
        sink.sync().unwrap();
        sink.forward(&RawEventRecord::new(2, 1, -5)).unwrap();
        sink.sync().unwrap();

        // Assert
        assert_eq!(
            recording.ops(),
            vec![
                SinkOp::Key {
                    code: 30,
                    value: KeyValue::Down
                },
                SinkOp::Sync,
                SinkOp::Forward(RawEventRecord::new(2, 1, -5)),
                SinkOp::Sync,
            ]
        );
        assert_eq!(recording.sync_count(), 2);
    }

    #[test]
    fn test_armed_failure_rejects_writes() {
        let mut sink = MockOutputSink::new();
        let recording = sink.recording();

        recording.fail_writes();

        assert!(matches!(
            sink.write_key(30, KeyValue::Down),
            Err(SinkError::Write(_))
        ));
        assert!(recording.ops().is_empty());
    }
}
