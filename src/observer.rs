//! Diagnostic hooks for watching a decode as it happens.
//!
//! Observers see every byte range consumed, the nesting of what is being decoded, and the
//! values produced. They never influence the decoded result.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Receives decode events. Every method defaults to doing nothing.
pub trait DecodeObserver: Send {
    /// `bytes` were consumed starting at stream offset `offset`.
    fn on_read(&mut self, _offset: u64, _bytes: &[u8]) {}

    /// `bytes` were looked at without being consumed.
    fn on_peek(&mut self, _offset: u64, _bytes: &[u8]) {}

    fn push_label(&mut self, _label: &str) {}

    fn pop_label(&mut self, _label: &str) {}

    /// The value decoded from the most recent read(s).
    fn decoded(&mut self, _value: fmt::Arguments<'_>) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DecodeObserver for NoopObserver {}

/// Forwards decode events to `tracing` at TRACE level.
#[derive(Debug, Default)]
pub struct TracingObserver {
    labels: Vec<String>,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DecodeObserver for TracingObserver {
    fn on_read(&mut self, offset: u64, bytes: &[u8]) {
        tracing::trace!(
            target: "blueprint_storage::trace",
            offset,
            bytes = %hex::encode(bytes),
            labels = %self.labels.join(" "),
            "read"
        );
    }

    fn push_label(&mut self, label: &str) {
        self.labels.push(label.to_owned());
    }

    fn pop_label(&mut self, _label: &str) {
        self.labels.pop();
    }

    fn decoded(&mut self, value: fmt::Arguments<'_>) {
        tracing::trace!(target: "blueprint_storage::trace", %value, "decoded");
    }
}

/// Wraps the caller's observer so that a misbehaving one cannot take the decode down.
///
/// A panic inside any hook is caught, logged, and the observer is dropped for the rest of
/// the decode.
pub(crate) struct Hooks<'o> {
    observer: Option<&'o mut dyn DecodeObserver>,
}

impl<'o> Hooks<'o> {
    pub(crate) fn new(observer: Option<&'o mut dyn DecodeObserver>) -> Self {
        Self { observer }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.observer.is_some()
    }

    fn call(&mut self, f: impl FnOnce(&mut dyn DecodeObserver)) {
        let Some(observer) = self.observer.as_deref_mut() else {
            return;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| f(observer))).is_err() {
            tracing::warn!("decode observer panicked, ignoring it for the rest of this decode");
            self.observer = None;
        }
    }

    pub(crate) fn on_read(&mut self, offset: u64, bytes: &[u8]) {
        self.call(|o| o.on_read(offset, bytes));
    }

    pub(crate) fn on_peek(&mut self, offset: u64, bytes: &[u8]) {
        self.call(|o| o.on_peek(offset, bytes));
    }

    pub(crate) fn push_label(&mut self, label: &str) {
        self.call(|o| o.push_label(label));
    }

    pub(crate) fn pop_label(&mut self, label: &str) {
        self.call(|o| o.pop_label(label));
    }

    pub(crate) fn decoded(&mut self, value: fmt::Arguments<'_>) {
        self.call(|o| o.decoded(value));
    }
}
