//! Ring buffer consumer
//!
//! One thread drains `EVENTS` and feeds each [`SwitchEvent`] to the probe.
//! Events arrive in the order the kernel submitted them, so a thread's
//! switch-out is always processed before its matching switch-in.

#![allow(unsafe_code)] // read_unaligned() requires unsafe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aya::maps::{MapData, RingBuf};
use log::{debug, warn};
use offcputime_common::SwitchEvent;

use crate::domain::{CaptureError, Pid, ThreadName, Tid};
use crate::engine::{IncomingTask, OffCpuProbe, OutgoingTask, Transition};

/// Idle wait between polls of an empty ring buffer
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Copy a `SwitchEvent` out of a ring buffer record
///
/// Returns `None` for a record too short to hold one.
#[must_use]
pub fn decode(bytes: &[u8]) -> Option<SwitchEvent> {
    if bytes.len() < std::mem::size_of::<SwitchEvent>() {
        return None;
    }
    // SAFETY: length checked above; SwitchEvent is repr(C) plain data
    Some(unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<SwitchEvent>()) })
}

/// View a kernel event as a probe transition
#[must_use]
pub fn transition_from(event: &SwitchEvent) -> Transition<'_> {
    let outgoing = event.prev.is_valid().then(|| OutgoingTask {
        tid: Tid(event.prev.tid),
        pid: Pid(event.prev.tgid),
        kthread: event.prev.is_kthread(),
    });

    let stack = match event.stack_depth() {
        Some(0) => Err(CaptureError::Empty),
        Some(depth) => Ok(&event.kernel_stack[..depth]),
        None if event.kernel_stack_len < 0 => Err(CaptureError::Walk(event.kernel_stack_len)),
        None => Err(CaptureError::Empty),
    };

    Transition {
        timestamp_ns: event.timestamp_ns,
        outgoing,
        incoming: IncomingTask {
            tid: Tid(event.next.tid),
            name: ThreadName::from_comm(event.next_comm),
        },
        stack,
    }
}

/// Handle to the reader thread
///
/// Dropping it asks the thread to stop; the thread is not joined.
pub struct EventReader {
    running: Arc<AtomicBool>,
    _handle: JoinHandle<()>,
}

impl EventReader {
    pub fn spawn(ring_buf: RingBuf<MapData>, probe: Arc<OffCpuProbe>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            let mut ring_buf = ring_buf;
            let mut short_records = 0u64;

            while flag.load(Ordering::Relaxed) {
                while let Some(item) = ring_buf.next() {
                    match decode(&item) {
                        Some(event) => probe.on_switch(&transition_from(&event)),
                        None => short_records += 1,
                    }
                }
                thread::sleep(POLL_INTERVAL);
            }

            if short_records > 0 {
                warn!("Skipped {short_records} incomplete ring buffer records");
            }
            debug!("Event reader stopped");
        });

        Self { running, _handle: handle }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.stop();
    }
}
