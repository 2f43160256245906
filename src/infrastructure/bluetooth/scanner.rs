//! BLE Scan Bookkeeping
//!
//! Tracks the single active scan (its target and id) and owns the
//! [`ScanTimeoutGuard`] that ends it when nothing matches in time.

use crate::domain::models::SensorDescriptor;
use crate::infrastructure::bluetooth::radio::RadioEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default scan window
pub const SCAN_PERIOD: Duration = Duration::from_secs(10);

/// Single-shot deadline for one scan.
///
/// When it fires it posts [`RadioEvent::ScanTimeout`] carrying its scan id
/// into the session's event queue. Dropping the guard disarms it.
#[derive(Debug)]
pub struct ScanTimeoutGuard {
    scan_id: u64,
    handle: JoinHandle<()>,
}

impl ScanTimeoutGuard {
    /// Arm a deadline.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn arm(scan_id: u64, period: Duration, inbox: mpsc::UnboundedSender<RadioEvent>) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(period).await;
            let _ = inbox.send(RadioEvent::ScanTimeout { scan_id });
        });
        trace!("Scan timeout armed for scan #{} ({:?})", scan_id, period);

        Self { scan_id, handle }
    }

    pub fn scan_id(&self) -> u64 {
        self.scan_id
    }

    pub fn disarm(self) {
        trace!("Scan timeout disarmed for scan #{}", self.scan_id);
    }
}

impl Drop for ScanTimeoutGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug)]
struct ActiveScan {
    target: SensorDescriptor,
    guard: ScanTimeoutGuard,
}

/// The scan half of the acquisition session.
#[derive(Debug)]
pub struct BleScanner {
    active: Option<ActiveScan>,
    next_scan_id: u64,
    period: Duration,
    inbox: mpsc::UnboundedSender<RadioEvent>,
}

impl BleScanner {
    pub fn new(period: Duration, inbox: mpsc::UnboundedSender<RadioEvent>) -> Self {
        Self {
            active: None,
            next_scan_id: 0,
            period,
            inbox,
        }
    }

    /// Record a new active scan for `target` and arm its deadline.
    pub fn begin(&mut self, target: SensorDescriptor) -> u64 {
        self.next_scan_id += 1;
        let scan_id = self.next_scan_id;

        let guard = ScanTimeoutGuard::arm(scan_id, self.period, self.inbox.clone());
        self.active = Some(ActiveScan { target, guard });

        scan_id
    }

    /// Forget the active scan, disarming its deadline. Returns its target.
    pub fn end(&mut self) -> Option<SensorDescriptor> {
        self.active.take().map(|scan| {
            scan.guard.disarm();
            scan.target
        })
    }

    pub fn is_scanning(&self) -> bool {
        self.active.is_some()
    }

    pub fn target(&self) -> Option<&SensorDescriptor> {
        self.active.as_ref().map(|scan| &scan.target)
    }

    /// `true` when `scan_id` identifies the scan that is still running.
    pub fn is_current(&self, scan_id: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|scan| scan.guard.scan_id() == scan_id)
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
