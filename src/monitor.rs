//! Cooperative cancellation.

use crate::errors::Canceled;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait ProgressMonitor {
    fn is_canceled(&self) -> bool;
}

/// Returns `Err(Canceled)` if the monitor asks to stop.
pub fn check_canceled(monitor: &dyn ProgressMonitor) -> Result<(), Canceled> {
    if monitor.is_canceled() {
        log::debug!("cancellation requested");
        Err(Canceled)
    } else {
        Ok(())
    }
}

/// Never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMonitor;

impl ProgressMonitor for NullMonitor {
    fn is_canceled(&self) -> bool {
        false
    }
}

/// A shared flag that another thread may set at any time.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ProgressMonitor for CancelFlag {
    fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A budget of cancellation checks. Each check consumes one unit;
/// once the budget is spent every further check cancels.
#[derive(Clone, Debug)]
pub struct Fuel {
    remaining: Cell<u64>,
    consumed: Cell<u64>,
}

impl Fuel {
    pub fn new(budget: u64) -> Fuel {
        Fuel {
            remaining: Cell::new(budget),
            consumed: Cell::new(0),
        }
    }

    pub fn infinite() -> Fuel {
        Fuel::new(u64::MAX)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed.get()
    }

    fn consume(&self) -> bool {
        self.consumed.set(self.consumed.get() + 1);
        let remaining = self.remaining.get();
        if remaining == u64::MAX {
            return true;
        }
        if remaining == 0 {
            false
        } else {
            self.remaining.set(remaining - 1);
            true
        }
    }
}

impl ProgressMonitor for Fuel {
    fn is_canceled(&self) -> bool {
        !self.consume()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fuel_runs_out() {
        let fuel = Fuel::new(2);
        assert!(check_canceled(&fuel).is_ok());
        assert!(check_canceled(&fuel).is_ok());
        assert_eq!(check_canceled(&fuel), Err(Canceled));
        assert_eq!(fuel.consumed(), 3);
    }

    #[test]
    fn flag_cancels() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(check_canceled(&flag).is_ok());
        other.cancel();
        assert_eq!(check_canceled(&flag), Err(Canceled));
    }
}
