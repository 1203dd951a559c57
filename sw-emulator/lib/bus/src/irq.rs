/*++

Licensed under the Apache-2.0 license.

File Name:

    irq.rs

Abstract:

    File contains an interrupt line raised by peripherals.

--*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Interrupt request line.
///
/// Cloned handles observe the same line. The level is published with a single
/// atomic store so an observer on another thread never sees a partially
/// updated value.
#[derive(Clone, Default, Debug)]
pub struct Irq {
    level: Arc<AtomicBool>,
}

impl Irq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level of the interrupt line (logic high or low).
    pub fn set_level(&self, is_high: bool) {
        self.level.store(is_high, Ordering::SeqCst);
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_level() {
        let irq = Irq::new();
        let observer = irq.clone();
        assert!(!observer.is_high());

        irq.set_level(true);
        assert!(observer.is_high());

        irq.set_level(false);
        assert!(!observer.is_high());
    }

    #[test]
    fn test_observed_from_other_thread() {
        let irq = Irq::new();
        let observer = irq.clone();
        irq.set_level(true);
        let seen = std::thread::spawn(move || observer.is_high()).join().unwrap();
        assert!(seen);
    }
}
