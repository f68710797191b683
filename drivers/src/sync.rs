/*++

Licensed under the Apache-2.0 license.

File Name:

    sync.rs

Abstract:

    File contains the interrupt context shared between the engine and its
    interrupt service routine.

--*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tegra_se_registers::{se, Int};
use tock_registers::LocalRegisterCopy;

use crate::platform::SeMmio;

/// Counting semaphore
#[derive(Debug)]
pub(crate) struct Semaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(count: u32) -> Self {
        Self {
            count: Mutex::new(count),
            cond: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cond.notify_one();
    }

    /// Take one count, waiting at most `timeout`. Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count == 0 {
            if self.cond.wait_until(&mut count, deadline).timed_out() && *count == 0 {
                return false;
            }
        }
        *count -= 1;
        true
    }
}

/// State touched by the interrupt service routine.
#[derive(Debug)]
pub(crate) struct IsrContext {
    error: AtomicBool,
    pub done: Semaphore,
}

impl Default for IsrContext {
    fn default() -> Self {
        Self {
            error: AtomicBool::new(false),
            done: Semaphore::new(1),
        }
    }
}

impl IsrContext {
    /// Interrupt service routine: acknowledge, latch errors, signal waiters
    pub fn service(&self, mmio: &dyn SeMmio) {
        let status = mmio.read(se::INT_STATUS);
        mmio.write(se::INT_STATUS, status);

        let status = LocalRegisterCopy::<u32, Int::Register>::new(status);
        if !status.is_set(Int::SE_OP_DONE) {
            self.error.store(true, Ordering::SeqCst);
        }
        self.done.signal();
    }

    pub fn error(&self) -> bool {
        self.error.load(Ordering::SeqCst)
    }

    pub fn clear_error(&self) {
        self.error.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::Arc;

    struct FakeMmio {
        int_status: Cell<u32>,
    }

    impl SeMmio for FakeMmio {
        fn read(&self, offset: u32) -> u32 {
            assert_eq!(offset, se::INT_STATUS);
            self.int_status.get()
        }

        fn write(&self, offset: u32, val: u32) {
            assert_eq!(offset, se::INT_STATUS);
            self.int_status.set(self.int_status.get() & !val);
        }
    }

    #[test]
    fn test_semaphore_timeout() {
        let sem = Semaphore::new(0);
        let start = Instant::now();
        assert!(!sem.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_semaphore_signal_from_thread() {
        let sem = Arc::new(Semaphore::new(0));
        let signaller = sem.clone();
        let handle = std::thread::spawn(move || signaller.signal());
        assert!(sem.wait_timeout(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn test_isr_op_done() {
        let isr = IsrContext::default();
        assert!(isr.done.wait_timeout(Duration::ZERO));

        let mmio = FakeMmio {
            int_status: Cell::new(Int::SE_OP_DONE::SET.value),
        };
        isr.service(&mmio);
        assert_eq!(mmio.int_status.get(), 0);
        assert!(!isr.error());
        assert!(isr.done.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn test_isr_error_is_sticky() {
        let isr = IsrContext::default();
        let mmio = FakeMmio {
            int_status: Cell::new(Int::ERR_STAT::SET.value),
        };
        isr.service(&mmio);
        assert!(isr.error());

        mmio.int_status.set(Int::SE_OP_DONE::SET.value);
        isr.service(&mmio);
        assert!(isr.error());

        isr.clear_error();
        assert!(!isr.error());
    }
}
