/*++

Licensed under the Apache-2.0 license.

File Name:

    wait.rs

Abstract:

    File contains common functions to implement wait routines.

--*/

use std::time::{Duration, Instant};

/// Point in time a wait gives up at.
///
/// A deadline can be pushed out by its original budget, which the poll loop
/// does when the engine asks for a mid-operation restart.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
    expires: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            budget,
            expires: Instant::now() + budget,
        }
    }

    pub fn expired(&self) -> bool {
        Instant::now() > self.expires
    }

    /// Restart the budget from now
    pub fn extend(&mut self) {
        self.expires = Instant::now() + self.budget;
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Call `poll` until it yields a value or `deadline` passes.
///
/// `poll` is always invoked at least once.
pub fn until<T, F>(deadline: &mut Deadline, mut poll: F) -> Option<T>
where
    F: FnMut(&mut Deadline) -> Option<T>,
{
    loop {
        if let Some(val) = poll(deadline) {
            return Some(val);
        }
        if deadline.expired() {
            return None;
        }
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_until_returns_value() {
        let mut deadline = Deadline::after(Duration::from_secs(1));
        let mut calls = 0;
        let val = until(&mut deadline, |_| {
            calls += 1;
            (calls == 3).then_some(calls)
        });
        assert_eq!(val, Some(3));
    }

    #[test]
    fn test_until_times_out() {
        let budget = Duration::from_millis(20);
        let start = Instant::now();
        let mut deadline = Deadline::after(budget);
        assert_eq!(until(&mut deadline, |_| None::<()>), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= budget);
        assert!(elapsed < budget + Duration::from_millis(500));
    }

    #[test]
    fn test_extend() {
        let mut deadline = Deadline::after(Duration::from_millis(10));
        let mut extended = false;
        let start = Instant::now();
        let val = until(&mut deadline, |deadline| {
            if !extended && start.elapsed() >= Duration::from_millis(5) {
                extended = true;
                deadline.extend();
            }
            (start.elapsed() >= Duration::from_millis(12)).then_some(())
        });
        assert_eq!(val, Some(()));
        assert!(extended);
    }
}
