use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait interrupted")]
pub struct Interrupted;

/// Source of every suspension in a decision cycle.
pub trait Clock {
    /// Block for `duration`, or return `Interrupted` if the wait was cancelled.
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted>;
}

/// Slice length for `SystemClock` so a stop request is seen promptly
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Real-time clock whose waits can be cancelled through a shared stop flag.
#[derive(Debug, Clone, Default)]
pub struct SystemClock {
    stop: Arc<AtomicBool>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the current and every later wait, on this clock and its clones.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let deadline = Instant::now() + duration;
        loop {
            if self.stop.load(Ordering::Relaxed) {
                return Err(Interrupted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// Clock that returns immediately and records what was asked of it.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
    interrupt: AtomicBool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following `sleep` reports `Interrupted`.
    pub fn interrupting() -> Self {
        Self {
            sleeps: Mutex::default(),
            interrupt: AtomicBool::new(true),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Clock for ManualClock {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(Interrupted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_records_without_waiting() {
        let clock = ManualClock::new();
        let started = Instant::now();
        clock.sleep(Duration::from_secs(30)).unwrap();
        clock.sleep(Duration::from_millis(1500)).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(clock.sleeps().len(), 2);
        assert_eq!(clock.total_slept(), Duration::from_millis(31_500));
    }

    #[test]
    fn test_system_clock_waits() {
        let clock = SystemClock::new();
        let started = Instant::now();
        clock.sleep(Duration::from_millis(60)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[test]
    fn test_stop_from_another_thread_cancels_wait() {
        let clock = SystemClock::new();
        let handle = clock.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handle.stop();
        });
        let started = Instant::now();
        assert_eq!(clock.sleep(Duration::from_secs(30)), Err(Interrupted));
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }

    #[test]
    fn test_system_clock_stop_interrupts() {
        let clock = SystemClock::new();
        clock.stop();
        let started = Instant::now();
        assert_eq!(clock.sleep(Duration::from_secs(10)), Err(Interrupted));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
