//! Write-completion detection
//!
//! A file copied in by a scanner or sync client shows up before its last byte
//! lands. The probe polls the size until it stops moving.

use crate::error::{IntakeError, Result};
use crate::shutdown::ShutdownSignal;
use std::path::Path;
use std::time::Duration;

/// Outcome of a stability wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size was unchanged for the required number of consecutive polls
    Stable,
    /// The cancel signal fired before the file settled
    Cancelled,
}

/// Size-polling stability probe
#[derive(Debug, Clone)]
pub struct StabilityProbe {
    /// Delay between polls (default: 1.5s)
    pub interval: Duration,

    /// Consecutive equal readings required (default: 2)
    pub required_checks: u32,

    /// Give up after this many polls; `None` waits indefinitely
    pub max_polls: Option<u32>,
}

impl Default for StabilityProbe {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            required_checks: 2,
            max_polls: None,
        }
    }
}

impl StabilityProbe {
    pub fn new(interval: Duration, required_checks: u32) -> Self {
        Self {
            interval,
            required_checks,
            max_polls: None,
        }
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Block until the file size settles
    ///
    /// The first reading only establishes a baseline, so a stable file takes
    /// `required_checks` sleeps of `interval` to pass.
    ///
    /// # Errors
    /// * `IntakeError::Io` - the file could not be stat'ed (usually removed)
    /// * `IntakeError::Unstable` - `max_polls` was reached
    pub fn wait(&self, path: &Path, cancel: &ShutdownSignal) -> Result<Stability> {
        let mut last: Option<u64> = None;
        let mut stable = 0u32;
        let mut polls = 0u32;

        loop {
            let size = std::fs::metadata(path)
                .map_err(|e| IntakeError::io(path, e))?
                .len();
            polls += 1;

            if last == Some(size) {
                stable += 1;
            } else {
                stable = 0;
                last = Some(size);
            }

            if stable >= self.required_checks {
                return Ok(Stability::Stable);
            }

            if let Some(max) = self.max_polls {
                if polls >= max {
                    return Err(IntakeError::Unstable {
                        path: path.to_path_buf(),
                        polls,
                    });
                }
            }

            if cancel.sleep(self.interval) {
                return Ok(Stability::Cancelled);
            }
        }
    }
}

/// Convenience form of [`StabilityProbe::wait`] without bound or cancellation
///
/// Returns `false` if the file disappears while being polled.
pub fn is_stable(path: &Path, wait_interval: Duration, required_consecutive_checks: u32) -> bool {
    let probe = StabilityProbe::new(wait_interval, required_consecutive_checks);
    matches!(
        probe.wait(path, &ShutdownSignal::new()),
        Ok(Stability::Stable)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_static_file_is_stable() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let file = temp_dir.path().join("done.pdf");
        std::fs::write(&file, b"complete")?;

        let start = Instant::now();
        assert!(is_stable(&file, Duration::from_millis(20), 2));
        // Baseline poll plus two confirming polls, two sleeps in between
        assert!(start.elapsed() >= Duration::from_millis(40));
        Ok(())
    }

    #[test]
    fn test_growing_file_resets_counter() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let file = temp_dir.path().join("growing.pdf");
        std::fs::write(&file, b"")?;

        let writer_path = file.clone();
        let writer = thread::spawn(move || {
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(&writer_path)
                .unwrap();
            for _ in 0..10 {
                f.write_all(b"more bytes").unwrap();
                f.flush().unwrap();
                thread::sleep(Duration::from_millis(15));
            }
        });

        let probe = StabilityProbe::new(Duration::from_millis(30), 3);
        let outcome = probe.wait(&file, &ShutdownSignal::new())?;
        writer.join().unwrap();

        assert_eq!(outcome, Stability::Stable);
        assert_eq!(std::fs::metadata(&file)?.len(), 100);
        Ok(())
    }

    #[test]
    fn test_bounded_probe_gives_up() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let file = temp_dir.path().join("endless.pdf");
        std::fs::write(&file, b"x")?;

        let stop = ShutdownSignal::new();
        let writer_stop = stop.clone();
        let writer_path = file.clone();
        let writer = thread::spawn(move || {
            let mut n = 1u64;
            while !writer_stop.is_triggered() {
                n += 1;
                std::fs::write(&writer_path, vec![b'x'; n as usize]).unwrap();
                thread::sleep(Duration::from_millis(2));
            }
        });

        let probe = StabilityProbe::new(Duration::from_millis(20), 2).with_max_polls(4);
        let result = probe.wait(&file, &ShutdownSignal::new());

        stop.trigger();
        writer.join().unwrap();

        assert!(matches!(result, Err(IntakeError::Unstable { polls: 4, .. })));
        Ok(())
    }

    #[test]
    fn test_missing_file_errors() {
        let probe = StabilityProbe::new(Duration::from_millis(10), 2);
        let result = probe.wait(Path::new("/no/such/scan.pdf"), &ShutdownSignal::new());
        assert!(matches!(result, Err(IntakeError::Io { .. })));
        assert!(!is_stable(Path::new("/no/such/scan.pdf"), Duration::from_millis(10), 2));
    }

    #[test]
    fn test_cancel_interrupts_wait() -> anyhow::Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let file = temp_dir.path().join("slow.pdf");
        std::fs::write(&file, b"x")?;

        let cancel = ShutdownSignal::new();
        cancel.trigger();

        let probe = StabilityProbe::new(Duration::from_secs(60), 2);
        let start = Instant::now();
        assert_eq!(probe.wait(&file, &cancel)?, Stability::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
        Ok(())
    }
}
