//! End-to-end pipeline tests
//!
//! Drive the full daemon wiring (registry, detection threads, queue, worker
//! pool) through the library API, with manually injected file events and an
//! in-process processor.

use anyhow::{anyhow, Result};
use docintake_cli::{Config, Daemon, WatchConfig};
use docintake_watcher::{FileEvent, ManualEventSource, StartStatus, StopStatus};
use docintake_worker::{FixedOutDir, ProcessOutput, Processor};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn fast_config() -> Config {
    let mut config = Config::default();
    config.stability.interval_ms = 20;
    config.stability.required_checks = 1;
    config.worker.poll_timeout_ms = 20;
    config
}

struct Harness {
    inbox: PathBuf,
    out: PathBuf,
    source: ManualEventSource,
    daemon: Daemon,
    calls: Arc<AtomicUsize>,
    _temp_dir: TempDir,
}

impl Harness {
    fn new(processor: impl Fn(&Path, &str) -> Result<ProcessOutput> + Send + Sync + 'static) -> Result<Self> {
        Self::with_config(fast_config(), processor)
    }

    fn with_config(
        config: Config,
        processor: impl Fn(&Path, &str) -> Result<ProcessOutput> + Send + Sync + 'static,
    ) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let inbox = temp_dir.path().join("inbox");
        let out = temp_dir.path().join("out");
        let source = ManualEventSource::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let counted: Arc<dyn Processor> = Arc::new(move |path: &Path, recipe: &str| -> Result<ProcessOutput> {
            counter.fetch_add(1, Ordering::SeqCst);
            processor(path, recipe)
        });

        let daemon = Daemon::start(
            &config,
            Arc::new(source.clone()),
            counted,
            Arc::new(FixedOutDir::new(&out)),
        )?;

        Ok(Self {
            inbox,
            out,
            source,
            daemon,
            calls,
            _temp_dir: temp_dir,
        })
    }

    fn watch(&self, recipe: &str, scan_existing: bool) -> Result<PathBuf> {
        let started = self.daemon.start_watch(&WatchConfig {
            folder: self.inbox.clone(),
            recipe: recipe.to_string(),
            out_dir: None,
            scan_existing,
        })?;
        assert_eq!(started.status, StartStatus::Watching);
        self.watched_folder(&started.key)
    }

    fn watched_folder(&self, key: &str) -> Result<PathBuf> {
        self.daemon
            .registry()
            .watches()
            .into_iter()
            .find(|w| w.key == key)
            .map(|w| w.folder)
            .ok_or_else(|| anyhow!("watch {key} not registered"))
    }

    /// Create a file and announce it as a create event
    fn drop_file(&self, folder: &Path, name: &str, contents: &[u8]) -> Result<()> {
        let path = folder.join(name);
        std::fs::write(&path, contents)?;
        self.source.emit(folder, FileEvent::created(path));
        Ok(())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

const TIMEOUT: Duration = Duration::from_secs(10);

fn echo_processor(path: &Path, recipe: &str) -> Result<ProcessOutput> {
    Ok(json!({
        "source": path.file_name().map(|n| n.to_string_lossy().into_owned()),
        "recipe": recipe,
        "text": "Rechnung Nr. 42",
    })
    .into())
}

#[test]
fn test_new_file_is_processed_and_relocated() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let folder = h.watch("R", false)?;

    h.drop_file(&folder, "a.pdf", b"%PDF-1.7 invoice")?;

    let result = h.out.join("a.json");
    assert!(wait_for(TIMEOUT, || result.exists()), "no result written");
    assert!(wait_for(TIMEOUT, || h.inbox.join("Processed/a.pdf").exists()));
    assert!(!h.inbox.join("a.pdf").exists());

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&result)?)?;
    assert_eq!(value["recipe"], "R");
    assert_eq!(value["source"], "a.pdf");
    assert!(std::fs::read_to_string(&result)?.contains("Rechnung Nr. 42"));

    assert_eq!(h.daemon.shutdown(), 1);
    Ok(())
}

#[test]
fn test_processor_failure_writes_error_report() -> Result<()> {
    let h = Harness::new(|_: &Path, _: &str| -> Result<ProcessOutput> {
        Err(anyhow!("OCR failed"))
    })?;
    let folder = h.watch("R", false)?;

    h.drop_file(&folder, "bad.pdf", b"not really a pdf")?;

    let report = h.out.join("Errors/bad.pdf.err.txt");
    assert!(wait_for(TIMEOUT, || report.exists()), "no error report written");
    assert!(std::fs::read_to_string(&report)?.contains("OCR failed"));
    assert!(h.inbox.join("bad.pdf").exists());
    assert!(!h.out.join("bad.json").exists());

    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_identical_content_processed_once() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let folder = h.watch("R", false)?;

    h.drop_file(&folder, "a.pdf", b"same bytes")?;
    h.drop_file(&folder, "b.pdf", b"same bytes")?;

    assert!(wait_for(TIMEOUT, || h.calls() >= 1));
    assert!(h.daemon.queue().wait_idle(TIMEOUT));
    // Give the second detection time to finish its probe
    std::thread::sleep(Duration::from_millis(300));
    assert!(h.daemon.queue().wait_idle(TIMEOUT));

    assert_eq!(h.calls(), 1);
    let outputs = ["a.json", "b.json"]
        .iter()
        .filter(|name| h.out.join(name).exists())
        .count();
    assert_eq!(outputs, 1);

    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_unsupported_and_temp_files_ignored() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let folder = h.watch("R", false)?;

    h.drop_file(&folder, "notes.txt", b"plain")?;
    h.drop_file(&folder, "scan.pdf.part", b"partial")?;
    h.drop_file(&folder, "~$draft.pdf", b"lock")?;
    h.drop_file(&folder, "ok.png", b"png")?;

    assert!(wait_for(TIMEOUT, || h.out.join("ok.json").exists()));
    assert!(h.daemon.queue().wait_idle(TIMEOUT));
    assert_eq!(h.calls(), 1);
    assert!(h.inbox.join("notes.txt").exists());

    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_scan_existing_ingests_backlog() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    std::fs::create_dir_all(&h.inbox)?;
    std::fs::write(h.inbox.join("waiting.tif"), b"scanned overnight")?;

    h.watch("R", true)?;

    assert!(wait_for(TIMEOUT, || h.out.join("waiting.json").exists()));
    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_watch_out_dir_override() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let custom = h.out.join("invoices");
    let started = h.daemon.start_watch(&WatchConfig {
        folder: h.inbox.clone(),
        recipe: "invoice".into(),
        out_dir: Some(custom.clone()),
        scan_existing: false,
    })?;
    let folder = h.watched_folder(&started.key)?;

    h.drop_file(&folder, "c.jpg", b"jpeg")?;

    assert!(wait_for(TIMEOUT, || custom.join("c.json").exists()));
    assert!(!h.out.join("c.json").exists());
    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_start_is_idempotent_and_stop_reports_state() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let watch = WatchConfig {
        folder: h.inbox.clone(),
        recipe: "R".into(),
        out_dir: None,
        scan_existing: false,
    };

    let first = h.daemon.start_watch(&watch)?;
    let second = h.daemon.start_watch(&watch)?;
    assert_eq!(first.key, second.key);
    assert_eq!(second.status, StartStatus::AlreadyWatching);
    assert_eq!(h.daemon.registry().len(), 1);
    assert!(h.inbox.is_dir(), "watch folder should be created");

    let folder = h.watched_folder(&first.key)?;
    assert_eq!(h.source.subscriber_count(&folder), 1);

    // Same folder, different recipe: a distinct watch
    let other = h.daemon.start_watch(&WatchConfig {
        recipe: "other".into(),
        ..watch.clone()
    })?;
    assert_eq!(other.status, StartStatus::Watching);
    assert_eq!(h.daemon.registry().len(), 2);

    assert_eq!(h.daemon.registry().stop(&first.key), StopStatus::Stopped);
    assert_eq!(h.daemon.registry().stop(&first.key), StopStatus::NotActive);
    assert_eq!(h.source.subscriber_count(&folder), 1);

    h.daemon.shutdown();
    assert_eq!(h.source.subscriber_count(&folder), 0);
    Ok(())
}

#[test]
fn test_stopped_watch_ignores_new_files() -> Result<()> {
    let h = Harness::new(echo_processor)?;
    let folder = h.watch("R", false)?;
    let key = h.daemon.registry().list().into_iter().next().ok_or_else(|| anyhow!("no watch"))?;

    assert_eq!(h.daemon.registry().stop(&key), StopStatus::Stopped);
    h.drop_file(&folder, "late.pdf", b"after stop")?;

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(h.calls(), 0);
    assert!(h.inbox.join("late.pdf").exists());
    h.daemon.shutdown();
    Ok(())
}

#[test]
fn test_multiple_workers_drain_many_files() -> Result<()> {
    let mut config = fast_config();
    config.worker.threads = 3;
    let h = Harness::with_config(config, echo_processor)?;
    let folder = h.watch("R", false)?;

    for i in 0..12 {
        h.drop_file(&folder, &format!("doc{i}.pdf"), format!("document {i}").as_bytes())?;
    }

    assert!(wait_for(TIMEOUT, || h.calls() == 12));
    assert!(h.daemon.queue().wait_idle(TIMEOUT));
    for i in 0..12 {
        assert!(h.out.join(format!("doc{i}.json")).exists());
    }
    assert_eq!(h.daemon.shutdown(), 12);
    Ok(())
}

#[test]
fn test_invalid_filter_pattern_rejected_at_start() {
    let mut config = fast_config();
    config.filter.ignore_patterns = vec!["{a".into()];
    let result = Daemon::start(
        &config,
        Arc::new(ManualEventSource::new()),
        Arc::new(echo_processor),
        Arc::new(FixedOutDir::new("out")),
    );
    assert!(result.is_err());
}
