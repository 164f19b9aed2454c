//! Batch runner: watermark every supported image in a folder.
//!
//! A run reports to its caller through three one-way notifications:
//! progress (0-100, never decreasing), success, and failure. Exactly one of
//! the two terminal notifications is sent per run.
//!
//! [`spawn`] runs a batch on a dedicated worker thread and delivers the
//! notifications as [`BatchEvent`]s over a channel.

use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::engine::{is_supported_image, FileOutcome, ProcessOptions, WatermarkEngine};
use crate::error::{Error, Result};
use crate::job::WatermarkJob;

/// Terminal summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of supported files found in the input folder.
    pub total: usize,
    /// Files that were watermarked and written.
    pub written: usize,
    /// Files skipped because they could not be decoded.
    pub skipped: usize,
    /// Folder the outputs were written to.
    pub output_dir: PathBuf,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let folder = self.output_dir.file_name().map_or_else(
            || self.output_dir.display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        write!(f, "Successfully watermarked {} files in: {folder}", self.written)?;
        if self.skipped > 0 {
            write!(f, " ({} skipped)", self.skipped)?;
        }
        Ok(())
    }
}

/// Receiver of batch notifications.
pub trait BatchObserver {
    /// Percentage of files attempted so far.
    fn on_progress(&mut self, percent: u8);
    /// The batch finished; sent at most once.
    fn on_success(&mut self, summary: &BatchSummary);
    /// The batch aborted; sent at most once.
    fn on_failure(&mut self, message: &str);
}

/// A batch notification, as delivered over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEvent {
    /// Progress in percent of files attempted.
    Progress(u8),
    /// Terminal success.
    Finished(BatchSummary),
    /// Terminal failure with a user-facing message.
    Failed(String),
}

impl BatchObserver for Sender<BatchEvent> {
    // A dropped receiver just means nobody is listening any more.
    fn on_progress(&mut self, percent: u8) {
        let _ = self.send(BatchEvent::Progress(percent));
    }

    fn on_success(&mut self, summary: &BatchSummary) {
        let _ = self.send(BatchEvent::Finished(summary.clone()));
    }

    fn on_failure(&mut self, message: &str) {
        let _ = self.send(BatchEvent::Failed(message.to_string()));
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {
    fn on_progress(&mut self, _percent: u8) {}
    fn on_success(&mut self, _summary: &BatchSummary) {}
    fn on_failure(&mut self, _message: &str) {}
}

/// `floor(attempted / total * 100)`, saturating at 100.
#[must_use]
pub fn progress_percent(attempted: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = attempted.saturating_mul(100) / total;
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// List the supported images directly inside `dir`, sorted by file name.
///
/// Extensions are matched case-insensitively; subdirectories are not
/// descended into.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be read.
pub fn find_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_supported_image(&entry.path()) {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Runs one [`WatermarkJob`] to completion.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    job: WatermarkJob,
    options: ProcessOptions,
}

impl BatchRunner {
    /// Create a runner for `job`.
    #[must_use]
    pub fn new(job: WatermarkJob, options: ProcessOptions) -> Self {
        Self { job, options }
    }

    /// Run the batch, reporting to `observer`.
    ///
    /// Undecodable inputs are skipped silently. The first fatal error stops
    /// the run; outputs already written stay on disk. A panic during the run
    /// is reported as a failure like any other fatal error.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the batch, after reporting its message
    /// through [`BatchObserver::on_failure`].
    pub fn run<O: BatchObserver + ?Sized>(self, observer: &mut O) -> Result<BatchSummary> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(observer)))
            .unwrap_or_else(|_| Err(Error::Io(io::Error::other("watermark batch panicked"))));
        match &result {
            Ok(summary) => {
                info!(
                    total = summary.total,
                    written = summary.written,
                    skipped = summary.skipped,
                    "watermark batch finished"
                );
                observer.on_success(summary);
            }
            Err(e) => {
                warn!(error = %e, "watermark batch aborted");
                observer.on_failure(&e.to_string());
            }
        }
        result
    }

    fn execute<O: BatchObserver + ?Sized>(&self, observer: &mut O) -> Result<BatchSummary> {
        let output_dir = self.job.output_dir();
        fs::create_dir_all(&output_dir)?;

        let files = find_images(self.job.input_dir())?;
        let total = files.len();
        if total == 0 {
            return Err(Error::NoSupportedImages);
        }

        info!(
            input = %self.job.input_dir().display(),
            files = total,
            anchor = %self.job.anchor(),
            "starting watermark batch"
        );

        let mut engine = WatermarkEngine::new(&self.job, &self.options)?;
        let (mut written, mut skipped) = (0, 0);

        for (i, input) in files.iter().enumerate() {
            // Entries from read_dir always carry a file name.
            let Some(name) = input.file_name() else {
                continue;
            };
            match engine.process_file(input, &output_dir.join(name))? {
                FileOutcome::Written => written += 1,
                FileOutcome::Skipped => {
                    debug!(file = %input.display(), "skipped");
                    skipped += 1;
                }
            }
            observer.on_progress(progress_percent(i + 1, total));
        }

        Ok(BatchSummary {
            total,
            written,
            skipped,
            output_dir,
        })
    }
}

/// A batch running on its own thread.
#[derive(Debug)]
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    worker: JoinHandle<Result<BatchSummary>>,
}

impl BatchHandle {
    /// Blocking iterator over notifications; ends when the worker exits.
    pub fn events(&self) -> mpsc::Iter<'_, BatchEvent> {
        self.events.iter()
    }

    /// Wait for the worker and return its result.
    ///
    /// # Errors
    ///
    /// Returns the batch's error, or [`Error::Io`] if the worker panicked.
    pub fn join(self) -> Result<BatchSummary> {
        self.worker
            .join()
            .map_err(|_| Error::Io(io::Error::other("watermark worker panicked")))?
    }
}

/// Start `job` on a dedicated worker thread.
///
/// # Errors
///
/// Returns [`Error::Io`] if the thread cannot be spawned.
pub fn spawn(job: WatermarkJob, options: ProcessOptions) -> Result<BatchHandle> {
    let (tx, events) = mpsc::channel();
    let worker = thread::Builder::new()
        .name("watermark-batch".to_string())
        .spawn(move || {
            let mut tx = tx;
            BatchRunner::new(job, options).run(&mut tx)
        })?;
    Ok(BatchHandle { events, worker })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Anchor;
    use crate::job::WatermarkKind;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        progress: Vec<u8>,
        successes: Vec<BatchSummary>,
        failures: Vec<String>,
    }

    impl BatchObserver for Recorder {
        fn on_progress(&mut self, percent: u8) {
            self.progress.push(percent);
        }
        fn on_success(&mut self, summary: &BatchSummary) {
            self.successes.push(summary.clone());
        }
        fn on_failure(&mut self, message: &str) {
            self.failures.push(message.to_string());
        }
    }

    fn text_job(dir: &Path) -> WatermarkJob {
        WatermarkJob::new(dir, WatermarkKind::Text("@Brand".into()), 100, Anchor::BottomRight)
            .unwrap()
    }

    fn write_png(path: &Path) {
        RgbaImage::from_pixel(60, 45, Rgba([30, 60, 90, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn progress_is_floored_percentage_of_attempted() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(0, 7), 0);
        assert_eq!(progress_percent(9, 7), 100);
    }

    #[test]
    fn find_images_is_case_insensitive_and_flat() {
        let dir = TempDir::new().unwrap();
        for name in ["b.PNG", "a.jpg", "c.Jpeg", "d.bmp", "notes.txt", "e.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();
        fs::write(dir.path().join("nested.png").join("f.png"), b"x").unwrap();

        let names: Vec<_> = find_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.Jpeg", "d.bmp"]);
    }

    #[test]
    fn empty_folder_fails_once_and_reports_no_progress() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("readme.txt"), b"hello").unwrap();
        let job = text_job(dir.path());

        let mut rec = Recorder::default();
        let err = BatchRunner::new(job.clone(), ProcessOptions::default())
            .run(&mut rec)
            .unwrap_err();

        assert!(matches!(err, Error::NoSupportedImages));
        assert_eq!(
            rec.failures,
            ["No supported image files found in the selected folder."]
        );
        assert!(rec.successes.is_empty());
        assert!(rec.progress.is_empty());
        assert!(job.output_dir_exists());
        assert_eq!(fs::read_dir(job.output_dir()).unwrap().count(), 0);
    }

    #[test]
    fn skipped_files_still_advance_progress() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"));
        fs::write(dir.path().join("b.jpg"), b"corrupt").unwrap();
        write_png(&dir.path().join("c.png"));

        let mut rec = Recorder::default();
        let summary = BatchRunner::new(text_job(dir.path()), ProcessOptions::default())
            .run(&mut rec)
            .unwrap();

        assert_eq!(rec.progress, [33, 66, 100]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.written, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(rec.successes, [summary.clone()]);
        assert!(rec.failures.is_empty());
        assert_eq!(
            summary.to_string(),
            "Successfully watermarked 2 files in: watermarked_output (1 skipped)"
        );
    }

    #[test]
    fn summary_message_without_skips() {
        let summary = BatchSummary {
            total: 4,
            written: 4,
            skipped: 0,
            output_dir: PathBuf::from("/photos/watermarked_output"),
        };
        assert_eq!(
            summary.to_string(),
            "Successfully watermarked 4 files in: watermarked_output"
        );
    }

    struct PanicsOnProgress(Recorder);

    impl BatchObserver for PanicsOnProgress {
        fn on_progress(&mut self, _percent: u8) {
            panic!("observer blew up");
        }
        fn on_success(&mut self, summary: &BatchSummary) {
            self.0.on_success(summary);
        }
        fn on_failure(&mut self, message: &str) {
            self.0.on_failure(message);
        }
    }

    #[test]
    fn panic_mid_batch_becomes_single_failure() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("a.png"));
        write_png(&dir.path().join("b.png"));

        let mut observer = PanicsOnProgress(Recorder::default());
        let err = BatchRunner::new(text_job(dir.path()), ProcessOptions::default())
            .run(&mut observer)
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(observer.0.successes.is_empty());
        assert_eq!(
            observer.0.failures,
            ["An error occurred during batch processing: watermark batch panicked"]
        );
    }

    #[test]
    fn spawned_batch_delivers_events_in_order() {
        let dir = TempDir::new().unwrap();
        write_png(&dir.path().join("one.png"));
        write_png(&dir.path().join("two.png"));

        let handle = spawn(text_job(dir.path()), ProcessOptions::default()).unwrap();
        let events: Vec<_> = handle.events().collect();
        let summary = handle.join().unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], BatchEvent::Progress(50));
        assert_eq!(events[1], BatchEvent::Progress(100));
        assert_eq!(events[2], BatchEvent::Finished(summary));
    }
}
