//! Transfer-and-convert orchestration
//!
//! A session takes a device root, enumerates it, and gives every candidate
//! exactly one outcome:
//!
//! 1. Claim a collision-free target name in the flat output directory
//! 2. Copy the source into a temporary file inside the output directory
//! 3. HEIC files go to the conversion pool; everything else is renamed into
//!    place directly
//! 4. The outcome is sent to the collector, which owns the result and reports
//!    progress
//!
//! Copies happen on the calling thread while earlier files convert on the
//! pool. The number of staged files waiting for conversion is bounded so the
//! output disk does not fill with temporaries on large libraries.

use crate::convert::converter::Converter;
use crate::convert::decoder::default_decoder;
use crate::core::config::{resolve_workers, Config};
use crate::core::error::{ConversionErrorKind, SessionError};
use crate::core::outcome::{ConversionOutcome, OutcomeRecord, SessionResult, SessionResultBuilder};
use crate::core::output::{retained_name, target_name, OutputDir, StagedFile, TargetNames};
use crate::device::chain::ProbeChain;
use crate::device::traits::DeviceRoot;
use crate::media::enumerator::{enumerate, EnumerationOptions, MediaCandidate};
use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Progress report sent after each completed candidate
#[derive(Debug)]
pub struct Progress<'a> {
    /// Candidates finished so far, including this one
    pub completed: usize,
    pub total: usize,
    pub file_name: &'a str,
    pub outcome: &'a ConversionOutcome,
}

/// Settings for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub output_dir: PathBuf,
    pub copy_passthrough: bool,
    pub skip_existing: bool,
    pub include_unknown: bool,
    pub quarantine_dir: String,
    /// Conversion worker threads (0 = one per core)
    pub workers: usize,
}

impl SessionOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::from_config(&Config::default())
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output.directory.clone(),
            copy_passthrough: config.output.copy_passthrough,
            skip_existing: config.output.skip_existing,
            include_unknown: config.enumeration.include_unknown,
            quarantine_dir: config.output.quarantine_dir.clone(),
            workers: config.conversion.effective_workers(),
        }
    }

    pub fn with_copy_passthrough(mut self, enabled: bool) -> Self {
        self.copy_passthrough = enabled;
        self
    }

    pub fn with_skip_existing(mut self, enabled: bool) -> Self {
        self.skip_existing = enabled;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// What would happen to a candidate, for `--dry-run`
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlannedTransfer {
    pub candidate: MediaCandidate,
    pub target: Option<String>,
    pub action: PlannedAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlannedAction {
    Convert,
    Copy,
    SkipExisting,
    SkipPassthrough,
}

/// Runs transfer sessions
pub struct TransferSession {
    options: SessionOptions,
    converter: Converter,
    stop_flag: Arc<AtomicBool>,
}

/// How the coordinating thread disposed of a candidate
enum Staged {
    Done(ConversionOutcome),
    Convert(ConversionJob),
}

/// A staged HEIC copy waiting for a conversion worker
struct ConversionJob {
    staged: StagedFile,
    target: String,
    retained: String,
}

impl TransferSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            converter: Converter::new(default_decoder()),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = converter;
        self
    }

    /// Share a stop flag with the caller (set it to stop the session early)
    pub fn with_stop_flag(mut self, stop_flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = stop_flag;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    fn enumeration_options(&self) -> EnumerationOptions {
        EnumerationOptions {
            include_unknown: self.options.include_unknown,
        }
    }

    /// Discover the device and run a session against it
    ///
    /// No file is touched when discovery fails.
    pub fn discover_and_run<F>(&self, chain: &ProbeChain, progress: F) -> Result<SessionResult, SessionError>
    where
        F: FnMut(&Progress<'_>) + Send,
    {
        let root = chain.discover()?;
        info!("Device root: {}", root);
        self.run(root, progress)
    }

    /// Transfer and convert every media file below `root`
    pub fn run<F>(&self, root: DeviceRoot, progress: F) -> Result<SessionResult, SessionError>
    where
        F: FnMut(&Progress<'_>) + Send,
    {
        let candidates: Vec<MediaCandidate> = enumerate(&root, self.enumeration_options()).collect();
        info!("Found {} media files under {}", candidates.len(), root.path().display());
        self.run_candidates(root, candidates, progress)
    }

    /// Process an explicit candidate list
    pub fn run_candidates<F>(
        &self,
        root: DeviceRoot,
        candidates: Vec<MediaCandidate>,
        mut progress: F,
    ) -> Result<SessionResult, SessionError>
    where
        F: FnMut(&Progress<'_>) + Send,
    {
        let output = OutputDir::prepare(&self.options.output_dir, &self.options.quarantine_dir).map_err(|source| {
            SessionError::OutputDir {
                path: self.options.output_dir.clone(),
                source,
            }
        })?;

        let workers = resolve_workers(self.options.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("convert-{}", i))
            .build()
            .map_err(|e| SessionError::WorkerPool(e.to_string()))?;

        let total = candidates.len();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<OutcomeRecord>();

        // Tokens bound the number of staged files waiting for a worker
        let max_pending = workers * 2;
        let (slot_tx, slot_rx) = crossbeam_channel::bounded::<()>(max_pending);
        for _ in 0..max_pending {
            let _ = slot_tx.send(());
        }

        debug!(
            "Session: {} candidates, {} conversion workers, {} pending max",
            total, workers, max_pending
        );

        let builder = SessionResultBuilder::new(root, output.root().to_path_buf(), total);

        let builder = thread::scope(|scope| {
            let collector = scope.spawn(move || collect(builder, outcome_rx, total, &mut progress));

            let mut names = TargetNames::default();
            for candidate in candidates {
                if self.stop_flag.load(Ordering::SeqCst) {
                    let record = OutcomeRecord {
                        candidate,
                        outcome: ConversionOutcome::skipped("session stopped"),
                    };
                    let _ = outcome_tx.send(record);
                    continue;
                }

                match self.stage(&candidate, &output, &mut names) {
                    Staged::Done(outcome) => {
                        let _ = outcome_tx.send(OutcomeRecord { candidate, outcome });
                    }
                    Staged::Convert(job) => {
                        let _ = slot_rx.recv();
                        let tx = outcome_tx.clone();
                        let slot = slot_tx.clone();
                        let converter = self.converter.clone();
                        let output = output.clone();

                        pool.spawn(move || {
                            let outcome = run_conversion(&converter, &output, &candidate, job);
                            let _ = tx.send(OutcomeRecord { candidate, outcome });
                            let _ = slot.send(());
                        });
                    }
                }
            }

            // Workers hold the remaining senders; the collector ends when the
            // last job has reported
            drop(outcome_tx);

            match collector.join() {
                Ok(builder) => builder,
                Err(payload) => panic::resume_unwind(payload),
            }
        });

        let stopped = self.stop_flag.load(Ordering::SeqCst);
        let result = builder.finish(stopped);
        info!("Session finished: {}", result);
        Ok(result)
    }

    /// Dry run: decide what would happen to each candidate without writing
    pub fn plan(&self, root: &DeviceRoot) -> Vec<PlannedTransfer> {
        let mut names = TargetNames::default();

        enumerate(root, self.enumeration_options())
            .map(|candidate| {
                if !candidate.kind.is_convertible() && !self.options.copy_passthrough {
                    return PlannedTransfer {
                        candidate,
                        target: None,
                        action: PlannedAction::SkipPassthrough,
                    };
                }

                let target = names.claim(&target_name(&candidate));
                let action = if self.options.skip_existing && self.options.output_dir.join(&target).exists() {
                    PlannedAction::SkipExisting
                } else if candidate.kind.is_convertible() {
                    PlannedAction::Convert
                } else {
                    PlannedAction::Copy
                };

                PlannedTransfer {
                    candidate,
                    target: Some(target),
                    action,
                }
            })
            .collect()
    }

    /// Claim a name and copy the candidate; finish it here unless it needs
    /// conversion
    fn stage(&self, candidate: &MediaCandidate, output: &OutputDir, names: &mut TargetNames) -> Staged {
        let convertible = candidate.kind.is_convertible();

        if !convertible && !self.options.copy_passthrough {
            return Staged::Done(ConversionOutcome::skipped("pass-through copies disabled"));
        }

        let target = names.claim(&target_name(candidate));
        if self.options.skip_existing && output.target_path(&target).exists() {
            debug!("Skipping {}: {} already exists", candidate.relative_path.display(), target);
            return Staged::Done(ConversionOutcome::skipped(format!("{} already exists", target)));
        }

        let staged = match output.stage_copy(&candidate.path) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("{}", e);
                return Staged::Done(ConversionOutcome::CopyFailed { reason: e.to_string() });
            }
        };

        if convertible {
            let retained = retained_name(&target, &candidate.file_name);
            return Staged::Convert(ConversionJob {
                staged,
                target,
                retained,
            });
        }

        let bytes = staged.bytes();
        match output.persist(staged, &target) {
            Ok(path) => Staged::Done(ConversionOutcome::CopiedUnchanged { output: path, bytes }),
            Err(e) => {
                warn!("{}", e);
                Staged::Done(ConversionOutcome::CopyFailed { reason: e.to_string() })
            }
        }
    }
}

/// Convert one staged HEIC copy on a worker thread
fn run_conversion(
    converter: &Converter,
    output: &OutputDir,
    candidate: &MediaCandidate,
    job: ConversionJob,
) -> ConversionOutcome {
    let ConversionJob {
        staged,
        target,
        retained,
    } = job;

    let source = match staged.read() {
        Ok(bytes) => bytes,
        Err(e) => {
            return keep_original(
                output,
                staged,
                &retained,
                ConversionErrorKind::DecodeFailure,
                format!("staged copy unreadable: {}", e),
            )
        }
    };

    let converted = panic::catch_unwind(AssertUnwindSafe(|| converter.convert(&source)));
    let converted = match converted {
        Ok(Ok(converted)) => converted,
        Ok(Err(e)) => {
            warn!("Could not convert {}: {}", candidate.relative_path.display(), e);
            return keep_original(output, staged, &retained, e.kind, e.message);
        }
        Err(_) => {
            warn!("Decoder panicked on {}", candidate.relative_path.display());
            return keep_original(
                output,
                staged,
                &retained,
                ConversionErrorKind::DecodeFailure,
                "decoder panicked".to_string(),
            );
        }
    };

    let bytes = converted.jpeg.len() as u64;
    match output.write_atomic(&target, &converted.jpeg, staged.modified()) {
        Ok(path) => {
            debug!("Converted {} -> {}", candidate.relative_path.display(), path.display());
            ConversionOutcome::Converted {
                output: path,
                metadata_preserved: converted.metadata.is_some(),
                bytes,
            }
        }
        Err(e) => {
            warn!("{}", e);
            keep_original(
                output,
                staged,
                &retained,
                ConversionErrorKind::EncodeFailure,
                e.to_string(),
            )
        }
    }
}

fn keep_original(
    output: &OutputDir,
    staged: StagedFile,
    name: &str,
    kind: ConversionErrorKind,
    reason: String,
) -> ConversionOutcome {
    let mut reason = reason;
    let retained = match output.quarantine(staged, name) {
        Ok(path) => Some(path),
        Err(e) => {
            let lost = output.quarantine_dir().join(name);
            error!("Could not keep original at {}: {}", lost.display(), e);
            reason = format!("{} (original not kept at {}: {})", reason, lost.display(), e);
            None
        }
    };

    ConversionOutcome::ConvertFailed {
        kind,
        reason,
        retained,
    }
}

/// Collector loop: owns the result builder and reports progress
fn collect<F>(
    mut builder: SessionResultBuilder,
    outcomes: Receiver<OutcomeRecord>,
    total: usize,
    progress: &mut F,
) -> SessionResultBuilder
where
    F: FnMut(&Progress<'_>),
{
    for record in outcomes {
        let completed = builder.completed() + 1;
        let record = builder.record(record);
        progress(&Progress {
            completed,
            total,
            file_name: &record.candidate.file_name,
            outcome: &record.outcome,
        });
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::metadata::{read_jpeg_exif, CaptureMetadata};
    use crate::device::traits::ProbeResult;
    use crate::media::kind::MediaKind;
    use crate::test_support::{device_tree, sample_heic, sample_tiff, visible_files, FakeDecoder, FakeProbe};
    use crate::core::output::TEMP_PREFIX;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn session(out: &TempDir) -> TransferSession {
        TransferSession::new(SessionOptions::new(out.path()).with_workers(2))
            .with_converter(Converter::new(Arc::new(FakeDecoder::default())))
    }

    fn root_of(device: &TempDir) -> DeviceRoot {
        DeviceRoot::local(device.path().join("DCIM"))
    }

    fn no_progress(_: &Progress<'_>) {}

    fn partial_entries(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(TEMP_PREFIX))
            .collect()
    }

    #[test]
    fn test_mixed_batch_scenario() {
        let heic = sample_heic();
        let device = device_tree(&[
            ("100APPLE/IMG_0001.HEIC", &heic),
            ("100APPLE/IMG_0002.HEIC", b"\x00\x00\x00\x10corrupted heic data"),
            ("100APPLE/VID_0003.MOV", b"quicktime movie bytes"),
        ]);
        let out = TempDir::new().unwrap();

        let result = session(&out).run(root_of(&device), no_progress).unwrap();

        assert_eq!(result.counts.converted, 1);
        assert_eq!(result.counts.copied_unchanged, 1);
        assert_eq!(result.counts.convert_failed, 1);
        assert_eq!(result.counts.copy_failed, 0);
        assert_eq!(result.records.len(), 3);

        assert_eq!(visible_files(out.path()), vec!["IMG_0001.JPG", "VID_0003.MOV"]);

        let jpeg = fs::read(out.path().join("IMG_0001.JPG")).unwrap();
        assert!(image::load_from_memory(&jpeg).is_ok());
        assert_eq!(fs::read(out.path().join("VID_0003.MOV")).unwrap(), b"quicktime movie bytes");

        let failed = result
            .records
            .iter()
            .find(|r| r.candidate.file_name == "IMG_0002.HEIC")
            .unwrap();
        match &failed.outcome {
            ConversionOutcome::ConvertFailed { kind, retained, .. } => {
                assert_eq!(*kind, ConversionErrorKind::DecodeFailure);
                let kept = retained.as_ref().unwrap();
                assert_eq!(fs::read(kept).unwrap(), b"\x00\x00\x00\x10corrupted heic data");
            }
            other => panic!("expected ConvertFailed, got {:?}", other),
        }

        // The device is never written to
        assert_eq!(
            fs::read(device.path().join("DCIM/100APPLE/IMG_0001.HEIC")).unwrap(),
            heic
        );
    }

    #[test]
    fn test_converted_metadata_survives() {
        let device = device_tree(&[("100APPLE/IMG_0001.HEIC", &sample_heic())]);
        let out = TempDir::new().unwrap();

        let result = session(&out).run(root_of(&device), no_progress).unwrap();
        assert!(matches!(
            result.records[0].outcome,
            ConversionOutcome::Converted {
                metadata_preserved: true,
                ..
            }
        ));

        let jpeg = fs::read(out.path().join("IMG_0001.JPG")).unwrap();
        let block = read_jpeg_exif(&jpeg).unwrap();
        assert_eq!(block.as_bytes(), &sample_tiff()[..]);
        assert_eq!(CaptureMetadata::parse(&block).unwrap().orientation, Some(6));
    }

    #[test]
    fn test_one_outcome_per_candidate_and_progress() {
        let heic = sample_heic();
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();
        for i in 0..12 {
            files.push((format!("100APPLE/IMG_{:04}.HEIC", i), heic.clone()));
            files.push((format!("100APPLE/IMG_{:04}.JPG", i + 100), b"jpeg".to_vec()));
        }
        let refs: Vec<(&str, &[u8])> = files.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
        let device = device_tree(&refs);
        let out = TempDir::new().unwrap();

        let mut seen = Vec::new();
        let result = session(&out)
            .run(root_of(&device), |p| seen.push((p.completed, p.total)))
            .unwrap();

        assert_eq!(result.records.len(), 24);
        assert_eq!(result.counts.total(), 24);
        assert_eq!(result.counts.converted, 12);
        assert_eq!(result.counts.copied_unchanged, 12);
        assert_eq!(seen.len(), 24);
        assert!(seen.iter().enumerate().all(|(i, (done, total))| *done == i + 1 && *total == 24));
        assert!(!result.stopped);
    }

    #[test]
    fn test_no_temporaries_remain() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.HEIC", &sample_heic()),
            ("100APPLE/IMG_0002.HEIC", b"\x00bad"),
            ("100APPLE/IMG_0003.PNG", b"png"),
        ]);
        let out = TempDir::new().unwrap();
        session(&out).run(root_of(&device), no_progress).unwrap();

        let leftovers = partial_entries(out.path());
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_name_collisions_get_suffix() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.JPG", b"first"),
            ("101APPLE/IMG_0001.JPG", b"second"),
        ]);
        let out = TempDir::new().unwrap();

        let result = session(&out).run(root_of(&device), no_progress).unwrap();
        assert_eq!(result.counts.copied_unchanged, 2);
        assert_eq!(fs::read(out.path().join("IMG_0001.JPG")).unwrap(), b"first");
        assert_eq!(fs::read(out.path().join("IMG_0001_1.JPG")).unwrap(), b"second");
    }

    #[test]
    fn test_second_run_skips_existing() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.HEIC", &sample_heic()),
            ("100APPLE/VID_0002.MOV", b"mov"),
        ]);
        let out = TempDir::new().unwrap();

        let first = session(&out).run(root_of(&device), no_progress).unwrap();
        assert_eq!(first.counts.succeeded(), 2);

        let second = session(&out).run(root_of(&device), no_progress).unwrap();
        assert_eq!(second.counts.skipped, 2);
        assert_eq!(second.counts.succeeded(), 0);
    }

    #[test]
    fn test_overwrite_when_skip_existing_off() {
        let device = device_tree(&[("100APPLE/IMG_0001.JPG", b"new")]);
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("IMG_0001.JPG"), b"old").unwrap();

        let session = TransferSession::new(SessionOptions::new(out.path()).with_skip_existing(false).with_workers(1));
        let result = session.run(root_of(&device), no_progress).unwrap();
        assert_eq!(result.counts.copied_unchanged, 1);
        assert_eq!(fs::read(out.path().join("IMG_0001.JPG")).unwrap(), b"new");
    }

    #[test]
    fn test_unwritable_jpeg_target_keeps_original() {
        let heic = sample_heic();
        let device = device_tree(&[("100APPLE/IMG_0001.HEIC", &heic)]);
        let out = TempDir::new().unwrap();
        // A directory in the way makes the final rename fail
        fs::create_dir(out.path().join("IMG_0001.JPG")).unwrap();

        let session = TransferSession::new(SessionOptions::new(out.path()).with_skip_existing(false).with_workers(1))
            .with_converter(Converter::new(Arc::new(FakeDecoder::default())));
        let result = session.run(root_of(&device), no_progress).unwrap();

        assert_eq!(result.counts.convert_failed, 1);
        match &result.records[0].outcome {
            ConversionOutcome::ConvertFailed { kind, retained, .. } => {
                assert_eq!(*kind, ConversionErrorKind::EncodeFailure);
                let kept = retained.as_ref().unwrap();
                assert!(kept.starts_with(out.path().join(".unconverted")));
                assert_eq!(fs::read(kept).unwrap(), heic);
            }
            other => panic!("expected ConvertFailed, got {:?}", other),
        }

        assert!(out.path().join("IMG_0001.JPG").is_dir());
        assert!(partial_entries(out.path()).is_empty());
    }

    #[test]
    fn test_unkeepable_original_is_named_in_reason() {
        let device = device_tree(&[("100APPLE/IMG_0001.HEIC", b"\x00\x00\x00\x10corrupted heic data")]);
        let out = TempDir::new().unwrap();
        // A plain file where the quarantine folder should go
        fs::write(out.path().join(".unconverted"), b"not a folder").unwrap();

        let result = session(&out).run(root_of(&device), no_progress).unwrap();

        match &result.records[0].outcome {
            ConversionOutcome::ConvertFailed { kind, reason, retained } => {
                assert_eq!(*kind, ConversionErrorKind::DecodeFailure);
                assert!(retained.is_none());
                assert!(reason.contains("original not kept"));
                assert!(reason.contains("IMG_0001.HEIC"));
            }
            other => panic!("expected ConvertFailed, got {:?}", other),
        }
        assert!(partial_entries(out.path()).is_empty());
    }

    #[test]
    fn test_passthrough_disabled_skips_non_heic() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.HEIC", &sample_heic()),
            ("100APPLE/VID_0002.MOV", b"mov"),
        ]);
        let out = TempDir::new().unwrap();

        let session = TransferSession::new(SessionOptions::new(out.path()).with_copy_passthrough(false).with_workers(1))
            .with_converter(Converter::new(Arc::new(FakeDecoder::default())));
        let result = session.run(root_of(&device), no_progress).unwrap();

        assert_eq!(result.counts.converted, 1);
        assert_eq!(result.counts.skipped, 1);
        assert_eq!(visible_files(out.path()), vec!["IMG_0001.JPG"]);
    }

    #[test]
    fn test_stopped_session_records_skipped() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.JPG", b"a"),
            ("100APPLE/IMG_0002.JPG", b"b"),
        ]);
        let out = TempDir::new().unwrap();
        let stop = Arc::new(AtomicBool::new(true));

        let result = session(&out)
            .with_stop_flag(stop)
            .run(root_of(&device), no_progress)
            .unwrap();

        assert!(result.stopped);
        assert_eq!(result.counts.skipped, 2);
        assert_eq!(result.records.len(), 2);
        assert!(visible_files(out.path()).is_empty());
    }

    #[test]
    fn test_discovery_failure_touches_nothing() {
        let base = TempDir::new().unwrap();
        let out = base.path().join("never-created");
        let chain = ProbeChain::new(std::time::Duration::from_secs(1))
            .with_strategy(FakeProbe::new("media-api", ProbeResult::not_applicable("no gvfs")))
            .with_strategy(FakeProbe::new("usb-bus", ProbeResult::failed("no device")));

        let session = TransferSession::new(SessionOptions::new(&out).with_workers(1));
        let mut calls = 0;
        let err = session.discover_and_run(&chain, |_| calls += 1).unwrap_err();

        match err {
            SessionError::Discovery(e) => assert_eq!(e.attempts().len(), 2),
            other => panic!("expected discovery error, got {:?}", other),
        }
        assert_eq!(calls, 0);
        assert!(!out.exists());
    }

    #[test]
    fn test_unusable_output_dir() {
        let device = device_tree(&[("100APPLE/IMG_0001.JPG", b"a")]);
        let base = TempDir::new().unwrap();
        let blocker = base.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let session = TransferSession::new(SessionOptions::new(blocker.join("out")).with_workers(1));
        let err = session.run(root_of(&device), no_progress).unwrap_err();
        assert!(matches!(err, SessionError::OutputDir { .. }));
    }

    #[test]
    fn test_plan_does_not_write() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.HEIC", &sample_heic()),
            ("100APPLE/IMG_0002.JPG", b"jpg"),
        ]);
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("IMG_0002.JPG"), b"old").unwrap();

        let plan = session(&out).plan(&root_of(&device));
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].action, PlannedAction::Convert);
        assert_eq!(plan[0].target.as_deref(), Some("IMG_0001.JPG"));
        assert_eq!(plan[0].candidate.kind, MediaKind::ImageHeic);
        assert_eq!(plan[1].action, PlannedAction::SkipExisting);
        assert_eq!(visible_files(out.path()), vec!["IMG_0002.JPG"]);
    }

    #[test]
    fn test_result_serializes() {
        let device = device_tree(&[("100APPLE/IMG_0001.JPG", b"a")]);
        let out = TempDir::new().unwrap();
        let result = session(&out).run(root_of(&device), no_progress).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["counts"]["copied_unchanged"], 1);
        assert_eq!(json["records"][0]["outcome"]["status"], "copied-unchanged");
    }
}
