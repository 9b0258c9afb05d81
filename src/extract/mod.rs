//! Scanning a whole ROM and writing every decodable MIO0 block to disk
//!
//! Candidates are independent of each other: a block that fails to decode
//! or to write is reported and the scan carries on with the next position.

mod event;

pub use event::{Discard, EventSink, ScanEvent};

use crate::mio0::{self, BackrefPolicy, Candidate, DecodeError, DecodedBlock, Header, Rejection};
use crate::scan::{select_region, CancelToken, Scanner};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Output name for the block found at `anchor`, without the extension
pub fn file_stem(anchor: usize) -> String {
    format!("mio0_{:06X}", anchor)
}

/// Output file name for the block found at `anchor`
pub fn output_file_name(anchor: usize) -> String {
    format!("{}.bin", file_stem(anchor))
}

/// Writes a decoded block into `dir`, returning the path written.
pub fn emit(block: &DecodedBlock, dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(output_file_name(block.anchor));
    std::fs::write(&path, &block.bytes)?;
    Ok(path)
}

/// Options for an extraction run
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub output_dir: PathBuf,
    pub backref_policy: BackrefPolicy,
    /// Decode candidates on the rayon thread pool
    pub parallel: bool,
    pub cancel: Option<CancelToken>,
}

impl ExtractOptions {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            backref_policy: BackrefPolicy::default(),
            parallel: false,
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_backref_policy(mut self, policy: BackrefPolicy) -> Self {
        self.backref_policy = policy;
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Summary of an extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub failed: usize,
    pub rejected: usize,
    pub cancelled: bool,
    /// Paths written, in ascending anchor order
    pub files: Vec<PathBuf>,
    /// Human-readable log, one entry per line
    pub lines: Vec<String>,
}

impl ExtractionReport {
    /// The final line of the log
    pub fn summary(&self) -> String {
        ScanEvent::Finished {
            extracted: self.extracted,
        }
        .to_string()
    }
}

impl EventSink for ExtractionReport {
    fn event(&mut self, event: &ScanEvent) {
        match event {
            ScanEvent::Rejected { .. } => self.rejected += 1,
            ScanEvent::Extracted { path, .. } => {
                self.extracted += 1;
                self.files.push(path.clone());
            }
            ScanEvent::DecodeFailed { .. } | ScanEvent::WriteFailed { .. } => self.failed += 1,
            ScanEvent::Cancelled { .. } => self.cancelled = true,
            _ => {}
        }

        self.lines
            .extend(event.to_string().lines().map(str::to_owned));
    }
}

/// What the scanning pass found at one signature
enum Found {
    Rejected(usize, Rejection),
    Accepted(Candidate),
}

impl Found {
    fn classify(header: &Header, src_len: usize) -> Found {
        match header.validate(src_len) {
            Ok(candidate) => Found::Accepted(candidate),
            Err(reason) => Found::Rejected(header.anchor, reason),
        }
    }
}

/// What became of an accepted candidate. Holds no decoded bytes, so a
/// parallel run only keeps paths and lengths around until it reports.
enum Persisted {
    Written { path: PathBuf, len: usize },
    DecodeFailed(DecodeError),
    WriteFailed { path: PathBuf, error: String },
}

enum Outcome {
    Rejected(usize, Rejection),
    Finished(Candidate, Persisted),
}

/// Forwards every event to the log, the report and the caller's sink
struct Run<'s, S: EventSink + ?Sized> {
    report: ExtractionReport,
    sink: &'s mut S,
}

impl<'s, S: EventSink + ?Sized> Run<'s, S> {
    fn emit(&mut self, event: ScanEvent) {
        event.trace();
        self.report.event(&event);
        self.sink.event(&event);
    }
}

/// Runs the scanner → validator → decoder → writer pipeline over a ROM
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extracts every block in `src`, reporting progress to `sink`.
    ///
    /// Events are delivered in ascending anchor order in both the sequential
    /// and parallel modes, so the returned report is the same either way.
    pub fn run<S: EventSink + ?Sized>(&self, src: &[u8], sink: &mut S) -> ExtractionReport {
        let mut run = Run {
            report: ExtractionReport::default(),
            sink,
        };

        let region = select_region(src.len() as u64);
        run.emit(ScanEvent::RegionSelected {
            region,
            rom_len: src.len(),
        });

        let mut scanner = Scanner::new(src, region);
        if let Some(token) = &self.options.cancel {
            scanner = scanner.with_cancel(token.clone());
        }

        if self.options.parallel {
            self.run_parallel(src, &mut scanner, &mut run);
        } else {
            self.run_sequential(src, &mut scanner, &mut run);
        }

        if scanner.was_cancelled() {
            run.emit(ScanEvent::Cancelled {
                position: scanner.position(),
            });
        }

        let extracted = run.report.extracted;
        run.emit(ScanEvent::Finished { extracted });

        run.report
    }

    fn run_sequential<S: EventSink + ?Sized>(
        &self,
        src: &[u8],
        scanner: &mut Scanner<'_>,
        run: &mut Run<'_, S>,
    ) {
        for header in scanner {
            match Found::classify(&header, src.len()) {
                Found::Rejected(anchor, reason) => run.emit(ScanEvent::Rejected { anchor, reason }),
                Found::Accepted(candidate) => {
                    let persisted = self.persist(src, &candidate);
                    self.finish(run, &candidate, persisted);
                }
            }
        }
    }

    fn run_parallel<S: EventSink + ?Sized>(
        &self,
        src: &[u8],
        scanner: &mut Scanner<'_>,
        run: &mut Run<'_, S>,
    ) {
        let found = scanner
            .map(|header| Found::classify(&header, src.len()))
            .collect::<Vec<_>>();

        tracing::debug!("Decoding {} signatures in parallel", found.len());

        // Each block is written as soon as it is decoded; only the events
        // are replayed in anchor order afterwards
        let outcomes = found
            .into_par_iter()
            .map(|found| match found {
                Found::Accepted(candidate) => {
                    let persisted = self.persist(src, &candidate);
                    Outcome::Finished(candidate, persisted)
                }
                Found::Rejected(anchor, reason) => Outcome::Rejected(anchor, reason),
            })
            .collect::<Vec<_>>();

        for outcome in outcomes {
            match outcome {
                Outcome::Finished(candidate, persisted) => {
                    self.finish(run, &candidate, persisted)
                }
                Outcome::Rejected(anchor, reason) => {
                    run.emit(ScanEvent::Rejected { anchor, reason })
                }
            }
        }
    }

    /// Decodes `candidate` and writes it to the output directory
    fn persist(&self, src: &[u8], candidate: &Candidate) -> Persisted {
        let anchor = candidate.anchor();
        let bytes = match mio0::decode_with(src, candidate, self.options.backref_policy) {
            Ok(bytes) => bytes,
            Err(error) => return Persisted::DecodeFailed(error),
        };

        let block = DecodedBlock { anchor, bytes };
        match emit(&block, &self.options.output_dir) {
            Ok(path) => Persisted::Written {
                path,
                len: block.bytes.len(),
            },
            Err(error) => Persisted::WriteFailed {
                path: self.options.output_dir.join(output_file_name(anchor)),
                error: error.to_string(),
            },
        }
    }

    fn finish<S: EventSink + ?Sized>(
        &self,
        run: &mut Run<'_, S>,
        candidate: &Candidate,
        persisted: Persisted,
    ) {
        let anchor = candidate.anchor();
        run.emit(ScanEvent::Accepted {
            anchor,
            declared_len: candidate.declared_len(),
        });

        run.emit(match persisted {
            Persisted::Written { path, len } => ScanEvent::Extracted { anchor, path, len },
            Persisted::DecodeFailed(error) => ScanEvent::DecodeFailed { anchor, error },
            Persisted::WriteFailed { path, error } => ScanEvent::WriteFailed {
                anchor,
                path,
                error,
            },
        });
    }
}

/// Extracts every block in `src` into `output_dir` with default options
pub fn extract_all<P: Into<PathBuf>>(src: &[u8], output_dir: P) -> ExtractionReport {
    Extractor::new(ExtractOptions::new(output_dir)).run(src, &mut Discard)
}
