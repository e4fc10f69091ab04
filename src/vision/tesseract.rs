//! Tesseract OCR backend
//!
//! Runs the Tesseract engine through the `tesseract` crate. Submissions are
//! queued to a small pool of worker threads; each worker hands the image to
//! a fresh engine instance as PNG, parses the TSV report into blocks, lines
//! and elements, and invokes the submission's callback.

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, SendError, Sender};
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use tesseract::{PageSegMode, Tesseract};
use tracing::{debug, info, warn};

use super::{
    FailureCallback, InputImage, RecognizedText, SuccessCallback, TextBlock, TextElement,
    TextLine, TextRecognizer,
};
use crate::config::RecognizerSettings;
use crate::error::{panic_message, EngineError};

/// TSV `level` value of word rows
const WORD_LEVEL: u32 = 5;

/// Columns in a tesseract TSV row, the last one being the text
const TSV_COLUMNS: usize = 12;

/// Turns one image into recognized text on a worker thread
type RecognizeFn = fn(&RecognizerSettings, &DynamicImage) -> Result<RecognizedText, EngineError>;

/// One queued submission
struct Job {
    image: InputImage,
    on_success: SuccessCallback,
    on_failure: FailureCallback,
}

/// Tesseract-backed text recognizer
pub struct TesseractRecognizer {
    settings: RecognizerSettings,
    jobs: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TesseractRecognizer {
    /// Start the worker pool. An engine instance is only created per job.
    pub fn new(settings: RecognizerSettings) -> Result<Self> {
        if page_seg_mode(settings.page_segmentation_mode).is_none() {
            warn!(
                "Unknown page segmentation mode {}; using automatic segmentation",
                settings.page_segmentation_mode
            );
        }
        Self::start(settings, run_tesseract)
    }

    fn start(settings: RecognizerSettings, recognize: RecognizeFn) -> Result<Self> {
        let worker_count = settings.workers.max(1);
        let (sender, receiver) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver = receiver.clone();
            let settings = settings.clone();
            let handle = std::thread::Builder::new()
                .name(format!("tesseract-worker-{index}"))
                .spawn(move || worker_loop(receiver, settings, recognize))
                .context("Failed to spawn recognizer worker")?;
            workers.push(handle);
        }

        info!(
            "Tesseract recognizer started ({} workers, language: {}, psm: {})",
            worker_count, settings.language, settings.page_segmentation_mode
        );

        Ok(Self {
            settings,
            jobs: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        })
    }

    /// Check whether the engine initialises with the configured language data
    pub fn is_available(settings: &RecognizerSettings) -> bool {
        Tesseract::new(settings.datapath.as_deref(), Some(settings.language.as_str())).is_ok()
    }

    pub fn settings(&self) -> &RecognizerSettings {
        &self.settings
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn process(
        &self,
        image: InputImage,
        on_success: SuccessCallback,
        on_failure: FailureCallback,
    ) {
        let sender = self.jobs.lock().clone();
        let job = Job {
            image,
            on_success,
            on_failure,
        };

        match sender {
            Some(sender) => {
                if let Err(SendError(job)) = sender.send(job) {
                    (job.on_failure)(EngineError::Closed);
                }
            }
            None => (job.on_failure)(EngineError::Closed),
        }
    }

    /// Stop accepting work, let queued jobs finish, then join the workers
    fn close(&self) {
        let Some(sender) = self.jobs.lock().take() else {
            return;
        };
        drop(sender);

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                warn!("Recognizer worker panicked");
            }
        }
        info!("Tesseract recognizer closed");
    }
}

impl Drop for TesseractRecognizer {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(receiver: Receiver<Job>, settings: RecognizerSettings, recognize: RecognizeFn) {
    // Ends once the sender is dropped and the queue has drained
    for job in receiver.iter() {
        let Job {
            image,
            on_success,
            on_failure,
        } = job;
        debug!("Recognizing {}x{} image", image.width(), image.height());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            recognize(&settings, image.image())
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(&*payload);
            warn!("Recognition panicked: {}", message);
            Err(EngineError::Panicked(message))
        });

        let delivered = panic::catch_unwind(AssertUnwindSafe(move || match outcome {
            Ok(text) => on_success(text),
            Err(e) => on_failure(e),
        }));
        if let Err(payload) = delivered {
            warn!("Recognition callback panicked: {}", panic_message(&*payload));
        }
    }
}

/// Map a `--psm` number onto the engine's segmentation mode
fn page_seg_mode(mode: u8) -> Option<PageSegMode> {
    let mode = match mode {
        0 => PageSegMode::PsmOsdOnly,
        1 => PageSegMode::PsmAutoOsd,
        2 => PageSegMode::PsmAutoOnly,
        3 => PageSegMode::PsmAuto,
        4 => PageSegMode::PsmSingleColumn,
        5 => PageSegMode::PsmSingleBlockVertText,
        6 => PageSegMode::PsmSingleBlock,
        7 => PageSegMode::PsmSingleLine,
        8 => PageSegMode::PsmSingleWord,
        9 => PageSegMode::PsmCircleWord,
        10 => PageSegMode::PsmSingleChar,
        11 => PageSegMode::PsmSparseText,
        12 => PageSegMode::PsmSparseTextOsd,
        13 => PageSegMode::PsmRawLine,
        _ => return None,
    };
    Some(mode)
}

/// Run one recognition through a fresh engine instance
fn run_tesseract(
    settings: &RecognizerSettings,
    image: &DynamicImage,
) -> Result<RecognizedText, EngineError> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| EngineError::Input(e.to_string()))?;

    let language = settings.language.as_str();
    let mut engine = Tesseract::new(settings.datapath.as_deref(), Some(language)).map_err(|e| {
        EngineError::Initialize {
            language: language.to_string(),
            reason: e.to_string(),
        }
    })?;
    engine.set_page_seg_mode(
        page_seg_mode(settings.page_segmentation_mode).unwrap_or(PageSegMode::PsmAuto),
    );

    let mut engine = engine
        .set_image_from_mem(&png)
        .map_err(|e| EngineError::Input(e.to_string()))?
        .recognize()
        .map_err(|e| EngineError::Recognize(e.to_string()))?;

    let tsv = engine
        .get_tsv_text(0)
        .map_err(|e| EngineError::Output(e.to_string()))?;
    parse_tsv(&tsv)
}

/// Line being assembled, keyed by (paragraph, line) within its block
struct LineBuilder {
    key: (u32, u32),
    elements: Vec<TextElement>,
}

struct BlockBuilder {
    block_num: u32,
    lines: Vec<LineBuilder>,
}

/// Parse tesseract's TSV report.
///
/// Only word rows are read; rows arrive in reading order, so a change of
/// block or (paragraph, line) number starts a new block or line.
pub fn parse_tsv(tsv: &str) -> Result<RecognizedText, EngineError> {
    let mut rows = tsv.lines().enumerate();

    match rows.next() {
        None => return Ok(RecognizedText::default()),
        Some((_, header)) if header.starts_with("level") => {}
        Some((_, header)) => {
            return Err(EngineError::Output(format!("unexpected header: {header}")));
        }
    }

    let mut blocks: Vec<BlockBuilder> = Vec::new();

    for (index, row) in rows {
        if row.trim().is_empty() {
            continue;
        }

        let row_no = index + 1;
        let columns: Vec<&str> = row.splitn(TSV_COLUMNS, '\t').collect();
        if columns.len() < TSV_COLUMNS - 1 {
            return Err(EngineError::Output(format!(
                "row {row_no}: expected {TSV_COLUMNS} columns, found {}",
                columns.len()
            )));
        }

        let number = |column: usize| -> Result<u32, EngineError> {
            columns[column].trim().parse::<u32>().map_err(|_| {
                EngineError::Output(format!(
                    "row {row_no}: column {column} is not a number: {:?}",
                    columns[column]
                ))
            })
        };

        if number(0)? != WORD_LEVEL {
            continue;
        }

        let block_num = number(2)?;
        let line_key = (number(3)?, number(4)?);
        let element = TextElement {
            text: columns.get(11).map(|t| t.trim()).unwrap_or_default().to_string(),
            bounds: (number(6)?, number(7)?, number(8)?, number(9)?),
        };

        if blocks.last().map(|b| b.block_num) != Some(block_num) {
            blocks.push(BlockBuilder {
                block_num,
                lines: Vec::new(),
            });
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };

        if block.lines.last().map(|l| l.key) != Some(line_key) {
            block.lines.push(LineBuilder {
                key: line_key,
                elements: Vec::new(),
            });
        }
        if let Some(line) = block.lines.last_mut() {
            line.elements.push(element);
        }
    }

    let blocks = blocks
        .into_iter()
        .map(|block| {
            TextBlock::from_lines(
                block
                    .lines
                    .into_iter()
                    .map(|line| TextLine::from_elements(line.elements))
                    .collect(),
            )
        })
        .collect();

    Ok(RecognizedText { blocks })
}
