//! Decode pipeline: collections -> threshold codec -> gunzip -> untar -> directory.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shardlock_io::{compress, dir, serialize, CollectionChunks, LayoutError};
use shardlock_pad::{CodecError, CollectionStream, PadDecoder};

use crate::config::{default_join_timeout, duration_secs};
use crate::error::EngineError;
use crate::pipe::{self, DEFAULT_CAPACITY};
use crate::sizing::CountingReader;

/// Everything a decode run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Directories holding collections (or that are collections).
    pub input_dirs: Vec<PathBuf>,
    /// Where the reconstructed tree goes.
    pub output_dir: PathBuf,
    /// Clear a non-empty output directory before writing.
    pub clear: bool,
    /// Account sizes only; write nothing.
    pub dry_run: bool,
    /// Watchdog deadline for the pipeline join.
    #[serde(with = "duration_secs")]
    pub join_timeout: Duration,
}

impl DecodeOptions {
    #[must_use]
    pub fn new(input_dirs: Vec<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            input_dirs,
            output_dir,
            clear: false,
            dry_run: false,
            join_timeout: default_join_timeout(),
        }
    }
}

/// Outcome of a decode run.
#[derive(Debug, Serialize)]
pub struct DecodeReport {
    /// Labels of the collections found (decode uses the first K).
    pub collections: Vec<String>,
    /// Chunks reconstructed.
    pub chunks: u64,
    /// Bytes the codec handed to decompression.
    pub decoded_bytes: u64,
    /// Decompressed bytes (the tar stream) that reached deserialisation.
    pub output_bytes: u64,
    /// Files restored (zero under dry run).
    pub files: u64,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

/// Run the decode pipeline to completion.
///
/// # Errors
///
/// Surfaces codec, layout, and I/O failures;
/// [`EngineError::PipelineTimeout`] when the deserialiser fails to quiesce.
pub fn decode(options: &DecodeOptions) -> Result<DecodeReport, EngineError> {
    let start = Instant::now();
    tracing::info!(
        inputs = options.input_dirs.len(),
        output = %options.output_dir.display(),
        dry_run = options.dry_run,
        "starting decode"
    );

    let collections = shardlock_io::discover_collections(&options.input_dirs)?;
    let labels: Vec<String> = collections.iter().map(|c| c.label.to_string()).collect();
    tracing::info!(collections = labels.join(","), "collections located");

    if !options.dry_run {
        dir::prepare_output_dir(&options.output_dir, options.clear)?;
    }

    let readers: Vec<CollectionStream<CollectionChunks>> = collections
        .iter()
        .map(|collection| Ok(CollectionStream::new(CollectionChunks::open(collection)?)))
        .collect::<Result<_, LayoutError>>()?;
    let decoder = PadDecoder::new(readers.len()).map_err(CodecError::from)?;

    // Deserialiser task: sniff gzip, inflate, unpack the tar.
    let (writer, reader) = pipe::pipe(DEFAULT_CAPACITY);
    let output_dir = options.output_dir.clone();
    let dry_run = options.dry_run;
    let output_counter = Arc::new(AtomicU64::new(0));
    let thread_counter = Arc::clone(&output_counter);
    let (done_tx, done_rx) = mpsc::channel();
    let deserializer = thread::spawn(move || {
        let result = (|| -> Result<u64, LayoutError> {
            let stream = compress::decompress_reader(reader)?;
            let mut counting = CountingReader::new(stream, thread_counter);
            if dry_run {
                io::copy(&mut counting, &mut io::sink())?;
                Ok(0)
            } else {
                let summary = serialize::unpack_tree(&mut counting, &output_dir)?;
                Ok(summary.files)
            }
        })();
        let _ = done_tx.send(result);
    });

    // Codec task: reconstruct the compressed stream into the pipe.
    let mut pipe_writer = writer;
    let codec_result = decoder.run(readers, &mut pipe_writer);
    match &codec_result {
        Ok(_) => drop(pipe_writer),
        Err(e) => pipe_writer.close_with_error(format!("decode failed: {e}")),
    }

    // Watchdog: never block on a wedged deserialiser.
    let unpack_result = match done_rx.recv_timeout(options.join_timeout) {
        Ok(result) => {
            let _ = deserializer.join();
            result
        }
        Err(_) => {
            return Err(EngineError::PipelineTimeout {
                seconds: options.join_timeout.as_secs(),
            })
        }
    };

    let (summary, files) = match (codec_result, unpack_result) {
        (Ok(summary), Ok(files)) => (summary, files),
        (Err(codec), Err(unpack)) => {
            // A pipe-level codec failure usually reflects the deserialiser's
            // fault; report the root cause.
            if matches!(codec, CodecError::Io(_)) {
                return Err(unpack.into());
            }
            return Err(codec.into());
        }
        (Err(codec), Ok(_)) => return Err(codec.into()),
        (Ok(_), Err(unpack)) => return Err(unpack.into()),
    };

    let report = DecodeReport {
        collections: labels,
        chunks: summary.chunks,
        decoded_bytes: summary.plaintext_bytes,
        output_bytes: output_counter.load(Ordering::Relaxed),
        files,
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    tracing::info!(
        chunks = report.chunks,
        files = report.files,
        output_bytes = report.output_bytes,
        elapsed_ms = report.elapsed_ms,
        "decode complete"
    );
    Ok(report)
}
