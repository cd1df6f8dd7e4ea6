//! Encode pipeline: directory -> tar -> gzip -> threshold codec -> outputs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use shardlock_io::{
    compress, dir, serialize, ArchiveChunkSink, ArchiveRegistry, Collection, FileChunkSink, Format,
};
use shardlock_pad::{
    ChunkSink, CodecError, CollectionLabel, PadEncoder, StreamEncoder, DEFAULT_CHUNK_SIZE,
};
use shardlock_rng::EntropySource;

use crate::config::{default_join_timeout, duration_secs};
use crate::error::EngineError;
use crate::pipe::{self, DEFAULT_CAPACITY};
use crate::sizing::{CountingReader, CountingWriter, SizeReport, SizeSink};
use crate::verify::{verify_png_outputs, VerifyReport};

/// Everything an encode run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Directory tree to encode.
    pub input_dir: PathBuf,
    /// One directory (collections laid out inside it) or one per collection.
    pub output_dirs: Vec<PathBuf>,
    /// N: collections to produce.
    pub total: usize,
    /// K: collections required to reconstruct.
    pub required: usize,
    /// Chunk packaging format.
    pub format: Format,
    /// Maximum plaintext bytes per chunk.
    pub chunk_size: usize,
    /// Clear non-empty output directories before writing.
    pub clear: bool,
    /// One tar per collection instead of per-chunk files.
    pub archive: bool,
    /// Account sizes only; write nothing.
    pub dry_run: bool,
    /// Watchdog deadline for the pipeline join.
    #[serde(with = "duration_secs")]
    pub join_timeout: Duration,
}

impl EncodeOptions {
    /// Defaults mirroring the CLI: 2-of-2, PNG, 2 MiB chunks, archives.
    #[must_use]
    pub fn new(input_dir: PathBuf, output_dirs: Vec<PathBuf>) -> Self {
        Self {
            input_dir,
            output_dirs,
            total: 2,
            required: 2,
            format: Format::Png,
            chunk_size: DEFAULT_CHUNK_SIZE,
            clear: false,
            archive: true,
            dry_run: false,
            join_timeout: default_join_timeout(),
        }
    }
}

/// One produced collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionOutput {
    /// The collection's label.
    pub label: String,
    /// Directory or archive it was written to.
    pub path: PathBuf,
}

/// Outcome of an encode run.
#[derive(Debug, Serialize)]
pub struct EncodeReport {
    /// Collections produced (or accounted, under dry run).
    pub collections: Vec<CollectionOutput>,
    /// Chunks emitted per collection.
    pub chunks: u64,
    /// Serialised (tar) input bytes.
    pub input_bytes: u64,
    /// Compressed bytes fed to the codec.
    pub stream_bytes: u64,
    /// Dry-run size accounting, when requested.
    pub sizes: Option<SizeReport>,
    /// PNG verification outcome, when applicable.
    pub png_verification: Option<VerifyReport>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

enum Destination {
    Files(HashMap<CollectionLabel, PathBuf>),
    Archives(HashMap<CollectionLabel, PathBuf>),
}

fn resolve_destinations(
    options: &EncodeOptions,
    labels: &[CollectionLabel],
) -> Result<(Vec<CollectionOutput>, Destination), EngineError> {
    if options.output_dirs.is_empty() {
        if options.dry_run {
            // Dry runs account sizes without destinations.
            let outputs = labels
                .iter()
                .map(|label| CollectionOutput {
                    label: label.to_string(),
                    path: PathBuf::new(),
                })
                .collect();
            return Ok((outputs, Destination::Files(HashMap::new())));
        }
        return Err(EngineError::OutputMismatch {
            reason: "at least one output directory is required".to_string(),
        });
    }

    let multi = options.output_dirs.len() > 1;
    if multi && options.output_dirs.len() != labels.len() {
        return Err(EngineError::OutputMismatch {
            reason: format!(
                "{} output directories for {} collections",
                options.output_dirs.len(),
                labels.len()
            ),
        });
    }

    let mut map = HashMap::with_capacity(labels.len());
    let mut outputs = Vec::with_capacity(labels.len());
    for (index, label) in labels.iter().enumerate() {
        let path = if options.archive {
            if multi {
                options.output_dirs[index].join(format!("{label}.tar"))
            } else {
                options.output_dirs[0].join(format!("{label}.tar"))
            }
        } else if multi {
            options.output_dirs[index].clone()
        } else {
            options.output_dirs[0].join(label.to_string())
        };
        outputs.push(CollectionOutput {
            label: label.to_string(),
            path: path.clone(),
        });
        map.insert(*label, path);
    }

    let destination = if options.archive {
        Destination::Archives(map)
    } else {
        Destination::Files(map)
    };
    Ok((outputs, destination))
}

/// Run the encode pipeline to completion.
///
/// # Errors
///
/// Surfaces codec, layout, and I/O failures;
/// [`EngineError::PipelineTimeout`] when the serialiser fails to quiesce.
pub fn encode(
    options: &EncodeOptions,
    rng: &dyn EntropySource,
) -> Result<EncodeReport, EngineError> {
    let start = Instant::now();
    tracing::info!(
        input = %options.input_dir.display(),
        total = options.total,
        required = options.required,
        format = options.format.tag(),
        dry_run = options.dry_run,
        "starting encode"
    );

    dir::validate_input_dir(&options.input_dir)?;
    let pad = PadEncoder::new(options.total, options.required).map_err(CodecError::from)?;
    let labels = pad.labels().to_vec();

    let (outputs, destination) = resolve_destinations(options, &labels)?;

    if !options.dry_run {
        match &destination {
            Destination::Files(map) => {
                for path in map.values() {
                    dir::prepare_output_dir(path, options.clear)?;
                }
            }
            Destination::Archives(map) => {
                for path in map.values() {
                    if let Some(parent) = path.parent() {
                        dir::prepare_output_dir(parent, options.clear)?;
                    }
                }
            }
        }
    }

    let registry = Arc::new(ArchiveRegistry::new());
    let mut size_sink = None;
    let mut sink: Box<dyn ChunkSink> = if options.dry_run {
        let sizing = SizeSink::new(options.format, options.archive);
        size_sink = Some(sizing.clone());
        Box::new(sizing)
    } else {
        match destination {
            Destination::Files(map) => Box::new(FileChunkSink::new(map, options.format)),
            Destination::Archives(map) => Box::new(ArchiveChunkSink::new(
                Arc::clone(&registry),
                map,
                options.format,
            )),
        }
    };

    // Serialiser task: pack the tree into the pipe.
    let (writer, reader) = pipe::pipe(DEFAULT_CAPACITY);
    let input_dir = options.input_dir.clone();
    let input_counter = Arc::new(AtomicU64::new(0));
    let thread_counter = Arc::clone(&input_counter);
    let (done_tx, done_rx) = mpsc::channel();
    let serializer = thread::spawn(move || {
        let mut counting = CountingWriter::new(writer, thread_counter);
        let result = serialize::pack_tree(&input_dir, &mut counting);
        match &result {
            Ok(_) => drop(counting),
            Err(e) => counting
                .into_inner()
                .close_with_error(format!("serialisation failed: {e}")),
        }
        let _ = done_tx.send(result);
    });

    // Codec task: read gzip(tar(dir)) and distribute chunks.
    let stream_counter = Arc::new(AtomicU64::new(0));
    let mut compressed = CountingReader::new(
        compress::compress_reader(reader),
        Arc::clone(&stream_counter),
    );
    let encoder = StreamEncoder::new(options.chunk_size, options.format.tag());
    let codec_result = encoder.encode(&pad, &mut compressed, rng, sink.as_mut());
    drop(compressed); // unblock the serialiser if the codec bailed early
    drop(sink);

    // Watchdog: never block on a wedged serialiser.
    let pack_result = match done_rx.recv_timeout(options.join_timeout) {
        Ok(result) => {
            let _ = serializer.join();
            result
        }
        Err(_) => {
            return Err(EngineError::PipelineTimeout {
                seconds: options.join_timeout.as_secs(),
            })
        }
    };

    let summary = match (codec_result, pack_result) {
        (Ok(summary), Ok(_)) => summary,
        (Err(codec), Err(pack)) => {
            // A pipe-level codec failure usually reflects the serialiser's
            // fault; report the root cause.
            if matches!(codec, CodecError::Io(_)) {
                return Err(pack.into());
            }
            return Err(codec.into());
        }
        (Err(codec), Ok(_)) => return Err(codec.into()),
        (Ok(_), Err(pack)) => return Err(pack.into()),
    };

    if !options.dry_run && options.archive {
        registry.finalize_all()?;
    }

    let png_verification = if !options.dry_run && options.format == Format::Png {
        let produced: Vec<Collection> = outputs
            .iter()
            .zip(labels.iter())
            .map(|(output, label)| Collection {
                label: *label,
                path: output.path.clone(),
                format: options.format,
            })
            .collect();
        Some(verify_png_outputs(&produced)?)
    } else {
        None
    };

    let sizes = size_sink.map(|sizing| {
        let collection_bytes = sizing.collection_totals();
        let total_collection_bytes = collection_bytes.iter().map(|(_, b)| *b).sum();
        SizeReport {
            input_bytes: input_counter.load(Ordering::Relaxed),
            compressed_bytes: stream_counter.load(Ordering::Relaxed),
            collection_bytes,
            total_collection_bytes,
        }
    });

    let report = EncodeReport {
        collections: outputs,
        chunks: summary.chunks,
        input_bytes: input_counter.load(Ordering::Relaxed),
        stream_bytes: stream_counter.load(Ordering::Relaxed),
        sizes,
        png_verification,
        elapsed_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    tracing::info!(
        chunks = report.chunks,
        input_bytes = report.input_bytes,
        elapsed_ms = report.elapsed_ms,
        "encode complete"
    );
    Ok(report)
}
