//! Reads and writes traces stored as whitespace-separated integers.
//!
//! All values of a trace file are concatenated in order, regardless of how they are split
//! into lines. Lines starting with `#` are skipped. If the number of samples per trace is
//! given, the values are split into consecutive channels of that length, for instance the
//! X and Y polarisations of an antenna.
use flt_common::Intensity;
use itertools::Itertools;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    num::ParseIntError,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum TraceFileError {
    #[error("Error opening trace file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Error reading trace source: {0}")]
    Read(#[from] io::Error),
    #[error("Invalid trace value '{value}' on line {line}: {source}")]
    Parse {
        line: usize,
        value: String,
        source: ParseIntError,
    },
    #[error("Trace source contains no samples")]
    Empty,
    #[error("Samples per trace must be positive")]
    ZeroSamplesPerTrace,
    #[error("Trace source of {total} samples is not a multiple of {samples_per_trace} samples per trace")]
    ChannelLength {
        total: usize,
        samples_per_trace: usize,
    },
}

/// Opens and reads a trace file, see [read_traces].
pub fn load_traces(
    path: &Path,
    samples_per_trace: Option<usize>,
) -> Result<Vec<Vec<Intensity>>, TraceFileError> {
    let file = File::open(path).map_err(|source| TraceFileError::Open {
        path: path.to_owned(),
        source,
    })?;
    read_traces(BufReader::new(file), samples_per_trace)
}

/// Reads the traces of a source.
/// # Parameters
/// - reader: the trace source.
/// - samples_per_trace: if given, the length of each channel, otherwise the whole source is one trace.
#[instrument(skip_all, level = "debug", err(level = "warn"))]
pub fn read_traces<R: BufRead>(
    reader: R,
    samples_per_trace: Option<usize>,
) -> Result<Vec<Vec<Intensity>>, TraceFileError> {
    let mut samples = Vec::<Intensity>::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let record = line.trim();
        if record.starts_with('#') {
            continue;
        }
        for value in record.split_whitespace() {
            samples.push(value.parse().map_err(|source| TraceFileError::Parse {
                line: index + 1,
                value: value.to_owned(),
                source,
            })?);
        }
    }
    if samples.is_empty() {
        return Err(TraceFileError::Empty);
    }

    let traces = match samples_per_trace {
        None => vec![samples],
        Some(0) => return Err(TraceFileError::ZeroSamplesPerTrace),
        Some(samples_per_trace) => {
            if samples.len() % samples_per_trace != 0 {
                return Err(TraceFileError::ChannelLength {
                    total: samples.len(),
                    samples_per_trace,
                });
            }
            samples
                .chunks_exact(samples_per_trace)
                .map(<[Intensity]>::to_vec)
                .collect()
        }
    };
    info!(
        "Loaded {} traces of {} samples",
        traces.len(),
        traces.first().map(Vec::len).unwrap_or_default()
    );
    Ok(traces)
}

/// Writes a trace in the format read by [read_traces].
/// # Parameters
/// - writer: the destination.
/// - trace: the samples to write.
/// - values_per_line: the number of samples on each line.
pub fn write_trace<W: Write>(
    writer: &mut W,
    trace: &[Intensity],
    values_per_line: usize,
) -> io::Result<()> {
    for line in trace.chunks(values_per_line.max(1)) {
        let line = line.iter().join(" ");
        writeln!(writer, "{line}")?;
    }
    Ok(())
}
