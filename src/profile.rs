use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::loader::{DecodedImage, Decoder, LoadError};

struct Sample {
    path: PathBuf,
    thread: String,
    elapsed: Duration,
    ok: bool,
}

/// Wraps a decoder and records how long every decode took, for `--profile`.
pub struct TimedDecoder<D> {
    inner: D,
    samples: Mutex<Vec<Sample>>,
}

impl<D: Decoder> TimedDecoder<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Tab-separated report: one line per decode plus a total.
    pub fn write_report(&self, out: &mut impl Write) -> io::Result<()> {
        let samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "millis\tresult\tthread\tpath")?;
        let mut total = Duration::ZERO;
        for s in samples.iter() {
            total += s.elapsed;
            writeln!(
                out,
                "{:.3}\t{}\t{}\t{}",
                s.elapsed.as_secs_f64() * 1000.0,
                if s.ok { "ok" } else { "error" },
                s.thread,
                s.path.display()
            )?;
        }
        writeln!(
            out,
            "# {} decodes, {:.3} ms total",
            samples.len(),
            total.as_secs_f64() * 1000.0
        )
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write_report(&mut out)?;
        out.flush()
    }
}

impl<D: Decoder> Decoder for TimedDecoder<D> {
    fn decode(&self, path: &Path) -> Result<DecodedImage, LoadError> {
        let start = Instant::now();
        let result = self.inner.decode(path);
        let sample = Sample {
            path: path.to_path_buf(),
            thread: thread::current().name().unwrap_or("main").to_string(),
            elapsed: start.elapsed(),
            ok: result.is_ok(),
        };
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sample);
        result
    }
}
