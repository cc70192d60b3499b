//! Report sinks
//!
//! Experiment progress lines go to the tracing subscriber, a file, memory
//! (for tests) or nowhere.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::DataError;
use crate::ports::ReportSink;

/// Emits each line as an `info!` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&mut self, line: &str) -> Result<(), DataError> {
        info!(target: "abf::report", "{}", line);
        Ok(())
    }
}

/// Buffered writer to a file, one line per report
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl ReportSink for FileSink {
    fn report(&mut self, line: &str) -> Result<(), DataError> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DataError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl ReportSink for MemorySink {
    fn report(&mut self, line: &str) -> Result<(), DataError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn report(&mut self, _line: &str) -> Result<(), DataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.report("first").unwrap();
        sink.report("second").unwrap();
        sink.flush().unwrap();

        assert_eq!(sink.lines(), &["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_file_sink_writes_lines() {
        let path = std::env::temp_dir().join(format!("abf-sink-{}.txt", std::process::id()));
        {
            let mut sink = FileSink::create(&path).unwrap();
            sink.report("Iteration 0. FP=1").unwrap();
            sink.report("Iteration 1. FP=2").unwrap();
            sink.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(contents, "Iteration 0. FP=1\nIteration 1. FP=2\n");
    }

    #[test]
    fn test_null_and_tracing_sinks_accept_lines() {
        assert!(NullSink.report("ignored").is_ok());
        assert!(TracingSink.report("logged").is_ok());
    }
}
