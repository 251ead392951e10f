//! Newline-delimited record files matched by a path pattern.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;

use tracing::{debug, info};

use strata_core::errors::TransportError;
use strata_core::traits::ITransport;

/// Bounded source scanning NDJSON files in lexicographic path order.
///
/// Safe to re-scan: redelivered (key, sequence) pairs are absorbed
/// downstream, so pointing a fresh run at the same pattern is a no-op.
/// Blank lines are skipped. End of the last file yields end-of-stream.
#[derive(Debug)]
pub struct NdjsonSource {
    files: VecDeque<PathBuf>,
    current: Option<Lines<BufReader<File>>>,
}

impl NdjsonSource {
    /// Collect the files matching `pattern`, sorted lexicographically.
    pub fn from_pattern(pattern: &str) -> Result<Self, TransportError> {
        let paths = glob::glob(pattern).map_err(|e| TransportError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| TransportError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        info!(pattern, files = files.len(), "ndjson source ready");
        Ok(Self {
            files: files.into(),
            current: None,
        })
    }

    /// Number of files left to scan, the one in progress excluded.
    pub fn remaining_files(&self) -> usize {
        self.files.len()
    }

    fn advance_file(&mut self) -> Result<bool, TransportError> {
        match self.files.pop_front() {
            Some(path) => {
                debug!(path = %path.display(), "scanning ndjson file");
                let file = File::open(&path)?;
                self.current = Some(BufReader::new(file).lines());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl ITransport for NdjsonSource {
    async fn next_record(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            if let Some(lines) = self.current.as_mut() {
                for line in lines.by_ref() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(line.into_bytes()));
                }
                self.current = None;
            }
            if !self.advance_file()? {
                return Ok(None);
            }
        }
    }
}
