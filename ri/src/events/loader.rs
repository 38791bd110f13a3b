//! Event Loader - reads event logs in either framing
//!
//! A log is either a single JSON array of records or one record per line
//! (NDJSON). The framing is detected from the first non-whitespace character.
//! Records that fail to parse are skipped and counted, never fatal.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::types::EventLogEntry;
use crate::error::LoadError;

/// How a log document is framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document holding an array of records
    Array,
    /// One record per line, blank lines ignored
    Lines,
}

impl Framing {
    /// Detect framing from the first non-whitespace character
    pub fn detect(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('[') => Framing::Array,
            _ => Framing::Lines,
        }
    }
}

/// Result of loading a log: the parsed entries plus how many records were dropped
#[derive(Debug, Clone, Default)]
pub struct LoadedEvents {
    /// Successfully parsed entries, in file order
    pub entries: Vec<EventLogEntry>,
    /// Number of records that were not valid events
    pub skipped: usize,
}

impl LoadedEvents {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Parse log text in whichever framing it uses
///
/// Never fails: anything that is not a valid record is skipped and counted.
pub fn parse_events(text: &str) -> LoadedEvents {
    let framing = Framing::detect(text);
    debug!(?framing, bytes = text.len(), "parse_events: called");

    let mut loaded = LoadedEvents::default();
    match framing {
        Framing::Array => parse_array(text, &mut loaded),
        Framing::Lines => {
            for (line_no, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<EventLogEntry>(line) {
                    Ok(entry) => loaded.entries.push(entry),
                    Err(e) => {
                        warn!(line = line_no + 1, error = %e, "parse_events: skipping malformed line");
                        loaded.skipped += 1;
                    }
                }
            }
        }
    }

    debug!(count = loaded.entries.len(), skipped = loaded.skipped, "parse_events: loaded entries");
    loaded
}

/// Walk the elements of an array document one at a time
///
/// Elements that are valid JSON but not events are skipped individually. A
/// syntax error cannot be resynchronized, so the broken element and whatever
/// follows it count as one skipped record.
fn parse_array(text: &str, loaded: &mut LoadedEvents) {
    let mut rest = text.trim_start().strip_prefix('[').unwrap_or_default();
    let mut index = 0usize;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with(']') {
            break;
        }

        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let record = match stream.next() {
            Some(Ok(record)) => record,
            Some(Err(e)) => {
                warn!(index, error = %e, "parse_events: array breaks off, skipping the remainder");
                loaded.skipped += 1;
                break;
            }
            None => break,
        };
        let consumed = stream.byte_offset();

        match serde_json::from_value::<EventLogEntry>(record) {
            Ok(entry) => loaded.entries.push(entry),
            Err(e) => {
                warn!(index, error = %e, "parse_events: skipping malformed record");
                loaded.skipped += 1;
            }
        }
        index += 1;

        rest = rest[consumed..].trim_start();
        match rest.strip_prefix(',') {
            Some(tail) => rest = tail,
            None => {
                if !rest.is_empty() && !rest.starts_with(']') {
                    warn!(index, "parse_events: missing separator, skipping the remainder");
                    loaded.skipped += 1;
                }
                break;
            }
        }
    }
}

/// Read and parse an event log file
pub fn load_events(path: impl AsRef<Path>) -> Result<LoadedEvents, LoadError> {
    let path = path.as_ref();
    debug!(?path, "load_events: reading log file");

    let text = fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_events(&text))
}
