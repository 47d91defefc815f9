//! Where finished records go.
//!
//! The engines hand every summary, reading and fall event to a `RecordSink`
//! and never look at it again. `JsonlSink` is the local store: one JSON
//! object per line, appended under an exclusive lock so a CLI run and a
//! background monitor can share the file.

use crate::{Record, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub trait RecordSink {
    fn append(&mut self, record: &Record) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &Record) -> Result<()> {
        // Encode first so a bad record never leaves a partial line behind
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let written = file.write_all(&line).and_then(|()| file.flush());
        file.unlock()?;
        written?;

        tracing::debug!("Stored {} record {}", kind_of(record), record.id());
        Ok(())
    }
}

fn kind_of(record: &Record) -> &'static str {
    match record {
        Record::ExerciseSummary(_) => "exercise",
        Record::HeartReading(_) => "heart",
        Record::StressReading(_) => "stress",
        Record::FallEvent(_) => "fall",
    }
}

/// Collects records instead of storing them
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Every record stored at `path`, in file order
///
/// A missing file is an empty history. Lines that do not decode (a torn
/// write, a record kind from a newer version) are dropped and counted.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    file.lock_shared()?;
    let parsed = decode_lines(BufReader::new(&file));
    file.unlock()?;
    let (records, dropped) = parsed?;

    if dropped > 0 {
        tracing::warn!("Dropped {} undecodable line(s) in {:?}", dropped, path);
    }
    Ok(records)
}

fn decode_lines(reader: impl BufRead) -> Result<(Vec<Record>, usize)> {
    let mut records = Vec::new();
    let mut dropped = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::debug!("Line {}: {}", index + 1, e);
                dropped += 1;
            }
        }
    }
    Ok((records, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FallEvent, FallSignal, HeartReading, Rhythm};
    use chrono::Utc;
    use uuid::Uuid;

    fn heart(bpm: u32) -> Record {
        Record::HeartReading(HeartReading {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            bpm,
            confidence: 75.0,
            rhythm: Rhythm::classify(bpm),
            duration_seconds: Some(5),
        })
    }

    #[test]
    fn test_append_and_read_single_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let record = heart(72);
        let id = record.id();

        let mut sink = JsonlSink::new(&path);
        sink.append(&record).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), id);
        match &records[0] {
            Record::HeartReading(r) => assert_eq!(r.rhythm, Rhythm::Normal),
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_records_are_tagged_by_kind() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/dir/records.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&heart(110)).unwrap();
        sink.append(&Record::FallEvent(FallEvent {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            magnitude: 31.2,
            signal: FallSignal::Impact,
        }))
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"kind\":\"heart_reading\""));
        assert!(lines[0].contains("\"rhythm\":\"tachycardia\""));
        assert!(lines[1].contains("\"kind\":\"fall_event\""));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&heart(64)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        sink.append(&heart(66)).unwrap();

        assert_eq!(read_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_read_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("nothing.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::default();
        sink.append(&heart(80)).unwrap();
        assert_eq!(sink.records.len(), 1);
    }

    #[test]
    fn test_unknown_kind_is_dropped() {
        let input = "{\"kind\":\"sleep_log\",\"id\":\"x\"}\n\n";
        let (records, dropped) = decode_lines(input.as_bytes()).unwrap();
        assert!(records.is_empty());
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_parallel_appends_keep_whole_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("records.jsonl");

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let mut sink = JsonlSink::new(&path);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        sink.append(&heart(60 + t * 25 + i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 100);
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 100);
    }
}
