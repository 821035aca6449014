//! Recorded detector/tracker output, one frame per JSON line.
//!
//! ```text
//! {"frame": 0, "ts": 0.0, "detections": [{"bbox": [10, 20, 110, 140], "confidence": 0.91, "label": "dog", "track_id": 1}]}
//! {"detections": [{"bbox": [12, 20, 112, 140], "confidence": 0.88, "class_id": 16, "track_id": 1}]}
//! ```
//!
//! `frame` and `ts` are optional. Without `frame` the next sequential index
//! is used. Blank lines and lines starting with `#` are ignored.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use serde::Deserialize;

use crate::detection::{Detection, RawDetection};
use crate::error::{PetwatchError, Result};

#[derive(Debug, Deserialize)]
struct FrameRecord {
    #[serde(default)]
    frame: Option<u64>,
    #[serde(default)]
    ts: Option<f64>,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

/// One frame's worth of detections.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: u64,
    /// Seconds since the start of the stream, if recorded.
    pub ts: Option<f64>,
    pub detections: Vec<Detection>,
}

/// Open `path` for reading; `-` is stdin.
pub fn open(path: &str) -> Result<Box<dyn BufRead + Send>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)?;
    Ok(Box::new(BufReader::new(file)))
}

/// Iterates frames from a JSON-lines reader.
///
/// A malformed line yields `Err(PetwatchError::Source)` and iteration goes
/// on with the next line. An I/O error is yielded once and ends iteration.
pub struct FrameReader<R> {
    reader: R,
    line_no: usize,
    next_index: u64,
    pet_confidence: f32,
    done: bool,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R, pet_confidence: f32) -> Self {
        Self { reader, line_no: 0, next_index: 0, pet_confidence, done: false }
    }

    fn parse(&mut self, line: &str) -> Result<Frame> {
        let record: FrameRecord = serde_json::from_str(line)
            .map_err(|source| PetwatchError::Source { line: self.line_no, source })?;

        let index = record.frame.unwrap_or(self.next_index);
        self.next_index = index.saturating_add(1);

        let pet_confidence = self.pet_confidence;
        Ok(Frame {
            index,
            ts: record.ts,
            detections: record
                .detections
                .into_iter()
                .map(|raw| raw.into_detection(pet_confidence))
                .collect(),
        })
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    self.line_no += 1;
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    return Some(self.parse(trimmed));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BBox, NOT_PET_LABEL};
    use std::io::Cursor;

    #[test]
    fn test_reads_frames_and_sequential_indices() {
        let input = r#"
# recorded on cam0
{"frame": 5, "ts": 0.5, "detections": [{"bbox": [0, 0, 10, 10], "confidence": 0.9, "label": "dog", "track_id": 1}]}
{"detections": []}

{"detections": [{"bbox": [1, 1, 5, 5], "confidence": 0.3, "class_id": 15}]}
"#;
        let frames: Vec<_> = FrameReader::new(Cursor::new(input), 0.5)
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].index, 5);
        assert_eq!(frames[0].ts, Some(0.5));
        assert_eq!(
            frames[0].detections,
            vec![Detection::new(BBox::new(0, 0, 10, 10), 0.9, "dog", Some(1))]
        );
        assert_eq!(frames[1].index, 6);
        assert!(frames[1].detections.is_empty());
        assert_eq!(frames[2].index, 7);
        assert_eq!(frames[2].detections[0].label, NOT_PET_LABEL);
        assert_eq!(frames[2].detections[0].track_id, None);
    }

    #[test]
    fn test_malformed_line_is_reported_and_skipped() {
        let input = "{\"detections\": []}\nnot json\n{\"detections\": [{\"bbox\": [1, 2]}]}\n{\"detections\": []}\n";
        let items: Vec<_> = FrameReader::new(Cursor::new(input), 0.5).collect();

        assert_eq!(items.len(), 4);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(PetwatchError::Source { line: 2, .. })));
        assert!(matches!(items[2], Err(PetwatchError::Source { line: 3, .. })));
        assert_eq!(items[3].as_ref().unwrap().index, 1);
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(matches!(open("/nonexistent/petwatch/frames.jsonl"), Err(PetwatchError::Io(_))));
    }
}
