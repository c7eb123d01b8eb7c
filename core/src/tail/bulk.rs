//! Bulk ingest of an existing log file.
//!
//! Backfill path: memory-map the whole file, find line boundaries with a
//! byte scan, split lines in parallel. Order is preserved by the indexed
//! collect, so the serialized feed into the tracker sees lines in file
//! order.

use std::fs::File;
use std::path::Path;

use memchr::memchr_iter;
use memmap2::Mmap;
use rayon::prelude::*;

use crate::client_log::{RawLine, split_line};

/// Split a whole log file into well-formed raw lines, in file order.
/// Malformed lines drop silently, as they do on the live tail path.
pub fn parse_log_file<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<RawLine>> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let bytes = mmap.as_ref();

    // Find all line boundaries
    let mut line_ranges: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for end in memchr_iter(b'\n', bytes) {
        if end > start {
            line_ranges.push((start, end));
        }
        start = end + 1;
    }
    if start < bytes.len() {
        line_ranges.push((start, bytes.len()));
    }

    let lines: Vec<RawLine> = line_ranges
        .par_iter()
        .filter_map(|&(start, end)| {
            let (text, _) = encoding_rs::UTF_8.decode_without_bom_handling(&bytes[start..end]);
            split_line(&text)
        })
        .collect();

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_file_preserves_order_and_drops_junk() {
        let dir = std::env::temp_dir().join("kirac-bulk-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Client.txt");
        std::fs::write(
            &path,
            concat!(
                "2026/08/03 21:00:00 1 a [INFO Client 1] : You have entered Lioneye's Watch.\n",
                "garbage line without a timestamp\n",
                "2026/08/03 21:00:10 2 b [INFO Client 1] Generating level 83 area \"MapWorldsGlacier\" with seed 1\n",
                "2026/08/03 21:00:11 3 c [INFO Client 1] : You have entered Glacier.\r\n",
            ),
        )
        .unwrap();

        let lines = parse_log_file(&path).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].content, ": You have entered Lioneye's Watch.");
        assert!(lines[1].content.starts_with("Generating level 83"));
        assert_eq!(lines[2].content, ": You have entered Glacier.");

        std::fs::remove_file(&path).ok();
    }
}
