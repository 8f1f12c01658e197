//! CIFAR-10 binary record reader
//!
//! The input is a headerless concatenation of fixed-size records:
//!
//! ```text
//! [label: u8][pixels: width * height * depth bytes]  repeated N times
//! ```
//!
//! Labels are carried as a sparse encoding with one class index per example:
//! example `i` owns `index[start[i]..end[i]]`, which is always the single slot `i`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Image geometry and class count of a record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLayout {
    /// Pixels per row
    pub width: u32,
    /// Rows per image
    pub height: u32,
    /// Channels per pixel
    pub depth: u32,
    /// Number of label classes
    pub classes: u32,
}

/// Layout of the CIFAR-10 binary distribution
pub const CIFAR10: ImageLayout = ImageLayout {
    width: 32,
    height: 32,
    depth: 3,
    classes: 10,
};

impl Default for ImageLayout {
    fn default() -> Self {
        CIFAR10
    }
}

impl ImageLayout {
    /// Bytes in one pixel block
    #[must_use]
    pub const fn image_size(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }

    /// Bytes in one record (label byte + pixel block)
    #[must_use]
    pub const fn record_size(&self) -> usize {
        1 + self.image_size()
    }
}

/// Sparse one-hot label arrays for a split
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SparseLabels {
    /// First slot in `index` owned by each example
    pub start: Vec<u32>,
    /// One past the last slot owned by each example
    pub end: Vec<u32>,
    /// Class indices
    pub index: Vec<u32>,
}

/// One decoded split (training or test) held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    layout: ImageLayout,
    pixels: Vec<u8>,
    labels: Vec<u32>,
}

impl DatasetSplit {
    /// Build a split from already decoded parts.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if `pixels` is not `labels.len()` images long,
    /// or a label is outside `0..layout.classes`.
    pub fn new(layout: ImageLayout, pixels: Vec<u8>, labels: Vec<u32>) -> Result<Self> {
        let expected = labels.len() * layout.image_size();
        if pixels.len() != expected {
            return Err(Error::Format(format!(
                "pixel buffer holds {} bytes, expected {} ({} examples x {} bytes)",
                pixels.len(),
                expected,
                labels.len(),
                layout.image_size()
            )));
        }
        if let Some((example, label)) = labels
            .iter()
            .enumerate()
            .find(|(_, &label)| label >= layout.classes)
        {
            return Err(Error::Format(format!(
                "example {example} has label {label}, but only {} classes are defined",
                layout.classes
            )));
        }
        Ok(Self {
            layout,
            pixels,
            labels,
        })
    }

    /// Geometry of every example
    #[must_use]
    pub const fn layout(&self) -> ImageLayout {
        self.layout
    }

    /// Number of examples
    #[must_use]
    pub fn examples(&self) -> usize {
        self.labels.len()
    }

    /// All pixel blocks, concatenated
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Class index of every example
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// Pixel block of one example
    #[must_use]
    pub fn image(&self, example: usize) -> Option<&[u8]> {
        let size = self.layout.image_size();
        let start = example.checked_mul(size)?;
        self.pixels.get(start..start + size)
    }

    /// Sparse label encoding: example `i` owns slot `i` of `index`.
    ///
    /// # Errors
    /// Returns [`Error::Format`] if the example count does not fit the `u32`
    /// offsets of the container format.
    pub fn sparse_labels(&self) -> Result<SparseLabels> {
        let count = u32::try_from(self.examples()).map_err(|_| {
            Error::Format(format!(
                "{} examples exceed the u32 range of sparse offsets",
                self.examples()
            ))
        })?;
        Ok(SparseLabels {
            start: (0..count).collect(),
            end: (1..=count).collect(),
            index: self.labels.clone(),
        })
    }
}

/// Decode records from `reader`.
///
/// With `count = Some(n)` exactly `n` records are read and anything after them is
/// ignored. With `None` the whole stream is consumed and must hold a whole number
/// of records.
///
/// # Errors
/// - [`Error::Format`] if the stream ends inside the requested records, a partial
///   trailing record is found, or a label is out of range
/// - [`Error::Io`] for any other read failure
pub fn read_split<R: Read>(
    mut reader: R,
    layout: ImageLayout,
    count: Option<usize>,
) -> Result<DatasetSplit> {
    if layout.image_size() == 0 {
        return Err(Error::Format(format!("empty image layout: {layout:?}")));
    }
    let record_size = layout.record_size();

    let split = match count {
        Some(count) => {
            // Buffers grow with the data actually read, never from `count` alone
            let mut pixels = Vec::new();
            let mut labels = Vec::new();
            let mut record = vec![0u8; record_size];
            for example in 0..count {
                reader.read_exact(&mut record).map_err(|e| match e.kind() {
                    ErrorKind::UnexpectedEof => Error::Format(format!(
                        "input ends inside record {example}, expected {count} records of {record_size} bytes"
                    )),
                    _ => Error::Io(e),
                })?;
                labels.push(u32::from(record[0]));
                pixels.extend_from_slice(&record[1..]);
            }
            DatasetSplit::new(layout, pixels, labels)?
        }
        None => {
            let mut raw = Vec::new();
            reader.read_to_end(&mut raw)?;
            if raw.len() % record_size != 0 {
                return Err(Error::Format(format!(
                    "input length {} is not a multiple of the {record_size}-byte record size",
                    raw.len()
                )));
            }
            let count = raw.len() / record_size;
            let mut pixels = Vec::with_capacity(count * layout.image_size());
            let mut labels = Vec::with_capacity(count);
            for record in raw.chunks_exact(record_size) {
                labels.push(u32::from(record[0]));
                pixels.extend_from_slice(&record[1..]);
            }
            DatasetSplit::new(layout, pixels, labels)?
        }
    };

    debug!(examples = split.examples(), record_size, "decoded record stream");
    Ok(split)
}

/// Decode a record file from disk.
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be opened, plus every error of [`read_split`].
pub fn read_split_file<P: AsRef<Path>>(
    path: P,
    layout: ImageLayout,
    count: Option<usize>,
) -> Result<DatasetSplit> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open input file {}: {e}", path.display()),
        ))
    })?;
    if let Some(count) = count {
        let available = file.metadata()?.len();
        let needed = u64::try_from(count)
            .ok()
            .zip(u64::try_from(layout.record_size()).ok())
            .and_then(|(count, record_size)| count.checked_mul(record_size));
        if needed.map_or(true, |needed| needed > available) {
            return Err(Error::Format(format!(
                "{} holds {available} bytes, too short for {count} records of {} bytes",
                path.display(),
                layout.record_size()
            )));
        }
    }
    let split = read_split(BufReader::new(file), layout, count)?;
    info!(path = %path.display(), examples = split.examples(), "read record file");
    Ok(split)
}

/// Encode `split` back into the binary record layout.
///
/// # Errors
/// Returns [`Error::Format`] if a label does not fit the one-byte label field, or
/// [`Error::Io`] on write failure.
pub fn write_split<W: Write>(mut writer: W, split: &DatasetSplit) -> Result<()> {
    let size = split.layout.image_size();
    for (label, image) in split.labels.iter().zip(split.pixels.chunks_exact(size)) {
        let label = u8::try_from(*label)
            .map_err(|_| Error::Format(format!("label {label} does not fit in one byte")))?;
        writer.write_all(&[label])?;
        writer.write_all(image)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY: ImageLayout = ImageLayout {
        width: 2,
        height: 2,
        depth: 1,
        classes: 10,
    };

    fn records(labels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, &label) in labels.iter().enumerate() {
            out.push(label);
            let base = u8::try_from(i * 4).unwrap();
            out.extend_from_slice(&[base, base + 1, base + 2, base + 3]);
        }
        out
    }

    #[test]
    fn test_cifar10_sizes() {
        assert_eq!(CIFAR10.image_size(), 3072);
        assert_eq!(CIFAR10.record_size(), 3073);
        assert_eq!(ImageLayout::default(), CIFAR10);
    }

    #[test]
    fn test_read_split_with_count() {
        let data = records(&[3, 7, 0]);
        let split = read_split(data.as_slice(), TINY, Some(3)).unwrap();

        assert_eq!(split.examples(), 3);
        assert_eq!(split.labels(), &[3, 7, 0]);
        assert_eq!(split.image(1), Some(&[4u8, 5, 6, 7][..]));
        assert_eq!(split.image(3), None);
    }

    #[test]
    fn test_read_split_ignores_records_after_count() {
        let data = records(&[1, 2, 3, 4]);
        let split = read_split(data.as_slice(), TINY, Some(2)).unwrap();
        assert_eq!(split.labels(), &[1, 2]);
        assert_eq!(split.pixels().len(), 8);
    }

    #[test]
    fn test_read_split_inferred_count() {
        let data = records(&[9, 8, 7, 6, 5]);
        let split = read_split(data.as_slice(), TINY, None).unwrap();
        assert_eq!(split.examples(), 5);
        assert_eq!(split.labels(), &[9, 8, 7, 6, 5]);
    }

    #[test]
    fn test_read_split_truncated_input_fails() {
        let mut data = records(&[1, 2]);
        data.truncate(7);

        let err = read_split(data.as_slice(), TINY, Some(2)).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_read_split_partial_trailing_record_fails() {
        let mut data = records(&[1, 2]);
        data.push(4);

        let err = read_split(data.as_slice(), TINY, None).unwrap_err();
        assert!(err.to_string().contains("not a multiple"));
    }

    #[test]
    fn test_label_out_of_range_fails() {
        let data = records(&[1, 10]);
        let err = read_split(data.as_slice(), TINY, Some(2)).unwrap_err();
        assert!(err.to_string().contains("example 1 has label 10"));
    }

    #[test]
    fn test_empty_input() {
        let split = read_split(&[][..], TINY, None).unwrap();
        assert_eq!(split.examples(), 0);
        let split = read_split(&[][..], TINY, Some(0)).unwrap();
        assert_eq!(split.examples(), 0);
    }

    #[test]
    fn test_sparse_labels() {
        let split = read_split(records(&[4, 0, 9]).as_slice(), TINY, None).unwrap();
        let sparse = split.sparse_labels().unwrap();

        assert_eq!(sparse.start, vec![0, 1, 2]);
        assert_eq!(sparse.end, vec![1, 2, 3]);
        assert_eq!(sparse.index, vec![4, 0, 9]);
    }

    #[test]
    fn test_new_rejects_short_pixel_buffer() {
        let err = DatasetSplit::new(TINY, vec![0; 7], vec![1, 2]).unwrap_err();
        assert!(err.to_string().contains("expected 8"));
    }

    #[test]
    fn test_write_split_reproduces_input() {
        let data = records(&[5, 6, 2]);
        let split = read_split(data.as_slice(), TINY, None).unwrap();

        let mut encoded = Vec::new();
        write_split(&mut encoded, &split).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn test_huge_count_on_short_input_fails_cleanly() {
        let data = records(&[1]);
        let err = read_split(data.as_slice(), TINY, Some(usize::MAX / 4)).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_read_split_file_rejects_count_beyond_file_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, records(&[1, 2])).unwrap();

        let err = read_split_file(&path, TINY, Some(usize::MAX / 4)).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("too short"));

        let err = read_split_file(&path, TINY, Some(3)).unwrap_err();
        assert!(err.to_string().contains("holds 10 bytes"));
        assert_eq!(read_split_file(&path, TINY, Some(2)).unwrap().examples(), 2);
    }

    #[test]
    fn test_read_split_file_missing() {
        let err = read_split_file("/definitely/not/here.bin", TINY, None).unwrap_err();
        assert!(err.to_string().contains("Failed to open input file"));
    }
}
