//! Plain-text dataset format (§6): first line `n m`, then `n` rows of `m`
//! features optionally followed by an integer label.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use ndarray::Array2;

use crate::data::Dataset;
use crate::error::{GenSvmError, Result};

const MAX_LINE_BYTES: usize = 1024;

fn checked_line(line: std::io::Result<String>, lineno: usize) -> Result<String> {
    let line = line?;
    if line.len() > MAX_LINE_BYTES {
        return Err(GenSvmError::InputFormat {
            location: format!("line {}", lineno),
            message: format!("line exceeds {} bytes", MAX_LINE_BYTES),
        });
    }
    Ok(line)
}

/// Read a dataset file: `n m` on the first line, then `n` rows of `m`
/// whitespace-separated features, optionally followed by an integer label.
/// If the first data row carries a label every row must; otherwise the
/// file is treated as unlabeled.
pub fn read_dataset(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader.read_line(&mut header)?;
    let mut header_fields = header.split_whitespace();
    let n: usize = header_fields
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GenSvmError::InputFormat {
            location: format!("{}:1", path.display()),
            message: "missing instance count".into(),
        })?;
    let m: usize = header_fields
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| GenSvmError::InputFormat {
            location: format!("{}:1", path.display()),
            message: "missing feature count".into(),
        })?;

    let mut x = Array2::zeros((n, m));
    let mut labels: Option<Vec<i64>> = None;

    for row in 0..n {
        let lineno = row + 2;
        let mut raw_line = String::new();
        let bytes_read = reader.read_line(&mut raw_line)?;
        if bytes_read == 0 {
            return Err(GenSvmError::InputFormat {
                location: format!("{}:{}", path.display(), lineno),
                message: "expected a data row, found end of file".into(),
            });
        }
        let line = checked_line(Ok(raw_line), lineno)?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != m && tokens.len() != m + 1 {
            return Err(GenSvmError::InputFormat {
                location: format!("{}:{}", path.display(), lineno),
                message: format!("expected {} or {} fields, found {}", m, m + 1, tokens.len()),
            });
        }
        let has_label = tokens.len() == m + 1;
        if row == 0 {
            if has_label {
                labels = Some(Vec::with_capacity(n));
            }
        } else if has_label != labels.is_some() {
            return Err(GenSvmError::InputFormat {
                location: format!("{}:{}", path.display(), lineno),
                message: "label presence must be consistent across all rows".into(),
            });
        }

        for (col, tok) in tokens[..m].iter().enumerate() {
            x[[row, col]] = tok.parse().map_err(|_| GenSvmError::InputFormat {
                location: format!("{}:{}", path.display(), lineno),
                message: format!("field {} is not a valid number: {}", col, tok),
            })?;
        }
        if has_label {
            let label: i64 = tokens[m].parse().map_err(|_| GenSvmError::InputFormat {
                location: format!("{}:{}", path.display(), lineno),
                message: format!("label is not a valid integer: {}", tokens[m]),
            })?;
            labels.as_mut().unwrap().push(label);
        }
    }

    Dataset::from_raw(x, labels)
}

/// Write a dataset back to the plain-text format, round-tripping through
/// `read_dataset`.
pub fn write_dataset(path: impl AsRef<Path>, data: &Dataset) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{} {}", data.n, data.m)?;
    for i in 0..data.n {
        let row = data.raw.0.row(i);
        let features: Vec<String> = row.iter().skip(1).map(|v| format!("{}", v)).collect();
        match &data.y {
            Some(y) => writeln!(file, "{} {}", features.join(" "), y[i])?,
            None => writeln!(file, "{}", features.join(" "))?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn round_trips_a_labeled_dataset() {
        let x = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let data = Dataset::from_raw(x, Some(vec![1, 2, 1])).unwrap();

        let tmp = NamedTempFile::new().unwrap();
        write_dataset(tmp.path(), &data).unwrap();
        let loaded = read_dataset(tmp.path()).unwrap();

        assert_eq!(loaded.n, data.n);
        assert_eq!(loaded.m, data.m);
        assert_eq!(loaded.y, data.y);
        assert_eq!(loaded.raw.0, data.raw.0);
    }

    #[test]
    fn unlabeled_file_has_no_labels() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "2 2\n1.0 2.0\n3.0 4.0\n").unwrap();
        let loaded = read_dataset(tmp.path()).unwrap();
        assert!(loaded.y.is_none());
    }

    #[test]
    fn inconsistent_label_presence_is_rejected() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "2 2\n1.0 2.0 1\n3.0 4.0\n").unwrap();
        assert!(read_dataset(tmp.path()).is_err());
    }
}
