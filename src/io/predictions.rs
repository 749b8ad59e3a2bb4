//! Predictions file format (§6): one line per instance, `x1 x2 ... xm yhat`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data::Dataset;
use crate::error::Result;

/// Write `data`'s raw features (bias column dropped) alongside the
/// predicted labels, one row per instance.
pub fn write_predictions(path: impl AsRef<Path>, data: &Dataset, predicted: &[usize]) -> Result<()> {
    let mut file = File::create(path)?;
    for i in 0..data.n {
        let row = data.raw.0.row(i);
        let features: Vec<String> = row.iter().skip(1).map(|v| format!("{}", v)).collect();
        writeln!(file, "{} {}", features.join(" "), predicted[i])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_one_line_per_instance() {
        let x = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let data = Dataset::from_raw(x, None).unwrap();
        let tmp = NamedTempFile::new().unwrap();
        write_predictions(tmp.path(), &data, &[1, 2]).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.lines().next().unwrap().ends_with(" 1"));
    }
}
