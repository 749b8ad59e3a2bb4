//! Fixed-header model file format (§6): a human-readable text dump of a
//! fitted model's hyperparameters, provenance, and weight matrix `V`.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::Local;
use ndarray::Array2;

use crate::error::{GenSvmError, Result};
use crate::kernel::KernelKind;
use crate::model::{Hyperparams, WeightScheme};

/// Everything the model file format needs beyond the raw `V` matrix:
/// hyperparameters, the dataset's shape, and where it came from.
pub struct ModelFile {
    pub params: Hyperparams,
    pub kernel: KernelKind,
    pub filename: String,
    pub n: usize,
    pub m: usize,
    pub k: usize,
    pub v: Array2<f64>,
}

/// Render `value` the way C's `%g` would: fixed notation while the
/// decimal exponent is in `[-4, 6)`, exponential notation (two-digit,
/// signed exponent) otherwise, with trailing zeros stripped either way.
fn format_g(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    const PRECISION: i32 = 6;
    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let exponent = abs.log10().floor() as i32;

    let mut rendered = if exponent < -4 || exponent >= PRECISION {
        let mantissa = abs / 10f64.powi(exponent);
        let mut mantissa_str = format!("{:.*}", (PRECISION - 1) as usize, mantissa);
        trim_trailing_zeros(&mut mantissa_str);
        let exp_sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa_str, exp_sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        let mut fixed = format!("{:.*}", decimals, abs);
        trim_trailing_zeros(&mut fixed);
        fixed
    };
    rendered.insert_str(0, sign);
    rendered
}

fn trim_trailing_zeros(s: &mut String) {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
}

fn weight_idx(scheme: WeightScheme) -> i32 {
    match scheme {
        WeightScheme::Unit => 1,
        WeightScheme::GroupRebalanced => 2,
    }
}

fn weight_scheme(idx: i32) -> Result<WeightScheme> {
    match idx {
        1 => Ok(WeightScheme::Unit),
        2 => Ok(WeightScheme::GroupRebalanced),
        other => Err(GenSvmError::InvalidHyperparameter {
            name: "weight_idx".into(),
            message: format!("expected 1 or 2, found {}", other),
        }),
    }
}

/// Write the fixed-header model file exactly as specified: a `Model:`
/// section with hyperparameters, a `Data:` section with provenance, and
/// an `Output:` section holding `V` as `(m+1)` rows of `(K-1)`
/// `%+.16f`-formatted doubles.
pub fn write_model_file(path: impl AsRef<Path>, mf: &ModelFile) -> Result<()> {
    let mut file = File::create(path)?;
    let now = Local::now();

    writeln!(file, "Output file for GenSVM (version 0.1)")?;
    writeln!(
        file,
        "Generated on: {} (UTC {})",
        now.format("%a %b %e %T %Y"),
        now.format("%:z")
    )?;
    writeln!(file)?;
    writeln!(file, "Model:")?;
    writeln!(file, "p = {}", mf.params.p)?;
    writeln!(file, "lambda = {}", mf.params.lambda)?;
    writeln!(file, "kappa = {}", mf.params.kappa)?;
    writeln!(file, "epsilon = {}", format_g(mf.params.epsilon))?;
    writeln!(file, "weight_idx = {}", weight_idx(mf.params.weights))?;
    writeln!(file)?;
    writeln!(file, "Data:")?;
    writeln!(file, "filename = {}", mf.filename)?;
    writeln!(file, "n = {}", mf.n)?;
    writeln!(file, "m = {}", mf.m)?;
    writeln!(file, "K = {}", mf.k)?;
    writeln!(file)?;
    writeln!(file, "Output:")?;
    for i in 0..mf.v.nrows() {
        let row = mf.v.row(i);
        let formatted: Vec<String> = row.iter().map(|x| format!("{:+.16}", x)).collect();
        writeln!(file, "{}", formatted.join(" "))?;
    }

    let _ = mf.kernel; // kerneltype is reconstructed by the caller from the grid spec, not persisted here
    Ok(())
}

/// Parse a model file back into its hyperparameters, dataset shape, and
/// `V` matrix. Callers must supply the kernel separately (the file format
/// does not persist kerneltype/kernelparam).
pub fn read_model_file(path: impl AsRef<Path>) -> Result<ModelFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;

    let mut p = None;
    let mut lambda = None;
    let mut kappa = None;
    let mut epsilon = None;
    let mut weight_idx_value = None;
    let mut filename = None;
    let mut n = None;
    let mut m = None;
    let mut k = None;
    let mut output_start = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix("p = ") {
            p = rest.trim().parse::<f64>().ok();
        } else if let Some(rest) = line.strip_prefix("lambda = ") {
            lambda = rest.trim().parse::<f64>().ok();
        } else if let Some(rest) = line.strip_prefix("kappa = ") {
            kappa = rest.trim().parse::<f64>().ok();
        } else if let Some(rest) = line.strip_prefix("epsilon = ") {
            epsilon = rest.trim().parse::<f64>().ok();
        } else if let Some(rest) = line.strip_prefix("weight_idx = ") {
            weight_idx_value = rest.trim().parse::<i32>().ok();
        } else if let Some(rest) = line.strip_prefix("filename = ") {
            filename = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("n = ") {
            n = rest.trim().parse::<usize>().ok();
        } else if let Some(rest) = line.strip_prefix("m = ") {
            m = rest.trim().parse::<usize>().ok();
        } else if let Some(rest) = line.strip_prefix("K = ") {
            k = rest.trim().parse::<usize>().ok();
        } else if line.trim() == "Output:" {
            output_start = Some(i + 1);
        }
    }

    let missing = |field: &str| GenSvmError::InputFormat {
        location: path.display().to_string(),
        message: format!("missing field `{}`", field),
    };
    let m = m.ok_or_else(|| missing("m"))?;
    let k = k.ok_or_else(|| missing("K"))?;
    let n = n.ok_or_else(|| missing("n"))?;
    let output_start = output_start.ok_or_else(|| missing("Output:"))?;

    let mut v = Array2::zeros((m + 1, k - 1));
    for row in 0..(m + 1) {
        let line = lines.get(output_start + row).ok_or_else(|| GenSvmError::InputFormat {
            location: path.display().to_string(),
            message: format!("Output section is missing row {}", row),
        })?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != k - 1 {
            return Err(GenSvmError::InputFormat {
                location: path.display().to_string(),
                message: format!("Output row {} has {} fields, expected {}", row, tokens.len(), k - 1),
            });
        }
        for (col, tok) in tokens.iter().enumerate() {
            v[[row, col]] = tok.parse().map_err(|_| GenSvmError::InputFormat {
                location: path.display().to_string(),
                message: format!("Output row {} field {} is not a valid double", row, col),
            })?;
        }
    }

    Ok(ModelFile {
        params: Hyperparams {
            p: p.ok_or_else(|| missing("p"))?,
            lambda: lambda.ok_or_else(|| missing("lambda"))?,
            kappa: kappa.ok_or_else(|| missing("kappa"))?,
            epsilon: epsilon.ok_or_else(|| missing("epsilon"))?,
            weights: weight_scheme(weight_idx_value.ok_or_else(|| missing("weight_idx"))?)?,
        },
        kernel: KernelKind::Linear,
        filename: filename.unwrap_or_default(),
        n,
        m,
        k,
        v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use tempfile::NamedTempFile;

    #[test]
    fn format_g_matches_c_style_rendering() {
        assert_eq!(format_g(1e-6), "1e-06");
        assert_eq!(format_g(1e-8), "1e-08");
        assert_eq!(format_g(1e-4), "0.0001");
        assert_eq!(format_g(0.0), "0");
    }

    #[test]
    fn round_trips_hyperparameters_and_v() {
        let mf = ModelFile {
            params: Hyperparams {
                p: 1.5,
                lambda: 1e-6,
                kappa: 0.1,
                epsilon: 1e-8,
                weights: WeightScheme::GroupRebalanced,
            },
            kernel: KernelKind::Linear,
            filename: "train.txt".into(),
            n: 10,
            m: 2,
            k: 3,
            v: arr2(&[[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]),
        };

        let tmp = NamedTempFile::new().unwrap();
        write_model_file(tmp.path(), &mf).unwrap();
        let loaded = read_model_file(tmp.path()).unwrap();

        assert_eq!(loaded.params.p, mf.params.p);
        assert_eq!(loaded.params.lambda, mf.params.lambda);
        assert_eq!(loaded.params.weights, mf.params.weights);
        assert_eq!(loaded.n, mf.n);
        assert_eq!(loaded.m, mf.m);
        assert_eq!(loaded.k, mf.k);
        for i in 0..mf.v.nrows() {
            for j in 0..mf.v.ncols() {
                assert!((loaded.v[[i, j]] - mf.v[[i, j]]).abs() < 1e-12);
            }
        }
    }
}
