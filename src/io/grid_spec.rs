//! Grid-specification file format (§6): one directive per line, in any
//! order, describing a training set, optional external test set, and the
//! hyperparameter/kernel-parameter arrays to sweep.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{GenSvmError, Result};
use crate::grid::{GridSpec, KernelGrid};
use crate::model::WeightScheme;

/// A fully parsed grid-specification file: the dataset paths plus the
/// numeric grid itself.
pub struct GridFile {
    pub train: String,
    pub test: Option<String>,
    pub spec: GridSpec,
}

fn parse_floats(rest: &str) -> Vec<f64> {
    rest.split_whitespace().filter_map(|t| t.parse::<f64>().ok()).collect()
}

fn parse_ints(rest: &str) -> Vec<i64> {
    rest.split_whitespace().filter_map(|t| t.parse::<i64>().ok()).collect()
}

/// Parse a grid specification file into a [`GridFile`]. Unknown directive
/// lines and config-conflicting parameters (e.g. `gamma:` under a `LINEAR`
/// kernel) are warned via `log::warn!` and ignored, per §7's
/// config-conflict policy.
pub fn parse_grid_spec(path: impl AsRef<Path>) -> Result<GridFile> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut train = None;
    let mut test = None;
    let mut p = Vec::new();
    let mut lambda = Vec::new();
    let mut kappa = Vec::new();
    let mut epsilon = Vec::new();
    let mut weight = Vec::new();
    let mut folds = 10usize;
    let mut repeats = 0usize;
    let mut kernel_name = "LINEAR".to_string();
    let mut gamma = Vec::new();
    let mut coef = Vec::new();
    let mut degree = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, rest) = match line.split_once(':') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => {
                log::warn!("{}:{}: ignoring line with no directive: {}", path.display(), lineno + 1, line);
                continue;
            }
        };

        match key {
            "train" => train = Some(rest.to_string()),
            "test" => test = Some(rest.to_string()),
            "p" => p = parse_floats(rest),
            "lambda" => lambda = parse_floats(rest),
            "kappa" => kappa = parse_floats(rest),
            "epsilon" => epsilon = parse_floats(rest),
            "weight" => {
                weight = parse_ints(rest)
                    .into_iter()
                    .filter_map(|w| match w {
                        1 => Some(WeightScheme::Unit),
                        2 => Some(WeightScheme::GroupRebalanced),
                        other => {
                            log::warn!("{}:{}: unknown weight_idx {}, ignoring", path.display(), lineno + 1, other);
                            None
                        }
                    })
                    .collect();
            }
            "folds" => {
                let values = parse_ints(rest);
                if values.len() > 1 {
                    log::warn!("{}:{}: `folds:` takes one value, ignoring the rest", path.display(), lineno + 1);
                }
                if let Some(&first) = values.first() {
                    folds = first as usize;
                }
            }
            "repeats" => {
                let values = parse_ints(rest);
                if values.len() > 1 {
                    log::warn!("{}:{}: `repeats:` takes one value, ignoring the rest", path.display(), lineno + 1);
                }
                if let Some(&first) = values.first() {
                    repeats = first as usize;
                }
            }
            "kernel" => kernel_name = rest.trim().to_uppercase(),
            "gamma" => gamma = parse_floats(rest),
            "coef" => coef = parse_floats(rest),
            "degree" => degree = parse_floats(rest),
            other => {
                log::warn!("{}:{}: unknown directive `{}`, ignoring", path.display(), lineno + 1, other);
            }
        }
    }

    let train = train.ok_or_else(|| GenSvmError::InputFormat {
        location: path.display().to_string(),
        message: "missing required `train:` directive".into(),
    })?;

    if p.is_empty() {
        p.push(1.0);
    }
    if lambda.is_empty() {
        lambda.push(1e-8);
    }
    if kappa.is_empty() {
        kappa.push(0.0);
    }
    if epsilon.is_empty() {
        epsilon.push(1e-6);
    }
    if weight.is_empty() {
        weight.push(WeightScheme::Unit);
    }

    let kernel = match kernel_name.as_str() {
        "LINEAR" => {
            warn_config_conflict(path, "gamma", "LINEAR", !gamma.is_empty());
            warn_config_conflict(path, "coef", "LINEAR", !coef.is_empty());
            warn_config_conflict(path, "degree", "LINEAR", !degree.is_empty());
            KernelGrid::Linear
        }
        "POLY" => KernelGrid::Poly {
            gamma: non_empty_or(gamma, 1.0),
            coef: non_empty_or(coef, 0.0),
            degree: non_empty_or(degree, 2.0),
        },
        "RBF" => {
            warn_config_conflict(path, "coef", "RBF", !coef.is_empty());
            warn_config_conflict(path, "degree", "RBF", !degree.is_empty());
            KernelGrid::Rbf { gamma: non_empty_or(gamma, 1.0) }
        }
        "SIGMOID" => {
            warn_config_conflict(path, "degree", "SIGMOID", !degree.is_empty());
            KernelGrid::Sigmoid {
                gamma: non_empty_or(gamma, 1.0),
                coef: non_empty_or(coef, 0.0),
            }
        }
        other => {
            return Err(GenSvmError::InputFormat {
                location: path.display().to_string(),
                message: format!("unknown kernel `{}`", other),
            })
        }
    };

    Ok(GridFile {
        train,
        test,
        spec: GridSpec {
            p,
            lambda,
            kappa,
            epsilon,
            weight,
            kernel,
            folds,
            repeats,
        },
    })
}

fn non_empty_or(values: Vec<f64>, default: f64) -> Vec<f64> {
    if values.is_empty() {
        vec![default]
    } else {
        values
    }
}

fn warn_config_conflict(path: &Path, param: &str, kernel: &str, present: bool) {
    if present {
        log::warn!(
            "{}: `{}:` is ignored for kernel {}",
            path.display(),
            param,
            kernel
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_a_minimal_spec() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "train: data.txt\np: 1.0 1.5 2.0\nfolds: 5\n").unwrap();
        let gf = parse_grid_spec(tmp.path()).unwrap();
        assert_eq!(gf.train, "data.txt");
        assert!(gf.test.is_none());
        assert_eq!(gf.spec.p, vec![1.0, 1.5, 2.0]);
        assert_eq!(gf.spec.folds, 5);
    }

    #[test]
    fn test_directive_is_captured() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "train: a.txt\ntest: b.txt\n").unwrap();
        let gf = parse_grid_spec(tmp.path()).unwrap();
        assert_eq!(gf.test, Some("b.txt".to_string()));
    }

    #[test]
    fn missing_train_is_an_error() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "p: 1.0\n").unwrap();
        assert!(parse_grid_spec(tmp.path()).is_err());
    }

    #[test]
    fn rbf_kernel_defaults_gamma_when_absent() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "train: a.txt\nkernel: RBF\n").unwrap();
        let gf = parse_grid_spec(tmp.path()).unwrap();
        match gf.spec.kernel {
            KernelGrid::Rbf { gamma } => assert_eq!(gamma, vec![1.0]),
            _ => panic!("expected RBF kernel"),
        }
    }
}
