//! Design matrices for the group-means and paired tumor/normal models

pub mod linalg;

use ndarray::{Array2, ArrayView2};

use crate::data::{SampleSheet, Tissue};
use crate::error::{DgeError, Result};

use linalg::{crossprod_weighted, invert_symmetric, qr_rank};

/// Model matrix with named coefficients, one row per sample
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    coef_names: Vec<String>,
}

impl DesignMatrix {
    pub fn new(matrix: Array2<f64>, coef_names: Vec<String>) -> Result<Self> {
        if matrix.ncols() != coef_names.len() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} coefficient names", matrix.ncols()),
                got: format!("{}", coef_names.len()),
            });
        }
        Ok(Self { matrix, coef_names })
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn coef_names(&self) -> &[String] {
        &self.coef_names
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    /// Residual degrees of freedom
    pub fn df_residual(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }

    pub fn coef_index(&self, name: &str) -> Option<usize> {
        self.coef_names.iter().position(|c| c == name)
    }

    /// Design without coefficient `coef`, the null model of a likelihood ratio test
    pub fn drop_coef(&self, coef: usize) -> Result<Self> {
        if coef >= self.n_coefs() {
            return Err(DgeError::InvalidDesignMatrix {
                reason: format!("coefficient {} out of range for {} columns", coef, self.n_coefs()),
            });
        }
        let keep: Vec<usize> = (0..self.n_coefs()).filter(|&j| j != coef).collect();
        let matrix = self.matrix.select(ndarray::Axis(1), &keep);
        let coef_names = keep.iter().map(|&j| self.coef_names[j].clone()).collect();
        Ok(Self { matrix, coef_names })
    }
}

/// Group-means parametrization `~0 + group`: one indicator column per level.
/// `levels` fixes the column order.
pub fn group_means_design(groups: &[String], levels: &[String]) -> Result<DesignMatrix> {
    let mut matrix = Array2::zeros((groups.len(), levels.len()));
    for (i, g) in groups.iter().enumerate() {
        let j = levels.iter().position(|l| l == g).ok_or_else(|| DgeError::InvalidDesignMatrix {
            reason: format!("sample group '{}' is not one of the levels {:?}", g, levels),
        })?;
        matrix[[i, j]] = 1.0;
    }
    check_full_rank(matrix.view())?;
    DesignMatrix::new(matrix, levels.to_vec())
}

/// Paired `~patient + tissue` with treatment contrasts: intercept, one column
/// per non-reference patient, and the tumor-vs-normal tissue effect last
pub fn paired_design(sheet: &SampleSheet) -> Result<DesignMatrix> {
    let levels = sheet.patient_levels();
    let n = sheet.n_samples();
    let p = levels.len() + 1;
    let mut matrix = Array2::zeros((n, p));

    for (i, (patient, tissue)) in sheet.patients().iter().zip(sheet.tissues()).enumerate() {
        matrix[[i, 0]] = 1.0;
        if let Some(j) = levels.iter().skip(1).position(|l| l == patient) {
            matrix[[i, j + 1]] = 1.0;
        }
        if *tissue == Tissue::Tumor {
            matrix[[i, p - 1]] = 1.0;
        }
    }

    let mut coef_names = vec!["(Intercept)".to_string()];
    coef_names.extend(levels.iter().skip(1).map(|l| format!("patient{}", l)));
    coef_names.push("tissuetumor".to_string());

    check_full_rank(matrix.view())?;
    log::debug!("Paired design: {} samples, {} patients, {} coefficients", n, levels.len(), p);
    DesignMatrix::new(matrix, coef_names)
}

/// Contrast vector `numerator - denominator` over the design columns
pub fn make_contrast(design: &DesignMatrix, numerator: &str, denominator: &str) -> Result<Vec<f64>> {
    let lookup = |name: &str| {
        design.coef_index(name).ok_or_else(|| DgeError::InvalidDesignMatrix {
            reason: format!("'{}' is not a design column; available: {:?}", name, design.coef_names()),
        })
    };
    let num = lookup(numerator)?;
    let den = lookup(denominator)?;
    let mut contrast = vec![0.0; design.n_coefs()];
    contrast[num] = 1.0;
    contrast[den] = -1.0;
    Ok(contrast)
}

/// Leverages, the diagonal of X (X'X)^-1 X'
pub fn hat_values(design: ArrayView2<f64>) -> Result<Vec<f64>> {
    let p = design.ncols();
    let xtx_inv = invert_symmetric(&crossprod_weighted(design, None), p).ok_or_else(|| {
        DgeError::InvalidDesignMatrix {
            reason: "design matrix is singular".to_string(),
        }
    })?;
    Ok((0..design.nrows())
        .map(|i| {
            let mut h = 0.0;
            for j in 0..p {
                for k in 0..p {
                    h += design[[i, j]] * xtx_inv[j * p + k] * design[[i, k]];
                }
            }
            h
        })
        .collect())
}

/// Fail unless the design has full column rank
pub fn check_full_rank(matrix: ArrayView2<f64>) -> Result<()> {
    let nrow = matrix.nrows();
    let ncol = matrix.ncols();
    if nrow == 0 || ncol == 0 {
        return Err(DgeError::InvalidDesignMatrix {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }

    if qr_rank(matrix) < ncol {
        let has_zero_column = (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if has_zero_column {
            "design matrix is not full rank: levels without any samples give column(s) of zeros"
        } else {
            "design matrix is not full rank: some columns are linear combinations of the others"
        };
        return Err(DgeError::InvalidDesignMatrix {
            reason: reason.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_group_means_design() {
        let d = group_means_design(&s(&["tumor", "normal", "tumor"]), &s(&["tumor", "normal"])).unwrap();
        assert_eq!(d.matrix(), array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0]]);
        assert_eq!(make_contrast(&d, "tumor", "normal").unwrap(), vec![1.0, -1.0]);
        assert!(make_contrast(&d, "tumor", "healthy").is_err());
    }

    #[test]
    fn test_paired_design() {
        let sheet = SampleSheet::from_sample_names(&s(&["8N", "8T", "10N", "10T", "33N", "33T"]), 'T', 'N').unwrap();
        let d = paired_design(&sheet).unwrap();
        assert_eq!(d.coef_names(), &s(&["(Intercept)", "patient10", "patient33", "tissuetumor"])[..]);
        assert_eq!(d.matrix().row(0).to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(d.matrix().row(3).to_vec(), vec![1.0, 1.0, 0.0, 1.0]);
        assert_eq!(d.df_residual(), 2);

        let null = d.drop_coef(3).unwrap();
        assert_eq!(null.n_coefs(), 3);
        assert_eq!(null.coef_names().last().map(String::as_str), Some("patient33"));
    }

    #[test]
    fn test_hat_values() {
        let x = array![[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let h = hat_values(x.view()).unwrap();
        assert!((h[0] - 0.5).abs() < 1e-12);
        assert!((h[2] - 1.0).abs() < 1e-12);
        assert!((h.iter().sum::<f64>() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_check_full_rank() {
        assert!(check_full_rank(array![[1.0, 0.0], [1.0, 1.0]].view()).is_ok());
        let zero_col = check_full_rank(array![[1.0, 0.0], [1.0, 0.0]].view()).unwrap_err();
        assert!(format!("{}", zero_col).contains("zeros"));
        let combo = check_full_rank(array![[1.0, 2.0], [1.0, 2.0], [2.0, 4.0]].view()).unwrap_err();
        assert!(format!("{}", combo).contains("linear combinations"));
        assert!(check_full_rank(array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0]].view()).is_err());
    }
}
