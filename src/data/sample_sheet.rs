//! Patient / tissue annotation for paired tumor-normal designs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{DgeError, Result};

/// Tissue of origin of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tissue {
    Normal,
    Tumor,
}

impl FromStr for Tissue {
    type Err = DgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "normal" | "control" => Ok(Tissue::Normal),
            "t" | "tumor" | "tumour" | "cancer" => Ok(Tissue::Tumor),
            other => Err(DgeError::InvalidSampleSheet {
                reason: format!("unknown tissue '{}' (expected tumor or normal)", other),
            }),
        }
    }
}

impl fmt::Display for Tissue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tissue::Normal => write!(f, "normal"),
            Tissue::Tumor => write!(f, "tumor"),
        }
    }
}

/// Sample identifiers with their patient and tissue labels
#[derive(Debug, Clone, Serialize)]
pub struct SampleSheet {
    sample_ids: Vec<String>,
    patients: Vec<String>,
    tissues: Vec<Tissue>,
}

impl SampleSheet {
    pub fn new(sample_ids: Vec<String>, patients: Vec<String>, tissues: Vec<Tissue>) -> Result<Self> {
        if patients.len() != sample_ids.len() || tissues.len() != sample_ids.len() {
            return Err(DgeError::DimensionMismatch {
                expected: format!("{} patients and tissues", sample_ids.len()),
                got: format!("{} patients, {} tissues", patients.len(), tissues.len()),
            });
        }
        Ok(Self {
            sample_ids,
            patients,
            tissues,
        })
    }

    /// Derive patient and tissue from names such as `8N` / `8T`: the last
    /// character is the tissue code, the rest names the patient.
    pub fn from_sample_names(sample_ids: &[String], tumor_code: char, normal_code: char) -> Result<Self> {
        let mut patients = Vec::with_capacity(sample_ids.len());
        let mut tissues = Vec::with_capacity(sample_ids.len());

        for id in sample_ids {
            let trimmed = id.trim();
            let last = trimmed.chars().last().ok_or_else(|| DgeError::InvalidSampleSheet {
                reason: "empty sample name".to_string(),
            })?;
            let tissue = if last.eq_ignore_ascii_case(&tumor_code) {
                Tissue::Tumor
            } else if last.eq_ignore_ascii_case(&normal_code) {
                Tissue::Normal
            } else {
                return Err(DgeError::InvalidSampleSheet {
                    reason: format!(
                        "sample '{}' does not end with tumor code '{}' or normal code '{}'",
                        id, tumor_code, normal_code
                    ),
                });
            };
            let patient = trimmed[..trimmed.len() - last.len_utf8()]
                .trim_end_matches(&['_', '-', '.'][..])
                .to_string();
            if patient.is_empty() {
                return Err(DgeError::InvalidSampleSheet {
                    reason: format!("sample '{}' has no patient prefix", id),
                });
            }
            patients.push(patient);
            tissues.push(tissue);
        }

        Self::new(sample_ids.to_vec(), patients, tissues)
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn patients(&self) -> &[String] {
        &self.patients
    }

    pub fn tissues(&self) -> &[Tissue] {
        &self.tissues
    }

    /// Patient levels sorted numerically when every label is a number,
    /// lexicographically otherwise
    pub fn patient_levels(&self) -> Vec<String> {
        let mut levels = self.patients.clone();
        levels.sort();
        levels.dedup();
        let numeric: Option<Vec<f64>> = levels.iter().map(|p| p.parse::<f64>().ok()).collect();
        if let Some(values) = numeric {
            let mut paired: Vec<(f64, String)> = values.into_iter().zip(levels).collect();
            paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            paired.into_iter().map(|(_, p)| p).collect()
        } else {
            levels
        }
    }

    /// Every patient must contribute at least one tumor and one normal sample
    pub fn check_pairing(&self) -> Result<()> {
        let mut seen: HashMap<&str, (bool, bool)> = HashMap::new();
        for (patient, tissue) in self.patients.iter().zip(&self.tissues) {
            let entry = seen.entry(patient.as_str()).or_insert((false, false));
            match tissue {
                Tissue::Normal => entry.0 = true,
                Tissue::Tumor => entry.1 = true,
            }
        }

        let mut unpaired: Vec<&str> = seen
            .iter()
            .filter(|(_, (n, t))| !(*n && *t))
            .map(|(p, _)| *p)
            .collect();
        if !unpaired.is_empty() {
            unpaired.sort_unstable();
            return Err(DgeError::InvalidSampleSheet {
                reason: format!("patients without both tumor and normal samples: {:?}", unpaired),
            });
        }
        Ok(())
    }

    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            sample_ids: indices.iter().map(|&i| self.sample_ids[i].clone()).collect(),
            patients: indices.iter().map(|&i| self.patients[i].clone()).collect(),
            tissues: indices.iter().map(|&i| self.tissues[i]).collect(),
        }
    }

    /// Reorder rows to follow `sample_ids`; every id must be present
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let order: Vec<usize> = sample_ids
            .iter()
            .map(|s| {
                index.get(s.as_str()).copied().ok_or_else(|| DgeError::InvalidSampleSheet {
                    reason: format!("sample '{}' is missing from the sample sheet", s),
                })
            })
            .collect::<Result<_>>()?;
        Ok(self.subset(&order))
    }
}
