//! Sample indicator strings
//!
//! One character per sample, in sample order. A group code assigns the
//! sample to a group (digits index into the list of group names, e.g.
//! `"0011X"` with groups `tumor,normal`), `X` drops the sample.

use crate::error::{DgeError, Result};

/// Per-sample flag decoded from an indicator string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFlag {
    Group(usize),
    Excluded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleIndicator {
    flags: Vec<SampleFlag>,
}

/// Samples retained by an indicator and their group labels
#[derive(Debug, Clone)]
pub struct SampleSelection {
    /// Column indices of retained samples in the original order
    pub indices: Vec<usize>,
    /// Retained sample identifiers
    pub sample_ids: Vec<String>,
    /// Group index per retained sample
    pub group_index: Vec<usize>,
    /// Group label per retained sample
    pub groups: Vec<String>,
}

impl SampleIndicator {
    /// Parse a digit-coded indicator (`0`-`9`, `X`)
    pub fn parse(code: &str) -> Result<Self> {
        const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];
        Self::parse_with_codes(code, &DIGITS)
    }

    /// Parse an indicator where `codes[i]` marks group `i`.
    /// Matching is case-insensitive; `X` always excludes; whitespace is ignored.
    pub fn parse_with_codes(code: &str, codes: &[char]) -> Result<Self> {
        let mut flags = Vec::with_capacity(code.len());
        for (pos, ch) in code.chars().filter(|c| !c.is_whitespace()).enumerate() {
            let upper = ch.to_ascii_uppercase();
            let flag = if let Some(group) = codes.iter().position(|c| c.to_ascii_uppercase() == upper) {
                SampleFlag::Group(group)
            } else if upper == 'X' {
                SampleFlag::Excluded
            } else {
                return Err(DgeError::InvalidIndicator {
                    reason: format!("unexpected character '{}' at position {}", ch, pos + 1),
                });
            };
            flags.push(flag);
        }

        if flags.is_empty() {
            return Err(DgeError::InvalidIndicator {
                reason: "indicator string is empty".to_string(),
            });
        }

        Ok(Self { flags })
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flags(&self) -> &[SampleFlag] {
        &self.flags
    }

    pub fn n_excluded(&self) -> usize {
        self.flags.iter().filter(|f| **f == SampleFlag::Excluded).count()
    }

    /// Resolve the indicator against sample identifiers and group names
    pub fn select(&self, sample_ids: &[String], group_names: &[String]) -> Result<SampleSelection> {
        if self.flags.len() != sample_ids.len() {
            return Err(DgeError::InvalidIndicator {
                reason: format!(
                    "indicator has {} characters but the dataset has {} samples",
                    self.flags.len(),
                    sample_ids.len()
                ),
            });
        }

        let mut selection = SampleSelection {
            indices: Vec::new(),
            sample_ids: Vec::new(),
            group_index: Vec::new(),
            groups: Vec::new(),
        };

        for (i, flag) in self.flags.iter().enumerate() {
            if let SampleFlag::Group(g) = *flag {
                let name = group_names.get(g).ok_or_else(|| DgeError::InvalidIndicator {
                    reason: format!(
                        "sample {} refers to group {} but only {} group names were given",
                        sample_ids[i],
                        g,
                        group_names.len()
                    ),
                })?;
                selection.indices.push(i);
                selection.sample_ids.push(sample_ids[i].clone());
                selection.group_index.push(g);
                selection.groups.push(name.clone());
            }
        }

        let mut present: Vec<usize> = selection.group_index.clone();
        present.sort_unstable();
        present.dedup();
        if present.len() < 2 {
            return Err(DgeError::InvalidIndicator {
                reason: format!(
                    "at least two groups must remain after exclusion, found {}",
                    present.len()
                ),
            });
        }

        Ok(selection)
    }
}

impl SampleSelection {
    /// Number of retained samples in group `g`
    pub fn group_size(&self, g: usize) -> usize {
        self.group_index.iter().filter(|&&x| x == g).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("GSM{}", i)).collect()
    }

    fn groups() -> Vec<String> {
        vec!["tumor".to_string(), "normal".to_string()]
    }

    #[test]
    fn test_parse_and_select() {
        let ind = SampleIndicator::parse("01X10").unwrap();
        assert_eq!(ind.len(), 5);
        assert_eq!(ind.n_excluded(), 1);

        let sel = ind.select(&samples(5), &groups()).unwrap();
        assert_eq!(sel.indices, vec![0, 1, 3, 4]);
        assert_eq!(sel.groups, vec!["tumor", "normal", "normal", "tumor"]);
        assert_eq!(sel.group_size(0), 2);
    }

    #[test]
    fn test_whitespace_and_lowercase_x() {
        let ind = SampleIndicator::parse("00 11 x").unwrap();
        assert_eq!(ind.len(), 5);
        assert_eq!(ind.flags()[4], SampleFlag::Excluded);
    }

    #[test]
    fn test_length_mismatch() {
        let ind = SampleIndicator::parse("0101").unwrap();
        assert!(ind.select(&samples(5), &groups()).is_err());
    }

    #[test]
    fn test_unknown_character() {
        assert!(SampleIndicator::parse("01a").is_err());
    }

    #[test]
    fn test_single_group_rejected() {
        let ind = SampleIndicator::parse("00XX").unwrap();
        assert!(ind.select(&samples(4), &groups()).is_err());
    }

    #[test]
    fn test_group_without_name() {
        let ind = SampleIndicator::parse("012").unwrap();
        assert!(ind.select(&samples(3), &groups()).is_err());
    }

    #[test]
    fn test_letter_codes() {
        let ind = SampleIndicator::parse_with_codes("TNtnX", &['T', 'N']).unwrap();
        assert_eq!(
            ind.flags(),
            &[
                SampleFlag::Group(0),
                SampleFlag::Group(1),
                SampleFlag::Group(0),
                SampleFlag::Group(1),
                SampleFlag::Excluded
            ]
        );
    }
}
