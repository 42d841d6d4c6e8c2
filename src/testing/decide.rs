//! Up / down / not significant calls

use std::fmt;

use serde::Serialize;

/// Direction call of one gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Down,
    NotSig,
    Up,
}

/// Call genes with adjusted p-value below `cutoff` by the sign of their effect
pub fn decide_tests(adj_p_values: &[f64], effects: &[f64], cutoff: f64) -> Vec<Decision> {
    adj_p_values
        .iter()
        .zip(effects)
        .map(|(&p, &e)| {
            if p.is_finite() && p < cutoff && e != 0.0 && !e.is_nan() {
                if e > 0.0 {
                    Decision::Up
                } else {
                    Decision::Down
                }
            } else {
                Decision::NotSig
            }
        })
        .collect()
}

/// Counts of each call
#[derive(Debug, Clone, Serialize)]
pub struct DecideSummary {
    pub down: usize,
    pub not_sig: usize,
    pub up: usize,
    pub cutoff: f64,
}

impl DecideSummary {
    pub fn from_decisions(decisions: &[Decision], cutoff: f64) -> Self {
        let count = |d: Decision| decisions.iter().filter(|x| **x == d).count();
        Self {
            down: count(Decision::Down),
            not_sig: count(Decision::NotSig),
            up: count(Decision::Up),
            cutoff,
        }
    }
}

impl fmt::Display for DecideSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Down: {}, NotSig: {}, Up: {} (adjusted p < {})",
            self.down, self.not_sig, self.up, self.cutoff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_tests() {
        let d = decide_tests(&[0.01, 0.01, 0.2, f64::NAN], &[1.5, -0.3, 4.0, 2.0], 0.05);
        assert_eq!(d, vec![Decision::Up, Decision::Down, Decision::NotSig, Decision::NotSig]);
        let s = DecideSummary::from_decisions(&d, 0.05);
        assert_eq!((s.down, s.not_sig, s.up), (1, 2, 1));
        assert_eq!(s.to_string(), "Down: 1, NotSig: 2, Up: 1 (adjusted p < 0.05)");
    }
}
