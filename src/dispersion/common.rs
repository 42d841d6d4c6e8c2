//! Common dispersion by maximizing the summed adjusted profile likelihood

use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;

use super::DispersionParams;
use crate::glm::adjusted_profile_loglik;

const GOLDEN: f64 = 0.618_033_988_749_894_8;

/// Maximize a unimodal function on `[lo, hi]` by golden section search
pub(crate) fn golden_section_max<F: Fn(f64) -> f64>(f: F, lo: f64, hi: f64, tol: f64) -> f64 {
    let (mut a, mut b) = (lo, hi);
    let mut c = b - GOLDEN * (b - a);
    let mut d = a + GOLDEN * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    while (b - a).abs() > tol {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - GOLDEN * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + GOLDEN * (b - a);
            fd = f(d);
        }
    }
    (a + b) / 2.0
}

/// Summed adjusted profile log-likelihood of the `rows` genes at `dispersion`
pub(crate) fn summed_apl(
    counts: ArrayView2<f64>,
    rows: &[usize],
    design: ArrayView2<f64>,
    offsets: &[f64],
    dispersion: f64,
    params: &DispersionParams,
) -> f64 {
    rows.par_iter()
        .map(|&i| adjusted_profile_loglik(counts.row(i), design, offsets, dispersion, &params.glm))
        .sum()
}

/// One dispersion shared by the `rows` genes
pub fn common_dispersion_of(
    counts: ArrayView2<f64>,
    rows: &[usize],
    design: ArrayView2<f64>,
    offsets: &[f64],
    params: &DispersionParams,
) -> f64 {
    let (lo, hi) = params.interval;
    let log_disp = golden_section_max(
        |ld| summed_apl(counts, rows, design, offsets, ld.exp(), params),
        lo.ln(),
        hi.ln(),
        params.tol,
    );
    log_disp.exp()
}

/// Common dispersion of all genes
pub fn estimate_common_dispersion(
    counts: ArrayView2<f64>,
    design: ArrayView2<f64>,
    offsets: &[f64],
    params: &DispersionParams,
) -> f64 {
    let rows: Vec<usize> = (0..counts.len_of(Axis(0))).collect();
    common_dispersion_of(counts, &rows, design, offsets, params)
}
