//! False positive rate models
//!
//! Formulas:
//! - classic: FPR = (1 - e^(-kn/m))^k
//! - word-partitioned: the per-word load X is Poisson(n/W), and a probe
//!   landing in a word holding x keys is a false positive with probability
//!   (1 - (1 - 1/B)^(kx))^k. Averaging over X gives a rate slightly above
//!   the classic one because load varies between words.

use std::f64::consts::LN_2;

/// Calculate the classic false positive rate for given parameters
///
/// Formula: FPR = (1 - e^(-kn/m))^k
pub fn calculate_fpr(m: usize, n: usize, k: usize) -> f64 {
    if m == 0 {
        return 1.0;
    }
    let exponent = -(k as f64) * (n as f64) / (m as f64);
    (1.0 - exponent.exp()).powi(k as i32)
}

/// False positive rate of a filter of `words` words of `bits_per_word`
/// bits holding `n` keys, `k` bits per key, one word per key.
pub fn word_partitioned_fpr(words: usize, bits_per_word: usize, k: usize, n: usize) -> f64 {
    if words == 0 || bits_per_word == 0 {
        return 1.0;
    }
    if n == 0 {
        return 0.0;
    }

    let lambda = n as f64 / words as f64;
    let miss = 1.0 - 1.0 / bits_per_word as f64;
    let upper = (lambda + 12.0 * lambda.sqrt() + 32.0).ceil() as usize;

    let mut ln_pmf = -lambda;
    let mut total = 0.0;
    for x in 0..=upper {
        if x > 0 {
            ln_pmf += lambda.ln() - (x as f64).ln();
        }
        let fill = 1.0 - miss.powf((k * x) as f64);
        total += ln_pmf.exp() * fill.powi(k as i32);
    }
    total
}

/// Calculate optimal k for given m and n
pub fn optimal_k(m: usize, n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    (((m as f64 / n as f64) * LN_2).round() as usize).max(1)
}
