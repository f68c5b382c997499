//! Deviation of each bucket count from the mean of the whole sequence.

/// Mean, standard deviation and per-value z-scores of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScores {
    pub mean: f64,
    pub std_dev: f64,
    pub scores: Vec<f64>,
}

impl ZScores {
    /// True when the spread is zero and every score was pinned to 0.
    pub fn is_degenerate(&self) -> bool {
        self.std_dev == 0.0
    }
}

/// Scores every value against the mean and standard deviation of the full
/// sequence, the scored value included.
///
/// `ddof` is the delta degrees of freedom of the deviation: 0 divides by `n`,
/// 1 by `n - 1`. When the deviation is zero or undefined every score is 0.
pub fn zscores(values: &[f64], ddof: usize) -> ZScores {
    let n = values.len();
    if n == 0 {
        return ZScores {
            mean: 0.0,
            std_dev: 0.0,
            scores: Vec::new(),
        };
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let all_equal = values.iter().all(|v| *v == values[0]);
    let std_dev = if all_equal || n <= ddof {
        0.0
    } else {
        let sum_sq = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        (sum_sq / (n - ddof) as f64).sqrt()
    };

    let scores = if std_dev > 0.0 && std_dev.is_finite() {
        values.iter().map(|v| (v - mean) / std_dev).collect()
    } else {
        vec![0.0; n]
    };

    ZScores {
        mean,
        std_dev: if std_dev.is_finite() { std_dev } else { 0.0 },
        scores,
    }
}
