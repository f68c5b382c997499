//! Isolation forest over a univariate feature.
//!
//! Each tree isolates points by recursive random splits; points that are
//! isolated after few splits are outliers. Scores follow the usual
//! `-2^(-E[h(x)] / c(psi))` convention, so lower means more anomalous, and
//! the decision threshold is the `contamination` percentile of the training
//! scores.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Score assigned to every point when the forest cannot normalise path
/// lengths (a single training point).
const NEUTRAL_SCORE: f64 = -0.5;

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.05,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build(points: Vec<f64>, depth_limit: usize, rng: &mut StdRng) -> Self {
        Self {
            root: grow(points, 0, depth_limit, rng),
        }
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Split {
                    threshold,
                    left,
                    right,
                } => {
                    node = if x <= *threshold { left } else { right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

fn grow(points: Vec<f64>, depth: usize, depth_limit: usize, rng: &mut StdRng) -> Node {
    if depth >= depth_limit || points.len() <= 1 {
        return Node::Leaf { size: points.len() };
    }

    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min >= max {
        return Node::Leaf { size: points.len() };
    }

    let threshold = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = points.into_iter().partition(|p| *p <= threshold);

    Node::Split {
        threshold,
        left: Box::new(grow(left, depth + 1, depth_limit, rng)),
        right: Box::new(grow(right, depth + 1, depth_limit, rng)),
    }
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` points; the normaliser `c(n)`.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample: usize,
    offset: f64,
}

impl IsolationForest {
    /// Trains on `values` and fixes the outlier threshold from the training
    /// scores. Returns `None` for an empty training set.
    pub fn fit(values: &[f64], params: &ForestParams) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let subsample = params.max_samples.clamp(1, values.len());
        let depth_limit = (subsample as f64).log2().ceil() as usize;

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let points = index::sample(&mut rng, values.len(), subsample)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                IsolationTree::build(points, depth_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            subsample,
            offset: NEUTRAL_SCORE,
        };
        let training_scores = forest.score_samples(values);
        forest.offset = percentile(&training_scores, params.contamination);
        Some(forest)
    }

    /// Anomaly score per value; lower is more anomalous, range `[-1, 0)`.
    pub fn score_samples(&self, values: &[f64]) -> Vec<f64> {
        let normaliser = average_path_length(self.subsample);
        values
            .iter()
            .map(|x| {
                if normaliser <= 0.0 {
                    return NEUTRAL_SCORE;
                }
                let mean_depth = self.trees.iter().map(|t| t.path_length(*x)).sum::<f64>()
                    / self.trees.len() as f64;
                -(2f64.powf(-mean_depth / normaliser))
            })
            .collect()
    }

    /// Score below which a value is labelled an outlier.
    pub fn threshold(&self) -> f64 {
        self.offset
    }

    pub fn is_outlier(&self, score: f64) -> bool {
        score < self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244_770_920_116_851).abs() < 1e-6);
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 1.0), 4.0);
        assert!((percentile(&[0.0, 10.0], 0.25) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_isolated_point_scores_lowest() {
        let values = [5.0, 5.0, 5.0, 50.0, 5.0, 5.0];
        let forest = IsolationForest::fit(&values, &ForestParams::default()).unwrap();
        let scores = forest.score_samples(&values);

        for (i, score) in scores.iter().enumerate() {
            if i != 3 {
                assert!(scores[3] < *score);
            }
        }
        assert!(forest.is_outlier(scores[3]));
        assert!(!forest.is_outlier(scores[0]));
    }

    #[test]
    fn test_same_seed_same_scores() {
        let values: Vec<f64> = (0..60).map(|i| ((i * 7919) % 23) as f64).collect();
        let params = ForestParams::default();
        let a = IsolationForest::fit(&values, &params).unwrap();
        let b = IsolationForest::fit(&values, &params).unwrap();
        assert_eq!(a.score_samples(&values), b.score_samples(&values));
        assert_eq!(a.threshold(), b.threshold());
    }

    #[test]
    fn test_single_point_is_neutral() {
        let forest = IsolationForest::fit(&[3.0], &ForestParams::default()).unwrap();
        let scores = forest.score_samples(&[3.0]);
        assert_eq!(scores, vec![NEUTRAL_SCORE]);
        assert!(!forest.is_outlier(scores[0]));
    }

    #[test]
    fn test_empty_training_set() {
        assert!(IsolationForest::fit(&[], &ForestParams::default()).is_none());
    }

    #[test]
    fn test_scores_in_range() {
        let values: Vec<f64> = (0..300).map(|i| (i % 17) as f64).collect();
        let forest = IsolationForest::fit(&values, &ForestParams::default()).unwrap();
        for score in forest.score_samples(&values) {
            assert!((-1.0..0.0).contains(&score));
        }
    }
}
