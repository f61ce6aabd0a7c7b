use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// a macro to declare simple Vec<String>
#[macro_export]
macro_rules! string_vec {
    ($($x:expr),*) => {
        vec![$($x.into()),*]
    };
}

/// info! line rendered in bold yellow when the first argument is true
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)+) => {
        if $colorful {
            log::info!("\x1b[1;93m{}\x1b[0m", format!($($arg)+));
        } else {
            log::info!($($arg)+);
        }
    };
}

/// Area under the ROC curve of `scores` against binary `y`, in [0, 1].
///
/// Each (positive, negative) pair scores one point when the positive is ranked
/// strictly higher and half a point on ties. Returns 0.0 if either class is absent.
pub fn compute_auc_from_value(scores: &[f64], y: &[u8]) -> f64 {
    let mut pairs: Vec<(f64, u8)> = scores
        .iter()
        .zip(y.iter())
        .filter(|(_, &c)| c == 0 || c == 1)
        .map(|(&s, &c)| (s, c))
        .collect();

    let n1 = pairs.iter().filter(|(_, c)| *c == 1).count();
    let n0 = pairs.len() - n1;
    if n0 == 0 || n1 == 0 {
        return 0.0;
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // walk groups of equal scores from low to high, counting negatives seen below
    let mut points = 0.0;
    let mut negatives_below = 0usize;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        let (mut pos, mut neg) = (0usize, 0usize);
        while j < pairs.len() && pairs[j].0.total_cmp(&pairs[i].0) == Ordering::Equal {
            if pairs[j].1 == 1 { pos += 1 } else { neg += 1 }
            j += 1;
        }
        points += pos as f64 * negatives_below as f64 + 0.5 * (pos * neg) as f64;
        negatives_below += neg;
        i = j;
    }

    points / (n0 * n1) as f64
}

/// Rounds to 4 decimal places, half away from zero
pub fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}

pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.mean();
    let std = if values.len() > 1 { values.std_dev() } else { 0.0 };
    (mean, std)
}

/// a function used essentially in CV that split randomly a Vec<T> into p Vec<T> of approximatively the same size
pub fn split_into_balanced_random_chunks<T: Clone>(vec: Vec<T>, p: usize, rng: &mut ChaCha8Rng) -> Vec<Vec<T>> {
    let mut shuffled = vec;
    shuffled.shuffle(rng);

    let n = shuffled.len();
    let base_size = n / p;
    let extra_elements = n % p;

    let mut chunks = Vec::with_capacity(p);
    let mut start = 0;
    for i in 0..p {
        // the first `extra_elements` chunks take one more element
        let end = start + base_size + usize::from(i < extra_elements);
        chunks.push(shuffled[start..end].to_vec());
        start = end;
    }

    chunks
}

/// Compact rendering of a feature subset, e.g. `[3, 7, 12]`
pub fn display_indices(indices: &[usize]) -> String {
    let items: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
    format!("[{}]", items.join(", "))
}
