//! Sparse labeled datasets in LIBSVM format.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{Error, Result};

/// One labeled sparse example: `label ∈ {0, 1}` plus ordered
/// `(feature, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseExample {
    pub label: i32,
    pub features: Vec<(u32, f32)>,
}

/// An in-memory sparse dataset with a reseedable sampler for
/// sampled-order training.
#[derive(Debug)]
pub struct SparseDataset {
    pub examples: Vec<SparseExample>,
    /// `1 + max(feature index)` across the dataset.
    pub feature_dim: u32,
    pub num_classes: u32,
    rng: StdRng,
}

impl SparseDataset {
    /// Builds a dataset from in-memory examples, deriving the feature
    /// dimension and class count.
    pub fn from_examples(examples: Vec<SparseExample>) -> Self {
        let feature_dim = examples
            .iter()
            .flat_map(|ex| ex.features.iter().map(|&(idx, _)| idx + 1))
            .max()
            .unwrap_or(0);
        let classes: HashSet<i32> = examples.iter().map(|ex| ex.label).collect();
        SparseDataset {
            examples,
            feature_dim,
            num_classes: classes.len() as u32,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn num_examples(&self) -> u32 {
        self.examples.len() as u32
    }

    /// Reseeds the example sampler, making sampled training runs
    /// reproducible independent of load order.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draws one example uniformly at random.
    pub fn sample(&mut self) -> &SparseExample {
        let idx = self.rng.gen_range(0..self.examples.len());
        &self.examples[idx]
    }
}

/// Reads a LIBSVM-format file: per line, an integer label followed by
/// whitespace-delimited `index:value` pairs.
///
/// A raw label of `-1` is normalized to `0`. Any malformed record aborts
/// the read; there is no partial-line recovery.
pub fn read_libsvm<P: AsRef<Path>>(path: P) -> Result<SparseDataset> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;

    let malformed = |line: usize, reason: &str| Error::MalformedRecord {
        path: path.to_owned(),
        line,
        reason: reason.to_owned(),
    };

    let mut examples = Vec::new();
    let mut feature_dim = 0u32;
    let mut classes: HashSet<i32> = HashSet::new();

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut fields = line.split_whitespace();

        let label_str = fields
            .next()
            .ok_or_else(|| malformed(line_no, "missing label"))?;
        let mut label: i32 = label_str
            .parse()
            .map_err(|_| malformed(line_no, "unparseable label"))?;
        if label == -1 {
            label = 0;
        }
        classes.insert(label);

        let mut features = Vec::new();
        for pair in fields {
            let (idx_str, val_str) = pair
                .split_once(':')
                .ok_or_else(|| malformed(line_no, "feature pair missing ':'"))?;
            let idx: u32 = idx_str
                .parse()
                .map_err(|_| malformed(line_no, "unparseable feature index"))?;
            let val: f32 = val_str
                .parse()
                .map_err(|_| malformed(line_no, "unparseable feature value"))?;
            features.push((idx, val));
            feature_dim = feature_dim.max(idx + 1);
        }
        examples.push(SparseExample { label, features });
    }

    debug!(
        path = %path.display(),
        examples = examples.len(),
        feature_dim,
        "loaded sparse dataset"
    );

    Ok(SparseDataset {
        examples,
        feature_dim,
        num_classes: classes.len() as u32,
        rng: StdRng::seed_from_u64(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_labels_and_features() {
        let f = write_temp("1 0:1.5 3:-2.0\n0 1:0.25\n");
        let ds = read_libsvm(f.path()).unwrap();
        assert_eq!(ds.num_examples(), 2);
        assert_eq!(ds.examples[0].label, 1);
        assert_eq!(ds.examples[0].features, vec![(0, 1.5), (3, -2.0)]);
        assert_eq!(ds.examples[1].label, 0);
        assert_eq!(ds.feature_dim, 4);
        assert_eq!(ds.num_classes, 2);
    }

    #[test]
    fn negative_one_label_normalizes_to_zero() {
        let f = write_temp("-1 0:1.0\n+1 1:1.0\n");
        let ds = read_libsvm(f.path()).unwrap();
        assert_eq!(ds.examples[0].label, 0);
        assert_eq!(ds.examples[1].label, 1);
        assert_eq!(ds.num_classes, 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_libsvm("/nonexistent/definitely-missing.svm").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn malformed_pair_aborts() {
        let f = write_temp("1 0:1.0\n1 brokenpair\n");
        let err = read_libsvm(f.path()).unwrap_err();
        match err {
            Error::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unparseable_value_aborts() {
        let f = write_temp("1 0:xyz\n");
        assert!(matches!(
            read_libsvm(f.path()),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn sampling_is_reproducible_after_seed() {
        let f = write_temp("1 0:1.0\n0 1:1.0\n1 2:1.0\n0 3:1.0\n");
        let mut ds = read_libsvm(f.path()).unwrap();
        ds.seed(42);
        let a: Vec<i32> = (0..8).map(|_| ds.sample().label).collect();
        ds.seed(42);
        let b: Vec<i32> = (0..8).map(|_| ds.sample().label).collect();
        assert_eq!(a, b);
    }
}
