//! Similarity clustering over change-record vectors.

use std::hash::{DefaultHasher, Hash, Hasher};

use tracing::warn;

use crate::change::ChangeRecord;
use crate::error::GroupingError;

/// Dimension of vectors produced by [`TokenEmbedder`].
pub const TOKEN_DIMENSIONS: usize = 256;

/// Turns a change record into a fixed-length vector.
#[cfg_attr(test, mockall::automock)]
pub trait Embedder: Send + Sync {
    fn embed(&self, record: &ChangeRecord) -> Result<Vec<f32>, GroupingError>;
}

/// Hashed bag of path tokens, labels, category and import targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEmbedder;

impl TokenEmbedder {
    fn tokens(record: &ChangeRecord) -> Vec<String> {
        let mut tokens: Vec<String> = record
            .path
            .split(['/', '.', '_', '-'])
            .filter(|t| t.len() > 1)
            .map(str::to_lowercase)
            .collect();

        tokens.extend(record.features.iter().map(|f| format!("label:{}", f.to_lowercase())));
        tokens.push(format!("category:{}", record.category));
        tokens.extend(
            record
                .imports
                .iter()
                .filter_map(|spec| super::feature::import_target(spec))
                .map(|t| format!("import:{}", t)),
        );
        tokens
    }
}

impl Embedder for TokenEmbedder {
    fn embed(&self, record: &ChangeRecord) -> Result<Vec<f32>, GroupingError> {
        if record.path.trim().is_empty() {
            return Err(GroupingError::EmbeddingFailed {
                path: record.path.clone(),
                reason: "empty path".to_string(),
            });
        }

        let mut vector = vec![0.0f32; TOKEN_DIMENSIONS];
        for token in Self::tokens(record) {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let slot = (hasher.finish() % TOKEN_DIMENSIONS as u64) as usize;
            vector[slot] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

struct Cluster {
    members: Vec<usize>,
    /// `None` for records that failed to embed; those never absorb others.
    centroid: Option<Vec<f32>>,
}

impl Cluster {
    fn absorb(&mut self, idx: usize, vector: &[f32]) {
        let n = self.members.len() as f32;
        if let Some(centroid) = &mut self.centroid {
            for (c, v) in centroid.iter_mut().zip(vector) {
                *c = (*c * n + v) / (n + 1.0);
            }
        }
        self.members.push(idx);
    }
}

/// Greedy single-pass clustering in input order.
///
/// Each record joins the most similar existing cluster whose centroid is at
/// least `threshold` similar, or starts a new one. Records that fail to
/// embed become singletons. Returned clusters hold indices into `records`.
pub fn cluster(records: &[ChangeRecord], embedder: &dyn Embedder, threshold: f32) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Cluster> = Vec::new();

    for (idx, record) in records.iter().enumerate() {
        let vector = match embedder.embed(record) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("{}; grouping '{}' on its own", e, record.path);
                clusters.push(Cluster {
                    members: vec![idx],
                    centroid: None,
                });
                continue;
            }
        };

        let best = clusters
            .iter()
            .enumerate()
            .filter_map(|(pos, c)| {
                c.centroid
                    .as_deref()
                    .map(|centroid| (pos, cosine_similarity(centroid, &vector)))
            })
            .filter(|(_, sim)| *sim >= threshold)
            .fold(None::<(usize, f32)>, |best, (pos, sim)| match best {
                Some((_, best_sim)) if best_sim >= sim => best,
                _ => Some((pos, sim)),
            });

        match best {
            Some((pos, _)) => clusters[pos].absorb(idx, &vector),
            None => clusters.push(Cluster {
                members: vec![idx],
                centroid: Some(vector),
            }),
        }
    }

    clusters.into_iter().map(|c| c.members).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Category, ChangeKind};

    fn rec(path: &str) -> ChangeRecord {
        ChangeRecord::new(path, ChangeKind::Modified, Category::Feature)
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_token_embedder_is_normalized_and_deterministic() {
        let record = rec("src/auth/login_form.ts").with_features(["auth"]);
        let a = TokenEmbedder.embed(&record).unwrap();
        let b = TokenEmbedder.embed(&record).unwrap();
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_token_embedder_rejects_empty_path() {
        assert!(TokenEmbedder.embed(&rec("")).is_err());
    }

    #[test]
    fn test_cluster_with_mock_embedder() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|r| match r.path.as_str() {
            "a" | "b" => Ok(vec![1.0, 0.0]),
            "c" => Ok(vec![0.0, 1.0]),
            _ => Err(GroupingError::EmbeddingFailed {
                path: r.path.clone(),
                reason: "model unavailable".to_string(),
            }),
        });

        let records = vec![rec("a"), rec("c"), rec("broken"), rec("b")];
        let clusters = cluster(&records, &embedder, 0.9);
        assert_eq!(clusters, vec![vec![0, 3], vec![1], vec![2]]);
    }

    #[test]
    fn test_failed_embedding_never_absorbs_others() {
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|r| {
            if r.path == "x" {
                Err(GroupingError::EmbeddingFailed {
                    path: r.path.clone(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(vec![1.0])
            }
        });

        let records = vec![rec("x"), rec("y"), rec("z")];
        let clusters = cluster(&records, &embedder, 0.0);
        assert_eq!(clusters, vec![vec![0], vec![1, 2]]);
    }
}
