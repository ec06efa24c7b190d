//! Random forest regressor

use crate::error::ModelError;
use crate::models::Validate;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// A single node of a regression tree.
///
/// Children always sit at a higher index than their parent, the layout
/// exported by the training pipeline, which rules out cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn evaluate(&self, row: &[f64]) -> Result<f64, ModelError> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).ok_or(ModelError::Shape {
                        expected: feature + 1,
                        actual: row.len(),
                    })?;
                    index = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ModelError::Compute(format!("dangling node index {index}")));
                }
            }
        }
    }

    fn validate(&self, n_features: Option<usize>) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree has no nodes".to_string()));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(ModelError::Invalid(format!("leaf {index} is not finite")));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    for child in [left, right] {
                        if *child <= index || *child >= self.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "node {index} has invalid child {child}"
                            )));
                        }
                    }
                    if let Some(n) = n_features {
                        if *feature >= n {
                            return Err(ModelError::Invalid(format!(
                                "node {index} splits on feature {feature} of {n}"
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Averaging ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    /// Feature count the forest was fitted on, when the exporter recorded it
    #[serde(default)]
    pub n_features: Option<usize>,
    pub trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Predict one value per row of a `(rows, n_features)` matrix.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if let Some(expected) = self.n_features {
            if x.ncols() != expected {
                return Err(ModelError::Shape {
                    expected,
                    actual: x.ncols(),
                });
            }
        }

        let mut out = Array1::zeros(x.nrows());
        for (slot, row) in out.iter_mut().zip(x.rows()) {
            let row = row.to_vec();
            let mut sum = 0.0;
            for tree in &self.trees {
                sum += tree.evaluate(&row)?;
            }
            *slot = sum / self.trees.len() as f64;
        }

        Ok(out)
    }
}

impl Validate for RandomForest {
    fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Invalid("forest has no trees".to_string()));
        }
        if self.n_features == Some(0) {
            return Err(ModelError::Invalid("forest declares zero features".to_string()));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.n_features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn test_forest_averages_trees() {
        let forest = RandomForest {
            n_features: Some(2),
            trees: vec![stump(0, 5.0, 1.0, 3.0), stump(1, 0.0, 10.0, 20.0)],
        };
        assert!(forest.validate().is_ok());

        let out = forest.predict(&array![[6.0, -1.0], [1.0, 1.0]]).unwrap();
        assert_eq!(out[0], (3.0 + 10.0) / 2.0);
        assert_eq!(out[1], (1.0 + 20.0) / 2.0);
    }

    #[test]
    fn test_declared_width_mismatch() {
        let forest = RandomForest {
            n_features: Some(3),
            trees: vec![stump(0, 0.0, 1.0, 2.0)],
        };
        assert_eq!(
            forest.predict(&array![[1.0, 2.0]]),
            Err(ModelError::Shape {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_undeclared_width_uses_split_features_only() {
        let forest = RandomForest {
            n_features: None,
            trees: vec![stump(0, 0.0, 1.0, 2.0)],
        };
        let out = forest.predict(&array![[1.0, 2.0, 3.0, 4.0, 5.0]]).unwrap();
        assert_eq!(out[0], 2.0);
    }

    #[test]
    fn test_validate_rejects_backward_child() {
        let forest = RandomForest {
            n_features: None,
            trees: vec![RegressionTree {
                nodes: vec![
                    TreeNode::Leaf { value: 1.0 },
                    TreeNode::Split {
                        feature: 0,
                        threshold: 0.0,
                        left: 0,
                        right: 0,
                    },
                ],
            }],
        };
        assert!(forest.validate().is_err());
    }
}
