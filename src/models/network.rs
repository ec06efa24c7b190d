//! Sequence network runtimes
//!
//! The sequence model is consumed through [`SequenceNetwork`], so the
//! ensemble does not care whether the archive runs on the native LSTM
//! implementation or on ONNX Runtime.

use crate::error::ModelError;
use crate::models::Validate;
use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loaded sequence network.
pub trait SequenceNetwork: Send + Sync {
    /// Run the network on a `(batch, time_steps, channels)` tensor and
    /// return a `(batch, outputs)` matrix.
    fn predict(&self, input: &Array3<f64>) -> Result<Array2<f64>, ModelError>;

    /// Runtime name for logs.
    fn runtime(&self) -> &'static str;
}

/// Layer activation for dense layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

/// Serialized layer as exported into the network archive.
///
/// Weight layout follows Keras: `kernel` is `(inputs, 4 * units)` and
/// `recurrent_kernel` is `(units, 4 * units)` with gates ordered
/// input, forget, cell, output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerSpec {
    Lstm {
        units: usize,
        kernel: Vec<Vec<f64>>,
        recurrent_kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default)]
        return_sequences: bool,
    },
    Dense {
        kernel: Vec<Vec<f64>>,
        bias: Vec<f64>,
        #[serde(default)]
        activation: Activation,
    },
}

/// Top-level document stored in the network archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkArchive {
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone)]
enum Layer {
    Lstm {
        units: usize,
        kernel: Array2<f64>,
        recurrent: Array2<f64>,
        bias: Array1<f64>,
        return_sequences: bool,
    },
    Dense {
        kernel: Array2<f64>,
        bias: Array1<f64>,
        activation: Activation,
    },
}

/// Intermediate value flowing between layers for one batch item.
enum Signal {
    Sequence(Vec<Array1<f64>>),
    Vector(Array1<f64>),
}

/// Stacked LSTM + dense network evaluated natively.
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    layers: Vec<Layer>,
    input_channels: usize,
}

impl LstmNetwork {
    /// Decode a JSON network archive from disk.
    pub fn from_archive<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let archive: NetworkArchive = serde_json::from_slice(&bytes)?;
        Ok(Self::from_spec(archive)?)
    }

    /// Compile an archive into an executable network, checking every shape.
    pub fn from_spec(archive: NetworkArchive) -> Result<Self, ModelError> {
        if archive.layers.is_empty() {
            return Err(ModelError::Invalid("network has no layers".to_string()));
        }

        let mut layers = Vec::with_capacity(archive.layers.len());
        let mut width: Option<usize> = None;
        let mut sequence_out = true;
        let mut input_channels = 0;

        for (index, spec) in archive.layers.into_iter().enumerate() {
            let layer = match spec {
                LayerSpec::Lstm {
                    units,
                    kernel,
                    recurrent_kernel,
                    bias,
                    return_sequences,
                } => {
                    if !sequence_out {
                        return Err(ModelError::Invalid(format!(
                            "layer {index}: LSTM after a layer that returns a vector"
                        )));
                    }
                    let kernel = matrix(kernel, index)?;
                    let recurrent = matrix(recurrent_kernel, index)?;
                    let gates = 4 * units;
                    if units == 0
                        || kernel.ncols() != gates
                        || recurrent.dim() != (units, gates)
                        || bias.len() != gates
                    {
                        return Err(ModelError::Invalid(format!(
                            "layer {index}: LSTM weights do not match {units} units"
                        )));
                    }
                    check_width(width, kernel.nrows(), index)?;
                    width = Some(units);
                    sequence_out = return_sequences;
                    Layer::Lstm {
                        units,
                        kernel,
                        recurrent,
                        bias: Array1::from(bias),
                        return_sequences,
                    }
                }
                LayerSpec::Dense {
                    kernel,
                    bias,
                    activation,
                } => {
                    if sequence_out {
                        return Err(ModelError::Invalid(format!(
                            "layer {index}: dense layer needs a vector input"
                        )));
                    }
                    let kernel = matrix(kernel, index)?;
                    if bias.len() != kernel.ncols() {
                        return Err(ModelError::Invalid(format!(
                            "layer {index}: dense bias has {} entries for {} outputs",
                            bias.len(),
                            kernel.ncols()
                        )));
                    }
                    check_width(width, kernel.nrows(), index)?;
                    width = Some(kernel.ncols());
                    Layer::Dense {
                        kernel,
                        bias: Array1::from(bias),
                        activation,
                    }
                }
            };

            if index == 0 {
                input_channels = match &layer {
                    Layer::Lstm { kernel, .. } | Layer::Dense { kernel, .. } => kernel.nrows(),
                };
            }
            layers.push(layer);
        }

        if sequence_out {
            return Err(ModelError::Invalid(
                "network output is a sequence, expected a vector".to_string(),
            ));
        }

        let network = Self {
            layers,
            input_channels,
        };
        network.validate()?;
        Ok(network)
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    fn forward(&self, steps: Vec<Array1<f64>>) -> Result<Array1<f64>, ModelError> {
        let mut signal = Signal::Sequence(steps);

        for layer in &self.layers {
            signal = match (layer, signal) {
                (
                    Layer::Lstm {
                        units,
                        kernel,
                        recurrent,
                        bias,
                        return_sequences,
                    },
                    Signal::Sequence(steps),
                ) => {
                    let u = *units;
                    let mut h = Array1::<f64>::zeros(u);
                    let mut c = Array1::<f64>::zeros(u);
                    let mut outputs = Vec::with_capacity(steps.len());

                    for x in &steps {
                        let z = x.dot(kernel) + h.dot(recurrent) + bias;
                        let i = z.slice(s![0..u]).mapv(sigmoid);
                        let f = z.slice(s![u..2 * u]).mapv(sigmoid);
                        let g = z.slice(s![2 * u..3 * u]).mapv(f64::tanh);
                        let o = z.slice(s![3 * u..4 * u]).mapv(sigmoid);
                        c = &f * &c + &i * &g;
                        h = &o * &c.mapv(f64::tanh);
                        if *return_sequences {
                            outputs.push(h.clone());
                        }
                    }

                    if *return_sequences {
                        Signal::Sequence(outputs)
                    } else {
                        Signal::Vector(h)
                    }
                }
                (
                    Layer::Dense {
                        kernel,
                        bias,
                        activation,
                    },
                    Signal::Vector(x),
                ) => Signal::Vector((x.dot(kernel) + bias).mapv(|v| activation.apply(v))),
                _ => {
                    return Err(ModelError::Compute("layer received the wrong input rank".to_string()));
                }
            };
        }

        match signal {
            Signal::Vector(out) => Ok(out),
            Signal::Sequence(_) => Err(ModelError::Compute("network produced a sequence".to_string())),
        }
    }
}

impl SequenceNetwork for LstmNetwork {
    fn predict(&self, input: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
        let (batch, _, channels) = input.dim();
        if channels != self.input_channels {
            return Err(ModelError::Shape {
                expected: self.input_channels,
                actual: channels,
            });
        }

        let mut rows = Vec::with_capacity(batch);
        for sample in input.axis_iter(Axis(0)) {
            let steps: Vec<Array1<f64>> = sample.rows().into_iter().map(|r| r.to_owned()).collect();
            rows.push(self.forward(steps)?);
        }

        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut out = Array2::zeros((batch, width));
        for (mut dst, src) in out.rows_mut().into_iter().zip(&rows) {
            dst.assign(src);
        }

        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Compute("network output is not finite".to_string()));
        }
        Ok(out)
    }

    fn runtime(&self) -> &'static str {
        "native"
    }
}

impl Validate for LstmNetwork {
    fn validate(&self) -> Result<(), ModelError> {
        let finite = |v: ArrayView1<'_, f64>| v.iter().all(|x| x.is_finite());
        for (index, layer) in self.layers.iter().enumerate() {
            let ok = match layer {
                Layer::Lstm {
                    kernel,
                    recurrent,
                    bias,
                    ..
                } => {
                    kernel.iter().all(|x| x.is_finite())
                        && recurrent.iter().all(|x| x.is_finite())
                        && finite(bias.view())
                }
                Layer::Dense { kernel, bias, .. } => {
                    kernel.iter().all(|x| x.is_finite()) && finite(bias.view())
                }
            };
            if !ok {
                return Err(ModelError::Invalid(format!("layer {index} has non-finite weights")));
            }
        }
        Ok(())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn check_width(previous: Option<usize>, inputs: usize, index: usize) -> Result<(), ModelError> {
    match previous {
        Some(width) if width != inputs => Err(ModelError::Invalid(format!(
            "layer {index} expects {inputs} inputs but previous layer emits {width}"
        ))),
        _ => Ok(()),
    }
}

fn matrix(rows: Vec<Vec<f64>>, index: usize) -> Result<Array2<f64>, ModelError> {
    let nrows = rows.len();
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if nrows == 0 || ncols == 0 || rows.iter().any(|r| r.len() != ncols) {
        return Err(ModelError::Invalid(format!("layer {index}: ragged or empty weight matrix")));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| ModelError::Invalid(format!("layer {index}: {e}")))
}

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxNetwork;

#[cfg(feature = "onnx")]
mod onnx {
    use super::SequenceNetwork;
    use crate::error::ModelError;
    use anyhow::{Context, Result};
    use ndarray::{Array2, Array3};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::Tensor;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::info;

    /// Sequence network executed by ONNX Runtime.
    pub struct OnnxNetwork {
        session: Mutex<Session>,
        input_name: String,
        output_name: String,
    }

    impl OnnxNetwork {
        /// Load an ONNX graph from the network archive path
        pub fn load<P: AsRef<Path>>(path: P, threads: usize) -> Result<Self> {
            let path = path.as_ref();

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(threads)?
                .commit_from_file(path)
                .context(format!("Failed to load ONNX graph from {:?}", path))?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "input".to_string());
            let output_name = session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "output".to_string());

            info!(
                path = %path.display(),
                input = %input_name,
                output = %output_name,
                "ONNX sequence network loaded"
            );

            Ok(Self {
                session: Mutex::new(session),
                input_name,
                output_name,
            })
        }

        fn run(&self, input: &Array3<f64>) -> Result<Array2<f64>> {
            let (batch, steps, channels) = input.dim();
            let shape = vec![batch as i64, steps as i64, channels as i64];
            let data: Vec<f32> = input.iter().map(|v| *v as f32).collect();
            let tensor = Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;
            let output = outputs
                .get(self.output_name.as_str())
                .context("Missing network output")?;
            let (_, values) = output.try_extract_tensor::<f32>()?;

            let width = if batch == 0 { 0 } else { values.len() / batch };
            let values: Vec<f64> = values.iter().map(|v| *v as f64).collect();
            Ok(Array2::from_shape_vec((batch, width), values)?)
        }
    }

    impl SequenceNetwork for OnnxNetwork {
        fn predict(&self, input: &Array3<f64>) -> Result<Array2<f64>, ModelError> {
            self.run(input)
                .map_err(|e| ModelError::Compute(format!("{:#}", e)))
        }

        fn runtime(&self) -> &'static str {
            "onnx"
        }
    }
}
