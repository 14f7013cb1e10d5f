//! Dense projection head applied after pooling.
//!
//! sentence-transformers models such as distiluse end with a `Dense` module
//! (`2_Dense/`) that maps the pooled transformer output to the sentence
//! embedding: `activation(W x + b)`. ONNX exports only carry the transformer,
//! so the head is loaded from its own `config.json` and `model.safetensors`.

use anyhow::{Context, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

const WEIGHT_TENSOR: &str = "linear.weight";
const BIAS_TENSOR: &str = "linear.bias";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Identity,
}

impl Activation {
    /// Parse the torch class path stored in `activation_function`.
    fn from_torch(name: &str) -> Result<Self> {
        match name.rsplit('.').next().unwrap_or(name) {
            "Tanh" => Ok(Self::Tanh),
            "Identity" => Ok(Self::Identity),
            other => anyhow::bail!("unsupported dense activation: {other}"),
        }
    }

    fn apply(self, x: f32) -> f32 {
        match self {
            Self::Tanh => x.tanh(),
            Self::Identity => x,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DenseConfig {
    in_features: usize,
    out_features: usize,
    #[serde(default = "default_bias")]
    bias: bool,
    #[serde(default = "default_activation")]
    activation_function: String,
}

fn default_bias() -> bool {
    true
}

fn default_activation() -> String {
    "torch.nn.modules.activation.Tanh".into()
}

#[derive(Debug)]
pub struct DenseHead {
    /// `out_features x in_features`, torch `nn.Linear` layout.
    weight: Array2<f32>,
    bias: Option<Array1<f32>>,
    activation: Activation,
}

impl DenseHead {
    pub fn new(weight: Array2<f32>, bias: Option<Array1<f32>>, activation: Activation) -> Result<Self> {
        if let Some(bias) = &bias {
            anyhow::ensure!(
                bias.len() == weight.nrows(),
                "dense bias has {} values, weight has {} rows",
                bias.len(),
                weight.nrows()
            );
        }
        Ok(Self {
            weight,
            bias,
            activation,
        })
    }

    /// Load `config.json` and `model.safetensors` from a `2_Dense` directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        let config: DenseConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?,
        )
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let weights_path = dir.join(WEIGHTS_FILE);
        let bytes = std::fs::read(&weights_path)
            .with_context(|| format!("failed to read {}", weights_path.display()))?;
        let mut tensors = read_safetensors(&bytes)
            .with_context(|| format!("failed to parse {}", weights_path.display()))?;

        let (shape, data) = tensors
            .remove(WEIGHT_TENSOR)
            .with_context(|| format!("{} has no {WEIGHT_TENSOR}", weights_path.display()))?;
        anyhow::ensure!(
            shape == [config.out_features, config.in_features],
            "{WEIGHT_TENSOR} has shape {shape:?}, config says [{}, {}]",
            config.out_features,
            config.in_features
        );
        let weight = Array2::from_shape_vec((config.out_features, config.in_features), data)?;

        let bias = if config.bias {
            let (shape, data) = tensors
                .remove(BIAS_TENSOR)
                .with_context(|| format!("{} has no {BIAS_TENSOR}", weights_path.display()))?;
            anyhow::ensure!(
                shape == [config.out_features],
                "{BIAS_TENSOR} has shape {shape:?}, expected [{}]",
                config.out_features
            );
            Some(Array1::from_vec(data))
        } else {
            None
        };

        let head = Self::new(weight, bias, Activation::from_torch(&config.activation_function)?)?;
        tracing::info!(
            in_features = head.in_features(),
            out_features = head.out_features(),
            activation = ?head.activation,
            "dense head loaded"
        );
        Ok(head)
    }

    pub fn in_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.nrows()
    }

    /// Project one pooled vector.
    pub fn apply(&self, pooled: &[f32]) -> Result<Vec<f32>> {
        anyhow::ensure!(
            pooled.len() == self.in_features(),
            "dense head expects {} inputs, got {}",
            self.in_features(),
            pooled.len()
        );
        let mut out = self.weight.dot(&ArrayView1::from(pooled));
        if let Some(bias) = &self.bias {
            out += bias;
        }
        Ok(out.iter().map(|&x| self.activation.apply(x)).collect())
    }
}

#[derive(Debug, Deserialize)]
struct TensorInfo {
    dtype: String,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Decode every F32 tensor of a safetensors buffer into `(shape, values)`.
///
/// Layout: little-endian `u64` header length, JSON header, raw tensor bytes.
fn read_safetensors(bytes: &[u8]) -> Result<BTreeMap<String, (Vec<usize>, Vec<f32>)>> {
    anyhow::ensure!(bytes.len() >= 8, "file too short for a safetensors header");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let header_len = usize::try_from(u64::from_le_bytes(len))?;
    let data_start = 8usize
        .checked_add(header_len)
        .filter(|&end| end <= bytes.len())
        .context("safetensors header runs past end of file")?;

    let header: BTreeMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..data_start])?;
    let data = &bytes[data_start..];

    let mut tensors = BTreeMap::new();
    for (name, value) in header {
        if name == "__metadata__" {
            continue;
        }
        let info: TensorInfo = serde_json::from_value(value)
            .with_context(|| format!("bad header entry for {name}"))?;
        anyhow::ensure!(info.dtype == "F32", "{name}: unsupported dtype {}", info.dtype);

        let [start, end] = info.data_offsets;
        anyhow::ensure!(
            start <= end && end <= data.len(),
            "{name}: offsets {start}..{end} outside {} data bytes",
            data.len()
        );
        let raw = &data[start..end];
        let count: usize = info.shape.iter().product();
        anyhow::ensure!(
            raw.len() == count * 4,
            "{name}: {} bytes for shape {:?}",
            raw.len(),
            info.shape
        );
        let values = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        tensors.insert(name, (info.shape, values));
    }
    Ok(tensors)
}
