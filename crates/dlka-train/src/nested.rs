//! Nested containers of training outputs and scalar logging.
//!
//! Training steps return heterogeneous trees of losses and metrics. A
//! [`Nested`] value holds such a tree; [`Nested::map`] and
//! [`Nested::try_map`] apply a leaf conversion while preserving structure.

use std::collections::BTreeMap;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

use crate::error::{Result, TrainError};

/// A leaf, a sequence or a string-keyed map of nested values.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Leaf(T),
    Seq(Vec<Nested<T>>),
    Map(BTreeMap<String, Nested<T>>),
}

impl<T> Nested<T> {
    /// Build a map node from key/value pairs.
    pub fn map_of<K: Into<String>>(entries: impl IntoIterator<Item = (K, Nested<T>)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a sequence of leaves.
    pub fn seq_of(leaves: impl IntoIterator<Item = T>) -> Self {
        Self::Seq(leaves.into_iter().map(Self::Leaf).collect())
    }

    /// Convert every leaf, keeping the tree shape.
    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Nested<U> {
        self.map_with(&mut f)
    }

    fn map_with<U, F: FnMut(T) -> U>(self, f: &mut F) -> Nested<U> {
        match self {
            Self::Leaf(value) => Nested::Leaf(f(value)),
            Self::Seq(items) => Nested::Seq(items.into_iter().map(|item| item.map_with(f)).collect()),
            Self::Map(entries) => Nested::Map(entries.into_iter().map(|(k, v)| (k, v.map_with(f))).collect()),
        }
    }

    /// Fallible [`Nested::map`]; stops at the first failing leaf.
    pub fn try_map<U, E, F: FnMut(T) -> std::result::Result<U, E>>(self, mut f: F) -> std::result::Result<Nested<U>, E> {
        self.try_map_with(&mut f)
    }

    fn try_map_with<U, E, F: FnMut(T) -> std::result::Result<U, E>>(
        self,
        f: &mut F,
    ) -> std::result::Result<Nested<U>, E> {
        Ok(match self {
            Self::Leaf(value) => Nested::Leaf(f(value)?),
            Self::Seq(items) => Nested::Seq(
                items
                    .into_iter()
                    .map(|item| item.try_map_with(f))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            Self::Map(entries) => Nested::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| v.try_map_with(f).map(|v| (k, v)))
                    .collect::<std::result::Result<_, _>>()?,
            ),
        })
    }
}

/// A scalar produced by a training step: a host float or a device tensor.
#[derive(Debug, Clone)]
pub enum ScalarValue<B: Backend> {
    Float(f64),
    Tensor(Tensor<B, 1>),
}

/// Read a single-element tensor back to the host.
pub fn scalar_to_float<B: Backend>(value: ScalarValue<B>) -> Result<f64> {
    match value {
        ScalarValue::Float(v) => Ok(v),
        ScalarValue::Tensor(t) => {
            let dims = t.dims();
            if dims != [1] {
                return Err(TrainError::NonScalarTensor(dims.to_vec()));
            }
            Ok(t.into_scalar().elem::<f64>())
        }
    }
}

/// Convert every leaf of a tree of scalars to `f64`.
pub fn tensor_to_float<B: Backend>(values: Nested<ScalarValue<B>>) -> Result<Nested<f64>> {
    values.try_map(scalar_to_float)
}

/// Flatten a map of scalars into `mode/key` names.
///
/// Sequence entries become `mode/key_idx`. Deeper nesting is rejected.
pub fn flatten_scalars(mode: &str, scalars: &Nested<f64>) -> Result<Vec<(String, f64)>> {
    let Nested::Map(entries) = scalars else {
        return Err(TrainError::invalid_shape("scalar outputs must be a map of names"));
    };

    let mut flat = Vec::new();
    for (key, value) in entries {
        match value {
            Nested::Leaf(v) => flat.push((format!("{}/{}", mode, key), *v)),
            Nested::Seq(items) => {
                for (idx, item) in items.iter().enumerate() {
                    let Nested::Leaf(v) = item else {
                        return Err(TrainError::invalid_shape(format!(
                            "scalar '{}' item {} is not a number",
                            key, idx
                        )));
                    };
                    flat.push((format!("{}/{}_{}", mode, key, idx), *v));
                }
            }
            Nested::Map(_) => {
                return Err(TrainError::invalid_shape(format!("scalar '{}' is a nested map", key)));
            }
        }
    }
    Ok(flat)
}

/// Emit a tree of scalars at `step` as `tracing` events and return the
/// flattened names.
pub fn log_scalars<B: Backend>(
    mode: &str,
    scalars: Nested<ScalarValue<B>>,
    step: usize,
) -> Result<Vec<(String, f64)>> {
    let flat = flatten_scalars(mode, &tensor_to_float(scalars)?)?;
    for (name, value) in &flat {
        tracing::info!(step, name = %name, value, "scalar");
    }
    Ok(flat)
}
