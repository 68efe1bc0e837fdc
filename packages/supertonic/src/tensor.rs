//! Flat tensors exchanged across stage boundaries.
//!
//! Storage is an `ndarray::ArrayD`: one contiguous buffer plus an explicit
//! shape/stride descriptor. Indexing is bounds-checked by ndarray.

use ndarray::{ArrayD, IxDyn};

use crate::error::StageError;

/// A dynamically shaped tensor of one of the element types the stages use.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    F32(ArrayD<f32>),
    I64(ArrayD<i64>),
}

impl Tensor {
    /// Build an `f32` tensor from a flat row-major buffer.
    pub fn from_f32(shape: &[usize], data: Vec<f32>) -> Result<Self, StageError> {
        let expected = shape.iter().product::<usize>();
        let actual = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Tensor::F32)
            .map_err(|e| {
                StageError::Runtime(format!(
                    "cannot view {actual} values as {shape:?} ({expected} expected): {e}"
                ))
            })
    }

    /// Build an `i64` tensor from a flat row-major buffer.
    pub fn from_i64(shape: &[usize], data: Vec<i64>) -> Result<Self, StageError> {
        let expected = shape.iter().product::<usize>();
        let actual = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Tensor::I64)
            .map_err(|e| {
                StageError::Runtime(format!(
                    "cannot view {actual} values as {shape:?} ({expected} expected): {e}"
                ))
            })
    }

    /// An `f32` tensor filled with ones.
    pub fn ones_f32(shape: &[usize]) -> Self {
        Tensor::F32(ArrayD::ones(IxDyn(shape)))
    }

    /// A rank-1, single element `f32` tensor.
    pub fn scalar_f32(value: f32) -> Self {
        Tensor::F32(ArrayD::from_elem(IxDyn(&[1]), value))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I64(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Tensor::F32(a) => a.len(),
            Tensor::I64(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::F32(a) => Some(a),
            Tensor::I64(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Tensor::I64(a) => Some(a),
            Tensor::F32(_) => None,
        }
    }

    /// Consume into an `f32` array, failing on an element-type mismatch.
    pub fn into_f32(self, name: &'static str) -> Result<ArrayD<f32>, StageError> {
        match self {
            Tensor::F32(a) => Ok(a),
            Tensor::I64(_) => Err(StageError::ElementType(name)),
        }
    }

    /// Check the tensor rank, optionally pinning individual dimensions.
    ///
    /// `None` entries in `dims` accept any extent.
    pub fn expect_dims(&self, name: &'static str, dims: &[Option<usize>]) -> Result<(), StageError> {
        let shape = self.shape();
        let matches = shape.len() == dims.len()
            && shape
                .iter()
                .zip(dims)
                .all(|(&actual, want)| want.is_none_or(|w| w == actual));
        if matches {
            return Ok(());
        }
        let expected = dims
            .iter()
            .map(|d| d.map_or_else(|| "_".to_string(), |v| v.to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        Err(StageError::Shape {
            name,
            actual: shape.to_vec(),
            expected: format!("[{expected}]"),
        })
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        Tensor::F32(value)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(value: ArrayD<i64>) -> Self {
        Tensor::I64(value)
    }
}

/// Ordered collection of tensors keyed by their graph input/output name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedTensors {
    entries: Vec<(&'static str, Tensor)>,
}

impl NamedTensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &'static str, tensor: impl Into<Tensor>) -> Self {
        self.insert(name, tensor);
        self
    }

    /// Insert or replace the tensor stored under `name`.
    pub fn insert(&mut self, name: &'static str, tensor: impl Into<Tensor>) {
        let tensor = tensor.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = tensor,
            None => self.entries.push((name, tensor)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    /// Borrow a required input.
    pub fn require(&self, name: &'static str) -> Result<&Tensor, StageError> {
        self.get(name).ok_or(StageError::MissingInput(name))
    }

    /// Remove and return a required output.
    pub fn take(&mut self, name: &'static str) -> Result<Tensor, StageError> {
        let pos = self
            .entries
            .iter()
            .position(|(n, _)| *n == name)
            .ok_or(StageError::MissingOutput(name))?;
        Ok(self.entries.remove(pos).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for NamedTensors {
    type Item = (&'static str, Tensor);
    type IntoIter = std::vec::IntoIter<(&'static str, Tensor)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
