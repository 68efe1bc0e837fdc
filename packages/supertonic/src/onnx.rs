//! ONNX Runtime backed stages.

use std::borrow::Cow;
use std::path::Path;

use ort::{
    session::{Session, SessionInputValue, builder::GraphOptimizationLevel},
    value::Tensor as OrtTensor,
};

use crate::config::{AssetPaths, EngineSettings};
use crate::error::StageError;
use crate::stage::{Stage, StageKind, StageLoader};
use crate::tensor::{NamedTensors, Tensor};

/// Session options applied to every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub intra_threads: usize,
    pub inter_threads: usize,
    pub optimization_level: u8,
}

impl From<&EngineSettings> for SessionOptions {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            intra_threads: settings.intra_threads.max(1),
            inter_threads: settings.inter_threads.max(1),
            optimization_level: settings.optimization_level,
        }
    }
}

fn optimization_level(level: u8) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// Creates an ONNX session for one stage model.
fn create_session(path: &Path, options: SessionOptions) -> Result<Session, StageError> {
    Session::builder()
        .map_err(|e| StageError::Load(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(optimization_level(options.optimization_level))
        .map_err(|e| StageError::Load(format!("Failed to set optimization level: {e}")))?
        .with_intra_threads(options.intra_threads)
        .map_err(|e| StageError::Load(format!("Failed to set intra threads: {e}")))?
        .with_inter_threads(options.inter_threads)
        .map_err(|e| StageError::Load(format!("Failed to set inter threads: {e}")))?
        .commit_from_file(path)
        .map_err(|e| StageError::Load(format!("Failed to load {}: {e}", path.display())))
}

/// One stage backed by an ONNX Runtime session.
pub struct OnnxStage {
    kind: StageKind,
    session: Session,
}

impl OnnxStage {
    pub fn load(kind: StageKind, path: &Path, options: SessionOptions) -> Result<Self, StageError> {
        let session = create_session(path, options)?;
        tracing::debug!(
            stage = kind.name(),
            inputs = ?session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            "onnx session created"
        );
        Ok(Self { kind, session })
    }
}

fn to_input(tensor: Tensor) -> Result<SessionInputValue<'static>, StageError> {
    let value = match tensor {
        Tensor::F32(array) => OrtTensor::from_array(array)
            .map_err(|e| StageError::Runtime(format!("Failed to create input tensor: {e}")))?
            .into_dyn(),
        Tensor::I64(array) => OrtTensor::from_array(array)
            .map_err(|e| StageError::Runtime(format!("Failed to create input tensor: {e}")))?
            .into_dyn(),
    };
    Ok(SessionInputValue::Owned(value))
}

impl Stage for OnnxStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn run(&mut self, inputs: NamedTensors) -> Result<NamedTensors, StageError> {
        for required in self.kind.input_names() {
            inputs.require(*required)?;
        }

        let mut feeds: Vec<(Cow<'static, str>, SessionInputValue<'static>)> =
            Vec::with_capacity(inputs.len());
        for (name, tensor) in inputs {
            feeds.push((Cow::Borrowed(name), to_input(tensor)?));
        }

        let name = self.kind.output_name();
        let outputs = self
            .session
            .run(feeds)
            .map_err(|e| StageError::Runtime(e.to_string()))?;
        // every stage graph has a single float output
        if outputs.len() == 0 {
            return Err(StageError::MissingOutput(name));
        }
        let primary = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|_| StageError::ElementType(name))?
            .to_owned();
        Ok(NamedTensors::new().with(name, primary))
    }
}

/// Loads each stage from `<asset dir>/<stage>.onnx`.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    paths: AssetPaths,
    options: SessionOptions,
}

impl OnnxLoader {
    pub fn new(paths: AssetPaths, settings: &EngineSettings) -> Self {
        Self {
            paths,
            options: SessionOptions::from(settings),
        }
    }
}

impl StageLoader for OnnxLoader {
    fn load(&self, kind: StageKind) -> Result<Box<dyn Stage>, StageError> {
        let path = self.paths.stage_model(kind);
        if !path.is_file() {
            return Err(StageError::Load(format!("model not found: {}", path.display())));
        }
        Ok(Box::new(OnnxStage::load(kind, &path, self.options)?))
    }
}
