#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use super::yolo::{decode, letterbox_chw};
use crate::detect::backend::{DetectorBackend, ModelLoader};
use crate::detect::result::Candidate;
use crate::model_store::ModelStore;

/// Tract-based backend for YOLOv5 ONNX models.
///
/// Expects a `[1, 3, size, size]` f32 input and a `[1, rows, 5 + classes]`
/// output. Weights are loaded once; inference performs no I/O.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, iou_threshold: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold,
        })
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Candidate>> {
        let side = self.input_size as usize;
        let (chw, letterbox) = letterbox_chw(rgb, width, height, self.input_size)?;
        let input: Tensor = tract_ndarray::Array4::from_shape_vec((1, 3, side, side), chw)
            .context("failed to shape model input")?
            .into();
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let stride = *shape
            .last()
            .ok_or_else(|| anyhow!("model output has no dimensions"))?;
        let values: Vec<f32> = view.iter().copied().collect();

        decode(
            &values,
            stride,
            &letterbox,
            width,
            height,
            self.iou_threshold,
        )
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = vec![0u8; side as usize * side as usize * 3];
        self.infer(&blank, side, side).map(|_| ())
    }
}

/// Loader that resolves (and if needed downloads) the model file before building the plan.
pub struct TractLoader {
    store: ModelStore,
    input_size: u32,
    iou_threshold: f32,
}

impl TractLoader {
    pub fn new(store: ModelStore, input_size: u32, iou_threshold: f32) -> Self {
        Self {
            store,
            input_size,
            iou_threshold,
        }
    }
}

impl ModelLoader for TractLoader {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>> {
        let path = self.store.resolve()?;
        let backend = TractBackend::new(&path, self.input_size, self.iou_threshold)?;
        Ok(Box::new(backend))
    }
}
