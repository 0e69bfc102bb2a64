//! Neural network models run on captured frames.
//!
//! Both models are ONNX graphs executed with `tract`. The classifier follows the
//! Teachable Machine image export (NHWC input scaled to `[-1, 1]`, one softmax
//! output per label). The pose model is a single-person network with NHWC input
//! in `[0, 255]` and a `[1, 1, 17, 3]` output of `(y, x, score)` rows in
//! normalized coordinates.
use std::path::Path;

use anyhow::{ensure, Context, Result};
use common::inference::{InferOutput, Keypoint, Prediction};
use image::RgbImage;
use ndarray::s;
use serde::Deserialize;
use tract_onnx::prelude::*;

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Body parts in pose model output order.
pub const KEYPOINT_PARTS: [&str; 17] = [
    "nose",
    "leftEye",
    "rightEye",
    "leftEar",
    "rightEar",
    "leftShoulder",
    "rightShoulder",
    "leftElbow",
    "rightElbow",
    "leftWrist",
    "rightWrist",
    "leftHip",
    "rightHip",
    "leftKnee",
    "rightKnee",
    "leftAnkle",
    "rightAnkle",
];

pub trait InferModel: Send + Sync {
    fn run(&self, frame: &RgbImage) -> Result<InferOutput>;
}

/// Model description shipped next to a Teachable Machine export.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    pub labels: Vec<String>,
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    #[serde(default)]
    pub model_name: Option<String>,
}

fn default_image_size() -> u32 {
    224
}

impl ModelMetadata {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read metadata {}", path.display()))?;
        let metadata: ModelMetadata = serde_json::from_slice(&data)
            .with_context(|| format!("invalid metadata {}", path.display()))?;
        ensure!(!metadata.labels.is_empty(), "metadata lists no labels");
        Ok(metadata)
    }
}

pub struct ClassifierModel {
    model: NnModel,
    labels: Vec<String>,
    size: u32,
}

impl ClassifierModel {
    pub fn new(model_path: impl AsRef<Path>, metadata: ModelMetadata) -> Result<Self> {
        let size = metadata.image_size;
        let model = get_model(model_path.as_ref(), size)?;
        log::info!(
            "Loaded classifier {} with {} labels",
            metadata.model_name.as_deref().unwrap_or("<unnamed>"),
            metadata.labels.len()
        );

        Ok(Self {
            model,
            labels: metadata.labels,
            size,
        })
    }
}

impl InferModel for ClassifierModel {
    fn run(&self, frame: &RgbImage) -> Result<InferOutput> {
        ensure!(!is_empty(frame), "captured frame is empty");
        let input = tvec!(classifier_input(frame, self.size).into());
        let raw_nn_out = self.model.run(input)?;
        let predictions = decode_classes(&raw_nn_out[0], &self.labels)?;

        Ok(InferOutput::Classes(predictions))
    }
}

pub struct PoseModel {
    model: NnModel,
    size: u32,
}

impl PoseModel {
    pub fn new(model_path: impl AsRef<Path>, size: u32) -> Result<Self> {
        let model = get_model(model_path.as_ref(), size)?;
        log::info!("Loaded pose model with {size}x{size} input");

        Ok(Self { model, size })
    }
}

impl InferModel for PoseModel {
    fn run(&self, frame: &RgbImage) -> Result<InferOutput> {
        ensure!(!is_empty(frame), "captured frame is empty");
        let input = tvec!(pose_input(frame, self.size).into());
        let raw_nn_out = self.model.run(input)?;
        let keypoints = decode_keypoints(&raw_nn_out[0], frame.width(), frame.height())?;

        Ok(InferOutput::Pose(keypoints))
    }
}

fn is_empty(frame: &RgbImage) -> bool {
    frame.width() == 0 || frame.height() == 0
}

fn get_model(path: &Path, size: u32) -> Result<NnModel> {
    let input_fact =
        InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size as usize, size as usize, 3));
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to read model {}", path.display()))?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

fn resized(frame: &RgbImage, size: u32) -> RgbImage {
    image::imageops::resize(frame, size, size, image::imageops::FilterType::Triangle)
}

/// NHWC tensor with pixel values scaled to `[-1, 1]`.
fn classifier_input(frame: &RgbImage, size: u32) -> Tensor {
    let resized = resized(frame, size);
    tract_ndarray::Array4::from_shape_fn(
        (1, size as usize, size as usize, 3),
        |(_, y, x, c)| resized[(x as _, y as _)][c] as f32 / 127.5 - 1.0,
    )
    .into()
}

/// NHWC tensor with raw pixel values.
fn pose_input(frame: &RgbImage, size: u32) -> Tensor {
    let resized = resized(frame, size);
    tract_ndarray::Array4::from_shape_fn(
        (1, size as usize, size as usize, 3),
        |(_, y, x, c)| resized[(x as _, y as _)][c] as f32,
    )
    .into()
}

/// Pair every label with its score, keeping output order.
fn decode_classes(output: &Tensor, labels: &[String]) -> Result<Vec<Prediction>> {
    let scores: Vec<f32> = output.to_array_view::<f32>()?.iter().copied().collect();
    ensure!(
        scores.len() == labels.len(),
        "model returned {} scores for {} labels",
        scores.len(),
        labels.len()
    );

    Ok(labels
        .iter()
        .zip(scores)
        .map(|(label, probability)| Prediction::new(label.as_str(), probability))
        .collect())
}

/// Scale normalized keypoints to the pixel frame of the captured image.
fn decode_keypoints(output: &Tensor, width: u32, height: u32) -> Result<Vec<Keypoint>> {
    let view = output.to_array_view::<f32>()?;
    ensure!(
        view.shape() == [1, 1, KEYPOINT_PARTS.len(), 3],
        "unexpected pose output shape {:?}",
        view.shape()
    );

    let rows = view.slice(s![0, 0, .., ..]);
    let (width, height) = (width as f32, height as f32);

    Ok(rows
        .outer_iter()
        .zip(KEYPOINT_PARTS)
        .map(|(row, part): (ndarray::ArrayView1<f32>, &str)| Keypoint::new(part, row[1] * width, row[0] * height, row[2]))
        .collect())
}

#[cfg(test)]
mod test {

    use image::Rgb;

    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn metadata_defaults_image_size() -> Result<()> {
        let json = r#"{"labels": ["Perro", "Gato"], "modelName": "tm-my-image-model"}"#;
        let metadata: ModelMetadata = serde_json::from_str(json)?;

        assert_eq!(metadata.labels, labels(&["Perro", "Gato"]));
        assert_eq!(metadata.image_size, 224);
        assert_eq!(metadata.model_name.as_deref(), Some("tm-my-image-model"));

        Ok(())
    }

    #[test]
    fn metadata_without_labels_is_rejected() -> Result<()> {
        let path = std::env::temp_dir().join(format!("snapcam-meta-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"labels": [], "imageSize": 96}"#)?;

        let result = ModelMetadata::from_path(&path);
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn classifier_input_is_nhwc_in_unit_range() -> Result<()> {
        let frame = RgbImage::from_pixel(10, 20, Rgb([0, 255, 0]));
        let tensor = classifier_input(&frame, 8);

        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        let view = tensor
            .to_array_view::<f32>()?
            .into_dimensionality::<tract_ndarray::Ix4>()?;
        // Resampling may lose one level on saturated channels.
        assert!((view[[0, 3, 3, 0]] + 1.0).abs() < 0.01);
        assert!((view[[0, 3, 3, 1]] - 1.0).abs() < 0.01);

        Ok(())
    }

    #[test]
    fn pose_input_keeps_pixel_values() -> Result<()> {
        let frame = RgbImage::from_pixel(4, 4, Rgb([12, 34, 56]));
        let tensor = pose_input(&frame, 4);

        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        let view = tensor
            .to_array_view::<f32>()?
            .into_dimensionality::<tract_ndarray::Ix4>()?;
        assert!((view[[0, 1, 2, 2]] - 56.0).abs() <= 1.0);

        Ok(())
    }

    #[test]
    fn classes_keep_output_order() -> Result<()> {
        let output: Tensor = tract_ndarray::arr2(&[[0.2f32, 0.7, 0.1]]).into();

        let predictions = decode_classes(&output, &labels(&["A", "B", "C"]))?;

        assert_eq!(
            predictions,
            vec![
                Prediction::new("A", 0.2),
                Prediction::new("B", 0.7),
                Prediction::new("C", 0.1),
            ]
        );
        Ok(())
    }

    #[test]
    fn class_count_must_match_labels() {
        let output: Tensor = tract_ndarray::arr2(&[[0.5f32, 0.5]]).into();
        assert!(decode_classes(&output, &labels(&["A", "B", "C"])).is_err());
    }

    #[test]
    fn keypoints_are_scaled_to_frame() -> Result<()> {
        let mut data = vec![0.0f32; KEYPOINT_PARTS.len() * 3];
        // nose at 25% height, 50% width
        data[0..3].copy_from_slice(&[0.25, 0.5, 0.9]);
        // right ankle in the bottom right corner
        data[48..51].copy_from_slice(&[1.0, 1.0, 0.3]);
        let output: Tensor =
            tract_ndarray::Array4::from_shape_vec((1, 1, KEYPOINT_PARTS.len(), 3), data)?.into();

        let keypoints = decode_keypoints(&output, 640, 480)?;

        assert_eq!(keypoints.len(), 17);
        assert_eq!(keypoints[0], Keypoint::new("nose", 320.0, 120.0, 0.9));
        assert_eq!(keypoints[16], Keypoint::new("rightAnkle", 640.0, 480.0, 0.3));
        Ok(())
    }

    #[test]
    fn wrong_pose_shape_is_rejected() {
        let output: Tensor = tract_ndarray::arr2(&[[0.5f32, 0.5, 0.5]]).into();
        assert!(decode_keypoints(&output, 10, 10).is_err());
    }

    #[test]
    fn missing_model_file_fails_to_load() {
        assert!(PoseModel::new("does-not-exist.onnx", 192).is_err());
    }
}
