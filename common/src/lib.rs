//! Data model shared between the model wrappers and the renderers of `snapcam`.
pub mod inference;
