//! Image stages and the per-image orchestrator.
pub mod background;
pub mod collage;
pub mod crop;
pub mod merge;
pub mod padding;
pub mod perimeter;
pub mod pipeline;
pub mod resize;
pub mod tone;
pub mod whitening;
