//! I/O layer: input discovery and limited decoding (`decode`), plus the
//! `writers` that name, flatten and encode final outputs.
pub mod decode;
pub use decode::{DecodeLimits, decode_image, discover_inputs, is_supported_input};

pub mod writers;
