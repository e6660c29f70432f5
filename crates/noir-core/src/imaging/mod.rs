//! Image handling: discovery, validation, normalization, and cropping.

mod decode;

pub mod crop;
pub mod discovery;
pub mod preprocess;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use crop::{crop_window, CropWindow, Cropper};
pub use decode::{decode_bytes, encode_jpeg, DecodedImage};
pub use discovery::{DiscoveredFile, FileDiscovery, SUPPORTED_EXTENSIONS};
pub use preprocess::Preprocessor;
pub use validate::Validator;
