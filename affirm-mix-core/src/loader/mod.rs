pub mod decoder;
pub mod decoding_loader;
pub mod handles;

pub use decoding_loader::DecodingLoader;
pub use handles::{HandleRegistry, TempHandle};
