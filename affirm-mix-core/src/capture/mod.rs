pub mod recorder;
pub mod tap;
pub mod wav_encoder;
