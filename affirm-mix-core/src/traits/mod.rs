pub mod mixer_delegate;
pub mod output_device;
pub mod source_loader;
