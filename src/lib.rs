//! Batch audio conversion service: uploads in, converted files and an
//! optional zip out, served back per batch.

pub mod api;
pub mod batch;
pub mod config;
pub mod errors;
pub mod formats;
pub mod processors;
pub mod state;
pub mod utils;

pub use batch::{BatchPipeline, BatchResult, ConversionRequest, UploadedFile};
pub use config::Config;
pub use errors::{AudioResult, ConvertError};
