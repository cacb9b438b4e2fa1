//! Text extraction from uploaded file-field blobs: PDF, DOCX, and image
//! content types each get dedicated handling; anything else degrades to
//! a generic placeholder chunk naming the file. See `extract_and_chunk`
//! for the orchestrator that ties extraction to §4.3 chunking.

pub mod docx;
pub mod extract;
pub mod pdf;
pub mod raster;
pub mod vision;

pub use extract::{extract_and_chunk, fallback_chunk};
pub use vision::{GeminiVisionService, VisionService};
