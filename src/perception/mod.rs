pub mod canvas;
pub mod color_blocks;
pub mod color_space;
pub mod edges;
pub mod pipeline;
pub mod postprocess;
pub mod saliency;
pub mod splitter;
pub mod traits;
pub mod types;
