//! 输出 COLMAP 稀疏模型 (文本格式)
//!
//! https://colmap.github.io/format.html
mod colmap;

pub use colmap::{ColmapWriter, ModelSummary};
