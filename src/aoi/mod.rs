//! AOI construction: concentric buffers and project assembly.

mod assembler;
mod builder;

pub use assembler::{
    assemble, generate_project, merge_edited_polygon, project_filename, slugify,
};
pub use builder::{build_buffers, build_center_feature, BufferSpec, MAX_DISTANCE_M, MIN_DISTANCE_M};
