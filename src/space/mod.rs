//! The scrollable tiling space: workspaces of columns of tiles, laid out per output.

pub mod workspace;
