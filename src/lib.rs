//! Core engine for `cardboard`, a scrollable-tiling Wayland compositor.
//!
//! This crate is split into the parts that make up the single-threaded event loop: output and
//! view bookkeeping ([`output`], [`window`], [`surface_manager`]), the tiling layout
//! ([`space`], [`layer`]), input focus and interactive grabs ([`seat`]), command parsing and
//! dispatch ([`command`]), the move/resize animation queue ([`animation`]), and the boundary to
//! whatever display-server backend drives it ([`backend`]).

pub mod animation;
pub mod backend;
pub mod command;
pub mod ipc;
pub mod layer;
pub mod output;
pub mod seat;
pub mod space;
pub mod state;
pub mod surface_manager;
pub mod utils;
pub mod view_operations;
pub mod window;
