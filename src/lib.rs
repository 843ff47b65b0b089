//! Procedural texture generation as a replayable operation pipeline.
//!
//! A pipeline is an ordered stack of [`ops::Operation`] layers over a pair of
//! square RGBA buffers (`left` for generators, `right` for compositors).
//! Every operation is deterministic per seed and memoizes its last result, so
//! replaying the stack after an edit only recomputes from the edit downwards.
//! Pipelines persist as JSON and render to PNG.

pub mod canvas;
pub mod cli;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod params;
pub mod pipeline;
pub mod sprites;

pub use canvas::ImagePair;
pub use error::{Error, Result};
pub use ops::{OpContext, OpKind, Operation};
pub use params::Parameters;
pub use pipeline::{Layer, OperationStack};
pub use sprites::SpriteRepository;
