//! Gate-time estimation and shortest gate sequences between hyperfine-Zeeman
//! sublevels of ultracold diatomic molecules, across a magnetic-field sweep.

pub mod utils;
pub mod error;
pub mod spin;
pub mod labels;
pub mod transitions;
pub mod sampler;
pub mod gate_time;
pub mod planner;
pub mod pipeline;
pub mod archive;
pub mod analysis;
pub mod config;

#[doc(hidden)]
pub use ndarray_npy;

pub use error::{ Error, Result, SampleFailure };
pub use labels::{ LabelSpace, StateLabel };
pub use transitions::TransitionGraph;
pub use sampler::{ FieldData, FieldGrid };
pub use pipeline::{ Precomputed, precompute };
