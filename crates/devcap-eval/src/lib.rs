//! # devcap-eval: Compliance Evaluation
//!
//! Evaluates composed plans against device snapshots and runs the
//! requirements the other way, as a simulation.
//!
//! - [`walker`]: the limit-type algebra applied across nested struct values.
//! - [`queue`]: queue-family assignment with carry-over.
//! - [`video`]: wildcard axis resolution of video-profile declarations.
//! - [`evaluator`]: the compliance evaluator producing a [`Verdict`].
//! - [`merge`]: folding blocks into one under a [`MergePolicy`].
//! - [`simulate`]: the override direction.
//! - [`config`]: [`EvaluatorConfig`].

pub mod config;
pub mod evaluator;
pub mod merge;
pub mod queue;
pub mod simulate;
pub mod video;
pub mod walker;

pub use config::{ConfigError, EvaluatorConfig, MergePolicy};
pub use evaluator::{BlockVerdict, Evaluator, SlotVerdict, Verdict};
pub use merge::{chosen_blocks, BlockMerger, MergeOutcome, RejectedBlock};
pub use queue::{assign, Assignment};
pub use simulate::{Simulation, Simulator};
pub use video::{Resolution, VideoResolver};
pub use walker::{overlay, FieldWalker, Merged};
