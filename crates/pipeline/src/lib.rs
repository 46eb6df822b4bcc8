//! Generation orchestration.
//!
//! [`generation::GenerationPipeline`] runs one prompt through
//! submit -> sample -> poll. A [`runner::JobRunner`] decides how prompts
//! reach the pipeline: inline on the caller's task, or through the
//! rate-limited FIFO in [`serialized::SerializedRunner`].

pub mod generation;
pub mod runner;
pub mod serialized;

#[cfg(test)]
mod test_support;
