// Resume analysis: pipeline orchestration, prompt formatting, and recovery of
// structured records from free-form model output.

pub mod handlers;
pub mod parser;
pub mod pipeline;
pub mod prompts;
