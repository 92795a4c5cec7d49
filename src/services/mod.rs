pub mod gemini;
pub mod workflow;
