//! Retrieval-augmented answering.
//!
//! The engine turns a question plus retrieved chunk texts (and optional
//! auxiliary context) into a grounded answer, streamed or blocking. The
//! service wires embedding, retrieval, answering, follow-up suggestions
//! and question logging into the full ask flow.

mod engine;
mod logger;
mod service;
mod suggest;

pub use engine::{AnswerEngine, AnswerStream, OUT_OF_SCOPE_MESSAGE};
pub use logger::QuestionLogger;
pub use service::{AnswerEvent, QaService};
pub use suggest::SuggestionGenerator;
