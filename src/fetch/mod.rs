//! External content fetch adapters.
//!
//! Thin wrappers over the reader endpoint (web pages) and the transcript
//! provider (YouTube captions). Both return raw text for the ingestion
//! pipeline; neither chunks or embeds anything itself.

mod transcript;
mod web;

pub use transcript::{
    canonical_video_url, extract_video_id, ChannelVideo, TranscriptClient, TranscriptFetcher,
    TranscriptResult,
};
pub use web::{PageFetcher, WebFetcher, WebPage};
