//! Media handling: staged uploads, streamed audio downloads, WAV containers.

pub mod download;
pub mod upload;
pub mod wav;
