//! Audio ingestion and feature extraction.

pub mod features;
pub mod wav;
