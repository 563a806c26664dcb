//! Socratic Loom - Socratic synthesis dialogue engine
//!
//! Guides a student toward a thesis that connects two to four topics. Each turn
//! is generated by an LLM under a strict response contract, validated, retried
//! with backoff when the backend misbehaves, and cross-checked before a thesis
//! is accepted.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
