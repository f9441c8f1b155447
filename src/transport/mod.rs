//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait. Platform session stacks live outside this crate and
//! implement the trait themselves; the in-memory session is the reference
//! implementation and the one the tests run against.

mod memory;

pub use memory::MemorySession;
