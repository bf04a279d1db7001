//! Tests for the descriptor-generation stage.

pub mod common;
