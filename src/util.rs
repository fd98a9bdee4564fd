//! Shared utilities used by the index format code.

pub mod varint;
