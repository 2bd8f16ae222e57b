//! Writing parsed content to disk.

pub mod attachment;
