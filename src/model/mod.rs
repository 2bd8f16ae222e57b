//! Core data model types: the parsed email, its headers, files and addresses.

pub mod address;
pub mod content;
pub mod file;
pub mod mail;
