//! I/O collaborators of the substitution engine.
//!
//! Sources: stdin, local files (globs, directories), remote URLs.
//! Exec: piping substituted manifests into the apply command.

pub mod error;
pub mod exec;
pub mod join;
pub mod remote;
pub mod sources;

pub use {
    error::SourceError,
    exec::{ExecOpts, ExecResult, exec_with_stdin, find_program},
    join::{DOCUMENT_SEPARATOR, join_documents, read_source},
    remote::fetch_remote,
    sources::{MANIFEST_EXTENSIONS, Source, resolve_sources},
};
