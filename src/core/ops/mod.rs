//! core::ops
//!
//! Write coordination for repairs.
//!
//! # Modules
//!
//! - [`atomic`] - Temp file and rename writes
//! - [`lock`] - Corpus lock and per-path mutexes
//!
//! # Architecture
//!
//! Every repair run:
//! 1. Acquires the exclusive corpus lock
//! 2. Takes the path mutex of each file before writing it
//! 3. Writes through a temp file and rename
//! 4. Releases the corpus lock on drop

pub mod atomic;
pub mod lock;

pub use atomic::write_atomic;
pub use lock::{CorpusLock, LockError, PathLocks};
