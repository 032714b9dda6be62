//! Shared helpers: lenient JSON/CSV value handling, flat-file I/O and
//! astronomical time.

pub mod fs;
pub mod serde;
pub mod time;
