//! Input event wire format
//!
//! - Fixed-layout record codec shared by reads and synthetic writes
//! - Protocol constant tables

pub mod codes;
pub mod record;

pub use record::{EventRecord, RECORD_SIZE};
