// src/data/mod.rs

//! The _data_ defined by _evlrlib_.
//!
//! * An [`EventLogRecord`] is one decoded classic Windows Event Log record.
//!
//! [`EventLogRecord`]: crate::data::eventlog::EventLogRecord

pub mod eventlog;
