// src/readers/mod.rs

//! "Readers" for _evlrlib_.
//!
//! ## Overview of readers
//!
//! * An [`EventLogReader`] drives an [`EventLogSource`] to derive
//!   [`EventLogRecord`s].
//!
//! <br/>
//!
//! * An `EventLogSource` is the abstract "read the next chunk of records"
//!   log primitive, modeled on `ReadEventLog`. It only handles `u8` bytes
//!   and knows nothing of record framing.
//! * An `EventLogReader` owns the growable read buffer, grows it on
//!   buffer-too-small read outcomes, frames the returned bytes into
//!   records, and presents a pull-based record sequence with a fixed
//!   traversal [`Direction`].
//! * A [`FileEventLog`] is the file-backed `EventLogSource` over an
//!   exported log file of concatenated records.
//!
//! <br/>
//!
//! _These are not rust "Readers"; these structs do not implement the trait
//! [`Read`]. These are "readers" in an informal sense._
//!
//! [`EventLogReader`]: crate::readers::eventlogreader::EventLogReader
//! [`EventLogSource`]: crate::readers::eventlogreader::EventLogSource
//! [`Direction`]: crate::readers::eventlogreader::Direction
//! [`FileEventLog`]: crate::readers::filelog::FileEventLog
//! [`EventLogRecord`s]: crate::data::eventlog::EventLogRecord
//! [`Read`]: std::io::Read

pub mod eventlogreader;
pub mod filelog;
pub mod helpers;
