// src/data/eventlog.rs

//! Implement [`EventLogRecord`], one decoded classic [Windows Event Log]
//! record, and the framing decoder that derives it from a raw byte buffer.
//!
//! The byte layout decoded here is the [`EVENTLOGRECORD`] layout: a 56 byte
//! fixed header of little-endian length, offset, and count fields, followed
//! by the NUL-terminated UTF-16LE source and computer names, an optional
//! security identifier, optional NUL-terminated UTF-16LE message
//! substitution strings, optional event-specific binary data, and a trailing
//! copy of the `Length` field ("_stored at both ends of the entry to ease
//! moving forward or backward through the log_").
//!
//! The layout is an external bit-exact contract; nothing here is free to
//! redesign it.
//!
//! [Windows Event Log]: https://learn.microsoft.com/en-us/windows/win32/eventlog/event-logging
//! [`EVENTLOGRECORD`]: https://learn.microsoft.com/en-us/windows/win32/api/winnt/ns-winnt-eventlogrecord

use std::fmt;
use std::io::{
    Error,
    ErrorKind,
    Result,
};

use ::chrono::{
    DateTime,
    Utc,
};
use ::encoding_rs::UTF_16LE;
#[allow(unused_imports)]
use ::more_asserts::{
    debug_assert_ge,
    debug_assert_le,
    debug_assert_lt,
};
#[allow(unused_imports)]
use ::si_trace_print::{
    defn,
    defo,
    defx,
    defñ,
    den,
    deo,
    dex,
};

use crate::common::{
    BufferOffset,
    Bytes,
};

// ----------------
// EVENTLOGRECORD layout

/// Size of the fixed `EVENTLOGRECORD` header in bytes.
///
/// The source name begins at this offset within a record.
pub const RECORD_HEADER_SZ: usize = 56;

/// Value of the `Reserved` header field; `"LfLe"` as raw bytes.
pub const RECORD_MAGIC: u32 = 0x654c664c;

/// Smallest possible `Length` value: the fixed header, two empty
/// NUL-terminated wide strings (source name, computer name), and the
/// trailing `Length` copy.
pub const RECORD_SZ_MIN: usize = RECORD_HEADER_SZ + 2 + 2 + 4;

// `EVENTLOGRECORD` header field offsets, from the start of a record.
const OFF_LENGTH: usize = 0;
const OFF_RESERVED: usize = 4;
const OFF_RECORD_NUMBER: usize = 8;
const OFF_TIME_GENERATED: usize = 12;
const OFF_TIME_WRITTEN: usize = 16;
const OFF_EVENT_ID: usize = 20;
const OFF_EVENT_TYPE: usize = 24;
const OFF_NUM_STRINGS: usize = 26;
const OFF_EVENT_CATEGORY: usize = 28;
const OFF_STRING_OFFSET: usize = 36;
const OFF_DATA_LENGTH: usize = 48;
const OFF_DATA_OFFSET: usize = 52;

/// Record sequence number within one log; the `RecordNumber` field.
pub type RecordNumber = u32;
/// Source-specific event identifier; the `EventID` field.
pub type EventId = u32;
/// Seconds since the Unix epoch; fields `TimeGenerated` and `TimeWritten`.
pub type EpochSeconds = u32;

/// `u16` at `at` within `buffer`, little-endian.
///
/// Caller must have verified `at + 2 <= buffer.len()`.
#[inline(always)]
fn u16_at(
    buffer: &[u8],
    at: usize,
) -> u16 {
    debug_assert_le!(at + 2, buffer.len());
    u16::from_le_bytes([buffer[at], buffer[at + 1]])
}

/// `u32` at `at` within `buffer`, little-endian.
///
/// Caller must have verified `at + 4 <= buffer.len()`.
#[inline(always)]
fn u32_at(
    buffer: &[u8],
    at: usize,
) -> u32 {
    debug_assert_le!(at + 4, buffer.len());
    u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

/// Decode the NUL-terminated UTF-16LE string within `buffer[at‥end]`.
///
/// Returns the decoded string and the count of bytes consumed, including
/// the two NUL bytes. Returns `None` if no NUL terminator occurs before
/// `end` (or before the last whole `u16` unit).
fn wide_str_at(
    buffer: &[u8],
    at: usize,
    end: usize,
) -> Option<(String, usize)> {
    let mut at_ = at;
    while at_ + 2 <= end {
        if buffer[at_] == 0 && buffer[at_ + 1] == 0 {
            let (cow, _had_errors) = UTF_16LE.decode_without_bom_handling(&buffer[at..at_]);

            return Some((cow.into_owned(), (at_ + 2) - at));
        }
        at_ += 2;
    }

    None
}

/// helper to create a "decode error" `Error` with a consistent message prefix
fn err_decode(mesg: String) -> Error {
    Error::new(ErrorKind::InvalidData, format!("record decode error: {}", mesg))
}

// ----------------
// EventLogType

/// Severity classification of an [`EventLogRecord`]; the `EventType` field.
///
/// Mapping follows `WinNT.h`: `EVENTLOG_SUCCESS` (0) and
/// `EVENTLOG_INFORMATION_TYPE` (4) both classify as `Informational`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventLogType {
    Informational,
    Error,
    Warning,
    AuditSuccess,
    AuditFailure,
}

impl EventLogType {
    /// Classify a raw `EventType` field value.
    ///
    /// Returns `None` for values `WinNT.h` does not define.
    pub const fn from_raw(value: u16) -> Option<EventLogType> {
        match value {
            0 | 4 => Some(EventLogType::Informational),
            1 => Some(EventLogType::Error),
            2 => Some(EventLogType::Warning),
            8 => Some(EventLogType::AuditSuccess),
            16 => Some(EventLogType::AuditFailure),
            _ => None,
        }
    }
}

impl fmt::Display for EventLogType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            EventLogType::Informational => write!(f, "Informational"),
            EventLogType::Error => write!(f, "Error"),
            EventLogType::Warning => write!(f, "Warning"),
            EventLogType::AuditSuccess => write!(f, "AuditSuccess"),
            EventLogType::AuditFailure => write!(f, "AuditFailure"),
        }
    }
}

// ----------------
// EventLogRecord

/// One decoded classic [Windows Event Log] record.
///
/// Constructed transiently per record by [`decode_at`]; immutable once
/// constructed.
///
/// [Windows Event Log]: https://learn.microsoft.com/en-us/windows/win32/eventlog/event-logging
/// [`decode_at`]: EventLogRecord::decode_at
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EventLogRecord {
    /// The `RecordNumber` field; monotonic within one log.
    record_number: RecordNumber,
    /// The `TimeGenerated` field.
    time_generated: EpochSeconds,
    /// The `TimeWritten` field.
    time_written: EpochSeconds,
    /// The `EventID` field.
    event_id: EventId,
    /// Classified `EventType` field.
    event_type: EventLogType,
    /// The `EventCategory` field; meaning depends on the event source.
    event_category: u16,
    /// Source name; the first wide string after the fixed header.
    source: String,
    /// Computer name; the second wide string after the fixed header.
    computer: String,
    /// Event-specific binary data.
    ///
    /// `Some` if and only if the `DataLength` field is greater than zero.
    data: Option<Bytes>,
    /// Message substitution strings.
    ///
    /// `Some` if and only if the `NumStrings` field is greater than zero.
    strings: Option<Vec<String>>,
    /// The `Length` field; total record size in bytes, including the
    /// trailing `Length` copy and any alignment padding. The cursor
    /// advance-by value.
    length: u32,
}

impl fmt::Debug for EventLogRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("EventLogRecord")
            .field("RecordNumber", &self.record_number)
            .field("EventID", &self.event_id)
            .field("EventType", &self.event_type)
            .field("Source", &self.source)
            .field("Length", &self.length)
            .finish()
    }
}

impl EventLogRecord {
    /// Decode one record within `buffer` starting at `offset`.
    ///
    /// `offset` must point at a record boundary; `buffer` must end at the
    /// last _populated_ byte (not at the allocation capacity) so declared
    /// lengths can be validated against bytes actually read.
    ///
    /// All length and offset fields are validated before any slicing.
    /// Any inconsistency is a fatal decode error ([`ErrorKind::InvalidData`]);
    /// in particular a `Length` of zero, which could never advance a cursor.
    /// The one tolerated shortfall: if fewer NUL-terminated strings are
    /// found than `NumStrings` declares then the shorter list is kept.
    ///
    /// Advance a record cursor by [`length()`] bytes to reach the
    /// next record.
    ///
    /// [`length()`]: EventLogRecord::length
    pub fn decode_at(
        buffer: &[u8],
        offset: BufferOffset,
    ) -> Result<EventLogRecord> {
        defn!("(buffer len {}, offset {})", buffer.len(), offset);

        let avail: usize = match buffer.len().checked_sub(offset) {
            Some(val) => val,
            None => {
                defx!("offset {} beyond buffer len {}", offset, buffer.len());
                return Err(err_decode(format!(
                    "offset {} beyond populated buffer length {}", offset, buffer.len(),
                )));
            }
        };
        if avail < RECORD_HEADER_SZ {
            defx!("avail {} < RECORD_HEADER_SZ {}", avail, RECORD_HEADER_SZ);
            return Err(err_decode(format!(
                "truncated header; {} bytes available, header is {} bytes", avail, RECORD_HEADER_SZ,
            )));
        }

        let length: u32 = u32_at(buffer, offset + OFF_LENGTH);
        defo!("Length {}", length);
        if length == 0 {
            // a zero Length could never advance the cursor
            defx!("Length is zero");
            return Err(err_decode(String::from("record Length field is zero")));
        }
        let length_: usize = length as usize;
        if length_ < RECORD_HEADER_SZ {
            defx!("Length {} < RECORD_HEADER_SZ {}", length_, RECORD_HEADER_SZ);
            return Err(err_decode(format!(
                "record Length {} less than header size {}", length_, RECORD_HEADER_SZ,
            )));
        }
        if length_ > avail {
            defx!("Length {} > avail {}", length_, avail);
            return Err(err_decode(format!(
                "record Length {} exceeds populated buffer region {}", length_, avail,
            )));
        }
        // one whole record; all further offsets are relative to this slice
        let record: &[u8] = &buffer[offset..offset + length_];

        let _reserved: u32 = u32_at(record, OFF_RESERVED);
        defo!("Reserved 0x{:08x} (magic 0x{:08x})", _reserved, RECORD_MAGIC);
        let record_number: RecordNumber = u32_at(record, OFF_RECORD_NUMBER);
        let time_generated: EpochSeconds = u32_at(record, OFF_TIME_GENERATED);
        let time_written: EpochSeconds = u32_at(record, OFF_TIME_WRITTEN);
        let event_id: EventId = u32_at(record, OFF_EVENT_ID);
        let event_type_raw: u16 = u16_at(record, OFF_EVENT_TYPE);
        let num_strings: u16 = u16_at(record, OFF_NUM_STRINGS);
        let event_category: u16 = u16_at(record, OFF_EVENT_CATEGORY);
        let string_offset: u32 = u32_at(record, OFF_STRING_OFFSET);
        let data_length: u32 = u32_at(record, OFF_DATA_LENGTH);
        let data_offset: u32 = u32_at(record, OFF_DATA_OFFSET);
        defo!(
            "RecordNumber {}, EventID {}, EventType {}, NumStrings {}, StringOffset {}, DataLength {}, DataOffset {}",
            record_number, event_id, event_type_raw, num_strings, string_offset, data_length, data_offset,
        );

        let event_type: EventLogType = match EventLogType::from_raw(event_type_raw) {
            Some(val) => val,
            None => {
                defx!("bad EventType {}", event_type_raw);
                return Err(err_decode(format!("undefined EventType value {}", event_type_raw)));
            }
        };

        // source name then computer name, immediately after the fixed header
        let (source, source_sz): (String, usize) = match wide_str_at(record, RECORD_HEADER_SZ, length_) {
            Some(val) => val,
            None => {
                defx!("unterminated source name");
                return Err(err_decode(String::from("unterminated source name string")));
            }
        };
        defo!("SourceName {:?} ({} bytes)", source, source_sz);
        let (computer, _computer_sz): (String, usize) =
            match wide_str_at(record, RECORD_HEADER_SZ + source_sz, length_) {
                Some(val) => val,
                None => {
                    defx!("unterminated computer name");
                    return Err(err_decode(String::from("unterminated computer name string")));
                }
            };
        defo!("ComputerName {:?}", computer);

        // event-specific data; present iff DataLength > 0
        let data: Option<Bytes> = match data_length {
            0 => None,
            _ => {
                let beg: usize = data_offset as usize;
                let end: usize = match beg.checked_add(data_length as usize) {
                    Some(val) => val,
                    None => {
                        defx!("DataOffset + DataLength overflows");
                        return Err(err_decode(String::from("DataOffset + DataLength overflows")));
                    }
                };
                if beg < RECORD_HEADER_SZ || end > length_ {
                    defx!("data region [{}, {}) escapes record [{}, {})", beg, end, RECORD_HEADER_SZ, length_);
                    return Err(err_decode(format!(
                        "data region [{}, {}) escapes record of Length {}", beg, end, length_,
                    )));
                }

                Some(Bytes::from(&record[beg..end]))
            }
        };

        // message substitution strings; present iff NumStrings > 0
        let strings: Option<Vec<String>> = match num_strings {
            0 => None,
            _ => {
                let beg: usize = string_offset as usize;
                if beg < RECORD_HEADER_SZ || beg > length_ {
                    defx!("StringOffset {} escapes record [{}, {})", beg, RECORD_HEADER_SZ, length_);
                    return Err(err_decode(format!(
                        "StringOffset {} escapes record of Length {}", beg, length_,
                    )));
                }
                let mut strings_: Vec<String> = Vec::with_capacity(num_strings as usize);
                let mut at: usize = beg;
                for _i in 0..num_strings {
                    // stop early if fewer strings are present than declared
                    match wide_str_at(record, at, length_) {
                        Some((s, sz)) => {
                            defo!("string[{}] {:?}", _i, s);
                            strings_.push(s);
                            at += sz;
                        }
                        None => {
                            defo!("string region exhausted at string {} of {}", _i, num_strings);
                            break;
                        }
                    }
                }

                Some(strings_)
            }
        };

        defx!("return EventLogRecord RecordNumber {}", record_number);

        Ok(EventLogRecord {
            record_number,
            time_generated,
            time_written,
            event_id,
            event_type,
            event_category,
            source,
            computer,
            data,
            strings,
            length,
        })
    }

    #[inline(always)]
    pub const fn record_number(&self) -> RecordNumber {
        self.record_number
    }

    #[inline(always)]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Status code for the facility; the low word of the `EventID` field.
    #[inline(always)]
    pub const fn status_code(&self) -> u16 {
        (self.event_id & 0xFFFF) as u16
    }

    #[inline(always)]
    pub const fn event_type(&self) -> EventLogType {
        self.event_type
    }

    #[inline(always)]
    pub const fn event_category(&self) -> u16 {
        self.event_category
    }

    #[inline(always)]
    pub fn source(&self) -> &str {
        self.source.as_str()
    }

    #[inline(always)]
    pub fn computer(&self) -> &str {
        self.computer.as_str()
    }

    /// Event-specific binary data, or `None` if the record declared none.
    #[inline(always)]
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    /// Message substitution strings, or `None` if the record declared none.
    #[inline(always)]
    pub fn strings(&self) -> Option<&Vec<String>> {
        self.strings.as_ref()
    }

    /// Total record size in bytes; the cursor advance-by value.
    #[inline(always)]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// The `TimeGenerated` field as seconds since the Unix epoch.
    #[inline(always)]
    pub const fn time_generated(&self) -> EpochSeconds {
        self.time_generated
    }

    /// The `TimeWritten` field as seconds since the Unix epoch.
    #[inline(always)]
    pub const fn time_written(&self) -> EpochSeconds {
        self.time_written
    }

    /// The `TimeGenerated` field as a [`DateTime<Utc>`].
    ///
    /// [`DateTime<Utc>`]: https://docs.rs/chrono/0.4.40/chrono/struct.DateTime.html
    pub fn dt_generated(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.time_generated as i64, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// The `TimeWritten` field as a [`DateTime<Utc>`].
    ///
    /// [`DateTime<Utc>`]: https://docs.rs/chrono/0.4.40/chrono/struct.DateTime.html
    pub fn dt_written(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.time_written as i64, 0)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}
