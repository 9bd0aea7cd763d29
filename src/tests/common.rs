// src/tests/common.rs

//! Common helpers for tests: a synthetic record encoder, header patching
//! helpers, a scripted in-memory [`EventLogSource`], and shared record
//! fixtures.
//!
//! [`EventLogSource`]: crate::readers::eventlogreader::EventLogSource

#![allow(non_upper_case_globals)]

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::Write;
use std::rc::Rc;

use ::lazy_static::lazy_static;
use ::tempfile::NamedTempFile;

use crate::common::{
    Bytes,
    Count,
};
use crate::data::eventlog::{
    EpochSeconds,
    EventId,
    RecordNumber,
    RECORD_HEADER_SZ,
    RECORD_MAGIC,
};
use crate::readers::eventlogreader::{
    Direction,
    EventLogSource,
    ReadNext,
};

/// Encode `s` as UTF-16LE with a trailing NUL.
pub fn utf16le_nul(s: &str) -> Bytes {
    let mut bytes: Bytes = s
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    bytes.extend_from_slice(&[0, 0]);

    bytes
}

/// Overwrite a `u16` header field, little-endian.
pub fn patch_u16(
    buffer: &mut [u8],
    at: usize,
    value: u16,
) {
    buffer[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

/// Overwrite a `u32` header field, little-endian.
pub fn patch_u32(
    buffer: &mut [u8],
    at: usize,
    value: u32,
) {
    buffer[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Encode one complete `EVENTLOGRECORD`: fixed header, source and computer
/// names, substitution strings, event data, alignment padding, and the
/// trailing `Length` copy. `TimeWritten` is `time + 1`.
pub fn encode_record(
    number: RecordNumber,
    time: EpochSeconds,
    event_id: EventId,
    event_type: u16,
    source: &str,
    computer: &str,
    strings: &[&str],
    data: &[u8],
) -> Bytes {
    let source_b: Bytes = utf16le_nul(source);
    let computer_b: Bytes = utf16le_nul(computer);
    let mut strings_b: Bytes = Bytes::new();
    for s in strings {
        strings_b.extend_from_slice(&utf16le_nul(s));
    }
    let string_offset: usize = RECORD_HEADER_SZ + source_b.len() + computer_b.len();
    let data_offset: usize = string_offset + strings_b.len();
    let body_end: usize = data_offset + data.len();
    let pad: usize = (4 - body_end % 4) % 4;
    let length: usize = body_end + pad + 4;

    let mut record: Bytes = vec![0; length];
    patch_u32(&mut record, 0, length as u32);
    patch_u32(&mut record, 4, RECORD_MAGIC);
    patch_u32(&mut record, 8, number);
    patch_u32(&mut record, 12, time);
    patch_u32(&mut record, 16, time + 1);
    patch_u32(&mut record, 20, event_id);
    patch_u16(&mut record, 24, event_type);
    patch_u16(&mut record, 26, strings.len() as u16);
    // EventCategory 28, ReservedFlags 30, ClosingRecordNumber 32 left zero
    patch_u32(&mut record, 36, string_offset as u32);
    // UserSidLength 40, UserSidOffset 44 left zero
    patch_u32(&mut record, 48, data.len() as u32);
    patch_u32(&mut record, 52, data_offset as u32);
    record[RECORD_HEADER_SZ..RECORD_HEADER_SZ + source_b.len()].copy_from_slice(&source_b);
    record[RECORD_HEADER_SZ + source_b.len()..string_offset].copy_from_slice(&computer_b);
    record[string_offset..data_offset].copy_from_slice(&strings_b);
    record[data_offset..body_end].copy_from_slice(data);
    // trailing Length copy
    patch_u32(&mut record, length - 4, length as u32);

    record
}

/// Concatenate records into one log byte stream.
pub fn log_bytes(records: &[&Bytes]) -> Bytes {
    let mut bytes: Bytes = Bytes::new();
    for record in records {
        bytes.extend_from_slice(record);
    }

    bytes
}

/// Write `data` to a `NamedTempFile`.
pub fn ntf_from_bytes(data: &[u8]) -> NamedTempFile {
    let mut ntf = NamedTempFile::new().unwrap();
    ntf.write_all(data).unwrap();
    ntf.flush().unwrap();

    ntf
}

// ----------------
// ScriptedLog

/// One scripted [`EventLogSource::read_next`] outcome.
///
/// [`EventLogSource::read_next`]: crate::readers::eventlogreader::EventLogSource::read_next
#[derive(Clone, Debug)]
pub enum ScriptedRead {
    /// Deposit these bytes into the caller's buffer. If the buffer is too
    /// small then report `NeedsSize` and re-serve the same bytes on the
    /// next call, as the OS primitive does.
    Deliver(Bytes),
    NeedsSize(usize),
    EndOfLog,
    OsError(i32),
}

/// An in-memory [`EventLogSource`] that replays a fixed script of read
/// outcomes. An exhausted script reports `EndOfLog`.
///
/// [`EventLogSource`]: crate::readers::eventlogreader::EventLogSource
pub struct ScriptedLog {
    script: VecDeque<ScriptedRead>,
    /// Count of `close()` calls; shared so tests can assert after the
    /// source moves into a reader.
    pub closes: Rc<Cell<Count>>,
}

impl ScriptedLog {
    pub fn new(script: Vec<ScriptedRead>) -> ScriptedLog {
        ScriptedLog {
            script: VecDeque::from(script),
            closes: Rc::new(Cell::new(0)),
        }
    }
}

impl EventLogSource for ScriptedLog {
    fn read_next(
        &mut self,
        _direction: Direction,
        buffer: &mut [u8],
    ) -> ReadNext {
        match self.script.pop_front() {
            None => ReadNext::EndOfLog,
            Some(ScriptedRead::Deliver(bytes)) => {
                if bytes.len() > buffer.len() {
                    let sz: usize = bytes.len();
                    self.script.push_front(ScriptedRead::Deliver(bytes));

                    return ReadNext::NeedsSize(sz);
                }
                buffer[..bytes.len()].copy_from_slice(&bytes);

                ReadNext::Bytes(bytes.len())
            }
            Some(ScriptedRead::NeedsSize(sz)) => ReadNext::NeedsSize(sz),
            Some(ScriptedRead::EndOfLog) => ReadNext::EndOfLog,
            Some(ScriptedRead::OsError(code)) => ReadNext::OsError(code),
        }
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }
}

// ----------------
// record fixtures

/// Size of the event data of [`REC_BIG`]; forces growth of a default
/// 64 KiB read buffer.
pub const REC_BIG_DATA_SZ: usize = 128 * 1024;

lazy_static! {
    /// record 1: one substitution string and two data bytes
    pub static ref REC_1: Bytes = encode_record(
        1, 1600000001, 0x0004_0B01, 4, "App1", "HOST1", &["hello"], &[0xDE, 0xAD],
    );
    /// record 2: no strings, no data
    pub static ref REC_2: Bytes = encode_record(
        2, 1600000002, 1002, 2, "App2", "HOST1", &[], &[],
    );
    /// record 3: two substitution strings
    pub static ref REC_3: Bytes = encode_record(
        3, 1600000003, 1003, 1, "App3", "HOST1", &["alpha", "beta"], &[],
    );
    /// an oversized record; larger than the default read buffer
    pub static ref REC_BIG: Bytes = encode_record(
        1, 1600000004, 1004, 4, "Big", "HOST1", &[], &vec![0x55; REC_BIG_DATA_SZ],
    );
}
