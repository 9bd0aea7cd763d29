// src/readers/filelog.rs

//! Implements a [`FileEventLog`], a file-backed [`EventLogSource`] over an
//! exported log file: a file of concatenated classic event-log records, as
//! written by [`BackupEventLog`].
//!
//! Every record stores its `Length` field at both ends, so the file can be
//! walked from either end: forwards by adding the leading `Length` to the
//! cursor, backwards by reading the trailing `Length` copy just before the
//! cursor. A `FileEventLog` packs as many whole records as fit into the
//! caller's buffer per [`read_next`] call and reports
//! [`ReadNext::NeedsSize`] when the next record alone exceeds the buffer,
//! mirroring `ReadEventLog` semantics.
//!
//! [`FileEventLog`]: self::FileEventLog
//! [`EventLogSource`]: crate::readers::eventlogreader::EventLogSource
//! [`read_next`]: crate::readers::eventlogreader::EventLogSource::read_next
//! [`ReadNext::NeedsSize`]: crate::readers::eventlogreader::ReadNext
//! [`BackupEventLog`]: https://learn.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-backupeventlogw

use std::fmt;
use std::io::{
    Read,
    Result,
    Seek,
    SeekFrom,
};

#[allow(unused_imports)]
use ::more_asserts::{
    debug_assert_ge,
    debug_assert_le,
    debug_assert_lt,
};
#[allow(unused_imports)]
use ::si_trace_print::{
    def1n,
    def1o,
    def1x,
    defn,
    defo,
    defx,
    defñ,
    den,
    deo,
    dex,
};

use crate::common::{
    FPath,
    File,
    FileMetadata,
    FileOpenOptions,
    FileSz,
};
use crate::data::eventlog::RECORD_SZ_MIN;
use crate::readers::eventlogreader::{
    Direction,
    EventLogSource,
    ReadNext,
};
use crate::readers::helpers::fpath_to_path;

/// `ERROR_INVALID_HANDLE`; reads after `close`.
pub const ERROR_INVALID_HANDLE: i32 = 6;
/// `ERROR_READ_FAULT`; an I/O failure with no OS code of its own.
pub const ERROR_READ_FAULT: i32 = 30;
/// `ERROR_EVENTLOG_FILE_CORRUPT`; record framing inconsistent with the
/// file extents.
pub const ERROR_EVENTLOG_FILE_CORRUPT: i32 = 1500;

/// A file-backed [`EventLogSource`].
///
/// The unread region is `[fore, back)`. A forwards read consumes from
/// `fore`; a backwards read consumes from `back`. One reader session uses
/// only one of the two, matching the fixed per-session [`Direction`].
///
/// [`EventLogSource`]: crate::readers::eventlogreader::EventLogSource
/// [`Direction`]: crate::readers::eventlogreader::Direction
pub struct FileEventLog {
    /// The [`FPath`] of the file being read.
    ///
    /// [`FPath`]: crate::common::FPath
    path: FPath,
    file: File,
    /// File size in bytes from file-system metadata.
    filesz: FileSz,
    /// Byte offset of the oldest unread record.
    fore: FileSz,
    /// Byte offset one past the newest unread record.
    back: FileSz,
    /// Has `close()` run?
    closed: bool,
}

impl fmt::Debug for FileEventLog {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("FileEventLog")
            .field("Path", &self.path)
            .field("File Size", &self.filesz)
            .field("fore", &self.fore)
            .field("back", &self.back)
            .field("Closed", &self.closed)
            .finish()
    }
}

impl FileEventLog {
    /// Open the exported log file at `path` for reading.
    ///
    /// Fails if the file does not exist or access is denied.
    ///
    /// **NOTE:** does not read any records here, similar to other
    /// `*Readers::new()`.
    pub fn open(path: FPath) -> Result<FileEventLog> {
        def1n!("({:?})", path);

        let mut open_options = FileOpenOptions::new();
        def1o!("open_options.read(true).open({:?})", path);
        let file: File = match open_options
            .read(true)
            .open(fpath_to_path(&path))
        {
            Result::Ok(val) => val,
            Result::Err(err) => {
                def1x!("return {:?}", err);
                return Err(err);
            }
        };
        let metadata: FileMetadata = match file.metadata() {
            Result::Ok(val) => val,
            Result::Err(err) => {
                def1x!("return {:?}", err);
                return Err(err);
            }
        };
        let filesz: FileSz = metadata.len() as FileSz;
        def1x!("return Ok(FileEventLog); filesz {}", filesz);

        Ok(FileEventLog {
            path,
            file,
            filesz,
            fore: 0,
            back: filesz,
            closed: false,
        })
    }

    #[inline(always)]
    pub const fn path(&self) -> &FPath {
        &self.path
    }

    #[inline(always)]
    pub const fn filesz(&self) -> FileSz {
        self.filesz
    }

    /// Read exactly `out.len()` bytes at absolute file offset `at`.
    fn read_at(
        &mut self,
        at: FileSz,
        out: &mut [u8],
    ) -> Result<()> {
        self.file.seek(SeekFrom::Start(at))?;
        self.file.read_exact(out)?;

        Ok(())
    }

    /// Read the `u32` record length field stored at absolute offset `at`.
    fn length_field_at(
        &mut self,
        at: FileSz,
    ) -> Result<u32> {
        let mut len4: [u8; 4] = [0; 4];
        self.read_at(at, &mut len4)?;

        Ok(u32::from_le_bytes(len4))
    }

    /// Pack whole records oldest-first into `buffer`, consuming from `fore`.
    fn fill_forwards(
        &mut self,
        buffer: &mut [u8],
    ) -> ReadNext {
        defn!("fore {}, back {}, buffer len {}", self.fore, self.back, buffer.len());
        let mut total: usize = 0;
        let mut pos: FileSz = self.fore;
        while pos < self.back {
            if self.back - pos < RECORD_SZ_MIN as FileSz {
                // leftover bytes too small to be a record
                if total > 0 {
                    break;
                }
                defx!("return OsError({}); {} leftover bytes", ERROR_EVENTLOG_FILE_CORRUPT, self.back - pos);
                return ReadNext::OsError(ERROR_EVENTLOG_FILE_CORRUPT);
            }
            let length: u32 = match self.length_field_at(pos) {
                Ok(val) => val,
                Err(err) => {
                    defx!("return OsError; {:?}", err);
                    return ReadNext::OsError(err.raw_os_error().unwrap_or(ERROR_READ_FAULT));
                }
            };
            deo!("leading Length {} at offset {}", length, pos);
            let length_: FileSz = length as FileSz;
            if (length as usize) < RECORD_SZ_MIN || pos + length_ > self.back {
                if total > 0 {
                    break;
                }
                defx!("return OsError({}); Length {} at offset {}", ERROR_EVENTLOG_FILE_CORRUPT, length, pos);
                return ReadNext::OsError(ERROR_EVENTLOG_FILE_CORRUPT);
            }
            if total + length as usize > buffer.len() {
                if total == 0 {
                    defx!("return NeedsSize({})", length);
                    return ReadNext::NeedsSize(length as usize);
                }
                break;
            }
            if let Err(err) = self.read_at(pos, &mut buffer[total..total + length as usize]) {
                defx!("return OsError; {:?}", err);
                return ReadNext::OsError(err.raw_os_error().unwrap_or(ERROR_READ_FAULT));
            }
            total += length as usize;
            pos += length_;
        }
        self.fore = pos;
        defx!("return Bytes({}); fore {}", total, self.fore);

        ReadNext::Bytes(total)
    }

    /// Pack whole records newest-first into `buffer`, consuming from `back`.
    ///
    /// Record boundaries are found via the trailing `Length` copy; the
    /// leading `Length` is cross-checked against it.
    fn fill_backwards(
        &mut self,
        buffer: &mut [u8],
    ) -> ReadNext {
        defn!("fore {}, back {}, buffer len {}", self.fore, self.back, buffer.len());
        let mut total: usize = 0;
        let mut pos: FileSz = self.back;
        while pos > self.fore {
            if pos - self.fore < RECORD_SZ_MIN as FileSz {
                if total > 0 {
                    break;
                }
                defx!("return OsError({}); {} leftover bytes", ERROR_EVENTLOG_FILE_CORRUPT, pos - self.fore);
                return ReadNext::OsError(ERROR_EVENTLOG_FILE_CORRUPT);
            }
            let length: u32 = match self.length_field_at(pos - 4) {
                Ok(val) => val,
                Err(err) => {
                    defx!("return OsError; {:?}", err);
                    return ReadNext::OsError(err.raw_os_error().unwrap_or(ERROR_READ_FAULT));
                }
            };
            deo!("trailing Length {} before offset {}", length, pos);
            let length_: FileSz = length as FileSz;
            if (length as usize) < RECORD_SZ_MIN || length_ > pos - self.fore {
                if total > 0 {
                    break;
                }
                defx!("return OsError({}); Length {} before offset {}", ERROR_EVENTLOG_FILE_CORRUPT, length, pos);
                return ReadNext::OsError(ERROR_EVENTLOG_FILE_CORRUPT);
            }
            let beg: FileSz = pos - length_;
            let length_lead: u32 = match self.length_field_at(beg) {
                Ok(val) => val,
                Err(err) => {
                    defx!("return OsError; {:?}", err);
                    return ReadNext::OsError(err.raw_os_error().unwrap_or(ERROR_READ_FAULT));
                }
            };
            if length_lead != length {
                if total > 0 {
                    break;
                }
                defx!(
                    "return OsError({}); leading Length {} ≠ trailing Length {}",
                    ERROR_EVENTLOG_FILE_CORRUPT, length_lead, length,
                );
                return ReadNext::OsError(ERROR_EVENTLOG_FILE_CORRUPT);
            }
            if total + length as usize > buffer.len() {
                if total == 0 {
                    defx!("return NeedsSize({})", length);
                    return ReadNext::NeedsSize(length as usize);
                }
                break;
            }
            if let Err(err) = self.read_at(beg, &mut buffer[total..total + length as usize]) {
                defx!("return OsError; {:?}", err);
                return ReadNext::OsError(err.raw_os_error().unwrap_or(ERROR_READ_FAULT));
            }
            total += length as usize;
            pos = beg;
        }
        self.back = pos;
        defx!("return Bytes({}); back {}", total, self.back);

        ReadNext::Bytes(total)
    }
}

impl EventLogSource for FileEventLog {
    fn read_next(
        &mut self,
        direction: Direction,
        buffer: &mut [u8],
    ) -> ReadNext {
        defñ!("({}, buffer len {})", direction, buffer.len());
        if self.closed {
            return ReadNext::OsError(ERROR_INVALID_HANDLE);
        }
        debug_assert_le!(self.fore, self.back);
        if self.fore >= self.back {
            return ReadNext::EndOfLog;
        }
        match direction {
            Direction::Forwards => self.fill_forwards(buffer),
            Direction::Backwards => self.fill_backwards(buffer),
        }
    }

    fn close(&mut self) {
        defñ!("closed {}", self.closed);
        // the File itself releases on drop
        self.closed = true;
    }
}
