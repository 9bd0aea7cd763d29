// src/readers/eventlogreader.rs

//! Implements an [`EventLogReader`], the driver of deriving
//! [`EventLogRecord`s] from an [`EventLogSource`].
//!
//! An `EventLogSource` models the OS "read the next chunk of records"
//! primitive, [`ReadEventLog`]: one call deposits zero or more whole,
//! concatenated, variable-length records into a caller-supplied buffer, or
//! reports that the buffer is too small and the minimum size needed, or
//! reports the end of the log, or fails with an OS error code.
//!
//! An `EventLogReader` hides the buffer-sizing quirks of that primitive
//! (grow and retry on a buffer-too-small outcome) and frames the returned
//! bytes into [`EventLogRecord`s], presenting a pull-based record sequence
//! with a fixed traversal [`Direction`].
//!
//! [`EventLogReader`]: self::EventLogReader
//! [`EventLogSource`]: self::EventLogSource
//! [`Direction`]: self::Direction
//! [`EventLogRecord`s]: crate::data::eventlog::EventLogRecord
//! [`ReadEventLog`]: https://learn.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-readeventlogw

use std::fmt;
use std::io::{
    Error,
    ErrorKind,
    Result,
};

#[allow(unused_imports)]
use ::more_asserts::{
    assert_le,
    debug_assert_ge,
    debug_assert_gt,
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
    BufferOffset,
    Bytes,
    Count,
    FPath,
    ResultNext,
};
use crate::data::eventlog::{
    EventLogRecord,
    RecordNumber,
};

// ----------------
// EventLogSource

/// Traversal order requested from the log source.
///
/// Fixed for the lifetime of an [`EventLogReader`]; within one multi-record
/// read, records are framed in the order the source returned them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Oldest to newest; ascending record numbers.
    Forwards,
    /// Newest to oldest; descending record numbers.
    Backwards,
}

impl Direction {
    /// The `WinNT.h` read flag value for this direction
    /// (`EVENTLOG_FORWARDS_READ`, `EVENTLOG_BACKWARDS_READ`).
    pub const fn as_flag(&self) -> u32 {
        match self {
            Direction::Forwards => 0x0004,
            Direction::Backwards => 0x0008,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            Direction::Forwards => write!(f, "Forwards"),
            Direction::Backwards => write!(f, "Backwards"),
        }
    }
}

/// Outcome of one [`EventLogSource::read_next`] call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReadNext {
    /// Success; count of bytes deposited into the caller's buffer.
    /// May span multiple concatenated records.
    Bytes(usize),
    /// The caller's buffer cannot hold the next record; retry with a
    /// buffer of at least the given size. Recoverable.
    NeedsSize(usize),
    /// No more records in the requested direction. Terminal, not an error.
    EndOfLog,
    /// OS error code. Terminal.
    OsError(i32),
}

/// The abstract OS log-read primitive consumed by an [`EventLogReader`];
/// the one external boundary of this crate.
///
/// Opening is the concrete type's constructor. A source is exclusively
/// owned by one reader; `close` must tolerate repeated calls.
pub trait EventLogSource {
    /// Read as many whole records as fit into `buffer`, in the requested
    /// direction, advancing the source's internal read cursor on success.
    fn read_next(
        &mut self,
        direction: Direction,
        buffer: &mut [u8],
    ) -> ReadNext;

    /// Release the underlying handle. Idempotent.
    fn close(&mut self);
}

// ----------------
// EventLogReader

/// Default read buffer size in bytes; 64 KiB.
pub const READ_BUF_SZ_DEFAULT: usize = 1024 * 64;

/// Most buffer-growth retries allowed for one logical read.
///
/// The source reports the exact minimum size needed so one retry suffices
/// in normal operation. Each retry must strictly grow the buffer.
const READ_GROW_RETRIES_MAX: usize = 3;

/// A typed [`ResultNext`] for function [`EventLogReader::read_record`].
///
/// [`ResultNext`]: crate::common::ResultNext
/// [`EventLogReader::read_record`]: EventLogReader::read_record
pub type ResultNextRecord = ResultNext<EventLogRecord, Error>;

/// A pull-based reader of [`EventLogRecord`s] from an [`EventLogSource`].
///
/// Owns the source handle and the growable read buffer. The traversal
/// [`Direction`] is fixed at construction. Not safe for concurrent use;
/// all cursor and buffer state is unsynchronized by design.
///
/// A fatal decode error or unrecoverable OS error poisons the reader:
/// every subsequent [`has_next`]/[`next_record`] repeats the error and the
/// caller is expected to [`close`] and stop. [`close`] is idempotent and
/// is also invoked on drop, so an abandoned or failed iteration cannot
/// leak the source handle.
///
/// [`EventLogRecord`s]: crate::data::eventlog::EventLogRecord
/// [`has_next`]: EventLogReader::has_next
/// [`next_record`]: EventLogReader::next_record
/// [`close`]: EventLogReader::close
pub struct EventLogReader<S>
where
    S: EventLogSource,
{
    /// The underlying log source; exclusively owned.
    source: S,
    /// Name of the log being read; for diagnostics and the `--summary`.
    name: FPath,
    /// Fixed traversal direction.
    direction: Direction,
    /// The growable read buffer. Capacity only grows, never shrinks,
    /// within one reader's lifetime.
    buffer: Bytes,
    /// Count of bytes deposited by the last successful `read_next`.
    bytes_read: usize,
    /// Byte offset of the next undecoded record within `buffer`.
    /// Never exceeds `bytes_read`.
    cursor: BufferOffset,
    /// The decoded record ready to be yielded, if any.
    staged: Option<EventLogRecord>,
    /// Confirmed end of log in this direction.
    exhausted: bool,
    /// Has `close()` run?
    closed: bool,
    /// The first fatal error, if any, as a `String`.
    ///
    /// Annoyingly, cannot [Clone or Copy `Error`].
    ///
    /// [Clone or Copy `Error`]: https://github.com/rust-lang/rust/issues/24135
    error: Option<String>,
    /// Has the `Iterator` impl already yielded the fatal error once?
    error_yielded: bool,
    /// `RecordNumber` of the record most recently staged.
    record_number_last: Option<RecordNumber>,
    /// `RecordNumber` of the first record staged.
    record_number_first: Option<RecordNumber>,
    /// Count of records decoded and staged.
    pub(super) records_read: Count,
    /// Count of successful `read_next` calls.
    pub(super) reads: Count,
    /// Count of buffer growths.
    pub(super) buffer_grows: Count,
}

impl<S> fmt::Debug for EventLogReader<S>
where
    S: EventLogSource,
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("EventLogReader")
            .field("Name", &self.name)
            .field("Direction", &self.direction)
            .field("Records Read", &self.records_read)
            .field("Exhausted", &self.exhausted)
            .field("Closed", &self.closed)
            .field("Error?", &self.error)
            .finish()
    }
}

/// Summary of activity of an [`EventLogReader`], for `--summary`.
#[allow(non_snake_case)]
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct SummaryEventLogReader {
    pub eventlogreader_records_read: Count,
    pub eventlogreader_reads: Count,
    pub eventlogreader_buffer_grows: Count,
    /// final read buffer capacity in bytes
    pub eventlogreader_buffer_sz: usize,
    /// `RecordNumber` of the first record yielded
    pub eventlogreader_record_number_first: Option<RecordNumber>,
    /// `RecordNumber` of the last record yielded
    pub eventlogreader_record_number_last: Option<RecordNumber>,
    pub eventlogreader_error: Option<String>,
}

impl<S> EventLogReader<S>
where
    S: EventLogSource,
{
    /// Create a new `EventLogReader` with the default buffer size.
    ///
    /// **NOTE:** does not attempt any reads, similar to other
    /// `*Readers::new()`.
    pub fn new(
        source: S,
        name: FPath,
        direction: Direction,
    ) -> EventLogReader<S> {
        EventLogReader::with_buffer_sz(source, name, direction, READ_BUF_SZ_DEFAULT)
    }

    /// Create a new `EventLogReader` with the given initial buffer size.
    pub fn with_buffer_sz(
        source: S,
        name: FPath,
        direction: Direction,
        buffer_sz: usize,
    ) -> EventLogReader<S> {
        def1n!("({:?}, {:?}, buffer_sz {})", name, direction, buffer_sz);
        def1x!();

        EventLogReader {
            source,
            name,
            direction,
            buffer: vec![0; buffer_sz],
            bytes_read: 0,
            cursor: 0,
            staged: None,
            exhausted: false,
            closed: false,
            error: None,
            error_yielded: false,
            record_number_last: None,
            record_number_first: None,
            records_read: 0,
            reads: 0,
            buffer_grows: 0,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &FPath {
        &self.name
    }

    #[inline(always)]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Current read buffer capacity in bytes.
    #[inline(always)]
    pub fn buffer_sz(&self) -> usize {
        self.buffer.len()
    }

    /// Count of records decoded and staged so far.
    #[inline(always)]
    pub const fn count_records_read(&self) -> Count {
        self.records_read
    }

    /// Issue one logical read: call the source, growing the buffer and
    /// retrying on [`ReadNext::NeedsSize`]. The previous buffer contents
    /// are discarded.
    ///
    /// `Found(())` means `self.buffer[‥self.bytes_read]` holds one or more
    /// whole records and `self.cursor` is reset to `0`.
    fn refill(&mut self) -> ResultNext<(), Error> {
        defn!("buffer_sz {}", self.buffer.len());
        debug_assert_ge!(self.bytes_read, self.cursor);

        let mut retries: usize = 0;
        loop {
            match self.source.read_next(self.direction, &mut self.buffer[..]) {
                ReadNext::Bytes(0) => {
                    // zero bytes on success is a quirky way to say "done"
                    deo!("read_next returned Bytes(0)");
                    self.exhausted = true;
                    defx!("return Done");
                    return ResultNext::Done;
                }
                ReadNext::Bytes(n) => {
                    if n > self.buffer.len() {
                        defx!("source wrote {} bytes into a {} byte buffer", n, self.buffer.len());
                        return ResultNext::Err(Error::new(
                            ErrorKind::Other,
                            format!(
                                "log source claims {} bytes read into a {} byte buffer", n, self.buffer.len(),
                            ),
                        ));
                    }
                    self.bytes_read = n;
                    self.cursor = 0;
                    self.reads += 1;
                    defx!("return Found; {} bytes", n);
                    return ResultNext::Found(());
                }
                ReadNext::NeedsSize(sz_min) => {
                    deo!("NeedsSize({})", sz_min);
                    retries += 1;
                    if retries > READ_GROW_RETRIES_MAX {
                        defx!("too many NeedsSize retries ({})", retries);
                        return ResultNext::Err(Error::new(
                            ErrorKind::Other,
                            format!(
                                "log source still undersized after {} buffer growths; last needed size {}",
                                READ_GROW_RETRIES_MAX, sz_min,
                            ),
                        ));
                    }
                    if sz_min <= self.buffer.len() {
                        defx!("NeedsSize {} ≤ current buffer_sz {}", sz_min, self.buffer.len());
                        return ResultNext::Err(Error::new(
                            ErrorKind::Other,
                            format!(
                                "log source needs size {} but the buffer already holds {} bytes",
                                sz_min, self.buffer.len(),
                            ),
                        ));
                    }
                    // grow; the failed attempt deposited no usable data
                    self.buffer.resize(sz_min, 0);
                    self.buffer_grows += 1;
                    deo!("buffer grown to {} bytes, retry", self.buffer.len());
                }
                ReadNext::EndOfLog => {
                    self.exhausted = true;
                    defx!("return Done (end of log)");
                    return ResultNext::Done;
                }
                ReadNext::OsError(code) => {
                    defx!("return Err (OS error {})", code);
                    return ResultNext::Err(Error::from_raw_os_error(code));
                }
            }
        }
    }

    /// Ensure a decoded record is staged, refilling the buffer if the
    /// current one is consumed.
    ///
    /// `Ok(true)` means a record is staged. `Ok(false)` means confirmed
    /// end of log. `Err` is a fatal decode or OS error; the reader is
    /// poisoned and repeats the error on subsequent calls.
    fn stage(&mut self) -> Result<bool> {
        defn!("cursor {}, bytes_read {}", self.cursor, self.bytes_read);

        if self.closed {
            defx!("reader is closed");
            return Err(Error::new(ErrorKind::Other, "reader is closed"));
        }
        if let Some(ref mesg) = self.error {
            defx!("poisoned; {:?}", mesg);
            return Err(Error::new(ErrorKind::Other, mesg.clone()));
        }
        if self.staged.is_some() {
            defx!("already staged");
            return Ok(true);
        }
        if self.exhausted {
            defx!("exhausted");
            return Ok(false);
        }

        if self.cursor >= self.bytes_read {
            // current buffer consumed; issue a new read
            match self.refill() {
                ResultNext::Found(()) => {}
                ResultNext::Done => {
                    defx!("return Ok(false)");
                    return Ok(false);
                }
                ResultNext::Err(err) => {
                    self.error = Some(err.to_string());
                    defx!("return Err {:?}", err);
                    return Err(err);
                }
            }
        }

        let record: EventLogRecord =
            match EventLogRecord::decode_at(&self.buffer[..self.bytes_read], self.cursor) {
                Ok(val) => val,
                Err(err) => {
                    self.error = Some(err.to_string());
                    defx!("return Err {:?}", err);
                    return Err(err);
                }
            };
        self.cursor += record.length() as usize;
        debug_assert_le!(self.cursor, self.bytes_read);
        // record numbers are strictly ordered per direction
        if let Some(number_last) = self.record_number_last {
            match self.direction {
                Direction::Forwards => debug_assert_gt!(record.record_number(), number_last),
                Direction::Backwards => debug_assert_lt!(record.record_number(), number_last),
            }
        }
        self.record_number_last = Some(record.record_number());
        if self.record_number_first.is_none() {
            self.record_number_first = Some(record.record_number());
        }
        self.records_read += 1;
        defo!("staged RecordNumber {}", record.record_number());
        self.staged = Some(record);
        defx!("return Ok(true)");

        Ok(true)
    }

    /// Is at least one more record available?
    ///
    /// May block on a source read. `Ok(false)` at the confirmed end of the
    /// log is a normal terminal state and remains `Ok(false)` on repeated
    /// calls. A fatal decode or OS error is returned as `Err`.
    pub fn has_next(&mut self) -> Result<bool> {
        self.stage()
    }

    /// Yield the staged record and prepare the next one.
    ///
    /// Calling past the confirmed end of the log is a caller bug and fails
    /// loudly; check [`has_next`] first, standard iterator discipline.
    ///
    /// [`has_next`]: EventLogReader::has_next
    pub fn next_record(&mut self) -> Result<EventLogRecord> {
        defñ!();
        match self.stage()? {
            true => match self.staged.take() {
                Some(record) => Ok(record),
                None => Err(Error::new(ErrorKind::Other, "no record staged")),
            },
            false => Err(Error::new(ErrorKind::Other, "iteration exhausted")),
        }
    }

    /// [`has_next`] + [`next_record`] folded into one
    /// [`ResultNext`]-typed call.
    ///
    /// [`has_next`]: EventLogReader::has_next
    /// [`next_record`]: EventLogReader::next_record
    /// [`ResultNext`]: crate::common::ResultNext
    pub fn read_record(&mut self) -> ResultNextRecord {
        defñ!();
        match self.stage() {
            Ok(true) => match self.staged.take() {
                Some(record) => ResultNext::Found(record),
                None => ResultNext::Err(Error::new(ErrorKind::Other, "no record staged")),
            },
            Ok(false) => ResultNext::Done,
            Err(err) => ResultNext::Err(err),
        }
    }

    /// Release the underlying source handle.
    ///
    /// Idempotent; safe to call from a cleanup path after an abandoned or
    /// failed iteration. Also runs on drop.
    pub fn close(&mut self) {
        defñ!("closed {}", self.closed);
        if self.closed {
            return;
        }
        self.closed = true;
        self.exhausted = true;
        self.source.close();
    }

    /// Return an up-to-date [`SummaryEventLogReader`] instance for this
    /// `EventLogReader`.
    #[allow(non_snake_case)]
    pub fn summary(&self) -> SummaryEventLogReader {
        let eventlogreader_records_read: Count = self.records_read;
        let eventlogreader_reads: Count = self.reads;
        let eventlogreader_buffer_grows: Count = self.buffer_grows;
        let eventlogreader_buffer_sz: usize = self.buffer.len();
        let eventlogreader_record_number_first = self.record_number_first;
        let eventlogreader_record_number_last = self.record_number_last;
        let eventlogreader_error: Option<String> = self.error.clone();

        SummaryEventLogReader {
            eventlogreader_records_read,
            eventlogreader_reads,
            eventlogreader_buffer_grows,
            eventlogreader_buffer_sz,
            eventlogreader_record_number_first,
            eventlogreader_record_number_last,
            eventlogreader_error,
        }
    }
}

impl<S> Iterator for EventLogReader<S>
where
    S: EventLogSource,
{
    type Item = Result<EventLogRecord>;

    /// The fatal error, if any, is yielded exactly once; after that the
    /// iteration fuses to `None` (the poisoned reader would otherwise
    /// repeat the error forever).
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            ResultNext::Found(record) => Some(Ok(record)),
            ResultNext::Done => None,
            ResultNext::Err(err) => {
                if self.error_yielded {
                    return None;
                }
                self.error_yielded = true;

                Some(Err(err))
            }
        }
    }
}

impl<S> Drop for EventLogReader<S>
where
    S: EventLogSource,
{
    fn drop(&mut self) {
        self.close();
    }
}
