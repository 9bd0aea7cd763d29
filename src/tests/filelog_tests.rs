// src/tests/filelog_tests.rs

//! tests for `filelog.rs`

#![allow(non_snake_case)]

#[allow(unused_imports)]
use ::si_trace_print::{
    defn,
    defo,
    defx,
};
use ::test_case::test_case;

use crate::common::{
    Bytes,
    FPath,
};
use crate::readers::eventlogreader::{
    Direction,
    EventLogReader,
    EventLogSource,
    ReadNext,
    READ_BUF_SZ_DEFAULT,
};
use crate::readers::filelog::{
    FileEventLog,
    ERROR_EVENTLOG_FILE_CORRUPT,
    ERROR_INVALID_HANDLE,
};
use crate::readers::helpers::path_to_fpath;
use crate::tests::common::{
    log_bytes,
    ntf_from_bytes,
    REC_1,
    REC_2,
    REC_3,
    REC_BIG,
    REC_BIG_DATA_SZ,
};

fn drain_numbers(reader: &mut EventLogReader<FileEventLog>) -> Vec<u32> {
    let mut numbers: Vec<u32> = Vec::new();
    while reader.has_next().unwrap() {
        numbers.push(reader.next_record().unwrap().record_number());
    }

    numbers
}

#[test]
fn test_open_missing_file_fails() {
    assert!(FileEventLog::open(FPath::from("no/such/eventlog.evt")).is_err());
}

#[test_case(Direction::Forwards, &[1, 2, 3]; "forwards ascending")]
#[test_case(Direction::Backwards, &[3, 2, 1]; "backwards descending")]
fn test_drain_directional(direction: Direction, expect: &[u32]) {
    let ntf = ntf_from_bytes(&log_bytes(&[&REC_1, &REC_2, &REC_3]));
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    let mut reader =
        EventLogReader::new(source, FPath::from("test"), direction);
    assert_eq!(drain_numbers(&mut reader), expect);
    assert_eq!(reader.summary().eventlogreader_reads, 1);
}

/// scenario: empty log file; `EndOfLog` on the very first read
#[test]
fn test_empty_file() {
    let ntf = ntf_from_bytes(&[]);
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    assert_eq!(source.filesz(), 0);
    let mut reader =
        EventLogReader::new(source, FPath::from("test"), Direction::Forwards);
    assert!(!reader.has_next().unwrap());
}

/// an oversized first record forces `NeedsSize` then one growth
#[test_case(Direction::Forwards; "forwards")]
#[test_case(Direction::Backwards; "backwards")]
fn test_oversized_record_grows_buffer(direction: Direction) {
    let ntf = ntf_from_bytes(&REC_BIG);
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    let mut reader =
        EventLogReader::new(source, FPath::from("test"), direction);
    assert!(reader.has_next().unwrap());
    let record = reader.next_record().unwrap();
    assert_eq!(record.data().unwrap().len(), REC_BIG_DATA_SZ);
    assert!(!reader.has_next().unwrap());
    assert_eq!(reader.summary().eventlogreader_buffer_grows, 1);
}

/// a buffer sized for two records packs two per read
#[test]
fn test_partial_buffer_packs_whole_records() {
    let ntf = ntf_from_bytes(&log_bytes(&[&REC_1, &REC_2, &REC_3]));
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    let buffer_sz: usize = REC_1.len() + REC_2.len();
    let mut reader = EventLogReader::with_buffer_sz(
        source,
        FPath::from("test"),
        Direction::Forwards,
        buffer_sz,
    );
    assert_eq!(drain_numbers(&mut reader), &[1, 2, 3]);
    // records 1 and 2 packed into the first read, record 3 in the second
    assert_eq!(reader.summary().eventlogreader_reads, 2);
    assert_eq!(reader.summary().eventlogreader_buffer_grows, 0);
}

/// trailing garbage: whole records still read, then the leftover bytes
/// report `ERROR_EVENTLOG_FILE_CORRUPT`
#[test]
fn test_trailing_garbage_corrupt() {
    let mut bytes: Bytes = log_bytes(&[&REC_1, &REC_2]);
    bytes.extend_from_slice(&[0xA5; 10]);
    let ntf = ntf_from_bytes(&bytes);
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    let mut reader =
        EventLogReader::new(source, FPath::from("test"), Direction::Forwards);
    assert!(reader.has_next().unwrap());
    assert_eq!(reader.next_record().unwrap().record_number(), 1);
    assert!(reader.has_next().unwrap());
    assert_eq!(reader.next_record().unwrap().record_number(), 2);
    let err = reader.has_next().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(ERROR_EVENTLOG_FILE_CORRUPT));
}

/// a mismatched leading/trailing `Length` pair is corrupt when walking
/// backwards
#[test]
fn test_backwards_length_mismatch_corrupt() {
    let mut bytes: Bytes = log_bytes(&[&REC_1, &REC_2]);
    // clobber the trailing Length copy of the last record
    let at: usize = bytes.len() - 4;
    bytes[at..].copy_from_slice(&(REC_2.len() as u32 + 8).to_le_bytes());
    let ntf = ntf_from_bytes(&bytes);
    let source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    let mut reader =
        EventLogReader::new(source, FPath::from("test"), Direction::Backwards);
    let err = reader.has_next().unwrap_err();
    assert_eq!(err.raw_os_error(), Some(ERROR_EVENTLOG_FILE_CORRUPT));
}

/// reads after `close` report `ERROR_INVALID_HANDLE`; `close` tolerates
/// repeated calls
#[test]
fn test_read_after_close() {
    let ntf = ntf_from_bytes(&log_bytes(&[&REC_1]));
    let mut source = FileEventLog::open(path_to_fpath(ntf.path())).unwrap();
    source.close();
    source.close();
    let mut buffer: Bytes = vec![0; READ_BUF_SZ_DEFAULT];
    match source.read_next(Direction::Forwards, &mut buffer) {
        ReadNext::OsError(code) => assert_eq!(code, ERROR_INVALID_HANDLE),
        other => panic!("expected OsError, got {:?}", other),
    }
}
