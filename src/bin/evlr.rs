// src/bin/evlr.rs

//! Driver program _evlr_ drives the [_evlrlib_].
//!
//! Processes user-passed command-line arguments, opens the passed exported
//! event-log file with a [`FileEventLog`], and drains it one record at a
//! time with an [`EventLogReader`], forwards by default or backwards with
//! `--backwards`. Each record prints on one line, severity-colored.
//! Option `--data` additionally hex dumps the record's event-specific
//! data. Option `--summary` prints a [`SummaryEventLogReader`] afterward.
//!
//! [_evlrlib_]: evlrlib
//! [`FileEventLog`]: evlrlib::readers::filelog::FileEventLog
//! [`EventLogReader`]: evlrlib::readers::eventlogreader::EventLogReader
//! [`SummaryEventLogReader`]: evlrlib::readers::eventlogreader::SummaryEventLogReader

use std::io::Write;
use std::process::ExitCode;

use ::anyhow::{
    Context,
    Result,
};
use ::clap::Parser;
use ::const_format::concatcp;
use ::termcolor::{
    Color,
    ColorChoice,
    ColorSpec,
    StandardStream,
    WriteColor,
};

use ::evlrlib::common::{
    Count,
    FPath,
    ResultNext,
};
use ::evlrlib::data::eventlog::{
    EventLogRecord,
    EventLogType,
};
use ::evlrlib::readers::eventlogreader::{
    Direction,
    EventLogReader,
    SummaryEventLogReader,
    READ_BUF_SZ_DEFAULT,
};
use ::evlrlib::readers::filelog::FileEventLog;
use ::evlrlib::readers::helpers::basename;

const CLI_HELP_AFTER: &str = concatcp!(
    "An exported event-log file is the record stream written by the\n",
    "BackupEventLog Windows API: concatenated classic EVENTLOGRECORD\n",
    "entries. Records print oldest first; pass --backwards for newest\n",
    "first.\n",
    "\n",
    "Default read buffer size is ", READ_BUF_SZ_DEFAULT, " bytes; it grows\n",
    "as needed for oversized records.",
);

#[derive(Parser, Debug)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    name = "evlr",
    // write expanded information for the `--version` output
    version = concatcp!(
        "(event log reader)\n",
        "Version: ",
        env!("CARGO_PKG_VERSION_MAJOR"), ".",
        env!("CARGO_PKG_VERSION_MINOR"), ".",
        env!("CARGO_PKG_VERSION_PATCH"), "\n",
        "MSRV: ", env!("CARGO_PKG_RUST_VERSION"), "\n",
        "License: ", env!("CARGO_PKG_LICENSE"), "\n",
    ),
    after_help = CLI_HELP_AFTER,
    verbatim_doc_comment,
)]
#[allow(non_camel_case_types)]
struct CLI_Args {
    /// Path of an exported event-log file.
    #[clap(required = true)]
    path: String,

    /// Read the log newest-record first.
    #[clap(short = 'B', long)]
    backwards: bool,

    /// Also hex dump each record's event-specific data.
    #[clap(short = 'd', long)]
    data: bool,

    /// Print a summary of read activity afterward.
    #[clap(short = 's', long)]
    summary: bool,

    /// Initial read buffer size in bytes.
    #[clap(long, value_name = "BYTES")]
    buffer_sz: Option<usize>,
}

/// `ColorSpec` for a record of the given severity.
fn color_for(event_type: EventLogType) -> ColorSpec {
    let mut spec = ColorSpec::new();
    match event_type {
        EventLogType::Error => spec.set_fg(Some(Color::Red)),
        EventLogType::Warning => spec.set_fg(Some(Color::Yellow)),
        EventLogType::AuditFailure => spec.set_fg(Some(Color::Red)).set_bold(true),
        EventLogType::AuditSuccess => spec.set_fg(Some(Color::Green)),
        EventLogType::Informational => &mut spec,
    };

    spec
}

/// Print one record on one line; the leading fields severity-colored.
fn print_record(
    stdout: &mut StandardStream,
    record: &EventLogRecord,
    with_data: bool,
) -> Result<()> {
    stdout.set_color(&color_for(record.event_type()))?;
    write!(
        stdout,
        "{:>8} {} {:<13}",
        record.record_number(),
        record.dt_generated().format("%Y-%m-%dT%H:%M:%SZ"),
        record.event_type(),
    )?;
    stdout.reset()?;
    write!(
        stdout,
        " {}/{} event {} ({})",
        record.source(),
        record.computer(),
        record.event_id(),
        record.status_code(),
    )?;
    if let Some(strings) = record.strings() {
        write!(stdout, " [{}]", strings.join(" | "))?;
    }
    writeln!(stdout)?;
    if with_data {
        if let Some(data) = record.data() {
            write!(stdout, "          data ({} bytes):", data.len())?;
            for (index, byte) in data.iter().enumerate() {
                if index % 16 == 0 {
                    write!(stdout, "\n          ")?;
                }
                write!(stdout, "{:02x} ", byte)?;
            }
            writeln!(stdout)?;
        }
    }

    Ok(())
}

fn print_summary(
    stdout: &mut StandardStream,
    name: &FPath,
    summary: &SummaryEventLogReader,
) -> Result<()> {
    writeln!(stdout, "Summary for {:?}:", name)?;
    writeln!(stdout, "  records read   {}", summary.eventlogreader_records_read)?;
    writeln!(stdout, "  source reads   {}", summary.eventlogreader_reads)?;
    writeln!(stdout, "  buffer grows   {}", summary.eventlogreader_buffer_grows)?;
    writeln!(stdout, "  buffer size    {} bytes", summary.eventlogreader_buffer_sz)?;
    if let (Some(first), Some(last)) = (
        summary.eventlogreader_record_number_first,
        summary.eventlogreader_record_number_last,
    ) {
        writeln!(stdout, "  record numbers {}‥{}", first, last)?;
    }
    if let Some(ref error) = summary.eventlogreader_error {
        writeln!(stdout, "  error          {}", error)?;
    }

    Ok(())
}

fn run(args: CLI_Args) -> Result<Count> {
    let path: FPath = args.path.clone();
    let source: FileEventLog = FileEventLog::open(path.clone())
        .with_context(|| format!("failed to open event log file {:?}", path))?;
    let direction: Direction = match args.backwards {
        true => Direction::Backwards,
        false => Direction::Forwards,
    };
    let name: FPath = basename(&path);
    let mut reader: EventLogReader<FileEventLog> = match args.buffer_sz {
        Some(sz) => EventLogReader::with_buffer_sz(source, name.clone(), direction, sz),
        None => EventLogReader::new(source, name.clone(), direction),
    };
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);

    let mut count: Count = 0;
    let result: Result<()> = loop {
        match reader.read_record() {
            ResultNext::Found(record) => {
                count += 1;
                if let Err(err) = print_record(&mut stdout, &record, args.data) {
                    break Err(err);
                }
            }
            ResultNext::Done => break Ok(()),
            ResultNext::Err(err) => {
                break Err(err).with_context(|| format!("failed reading event log file {:?}", path));
            }
        }
    };
    if args.summary {
        print_summary(&mut stdout, &name, &reader.summary())?;
    }
    reader.close();
    result?;

    Ok(count)
}

fn main() -> ExitCode {
    let args = CLI_Args::parse();
    match run(args) {
        Ok(_count) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {:#}", err);

            ExitCode::FAILURE
        }
    }
}
