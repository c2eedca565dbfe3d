/*!
    Reads and writes the task table in its flat CSV form.

    The header names the columns, so the order of columns in a file
    written by another tool does not matter. Quoted fields may contain
    separators, doubled quotes and line breaks.
!*/
use chrono::{NaiveDate, NaiveDateTime};
use winnow::Parser;
use winnow::Result;
use winnow::ascii::line_ending;
use winnow::combinator::{alt, delimited, eof, repeat, separated, terminated};
use winnow::error::ParserError;
use winnow::token::{none_of, take_while};

use crate::error::Error;
use crate::task::{Deadline, Priority, Task};

pub const HEADER: [&str; 8] = [
    "id",
    "taskName",
    "priority",
    "deadline",
    "date_created",
    "visible",
    "completed",
    "dateCompleted",
];

const ID: usize = 0;
const NAME: usize = 1;
const PRIORITY: usize = 2;
const DEADLINE: usize = 3;
const CREATED: usize = 4;
const VISIBLE: usize = 5;
const COMPLETED: usize = 6;
const DATE_COMPLETED: usize = 7;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const NOT_COMPLETED: &str = "N/A";

/// Parses a strict `YYYY-MM-DD` date, surrounding whitespace aside.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    iso_date.parse(raw.trim()).ok()
}

fn iso_date(input: &mut &str) -> Result<NaiveDate> {
    let (year, _, month, _, day) = (year, '-', two_digits, '-', two_digits).parse_next(input)?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ParserError::from_input(&*input))
}

fn year(input: &mut &str) -> Result<i32> {
    take_while(4, '0'..='9')
        .try_map(str::parse::<i32>)
        .parse_next(input)
}

fn two_digits(input: &mut &str) -> Result<u32> {
    take_while(2, '0'..='9')
        .try_map(str::parse::<u32>)
        .parse_next(input)
}

fn quoted_field(input: &mut &str) -> Result<String> {
    delimited(
        '"',
        repeat(0.., alt(("\"\"".value('"'), none_of('"')))),
        '"',
    )
    .parse_next(input)
}

fn bare_field<'s>(input: &mut &'s str) -> Result<&'s str> {
    take_while(0.., |c: char| !matches!(c, ',' | '"' | '\r' | '\n')).parse_next(input)
}

fn field(input: &mut &str) -> Result<String> {
    alt((quoted_field, bare_field.map(str::to_string))).parse_next(input)
}

fn record(input: &mut &str) -> Result<Vec<String>> {
    terminated(separated(1.., field, ','), alt((line_ending, eof))).parse_next(input)
}

/// Splits `text` into records of raw fields, each with its 1-based position
/// in the file. Blank lines are skipped but still counted.
fn records(text: &str) -> Result<Vec<(usize, Vec<String>)>, Error> {
    let mut input = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut number = 0;
    while !input.is_empty() {
        number += 1;
        let fields = record
            .parse_next(&mut input)
            .map_err(|e| Error::StoreCorrupt {
                record: number,
                reason: format!("malformed CSV: {e}"),
            })?;
        if fields.len() == 1 && fields[0].trim().is_empty() {
            continue;
        }
        rows.push((number, fields));
    }
    Ok(rows)
}

/// Position of each [`HEADER`] column in a particular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    positions: [usize; 8],
    width: usize,
}

impl Default for Columns {
    fn default() -> Self {
        Columns {
            positions: [ID, NAME, PRIORITY, DEADLINE, CREATED, VISIBLE, COMPLETED, DATE_COMPLETED],
            width: HEADER.len(),
        }
    }
}

impl Columns {
    fn from_header(record: usize, header: &[String]) -> Result<Self, Error> {
        let mut positions = [0; 8];
        for (slot, name) in positions.iter_mut().zip(HEADER) {
            *slot = header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| Error::StoreCorrupt {
                    record,
                    reason: format!("missing column '{name}'"),
                })?;
        }
        Ok(Columns {
            positions,
            width: header.len(),
        })
    }

    /// The layout declared by the header of `text`. `None` when there is no header yet.
    pub fn of(text: &str) -> Result<Option<Self>, Error> {
        match records(text)?.first() {
            Some((number, header)) => Columns::from_header(*number, header).map(Some),
            None => Ok(None),
        }
    }

    fn task(&self, fields: &[String]) -> Result<Task, String> {
        let get = |column: usize| {
            fields
                .get(self.positions[column])
                .map(|f| f.trim())
                .ok_or_else(|| format!("missing value for '{}'", HEADER[column]))
        };

        let id = get(ID)?;
        let created = get(CREATED)?;
        let date_completed = get(DATE_COMPLETED)?;
        Ok(Task {
            id: id
                .parse()
                .map_err(|e| format!("invalid id '{id}': {e}"))?,
            name: get(NAME)?.to_string(),
            priority: Priority::from_label(get(PRIORITY)?),
            deadline: Deadline::parse(get(DEADLINE)?),
            date_created: parse_timestamp(created)
                .ok_or_else(|| format!("invalid date_created '{created}'"))?,
            visible: parse_bool(get(VISIBLE)?, HEADER[VISIBLE])?,
            completed: parse_bool(get(COMPLETED)?, HEADER[COMPLETED])?,
            date_completed: match date_completed {
                "" | NOT_COMPLETED | "NaN" | "nan" => None,
                raw => Some(
                    parse_date(raw).ok_or_else(|| format!("invalid dateCompleted '{raw}'"))?,
                ),
            },
        })
    }

    /// One line for `task` with its fields in this layout's order.
    /// Columns unknown to the task are left empty.
    pub fn encode_row(&self, task: &Task) -> String {
        let mut fields = vec![String::new(); self.width];
        for (column, value) in encode_fields(task).into_iter().enumerate() {
            fields[self.positions[column]] = value;
        }
        let mut line = fields.join(",");
        line.push('\n');
        line
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn parse_bool(raw: &str, column: &str) -> Result<bool, String> {
    match raw {
        "True" | "true" | "TRUE" => Ok(true),
        "False" | "false" | "FALSE" => Ok(false),
        other => Err(format!("invalid {column} '{other}'")),
    }
}

/// Decodes a whole table. Empty text, or a header alone, gives no tasks.
pub fn decode(text: &str) -> Result<Vec<Task>, Error> {
    let mut rows = records(text)?.into_iter();
    let Some((number, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = Columns::from_header(number, &header)?;
    rows.map(|(record, fields)| {
        columns
            .task(&fields)
            .map_err(|reason| Error::StoreCorrupt { record, reason })
    })
    .collect()
}

pub fn header_line() -> String {
    let mut line = HEADER.join(",");
    line.push('\n');
    line
}

fn encode_fields(task: &Task) -> [String; 8] {
    [
        task.id.to_string(),
        escape(&task.name),
        escape(task.priority.label()),
        escape(&task.deadline.to_string()),
        task.date_created.format(TIMESTAMP_FORMAT).to_string(),
        bool_token(task.visible).to_string(),
        bool_token(task.completed).to_string(),
        task.date_completed
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NOT_COMPLETED.to_string()),
    ]
}

/// Header plus one line per task, in [`HEADER`] order.
pub fn encode(tasks: &[Task]) -> String {
    let columns = Columns::default();
    tasks.iter().fold(header_line(), |mut out, task| {
        out.push_str(&columns.encode_row(task));
        out
    })
}

fn bool_token(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
