//! Day keys and the dayjs-style name templates used for folders and files.
//!
//! Templates are written the way the card configuration writes them
//! (`YYYYMMDD`, `YYYYMMDD_HHmmss`, `HH:mm:ss`) and compiled once into a chrono
//! strftime string.

use chrono::format::{self, ParseResult, Parsed, StrftimeItems};
use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Canonical rendering of a [`DayKey`].
pub const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Label shown for a recording whose title did not match the file-name template.
pub const INVALID_INSTANT_LABEL: &str = "Invalid Date";

/// A calendar day, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The day `days` calendar days away. Stays put at the edges of chrono's range.
    pub fn shift(self, days: i64) -> Self {
        let shifted = if days >= 0 {
            self.0.checked_add_days(Days::new(days as u64))
        } else {
            self.0.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        shifted.map(Self).unwrap_or(self)
    }

    /// Parses `YYYY-MM-DD`; blank input means today.
    pub fn parse_or_today(input: &str) -> Result<Self, chrono::ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::today());
        }
        input.parse()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_KEY_FORMAT).map(Self)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Template tokens, longest first so `YYYY` wins over `YY` and `MM` over `M`.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("MMMM", "%B"),
    ("dddd", "%A"),
    ("SSS", "%3f"),
    ("MMM", "%b"),
    ("ddd", "%a"),
    ("YY", "%y"),
    ("ZZ", "%z"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("hh", "%I"),
    ("mm", "%M"),
    ("ss", "%S"),
    ("M", "%-m"),
    ("D", "%-d"),
    ("H", "%-H"),
    ("h", "%-I"),
    ("m", "%-M"),
    ("s", "%-S"),
    ("A", "%p"),
    ("a", "%P"),
    ("Z", "%:z"),
    ("X", "%s"),
];

/// A compiled name template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    template: String,
    strftime: String,
    fields: DateFields,
}

/// Which parts of a date a template spells out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DateFields {
    year: bool,
    month: bool,
    day: bool,
    epoch: bool,
}

impl DateFields {
    fn note(&mut self, token: &str) {
        match token {
            "YYYY" | "YY" => self.year = true,
            "MMMM" | "MMM" | "MM" | "M" => self.month = true,
            "DD" | "D" => self.day = true,
            "X" => self.epoch = true,
            _ => {}
        }
    }

    /// Fills the date fields the template leaves out from `reference`.
    ///
    /// A missing year is the reference year. A missing month is January when
    /// only the year is given, else the reference month. A missing day is the
    /// 1st when a year or month is given, else the reference day.
    fn fill(self, parsed: &mut Parsed, reference: NaiveDate) -> ParseResult<()> {
        if self.epoch {
            return Ok(());
        }
        if !self.year {
            parsed.set_year(i64::from(reference.year()))?;
        }
        if !self.month {
            let month = if self.year { 1 } else { reference.month() };
            parsed.set_month(i64::from(month))?;
        }
        if !self.day {
            let day = if self.year || self.month { 1 } else { reference.day() };
            parsed.set_day(i64::from(day))?;
        }
        Ok(())
    }
}

impl Pattern {
    pub fn new(template: &str) -> Self {
        let (strftime, fields) = to_strftime(template);
        Self {
            template: template.to_string(),
            strftime,
            fields,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Instants are naive; offset tokens render as UTC.
    pub fn format(&self, instant: NaiveDateTime) -> String {
        instant.and_utc().format(&self.strftime).to_string()
    }

    /// Renders a day at midnight, so time tokens in a folder template come out as zeros.
    pub fn format_day(&self, day: DayKey) -> String {
        self.format(day.date().and_time(NaiveTime::MIN))
    }

    /// Label for a possibly invalid instant.
    pub fn format_or_invalid(&self, instant: Option<NaiveDateTime>) -> String {
        match instant {
            Some(instant) => self.format(instant),
            None => INVALID_INSTANT_LABEL.to_string(),
        }
    }

    /// [`Pattern::parse_on`] with today as the reference day.
    pub fn parse(&self, input: &str) -> Option<NaiveDateTime> {
        self.parse_on(input, DayKey::today())
    }

    /// Reads an instant from the start of `input`; anything after the matched
    /// template (a file extension, a camera suffix) is ignored. A template
    /// without time tokens yields midnight. Date parts the template lacks come
    /// from `reference`, so `HH-mm-ss` titles land on the day being browsed.
    pub fn parse_on(&self, input: &str, reference: DayKey) -> Option<NaiveDateTime> {
        let mut parsed = Parsed::new();
        format::parse_and_remainder(
            &mut parsed,
            input.trim_start(),
            StrftimeItems::new(&self.strftime),
        )
        .ok()?;
        self.fields.fill(&mut parsed, reference.date()).ok()?;
        if let Ok(instant) = parsed.to_naive_datetime_with_offset(0) {
            return Some(instant);
        }
        let date = parsed.to_naive_date().ok()?;
        let time = parsed.to_naive_time().unwrap_or(NaiveTime::MIN);
        Some(date.and_time(time))
    }
}

impl From<&str> for Pattern {
    fn from(template: &str) -> Self {
        Self::new(template)
    }
}

fn to_strftime(template: &str) -> (String, DateFields) {
    let mut out = String::with_capacity(template.len() * 2);
    let mut fields = DateFields::default();
    let mut rest = template;

    'outer: while let Some(c) = rest.chars().next() {
        // [escaped text]
        if c == '[' {
            if let Some(end) = rest.find(']') {
                push_literal(&mut out, &rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }

        for (token, directive) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(directive);
                fields.note(token);
                rest = tail;
                continue 'outer;
            }
        }

        push_literal(&mut out, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }

    (out, fields)
}

fn push_literal(out: &mut String, literal: &str) {
    for c in literal.chars() {
        if c == '%' {
            out.push_str("%%");
        } else {
            out.push(c);
        }
    }
}

/// Folder segment for `day` under `pattern`.
pub fn folder_path(day: DayKey, pattern: &Pattern) -> String {
    pattern.format_day(day)
}

/// Start instant encoded in a recording's title, or `None` if it does not match.
///
/// `day` is the day folder the recording was found under; it supplies whatever
/// date parts the pattern does not.
pub fn parse_title(title: &str, pattern: &Pattern, day: DayKey) -> Option<NaiveDateTime> {
    pattern.parse_on(title, day)
}
