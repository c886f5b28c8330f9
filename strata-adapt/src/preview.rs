use crate::Datum;
use chrono::DateTime;
use std::collections::HashSet;
use strata_coldb::{dec_to_f64, ColumnType};

const EXAMPLES: usize = 10;
const MAX_GUESSED_LEVELS: usize = 256;

static NA: Datum = Datum::Na;

fn cell(row: &[Datum], i: usize) -> &Datum {
    row.get(i).unwrap_or(&NA)
}

/// Schema guess for a sample of decoded rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    pub columns: Vec<ColumnPreview>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnPreview {
    pub name: String,
    pub ctype: ColumnType,
    /// Up to ten cells from the first rows, formatted for display.
    pub examples: Vec<String>,
}

impl Preview {
    pub fn types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(|c| c.ctype).collect()
    }
}

/// Formats a number the way `%g` does: six significant digits, decimal
/// notation for exponents in `-4..6`, otherwise `d.ddddde±XX`.
pub fn format_g(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let sci = format!("{:.5e}", v);
    let (mant, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..6).contains(&exp) {
        format!("{:.*}", (5 - exp) as usize, v)
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mant, sign, exp.abs())
    }
}

/// Formats epoch milliseconds as `yyyy-MM-dd HH:mm:ss` in UTC. Instants
/// outside chrono's range format as empty, like NA.
pub fn format_time(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn format_datum(d: &Datum) -> String {
    match d {
        Datum::Na => String::new(),
        Datum::Dec { mantissa, exp } => format_g(dec_to_f64(*mantissa, *exp)),
        Datum::Flo(f) => format_g(*f),
        Datum::Str(s) => s.clone(),
        Datum::Time(ms) => format_time(*ms),
    }
}

fn guess_type<'a>(cells: impl Iterator<Item = &'a Datum>, sample_rows: usize) -> ColumnType {
    let (mut nums, mut times) = (0, 0);
    let mut strs = HashSet::new();
    for d in cells {
        match d {
            Datum::Na => {}
            Datum::Dec { .. } | Datum::Flo(_) => nums += 1,
            Datum::Time(_) => times += 1,
            Datum::Str(s) => {
                strs.insert(s.as_str());
            }
        }
    }
    if !strs.is_empty() {
        let limit = (sample_rows / 2).max(1).min(MAX_GUESSED_LEVELS);
        if nums == 0 && times == 0 && strs.len() <= limit {
            ColumnType::Cat
        } else {
            ColumnType::Str
        }
    } else if times > 0 && nums == 0 {
        ColumnType::Time
    } else {
        ColumnType::Num
    }
}

/// Guesses a column type for each named column from sample rows and
/// formats a few example cells. Rows shorter than `names` read as NA in
/// the missing columns.
pub fn preview<S: AsRef<str>>(names: &[S], rows: &[Vec<Datum>]) -> Preview {
    let columns = names
        .iter()
        .enumerate()
        .map(|(i, name)| ColumnPreview {
            name: name.as_ref().to_string(),
            ctype: guess_type(rows.iter().map(|r| cell(r, i)), rows.len()),
            examples: rows
                .iter()
                .take(EXAMPLES)
                .map(|r| format_datum(cell(r, i)))
                .collect(),
        })
        .collect();
    Preview { columns }
}
