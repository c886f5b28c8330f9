// Decoders (CSV, ORC, whatever) see two things from the store: a sink to
// push decoded cells into, one column writer per column, and a preview
// that guesses a schema from a few sample rows before the real parse.
// Nothing here knows about any file format.

mod preview;
mod sink;

#[cfg(test)]
mod test;

pub use preview::{format_g, format_time, preview, ColumnPreview, Preview};
pub use sink::{ColumnWriter, ParseSink};

/// A decoded input cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Na,
    /// Exact decimal `mantissa * 10^exp`, as text decoders produce.
    Dec { mantissa: i64, exp: i32 },
    /// Binary float, as columnar decoders produce.
    Flo(f64),
    Str(String),
    /// Milliseconds since the Unix epoch.
    Time(i64),
}

impl Datum {
    pub fn is_na(&self) -> bool {
        matches!(self, Datum::Na)
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Dec { mantissa: v, exp: 0 }
    }
}

impl From<f64> for Datum {
    fn from(v: f64) -> Self {
        Datum::Flo(v)
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::Str(v.to_string())
    }
}
