use serde::{Deserialize, Serialize};

/// Logical type of a whole vector.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Num,
    Str,
    /// Categorical: small integer codes into an ordered domain of labels.
    Cat,
    /// Milliseconds since the Unix epoch, stored like `Num`.
    Time,
}

impl ColumnType {
    /// The physical representation chunks of this column use.
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Num | ColumnType::Time => DataType::Num,
            ColumnType::Str => DataType::Str,
            ColumnType::Cat => DataType::Cat,
        }
    }
}

/// Physical representation of a chunk's non-NA values.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum DataType {
    Num,
    Str,
    Cat,
}

/// A single decoded cell.
///
/// `Dec` is an exact decimal `mantissa * 10^exp`. Two `Dec`s compare
/// numerically, so `Dec{123,-2} == Dec{1230,-3}`. `Flo` compares by bits,
/// which makes `Flo(NaN) == Flo(NaN)` and keeps NaN distinct from `Na`.
/// A `Dec` equals a `Flo` only when the float is an integer below 2^53 in
/// magnitude (and not `-0.0`) with the same value; rounding never makes
/// them equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Na,
    Dec { mantissa: i64, exp: i32 },
    Flo(f64),
    Str(String),
    Cat(u32),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Dec { mantissa: v, exp: 0 }
    }

    pub fn is_na(&self) -> bool {
        matches!(self, Value::Na)
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Na => None,
            Value::Dec { .. } | Value::Flo(_) => Some(DataType::Num),
            Value::Str(_) => Some(DataType::Str),
            Value::Cat(_) => Some(DataType::Cat),
        }
    }

    /// Numeric view. NA and strings read as NaN; categorical codes read as
    /// their code.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Na | Value::Str(_) => f64::NAN,
            Value::Dec { mantissa, exp } => dec_to_f64(*mantissa, *exp),
            Value::Flo(f) => *f,
            Value::Cat(c) => *c as f64,
        }
    }

    /// Exact integer view of a numeric value, if it has one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Dec { mantissa, exp } => {
                let (m, e) = normalize_dec(*mantissa, *exp);
                if e < 0 {
                    None
                } else {
                    10_i64.checked_pow(e as u32)?.checked_mul(m)
                }
            }
            Value::Flo(f) => exact_int(*f),
            Value::Cat(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Na, Value::Na) => true,
            (Value::Dec { mantissa: m0, exp: e0 }, Value::Dec { mantissa: m1, exp: e1 }) => {
                normalize_dec(*m0, *e0) == normalize_dec(*m1, *e1)
            }
            (Value::Flo(a), Value::Flo(b)) => a.to_bits() == b.to_bits(),
            (Value::Dec { mantissa, exp }, Value::Flo(f))
            | (Value::Flo(f), Value::Dec { mantissa, exp }) => match exact_int(*f) {
                Some(i) => normalize_dec(*mantissa, *exp) == normalize_dec(i, 0),
                None => false,
            },
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Cat(a), Value::Cat(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Flo(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

// The integer a float holds exactly, if it is one every i64 path agrees on.
pub(crate) fn exact_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f.abs() < TWO_POW_53 && !(f == 0.0 && f.is_sign_negative()) {
        Some(f as i64)
    } else {
        None
    }
}

const TWO_POW_53: f64 = 9_007_199_254_740_992.0;

// Every power of ten up to 1e22 is exact in an f64.
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Folds trailing decimal zeros of the mantissa into the exponent. Zero
/// always normalizes to `(0, 0)`.
pub fn normalize_dec(mut mantissa: i64, mut exp: i32) -> (i64, i32) {
    if mantissa == 0 {
        return (0, 0);
    }
    while mantissa % 10 == 0 && exp < i32::MAX {
        mantissa /= 10;
        exp += 1;
    }
    (mantissa, exp)
}

/// Correctly rounded conversion of `mantissa * 10^exp` to f64.
pub fn dec_to_f64(mantissa: i64, exp: i32) -> f64 {
    let m = mantissa as f64;
    // Both operands exact means one rounding, in the operation itself.
    if (mantissa.unsigned_abs() as f64) < TWO_POW_53 {
        if (0..=22).contains(&exp) {
            return m * POW10[exp as usize];
        }
        if (-22..0).contains(&exp) {
            return m / POW10[(-exp) as usize];
        }
    }
    format!("{}e{}", mantissa, exp).parse::<f64>().unwrap_or(f64::NAN)
}
