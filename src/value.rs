//! The runtime value algebra: a sum type with one constructor per kind, not
//! a dynamic "any" bag. Arithmetic and comparisons dispatch by pattern
//! match against this type directly.

use chrono::{DateTime, Duration as ChronoDuration};
use chrono_tz::Tz;

use crate::ast::ValueKind;
use crate::error::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Time(DateTime<Tz>),
    Duration(f64),
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Time(_) => ValueKind::Time,
            Value::Duration(_) => ValueKind::Duration,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Tz>> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_duration_minutes(&self) -> Option<f64> {
        match self {
            Value::Duration(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The sentinel instant meaning "no valid time": the Unix epoch in the
    /// value's own timezone. Astronomically unreachable for any real sun
    /// event, so it is safe to use as a propagated "invalid" marker.
    pub fn zero_instant(tz: Tz) -> Value {
        Value::Time(DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap().with_timezone(&tz))
    }

    pub fn is_zero_instant(&self) -> bool {
        match self {
            Value::Time(t) => t.timestamp() == 0,
            _ => false,
        }
    }
}

pub fn add(left: &Value, right: &Value) -> Result<Value, Diagnostic> {
    match (left, right) {
        (Value::Time(t), Value::Duration(m)) | (Value::Duration(m), Value::Time(t)) => {
            Ok(Value::Time(*t + minutes_to_chrono(*m)?))
        }
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(a + b)),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        _ => Err(Diagnostic::runtime(format!("cannot add {:?} and {:?}", left.kind(), right.kind()))),
    }
}

pub fn sub(left: &Value, right: &Value) -> Result<Value, Diagnostic> {
    match (left, right) {
        (Value::Time(t), Value::Duration(m)) => Ok(Value::Time(*t - minutes_to_chrono(*m)?)),
        (Value::Time(a), Value::Time(b)) => Ok(Value::Duration((*a - *b).num_seconds() as f64 / 60.0)),
        (Value::Duration(a), Value::Duration(b)) => Ok(Value::Duration(a - b)),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        _ => Err(Diagnostic::runtime(format!("cannot subtract {:?} from {:?}", right.kind(), left.kind()))),
    }
}

pub fn mul(left: &Value, right: &Value) -> Result<Value, Diagnostic> {
    match (left, right) {
        (Value::Duration(d), Value::Number(n)) | (Value::Number(n), Value::Duration(d)) => {
            let product = d * n;
            if !product.is_finite() || product.abs() > i64::MAX as f64 / 60_000_000_000.0 {
                return Err(Diagnostic::runtime("duration multiplication overflow"));
            }
            Ok(Value::Duration(product))
        }
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        _ => Err(Diagnostic::runtime(format!("cannot multiply {:?} and {:?}", left.kind(), right.kind()))),
    }
}

pub fn div(left: &Value, right: &Value) -> Result<Value, Diagnostic> {
    match (left, right) {
        (Value::Duration(d), Value::Number(n)) => {
            if *n == 0.0 {
                return Err(Diagnostic::runtime("division by zero"));
            }
            Ok(Value::Duration(d / n))
        }
        (Value::Number(a), Value::Number(b)) => {
            if *b == 0.0 {
                return Err(Diagnostic::runtime("division by zero"));
            }
            Ok(Value::Number(a / b))
        }
        _ => Err(Diagnostic::runtime(format!("cannot divide {:?} by {:?}", left.kind(), right.kind()))),
    }
}

fn minutes_to_chrono(minutes: f64) -> Result<ChronoDuration, Diagnostic> {
    if !minutes.is_finite() || minutes.abs() > i64::MAX as f64 / 60_000.0 {
        return Err(Diagnostic::runtime("duration overflow"));
    }
    Ok(ChronoDuration::milliseconds((minutes * 60_000.0) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jerusalem_time(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> Value {
        Value::Time(chrono_tz::Asia::Jerusalem.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap())
    }

    #[test]
    fn time_plus_duration_is_time() {
        let t = jerusalem_time(2024, 3, 21, 6, 0);
        let result = add(&t, &Value::Duration(30.0)).unwrap();
        assert_eq!(result.kind(), ValueKind::Time);
    }

    #[test]
    fn time_minus_time_is_duration() {
        let a = jerusalem_time(2024, 3, 21, 18, 0);
        let b = jerusalem_time(2024, 3, 21, 6, 0);
        let result = sub(&a, &b).unwrap();
        assert_eq!(result, Value::Duration(720.0));
    }

    #[test]
    fn time_plus_time_is_error() {
        let a = jerusalem_time(2024, 3, 21, 6, 0);
        let b = jerusalem_time(2024, 3, 21, 7, 0);
        assert!(add(&a, &b).is_err());
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        assert!(div(&Value::Number(1.0), &Value::Number(0.0)).is_err());
        assert!(div(&Value::Duration(60.0), &Value::Number(0.0)).is_err());
    }

    #[test]
    fn duration_times_number_overflow_is_error() {
        let huge = Value::Duration(1e18);
        assert!(mul(&huge, &Value::Number(1e18)).is_err());
    }

    #[test]
    fn zero_instant_is_epoch() {
        let z = Value::zero_instant(chrono_tz::Asia::Jerusalem);
        assert!(z.is_zero_instant());
        let t = jerusalem_time(2024, 3, 21, 6, 0);
        assert!(!t.is_zero_instant());
    }

    #[test]
    fn number_arithmetic() {
        assert_eq!(add(&Value::Number(2.0), &Value::Number(3.0)).unwrap(), Value::Number(5.0));
        assert_eq!(mul(&Value::Number(2.0), &Value::Number(3.0)).unwrap(), Value::Number(6.0));
    }
}
