//! DuckDB value -> JSON conversion for result rows

use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, ValueRef};
use serde_json::Value;

fn to_micros(unit: TimeUnit, value: i64) -> Option<i64> {
    match unit {
        TimeUnit::Second => value.checked_mul(1_000_000),
        TimeUnit::Millisecond => value.checked_mul(1_000),
        TimeUnit::Microsecond => Some(value),
        TimeUnit::Nanosecond => Some(value / 1_000),
    }
}

fn timestamp(unit: TimeUnit, value: i64) -> Value {
    to_micros(unit, value)
        .and_then(|micros| {
            let secs = micros.div_euclid(1_000_000);
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            DateTime::from_timestamp(secs, nanos)
        })
        .map(|ts| Value::String(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
        .unwrap_or(Value::Null)
}

fn date(days: i32) -> Value {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
        .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

fn time(unit: TimeUnit, value: i64) -> Value {
    to_micros(unit, value)
        .and_then(|micros| {
            let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        })
        .map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))
        .unwrap_or(Value::Null)
}

pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => serde_json::json!(f),
        ValueRef::Double(f) => serde_json::json!(f),
        // Exact decimals (prices) stay strings to avoid float rounding
        ValueRef::Decimal(d) => Value::String(d.to_string()),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
        ValueRef::Date32(days) => date(days),
        ValueRef::Time64(unit, v) => time(unit, v),
        ValueRef::Timestamp(unit, v) => timestamp(unit, v),
        _ => Value::String("<unsupported>".to_string()),
    }
}
