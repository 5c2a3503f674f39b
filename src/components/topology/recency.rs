//! Bucketed freshness of agent check-ins and link events.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::error::{TopologyError, TopologyResult};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Offset form that also takes the hour-only `+00` Postgres prints.
const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%#z";

/// Accepted shapes for timestamps that carry no zone; they are read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Human-readable recency category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
	/// No timestamp at all.
	Never,
	/// Timestamp present but unparseable.
	Error,
	/// Under a minute; whole seconds.
	Seconds(i64),
	/// Under an hour; whole minutes.
	Minutes(i64),
	/// Under a day; whole hours.
	Hours(i64),
	/// A day or more; whole days.
	Days(i64),
}

impl fmt::Display for Freshness {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Freshness::Never => f.write_str("NEVER"),
			Freshness::Error => f.write_str("ERROR"),
			Freshness::Seconds(n) => write!(f, "{n}s ago"),
			Freshness::Minutes(n) => write!(f, "{n}m ago"),
			Freshness::Hours(n) => write!(f, "{n}h ago"),
			Freshness::Days(n) => write!(f, "{n}d ago"),
		}
	}
}

/// Elapsed time since a timestamp together with its bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recency {
	/// Clamped to zero; `None` for `Never` and `Error`.
	pub elapsed_secs: Option<i64>,
	/// Display category of `elapsed_secs`.
	pub bucket: Freshness,
}

impl Recency {
	/// Recency of a node that has no timestamp yet.
	pub fn never() -> Self {
		Self {
			elapsed_secs: None,
			bucket: Freshness::Never,
		}
	}

	fn error() -> Self {
		Self {
			elapsed_secs: None,
			bucket: Freshness::Error,
		}
	}

	/// Bucket an elapsed duration, clamping clock skew to zero.
	pub fn from_elapsed(elapsed_secs: i64) -> Self {
		let e = elapsed_secs.max(0);
		let bucket = if e < MINUTE {
			Freshness::Seconds(e)
		} else if e < HOUR {
			Freshness::Minutes(e / MINUTE)
		} else if e < DAY {
			Freshness::Hours(e / HOUR)
		} else {
			Freshness::Days(e / DAY)
		};
		Self {
			elapsed_secs: Some(e),
			bucket,
		}
	}
}

/// Parse a timestamp, treating one without a zone qualifier as UTC.
pub fn parse_timestamp(raw: &str) -> TopologyResult<DateTime<Utc>> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Err(TopologyError::Timestamp(raw.to_string()));
	}
	// Postgres-style output uses a space between date and time.
	let normalized = match trimmed.split_once(' ') {
		Some((date, time)) if date.len() == 10 => format!("{date}T{}", time.replace(' ', "")),
		_ => trimmed.to_string(),
	};

	if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
		return Ok(dt.with_timezone(&Utc));
	}
	if let Ok(dt) = DateTime::parse_from_str(&normalized, OFFSET_FORMAT) {
		return Ok(dt.with_timezone(&Utc));
	}
	NAIVE_FORMATS
		.iter()
		.find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
		.map(|naive| naive.and_utc())
		.ok_or_else(|| TopologyError::Timestamp(raw.to_string()))
}

/// Freshness of an optional timestamp relative to `now`. Never fails.
pub fn evaluate(timestamp: Option<&str>, now: DateTime<Utc>) -> Recency {
	let Some(raw) = timestamp else {
		return Recency::never();
	};
	match parse_timestamp(raw) {
		Ok(at) => Recency::from_elapsed((now - at).num_seconds()),
		Err(_) => Recency::error(),
	}
}

/// Whether the timestamp lies within `window` of `now`.
pub fn is_active(timestamp: Option<&str>, now: DateTime<Utc>, window: Duration) -> bool {
	evaluate(timestamp, now)
		.elapsed_secs
		.is_some_and(|e| e <= window.num_seconds())
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
	}

	fn ago(secs: i64) -> String {
		(now() - Duration::seconds(secs)).to_rfc3339()
	}

	fn bucket_for(secs: i64) -> Freshness {
		evaluate(Some(&ago(secs)), now()).bucket
	}

	#[test]
	fn bucket_boundaries() {
		assert_eq!(bucket_for(0), Freshness::Seconds(0));
		assert_eq!(bucket_for(59), Freshness::Seconds(59));
		assert_eq!(bucket_for(60), Freshness::Minutes(1));
		assert_eq!(bucket_for(3599), Freshness::Minutes(59));
		assert_eq!(bucket_for(3600), Freshness::Hours(1));
		assert_eq!(bucket_for(86_399), Freshness::Hours(23));
		assert_eq!(bucket_for(86_400), Freshness::Days(1));
	}

	#[test]
	fn missing_timestamp_is_never() {
		let r = evaluate(None, now());
		assert_eq!(r.bucket, Freshness::Never);
		assert_eq!(r.bucket.to_string(), "NEVER");
	}

	#[test]
	fn garbage_is_error_bucket() {
		let r = evaluate(Some("yesterday-ish"), now());
		assert_eq!(r.bucket, Freshness::Error);
		assert_eq!(r.elapsed_secs, None);
	}

	#[test]
	fn future_timestamp_clamps_to_zero() {
		let r = evaluate(Some(&ago(-30)), now());
		assert_eq!(r.bucket, Freshness::Seconds(0));
		assert_eq!(r.bucket.to_string(), "0s ago");
	}

	#[test]
	fn zoneless_timestamp_reads_as_utc() {
		let r = evaluate(Some("2024-05-01T11:59:00.123456"), now());
		assert_eq!(r.bucket, Freshness::Seconds(59));
		let r = evaluate(Some("2024-05-01 11:00:00"), now());
		assert_eq!(r.bucket, Freshness::Hours(1));
	}

	#[test]
	fn explicit_offset_respected() {
		let r = evaluate(Some("2024-05-01T14:00:00+02:00"), now());
		assert_eq!(r.bucket, Freshness::Seconds(0));
	}

	#[test]
	fn postgres_short_offsets() {
		let r = evaluate(Some("2024-05-01 11:59:30+00"), now());
		assert_eq!(r.bucket, Freshness::Seconds(30));
		let r = evaluate(Some("2024-05-01T11:59:30+0000"), now());
		assert_eq!(r.bucket, Freshness::Seconds(30));
		let r = evaluate(Some("2024-05-01 11:59:30.5+00"), now());
		assert_eq!(r.bucket, Freshness::Seconds(29));
		let r = evaluate(Some("2024-05-01 13:59:30+02"), now());
		assert_eq!(r.bucket, Freshness::Seconds(30));
	}

	#[test]
	fn activity_window() {
		let window = Duration::seconds(5);
		assert!(is_active(Some(&ago(4)), now(), window));
		assert!(!is_active(Some(&ago(10)), now(), window));
		assert!(!is_active(None, now(), window));
		assert!(!is_active(Some("bad"), now(), window));
	}
}
