//! Lenient timestamp handling for GitHub JSON. Most of the API sends
//! ISO-8601 strings but webhook push payloads carry `created_at` and
//! `pushed_at` as epoch numbers, so deserialization accepts both.

use chrono::{DateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Epoch values above this are taken as milliseconds, below as seconds.
const MILLIS_CUTOFF: i64 = 10_000_000_000;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
// Older API versions used this variant.
const FORMAT_LEGACY: &str = "%Y/%m/%d %H:%M:%S %z";

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
	Timestamp(i64),
	Text(String),
}

fn from_raw<E: de::Error>(raw: Raw) -> Result<DateTime<Utc>, E> {
	match raw {
		Raw::Timestamp(n) => {
			let secs = if n > MILLIS_CUTOFF {
				n.div_euclid(1000)
			} else {
				n
			};
			let nanos = if n > MILLIS_CUTOFF {
				(n.rem_euclid(1000) * 1_000_000) as u32
			} else {
				0
			};
			Utc.timestamp_opt(secs, nanos).single().ok_or_else(|| {
				E::custom(format!("timestamp out of range: {}", n))
			})
		}
		Raw::Text(s) => DateTime::parse_from_rfc3339(&s)
			.or_else(|_| DateTime::parse_from_str(&s, FORMAT_LEGACY))
			.map(|dt| dt.with_timezone(&Utc))
			.map_err(|e| E::custom(format!("unrecognized date `{}`: {}", s, e))),
	}
}

pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	serializer.serialize_str(&date.format(FORMAT).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
	D: Deserializer<'de>,
{
	from_raw(Raw::deserialize(deserializer)?)
}

pub mod opt {
	use super::*;

	pub fn serialize<S>(
		date: &Option<DateTime<Utc>>,
		serializer: S,
	) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		match date {
			Some(date) => super::serialize(date, serializer),
			None => serializer.serialize_none(),
		}
	}

	pub fn deserialize<'de, D>(
		deserializer: D,
	) -> Result<Option<DateTime<Utc>>, D::Error>
	where
		D: Deserializer<'de>,
	{
		match Option::<Raw>::deserialize(deserializer)? {
			Some(raw) => from_raw(raw).map(Some),
			None => Ok(None),
		}
	}
}
