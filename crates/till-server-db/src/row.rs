// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared column parsing for TEXT-encoded values.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
	Uuid::parse_str(value).map_err(|e| DbError::Internal(format!("Invalid {field} UUID: {e}")))
}

pub(crate) fn parse_uuid_opt(field: &str, value: Option<String>) -> Result<Option<Uuid>, DbError> {
	value.map(|s| parse_uuid(field, &s)).transpose()
}

pub(crate) fn parse_datetime(field: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}

pub(crate) fn parse_datetime_opt(
	field: &str,
	value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DbError> {
	value.map(|s| parse_datetime(field, &s)).transpose()
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DbError> {
	NaiveDate::parse_from_str(value, "%Y-%m-%d")
		.map_err(|e| DbError::Internal(format!("Invalid {field}: {e}")))
}

pub(crate) fn parse_date_opt(
	field: &str,
	value: Option<String>,
) -> Result<Option<NaiveDate>, DbError> {
	value.map(|s| parse_date(field, &s)).transpose()
}

pub(crate) fn parse_json(field: &str, value: &str) -> Result<serde_json::Value, DbError> {
	serde_json::from_str(value)
		.map_err(|e| DbError::Internal(format!("Invalid {field} payload: {e}")))
}

pub(crate) fn parse_json_opt(
	field: &str,
	value: Option<String>,
) -> Result<Option<serde_json::Value>, DbError> {
	value.map(|s| parse_json(field, &s)).transpose()
}
