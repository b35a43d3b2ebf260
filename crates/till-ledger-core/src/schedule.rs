// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pure due-date projection for recurring templates.
//!
//! Projection flow:
//!
//! ```text
//! watermark (last_generated_on)
//!     │
//!     ▼
//! seed month ──clamp──▶ candidate ──≤ today?──▶ emit ──+1 month──▶ reclamp ──…
//!                                      │
//!                                      └─ no ──▶ stop
//! ```
//!
//! The sequence is a pure function of its inputs: re-running with the same
//! watermark and the same `today` yields the same dates. Both the request-time
//! and scheduler-time materialization paths rely on that determinism for their
//! generate-once behavior.
//!
//! Clamping rule: a nominal due day beyond the end of a month posts on that
//! month's last day, and the watermark records the clamped date. The next
//! projection step reclamps from the nominal day again, so a day-31 template
//! posts Feb 28, then Mar 31 — it never drifts down to 28 permanently and
//! never "catches up" mid-month.

use chrono::{Datelike, Months, NaiveDate};

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
	match date.month() {
		4 | 6 | 9 | 11 => 30,
		2 if is_leap_year(date.year()) => 29,
		2 => 28,
		_ => 31,
	}
}

fn is_leap_year(year: i32) -> bool {
	NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

/// Moves `date` to `day` within its own month, clamped to the month's length.
pub fn clamp_to_month(date: NaiveDate, day: u32) -> NaiveDate {
	let clamped = day.min(days_in_month(date)).max(1);
	// clamped is within 1..=days_in_month, so construction cannot fail
	NaiveDate::from_ymd_opt(date.year(), date.month(), clamped).unwrap_or(date)
}

/// Lazy sequence of due dates a template owes, oldest first.
///
/// Created by [`due_dates_up_to`]. Finite: ends with the last clamped date
/// that is `<= today`.
#[derive(Debug, Clone)]
pub struct DueDates {
	candidate: Option<NaiveDate>,
	due_day: u32,
	today: NaiveDate,
}

impl Iterator for DueDates {
	type Item = NaiveDate;

	fn next(&mut self) -> Option<NaiveDate> {
		let due = self.candidate?;
		if due > self.today {
			self.candidate = None;
			return None;
		}
		self.candidate = due
			.checked_add_months(Months::new(1))
			.map(|next| clamp_to_month(next, self.due_day));
		Some(due)
	}
}

/// Projects the due dates owed by a template with the given watermark.
///
/// A template that has never materialized (`last_generated_on` is `None`)
/// starts from the current month; otherwise the sequence starts one calendar
/// month after the watermark. Every emitted date is clamped to its month and
/// `<= today`.
pub fn due_dates_up_to(
	last_generated_on: Option<NaiveDate>,
	due_day_of_month: u32,
	today: NaiveDate,
) -> DueDates {
	let seed = match last_generated_on {
		Some(last) => last.checked_add_months(Months::new(1)),
		None => Some(today),
	};
	DueDates {
		candidate: seed.map(|date| clamp_to_month(date, due_day_of_month)),
		due_day: due_day_of_month,
		today,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn date(y: i32, m: u32, d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	mod clamping {
		use super::*;

		#[test]
		fn day_within_month_is_used_directly() {
			assert_eq!(clamp_to_month(date(2025, 3, 1), 14), date(2025, 3, 14));
		}

		#[test]
		fn day_31_clamps_to_short_months() {
			assert_eq!(clamp_to_month(date(2025, 2, 1), 31), date(2025, 2, 28));
			assert_eq!(clamp_to_month(date(2024, 2, 1), 31), date(2024, 2, 29));
			assert_eq!(clamp_to_month(date(2025, 4, 10), 31), date(2025, 4, 30));
		}

		#[test]
		fn days_in_month_table() {
			assert_eq!(days_in_month(date(2025, 1, 1)), 31);
			assert_eq!(days_in_month(date(2025, 2, 1)), 28);
			assert_eq!(days_in_month(date(2024, 2, 1)), 29);
			assert_eq!(days_in_month(date(2025, 4, 1)), 30);
			assert_eq!(days_in_month(date(2000, 2, 1)), 29);
			assert_eq!(days_in_month(date(1900, 2, 1)), 28);
		}
	}

	mod projection {
		use super::*;

		#[test]
		fn fresh_template_starts_in_current_month() {
			let today = date(2025, 6, 20);
			let dates: Vec<_> = due_dates_up_to(None, 15, today).collect();
			assert_eq!(dates, vec![date(2025, 6, 15)]);
		}

		#[test]
		fn fresh_template_with_future_due_day_emits_nothing() {
			let today = date(2025, 6, 10);
			let dates: Vec<_> = due_dates_up_to(None, 15, today).collect();
			assert!(dates.is_empty());
		}

		#[test]
		fn watermark_advances_one_month() {
			let today = date(2025, 7, 31);
			let dates: Vec<_> = due_dates_up_to(Some(date(2025, 6, 15)), 15, today).collect();
			assert_eq!(dates, vec![date(2025, 7, 15)]);
		}

		#[test]
		fn dormant_template_catches_up_month_by_month() {
			let today = date(2025, 6, 20);
			let dates: Vec<_> = due_dates_up_to(Some(date(2025, 2, 10)), 10, today).collect();
			assert_eq!(
				dates,
				vec![
					date(2025, 3, 10),
					date(2025, 4, 10),
					date(2025, 5, 10),
					date(2025, 6, 10),
				]
			);
		}

		#[test]
		fn day_31_reclamps_every_month_without_catching_up() {
			// Jan 31 watermark: February posts on the 28th, March back on the 31st.
			let today = date(2025, 3, 31);
			let dates: Vec<_> = due_dates_up_to(Some(date(2025, 1, 31)), 31, today).collect();
			assert_eq!(dates, vec![date(2025, 2, 28), date(2025, 3, 31)]);
		}

		#[test]
		fn day_31_clamps_to_leap_february() {
			let today = date(2024, 3, 31);
			let dates: Vec<_> = due_dates_up_to(Some(date(2024, 1, 31)), 31, today).collect();
			assert_eq!(dates, vec![date(2024, 2, 29), date(2024, 3, 31)]);
		}

		#[test]
		fn nothing_due_when_watermark_is_current() {
			let today = date(2025, 6, 20);
			let dates: Vec<_> = due_dates_up_to(Some(date(2025, 6, 15)), 15, today).collect();
			assert!(dates.is_empty());
		}

		#[test]
		fn projection_is_deterministic() {
			let today = date(2025, 9, 3);
			let first: Vec<_> = due_dates_up_to(Some(date(2025, 1, 31)), 31, today).collect();
			let second: Vec<_> = due_dates_up_to(Some(date(2025, 1, 31)), 31, today).collect();
			assert_eq!(first, second);
		}

		#[test]
		fn iterator_is_fused_after_exhaustion() {
			let today = date(2025, 6, 20);
			let mut dates = due_dates_up_to(Some(date(2025, 5, 15)), 15, today);
			assert_eq!(dates.next(), Some(date(2025, 6, 15)));
			assert_eq!(dates.next(), None);
			assert_eq!(dates.next(), None);
		}
	}

	proptest! {
		#[test]
		fn emitted_dates_never_exceed_month_length(
			due_day in 1u32..=31,
			year in 2020i32..=2030,
			month in 1u32..=12,
			day_seed in 1u32..=28,
			months_behind in 0u32..=24,
		) {
			let today = date(year, month, day_seed);
			let watermark = today.checked_sub_months(Months::new(months_behind)).unwrap();
			for due in due_dates_up_to(Some(watermark), due_day, today) {
				prop_assert!(due.day() <= days_in_month(due));
				prop_assert!(due.day() <= due_day);
				prop_assert!(due <= today);
				// never earlier than the month after the watermark
				let floor = clamp_to_month(
					watermark.checked_add_months(Months::new(1)).unwrap(),
					1,
				);
				prop_assert!(due >= floor);
			}
		}

		#[test]
		fn sequence_is_strictly_increasing(
			due_day in 1u32..=31,
			year in 2020i32..=2030,
			month in 1u32..=12,
			months_behind in 1u32..=24,
		) {
			let today = date(year, month, 28);
			let watermark = today.checked_sub_months(Months::new(months_behind)).unwrap();
			let dates: Vec<_> = due_dates_up_to(Some(watermark), due_day, today).collect();
			for pair in dates.windows(2) {
				prop_assert!(pair[0] < pair[1]);
			}
		}

		#[test]
		fn determinism_holds_for_all_inputs(
			due_day in 1u32..=31,
			year in 2020i32..=2030,
			month in 1u32..=12,
			day in 1u32..=28,
		) {
			let today = date(year, month, day);
			let a: Vec<_> = due_dates_up_to(None, due_day, today).collect();
			let b: Vec<_> = due_dates_up_to(None, due_day, today).collect();
			prop_assert_eq!(a, b);
		}
	}
}
