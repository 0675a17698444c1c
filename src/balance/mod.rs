//! CLT time-balance engine.
//!
//! Stateless: every function computes from the punches it is given plus the
//! standard schedule. Nothing here touches storage.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::Serialize;

use crate::ledger::AttendanceRecord;

/// Standard working day used to compute expected hours.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub entry: NaiveTime,
    pub exit: NaiveTime,
    pub lunch_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Monthly,
    Annual,
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "monthly" => Ok(ReportKind::Monthly),
            "annual" => Ok(ReportKind::Annual),
            other => Err(anyhow!(
                "invalid report kind '{other}': use 'monthly' or 'annual'"
            )),
        }
    }
}

fn serialize_clock<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match time {
        Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
        None => serializer.serialize_str("--:--"),
    }
}

/// One calendar day of one identity's timesheet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBalance {
    pub date: NaiveDate,
    /// Portuguese weekday name, as the reports have always shown it.
    pub weekday: &'static str,
    #[serde(serialize_with = "serialize_clock")]
    pub entry: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_clock")]
    pub lunch_out: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_clock")]
    pub lunch_in: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_clock")]
    pub exit: Option<NaiveTime>,
    pub punch_count: usize,
    pub worked_minutes: i64,
    pub expected_minutes: i64,
    pub balance_minutes: i64,
    pub worked: String,
    pub expected: String,
    pub balance: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    #[serde(serialize_with = "serialize_clock")]
    pub standard_entry: Option<NaiveTime>,
    #[serde(serialize_with = "serialize_clock")]
    pub standard_exit: Option<NaiveTime>,
    pub lunch: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub name: String,
    pub month: u32,
    pub year: i32,
    pub days: Vec<DailyBalance>,
    pub total_worked_minutes: i64,
    pub total_expected_minutes: i64,
    pub final_balance_minutes: i64,
    pub total_worked: String,
    pub total_expected: String,
    pub final_balance: String,
    pub schedule: ScheduleInfo,
}

/// Months without a single punch are absent from `months`, unlike the
/// monthly report which lists every day of the month.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReport {
    pub name: String,
    pub year: i32,
    pub months: BTreeMap<u32, MonthlyReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Report {
    Monthly(MonthlyReport),
    Annual(AnnualReport),
}

/// Minutes from `from` to `to`, rolling past midnight when `to` is earlier
/// (a 22:00 to 06:00 shift is 8 hours, not -16).
pub fn clock_diff(from: NaiveTime, to: NaiveTime) -> i64 {
    let mut minutes = (to - from).num_minutes();
    if to < from {
        minutes += 24 * 60;
    }
    minutes
}

/// `HH:MM`, with a leading minus for deficits.
pub fn format_minutes(minutes: i64) -> String {
    let magnitude = minutes.abs();
    let sign = if minutes < 0 { "-" } else { "" };
    format!("{sign}{:02}:{:02}", magnitude / 60, magnitude % 60)
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Segunda",
        Weekday::Tue => "Terça",
        Weekday::Wed => "Quarta",
        Weekday::Thu => "Quinta",
        Weekday::Fri => "Sexta",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// Computes one day's balance from its ordered punches.
///
/// Punch-count rules:
/// - 2 punches: entry and exit, standard lunch deducted.
/// - 3 punches: entry, lunch out, exit; the lunch return is derived as
///   lunch out plus the standard lunch, not observed.
/// - 4+ punches: entry, lunch out, lunch in (the observed third punch),
///   exit is the last punch; anything between third and last is ignored.
pub fn daily_balance(date: NaiveDate, punches: &[NaiveTime], schedule: &Schedule) -> DailyBalance {
    let mut entry = None;
    let mut lunch_out = None;
    let mut lunch_in = None;
    let mut exit = None;
    let mut worked_minutes = 0i64;

    if let (Some(&first), Some(&last)) = (punches.first(), punches.last()) {
        entry = Some(first);
        exit = Some(last);

        match punches.len() {
            2 => {
                worked_minutes = clock_diff(first, last) - schedule.lunch_minutes;
            }
            3 => {
                let out = punches[1];
                // The return from lunch is assumed, not punched.
                let back = out + Duration::minutes(schedule.lunch_minutes);
                lunch_out = Some(out);
                lunch_in = Some(back);
                worked_minutes = clock_diff(first, out) + clock_diff(back, last);
            }
            n if n >= 4 => {
                let out = punches[1];
                let back = punches[2];
                lunch_out = Some(out);
                lunch_in = Some(back);
                worked_minutes = clock_diff(first, out) + clock_diff(back, last);
            }
            // A single punch gives no measurable interval.
            _ => {}
        }

        worked_minutes = worked_minutes.max(0);
    }

    let expected_minutes =
        (clock_diff(schedule.entry, schedule.exit) - schedule.lunch_minutes).max(0);
    let balance_minutes = worked_minutes - expected_minutes;

    DailyBalance {
        date,
        weekday: weekday_name(date.weekday()),
        entry,
        lunch_out,
        lunch_in,
        exit,
        punch_count: punches.len(),
        worked_minutes,
        expected_minutes,
        balance_minutes,
        worked: format_minutes(worked_minutes),
        expected: format_minutes(expected_minutes),
        balance: format_minutes(balance_minutes),
    }
}

/// Local-time punch lists keyed by calendar day. Each record is converted to
/// the local zone once, and punches are truncated to minute precision the
/// same way the displayed `HH:MM` values are.
fn punches_by_day(records: &[AttendanceRecord]) -> BTreeMap<NaiveDate, Vec<NaiveTime>> {
    let mut by_day: BTreeMap<NaiveDate, Vec<NaiveTime>> = BTreeMap::new();
    for record in records {
        let local = record.timestamp.with_timezone(&Local);
        let minute = local
            .time()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or_else(|| local.time());
        by_day.entry(local.date_naive()).or_default().push(minute);
    }
    for punches in by_day.values_mut() {
        punches.sort();
    }
    by_day
}

/// Full month: every valid calendar day appears, punches or not, so deficits
/// on absent days show up in the totals. Day enumeration stops at the first
/// date that does not exist for the month.
pub fn monthly_report(
    name: &str,
    month: u32,
    year: i32,
    records: &[AttendanceRecord],
    schedule: &Schedule,
) -> MonthlyReport {
    let by_day = punches_by_day(records);

    let mut days = Vec::new();
    let mut total_worked_minutes = 0i64;
    let mut total_expected_minutes = 0i64;

    for day in 1..=31u32 {
        // Not an error: running off the end of a short month terminates the
        // enumeration.
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            break;
        };

        let empty = Vec::new();
        let punches = by_day.get(&date).unwrap_or(&empty);
        let balance = daily_balance(date, punches, schedule);

        total_worked_minutes += balance.worked_minutes;
        total_expected_minutes += balance.expected_minutes;
        days.push(balance);
    }

    let final_balance_minutes = total_worked_minutes - total_expected_minutes;

    MonthlyReport {
        name: name.to_string(),
        month,
        year,
        days,
        total_worked_minutes,
        total_expected_minutes,
        final_balance_minutes,
        total_worked: format_minutes(total_worked_minutes),
        total_expected: format_minutes(total_expected_minutes),
        final_balance: format_minutes(final_balance_minutes),
        schedule: ScheduleInfo {
            standard_entry: Some(schedule.entry),
            standard_exit: Some(schedule.exit),
            lunch: format_minutes(schedule.lunch_minutes),
        },
    }
}

/// Year summary: one nested monthly report per month that has at least one
/// punch. Empty months are omitted entirely rather than zero-filled.
pub fn annual_report(
    name: &str,
    year: i32,
    records: &[AttendanceRecord],
    schedule: &Schedule,
) -> AnnualReport {
    let mut by_month: BTreeMap<u32, Vec<AttendanceRecord>> = BTreeMap::new();
    for record in records {
        let local = record.timestamp.with_timezone(&Local);
        if local.year() == year {
            by_month.entry(local.month()).or_default().push(record.clone());
        }
    }

    let months = by_month
        .into_iter()
        .map(|(month, month_records)| {
            (month, monthly_report(name, month, year, &month_records, schedule))
        })
        .collect();

    AnnualReport {
        name: name.to_string(),
        year,
        months,
    }
}
