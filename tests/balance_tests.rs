//! Time-balance engine tests: punch-count rules, clamping, month
//! enumeration, and the annual month-omission behavior.

use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};

use ponto::balance::{
    annual_report, clock_diff, daily_balance, format_minutes, monthly_report, Schedule,
};
use ponto::ledger::AttendanceRecord;

fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn standard_schedule() -> Schedule {
    Schedule {
        entry: t(9, 0),
        exit: t(18, 0),
        lunch_minutes: 60,
    }
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// A record that lands on the given local wall-clock time regardless of the
/// machine's time zone.
fn local_record(name: &str, year: i32, month: u32, d: u32, hour: u32, minute: u32) -> AttendanceRecord {
    let local = Local
        .with_ymd_and_hms(year, month, d, hour, minute, 0)
        .single()
        .expect("unambiguous local time");
    AttendanceRecord::new(name, local.with_timezone(&Utc))
}

#[test]
fn clock_diff_same_day() {
    assert_eq!(clock_diff(t(9, 0), t(18, 0)), 540);
    assert_eq!(clock_diff(t(9, 0), t(9, 0)), 0);
}

#[test]
fn clock_diff_rolls_past_midnight() {
    assert_eq!(clock_diff(t(22, 0), t(6, 0)), 480);
    assert_eq!(clock_diff(t(23, 30), t(0, 15)), 45);
}

#[test]
fn format_minutes_signs() {
    assert_eq!(format_minutes(0), "00:00");
    assert_eq!(format_minutes(90), "01:30");
    assert_eq!(format_minutes(-30), "-00:30");
    assert_eq!(format_minutes(480), "08:00");
}

#[test]
fn two_punches_full_day() {
    let balance = daily_balance(day(2024, 4, 10), &[t(9, 0), t(18, 0)], &standard_schedule());

    assert_eq!(balance.entry, Some(t(9, 0)));
    assert_eq!(balance.exit, Some(t(18, 0)));
    assert_eq!(balance.lunch_out, None);
    assert_eq!(balance.lunch_in, None);
    assert_eq!(balance.worked_minutes, 480);
    assert_eq!(balance.expected_minutes, 480);
    assert_eq!(balance.balance_minutes, 0);
}

#[test]
fn three_punches_derive_lunch_return() {
    let balance = daily_balance(
        day(2024, 4, 10),
        &[t(9, 0), t(12, 0), t(17, 30)],
        &standard_schedule(),
    );

    assert_eq!(balance.lunch_out, Some(t(12, 0)));
    // Lunch return is derived from the configured lunch, not punched.
    assert_eq!(balance.lunch_in, Some(t(13, 0)));
    assert_eq!(balance.worked_minutes, 450);
    assert_eq!(balance.balance_minutes, -30);
    assert_eq!(balance.balance, "-00:30");
}

#[test]
fn four_punches_use_observed_lunch_return() {
    let balance = daily_balance(
        day(2024, 4, 10),
        &[t(9, 0), t(12, 0), t(13, 0), t(18, 0)],
        &standard_schedule(),
    );

    assert_eq!(balance.lunch_out, Some(t(12, 0)));
    assert_eq!(balance.lunch_in, Some(t(13, 0)));
    assert_eq!(balance.worked_minutes, 480);
    assert_eq!(balance.balance_minutes, 0);
}

#[test]
fn extra_punches_beyond_fourth_only_move_the_exit() {
    let balance = daily_balance(
        day(2024, 4, 10),
        &[t(9, 0), t(12, 0), t(13, 0), t(15, 0), t(19, 0)],
        &standard_schedule(),
    );

    // Morning 180 + afternoon 13:00..19:00 = 360.
    assert_eq!(balance.exit, Some(t(19, 0)));
    assert_eq!(balance.worked_minutes, 540);
}

#[test]
fn zero_punches_still_expected() {
    let balance = daily_balance(day(2024, 4, 10), &[], &standard_schedule());

    assert_eq!(balance.entry, None);
    assert_eq!(balance.exit, None);
    assert_eq!(balance.worked_minutes, 0);
    assert_eq!(balance.expected_minutes, 480);
    assert_eq!(balance.balance_minutes, -480);
}

#[test]
fn single_punch_works_nothing() {
    let balance = daily_balance(day(2024, 4, 10), &[t(9, 0)], &standard_schedule());

    assert_eq!(balance.entry, Some(t(9, 0)));
    assert_eq!(balance.exit, Some(t(9, 0)));
    assert_eq!(balance.worked_minutes, 0);
}

#[test]
fn short_day_clamps_at_zero() {
    // 30 minutes on site minus a full lunch would be negative.
    let balance = daily_balance(day(2024, 4, 10), &[t(9, 0), t(9, 30)], &standard_schedule());
    assert_eq!(balance.worked_minutes, 0);
}

#[test]
fn monthly_report_lists_every_day_of_a_short_month() {
    let report = monthly_report("ana", 4, 2024, &[], &standard_schedule());

    assert_eq!(report.days.len(), 30);
    assert!(report.days.iter().all(|d| d.expected_minutes == 480));
    assert_eq!(report.total_expected_minutes, 30 * 480);
    assert_eq!(report.total_worked_minutes, 0);
    assert_eq!(report.final_balance_minutes, -30 * 480);
}

#[test]
fn monthly_report_handles_leap_february() {
    let leap = monthly_report("ana", 2, 2024, &[], &standard_schedule());
    let plain = monthly_report("ana", 2, 2023, &[], &standard_schedule());

    assert_eq!(leap.days.len(), 29);
    assert_eq!(plain.days.len(), 28);
}

#[test]
fn monthly_report_sums_worked_days() {
    let records = vec![
        local_record("ana", 2024, 4, 10, 9, 0),
        local_record("ana", 2024, 4, 10, 18, 0),
        local_record("ana", 2024, 4, 11, 9, 0),
        local_record("ana", 2024, 4, 11, 12, 0),
        local_record("ana", 2024, 4, 11, 13, 0),
        local_record("ana", 2024, 4, 11, 18, 0),
    ];

    let report = monthly_report("ana", 4, 2024, &records, &standard_schedule());

    assert_eq!(report.days.len(), 30);
    assert_eq!(report.total_worked_minutes, 960);

    let day10 = &report.days[9];
    assert_eq!(day10.punch_count, 2);
    assert_eq!(day10.worked_minutes, 480);

    let day12 = &report.days[11];
    assert_eq!(day12.punch_count, 0);
    assert_eq!(day12.worked_minutes, 0);
}

#[test]
fn punch_seconds_are_truncated_to_minutes() {
    let entry = Local
        .with_ymd_and_hms(2024, 4, 10, 9, 0, 59)
        .single()
        .unwrap()
        .with_timezone(&Utc);
    let exit = Local
        .with_ymd_and_hms(2024, 4, 10, 18, 0, 1)
        .single()
        .unwrap()
        .with_timezone(&Utc);
    let records = vec![
        AttendanceRecord::new("ana", entry),
        AttendanceRecord::new("ana", exit),
    ];

    let report = monthly_report("ana", 4, 2024, &records, &standard_schedule());
    assert_eq!(report.days[9].worked_minutes, 480);
}

#[test]
fn annual_report_omits_empty_months() {
    let records = vec![
        local_record("ana", 2024, 4, 10, 9, 0),
        local_record("ana", 2024, 4, 10, 18, 0),
        local_record("ana", 2024, 7, 1, 9, 0),
    ];

    let report = annual_report("ana", 2024, &records, &standard_schedule());

    assert_eq!(report.months.len(), 2);
    assert!(report.months.contains_key(&4));
    assert!(report.months.contains_key(&7));
    assert!(!report.months.contains_key(&5));

    // Each present month is a full monthly report, zero-filled days and all.
    assert_eq!(report.months[&4].days.len(), 30);
}

#[test]
fn annual_report_ignores_other_years() {
    let records = vec![
        local_record("ana", 2023, 4, 10, 9, 0),
        local_record("ana", 2024, 4, 10, 9, 0),
    ];

    let report = annual_report("ana", 2024, &records, &standard_schedule());

    assert_eq!(report.months.len(), 1);
    assert_eq!(report.months[&4].days[9].punch_count, 1);
}
