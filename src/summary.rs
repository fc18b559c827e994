//! Per-zip activity and revenue summary over the modelling calendar.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::calendar::Calendar;
use crate::counts::CountTable;
use crate::models::Event;

/// Trailing window treated as "last month"
pub const LAST_MONTH_DAYS: usize = 28;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZipSummary {
    pub zipcode: String,
    pub pickups_total: u64,
    pub deliveries_total: u64,
    pub visits_total: u64,
    pub pickups_lastmonth: u64,
    pub deliveries_lastmonth: u64,
    pub visits_lastmonth: u64,
    pub pickups_money_total: Option<f64>,
    pub deliveries_money_total: Option<f64>,
    pub pickups_money_lastmonth: Option<f64>,
    pub deliveries_money_lastmonth: Option<f64>,
    pub visits_money_total: f64,
    pub visits_money_lastmonth: f64,
    pub visits_moneypervisit_total: Option<f64>,
    pub visits_moneypervisit_lastmonth: Option<f64>,
    pub visits_perweek_total: f64,
    pub visits_money_perweek_total: f64,
    pub visits_perweek_lastmonth: f64,
    pub visits_money_perweek_lastmonth: f64,
}

/// Dollars per zip for events whose date key is in `keys`.
/// Zips whose events carry no value at all are absent.
fn money_by_zip(events: &[Event], keys: &HashSet<&str>) -> BTreeMap<String, f64> {
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    for event in events {
        let Some(cents) = event.value_cents else {
            continue;
        };
        if !keys.contains(event.date_key().as_str()) {
            continue;
        }
        *out.entry(event.zipcode.clone()).or_insert(0.0) += cents as f64 / 100.0;
    }
    out
}

fn ratio(numerator: f64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator / denominator as f64)
    }
}

/// One row per zip code of the combined table.
///
/// The count tables must all be built over `calendar`; money comes from the
/// raw pickup and delivery events restricted to the same days.
pub fn summarize_zips(
    calendar: &Calendar,
    pickups: &CountTable,
    deliveries: &CountTable,
    combined: &CountTable,
    pickup_events: &[Event],
    delivery_events: &[Event],
) -> Vec<ZipSummary> {
    let all_keys: HashSet<&str> = calendar.keys().collect();
    let last_keys: HashSet<&str> = calendar
        .tail(LAST_MONTH_DAYS)
        .iter()
        .map(|r| r.key.as_str())
        .collect();

    let pickups_total = pickups.column_totals();
    let deliveries_total = deliveries.column_totals();
    let visits_total = combined.column_totals();
    let pickups_last = pickups.tail_totals(LAST_MONTH_DAYS);
    let deliveries_last = deliveries.tail_totals(LAST_MONTH_DAYS);
    let visits_last = combined.tail_totals(LAST_MONTH_DAYS);

    let pickups_money = money_by_zip(pickup_events, &all_keys);
    let deliveries_money = money_by_zip(delivery_events, &all_keys);
    let pickups_money_last = money_by_zip(pickup_events, &last_keys);
    let deliveries_money_last = money_by_zip(delivery_events, &last_keys);

    let weeks = (calendar.len() as f64 / 7.0 * 100.0).round() / 100.0;

    combined
        .zipcodes()
        .map(|zip| {
            let visits = visits_total.get(zip).copied().unwrap_or(0);
            let visits_lastmonth = visits_last.get(zip).copied().unwrap_or(0);
            let p_money = pickups_money.get(zip).copied();
            let d_money = deliveries_money.get(zip).copied();
            let p_money_last = pickups_money_last.get(zip).copied();
            let d_money_last = deliveries_money_last.get(zip).copied();
            let money = p_money.unwrap_or(0.0) + d_money.unwrap_or(0.0);
            let money_last = p_money_last.unwrap_or(0.0) + d_money_last.unwrap_or(0.0);

            ZipSummary {
                zipcode: zip.to_string(),
                pickups_total: pickups_total.get(zip).copied().unwrap_or(0),
                deliveries_total: deliveries_total.get(zip).copied().unwrap_or(0),
                visits_total: visits,
                pickups_lastmonth: pickups_last.get(zip).copied().unwrap_or(0),
                deliveries_lastmonth: deliveries_last.get(zip).copied().unwrap_or(0),
                visits_lastmonth,
                pickups_money_total: p_money,
                deliveries_money_total: d_money,
                pickups_money_lastmonth: p_money_last,
                deliveries_money_lastmonth: d_money_last,
                visits_money_total: money,
                visits_money_lastmonth: money_last,
                visits_moneypervisit_total: ratio(money, visits),
                visits_moneypervisit_lastmonth: ratio(money_last, visits_lastmonth),
                visits_perweek_total: if weeks > 0.0 { visits as f64 / weeks } else { 0.0 },
                visits_money_perweek_total: if weeks > 0.0 { money / weeks } else { 0.0 },
                visits_perweek_lastmonth: visits_lastmonth as f64 / 4.0,
                visits_money_perweek_lastmonth: money_last / 4.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_calendar;
    use crate::counts::count_by_day;
    use crate::models::EventKind;
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn event(kind: EventKind, zip: &str, ts: &str, cents: i64) -> Event {
        let local = NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap();
        Event::new(kind, zip, local).with_value(cents)
    }

    #[test]
    fn test_totals_last_month_and_rates() {
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2015, 2, 25).unwrap(); // 56 days, 8 weeks
        let cal = build_calendar(start, end).unwrap();

        let pickups = vec![
            event(EventKind::Pickup, "94110", "2015-01-05 10:00:00", 10_000),
            event(EventKind::Pickup, "94110", "2015-02-20 10:00:00", 5_000),
            // outside the calendar: neither counted nor summed
            event(EventKind::Pickup, "94110", "2015-03-20 10:00:00", 99_900),
        ];
        let deliveries = vec![
            event(EventKind::Delivery, "94110", "2015-02-21 12:00:00", 20_000),
            event(EventKind::Delivery, "94103", "2015-01-10 12:00:00", 7_500),
        ];
        let combined_events: Vec<Event> = pickups.iter().chain(&deliveries).cloned().collect();

        let p = count_by_day(&pickups, &cal, None).unwrap();
        let d = count_by_day(&deliveries, &cal, None).unwrap();
        let c = count_by_day(&combined_events, &cal, None).unwrap();

        let rows = summarize_zips(&cal, &p, &d, &c, &pickups, &deliveries);
        assert_eq!(rows.len(), 2);

        let mission = rows.iter().find(|r| r.zipcode == "94110").unwrap();
        assert_eq!(mission.pickups_total, 2);
        assert_eq!(mission.deliveries_total, 1);
        assert_eq!(mission.visits_total, 3);
        assert_eq!(mission.visits_lastmonth, 2);
        assert_eq!(mission.pickups_money_total, Some(150.0));
        assert_eq!(mission.deliveries_money_lastmonth, Some(200.0));
        assert_abs_diff_eq!(mission.visits_money_total, 350.0);
        assert_abs_diff_eq!(mission.visits_moneypervisit_total.unwrap(), 350.0 / 3.0);
        assert_abs_diff_eq!(mission.visits_perweek_total, 3.0 / 8.0);
        assert_abs_diff_eq!(mission.visits_perweek_lastmonth, 0.5);

        let soma = rows.iter().find(|r| r.zipcode == "94103").unwrap();
        assert_eq!(soma.pickups_total, 0);
        assert_eq!(soma.pickups_money_total, None);
        assert_eq!(soma.visits_lastmonth, 0);
        assert_eq!(soma.visits_moneypervisit_lastmonth, None);
        assert_abs_diff_eq!(soma.visits_money_total, 75.0);
    }
}
