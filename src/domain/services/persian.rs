//! Persian presentation helpers: digits, the Jalali calendar and digit grouping.

use chrono::{Datelike, NaiveDate};
use std::fmt;

const PERSIAN_ZERO: u32 = 0x06F0;

/// Jalali (solar hijri) month names, Farvardin first.
pub const JALALI_MONTHS: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

/// Replace ASCII digits with Persian digits (۰..۹). Other characters pass through.
pub fn to_persian_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => char::from_u32(PERSIAN_ZERO + d).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Format an integer with `,` thousands separators.
pub fn format_grouped(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// A date in the Jalali calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JalaliDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl JalaliDate {
    /// Persian month name.
    pub fn month_name(&self) -> &'static str {
        JALALI_MONTHS[(self.month as usize).saturating_sub(1) % 12]
    }

    /// `۱۴۰۳/۰۱/۰۱`
    pub fn to_persian_string(&self) -> String {
        to_persian_digits(&self.to_string())
    }

    /// `۱ فروردین ۱۴۰۳`
    pub fn to_long_persian_string(&self) -> String {
        to_persian_digits(&format!("{} {} {}", self.day, self.month_name(), self.year))
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

impl From<NaiveDate> for JalaliDate {
    fn from(date: NaiveDate) -> Self {
        gregorian_to_jalali(date)
    }
}

/// Convert a Gregorian date to the Jalali calendar.
///
/// Uses the 33-year arithmetic cycle, exact for 1900-2100.
pub fn gregorian_to_jalali(date: NaiveDate) -> JalaliDate {
    const DAYS_BEFORE_MONTH: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let gy = date.year() as i64;
    let gm = date.month() as i64;
    let gd = date.day() as i64;

    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100 + (gy2 + 399) / 400
        + gd
        + DAYS_BEFORE_MONTH[(gm - 1) as usize];

    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    JalaliDate {
        year: jy as i32,
        month: jm as u32,
        day: jd as u32,
    }
}

/// Convert a Jalali date back to Gregorian. Returns `None` for dates that do
/// not exist (e.g. 30 Esfand of a common year).
pub fn jalali_to_gregorian(jalali: JalaliDate) -> Option<NaiveDate> {
    if !(1..=12).contains(&jalali.month) || jalali.day == 0 {
        return None;
    }
    let max_day = if jalali.month <= 6 { 31 } else { 30 };
    if jalali.day > max_day || jalali.year < 1 {
        return None;
    }

    let jy = jalali.year as i64 + 1595;
    let jm = jalali.month as i64;
    let jd = jalali.day as i64;

    let mut days = -355_668 + 365 * jy + (jy / 33) * 8 + ((jy % 33) + 3) / 4 + jd
        + if jm < 7 {
            (jm - 1) * 31
        } else {
            (jm - 7) * 30 + 186
        };

    let mut gy = 400 * (days / 146_097);
    days %= 146_097;
    if days > 36_524 {
        days -= 1;
        gy += 100 * (days / 36_524);
        days %= 36_524;
        if days >= 365 {
            days += 1;
        }
    }
    gy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        gy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let date = NaiveDate::from_yo_opt(gy as i32, (days + 1) as u32)?;
    // Reject dates that only exist by overflowing into the next year.
    (gregorian_to_jalali(date) == jalali).then_some(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ==========================================================================
    // Digits & grouping
    // ==========================================================================

    #[test]
    fn test_to_persian_digits() {
        assert_eq!(to_persian_digits("0123456789"), "۰۱۲۳۴۵۶۷۸۹");
        assert_eq!(to_persian_digits("1403/01/01"), "۱۴۰۳/۰۱/۰۱");
        assert_eq!(to_persian_digits("INV-12 abc"), "INV-۱۲ abc");
    }

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1000, "1,000")]
    #[test_case(1234567, "1,234,567")]
    #[test_case(-1250000, "-1,250,000")]
    fn test_format_grouped(value: i64, expected: &str) {
        assert_eq!(format_grouped(value), expected);
    }

    // ==========================================================================
    // Jalali calendar
    // ==========================================================================

    #[test_case(ymd(2024, 3, 20), (1403, 1, 1) ; "nowruz 1403")]
    #[test_case(ymd(2024, 3, 19), (1402, 12, 29) ; "last day of 1402")]
    #[test_case(ymd(2023, 3, 21), (1402, 1, 1) ; "nowruz 1402")]
    #[test_case(ymd(2025, 3, 21), (1404, 1, 1) ; "nowruz 1404")]
    #[test_case(ymd(2000, 1, 1), (1378, 10, 11) ; "y2k")]
    #[test_case(ymd(2025, 1, 1), (1403, 10, 12) ; "new year 2025")]
    #[test_case(ymd(2026, 10, 17), (1405, 7, 25) ; "autumn 1405")]
    fn test_gregorian_to_jalali(date: NaiveDate, expected: (i32, u32, u32)) {
        let j = gregorian_to_jalali(date);
        assert_eq!((j.year, j.month, j.day), expected);
    }

    #[test]
    fn test_leap_esfand() {
        // 1403 is a leap year: 30 Esfand exists.
        let esfand_30 = JalaliDate { year: 1403, month: 12, day: 30 };
        assert_eq!(jalali_to_gregorian(esfand_30), Some(ymd(2025, 3, 20)));

        let missing = JalaliDate { year: 1402, month: 12, day: 30 };
        assert_eq!(jalali_to_gregorian(missing), None);
    }

    #[test]
    fn test_round_trip_over_several_years() {
        let mut date = ymd(2019, 1, 1);
        while date < ymd(2031, 1, 1) {
            let j = gregorian_to_jalali(date);
            assert_eq!(jalali_to_gregorian(j), Some(date), "failed for {}", date);
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_invalid_jalali_components() {
        assert_eq!(jalali_to_gregorian(JalaliDate { year: 1403, month: 13, day: 1 }), None);
        assert_eq!(jalali_to_gregorian(JalaliDate { year: 1403, month: 7, day: 31 }), None);
        assert_eq!(jalali_to_gregorian(JalaliDate { year: 1403, month: 1, day: 0 }), None);
    }

    #[test]
    fn test_jalali_display() {
        let j = gregorian_to_jalali(ymd(2024, 3, 20));
        assert_eq!(j.to_string(), "1403/01/01");
        assert_eq!(j.to_persian_string(), "۱۴۰۳/۰۱/۰۱");
        assert_eq!(j.month_name(), "فروردین");
        assert_eq!(j.to_long_persian_string(), "۱ فروردین ۱۴۰۳");
    }
}
