use time::{Date, Month};

/// Years granted by the "lifetime" label.
const LIFETIME_YEARS: i32 = 99;

/// Offset in months for a warranty duration label, `None` for labels without an expiry.
///
/// Matching ignores case but not whitespace.
pub fn offset_months(label: &str) -> Option<i32> {
    match label.to_lowercase().as_str() {
        "6 months" => Some(6),
        "1 year" => Some(12),
        "2 years" => Some(24),
        "3 years" => Some(36),
        "5 years" => Some(60),
        "lifetime" => Some(LIFETIME_YEARS * 12),
        _ => None,
    }
}

/// Warranty expiry for a purchase: the purchase date shifted by the label's offset.
///
/// Unknown labels ("Other", free text) and a missing purchase date both yield `None`.
pub fn calculate_expiry(purchase_date: Option<Date>, label: &str) -> Option<Date> {
    let start = purchase_date?;
    add_months(start, offset_months(label)?)
}

/// Calendar month addition, clamping the day to the end of the target month.
///
/// Returns `None` when the result falls outside the supported year range.
pub fn add_months(date: Date, months: i32) -> Option<Date> {
    let zero_based = date.year() * 12 + (u8::from(date.month()) as i32 - 1) + months;
    let year = zero_based.div_euclid(12);
    let month = Month::try_from((zero_based.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(month.length(year));
    Date::from_calendar_date(year, month, day).ok()
}
