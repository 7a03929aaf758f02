use crate::error::ParseError;
use crate::types::{Period, PeriodRecord, RawRow, MONTH_ABBR};

/// Change cells that mean "no figure published".
const CHANGE_PLACEHOLDERS: &[&str] = &["", "n/a", "na", "-", "--", "—", "–"];

/// True for rows that carry no observation: header echoes, footers and
/// "no data" banners. They are recognised by a date cell with no digits.
pub fn is_marker(raw: &RawRow) -> bool {
    let date = raw.date_text.trim();
    date.is_empty() || !date.chars().any(|c| c.is_ascii_digit())
}

pub fn parse(raw: &RawRow) -> Result<PeriodRecord, ParseError> {
    let period = parse_period(&raw.date_text)
        .ok_or_else(|| ParseError::UnparseableDate(raw.date_text.clone()))?;
    let value = parse_value(&raw.value_text)
        .ok_or_else(|| ParseError::UnparseableValue(raw.value_text.clone()))?;
    let percent_change = parse_change(&raw.change_text)?;

    Ok(PeriodRecord { period, value, percent_change })
}

/// Accepts `Nov 2025`, `November 2025` and the canonical `nov-2025`.
pub fn parse_period(text: &str) -> Option<Period> {
    let text = text.trim();
    let (month_part, year_part) = match text.split_once(|c: char| c.is_whitespace() || c == '-') {
        Some((m, y)) => (m.trim(), y.trim()),
        None => return None,
    };

    let month = month_number(month_part)?;
    if year_part.len() != 4 || !year_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;
    Period::new(month, year)
}

fn month_number(name: &str) -> Option<u8> {
    if name.len() < 3 || !name.is_ascii() {
        return None;
    }
    let lower = name.to_ascii_lowercase();
    let idx = MONTH_ABBR.iter().position(|abbr| lower.starts_with(abbr))?;
    // Reject e.g. "Marchx" while allowing full names.
    let full = FULL_MONTHS[idx];
    if lower.len() > 3 && lower != full && !(lower == "sept" && idx == 8) {
        return None;
    }
    Some(idx as u8 + 1)
}

const FULL_MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

fn parse_value(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches("S$")
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '\u{00A0}') && !c.is_whitespace())
        .collect();
    let value = cleaned.parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

fn parse_change(text: &str) -> Result<Option<f64>, ParseError> {
    let trimmed = text.trim();
    if CHANGE_PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        return Ok(None);
    }
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let number = number.strip_prefix('+').unwrap_or(number);
    match number.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ParseError::UnparseableChange(text.to_string())),
    }
}
