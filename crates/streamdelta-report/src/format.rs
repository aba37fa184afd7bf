//! Locale-stable number formatting and HTML escaping for report text.

/// Placeholder for a value that is not available.
pub const MISSING: &str = "—";

/// `1234567` → `"1,234,567"`.
#[must_use]
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[must_use]
pub fn format_optional(n: Option<u64>) -> String {
    n.map_or_else(|| MISSING.to_owned(), format_number)
}

/// Always carries a sign: `+1,000`, `-25`, `+0`.
#[must_use]
pub fn format_signed(n: i64) -> String {
    let sign = if n < 0 { '-' } else { '+' };
    format!("{sign}{}", format_number(n.unsigned_abs()))
}

/// `📈 +1,000` for growth (or no change), `📉 -25` for a drop.
#[must_use]
pub fn trend(n: i64) -> String {
    let arrow = if n < 0 { "📉" } else { "📈" };
    format!("{arrow} {}", format_signed(n))
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
