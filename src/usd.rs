use std::fmt::{self, Debug, Display};

/// Writes `x` rounded to 2 decimal places, dropping a trailing zero but
/// always keeping at least one fractional digit: `50.0`, `125.5`, `33.33`.
fn write_rounded(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    // rounds from the exact binary value, not from x * 100
    let text = format!("{x:.2}");
    match text.strip_suffix('0') {
        Some(short) if !short.ends_with('.') => f.write_str(short),
        _ => f.write_str(&text),
    }
}

/// Represents an amount of money in USD currency.
///
/// The [`Display`] implementation formats it as dollars rounded to 2 decimal
/// places, without padding: `$125.5`.
#[derive(Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Usd(pub f64);

impl Debug for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        write_rounded(f, self.0)
    }
}

/// Represents a ratio between 0 and 1, displayed as a percentage rounded to 2
/// decimal places: `Percent(0.5)` shows as `50.0%`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Percent(pub f64);

impl Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_rounded(f, self.0 * 100.0)?;
        f.write_str("%")
    }
}
