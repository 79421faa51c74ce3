//! Number formatting shared by prompts and canned analysis text.

/// `1234.5` → `"1,234.50"`.
pub fn currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac)
}

/// Signed percent: `1.3` → `"+1.30%"`.
pub fn percentage(value: f64) -> String {
    format!("{:+.2}%", value)
}

/// `2.85e12` → `"2.85T"`, `52_430_000` → `"52.43M"`.
pub fn compact(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
    for (size, suffix) in UNITS {
        if value >= size {
            return format!("{:.2}{}", value / size, suffix);
        }
    }
    format!("{:.2}", value)
}

/// Market cap with one decimal, e.g. `"$2.9T"`.
pub fn market_cap(value: f64) -> String {
    if value >= 1e12 {
        format!("${:.1}T", value / 1e12)
    } else if value >= 1e9 {
        format!("${:.1}B", value / 1e9)
    } else if value >= 1e6 {
        format!("${:.1}M", value / 1e6)
    } else {
        format!("${:.0}", value)
    }
}

pub fn market_cap_category(value: f64) -> &'static str {
    if value >= 200e9 {
        "mega-cap"
    } else if value >= 10e9 {
        "large-cap"
    } else if value >= 2e9 {
        "mid-cap"
    } else {
        "small-cap"
    }
}
