//! Support/resistance derivation from a price and its indicator bundle.

use market_core::{IndicatorBundle, LevelKind, TechnicalLevel};

/// 52-week extremes closer than this fraction of price are ignored.
const EXTREME_MARGIN: f64 = 0.02;
const NEAR_OFFSET: f64 = 0.02;
const FAR_OFFSET: f64 = 0.05;
/// Below this many levels, round-number levels are added.
const MIN_LEVELS: usize = 4;
const ROUND_STEP: f64 = 10.0;
/// A round number within this distance of an existing level is skipped.
const ROUND_PROXIMITY: f64 = 1.0;

/// Derives labeled levels, sorted by price descending.
///
/// Once a positive price is known, the result always has at least one level
/// above and one below it.
pub fn derive_levels(
    current_price: f64,
    week52_high: Option<f64>,
    week52_low: Option<f64>,
    indicators: &IndicatorBundle,
) -> Vec<TechnicalLevel> {
    let mut levels = Vec::new();
    let price = current_price;

    // Resistance
    if let Some(high) = week52_high.filter(|h| *h > price * (1.0 + EXTREME_MARGIN)) {
        let away = (high - price) / price * 100.0;
        levels.push(TechnicalLevel::new(
            LevelKind::MajorResistance,
            high,
            format!("52-week high, {:.1}% above current price", away),
        ));
    }
    if let Some(sma200) = indicators.sma200.filter(|v| *v > price) {
        levels.push(TechnicalLevel::new(
            LevelKind::NearResistance,
            sma200,
            "200-day moving average; long-term resistance",
        ));
    }
    if let Some(sma50) = indicators.sma50.filter(|v| *v > price) {
        levels.push(TechnicalLevel::new(
            LevelKind::NearResistance,
            sma50,
            "50-day moving average; medium-term resistance",
        ));
    }
    if let Some(upper) = indicators.bollinger.map(|b| b.upper).filter(|v| *v > price) {
        levels.push(TechnicalLevel::new(
            LevelKind::NearResistance,
            upper,
            "Upper Bollinger Band; immediate resistance zone",
        ));
    }

    // Support
    if let Some(sma20) = indicators.sma20.filter(|v| *v < price) {
        levels.push(TechnicalLevel::new(
            LevelKind::PivotSupport,
            sma20,
            "20-day moving average; short-term support",
        ));
    }
    if let Some(lower) = indicators.bollinger.map(|b| b.lower).filter(|v| *v < price) {
        levels.push(TechnicalLevel::new(
            LevelKind::PivotSupport,
            lower,
            "Lower Bollinger Band; immediate support zone",
        ));
    }
    if let Some(sma50) = indicators.sma50.filter(|v| *v < price) {
        levels.push(TechnicalLevel::new(
            LevelKind::StrongSupport,
            sma50,
            "50-day MA; key support level, held multiple times",
        ));
    }
    if let Some(sma200) = indicators.sma200.filter(|v| *v < price) {
        levels.push(TechnicalLevel::new(
            LevelKind::StrongSupport,
            sma200,
            "200-day MA; critical long-term support",
        ));
    }
    if let Some(low) = week52_low.filter(|l| *l < price * (1.0 - EXTREME_MARGIN)) {
        let away = (price - low) / price * 100.0;
        levels.push(TechnicalLevel::new(
            LevelKind::StrongSupport,
            low,
            format!("52-week low, {:.1}% below current price", away),
        ));
    }

    balance(&mut levels, price);
    add_round_numbers(&mut levels, price);

    levels.sort_by(|a, b| b.price.total_cmp(&a.price));
    levels
}

/// Synthesizes two levels on whichever side of price came out empty.
fn balance(levels: &mut Vec<TechnicalLevel>, price: f64) {
    let has_resistance = levels.iter().any(|l| l.price > price);
    let has_support = levels.iter().any(|l| l.price < price);

    if !has_resistance {
        levels.push(TechnicalLevel::new(
            LevelKind::NearResistance,
            price * (1.0 + NEAR_OFFSET),
            "Near-term resistance; 2% above current price",
        ));
        levels.push(TechnicalLevel::new(
            LevelKind::MajorResistance,
            price * (1.0 + FAR_OFFSET),
            "Major resistance; 5% extension target",
        ));
    }

    if !has_support {
        levels.push(TechnicalLevel::new(
            LevelKind::PivotSupport,
            price * (1.0 - NEAR_OFFSET),
            "Near-term support; 2% below current price",
        ));
        levels.push(TechnicalLevel::new(
            LevelKind::StrongSupport,
            price * (1.0 - FAR_OFFSET),
            "Strong support; 5% retracement level",
        ));
    }
}

fn add_round_numbers(levels: &mut Vec<TechnicalLevel>, price: f64) {
    if levels.len() >= MIN_LEVELS {
        return;
    }

    let ceiling = (price / ROUND_STEP).ceil() * ROUND_STEP;
    if ceiling > price && !near_existing(levels, ceiling) {
        levels.push(TechnicalLevel::new(
            LevelKind::NearResistance,
            ceiling,
            "Psychological resistance at round number",
        ));
    }

    let floor = (price / ROUND_STEP).floor() * ROUND_STEP;
    if floor < price && !near_existing(levels, floor) {
        levels.push(TechnicalLevel::new(
            LevelKind::PivotSupport,
            floor,
            "Psychological support at round number",
        ));
    }
}

fn near_existing(levels: &[TechnicalLevel], candidate: f64) -> bool {
    levels.iter().any(|l| (l.price - candidate).abs() < ROUND_PROXIMITY)
}
