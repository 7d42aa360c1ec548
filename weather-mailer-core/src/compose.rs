//! Plain-text bodies and subjects for every email the service sends.

use crate::model::{BroadcastKind, ForecastSnapshot, HeavyRainHour};

const SEPARATOR: &str = "-----------------------------";

pub const DAILY_SUBJECT: &str = "🌤️ Daily Weather Update from Kriyaat";
pub const FOLLOW_UP_SUBJECT: &str = "🌤️ Weather Update from Kriyaat";
pub const HEAVY_RAIN_SUBJECT: &str = "🌧️ Alert from Kriyaat: Heavy rain expected soon";

pub fn subject(kind: BroadcastKind) -> &'static str {
    match kind {
        BroadcastKind::Regular => DAILY_SUBJECT,
        BroadcastKind::FollowUp => FOLLOW_UP_SUBJECT,
    }
}

/// Replace ASCII digits with Devanagari digits; everything else is kept.
pub fn to_nepali_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c.to_digit(10) {
            // U+0966 DEVANAGARI DIGIT ZERO .. U+096F
            Some(d) => char::from_u32(0x0966 + d).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Full broadcast body: English section, optional changes block, Nepali section.
///
/// The changes block only appears for follow-ups when a previous snapshot
/// exists, and lists only the fields that moved.
pub fn compose(
    snapshot: &ForecastSnapshot,
    previous: Option<&ForecastSnapshot>,
    kind: BroadcastKind,
) -> String {
    let changes = match previous {
        Some(prev) if kind.is_follow_up() => changes_block(prev, snapshot),
        _ => String::new(),
    };

    let changes_section =
        if changes.is_empty() { String::new() } else { format!("{SEPARATOR}\n{changes}") };

    let update_kind = if kind.is_follow_up() { "updated" } else { "daily" };

    let rain_timing = match snapshot.rain_window() {
        Some((start, end)) => format!("{start} - {end}"),
        None => "Not specified".to_string(),
    };

    let storm_line = if snapshot.storm_warning.is_empty() {
        String::new()
    } else {
        format!("⚠️ Storm Alert: {}", snapshot.storm_warning)
    };

    let english = format!(
        "🙏 Namaste from Kriyaat! 🌤️\n\
         \n\
         Here's your {update_kind} weather update:\n\
         \n\
         📍 Location: {location}\n\
         📝 Condition: {condition}\n\
         \n\
         🌡️ Min Temp: {min} °C\n\
         🌡️ Max Temp: {max} °C\n\
         💧 Humidity: {humidity}%\n\
         🌧️ Precipitation: {precip} mm\n\
         🕐 Rain Timing: {rain_timing}\n\
         ☔ Chance of Rain: {chance}%\n\
         \n\
         {storm_line}\n\
         \n\
         {changes_section}\n\
         \n\
         {SEPARATOR}\n\
         {nepali}",
        location = snapshot.location_name,
        condition = snapshot.condition_text,
        min = snapshot.min_temp,
        max = snapshot.max_temp,
        humidity = snapshot.humidity,
        precip = snapshot.precipitation,
        chance = snapshot.rain_chance,
        nepali = nepali_section(snapshot),
    );

    english.trim().to_string()
}

/// Delta lines between two snapshots. Always starts with the heading, so a
/// follow-up with nothing changed still carries an empty block.
fn changes_block(prev: &ForecastSnapshot, current: &ForecastSnapshot) -> String {
    let mut block = String::from("Changes since last update:");

    if prev.precipitation != current.precipitation {
        block.push_str(&format!(
            "\n- Precipitation: {} mm → {} mm",
            prev.precipitation, current.precipitation
        ));
    }
    if prev.rain_chance != current.rain_chance {
        block.push_str(&format!(
            "\n- Chance of Rain: {}% → {}%",
            prev.rain_chance, current.rain_chance
        ));
    }
    if prev.storm_warning != current.storm_warning {
        block.push_str(&format!(
            "\n- Storm Warning: {} → {}",
            or_none(&prev.storm_warning),
            or_none(&current.storm_warning)
        ));
    }

    block
}

fn or_none(s: &str) -> &str {
    if s.is_empty() { "None" } else { s }
}

fn nepali_section(snapshot: &ForecastSnapshot) -> String {
    let rain_time = match snapshot.rain_window() {
        Some((start, end)) => format!("🕐 वर्षा {start} बजेदेखि {end} बजेसम्म हुन सक्नेछ।"),
        None => "🕐 वर्षाको समय निश्चित छैन।".to_string(),
    };

    let storm_text = if snapshot.storm_warning.is_empty() {
        String::new()
    } else {
        format!("⚠️ मौसमी चेतावनी: {}", snapshot.storm_warning)
    };

    let text = format!(
        "🙏 नमस्ते! क्रियातबाट आजको मौसम जानकारी:\n\
         \n\
         📍 स्थान: {location}\n\
         📝 मौसम: {condition}\n\
         \n\
         🌡️ न्यूनतम तापक्रम: {min}°C\n\
         🌡️ अधिकतम तापक्रम: {max}°C\n\
         💧 आर्द्रता: {humidity}%\n\
         🌧️ वर्षा: {precip} मिमी\n\
         {rain_time}\n\
         ☔ वर्षाको सम्भावना: {chance}%\n\
         \n\
         {storm_text}",
        location = snapshot.location_name,
        condition = snapshot.condition_text,
        min = to_nepali_digits(&snapshot.min_temp),
        max = to_nepali_digits(&snapshot.max_temp),
        humidity = to_nepali_digits(&snapshot.humidity),
        precip = to_nepali_digits(&snapshot.precipitation),
        chance = to_nepali_digits(&snapshot.rain_chance.to_string()),
    );

    text.trim().to_string()
}

/// Stand-alone alert sent shortly before the first heavy-rain hour.
pub fn heavy_rain_alert(hour: &HeavyRainHour) -> String {
    format!(
        "🙏 Namaste from Kriyaat!\n\n🌧️ Heavy rain expected around {}.\nPlease be prepared and carry an umbrella ☂️.",
        hour.clock_time()
    )
}
