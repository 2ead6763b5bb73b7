//! Scene segmentation: partition normalised text on sluglines.
//!
//! A slugline (`INT. KITCHEN - DAY`, `12 НАТ. УЛИЦА - НОЧЬ`) opens a scene
//! that runs until the next slugline or the end of the document. Lines
//! before the first slugline form a preamble scene (title page, `FADE IN:`).
//!
//! Every line of the input lands in exactly one scene body, so joining the
//! bodies in order gives back [`NormalizedText::to_text`].

use crate::output::{Scene, Setting, TimeOfDay};
use crate::pipeline::normalize::NormalizedText;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Parsed slugline attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slugline {
    pub scene_number: Option<String>,
    pub setting: Setting,
    pub location: Option<String>,
    pub sub_location: Option<String>,
    pub time_of_day: TimeOfDay,
}

static RE_SLUGLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?P<num>\d{1,4}(?:[-./]?[0-9A-ZА-ЯЁ]{1,4})*)[.)]?\s+)?(?P<prefix>INT\.?\s*/\s*EXT|EXT\.?\s*/\s*INT|I/E|INT|EXT|ИНТ\.?\s*/\s*НАТ|НАТ\.?\s*/\s*ИНТ|ИНТ|НАТ)(?:\.\s*|\s+|$)(?P<rest>.*)$",
    )
    .unwrap()
});

static RE_TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?P<num>\d{1,4}(?:[-./]?[0-9A-ZА-ЯЁ]{1,4})*)\.?$").unwrap());

/// Separators that split location from time when no time keyword follows
/// them: a spaced hyphen or any en/em dash.
static RE_DASH_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+-\s+|\s*[–—]\s*").unwrap());

/// Separators between a location and its sub-location: a spaced hyphen,
/// an en/em dash, or a period followed by a space.
static RE_SUB_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+-\s+|\s*[–—]\s*|\.\s+").unwrap());

/// Abbreviations whose period is not a sub-location separator.
const LOCATION_ABBREVIATIONS: &[&str] = &["ST", "DR", "MR", "MRS", "MS", "MT", "NO", "УЛ", "Д"];

/// Time keywords by mapped value. Matching is on the upper-cased time text.
const TIME_KEYWORDS: &[(&str, TimeOfDay)] = &[
    ("AFTERNOON", TimeOfDay::Day),
    ("NOON", TimeOfDay::Day),
    ("DAY", TimeOfDay::Day),
    ("ДЕНЬ", TimeOfDay::Day),
    ("ДНЕМ", TimeOfDay::Day),
    ("ДНЁМ", TimeOfDay::Day),
    ("NIGHT", TimeOfDay::Night),
    ("НОЧЬЮ", TimeOfDay::Night),
    ("НОЧЬ", TimeOfDay::Night),
    ("DUSK", TimeOfDay::Dusk),
    ("EVENING", TimeOfDay::Dusk),
    ("SUNSET", TimeOfDay::Dusk),
    ("TWILIGHT", TimeOfDay::Dusk),
    ("ВЕЧЕР", TimeOfDay::Dusk),
    ("СУМЕРКИ", TimeOfDay::Dusk),
    ("ЗАКАТ", TimeOfDay::Dusk),
    ("DAWN", TimeOfDay::Dawn),
    ("MORNING", TimeOfDay::Dawn),
    ("SUNRISE", TimeOfDay::Dawn),
    ("УТРО", TimeOfDay::Dawn),
    ("РАССВЕТ", TimeOfDay::Dawn),
];

/// Map free time-of-day text to the closed set.
///
/// The keyword occurring earliest in the text wins, so `DAY (FLASHBACK TO
/// NIGHT)` is `DAY`. Unmatched text is [`TimeOfDay::Unspecified`].
pub fn map_time_of_day(text: &str) -> TimeOfDay {
    let upper = text.to_uppercase();
    TIME_KEYWORDS
        .iter()
        .filter_map(|(kw, tod)| upper.find(kw).map(|pos| (pos, *tod)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, tod)| tod)
        .unwrap_or_default()
}

fn setting_from_prefix(prefix: &str) -> Setting {
    let p = prefix.to_uppercase();
    let interior = p.contains("INT") || p.contains("ИНТ") || p == "I/E";
    let exterior = p.contains("EXT") || p.contains("НАТ") || p == "I/E";
    match (interior, exterior) {
        (true, true) => Setting::InteriorExterior,
        (true, false) => Setting::Interior,
        (false, true) => Setting::Exterior,
        (false, false) => Setting::Unspecified,
    }
}

fn clean_location(s: &str) -> Option<String> {
    let trimmed = s
        .trim()
        .trim_end_matches(|c: char| matches!(c, '-' | '–' | '—' | '.' | ',' | ':') || c.is_whitespace())
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split the text after the slugline prefix into location and time.
fn split_location_time(rest: &str) -> (Option<String>, TimeOfDay) {
    // Prefer the last separator whose tail names a time of day.
    let separators: Vec<(usize, char)> = rest
        .char_indices()
        .filter(|(_, c)| matches!(c, '-' | '–' | '—' | '.'))
        .collect();
    for &(pos, c) in separators.iter().rev() {
        let head = &rest[..pos];
        let tail = rest[pos + c.len_utf8()..].trim();
        if head.trim().is_empty() || tail.is_empty() {
            continue;
        }
        let tod = map_time_of_day(tail);
        if tod != TimeOfDay::Unspecified {
            return (clean_location(head), tod);
        }
    }

    // `INT. KITCHEN - LATER`: the location still ends at the dash.
    if let Some(m) = RE_DASH_SEPARATOR.find_iter(rest).last() {
        if !rest[..m.start()].trim().is_empty() {
            return (clean_location(&rest[..m.start()]), TimeOfDay::Unspecified);
        }
    }

    (clean_location(rest), TimeOfDay::Unspecified)
}

/// The part of a location after its first inner separator.
///
/// `JOHN'S HOUSE - KITCHEN` gives `KITCHEN`, `ЧЕЛЮСКИН. КАЮТ-КОМПАНИЯ` gives
/// `КАЮТ-КОМПАНИЯ`. Unspaced hyphens and abbreviation periods
/// (`ST. MARY'S CHURCH`) do not split.
pub fn split_sub_location(location: &str) -> Option<String> {
    for m in RE_SUB_LOCATION.find_iter(location) {
        let head = location[..m.start()].trim();
        if head.is_empty() {
            continue;
        }
        let period = m.as_str().trim_start().starts_with('.');
        let last_word = head.rsplit(' ').next().unwrap_or(head).to_uppercase();
        if period && LOCATION_ABBREVIATIONS.contains(&last_word.as_str()) {
            continue;
        }
        return clean_location(&location[m.end()..]);
    }
    None
}

/// Parse one line as a slugline. Returns `None` for anything else.
pub fn parse_slugline(line: &str) -> Option<Slugline> {
    let caps = RE_SLUGLINE.captures(line.trim())?;
    let setting = setting_from_prefix(&caps["prefix"]);
    let mut scene_number = caps.name("num").map(|m| m.as_str().to_string());
    let mut rest = caps.name("rest").map_or("", |m| m.as_str()).trim();

    // A trailing number is a scene number only when it follows the time or
    // repeats the leading number; `INT. APARTMENT 4B` keeps its 4B.
    if let Some(c) = RE_TRAILING_NUMBER.captures(rest) {
        let head = &rest[..c.get(0).map_or(rest.len(), |m| m.start())];
        let trailing = &c["num"];
        let repeats = scene_number.as_deref() == Some(trailing);
        if repeats || split_location_time(head).1 != TimeOfDay::Unspecified {
            if scene_number.is_none() {
                scene_number = Some(trailing.to_string());
            }
            rest = head.trim();
        }
    }

    let (location, time_of_day) = split_location_time(rest);
    let sub_location = location.as_deref().and_then(split_sub_location);
    Some(Slugline {
        scene_number,
        setting,
        location,
        sub_location,
        time_of_day,
    })
}

fn open_scene(index: usize, heading: Option<&str>) -> Scene {
    let slug = heading.and_then(parse_slugline);
    Scene {
        index,
        heading: heading.map(str::to_string),
        scene_number: slug.as_ref().and_then(|s| s.scene_number.clone()),
        setting: slug.as_ref().map_or(Setting::Unspecified, |s| s.setting),
        location: slug.as_ref().and_then(|s| s.location.clone()),
        sub_location: slug.as_ref().and_then(|s| s.sub_location.clone()),
        time_of_day: slug.as_ref().map_or(TimeOfDay::Unspecified, |s| s.time_of_day),
        body: String::new(),
        location_id: None,
        characters: Vec::new(),
        objects: Vec::new(),
        extras: Vec::new(),
    }
}

/// Partition normalised text into scenes with contiguous indices from 0.
///
/// Never fails. An empty document gives a single empty preamble scene.
pub fn segment(text: &NormalizedText) -> Vec<Scene> {
    let mut scenes: Vec<Scene> = Vec::new();

    for line in text.lines() {
        if parse_slugline(line).is_some() {
            scenes.push(open_scene(scenes.len(), Some(line.as_str())));
        } else if scenes.is_empty() {
            scenes.push(open_scene(0, None));
        }
        if let Some(current) = scenes.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }

    if scenes.is_empty() {
        scenes.push(open_scene(0, None));
    }

    debug!(
        "Segmented {} lines into {} scene(s)",
        text.len(),
        scenes.len()
    );
    scenes
}
