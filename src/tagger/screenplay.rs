//! Tagger driven by screenplay formatting conventions.
//!
//! Two conventions carry most of the signal in a formatted script:
//!
//! - A **cue line** (a short all-caps line directly above dialogue) names
//!   the speaker.
//! - Action lines introduce characters, and often key props, in capitals
//!   the first time they appear: `JOHN enters holding a KNIFE.`
//!
//! Both work for any script in a cased alphabet, so this tagger is not
//! scoped to a language.

use super::lexicon::object_category;
use super::{TaggedSpan, Tagger};
use crate::error::TaggerError;
use crate::output::EntityKind;
use once_cell::sync::Lazy;
use regex::Regex;

const CUE_CONFIDENCE: f32 = 0.95;
const ACTION_CHARACTER_CONFIDENCE: f32 = 0.8;
const ACTION_OBJECT_CONFIDENCE: f32 = 0.85;
const MAX_CUE_WORDS: usize = 4;

static RE_PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

static RE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\s+(?:V\.O\.|O\.S\.|O\.C\.|CONT'D|CONT’D|ЗК|З\.К\.))+$").unwrap()
});

/// One all-caps word of at least two characters.
static RE_CAPS_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\p{Lu}[\p{Lu}\p{Nd}'’\-]*[\p{Lu}\p{Nd}]\b").unwrap());

/// Transitions and directions that look like cues.
const JARGON: &[&str] = &[
    "FADE IN", "FADE OUT", "FADE TO BLACK", "CUT TO", "SMASH CUT", "MATCH CUT", "JUMP CUT",
    "DISSOLVE TO", "INTERCUT", "BACK TO SCENE", "THE END", "CONTINUOUS", "LATER",
    "MOMENTS LATER", "MONTAGE", "END MONTAGE", "FLASHBACK", "END FLASHBACK", "TITLE",
    "TITLE CARD", "SUPER", "INSERT", "CLOSE ON", "ANGLE ON", "BLACK", "SERIES OF SHOTS",
    "КОНЕЦ", "ЗТМ", "ИЗ ЗТМ", "ПРОДОЛЖЕНИЕ", "ТИТР",
];

/// Camera and sound shorthand that appears capitalised inside action.
const JARGON_WORDS: &[&str] = &[
    "POV", "SFX", "VFX", "OK", "CU", "ECU", "MCU", "ANGLE", "CLOSE", "INSERT", "SUPER",
    "CONT'D", "CONT’D", "INT", "EXT", "TV", "ЗК", "ЗТМ",
];

/// Finds characters and props from cue lines and capitalised action text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScreenplayTagger;

impl ScreenplayTagger {
    pub fn new() -> Self {
        Self
    }
}

fn is_jargon(text: &str) -> bool {
    let key = text.trim_end_matches(|c: char| !c.is_alphanumeric());
    JARGON.contains(&key)
}

/// The speaker named by a cue line, or `None` if `line` is not a cue.
fn cue_name(line: &str) -> Option<String> {
    let stripped = RE_PARENTHETICAL.replace_all(line, "");
    let stripped = RE_EXTENSION.replace(stripped.trim(), "");
    let name = stripped.trim();

    let letters = name.chars().filter(|c| c.is_alphabetic()).count();
    if letters < 2 || name.chars().any(char::is_lowercase) {
        return None;
    }
    if !name.chars().next().is_some_and(char::is_alphabetic) {
        return None;
    }
    if name.ends_with(['.', '!', '?', ':', ',', ';']) {
        return None;
    }
    if name.split_whitespace().count() > MAX_CUE_WORDS || is_jargon(name) {
        return None;
    }
    Some(name.to_string())
}

/// Runs of adjacent all-caps words inside a mixed-case line.
fn caps_runs(line: &str) -> Vec<&str> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for m in RE_CAPS_WORD.find_iter(line) {
        if JARGON_WORDS.contains(&m.as_str()) {
            continue;
        }
        match runs.last_mut() {
            Some((_, end)) if line[*end..m.start()].chars().all(|c| c == ' ') => {
                *end = m.end();
            }
            _ => runs.push((m.start(), m.end())),
        }
    }
    runs.into_iter()
        .map(|(start, end)| &line[start..end])
        .filter(|run| !is_jargon(run))
        .collect()
}

impl Tagger for ScreenplayTagger {
    fn id(&self) -> &str {
        "screenplay"
    }

    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut spans = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }

            // A cue is only a cue when dialogue follows it directly.
            let has_dialogue = lines.get(i + 1).is_some_and(|next| !next.is_empty());
            if let Some(name) = cue_name(line) {
                if has_dialogue {
                    spans.push(TaggedSpan::new(name, EntityKind::Character, CUE_CONFIDENCE));
                }
                continue;
            }

            // Fully capitalised non-cue lines are titles or shouted dialogue.
            if !line.chars().any(char::is_lowercase) {
                continue;
            }

            for run in caps_runs(line) {
                let head = run.rsplit(' ').next().unwrap_or(run);
                let span = match object_category(head) {
                    Some(category) => {
                        TaggedSpan::new(run, EntityKind::Object, ACTION_OBJECT_CONFIDENCE)
                            .with_category(category)
                    }
                    None => TaggedSpan::new(run, EntityKind::Character, ACTION_CHARACTER_CONFIDENCE),
                };
                spans.push(span);
            }
        }

        Ok(spans)
    }
}
