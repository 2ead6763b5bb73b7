//! Gazetteer tagger: keyword lists per production department.
//!
//! Matches are case-insensitive on word boundaries. English entries accept
//! a plural `-s`/`-es`; Russian entries are stems that accept up to three
//! trailing letters, which covers most case endings (`телефон`,
//! `телефоном`, `телефона`).

use super::{TaggedSpan, Tagger};
use crate::error::TaggerError;
use crate::output::{EntityKind, ObjectCategory};
use regex::Regex;

/// Keyword lists for one language.
#[derive(Debug)]
pub struct Lexicon {
    pub language: &'static str,
    pub props: &'static [&'static str],
    pub vehicles: &'static [&'static str],
    pub effects: &'static [&'static str],
    pub equipment: &'static [&'static str],
    pub locations: &'static [&'static str],
    /// Verbs that mark the preceding capitalised word as a character.
    pub character_verbs: &'static [&'static str],
    /// Capitalised words that precede those verbs but are not names.
    pub pronouns: &'static [&'static str],
    /// Regex fragment accepted after every keyword.
    inflection: &'static str,
}

pub static ENGLISH: Lexicon = Lexicon {
    language: "en",
    props: &[
        "knife", "gun", "pistol", "revolver", "rifle", "shotgun", "sword", "phone", "cellphone",
        "telephone", "letter", "envelope", "briefcase", "suitcase", "bag", "backpack", "wallet",
        "purse", "key", "glass", "bottle", "cup", "mug", "book", "notebook", "newspaper",
        "photo", "photograph", "laptop", "computer", "wristwatch", "necklace", "cigarette",
        "lighter", "flashlight", "umbrella", "hat", "map", "money", "cash", "coin", "document",
        "folder", "pen", "pencil", "box", "lamp", "mirror", "clock", "radio", "television",
        "guitar", "badge", "handcuffs", "syringe", "pills", "rope",
    ],
    vehicles: &[
        "car", "truck", "van", "bus", "taxi", "cab", "motorcycle", "bicycle", "train", "plane",
        "airplane", "helicopter", "boat", "ship", "yacht", "ambulance", "limousine", "tractor",
        "jeep", "tram", "police car",
    ],
    effects: &[
        "explosion", "fire", "smoke", "rain", "snow", "fog", "gunshot", "gunfire", "thunder",
        "lightning", "blood", "sparks", "storm",
    ],
    equipment: &[
        "crane", "dolly", "steadicam", "drone", "generator", "projector", "microphone",
        "spotlight", "ladder",
    ],
    locations: &[
        "kitchen", "bedroom", "bathroom", "living room", "office", "hallway", "corridor",
        "street", "alley", "park", "forest", "beach", "restaurant", "cafe", "hospital",
        "school", "church", "station", "airport", "warehouse", "apartment", "garage",
        "basement", "rooftop", "lobby", "elevator",
    ],
    character_verbs: &[
        "says", "said", "asks", "asked", "shouts", "shouted", "whispers", "whispered", "yells",
        "yelled", "replies", "replied", "answers", "answered", "screams", "mutters", "tells",
        "told", "calls", "cries",
    ],
    pronouns: &[
        "he", "she", "it", "they", "we", "i", "you", "someone", "somebody", "everyone",
        "nobody", "the", "then",
    ],
    inflection: "(?:s|es)?",
};

pub static RUSSIAN: Lexicon = Lexicon {
    language: "ru",
    props: &[
        "телефон", "ноутбук", "компьютер", "деньг", "кошел", "ключ", "документ", "книг",
        "газет", "ручк", "карандаш", "бумаг", "папк", "портфел", "сумк", "напит", "вин",
        "нож", "пистолет", "ружь", "бутылк", "стакан", "чашк", "письм", "конверт", "фотографи",
        "часы", "кольц", "сигарет", "зажигалк", "фонар", "зонт", "шляп",
    ],
    vehicles: &[
        "автомобил", "машин", "такси", "автобус", "трамва", "поезд", "мотоцикл", "велосипед",
        "грузовик", "вертолет", "вертолёт", "самолет", "самолёт", "лодк", "катер",
    ],
    effects: &[
        "спецэффект", "дым", "огонь", "огн", "взрыв", "молни", "дожд", "снег", "ветер", "кровь",
        "выстрел", "гроз", "туман",
    ],
    equipment: &[
        "коптер", "дрон", "объектив", "микрофон", "подъемник", "подъёмник", "кран",
        "прожектор", "генератор",
    ],
    locations: &[
        "кабинет", "офис", "комнат", "квартир", "улиц", "площад", "парк", "кафе", "ресторан",
        "сквер", "клуб", "кухн", "коридор", "больниц", "школ", "вокзал", "подъезд",
    ],
    character_verbs: &[
        "говорит", "сказал", "сказала", "спрашивает", "кричит", "шепчет", "отвечает",
        "смотрит", "идет", "идёт", "делает",
    ],
    pronouns: &["он", "она", "оно", "они", "мы", "я", "ты", "вы", "все", "кто-то", "никто"],
    inflection: r"\p{L}{0,3}",
};

impl Lexicon {
    fn object_lists(&self) -> [(&'static [&'static str], ObjectCategory, f32); 4] {
        [
            (self.props, ObjectCategory::Prop, 0.7),
            (self.vehicles, ObjectCategory::Vehicle, 0.7),
            (self.effects, ObjectCategory::Effect, 0.6),
            (self.equipment, ObjectCategory::Equipment, 0.6),
        ]
    }

    /// Whether `word` (lower-cased) is an inflected form of `entry`.
    fn inflects(&self, word: &str, entry: &str) -> bool {
        match word.strip_prefix(entry) {
            Some("") => true,
            Some(rest) if self.language == "en" => rest == "s" || rest == "es",
            Some(rest) => rest.chars().count() <= 3 && rest.chars().all(char::is_alphabetic),
            None => false,
        }
    }

    /// Object category of a single word, if it is a known object.
    pub fn object_category(&self, word: &str) -> Option<ObjectCategory> {
        let word = word.to_lowercase();
        self.object_lists()
            .into_iter()
            .find(|(entries, _, _)| entries.iter().any(|e| self.inflects(&word, e)))
            .map(|(_, category, _)| category)
    }
}

/// Object category of a word in any built-in language.
pub fn object_category(word: &str) -> Option<ObjectCategory> {
    ENGLISH
        .object_category(word)
        .or_else(|| RUSSIAN.object_category(word))
}

fn keyword_regex(entries: &[&str], inflection: &str) -> Result<Regex, TaggerError> {
    let alternation = entries
        .iter()
        .map(|e| regex::escape(e))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation}){inflection}\b"))
        .map_err(|e| TaggerError::Unavailable(format!("keyword pattern: {e}")))
}

/// Tagger backed by a [`Lexicon`].
pub struct LexiconTagger {
    id: String,
    lexicon: &'static Lexicon,
    objects: Vec<(Regex, ObjectCategory, f32)>,
    locations: Regex,
    speakers: Regex,
}

impl LexiconTagger {
    /// Compile the lexicon's keyword patterns.
    pub fn new(lexicon: &'static Lexicon) -> Result<Self, TaggerError> {
        let objects = lexicon
            .object_lists()
            .into_iter()
            .map(|(entries, category, confidence)| {
                Ok::<_, TaggerError>((
                    keyword_regex(entries, lexicon.inflection)?,
                    category,
                    confidence,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let locations = keyword_regex(lexicon.locations, lexicon.inflection)?;
        let verbs = lexicon
            .character_verbs
            .iter()
            .map(|v| regex::escape(v))
            .collect::<Vec<_>>()
            .join("|");
        let speakers = Regex::new(&format!(
            r"\b(?P<name>\p{{Lu}}\p{{Ll}}+|\p{{Lu}}{{2,}})\s+(?i:{verbs})\b"
        ))
        .map_err(|e| TaggerError::Unavailable(format!("speaker pattern: {e}")))?;

        Ok(Self {
            id: format!("lexicon-{}", lexicon.language),
            lexicon,
            objects,
            locations,
            speakers,
        })
    }

    pub fn english() -> Result<Self, TaggerError> {
        Self::new(&ENGLISH)
    }

    pub fn russian() -> Result<Self, TaggerError> {
        Self::new(&RUSSIAN)
    }
}

impl Tagger for LexiconTagger {
    fn id(&self) -> &str {
        &self.id
    }

    fn languages(&self) -> Option<&[&str]> {
        Some(std::slice::from_ref(&self.lexicon.language))
    }

    fn tag(&self, text: &str) -> Result<Vec<TaggedSpan>, TaggerError> {
        let mut spans = Vec::new();

        for (re, category, confidence) in &self.objects {
            spans.extend(re.find_iter(text).map(|m| {
                TaggedSpan::new(m.as_str(), EntityKind::Object, *confidence).with_category(*category)
            }));
        }

        spans.extend(
            self.locations
                .find_iter(text)
                .map(|m| TaggedSpan::new(m.as_str(), EntityKind::Location, 0.5)),
        );

        for caps in self.speakers.captures_iter(text) {
            let name = &caps["name"];
            let lower = name.to_lowercase();
            if !self.lexicon.pronouns.iter().any(|p| *p == lower) {
                spans.push(TaggedSpan::new(name, EntityKind::Character, 0.6));
            }
        }

        Ok(spans)
    }
}
