//! Crowd detection: background performers a scene calls for.
//!
//! Extras are not entities. They have no identity across scenes, only a
//! head count when the writer prints one: `A CROWD (30) gathers`, `ТОЛПА
//! (50) шумит`.

use crate::output::CrowdNote;
use once_cell::sync::Lazy;
use regex::Regex;

/// Indicator patterns and the label each one reports.
static INDICATORS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"crowds?", "crowd"),
        (r"extras", "extras"),
        (r"onlookers?", "onlookers"),
        (r"passers-?by", "passers-by"),
        (r"spectators", "spectators"),
        (r"bystanders", "bystanders"),
        (r"guests", "guests"),
        (r"waiters", "waiters"),
        (r"students", "students"),
        (r"массовк(?:а|и|у|е|ой)", "массовка"),
        (r"толп(?:а|ы|у|е|ой)", "толпа"),
        (r"прохож(?:ие|их|им|ими)", "прохожие"),
        (r"зрител(?:и|ей|ям|ями)", "зрители"),
        (r"гост(?:и|ей|ям|ями)", "гости"),
        (r"официант(?:ы|ов|ам|ами)", "официанты"),
        (r"студент(?:ы|ов|ам|ами)", "студенты"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(&format!(r"(?i)\b{pattern}\b")).unwrap(), label))
    .collect()
});

static RE_HEAD_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*(\d{1,5})\s*\)").unwrap());

/// Find crowd indicators in scene text, one note per label in order of
/// first mention.
///
/// A head count is the first `(N)` after the indicator on the same line and
/// before the next indicator. Later mentions fill a count the first one
/// lacked.
pub fn detect_crowd(text: &str) -> Vec<CrowdNote> {
    let mut hits: Vec<(usize, usize, &'static str)> = INDICATORS
        .iter()
        .flat_map(|(re, label)| re.find_iter(text).map(move |m| (m.start(), m.end(), *label)))
        .collect();
    hits.sort_by_key(|&(start, _, _)| start);

    let mut notes: Vec<CrowdNote> = Vec::new();
    for (i, &(_, end, label)) in hits.iter().enumerate() {
        let line_end = text[end..].find('\n').map_or(text.len(), |p| end + p);
        let window_end = hits
            .get(i + 1)
            .map_or(line_end, |&(next, _, _)| next.min(line_end));
        let count = RE_HEAD_COUNT
            .captures(&text[end..window_end.max(end)])
            .and_then(|c| c[1].parse().ok());

        match notes.iter_mut().find(|n| n.label == label) {
            Some(note) => {
                if note.count.is_none() {
                    note.count = count;
                }
            }
            None => notes.push(CrowdNote {
                label: label.to_string(),
                count,
            }),
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(label: &str, count: Option<u32>) -> CrowdNote {
        CrowdNote {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn counts_follow_their_indicator() {
        let notes = detect_crowd("A CROWD (30) gathers. Guests (12) arrive.\n");
        assert_eq!(notes, [note("crowd", Some(30)), note("guests", Some(12))]);
    }

    #[test]
    fn count_does_not_leak_across_indicators_or_lines() {
        let notes = detect_crowd("Onlookers stare at the guests (40).\nThe crowd\n(25) roars.\n");
        assert_eq!(
            notes,
            [note("onlookers", None), note("guests", Some(40)), note("crowd", None)]
        );
    }

    #[test]
    fn later_mention_fills_missing_count() {
        let notes = detect_crowd("The crowd parts.\nThe CROWD (200) cheers.\n");
        assert_eq!(notes, [note("crowd", Some(200))]);
    }

    #[test]
    fn russian_inflections_share_a_label() {
        let notes = detect_crowd("ТОЛПА (50) шумит. Иван пробирается сквозь толпу. Прохожие оглядываются.");
        assert_eq!(notes, [note("толпа", Some(50)), note("прохожие", None)]);
    }

    #[test]
    fn words_containing_an_indicator_do_not_match() {
        assert!(detect_crowd("The crowded bus stops at the guesthouse.").is_empty());
        assert!(detect_crowd("").is_empty());
    }
}
