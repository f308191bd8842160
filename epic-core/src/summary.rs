//! Detailed answer summaries
//!
//! A summary maps choice labels to response counts, `<label>_justify` to the
//! justification texts given with that choice, and `no_valid_response` to
//! the number of answers still empty. Key order is stable: choice labels in
//! declaration order, then `no_valid_response`.

use crate::{Answer, AnswerBody, AnswerKind, EvolutionChoice, ProgramId, YesNoChoice};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Key counting answers that fail the validity predicate.
pub const NO_VALID_RESPONSE: &str = "no_valid_response";

/// Suffix of keys holding justification texts.
pub const JUSTIFY_SUFFIX: &str = "_justify";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Count(usize),
    Justifications(Vec<String>),
}

/// Ordered summary map. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailedSummary {
    entries: Vec<(String, SummaryValue)>,
}

impl DetailedSummary {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&SummaryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn count(&self, key: &str) -> Option<usize> {
        match self.get(key) {
            Some(SummaryValue::Count(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn justifications(&self, label: &str) -> Option<&[String]> {
        match self.get(&format!("{label}{JUSTIFY_SUFFIX}")) {
            Some(SummaryValue::Justifications(texts)) => Some(texts),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SummaryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Count entries usable as chart categories.
    pub fn chart_entries(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().filter_map(|(k, v)| match v {
            SummaryValue::Count(n) if k != NO_VALID_RESPONSE => Some((k.as_str(), *n)),
            _ => None,
        })
    }

    /// `(choice label, texts)` for every justification entry.
    pub fn justification_entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().filter_map(|(k, v)| match v {
            SummaryValue::Justifications(texts) => k
                .strip_suffix(JUSTIFY_SUFFIX)
                .map(|label| (label, texts.as_slice())),
            _ => None,
        })
    }

    fn push_count(&mut self, key: impl Into<String>, n: usize) {
        self.entries.push((key.into(), SummaryValue::Count(n)));
    }

    fn push_justifications(&mut self, label: &str, texts: Vec<String>) {
        self.entries
            .push((format!("{label}{JUSTIFY_SUFFIX}"), SummaryValue::Justifications(texts)));
    }
}

impl Serialize for DetailedSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Summarize the answers given to one question.
///
/// The first answer decides the concrete kind of the whole collection;
/// answers of any other kind are left out, the same way a re-query on the
/// concrete kind would drop them. An empty collection yields an empty
/// summary. `program_names` labels multiple-choice selections; unknown
/// programs fall back to their id.
pub fn detailed_summary<'a, I>(
    answers: I,
    program_names: &HashMap<ProgramId, String>,
) -> DetailedSummary
where
    I: IntoIterator<Item = &'a Answer>,
{
    let mut answers = answers.into_iter().peekable();
    let Some(kind) = answers.peek().map(|a| a.kind()) else {
        return DetailedSummary::default();
    };
    let same_kind: Vec<&AnswerBody> = answers
        .filter(|a| a.kind() == kind)
        .map(|a| &a.body)
        .collect();

    match kind {
        AnswerKind::YesNo => summarize_yes_no(&same_kind),
        AnswerKind::SingleChoice => summarize_single_choice(&same_kind),
        AnswerKind::MultipleChoice => summarize_multiple_choice(&same_kind, program_names),
    }
}

fn collect_justified<'a>(
    bodies: &[&'a AnswerBody],
    matches: impl Fn(&AnswerBody) -> bool,
) -> (usize, Vec<String>) {
    let chosen: Vec<&&AnswerBody> = bodies.iter().filter(|b| matches(b)).collect();
    let texts = chosen
        .iter()
        .filter_map(|b| b.justify_answer())
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .collect();
    (chosen.len(), texts)
}

fn invalid_count(bodies: &[&AnswerBody]) -> usize {
    bodies.iter().filter(|b| !b.is_valid_answer()).count()
}

fn summarize_yes_no(bodies: &[&AnswerBody]) -> DetailedSummary {
    let mut summary = DetailedSummary::default();
    for choice in YesNoChoice::ALL {
        let (count, texts) = collect_justified(bodies, |b| {
            matches!(b, AnswerBody::YesNo { short_answer: Some(c), .. } if *c == choice)
        });
        summary.push_count(choice.label(), count);
        summary.push_justifications(choice.label(), texts);
    }
    summary.push_count(NO_VALID_RESPONSE, invalid_count(bodies));
    summary
}

fn summarize_single_choice(bodies: &[&AnswerBody]) -> DetailedSummary {
    let mut summary = DetailedSummary::default();
    for choice in EvolutionChoice::ALL {
        let (count, texts) = collect_justified(bodies, |b| {
            matches!(b, AnswerBody::SingleChoice { selected_choice: Some(c), .. } if *c == choice)
        });
        summary.push_count(choice.label(), count);
        summary.push_justifications(choice.label(), texts);
    }
    summary.push_count(NO_VALID_RESPONSE, invalid_count(bodies));
    summary
}

fn summarize_multiple_choice(
    bodies: &[&AnswerBody],
    program_names: &HashMap<ProgramId, String>,
) -> DetailedSummary {
    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
    for program_id in bodies.iter().filter_map(|b| b.selected_programs()).flatten() {
        let name = program_names
            .get(program_id)
            .cloned()
            .unwrap_or_else(|| program_id.to_string());
        *frequencies.entry(name).or_default() += 1;
    }

    let mut summary = DetailedSummary::default();
    for (name, count) in frequencies {
        summary.push_count(name, count);
    }
    summary.push_count(NO_VALID_RESPONSE, invalid_count(bodies));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{new_entity_id, AnswerBody};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn answer(body: AnswerBody) -> Answer {
        Answer {
            id: new_entity_id(),
            user_id: new_entity_id(),
            question_id: new_entity_id(),
            body,
        }
    }

    fn yes_no(choice: Option<YesNoChoice>, justify: &str) -> Answer {
        answer(AnswerBody::YesNo {
            short_answer: choice,
            justify_answer: justify.to_string(),
        })
    }

    #[test]
    fn test_empty_collection_gives_empty_summary() {
        let summary = detailed_summary(std::iter::empty::<&Answer>(), &HashMap::new());
        assert!(summary.is_empty());
        assert_eq!(serde_json::to_string(&summary).unwrap(), "{}");
    }

    #[test]
    fn test_yes_no_summary_shape() {
        let answers = vec![
            yes_no(Some(YesNoChoice::No), "Laboris proident"),
            yes_no(Some(YesNoChoice::No), "  "),
            yes_no(None, "forgot to pick"),
        ];
        let summary = detailed_summary(&answers, &HashMap::new());
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(
            json,
            r#"{"Yes":0,"Yes_justify":[],"No":2,"No_justify":["Laboris proident"],"no_valid_response":1}"#
        );
    }

    #[test]
    fn test_single_choice_summary_keys_in_label_order() {
        let answers = vec![answer(AnswerBody::SingleChoice {
            selected_choice: Some(EvolutionChoice::Effective),
            justify_answer: "Ea ut ipsum".to_string(),
        })];
        let summary = detailed_summary(&answers, &HashMap::new());
        let keys: Vec<&str> = summary.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "Nascent",
                "Nascent_justify",
                "Engaged",
                "Engaged_justify",
                "Capable",
                "Capable_justify",
                "Effective",
                "Effective_justify",
                "no_valid_response",
            ]
        );
        assert_eq!(summary.count("Effective"), Some(1));
        assert_eq!(
            summary.justifications("Effective"),
            Some(&["Ea ut ipsum".to_string()][..])
        );
    }

    #[test]
    fn test_multiple_choice_counts_flattened_selections() {
        let water = new_entity_id();
        let fisheries = new_entity_id();
        let names = HashMap::from([
            (water, "Water".to_string()),
            (fisheries, "Fisheries".to_string()),
        ]);
        let answers = vec![
            answer(AnswerBody::MultipleChoice {
                selected_programs: BTreeSet::from([water, fisheries]),
            }),
            answer(AnswerBody::MultipleChoice {
                selected_programs: BTreeSet::from([water]),
            }),
            answer(AnswerBody::MultipleChoice {
                selected_programs: BTreeSet::new(),
            }),
        ];
        let summary = detailed_summary(&answers, &names);
        assert_eq!(summary.count("Water"), Some(2));
        assert_eq!(summary.count("Fisheries"), Some(1));
        assert_eq!(summary.count(NO_VALID_RESPONSE), Some(1));
    }

    #[test]
    fn test_answers_of_other_kind_are_left_out() {
        let answers = vec![
            yes_no(Some(YesNoChoice::Yes), ""),
            answer(AnswerBody::SingleChoice {
                selected_choice: Some(EvolutionChoice::Nascent),
                justify_answer: String::new(),
            }),
        ];
        let summary = detailed_summary(&answers, &HashMap::new());
        assert_eq!(summary.count("Yes"), Some(1));
        assert!(summary.get("Nascent").is_none());
    }

    #[test]
    fn test_chart_and_justification_entries() {
        let answers = vec![yes_no(Some(YesNoChoice::Yes), "because")];
        let summary = detailed_summary(&answers, &HashMap::new());
        let chart: Vec<(&str, usize)> = summary.chart_entries().collect();
        assert_eq!(chart, vec![("Yes", 1), ("No", 0)]);
        let blocks: Vec<&str> = summary.justification_entries().map(|(l, _)| l).collect();
        assert_eq!(blocks, vec!["Yes", "No"]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: yes + no + no_valid_response equals the number of answers
        #[test]
        fn prop_yes_no_totals(choices in proptest::collection::vec(
            proptest::option::of(proptest::sample::select(YesNoChoice::ALL.to_vec())),
            1..40,
        )) {
            let answers: Vec<Answer> = choices.iter().map(|c| yes_no(*c, "x")).collect();
            let summary = detailed_summary(&answers, &HashMap::new());
            let total = summary.count("Yes").unwrap_or(0)
                + summary.count("No").unwrap_or(0)
                + summary.count(NO_VALID_RESPONSE).unwrap_or(0);
            prop_assert_eq!(total, answers.len());
        }

        /// Property: single-choice counts also add up to the collection size
        #[test]
        fn prop_single_choice_totals(choices in proptest::collection::vec(
            proptest::option::of(proptest::sample::select(EvolutionChoice::ALL.to_vec())),
            1..40,
        )) {
            let answers: Vec<Answer> = choices
                .iter()
                .map(|c| answer(AnswerBody::SingleChoice {
                    selected_choice: *c,
                    justify_answer: String::new(),
                }))
                .collect();
            let summary = detailed_summary(&answers, &HashMap::new());
            let total: usize = summary.chart_entries().map(|(_, n)| n).sum::<usize>()
                + summary.count(NO_VALID_RESPONSE).unwrap_or(0);
            prop_assert_eq!(total, answers.len());
        }
    }
}
