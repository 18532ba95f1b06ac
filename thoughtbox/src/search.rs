//! Relevance-ranked note search.
//!
//! Pure functions over already decrypted notes, shared by the `/api/notes/search` endpoint and
//! [`crate::client::NotesClient::search`].

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::notes::{Note, NoteType};

const EXACT_TITLE_SCORE: u32 = 100;
const TITLE_SCORE: u32 = 50;
const CONTENT_SCORE: u32 = 10;
const WEEK_BONUS: u32 = 5;
const DAY_BONUS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub score: u32,
    pub title_matches: Vec<String>,
    pub content_matches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub note: Note,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_meta: Option<SearchMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<SearchHit>,
    pub query: String,
    pub total_results: usize,
}

pub fn search_notes(notes: Vec<Note>, query: &str) -> SearchResults {
    search_notes_at(notes, query, Utc::now())
}

/// Ranks `notes` against `query`, measuring recency relative to `now`.
pub fn search_notes_at(notes: Vec<Note>, query: &str, now: DateTime<Utc>) -> SearchResults {
    let query = query.trim();
    if query.is_empty() {
        let results: Vec<_> = notes
            .into_iter()
            .map(|note| SearchHit { note, search_meta: None })
            .collect();
        return SearchResults {
            total_results: results.len(),
            results,
            query: String::new(),
        };
    }

    let lowered = query.to_lowercase();
    let terms: Vec<&str> = lowered.split_whitespace().collect();

    let mut results: Vec<SearchHit> = notes
        .into_iter()
        .filter_map(|note| {
            let meta = score_note(&note, &terms, now)?;
            Some(SearchHit {
                note,
                search_meta: Some(meta),
            })
        })
        .collect();

    // stable: equal scores keep input order
    results.sort_by(|a, b| score_of(b).cmp(&score_of(a)));

    SearchResults {
        total_results: results.len(),
        results,
        query: query.to_owned(),
    }
}

fn score_of(hit: &SearchHit) -> u32 {
    hit.search_meta.as_ref().map_or(0, |meta| meta.score)
}

fn score_note(note: &Note, terms: &[&str], now: DateTime<Utc>) -> Option<SearchMeta> {
    let title = note.title.to_lowercase();
    let content = content_text(&note.kind, &note.content).to_lowercase();

    let mut score = 0;
    let mut title_matches = Vec::new();
    let mut content_matches = Vec::new();

    for term in terms {
        if title.contains(term) {
            score += if title == *term { EXACT_TITLE_SCORE } else { TITLE_SCORE };
            title_matches.push(term.to_string());
        }
        if content.contains(term) {
            score += CONTENT_SCORE;
            content_matches.push(term.to_string());
        }
    }

    if score == 0 {
        return None;
    }

    let age = now - note.updated_at;
    if age < Duration::days(7) {
        score += WEEK_BONUS;
    }
    if age < Duration::days(1) {
        score += DAY_BONUS;
    }

    Some(SearchMeta {
        score,
        title_matches,
        content_matches,
    })
}

/// Flattens a note's content into the text that search matches against.
pub fn content_text(kind: &NoteType, content: &Value) -> String {
    if let Value::String(text) = content {
        return text.clone();
    }

    let flattened = match kind {
        NoteType::Text => content.get("text").and_then(Value::as_str).map(str::to_owned),
        NoteType::Todo => content.get("items").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        }),
        NoteType::Timetable => content.get("entries").and_then(Value::as_array).map(|entries| {
            entries
                .iter()
                .map(|entry| {
                    let field = |name: &str| entry.get(name).and_then(Value::as_str).unwrap_or_default();
                    format!("{} {}", field("time"), field("description"))
                })
                .collect::<Vec<_>>()
                .join(" ")
        }),
        NoteType::Other(_) => None,
    };

    flattened.unwrap_or_else(|| content.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn note(id: &str, kind: NoteType, title: &str, content: Value) -> Note {
        Note {
            id: id.into(),
            user_id: "u1".into(),
            kind,
            title: title.into(),
            content,
            color: None,
            created_at: now(),
            updated_at: now(),
            sync_status: None,
        }
    }

    fn text_note(id: &str, title: &str, text: &str) -> Note {
        note(id, NoteType::Text, title, json!({ "text": text }))
    }

    fn ids(results: &SearchResults) -> Vec<&str> {
        results.results.iter().map(|hit| hit.note.id.as_str()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let notes = vec![text_note("a", "One", ""), text_note("b", "Two", "")];

        for query in ["", "   \t"] {
            let results = search_notes_at(notes.clone(), query, now());
            assert_eq!(ids(&results), ["a", "b"]);
            assert_eq!(results.query, "");
            assert_eq!(results.total_results, 2);
            assert!(results.results.iter().all(|hit| hit.search_meta.is_none()));
        }
    }

    #[test]
    fn title_substring_matches_single_note() {
        let notes = vec![
            text_note("a", "Shopping list", "eggs"),
            text_note("b", "Meeting notes", "agenda"),
        ];

        let results = search_notes_at(notes, "shop", now());
        assert_eq!(ids(&results), ["a"]);
        assert_eq!(results.total_results, 1);

        let meta = results.results[0].search_meta.as_ref().unwrap();
        assert_eq!(meta.title_matches, ["shop"]);
        assert!(meta.content_matches.is_empty());
    }

    #[test]
    fn exact_title_outranks_partial_title_outranks_content() {
        let notes = vec![
            text_note("content", "Some Note", "learning JavaScript today"),
            text_note("partial", "JavaScript Tutorial", ""),
            text_note("exact", "JavaScript", ""),
        ];

        let results = search_notes_at(notes, "JavaScript", now());
        assert_eq!(ids(&results), ["exact", "partial", "content"]);

        let scores: Vec<u32> = results.results.iter().map(score_of).collect();
        assert_eq!(scores, [115, 65, 25]);
    }

    #[test]
    fn case_insensitive_and_trimmed() {
        let notes = vec![text_note("a", "Rust Book", "")];

        let results = search_notes_at(notes, "  rUsT  ", now());
        assert_eq!(ids(&results), ["a"]);
        assert_eq!(results.query, "rUsT");
    }

    #[test]
    fn every_term_scores() {
        let notes = vec![
            text_note("one", "rust", ""),
            text_note("both", "rust async", "async runtime"),
        ];

        let results = search_notes_at(notes, "rust async", now());
        assert_eq!(ids(&results), ["both", "one"]);

        let meta = results.results[0].search_meta.as_ref().unwrap();
        assert_eq!(meta.title_matches, ["rust", "async"]);
        assert_eq!(meta.content_matches, ["async"]);
        assert_eq!(meta.score, 50 + 50 + 10 + 15);
    }

    #[test]
    fn recency_breaks_ties() {
        let mut old = text_note("old", "Plans", "");
        old.updated_at = now() - Duration::days(6);
        let mut stale = text_note("stale", "Plans", "");
        stale.updated_at = now() - Duration::days(30);
        let fresh = text_note("fresh", "Plans", "");

        let results = search_notes_at(vec![stale, old, fresh], "plans", now());
        assert_eq!(ids(&results), ["fresh", "old", "stale"]);

        let scores: Vec<u32> = results.results.iter().map(score_of).collect();
        assert_eq!(scores, [115, 105, 100]);
    }

    #[test]
    fn recency_windows_are_exclusive() {
        let aged = |age: Duration| {
            let mut note = text_note("n", "Plans", "");
            note.updated_at = now() - age;
            let results = search_notes_at(vec![note], "plans", now());
            score_of(&results.results[0])
        };

        assert_eq!(aged(Duration::days(1) - Duration::seconds(1)), 115);
        assert_eq!(aged(Duration::days(1)), 105);
        assert_eq!(aged(Duration::days(7) - Duration::seconds(1)), 105);
        assert_eq!(aged(Duration::days(7)), 100);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let notes = vec![
            text_note("first", "", "tea"),
            text_note("second", "", "tea"),
            text_note("third", "", "tea"),
        ];

        let results = search_notes_at(notes, "tea", now());
        assert_eq!(ids(&results), ["first", "second", "third"]);
    }

    #[test]
    fn no_match_returns_nothing() {
        let results = search_notes_at(vec![text_note("a", "Alpha", "beta")], "gamma", now());
        assert!(results.results.is_empty());
        assert_eq!(results.total_results, 0);
        assert_eq!(results.query, "gamma");
    }

    #[test]
    fn content_text_by_kind() {
        assert_eq!(content_text(&NoteType::Text, &json!({ "text": "Hello" })), "Hello");
        assert_eq!(content_text(&NoteType::Text, &json!("bare string")), "bare string");
        assert_eq!(
            content_text(
                &NoteType::Todo,
                &json!({ "items": [{ "text": "milk", "completed": true }, { "text": "bread" }] })
            ),
            "milk bread"
        );
        assert_eq!(
            content_text(
                &NoteType::Timetable,
                &json!({ "entries": [{ "time": "09:00", "description": "standup" }, { "time": "12:00", "description": "lunch" }] })
            ),
            "09:00 standup 12:00 lunch"
        );
        assert_eq!(
            content_text(&NoteType::Other("sketch".into()), &json!({ "strokes": 3 })),
            r#"{"strokes":3}"#
        );
        assert_eq!(content_text(&NoteType::Todo, &json!({ "unexpected": true })), r#"{"unexpected":true}"#);
    }

    #[test]
    fn todo_and_timetable_contents_are_searchable() {
        let notes = vec![
            note("todo", NoteType::Todo, "Errands", json!({ "items": [{ "text": "Buy milk" }] })),
            note(
                "timetable",
                NoteType::Timetable,
                "Monday",
                json!({ "entries": [{ "time": "10:00", "description": "Dentist" }] }),
            ),
        ];

        assert_eq!(ids(&search_notes_at(notes.clone(), "milk", now())), ["todo"]);
        assert_eq!(ids(&search_notes_at(notes, "10:00 dentist", now())), ["timetable"]);
    }
}
