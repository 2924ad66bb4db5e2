//! The `events()` query mini-language.
//!
//! A query is whitespace-separated tokens, each resolved independently:
//!
//! - `<gps1>..<gps2>` — an inclusive GPS-time window on the record's
//!   extracted gpstime;
//! - a known label name — the event must currently carry that label;
//! - a syntactically valid identifier — restricts to that one event
//!   (two or more identifier tokens can never both match, so the
//!   result set is empty);
//! - anything else fails with `InvalidQuery`.
//!
//! All filters intersect (AND semantics).

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::id::GraceId;
use crate::label::Label;
use crate::store::EventView;

/// One parsed query token.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Inclusive GPS-time window.
    GpsWindow(f64, f64),
    /// The event must carry this label.
    HasLabel(Label),
    /// The event must be this one.
    Id(GraceId),
}

/// A parsed query; the empty query matches everything.
#[derive(Debug, Clone, Default)]
pub struct Query {
    tokens: Vec<Token>,
    /// More than one distinct identifier token was given; nothing can
    /// match.
    contradictory: bool,
}

impl Query {
    /// Returns true if `view` satisfies every token.
    #[must_use]
    pub fn matches(&self, view: &EventView) -> bool {
        if self.contradictory {
            return false;
        }
        self.tokens.iter().all(|token| match token {
            Token::GpsWindow(lo, hi) => view
                .record
                .gpstime
                .is_some_and(|gps| *lo <= gps && gps <= *hi),
            Token::HasLabel(label) => view.labels.contains_key(label.as_str()),
            Token::Id(id) => view.record.graceid == *id,
        })
    }
}

impl FromStr for Query {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut query = Self::default();
        let mut seen_id: Option<GraceId> = None;
        for token in text.split_whitespace() {
            if let Some(window) = parse_gps_window(token)? {
                query.tokens.push(window);
            } else if Label::is_known(token) {
                query.tokens.push(Token::HasLabel(Label::parse(token)?));
            } else if let Ok(id) = token.parse::<GraceId>() {
                if seen_id.is_some_and(|prior| prior != id) {
                    query.contradictory = true;
                }
                seen_id = Some(id);
                query.tokens.push(Token::Id(id));
            } else {
                return Err(Error::InvalidQuery(token.to_string()));
            }
        }
        Ok(query)
    }
}

/// Recognizes `<num>..<num>` tokens; returns `Ok(None)` for tokens that
/// are not ranges at all, and an error for ranges with malformed bounds.
fn parse_gps_window(token: &str) -> Result<Option<Token>> {
    let Some((lo, hi)) = token.split_once("..") else {
        return Ok(None);
    };
    let parse = |s: &str| -> Result<f64> {
        s.parse()
            .map_err(|_| Error::InvalidQuery(token.to_string()))
    };
    Ok(Some(Token::GpsWindow(parse(lo)?, parse(hi)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_label_and_id() {
        let q: Query = "1137313500..1137313600 EM_READY T000014".parse().unwrap();
        assert_eq!(q.tokens.len(), 3);
        assert!(!q.contradictory);
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(matches!(
            "bogus_token".parse::<Query>(),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            "123..xyz".parse::<Query>(),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn two_distinct_ids_is_contradictory() {
        let q: Query = "T000001 T000002".parse().unwrap();
        assert!(q.contradictory);
        // The same id twice is fine.
        let q: Query = "T000001 T000001".parse().unwrap();
        assert!(!q.contradictory);
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = Query::default();
        assert!(q.tokens.is_empty());
    }
}
