//! Free-text relevance queries over job postings.
//!
//! The grammar mirrors web-search syntax (and Postgres' `websearch_to_tsquery`):
//!
//! - whitespace-separated terms must all match;
//! - the keyword `OR` separates alternatives;
//! - `-term` excludes postings containing the term;
//! - `"quoted words"` must appear consecutively.
//!
//! Matching is on lowercase word tokens with plural folding and a small
//! stop-word list. It is intentionally lighter than a full English stemmer.

use serde::Serialize;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "in", "of", "on", "or", "the", "to", "with",
];

/// A parsed free-text query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextQuery {
    raw: String,
    alternatives: Vec<Conjunction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Conjunction {
    terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Term {
    words: Vec<String>,
    negated: bool,
}

impl TextQuery {
    /// Parse a query. Returns `None` when it contains no searchable words,
    /// in which case no text filter applies.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut alternatives = Vec::new();
        let mut current = Conjunction { terms: Vec::new() };

        for token in split_tokens(raw) {
            match token {
                Token::Or => {
                    if !current.terms.is_empty() {
                        alternatives.push(std::mem::replace(
                            &mut current,
                            Conjunction { terms: Vec::new() },
                        ));
                    }
                }
                Token::Word { text, negated, quoted } => {
                    let words = if quoted {
                        tokenize(&text).collect::<Vec<_>>()
                    } else {
                        tokenize(&text)
                            .filter(|w| !STOP_WORDS.contains(&w.as_str()))
                            .collect()
                    };
                    if !words.is_empty() {
                        current.terms.push(Term { words, negated });
                    }
                }
            }
        }
        if !current.terms.is_empty() {
            alternatives.push(current);
        }

        if alternatives.is_empty() {
            None
        } else {
            Some(Self {
                raw: raw.trim().to_string(),
                alternatives,
            })
        }
    }

    /// The query as the caller wrote it (handed to store-native full-text search).
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `text` satisfies the query. Absent text never matches.
    pub fn matches(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };
        let words: Vec<String> = tokenize(text).collect();

        self.alternatives.iter().any(|alt| {
            alt.terms
                .iter()
                .all(|term| contains_sequence(&words, &term.words) != term.negated)
        })
    }

    /// Whether any of the given fields satisfies the query on its own.
    pub fn matches_any<'a>(&self, fields: impl IntoIterator<Item = Option<&'a str>>) -> bool {
        fields.into_iter().any(|f| self.matches(f))
    }
}

enum Token {
    Or,
    Word {
        text: String,
        negated: bool,
        quoted: bool,
    },
}

fn split_tokens(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let negated = c == '-';
        if negated {
            chars.next();
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            let text: String = chars.by_ref().take_while(|&c| c != '"').collect();
            tokens.push(Token::Word {
                text,
                negated,
                quoted: true,
            });
            continue;
        }

        let mut text = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            text.push(c);
            chars.next();
        }

        if !negated && text.eq_ignore_ascii_case("or") {
            tokens.push(Token::Or);
        } else if !text.is_empty() {
            tokens.push(Token::Word {
                text,
                negated,
                quoted: false,
            });
        }
    }

    tokens
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| fold(&w.to_lowercase()))
}

/// Fold simple English plurals ("engineers" -> "engineer").
fn fold(word: &str) -> String {
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn contains_sequence(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
