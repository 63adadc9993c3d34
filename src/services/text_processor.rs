// Text Processing Service
// Normalization, tokenization and n-gram term extraction for the featurizer

use crate::models::FeaturizerOptions;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Separator between the words of a word n-gram term.
pub const NGRAM_JOINER: char = '|';
/// Prefix of word n-gram terms in the vocabulary.
pub const WORD_TERM_PREFIX: &str = "w:";
/// Prefix of character n-gram terms in the vocabulary.
pub const CHAR_TERM_PREFIX: &str = "c:";

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "of", "on", "or", "so", "such", "that", "the", "their", "then", "there", "these", "they",
    "this", "to", "was", "were", "will", "with",
];

fn space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{3000}\u{00A0}\u{2007}\u{202F}]").expect("valid regex"))
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("valid regex"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Normalize punctuation and whitespace, optionally lowercasing.
pub fn normalize_text(text: &str, lowercase: bool) -> String {
    if text.is_empty() {
        return String::new();
    }

    // Smart quotes and dashes
    let s = text
        .replace(&['\u{201c}', '\u{201d}'][..], "\"")
        .replace(&['\u{2018}', '\u{2019}'][..], "'")
        .replace(&['\u{2013}', '\u{2014}'][..], "-");

    let s = space_re().replace_all(&s, " ");
    let s = ws_re().replace_all(&s, " ");
    let s = s.trim();

    if lowercase {
        s.to_lowercase()
    } else {
        s.to_string()
    }
}

/// Split normalized text into word tokens. Inner apostrophes are kept ("didn't").
pub fn tokenize(text: &str) -> Vec<String> {
    token_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    stop_words().contains(token)
}

/// Contiguous word n-grams of exactly `n` tokens, joined with `NGRAM_JOINER`.
pub fn word_ngrams(tokens: &[String], n: usize) -> Vec<String> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    let joiner = NGRAM_JOINER.to_string();
    tokens.windows(n).map(|w| w.join(&joiner)).collect()
}

/// Character n-grams of a single token padded as `<token>`.
/// Tokens shorter than `n` after padding yield the padded token itself.
pub fn char_ngrams(token: &str, n: usize) -> Vec<String> {
    if n == 0 || token.is_empty() {
        return Vec::new();
    }
    let padded: Vec<char> = std::iter::once('<')
        .chain(token.chars())
        .chain(std::iter::once('>'))
        .collect();
    if padded.len() <= n {
        return vec![padded.into_iter().collect()];
    }
    padded.windows(n).map(|w| w.iter().collect()).collect()
}

/// Extract every vocabulary term of a text, with repetitions, in text order.
pub fn extract_terms(text: &str, options: &FeaturizerOptions) -> Vec<String> {
    let normalized = normalize_text(text, options.lowercase);
    let mut tokens = tokenize(&normalized);
    if options.remove_stop_words {
        tokens.retain(|t| !is_stop_word(&t.to_lowercase()));
    }

    let mut terms = Vec::new();
    for n in 1..=options.word_ngram_length {
        for gram in word_ngrams(&tokens, n) {
            terms.push(format!("{WORD_TERM_PREFIX}{gram}"));
        }
    }

    if options.use_char_ngrams {
        for token in &tokens {
            for gram in char_ngrams(token, options.char_ngram_length) {
                terms.push(format!("{CHAR_TERM_PREFIX}{gram}"));
            }
        }
    }

    terms
}
