//! Deterministic local compression used when inference is unavailable
//!
//! Extractive: keeps the highest-scoring sentences that fit the token budget,
//! in source order.

use crate::index::count_tokens;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref SENTENCE_END: Regex = Regex::new(r"[.!?]+\s+").unwrap();
}

/// Split text into sentences, keeping terminal punctuation
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut last = 0;

    for m in SENTENCE_END.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        let sentence = text[last..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        last = m.end();
    }

    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn task_terms(task_description: &str) -> HashSet<String> {
    task_description
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| w.len() >= 4)
        .collect()
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn score_sentence(sentence: &str, index: usize, total: usize, terms: &HashSet<String>) -> f64 {
    let position = index as f64;
    let total = total as f64;
    let position_score = if position < total * 0.3 {
        1.5
    } else if position > total * 0.7 {
        1.2
    } else {
        1.0
    };

    let words = count_tokens(sentence);
    let length_score = (words as f64 / 10.0).min(2.0);

    let shared: HashSet<String> = sentence
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| terms.contains(w))
        .collect();

    position_score * length_score + 0.5 * shared.len() as f64
}

/// Compress `context` to at most `target_tokens` tokens without a model
pub fn fallback_compress(context: &str, task_description: &str, target_tokens: usize) -> String {
    let sentences = split_sentences(context);
    if sentences.is_empty() {
        return String::new();
    }

    let terms = task_terms(task_description);
    let mut ranked: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| (i, score_sentence(s, i, sentences.len(), &terms)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut kept = Vec::new();
    let mut used = 0;
    for (idx, _) in ranked {
        let tokens = count_tokens(sentences[idx]);
        if kept.is_empty() {
            kept.push(idx);
            used = tokens;
            if used >= target_tokens {
                break;
            }
        } else if used + tokens <= target_tokens {
            kept.push(idx);
            used += tokens;
        }
    }
    kept.sort_unstable();

    let joined = kept
        .iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ");

    if count_tokens(&joined) > target_tokens {
        joined
            .split_whitespace()
            .take(target_tokens)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        joined
    }
}
