use crate::error::{AppError, Result};
use log;
use std::str::FromStr;

pub const TRUNCATED_FROM_END: &str = "\n\n[...Content truncated from end...]";
pub const TRUNCATED_FROM_START: &str = "[...Content truncated from beginning...]\n\n";
pub const TRUNCATED_FROM_MIDDLE: &str = "\n\n[...Content truncated from middle...]\n\n";

/// Model-agnostic token estimate: `ceil(words × 1.3)` plus half a token for
/// each standalone punctuation token and each numeric token. Never exact, and
/// never less than 1 for non-empty input.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let mut words = 0usize;
    let mut punct_tokens = 0usize;
    let mut numeric_tokens = 0usize;
    for token in text.split_whitespace() {
        words += 1;
        if token.chars().all(|c| c.is_ascii_punctuation()) {
            punct_tokens += 1;
        } else if token
            .trim_matches(|c: char| c.is_ascii_punctuation() && c != '.')
            .parse::<f64>()
            .is_ok()
        {
            numeric_tokens += 1;
        }
    }
    let estimate = (words as f64 * 1.3).ceil() + 0.5 * (punct_tokens + numeric_tokens) as f64;
    (estimate.ceil() as usize).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateStrategy {
    Start,
    End,
    Middle,
}

impl FromStr for TruncateStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(TruncateStrategy::Start),
            "end" => Ok(TruncateStrategy::End),
            "middle" => Ok(TruncateStrategy::Middle),
            other => Err(AppError::InvalidArgument(format!(
                "Invalid truncation strategy '{}'. Use 'start', 'end' or 'middle'.",
                other
            ))),
        }
    }
}

/// Trims `text` to roughly `max_tokens`, whole lines at a time, inserting a
/// visible marker where content was dropped. A no-op whenever the estimate
/// already fits the budget.
pub fn truncate_to_budget(
    text: &str,
    max_tokens: usize,
    strategy: TruncateStrategy,
) -> Result<String> {
    if max_tokens == 0 {
        return Err(AppError::Truncation(
            "Token budget must be greater than 0".to_string(),
        ));
    }
    if estimate_tokens(text) <= max_tokens {
        return Ok(text.to_string());
    }
    log::debug!(
        "Truncating {} estimated tokens to {} ({:?})",
        estimate_tokens(text),
        max_tokens,
        strategy
    );

    let lines: Vec<&str> = text.lines().collect();
    match strategy {
        TruncateStrategy::End => {
            let budget = max_tokens.saturating_sub(estimate_tokens(TRUNCATED_FROM_END));
            let kept = keep_lines_forward(&lines, budget);
            Ok(format!("{}{}", kept, TRUNCATED_FROM_END))
        }
        TruncateStrategy::Start => {
            let budget = max_tokens.saturating_sub(estimate_tokens(TRUNCATED_FROM_START));
            let kept = keep_lines_backward(&lines, budget);
            Ok(format!("{}{}", TRUNCATED_FROM_START, kept))
        }
        TruncateStrategy::Middle => {
            let indicator_cost = estimate_tokens(TRUNCATED_FROM_MIDDLE);
            if max_tokens <= indicator_cost {
                // Not even room for the middle marker.
                return truncate_to_budget(text, max_tokens, TruncateStrategy::End);
            }
            let remaining = max_tokens - indicator_cost;
            let front_budget = remaining / 2;
            let back_budget = remaining - front_budget;
            let prefix = keep_lines_forward(&lines, front_budget);
            let suffix = keep_lines_backward(&lines, back_budget);
            Ok(format!("{}{}{}", prefix, TRUNCATED_FROM_MIDDLE, suffix))
        }
    }
}

/// Accumulates whole lines from the start while they fit. When not even the
/// first line fits and budget remains, falls back to whole words from that
/// line so some content always survives.
fn keep_lines_forward(lines: &[&str], budget: usize) -> String {
    let mut kept = Vec::<&str>::new();
    let mut used = 0usize;
    for line in lines {
        let cost = estimate_tokens(line);
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line);
    }
    if kept.is_empty() && budget > 0 {
        if let Some(first) = lines.first() {
            return keep_words(first.split_whitespace(), budget);
        }
    }
    kept.join("\n")
}

fn keep_lines_backward(lines: &[&str], budget: usize) -> String {
    let mut kept = Vec::<&str>::new();
    let mut used = 0usize;
    for line in lines.iter().rev() {
        let cost = estimate_tokens(line);
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line);
    }
    if kept.is_empty() && budget > 0 {
        if let Some(last) = lines.last() {
            let words: Vec<&str> = last.split_whitespace().rev().collect();
            let reversed = keep_words(words.into_iter(), budget);
            let mut restored: Vec<&str> = reversed.split_whitespace().collect();
            restored.reverse();
            return restored.join(" ");
        }
    }
    kept.reverse();
    kept.join("\n")
}

fn keep_words<'a>(words: impl Iterator<Item = &'a str>, budget: usize) -> String {
    let mut kept = Vec::<&str>::new();
    for word in words {
        kept.push(word);
        if estimate_tokens(&kept.join(" ")) > budget && kept.len() > 1 {
            kept.pop();
            break;
        }
    }
    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_is_zero_only_for_empty_input() {
        assert_eq!(estimate_tokens(""), 0);
        assert!(estimate_tokens("a") >= 1);
        assert!(estimate_tokens("...") >= 1);
    }

    #[test]
    fn estimate_charges_punctuation_and_numbers() {
        let plain = estimate_tokens("alpha beta gamma delta");
        let punctuated = estimate_tokens("alpha beta ; ; 42 7");
        assert!(punctuated > plain - 2);
        assert_eq!(estimate_tokens("one two"), 3); // ceil(2 * 1.3)
    }

    #[test]
    fn under_budget_is_identity_for_every_strategy() {
        let text = "short line one\nshort line two";
        let budget = estimate_tokens(text) + 5;
        for strategy in [
            TruncateStrategy::Start,
            TruncateStrategy::End,
            TruncateStrategy::Middle,
        ] {
            assert_eq!(truncate_to_budget(text, budget, strategy).unwrap(), text);
        }
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = truncate_to_budget("text", 0, TruncateStrategy::End).unwrap_err();
        assert!(matches!(err, AppError::Truncation(_)));
    }

    #[test]
    fn invalid_strategy_is_rejected() {
        assert!(TruncateStrategy::from_str("sideways").is_err());
        assert_eq!(
            TruncateStrategy::from_str("MIDDLE").unwrap(),
            TruncateStrategy::Middle
        );
    }

    fn many_lines(n: usize) -> String {
        (0..n)
            .map(|i| format!("line number {} with a few words", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn end_strategy_keeps_prefix_and_appends_marker() {
        let text = many_lines(40);
        let out = truncate_to_budget(&text, 30, TruncateStrategy::End).unwrap();
        assert!(out.starts_with("line number 0"));
        assert!(out.ends_with(TRUNCATED_FROM_END));
        assert!(estimate_tokens(&out) <= 30 + estimate_tokens(TRUNCATED_FROM_END));
    }

    #[test]
    fn start_strategy_keeps_suffix_and_prepends_marker() {
        let text = many_lines(40);
        let out = truncate_to_budget(&text, 30, TruncateStrategy::Start).unwrap();
        assert!(out.starts_with(TRUNCATED_FROM_START));
        assert!(out.ends_with("line number 39 with a few words"));
    }

    #[test]
    fn middle_strategy_keeps_both_ends() {
        let text = many_lines(40);
        let out = truncate_to_budget(&text, 40, TruncateStrategy::Middle).unwrap();
        assert!(out.starts_with("line number 0"));
        assert!(out.contains(TRUNCATED_FROM_MIDDLE));
        assert!(out.ends_with("line number 39 with a few words"));
    }

    #[test]
    fn tiny_middle_budget_falls_back_to_end() {
        let text = many_lines(40);
        let out = truncate_to_budget(&text, 3, TruncateStrategy::Middle).unwrap();
        assert!(out.ends_with(TRUNCATED_FROM_END));
    }

    #[test]
    fn single_long_line_degrades_to_word_boundaries() {
        let text = "word ".repeat(50);
        let out = truncate_to_budget(text.trim_end(), 10, TruncateStrategy::End).unwrap();
        assert!(out.starts_with("word word"));
        assert!(out.ends_with(TRUNCATED_FROM_END));
        assert!(estimate_tokens(&out) <= 10 + estimate_tokens(TRUNCATED_FROM_END));
    }

    #[test]
    fn truncation_is_whole_line_when_lines_fit() {
        let text = many_lines(10);
        let out = truncate_to_budget(&text, 20, TruncateStrategy::End).unwrap();
        let kept = out.strip_suffix(TRUNCATED_FROM_END).unwrap();
        for line in kept.lines() {
            assert!(text.contains(line));
        }
    }
}
