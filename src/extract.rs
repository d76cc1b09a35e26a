//! Account ID extraction heuristic.
//!
//! OCR output is noisy: a bare unlabeled 10-digit run is usually the account
//! number, but bills also carry dates and meter numbers. The primary rule
//! takes the first standalone 10-digit run; only when none exists does the
//! labeled fallback fire.

use once_cell::sync::Lazy;
use regex::Regex;

/// Standalone run of exactly 10 digits, bounded by word boundaries.
static ACCOUNT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{10})\b").unwrap());

/// Label token followed by optional colons/hyphens/whitespace, then 10 digits.
static LABELED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Account|RR|Customer|ID)\s*[:\-\s]*(\d{10})").unwrap());

static VALID_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").unwrap());

/// Scrape a candidate account ID out of raw recognized text.
///
/// Returns the first standalone 10-digit run; falls back to the first
/// label-prefixed run; returns the empty string when neither rule matches.
pub fn find_account_id(text: &str) -> String {
    if let Some(c) = ACCOUNT_ID.captures(text) {
        return c[1].to_string();
    }
    if let Some(c) = LABELED_ID.captures(text) {
        return c[1].to_string();
    }
    String::new()
}

/// True iff the trimmed input is exactly 10 ASCII digits.
pub fn is_valid_account_id(id: &str) -> bool {
    VALID_ID.is_match(id.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_standalone_run_is_extracted() {
        assert_eq!(find_account_id("Account total 9876543210 Rs."), "9876543210");
    }

    #[test]
    fn first_of_two_standalone_runs_wins() {
        assert_eq!(find_account_id("9876543210 5551234567"), "9876543210");
    }

    #[test]
    fn standalone_run_beats_labeled_run() {
        let text = "1112223334 somewhere, Account: 9998887776 elsewhere";
        assert_eq!(find_account_id(text), "1112223334");
    }

    #[test]
    fn labeled_fallback_fires_without_standalone_run() {
        // Digits glued to letters never count as standalone.
        assert_eq!(find_account_id("Customer-1234567890abc"), "1234567890");
        assert_eq!(find_account_id("id: 0001112223x"), "0001112223");
    }

    #[test]
    fn label_match_is_case_insensitive() {
        assert_eq!(find_account_id("account   5556667778q"), "5556667778");
    }

    #[test]
    fn bescom_sample_line_extracts_account() {
        let text = "BESCOM RR NO: 1234567890 Due Date 09/08/2024";
        assert_eq!(find_account_id(text), "1234567890");
    }

    #[test]
    fn no_run_yields_empty_and_invalid() {
        let got = find_account_id("Total due Rs. 1,234 by 09/08/2024");
        assert_eq!(got, "");
        assert!(!is_valid_account_id(&got));
    }

    #[test]
    fn longer_digit_runs_are_not_standalone_matches() {
        // 12 contiguous digits contain no word-boundary-delimited 10-digit run.
        assert_eq!(find_account_id("meter 123456789012 end"), "");
    }

    #[test]
    fn validity_is_exactly_ten_ascii_digits() {
        assert!(is_valid_account_id("1234567890"));
        assert!(!is_valid_account_id("123456789"));
        assert!(!is_valid_account_id("12345678901"));
        assert!(!is_valid_account_id("12345abcde"));
        assert!(!is_valid_account_id(""));
    }

    #[test]
    fn validity_trims_surrounding_whitespace() {
        assert!(is_valid_account_id("  1234567890 "));
        assert!(!is_valid_account_id("12345 67890"));
    }
}
