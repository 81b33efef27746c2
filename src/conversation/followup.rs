//! Follow-up detection.
//!
//! A query is a follow-up when it leans on deictic words or continuation
//! phrases, or when it is short enough that it only makes sense against a
//! non-empty window. Adding exchanges can only turn detection on, never off.

const DEICTIC_WORDS: [&str; 4] = ["that", "those", "this", "it"];
const CONTINUATION_PHRASES: [&str; 3] = ["what about", "tell me more", "how about"];
const SHORT_QUERY_WORDS: usize = 10;

/// Returns `true` when `query` depends on prior conversation state.
pub fn detect_followup(query: &str, window_nonempty: bool) -> bool {
    if !window_nonempty {
        return false;
    }

    let lowered = query.to_lowercase();

    if CONTINUATION_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return true;
    }

    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| DEICTIC_WORDS.contains(w)) {
        return true;
    }

    if words.first() == Some(&"and") {
        return true;
    }

    words.len() < SHORT_QUERY_WORDS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_never_followup() {
        assert!(!detect_followup("What about tattoos?", false));
        assert!(!detect_followup("it", false));
    }

    #[test]
    fn test_continuation_phrase() {
        assert!(detect_followup("What about tattoos?", true));
        assert!(detect_followup("tell me more", true));
    }

    #[test]
    fn test_deictic_words() {
        assert!(detect_followup("Does that apply to officers as well though?", true));
        assert!(detect_followup("When does it take effect for reserve components?", true));
    }

    #[test]
    fn test_leading_and() {
        assert!(detect_followup("And for the reserve component?", true));
    }

    #[test]
    fn test_short_query_with_window() {
        assert!(detect_followup("Tattoo rules?", true));
    }

    #[test]
    fn test_long_standalone_query_not_followup() {
        let query = "What are the complete grooming and appearance regulations \
                     applicable to uniformed personnel across installations?";
        assert!(!detect_followup(query, true));
    }

    #[test]
    fn test_monotonic_in_window_state() {
        // Any query detected with an empty window stays detected with a
        // non-empty one (vacuously: empty window never detects).
        for query in ["that one?", "What about beards?", "and the rest?"] {
            if detect_followup(query, false) {
                assert!(detect_followup(query, true));
            }
        }
    }
}
