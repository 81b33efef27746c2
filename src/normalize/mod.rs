//! Deterministic query normalization.
//!
//! Two queries that normalize identically are treated as identical intent by
//! the cache, so this function must stay pure: lowercase, strip punctuation
//! except `?`, collapse whitespace, drop leading articles.

const LEADING_ARTICLES: [&str; 3] = ["the", "a", "an"];

/// Normalizes a query into its canonical cache-key form.
///
/// Idempotent: `normalize(normalize(q)) == normalize(q)`. Leading articles
/// are stripped repeatedly so "the a priori rule" and "a priori rule" land
/// on the same key as "priori rule".
pub fn normalize(query: &str) -> String {
    let lowered = query.to_lowercase();

    let depunctuated: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '?' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut words: Vec<&str> = depunctuated.split_whitespace().collect();

    while let Some(first) = words.first() {
        if LEADING_ARTICLES.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases() {
        assert_eq!(
            normalize("What Are The RULES?"),
            normalize("what are the rules?")
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(
            normalize("  what   are\tthe rules?  "),
            "what are the rules?"
        );
    }

    #[test]
    fn test_strips_punctuation_except_question_mark() {
        assert_eq!(normalize("rules, for (beards)!?"), "rules for beards ?");
        assert!(normalize("what are the rules?").ends_with('?'));
    }

    #[test]
    fn test_strips_leading_articles() {
        assert_eq!(normalize("The grooming standards"), "grooming standards");
        assert_eq!(normalize("A grooming standard"), "grooming standard");
        assert_eq!(normalize("An airman's duty"), "airman s duty");
    }

    #[test]
    fn test_strips_stacked_leading_articles() {
        assert_eq!(normalize("the a priori rule"), "priori rule");
    }

    #[test]
    fn test_interior_articles_preserved() {
        assert_eq!(
            normalize("rules for the uniform"),
            "rules for the uniform"
        );
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "What are the beard grooming standards?",
            "  the   The THE rules  ",
            "a an the question?",
            "",
            "???",
            "UPPER lower MiXeD",
        ];

        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "normalize not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_empty_and_degenerate() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("the"), "");
        assert_eq!(normalize("the a an"), "");
    }

    #[test]
    fn test_equivalent_phrasings_collide() {
        assert_eq!(
            normalize("What are the beard grooming standards?"),
            normalize("  what are the beard grooming standards?  ")
        );
    }
}
