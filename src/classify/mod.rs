//! Query complexity classification.
//!
//! Pure, additive feature scoring over the *original* query text. The
//! classifier never sees conversation context: context-enhanced queries
//! inflate word counts and would misroute short follow-ups onto the
//! expensive path.

use serde::Serialize;

/// Complexity bucket for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Simple,
    Moderate,
    Complex,
}

impl QueryType {
    /// Wire name, matching the response schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Simple => "simple",
            QueryType::Moderate => "moderate",
            QueryType::Complex => "complex",
        }
    }
}

/// One scored feature inside a [`QueryExplanation`].
#[derive(Debug, Clone, Serialize)]
pub struct FeatureContribution {
    pub feature: &'static str,
    pub points: u32,
    pub detail: String,
}

/// Audit record of a classification decision.
///
/// Attached to retrieval results for debugging; never branches control flow.
#[derive(Debug, Clone, Serialize)]
pub struct QueryExplanation {
    pub total_score: u32,
    pub contributions: Vec<FeatureContribution>,
    pub query_type: QueryType,
    pub simple_threshold: u32,
    pub moderate_threshold: u32,
    pub prose: String,
}

const SIMPLE_THRESHOLD: u32 = 1;
const MODERATE_THRESHOLD: u32 = 3;

const PLAIN_INTERROGATIVES: [&str; 4] = ["what", "who", "when", "where"];
const REASONING_INTERROGATIVES: [&str; 2] = ["how", "why"];
const COMPARISON_MARKERS: [&str; 3] = ["compare", "difference", "versus"];

/// Classifies a query and returns the bucket with its audit trail.
pub fn classify(query: &str) -> (QueryType, QueryExplanation) {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let mut contributions = Vec::new();
    let mut score = 0u32;

    let word_count = words.len();
    let word_points = match word_count {
        0..=5 => 0,
        6..=12 => 1,
        13..=25 => 2,
        _ => 3,
    };
    score += word_points;
    contributions.push(FeatureContribution {
        feature: "word_count",
        points: word_points,
        detail: format!("{word_count} words"),
    });

    if let Some(first) = words.first() {
        let first = first.trim_end_matches(|c: char| !c.is_alphanumeric());
        if PLAIN_INTERROGATIVES.contains(&first) {
            contributions.push(FeatureContribution {
                feature: "plain_interrogative",
                points: 0,
                detail: format!("starts with '{first}'"),
            });
        } else if REASONING_INTERROGATIVES.contains(&first) {
            score += 2;
            contributions.push(FeatureContribution {
                feature: "reasoning_interrogative",
                points: 2,
                detail: format!("starts with '{first}'"),
            });
        }
    }

    if let Some(marker) = COMPARISON_MARKERS.iter().find(|m| lowered.contains(*m)) {
        score += 3;
        contributions.push(FeatureContribution {
            feature: "comparison",
            points: 3,
            detail: format!("contains '{marker}'"),
        });
    }

    if words.iter().any(|w| *w == "and") {
        score += 1;
        contributions.push(FeatureContribution {
            feature: "conjunction",
            points: 1,
            detail: "clauses joined with 'and'".to_string(),
        });
    }

    let question_marks = lowered.matches('?').count();
    if question_marks > 1 {
        score += 2;
        contributions.push(FeatureContribution {
            feature: "multiple_questions",
            points: 2,
            detail: format!("{question_marks} question marks"),
        });
    }

    let query_type = if score <= SIMPLE_THRESHOLD {
        QueryType::Simple
    } else if score <= MODERATE_THRESHOLD {
        QueryType::Moderate
    } else {
        QueryType::Complex
    };

    let prose = format!(
        "Scored {score} across {} features; {} <= {SIMPLE_THRESHOLD} is simple, <= {MODERATE_THRESHOLD} is moderate, above is complex.",
        contributions.len(),
        score,
    );

    let explanation = QueryExplanation {
        total_score: score,
        contributions,
        query_type,
        simple_threshold: SIMPLE_THRESHOLD,
        moderate_threshold: MODERATE_THRESHOLD,
        prose,
    };

    (query_type, explanation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_what_question_is_simple() {
        let (query_type, explanation) = classify("What are beard standards?");

        assert_eq!(query_type, QueryType::Simple);
        assert!(explanation.total_score <= 1);
    }

    #[test]
    fn test_how_question_is_moderate() {
        // "how" adds 2, six words add 1 -> moderate.
        let (query_type, explanation) = classify("How do I request leave approval?");

        assert_eq!(query_type, QueryType::Moderate);
        assert_eq!(explanation.total_score, 3);
    }

    #[test]
    fn test_comparison_is_complex() {
        let (query_type, _) =
            classify("Compare the uniform regulations for officers versus enlisted airmen");

        assert_eq!(query_type, QueryType::Complex);
    }

    #[test]
    fn test_multiple_questions_add_points() {
        let (_, explanation) = classify("What are the rules? And when do they apply?");

        assert!(
            explanation
                .contributions
                .iter()
                .any(|c| c.feature == "multiple_questions" && c.points == 2)
        );
    }

    #[test]
    fn test_long_query_scores_word_buckets() {
        let query = "what ".repeat(26);
        let (_, explanation) = classify(&query);

        let word_points = explanation
            .contributions
            .iter()
            .find(|c| c.feature == "word_count")
            .map(|c| c.points);
        assert_eq!(word_points, Some(3));
    }

    #[test]
    fn test_classification_is_pure() {
        let query = "What about tattoos?";

        let (first, _) = classify(query);
        let (second, _) = classify(query);

        assert_eq!(first, second);
    }

    #[test]
    fn test_short_followup_stays_simple() {
        // The enhanced query would be much longer, but classification always
        // runs on the original three words.
        let (query_type, _) = classify("What about tattoos?");

        assert_eq!(query_type, QueryType::Simple);
    }

    #[test]
    fn test_explanation_records_thresholds() {
        let (_, explanation) = classify("What are the rules?");

        assert_eq!(explanation.simple_threshold, 1);
        assert_eq!(explanation.moderate_threshold, 3);
        assert!(!explanation.prose.is_empty());
    }

    #[test]
    fn test_empty_query_is_simple() {
        let (query_type, explanation) = classify("");

        assert_eq!(query_type, QueryType::Simple);
        assert_eq!(explanation.total_score, 0);
    }
}
