//! LLM query-variant generation for the advanced strategy.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::llm::{CompletionRequest, LlmClient};

const VARIANT_COUNT: usize = 2;

fn build_prompt(query: &str) -> String {
    format!(
        "Rewrite the following question {VARIANT_COUNT} different ways, keeping its \
         exact meaning but varying the wording. Reply with one rewrite per \
         line and nothing else.\n\nQuestion: {query}"
    )
}

fn parse_variants(raw: &str, original: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case(original))
        .take(VARIANT_COUNT)
        .collect()
}

/// Generates up to two rewrites of `query` with one deterministic LLM call.
///
/// Best-effort: on timeout or error the advanced strategy proceeds with the
/// original query alone.
#[instrument(skip(llm, query), fields(query_len = query.len()))]
pub async fn generate_variants(
    llm: Arc<dyn LlmClient>,
    query: &str,
    budget: Duration,
) -> Vec<String> {
    let request = CompletionRequest::deterministic(build_prompt(query), 256);

    match timeout(budget, llm.complete(request)).await {
        Ok(Ok(raw)) => {
            let variants = parse_variants(&raw, query);
            debug!(count = variants.len(), "query variants generated");
            variants
        }
        Ok(Err(e)) => {
            warn!(error = %e, "variant generation failed, proceeding without variants");
            Vec::new()
        }
        Err(_) => {
            warn!(
                budget_ms = budget.as_millis() as u64,
                "variant generation timed out, proceeding without variants"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_parses_two_variants() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response("1. What rules govern beards?\n2. Which beard policies apply?");

        let variants =
            generate_variants(llm, "What are the beard rules?", Duration::from_secs(2)).await;

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0], "What rules govern beards?");
    }

    #[tokio::test]
    async fn test_timeout_returns_empty() {
        let llm = Arc::new(MockLlmClient::new());
        llm.set_delay(Duration::from_millis(200));

        let variants = generate_variants(llm, "query", Duration::from_millis(10)).await;

        assert!(variants.is_empty());
    }

    #[tokio::test]
    async fn test_error_returns_empty() {
        let llm = Arc::new(MockLlmClient::new());
        llm.fail_next(1);

        let variants = generate_variants(llm, "query", Duration::from_secs(2)).await;

        assert!(variants.is_empty());
    }

    #[test]
    fn test_parse_drops_echo_of_original() {
        let variants = parse_variants("What are the rules?\nWhat rules exist?", "What are the rules?");

        assert_eq!(variants, vec!["What rules exist?".to_string()]);
    }

    #[test]
    fn test_parse_strips_numbering() {
        let variants = parse_variants("1) first rewrite\n- second rewrite", "q");

        assert_eq!(
            variants,
            vec!["first rewrite".to_string(), "second rewrite".to_string()]
        );
    }
}
