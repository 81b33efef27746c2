//! Answer prompt assembly.

use crate::constants::DOC_TRUNCATE_CHARS;
use crate::retrieval::RetrievedDocument;

const PREAMBLE: &str = "You answer questions about policy documents. Rules:\n\
    - Answer ONLY from the numbered sources below.\n\
    - If the sources do not contain the answer, say so explicitly.\n\
    - Cite sources inline as [filename p.N].\n\
    - Do not speculate or add outside knowledge.\n";

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Builds the single grounded-generation prompt: preamble, numbered
/// truncated sources, then the original query (conversation context is
/// already folded into the retrieved documents, not the question).
pub fn build_answer_prompt(query: &str, documents: &[RetrievedDocument]) -> String {
    let mut prompt = String::with_capacity(2048);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\nSources:\n");

    for (i, doc) in documents.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {} p.{}\n{}\n\n",
            i + 1,
            doc.meta.source_file,
            doc.meta.page,
            truncate_chars(&doc.meta.text, DOC_TRUNCATE_CHARS),
        ));
    }

    prompt.push_str(&format!("Question: {query}\n"));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectordb::ChunkMeta;

    fn doc(id: &str, text: &str, source: &str, page: u32) -> RetrievedDocument {
        RetrievedDocument::from_dense(
            ChunkMeta {
                chunk_id: id.to_string(),
                text: text.to_string(),
                source_file: source.to_string(),
                page,
                chunk_index: 0,
            },
            0.9,
        )
    }

    #[test]
    fn test_prompt_structure() {
        let docs = vec![
            doc("c1", "beard standards text", "grooming.pdf", 12),
            doc("c2", "uniform text", "uniform.pdf", 3),
        ];

        let prompt = build_answer_prompt("What are the beard standards?", &docs);

        assert!(prompt.starts_with(PREAMBLE));
        assert!(prompt.contains("[1] grooming.pdf p.12"));
        assert!(prompt.contains("[2] uniform.pdf p.3"));
        assert!(prompt.ends_with("Question: What are the beard standards?\n"));
    }

    #[test]
    fn test_long_documents_truncated() {
        let long_text = "x".repeat(10_000);
        let docs = vec![doc("c1", &long_text, "a.pdf", 1)];

        let prompt = build_answer_prompt("q", &docs);

        assert!(prompt.len() < 6_000);
    }
}
