//! Outgoing user-turn assembly
//!
//! Merges optional search snippets, the raw user message, and optional
//! uploaded-file text into the single turn sent to the model. Ordering is
//! fixed and significant: `[search][user][files]`. The assembler is pure;
//! the caller owns the pending-file buffer and clears it after each
//! submission regardless of the outcome downstream.

/// Delimiter heading the uploaded-file block.
const FILE_BLOCK_HEADER: &str = "[uploaded file content]";

/// Assemble the augmented user turn
///
/// # Arguments
///
/// * `user_text` - The raw message the user typed
/// * `search_block` - Snippet text from the search provider, prepended
///   before the user's own text when present
/// * `file_texts` - Extracted text of each attached file, appended after
///   the user's text under a delimiter when non-empty
///
/// # Examples
///
/// ```
/// use chatgate::gateway::prompt::assemble;
///
/// let text = assemble("question", Some("context"), &[]);
/// assert_eq!(text, "context\nquestion");
/// ```
pub fn assemble(user_text: &str, search_block: Option<&str>, file_texts: &[String]) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(snippets) = search_block {
        parts.push(snippets.to_string());
    }
    parts.push(user_text.to_string());
    if !file_texts.is_empty() {
        parts.push(format!("{}\n{}", FILE_BLOCK_HEADER, file_texts.join("\n")));
    }
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_only() {
        assert_eq!(assemble("hello", None, &[]), "hello");
    }

    #[test]
    fn test_search_precedes_user() {
        let text = assemble("what changed?", Some("result A\nresult B"), &[]);
        assert_eq!(text, "result A\nresult B\nwhat changed?");
    }

    #[test]
    fn test_files_follow_user_with_delimiter() {
        let files = vec!["file one".to_string(), "file two".to_string()];
        let text = assemble("summarize", None, &files);
        assert_eq!(
            text,
            "summarize\n[uploaded file content]\nfile one\nfile two"
        );
    }

    #[test]
    fn test_full_ordering_search_user_files() {
        let files = vec!["doc".to_string()];
        let text = assemble("user text", Some("search text"), &files);
        let search_pos = text.find("search text").unwrap();
        let user_pos = text.find("user text").unwrap();
        let file_pos = text.find("doc").unwrap();
        assert!(search_pos < user_pos);
        assert!(user_pos < file_pos);
    }

    #[test]
    fn test_degraded_turn_has_no_search_block() {
        // Search failure degrades to [user][files].
        let files = vec!["doc".to_string()];
        let text = assemble("user text", None, &files);
        assert_eq!(text, "user text\n[uploaded file content]\ndoc");
    }

    #[test]
    fn test_empty_file_list_adds_no_delimiter() {
        let text = assemble("hi", None, &[]);
        assert!(!text.contains("[uploaded file content]"));
    }
}
