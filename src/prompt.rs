//! Prompt construction.
//!
//! Combines the fixed instruction, optional user text and the diff into the
//! single prompt sent to the model.

/// Instruction used when the user has not stored a custom prompt.
pub const DEFAULT_INSTRUCTION: &str = "Write a git commit message for the changes in the diff below, \
following the Conventional Commits standard (type(scope): description). \
Keep the subject line under 72 characters";

/// Separator between commands in an interactive response.
pub const COMMAND_SEPARATOR: &str = " && ";

const TRUNCATION_MARKER: &str = "\n[diff truncated]";

/// Builds prompts for both output modes.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instruction: String,
    max_diff_chars: usize,
}

impl PromptBuilder {
    pub fn new(instruction: impl Into<String>, max_diff_chars: usize) -> Self {
        Self {
            instruction: instruction.into(),
            max_diff_chars,
        }
    }

    /// Prompt asking for the commit message only.
    pub fn commit_message(&self, diff: &str, user_text: &[String]) -> String {
        self.build(
            diff,
            user_text,
            "Reply with only the commit message. No quotes, no markdown, no explanations.",
        )
    }

    /// Prompt asking for the shell commands that stage and commit the changes.
    pub fn commands(&self, diff: &str, user_text: &[String]) -> String {
        let rules = format!(
            "Reply with only the shell commands that stage and commit these changes, \
joined by \"{sep}\" on a single line, for example: \
git add .{sep}git commit -m \"feat: add login form\". \
Never use \"&&\" inside the commit message. No markdown, no explanations.",
            sep = COMMAND_SEPARATOR
        );
        self.build(diff, user_text, &rules)
    }

    fn build(&self, diff: &str, user_text: &[String], rules: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.instruction.trim().trim_end_matches('.'));
        prompt.push_str(".\n");

        let user_text = join_user_text(user_text);
        if !user_text.is_empty() {
            prompt.push_str("Additional instructions from the user: ");
            prompt.push_str(&user_text);
            prompt.push('\n');
        }

        prompt.push_str(rules);
        prompt.push_str("\n\nDiff:\n");
        prompt.push_str(&truncate_diff(diff, self.max_diff_chars));
        prompt
    }
}

fn join_user_text(words: &[String]) -> String {
    words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut `diff` to at most `max_chars` characters, marking the cut.
fn truncate_diff(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &diff[..byte_idx], TRUNCATION_MARKER),
        None => diff.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &[&str]) -> Vec<String> {
        s.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_commit_message_prompt_layout() {
        let builder = PromptBuilder::new(DEFAULT_INSTRUCTION, 1000);
        let prompt = builder.commit_message("+added", &[]);
        assert!(prompt.starts_with(DEFAULT_INSTRUCTION));
        assert!(prompt.contains("Reply with only the commit message"));
        assert!(prompt.ends_with("Diff:\n+added"));
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_user_text_is_joined() {
        let builder = PromptBuilder::new("Describe it", 1000);
        let prompt = builder.commit_message("+x", &words(&["mark", " as ", "", "wip"]));
        assert!(prompt.contains("Additional instructions from the user: mark as wip\n"));
    }

    #[test]
    fn test_commands_prompt_mentions_separator() {
        let builder = PromptBuilder::new(DEFAULT_INSTRUCTION, 1000);
        let prompt = builder.commands("+x", &[]);
        assert!(prompt.contains("git add . && git commit -m"));
    }

    #[test]
    fn test_truncate_diff() {
        assert_eq!(truncate_diff("short", 10), "short");
        assert_eq!(truncate_diff("exactly", 7), "exactly");
        assert_eq!(truncate_diff("abcdef", 3), format!("abc{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncate_diff_respects_char_boundaries() {
        assert_eq!(truncate_diff("ééé", 2), format!("éé{}", TRUNCATION_MARKER));
    }
}
