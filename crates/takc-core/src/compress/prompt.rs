//! Instruction payloads for compression calls

use crate::llm::ChatMessage;

const SYSTEM_PROMPT: &str = "You are performing task-aware knowledge compression. \
     Compress the given context while preserving all information relevant to the \
     specified task. Output only the compressed text.";

/// Default task description for a task domain
pub fn default_task_description(task_type: &str) -> String {
    format!(
        "Answer questions and perform analysis related to {}",
        task_type
    )
}

/// Build the messages for compressing `context` down to `target_tokens`
pub fn compression_messages(
    task_description: &str,
    few_shot_examples: Option<&str>,
    context: &str,
    target_tokens: usize,
) -> Vec<ChatMessage> {
    let mut prompt = format!("TASK: {}\n\n", task_description);

    if let Some(examples) = few_shot_examples.filter(|e| !e.trim().is_empty()) {
        prompt.push_str(&format!("EXAMPLES:\n{}\n\n", examples));
    }

    prompt.push_str(&format!(
        r#"COMPRESSION INSTRUCTIONS:
1. Focus on key facts and relationships relevant to the task
2. Preserve important numerical data and metrics
3. Maintain critical entities and their attributes
4. Keep causal relationships and dependencies
5. Remove redundant or irrelevant information
6. Use concise language while maintaining accuracy

CONTEXT TO COMPRESS:
{}

Compress the above context to at most {} tokens while preserving all task-relevant information:"#,
        context, target_tokens
    ));

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}
