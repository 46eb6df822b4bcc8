use crate::error::CoreError;

/// Longest prompt accepted by the relay, in characters.
pub const MAX_PROMPT_CHARS: usize = 4000;

/// Validate a generation prompt and return it trimmed.
pub fn validate_prompt(prompt: &str) -> Result<String, CoreError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(CoreError::Validation(format!(
            "prompt must not exceed {MAX_PROMPT_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}
