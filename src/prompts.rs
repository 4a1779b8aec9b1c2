//! Prompt text and the tool schema used for note generation.
//!
//! The tool schema is the contract with the model: the response is only
//! accepted when it is a call to [`NOTES_TOOL_NAME`] whose arguments match
//! [`notes_tool_parameters`]. Field names here must stay in sync with
//! [`crate::output::NoteRecord`].

use serde_json::{json, Value};

/// Name of the single tool the model is forced to call.
pub const NOTES_TOOL_NAME: &str = "formatNotes";

/// Human-readable description sent with the tool definition.
pub const NOTES_TOOL_DESCRIPTION: &str = "Format the notes response";

/// System prompt for note generation.
pub const NOTES_SYSTEM_PROMPT: &str = r#"Take a deep breath and take your time.
You are reading an academic paper in order to write study notes about it.

Follow these rules precisely:

1. COVERAGE
   - Read every section, including tables, figures and their captions
   - Capture the problem, the method, the key results and the limitations

2. STYLE
   - Each note is one self-contained, concise statement
   - Prefer concrete numbers and names over vague summaries
   - Do not invent facts that are not in the paper

3. REFERENCES
   - Every note lists the page number(s) it was taken from

4. OUTPUT
   - Respond ONLY by calling the formatNotes tool
   - Do NOT answer in plain text"#;

/// Build the user message carrying the paper text.
pub fn notes_user_prompt(paper: &str) -> String {
    format!("Paper:\n\n{paper}")
}

/// JSON schema for the arguments of [`NOTES_TOOL_NAME`].
pub fn notes_tool_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "notes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "note": {
                            "type": "string",
                            "description": "The note"
                        },
                        "pageNumbers": {
                            "type": "array",
                            "items": {
                                "type": "integer",
                                "description": "The page number(s) of the note"
                            }
                        }
                    },
                    "required": ["note", "pageNumbers"]
                }
            }
        },
        "required": ["notes"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_field_names_match_note_record() {
        let params = notes_tool_parameters();
        let item = &params["properties"]["notes"]["items"];
        assert_eq!(item["required"], json!(["note", "pageNumbers"]));
    }

    #[test]
    fn system_prompt_names_the_tool() {
        assert!(NOTES_SYSTEM_PROMPT.contains(NOTES_TOOL_NAME));
    }
}
