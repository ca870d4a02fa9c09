use anyhow::Result;
use serde_json::{json, Value};

use pkgrecon::RecognizeError;

use super::FileOutcome;

fn error_value(error: &RecognizeError) -> Value {
    let kind = match error {
        RecognizeError::NotImplemented { .. } => "not_implemented",
        RecognizeError::Parse { .. } => "parse",
        RecognizeError::Io { .. } => "io",
    };
    json!({ "kind": kind, "message": error.to_string() })
}

/// Build the JSON document: one object per input file, in input order.
pub fn to_value(outcomes: &[FileOutcome]) -> Value {
    let files: Vec<Value> = outcomes
        .iter()
        .map(|outcome| {
            let packages: Vec<Value> = outcome.packages().iter().map(|p| p.to_dict()).collect();
            json!({
                "path": outcome.path.display().to_string(),
                "packages": packages,
                "error": outcome.result.as_ref().err().map(error_value),
            })
        })
        .collect();
    json!({ "files": files })
}

pub fn render(outcomes: &[FileOutcome]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&to_value(outcomes))?);
    Ok(())
}
