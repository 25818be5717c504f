use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// Storage advice and shelf life for a recognized food.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShelfLifeEstimate {
    pub storage_condition: String,
    pub duration_seconds: u64,
}

impl ShelfLifeEstimate {
    /// Whole days, rounded to nearest.
    pub fn estimated_days(&self) -> u64 {
        self.duration_seconds.saturating_add(SECONDS_PER_DAY / 2) / SECONDS_PER_DAY
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("reply contains no balanced {{...}} object")]
    NoObject,
    #[error("embedded object is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("`{0}` is missing or not a string")]
    MissingStorage(&'static str),
    #[error("`duration` must be a non-negative number, got {0}")]
    InvalidDuration(String),
}

/// The prompt pins the model to a single object so the reply stays parseable.
pub fn build_prompt(label: &str) -> String {
    let label = label.trim();
    format!(
        "If I buy {label} today, how long will it last? \
         Pick the most plausible way to store it and estimate the time until it expires. \
         Reply with exactly one JSON object and nothing else: \
         {{\"storage_type\": \"<how to store it>\", \"duration\": <time to expiry in whole seconds>}}. \
         Start the reply with the opening curly brace and end it with the closing curly brace."
    )
}

/// Slice from the first `{` to its matching `}`.
///
/// Braces inside single- or double-quoted strings do not count towards depth.
pub fn extract_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (offset, ch) in reply[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&reply[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Best-effort parse of a free-text model reply. Never panics.
pub fn parse_estimate(reply: &str) -> Result<ShelfLifeEstimate, ParseError> {
    let object = extract_object(reply).ok_or(ParseError::NoObject)?;
    let value = match serde_json::from_str::<Value>(object) {
        Ok(v) => v,
        // Models sometimes echo a single-quoted example back.
        Err(strict) => serde_json::from_str::<Value>(&object.replace('\'', "\""))
            .map_err(|_| ParseError::InvalidJson(strict.to_string()))?,
    };

    let storage_condition = value
        .get("storage_type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ParseError::MissingStorage("storage_type"))?
        .to_string();

    let duration = value.get("duration").unwrap_or(&Value::Null);
    let duration_seconds = duration_seconds(duration)
        .ok_or_else(|| ParseError::InvalidDuration(duration.to_string()))?;

    Ok(ShelfLifeEstimate {
        storage_condition,
        duration_seconds,
    })
}

fn duration_seconds(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let f = v.as_f64()?;
    if f.is_finite() && f >= 0.0 && f <= u64::MAX as f64 {
        Some(f.round() as u64)
    } else {
        None
    }
}
