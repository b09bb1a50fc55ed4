//! Locating interpreter errors in protocol source

use super::CHUNK_NAME;
use crate::error::ScriptFault;
use mlua::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;

const TRACEBACK_MARKER: &str = "\nstack traceback:";

/// `protocol:12: message`, also in the `[string "protocol"]:12:` form
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:\[string "=?protocol"\]|=?protocol):(\d+):\s*"#)
        .expect("location pattern is valid")
});

/// Traceback line pointing into the protocol chunk
static FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:\[string "=?protocol"\]|=?protocol):(\d+):"#)
        .expect("frame pattern is valid")
});

/// Turn an interpreter error into a fault located in `source`
pub(crate) fn classify(error: &LuaError, source: &str) -> ScriptFault {
    match error {
        LuaError::CallbackError { traceback, cause } => {
            let fault = classify(cause, source);
            if fault.in_protocol() {
                return fault;
            }
            match protocol_frame(traceback) {
                Some(line) => locate(line, fault.message, source),
                None => fault,
            }
        }
        LuaError::RuntimeError(text) => from_text(text, source),
        LuaError::SyntaxError { message, .. } => from_text(message, source),
        other => from_text(&other.to_string(), source),
    }
}

fn from_text(text: &str, source: &str) -> ScriptFault {
    let (head, traceback) = text.split_once(TRACEBACK_MARKER).unwrap_or((text, ""));
    if let Some(captures) = LOCATION.captures(head) {
        let line = captures[1].parse().unwrap_or(0);
        let message = head[captures[0].len()..].trim().to_string();
        return locate(line, message, source);
    }
    match protocol_frame(traceback) {
        Some(line) => locate(line, head.trim().to_string(), source),
        None => ScriptFault::harness(head.trim()),
    }
}

/// Innermost traceback frame inside the protocol chunk
fn protocol_frame(traceback: &str) -> Option<usize> {
    FRAME
        .captures(traceback)
        .and_then(|captures| captures[1].parse().ok())
}

fn locate(line: usize, message: String, source: &str) -> ScriptFault {
    let snippet = line
        .checked_sub(1)
        .and_then(|index| source.lines().nth(index))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    if snippet.is_none() {
        tracing::debug!(line, chunk = CHUNK_NAME, "fault line outside protocol source");
    }
    ScriptFault {
        line,
        message,
        snippet,
    }
}
