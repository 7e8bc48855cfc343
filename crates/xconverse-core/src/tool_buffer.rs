use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub raw_input: String,
    pub emitted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Accumulates streamed tool-call arguments per content-block index.
#[derive(Debug, Default)]
pub struct ToolCallBuffer {
    pending: BTreeMap<u32, PendingToolCall>,
}

impl ToolCallBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, index: u32, id: impl Into<String>, name: impl Into<String>) {
        let call = PendingToolCall {
            id: id.into(),
            name: name.into(),
            raw_input: String::new(),
            emitted: false,
        };
        self.pending.insert(index, call);
    }

    pub fn append(&mut self, index: u32, chunk: &str) {
        if let Some(call) = self.pending.get_mut(&index) {
            call.raw_input.push_str(chunk);
        }
    }

    pub fn is_tracking(&self, index: u32) -> bool {
        self.pending.contains_key(&index)
    }

    /// Returns the call once the buffer already holds a complete JSON object.
    pub fn try_validate(&self, index: u32) -> Option<ToolCall> {
        let call = self.pending.get(&index)?;
        match serde_json::from_str::<Value>(&call.raw_input) {
            Ok(input @ Value::Object(_)) => {
                Some(ToolCall { id: call.id.clone(), name: call.name.clone(), input })
            }
            _ => None,
        }
    }

    pub fn finalize(&mut self, index: u32) -> Option<ToolCall> {
        let call = self.pending.remove(&index)?;
        let input = finalize_input(&call.raw_input);
        Some(ToolCall { id: call.id, name: call.name, input })
    }

    pub fn mark_emitted(&mut self, index: u32) {
        if let Some(call) = self.pending.get_mut(&index) {
            call.emitted = true;
        }
    }

    pub fn is_emitted(&self, index: u32) -> bool {
        self.pending.get(&index).is_some_and(|call| call.emitted)
    }

    pub fn first_index(&self) -> Option<u32> {
        self.pending.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn finalize_input(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(input @ Value::Object(_)) => input,
        _ => json!({ "raw": raw }),
    }
}
