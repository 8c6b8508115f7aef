use serde_json::Value;

use crate::constants::keys;
use crate::model::Payload;

/// What the loop needs from a VALIDATE output.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub total: f64,
    pub pass: bool,
    pub issues: Vec<String>,
    /// Score map as produced by VALIDATE.
    pub scores: Value,
}

impl Verdict {
    pub fn from_payload(payload: &Payload) -> Result<Self, String> {
        let total = payload.get(keys::TOTAL)
                           .and_then(Value::as_f64)
                           .ok_or_else(|| format!("missing numeric `{}`", keys::TOTAL))?;
        let pass = payload.get(keys::PASS)
                          .and_then(Value::as_bool)
                          .ok_or_else(|| format!("missing boolean `{}`", keys::PASS))?;
        let issues = match payload.get(keys::ISSUES) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            None => Vec::new(),
            Some(_) => return Err(format!("`{}` must be a list", keys::ISSUES)),
        };
        let scores = payload.get(keys::SCORES).cloned().unwrap_or(Value::Null);
        Ok(Self { total,
                  pass,
                  issues,
                  scores })
    }
}
