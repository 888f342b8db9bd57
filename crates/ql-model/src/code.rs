//! Terminology values: `Code` and `Concept`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    pub system: Option<String>,
    pub code: String,
    pub version: Option<String>,
    pub display: Option<String>,
}

impl Code {
    pub fn new(system: Option<String>, code: impl Into<String>) -> Self {
        Self {
            system,
            code: code.into(),
            version: None,
            display: None,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system {
            Some(system) => write!(f, "{system}#{}", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub display: Option<String>,
    pub codes: Vec<Code>,
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display {
            Some(d) => write!(f, "{d}"),
            None => write!(
                f,
                "{}",
                self.codes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}
