//! Syllabus model
//!
//! Agents save course plans as JSON shaped like
//! `{"syllabus": [{"module", "status", "subtopics"}], "current_topic"}`.
//! Models are not always disciplined about it (double-encoded strings, bare
//! arrays, plain string items), so parsing here is lenient.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// How many times a JSON string may be nested inside another string
const MAX_DECODE_DEPTH: usize = 3;

/// Progress of a single module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Completed,
    InProgress,
    Pending,
}

impl ModuleStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "completed" | "done" => Self::Completed,
            "in_progress" | "in progress" | "active" => Self::InProgress,
            _ => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::InProgress => "in_progress",
            Self::Pending => "pending",
        }
    }

    /// Marker used when rendering in a terminal
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Completed => "[x]",
            Self::InProgress => "[>]",
            Self::Pending => "[ ]",
        }
    }
}

/// One module of a course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyllabusModule {
    pub module: String,
    pub status: ModuleStatus,
    pub subtopics: Vec<String>,
}

/// A parsed course plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Syllabus {
    pub modules: Vec<SyllabusModule>,
    pub current_topic: Option<String>,
}

impl Syllabus {
    /// Bootstrap plan used when a subject is started with no prior profile
    pub fn starter() -> Self {
        Self {
            modules: vec![SyllabusModule {
                module: "Getting Started".to_string(),
                status: ModuleStatus::InProgress,
                subtopics: vec!["Course Overview".to_string()],
            }],
            current_topic: Some("Introduction".to_string()),
        }
    }

    /// Parse leniently. Returns None when no module list can be found.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_value(&decode_nested(Value::String(raw.to_string())))
    }

    /// Build from an already-decoded JSON value
    pub fn from_value(value: &Value) -> Option<Self> {
        let (items, current_topic) = match value {
            Value::Object(map) => {
                let items = map.get("syllabus")?;
                let items = decode_nested(items.clone());
                let current = map
                    .get("current_topic")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                (items, current)
            }
            Value::Array(_) => (value.clone(), None),
            _ => return None,
        };

        let items = items.as_array()?;
        let modules = items.iter().map(module_from_value).collect();

        Some(Self {
            modules,
            current_topic,
        })
    }

    /// Serialize to the on-disk JSON shape
    pub fn to_json(&self) -> Value {
        json!({
            "syllabus": self.modules.iter().map(|m| json!({
                "module": m.module,
                "status": m.status.as_str(),
                "subtopics": m.subtopics,
            })).collect::<Vec<_>>(),
            "current_topic": self.current_topic,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Fraction of modules completed
    pub fn completion(&self) -> f64 {
        if self.modules.is_empty() {
            return 0.0;
        }
        let done = self
            .modules
            .iter()
            .filter(|m| m.status == ModuleStatus::Completed)
            .count();
        done as f64 / self.modules.len() as f64
    }

    /// Render as a plain-text outline
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(topic) = &self.current_topic {
            out.push_str(&format!("Current topic: {}\n", topic));
        }
        for m in &self.modules {
            out.push_str(&format!("{} {}\n", m.status.marker(), m.module));
            for sub in &m.subtopics {
                out.push_str(&format!("      - {}\n", sub));
            }
        }
        out
    }
}

fn module_from_value(item: &Value) -> SyllabusModule {
    match item {
        Value::Object(map) => SyllabusModule {
            module: map
                .get("module")
                .and_then(|v| v.as_str())
                .unwrap_or("Module")
                .to_string(),
            status: map
                .get("status")
                .and_then(|v| v.as_str())
                .map(ModuleStatus::parse)
                .unwrap_or(ModuleStatus::Pending),
            subtopics: map
                .get("subtopics")
                .and_then(|v| v.as_array())
                .map(|subs| {
                    subs.iter()
                        .map(|s| match s {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        },
        Value::String(s) => SyllabusModule {
            module: s.clone(),
            status: ModuleStatus::Pending,
            subtopics: vec![],
        },
        other => SyllabusModule {
            module: other.to_string(),
            status: ModuleStatus::Pending,
            subtopics: vec![],
        },
    }
}

/// Decode strings that themselves hold JSON, up to a fixed depth
fn decode_nested(mut value: Value) -> Value {
    for _ in 0..MAX_DECODE_DEPTH {
        match &value {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(inner) => value = inner,
                Err(_) => break,
            },
            _ => break,
        }
    }
    value
}

/// Coarse progress bar value for a free-text level
pub fn level_progress(level: &str) -> f64 {
    let level = level.to_lowercase();
    if level.contains("beginner") {
        0.1
    } else if level.contains("intermediate") {
        0.5
    } else {
        0.9
    }
}

/// Pick the syllabus to show: the path's own plan when saved, otherwise the
/// subject profile's details.
pub fn effective_syllabus(path_syllabus: Option<&str>, profile_details: Option<&str>) -> Option<Syllabus> {
    let path = path_syllabus.filter(|s| {
        let s = s.trim();
        !s.is_empty() && s != crate::store::EMPTY_SYLLABUS
    });

    path.or(profile_details).and_then(Syllabus::parse)
}
