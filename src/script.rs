//! Native-script detection.
//!
//! Which Unicode blocks count as "native" for a language is data, loaded from
//! `data/native_scripts.json`. A text is native when any of its characters
//! falls inside one of the language's ranges. Languages missing from the
//! table accept any script.

use crate::error::DataError;
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::OnceLock;

const BUILTIN_TABLE: &str = include_str!("../data/native_scripts.json");

static BUILTIN: OnceLock<ScriptTable> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct RawScript {
    script: String,
    ranges: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct NativeScript {
    pub name: String,
    ranges: Vec<RangeInclusive<u32>>,
}

impl NativeScript {
    fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        self.ranges.iter().any(|r| r.contains(&cp))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptTable {
    scripts: HashMap<String, NativeScript>,
}

impl ScriptTable {
    /// The table shipped with the crate.
    ///
    /// Falls back to an empty table (every text counts as native) if the
    /// embedded data is ever broken.
    pub fn builtin() -> &'static ScriptTable {
        BUILTIN.get_or_init(|| {
            Self::from_json(BUILTIN_TABLE).unwrap_or_else(|e| {
                tracing::error!("Embedded native script table is invalid: {}", e);
                ScriptTable::default()
            })
        })
    }

    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let raw: HashMap<String, RawScript> = serde_json::from_str(json)?;
        let mut scripts = HashMap::with_capacity(raw.len());

        for (lang, entry) in raw {
            let ranges = entry
                .ranges
                .iter()
                .map(|(start, end)| parse_range(start, end))
                .collect::<Result<Vec<_>, _>>()?;
            scripts.insert(
                lang.to_lowercase(),
                NativeScript {
                    name: entry.script,
                    ranges,
                },
            );
        }

        Ok(Self { scripts })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn script_for(&self, lang: &str) -> Option<&NativeScript> {
        self.scripts.get(lang)
    }

    /// Whether `text` is written in the native script of `lang`.
    pub fn is_native(&self, text: &str, lang: &str) -> bool {
        match self.scripts.get(lang) {
            Some(script) => text.chars().any(|c| script.contains(c)),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

fn parse_range(start: &str, end: &str) -> Result<RangeInclusive<u32>, DataError> {
    let parse = |hex: &str| {
        u32::from_str_radix(hex.trim_start_matches("U+"), 16)
            .map_err(|_| DataError::Invalid(format!("bad code point: {}", hex)))
    };
    let (start, end) = (parse(start)?, parse(end)?);
    if start > end {
        return Err(DataError::Invalid(format!(
            "empty range {:04X}-{:04X}",
            start, end
        )));
    }
    Ok(start..=end)
}
