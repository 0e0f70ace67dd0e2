//! Property catalog: human-readable names for object codes and the rules used
//! to display their property values.

use crate::error::{Result, V2hError};
use crate::protocol::Eoj;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Name used for anything the catalog does not know.
pub const UNKNOWN: &str = "unknown";

/// How a property value is turned into display text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum RenderRule {
    /// Label lookup keyed by the lowercase hex value.
    #[serde(rename = "list")]
    Enumeration { values: HashMap<String, String> },
    /// Big-endian unsigned integer.
    #[serde(rename = "hex")]
    DecimalFromHex,
    /// No decoding.
    #[serde(rename = "raw")]
    RawHex,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyEntry {
    pub name: String,
    #[serde(flatten)]
    pub rule: RenderRule,
}

#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub name: String,
    pub properties: HashMap<u8, PropertyEntry>,
}

#[derive(Deserialize)]
struct RawObject {
    name: String,
    #[serde(default)]
    values: HashMap<String, PropertyEntry>,
}

/// Result of resolving one property value against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub object_name: &'a str,
    pub value_name: &'a str,
    pub display: String,
}

/// Read-only lookup table from object code to names and render rules.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    objects: HashMap<Eoj, ObjectEntry>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog document from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a catalog document.
    ///
    /// Object keys are 6 hex digits, property keys 2 hex digits. Enumeration
    /// keys are normalised to lowercase.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: HashMap<String, RawObject> = serde_json::from_str(text)?;
        let mut objects = HashMap::with_capacity(raw.len());

        for (code, object) in raw {
            let eoj: Eoj = code
                .parse()
                .map_err(|_| V2hError::Json(format!("bad object code '{}' in catalog", code)))?;

            let mut properties = HashMap::with_capacity(object.values.len());
            for (epc, mut entry) in object.values {
                let epc = u8::from_str_radix(&epc, 16).map_err(|_| {
                    V2hError::Json(format!("bad property code '{}' under {}", epc, code))
                })?;
                if let RenderRule::Enumeration { values } = &mut entry.rule {
                    let normalised: HashMap<_, _> = values
                        .drain()
                        .map(|(k, v)| (k.to_ascii_lowercase(), v))
                        .collect();
                    *values = normalised;
                }
                properties.insert(epc, entry);
            }

            objects.insert(
                eoj,
                ObjectEntry {
                    name: object.name,
                    properties,
                },
            );
        }

        Ok(Self { objects })
    }

    pub fn object(&self, eoj: &Eoj) -> Option<&ObjectEntry> {
        self.objects.get(eoj)
    }

    pub fn object_name(&self, eoj: &Eoj) -> &str {
        self.object(eoj).map_or(UNKNOWN, |o| o.name.as_str())
    }

    pub fn property(&self, eoj: &Eoj, epc: u8) -> Option<&PropertyEntry> {
        self.object(eoj).and_then(|o| o.properties.get(&epc))
    }

    /// Resolve a raw value into names and display text. Never fails.
    pub fn resolve(&self, eoj: &Eoj, epc: u8, raw: &str) -> Resolved<'_> {
        let value = raw.to_ascii_lowercase();

        let Some(object) = self.object(eoj) else {
            return Resolved {
                object_name: UNKNOWN,
                value_name: UNKNOWN,
                display: format!("hex: {}", value),
            };
        };

        let Some(property) = object.properties.get(&epc) else {
            return Resolved {
                object_name: &object.name,
                value_name: UNKNOWN,
                display: format!("hex: {}", value),
            };
        };

        let display = match &property.rule {
            RenderRule::Enumeration { values } => {
                let label = values.get(&value).map_or(UNKNOWN, String::as_str);
                format!("{} (hex: {})", label, value)
            }
            RenderRule::DecimalFromHex => match decimal_from_hex(&value) {
                Some(n) => format!("{} (hex: {})", n, value),
                None => format!("{} (hex: {})", UNKNOWN, value),
            },
            RenderRule::RawHex => format!("(hex: {})", value),
        };

        Resolved {
            object_name: &object.name,
            value_name: &property.name,
            display,
        }
    }
}

/// Parses a big-endian hex string; `None` for empty, invalid or oversized input.
pub fn decimal_from_hex(value: &str) -> Option<u128> {
    if value.is_empty() {
        return None;
    }
    u128::from_str_radix(value, 16).ok()
}
