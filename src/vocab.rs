//! Fixed attribute vocabularies.
//!
//! Every attribute key owns a closed list of labels. The extractor may only
//! answer with an entry from the list, and checkpoint rows are validated
//! against the same lists when they are loaded back.
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COLOR_VOCAB: &[&str] = &[
    "black", "white", "grey", "beige", "brown", "red", "pink", "orange", "yellow", "green",
    "olive", "blue", "navy", "purple", "multicolor",
];

pub const NECKLINE_VOCAB: &[&str] = &[
    "crew neck",
    "v-neck",
    "scoop neck",
    "square neck",
    "boat neck",
    "halter neck",
    "off-shoulder",
    "turtleneck",
    "collared",
    "sweetheart",
];

pub const SLEEVE_VOCAB: &[&str] = &[
    "sleeveless",
    "cap sleeve",
    "short sleeve",
    "three-quarter sleeve",
    "long sleeve",
    "puff sleeve",
    "bell sleeve",
];

pub const PATTERN_VOCAB: &[&str] = &[
    "solid",
    "striped",
    "checked",
    "floral",
    "polka dot",
    "animal print",
    "geometric",
    "graphic print",
    "tie-dye",
];

pub const FABRIC_VOCAB: &[&str] = &[
    "cotton", "linen", "silk", "satin", "denim", "knit", "lace", "chiffon", "polyester", "jersey",
];

pub const FIT_VOCAB: &[&str] = &["slim fit", "regular fit", "relaxed fit", "oversized", "cropped"];

/// Categorical attribute keys, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    Color,
    Neckline,
    Sleeve,
    Pattern,
    Fabric,
    Fit,
}

impl AttributeKey {
    pub const ALL: [AttributeKey; 6] = [
        AttributeKey::Color,
        AttributeKey::Neckline,
        AttributeKey::Sleeve,
        AttributeKey::Pattern,
        AttributeKey::Fabric,
        AttributeKey::Fit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKey::Color => "color",
            AttributeKey::Neckline => "neckline",
            AttributeKey::Sleeve => "sleeve",
            AttributeKey::Pattern => "pattern",
            AttributeKey::Fabric => "fabric",
            AttributeKey::Fit => "fit",
        }
    }

    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            AttributeKey::Color => COLOR_VOCAB,
            AttributeKey::Neckline => NECKLINE_VOCAB,
            AttributeKey::Sleeve => SLEEVE_VOCAB,
            AttributeKey::Pattern => PATTERN_VOCAB,
            AttributeKey::Fabric => FABRIC_VOCAB,
            AttributeKey::Fit => FIT_VOCAB,
        }
    }

    /// Return the canonical vocabulary entry for `label`, if it is one.
    pub fn canonical_label(self, label: &str) -> Option<&'static str> {
        let label = label.trim();
        self.vocabulary()
            .iter()
            .copied()
            .find(|entry| entry.eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
