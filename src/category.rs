use serde::{Deserialize, Serialize};

/// The five product lines the catalog knows about. Each line is sold under a
/// brand prefix that also identifies its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Lighting,
    Wellness,
    Time,
    Creativity,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Audio,
        Category::Lighting,
        Category::Wellness,
        Category::Time,
        Category::Creativity,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Audio => "EchoWave",
            Self::Lighting => "Lumina",
            Self::Wellness => "Zephyr",
            Self::Time => "Chronos",
            Self::Creativity => "Aetheria",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Lighting => "lighting",
            Self::Wellness => "wellness",
            Self::Time => "time",
            Self::Creativity => "creativity",
        }
    }

    pub fn prefixes() -> Vec<String> {
        Self::ALL.iter().map(|c| c.prefix().to_string()).collect()
    }

    /// Resolves a product name (by brand prefix) or a bare category label.
    pub fn from_name(name: &str) -> Option<Category> {
        let lower = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| lower.starts_with(&c.prefix().to_lowercase()) || lower == c.label())
    }

    /// First line whose brand prefix appears anywhere in already-lowered text.
    pub fn mentioned_in(lowered: &str) -> Option<Category> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| lowered.contains(&c.prefix().to_lowercase()))
    }

    /// Stable fallback mapping for entities that carry no name.
    pub fn for_id(id: i64) -> Category {
        Self::ALL[id.rem_euclid(Self::ALL.len() as i64) as usize]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
