//! The fixed set of moods a session can be in.
//!
//! A mood changes the wording of the composed prompt (its display name is
//! interpolated) and carries styling attributes for hosts that render them.
//! Only one mood is selected at a time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five selectable moods.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    /// Sharp and analytical.
    #[default]
    Focused,
    /// Dynamic and lively.
    Energetic,
    /// Peaceful.
    Calm,
    /// Inspired.
    Creative,
    /// Relaxed.
    Casual,
}

/// Styling attributes of a mood. No behavioural meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodStyle {
    /// Primary accent colour (`#RRGGBB`).
    pub color: &'static str,
    /// Glow colour (`rgba(...)`).
    pub glow_color: &'static str,
    /// Short tagline shown under the title.
    pub description: &'static str,
}

impl Mood {
    /// All moods in display order.
    pub const ALL: [Mood; 5] = [
        Mood::Focused,
        Mood::Energetic,
        Mood::Calm,
        Mood::Creative,
        Mood::Casual,
    ];

    /// Stable identifier (`"focused"`, `"energetic"`, ...).
    pub fn id(self) -> &'static str {
        match self {
            Self::Focused => "focused",
            Self::Energetic => "energetic",
            Self::Calm => "calm",
            Self::Creative => "creative",
            Self::Casual => "casual",
        }
    }

    /// Human-readable name, as interpolated into prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Focused => "Focused",
            Self::Energetic => "Energetic",
            Self::Calm => "Calm",
            Self::Creative => "Creative",
            Self::Casual => "Casual",
        }
    }

    pub fn style(self) -> MoodStyle {
        match self {
            Self::Focused => MoodStyle {
                color: "#E5E7EB",
                glow_color: "rgba(229, 231, 235, 0.6)",
                description: "Sharp and analytical precision",
            },
            Self::Energetic => MoodStyle {
                color: "#F3F4F6",
                glow_color: "rgba(243, 244, 246, 0.7)",
                description: "Dynamic silver lightning",
            },
            Self::Calm => MoodStyle {
                color: "#D1D5DB",
                glow_color: "rgba(209, 213, 219, 0.5)",
                description: "Peaceful silver serenity",
            },
            Self::Creative => MoodStyle {
                color: "#F9FAFB",
                glow_color: "rgba(249, 250, 251, 0.8)",
                description: "Brilliant silver inspiration",
            },
            Self::Casual => MoodStyle {
                color: "#E5E7EB",
                glow_color: "rgba(229, 231, 235, 0.6)",
                description: "Relaxed silver comfort",
            },
        }
    }

    /// Look up a mood by id or display name, ignoring case and surrounding
    /// whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let needle = value.trim();
        Self::ALL.into_iter().find(|m| {
            m.id().eq_ignore_ascii_case(needle) || m.display_name().eq_ignore_ascii_case(needle)
        })
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
