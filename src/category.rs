//! Dashboard categories and the presentation rules attached to each.

use crate::widget::Widget;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Activation,
    Analytics,
    /// Keyword tracking. Older exports call it `category5`.
    Keywords,
    Satisfaction,
    Engagement,
    Other,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 6] = [
        Self::Activation,
        Self::Analytics,
        Self::Keywords,
        Self::Satisfaction,
        Self::Engagement,
        Self::Other,
    ];

    /// Classify a category name or slug, ignoring case and surrounding whitespace.
    pub fn classify(name_or_slug: &str) -> Self {
        match name_or_slug.trim().to_lowercase().as_str() {
            "activation" => Self::Activation,
            "analytics" => Self::Analytics,
            "keywords" | "category5" => Self::Keywords,
            "satisfaction" => Self::Satisfaction,
            "engagement" => Self::Engagement,
            _ => Self::Other,
        }
    }

    /// Category of a widget: slug first, then name.
    pub fn of(widget: &Widget) -> Self {
        widget
            .category_slug()
            .or_else(|| widget.category_name())
            .map(Self::classify)
            .unwrap_or(Self::Other)
    }

    pub fn shows_filters(&self) -> bool {
        matches!(self, Self::Keywords)
    }

    pub fn formats_date_in_title(&self) -> bool {
        matches!(self, Self::Activation | Self::Analytics)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Activation => "Instalações",
            Self::Analytics => "Usuários",
            Self::Keywords => "Acompanhamento de Keywords",
            Self::Satisfaction => "Satisfação",
            Self::Engagement => "Engajamento",
            Self::Other => "Outros",
        }
    }
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
