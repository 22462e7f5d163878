use serde::{Deserialize, Serialize};

use crate::value::{Props, Value};

/// Kinds of modifiers a node can carry. A node holds at most one modifier
/// per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModifierKind {
    Padding,
    Frame,
    Background,
    Foreground,
    Font,
    Opacity,
    CornerRadius,
    Border,
    Shadow,
    Offset,
    Disabled,
    Hidden,
    Accessibility,
    Gesture,
}

impl ModifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifierKind::Padding => "padding",
            ModifierKind::Frame => "frame",
            ModifierKind::Background => "background",
            ModifierKind::Foreground => "foreground",
            ModifierKind::Font => "font",
            ModifierKind::Opacity => "opacity",
            ModifierKind::CornerRadius => "cornerRadius",
            ModifierKind::Border => "border",
            ModifierKind::Shadow => "shadow",
            ModifierKind::Offset => "offset",
            ModifierKind::Disabled => "disabled",
            ModifierKind::Hidden => "hidden",
            ModifierKind::Accessibility => "accessibility",
            ModifierKind::Gesture => "gesture",
        }
    }
}

impl std::fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub kind: ModifierKind,
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub args: Props,
}

impl Modifier {
    pub fn new(kind: ModifierKind) -> Self {
        Self {
            kind,
            args: Props::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }
}
