use std::fmt;

use serde::Serialize;

/// The fixed set of widget kinds a script may declare.
///
/// Containers accept a nested block of children; leaves do not.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    // Containers
    Window,
    Row,
    Column,
    Stack,
    List,
    Grid,
    ScrollView,
    // Leaves
    Button,
    Text,
    Input,
    Image,
    Svg,
    Canvas,
    Viewport3d,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 14] = [
        WidgetKind::Window,
        WidgetKind::Row,
        WidgetKind::Column,
        WidgetKind::Stack,
        WidgetKind::List,
        WidgetKind::Grid,
        WidgetKind::ScrollView,
        WidgetKind::Button,
        WidgetKind::Text,
        WidgetKind::Input,
        WidgetKind::Image,
        WidgetKind::Svg,
        WidgetKind::Canvas,
        WidgetKind::Viewport3d,
    ];

    /// Look up a kind by the name used in scripts.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub const fn name(self) -> &'static str {
        match self {
            WidgetKind::Window     => "window",
            WidgetKind::Row        => "row",
            WidgetKind::Column     => "column",
            WidgetKind::Stack      => "stack",
            WidgetKind::List       => "list",
            WidgetKind::Grid       => "grid",
            WidgetKind::ScrollView => "scrollview",
            WidgetKind::Button     => "button",
            WidgetKind::Text       => "text",
            WidgetKind::Input      => "input",
            WidgetKind::Image      => "image",
            WidgetKind::Svg        => "svg",
            WidgetKind::Canvas     => "canvas",
            WidgetKind::Viewport3d => "viewport3d",
        }
    }

    pub const fn is_container(self) -> bool {
        matches!(
            self,
            WidgetKind::Window
                | WidgetKind::Row
                | WidgetKind::Column
                | WidgetKind::Stack
                | WidgetKind::List
                | WidgetKind::Grid
                | WidgetKind::ScrollView
        )
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in WidgetKind::ALL {
            assert_eq!(WidgetKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(WidgetKind::from_name("Button"), None);
        assert_eq!(WidgetKind::from_name("slider"), None);
    }

    #[test]
    fn serde_name_matches_script_name() {
        for kind in WidgetKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), serde_json::json!(kind.name()));
        }
    }

    #[test]
    fn containers_and_leaves() {
        assert!(WidgetKind::Window.is_container());
        assert!(WidgetKind::ScrollView.is_container());
        assert!(!WidgetKind::Button.is_container());
        assert!(!WidgetKind::Viewport3d.is_container());
    }
}
