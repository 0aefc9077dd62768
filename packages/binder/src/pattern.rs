use crate::arguments::{Argument, Validation};
use crate::element::BoundElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use stencil_geometry::Size;
use stencil_parser::{Diagnostic, NodeId, Span};

/// The closed set of pattern kinds. Each kind fixes which `<area role>`
/// children the pattern body must provide.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternType {
    Widget,
    Box,
    LabelledBox,
    TitledBox,
    EntriedShape,
    Bar,
    UsageBar,
    Detail,
}

impl PatternType {
    pub const ALL: [PatternType; 8] = [
        PatternType::Widget,
        PatternType::Box,
        PatternType::LabelledBox,
        PatternType::TitledBox,
        PatternType::EntriedShape,
        PatternType::Bar,
        PatternType::UsageBar,
        PatternType::Detail,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            PatternType::Widget => "widget",
            PatternType::Box => "box",
            PatternType::LabelledBox => "labelled-box",
            PatternType::TitledBox => "titled-box",
            PatternType::EntriedShape => "entried-shape",
            PatternType::Bar => "bar",
            PatternType::UsageBar => "usage-bar",
            PatternType::Detail => "detail",
        }
    }

    pub fn required_roles(self) -> &'static [&'static str] {
        match self {
            PatternType::Widget | PatternType::Box => &[],
            PatternType::LabelledBox | PatternType::TitledBox | PatternType::UsageBar => {
                &["label", "remaining"]
            }
            PatternType::EntriedShape => &["entry1", "entry2"],
            PatternType::Bar => &["remaining"],
            PatternType::Detail => &["label"],
        }
    }

    pub fn optional_roles(self) -> &'static [&'static str] {
        match self {
            PatternType::Box | PatternType::EntriedShape | PatternType::Detail => &["remaining"],
            PatternType::TitledBox => &["icon"],
            _ => &[],
        }
    }

    pub fn allows_role(self, role: &str) -> bool {
        self.required_roles().contains(&role) || self.optional_roles().contains(&role)
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bound top-level pattern.
#[derive(Debug, Clone, Serialize)]
pub struct Pattern {
    pub name: String,
    pub library: String,
    /// `library.name`
    pub qualified_name: String,
    /// `None` only on error placeholders.
    pub kind: Option<PatternType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub arguments: Vec<Argument>,
    pub validations: Vec<Validation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_canvas: Option<Size>,
    /// The pattern element itself, bound as the outermost div.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BoundElement>,
    pub is_error: bool,
    pub node: NodeId,
    pub span: Span,
    /// Diagnostics raised while binding this pattern (also present on the
    /// document).
    pub diagnostics: Vec<Diagnostic>,
}

impl Pattern {
    pub(crate) fn placeholder(
        name: Option<String>,
        library: &str,
        node: NodeId,
        span: Span,
    ) -> Self {
        let name = name.unwrap_or_else(|| "<unnamed>".to_string());
        Self {
            qualified_name: qualify(library, &name),
            name,
            library: library.to_string(),
            kind: None,
            description: None,
            title: None,
            arguments: Vec::new(),
            validations: Vec::new(),
            example_size: None,
            example_canvas: None,
            body: None,
            is_error: true,
            node,
            span,
            diagnostics: Vec::new(),
        }
    }

    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

pub fn qualify(library: &str, name: &str) -> String {
    format!("{}.{}", library, name)
}
