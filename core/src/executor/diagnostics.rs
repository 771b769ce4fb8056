use std::fmt;

/// Health snapshot of one work source, rendered when the executor is stuck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub display_name: String,
    pub entries: Vec<DiagnosticNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticNode {
    pub label: String,
    pub children: Vec<DiagnosticNode>,
}

impl DiagnosticNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: DiagnosticNode) -> Self {
        self.children.push(child);
        self
    }

    fn describe_to(&self, formatter: &mut TreeFormatter) {
        formatter.node(&self.label);
        if !self.children.is_empty() {
            formatter.start_children();
            for child in &self.children {
                child.describe_to(formatter);
            }
            formatter.end_children();
        }
    }
}

impl Diagnostics {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: DiagnosticNode) {
        self.entries.push(entry);
    }

    pub fn describe_to(&self, formatter: &mut TreeFormatter) {
        formatter.node(&self.display_name);
        formatter.start_children();
        if self.entries.is_empty() {
            formatter.node("No work queued");
        }
        for entry in &self.entries {
            entry.describe_to(formatter);
        }
        formatter.end_children();
    }
}

/// Indented tree renderer.
///
/// ```text
/// root
///   - child
///     - grandchild
/// ```
#[derive(Debug, Default)]
pub struct TreeFormatter {
    buffer: String,
    depth: usize,
}

impl TreeFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, text: &str) {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        if self.depth > 0 {
            self.buffer.push_str(&"  ".repeat(self.depth));
            self.buffer.push_str("- ");
        }
        self.buffer.push_str(text);
    }

    pub fn start_children(&mut self) {
        self.depth += 1;
    }

    pub fn end_children(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Display for TreeFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer)
    }
}
