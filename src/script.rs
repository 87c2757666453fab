//! The document collaborator: read-only access to the rendered script.
//!
//! The renderer owns the nodes. The core only ever sees snapshots of their
//! text and geometry, plus a pure offset-to-scroll conversion. A plain-text
//! implementation is provided for the replay driver and for tests.

use sha2::{Digest, Sha256};

/// One text-bearing node of the rendered script, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentNode {
    pub text: String,
    /// Document-space offset of the node's top edge.
    pub top: f32,
    pub height: f32,
    /// Inserted by this system (jump anchors); ignored for change detection.
    pub synthetic: bool,
}

impl DocumentNode {
    pub fn new(text: impl Into<String>, top: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            top,
            height,
            synthetic: false,
        }
    }
}

pub trait ScriptDocument {
    /// Snapshot of the text-bearing nodes, or `None` while the document root
    /// is not available yet.
    fn nodes(&self) -> Option<Vec<DocumentNode>>;

    /// Convert a document-space offset into the scroll coordinate that puts
    /// that offset on the reading line.
    fn offset_to_scroll_position(&self, offset: f32) -> f32;
}

/// SHA-256 over the text of every non-synthetic node.
pub fn content_hash(nodes: &[DocumentNode]) -> String {
    let mut hasher = Sha256::new();
    for node in nodes.iter().filter(|node| !node.synthetic) {
        hasher.update(node.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Rough text layout model used to give plain-text paragraphs a geometry.
#[derive(Debug, Clone, Copy)]
pub struct ScriptLayout {
    pub chars_per_line: usize,
    pub line_height_px: f32,
    pub paragraph_gap_px: f32,
    pub top_padding_px: f32,
    pub viewport_height_px: f32,
    /// Fraction of the viewport, from the top, where the spoken line sits.
    pub reading_line: f32,
}

impl Default for ScriptLayout {
    fn default() -> Self {
        Self {
            chars_per_line: 48,
            line_height_px: 42.0,
            paragraph_gap_px: 28.0,
            top_padding_px: 12.0,
            viewport_height_px: 720.0,
            reading_line: 0.25,
        }
    }
}

/// Script held as plain text; paragraphs are separated by blank lines.
#[derive(Debug, Clone)]
pub struct PlainTextScript {
    layout: ScriptLayout,
    nodes: Vec<DocumentNode>,
}

impl PlainTextScript {
    pub fn from_text(text: &str, layout: ScriptLayout) -> Self {
        Self {
            layout,
            nodes: layout_paragraphs(&split_paragraphs(text), &layout),
        }
    }

    /// Replace the script content, as an editor would.
    pub fn set_text(&mut self, text: &str) {
        self.nodes = layout_paragraphs(&split_paragraphs(text), &self.layout);
    }

    /// Insert a synthetic anchor node in front of `node_idx`, mimicking the
    /// marker a renderer adds when the system jumps.
    pub fn insert_jump_anchor(&mut self, node_idx: usize) {
        let idx = node_idx.min(self.nodes.len());
        let top = self
            .nodes
            .get(idx)
            .map(|node| node.top)
            .unwrap_or(self.layout.top_padding_px);
        self.nodes.insert(
            idx,
            DocumentNode {
                text: String::new(),
                top,
                height: 0.0,
                synthetic: true,
            },
        );
    }

    pub fn total_height(&self) -> f32 {
        self.nodes
            .last()
            .map(|node| node.top + node.height + self.layout.top_padding_px)
            .unwrap_or(0.0)
    }

    pub fn layout(&self) -> &ScriptLayout {
        &self.layout
    }
}

impl ScriptDocument for PlainTextScript {
    fn nodes(&self) -> Option<Vec<DocumentNode>> {
        Some(self.nodes.clone())
    }

    fn offset_to_scroll_position(&self, offset: f32) -> f32 {
        let reading_line_px = self.layout.viewport_height_px * self.layout.reading_line;
        let max_scroll = (self.total_height() - self.layout.viewport_height_px).max(0.0);
        (offset - reading_line_px).clamp(0.0, max_scroll)
    }
}

/// Split text into paragraphs separated by blank lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut buffer = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                paragraphs.push(buffer.join("\n"));
                buffer.clear();
            }
        } else {
            buffer.push(line.trim_end());
        }
    }

    if !buffer.is_empty() {
        paragraphs.push(buffer.join("\n"));
    }

    paragraphs
}

fn layout_paragraphs(paragraphs: &[String], layout: &ScriptLayout) -> Vec<DocumentNode> {
    let mut top = layout.top_padding_px;
    paragraphs
        .iter()
        .map(|paragraph| {
            let lines = estimate_line_count(paragraph, layout.chars_per_line.max(8));
            let height = lines as f32 * layout.line_height_px;
            let node = DocumentNode::new(paragraph.clone(), top, height);
            top += height + layout.paragraph_gap_px;
            node
        })
        .collect()
}

fn estimate_line_count(paragraph: &str, chars_per_line: usize) -> usize {
    paragraph
        .lines()
        .map(|line| {
            let mut lines = 1usize;
            let mut line_len = 0usize;
            for word in line.split_whitespace() {
                let word_len = word.chars().count();
                let needed = if line_len == 0 { word_len } else { word_len + 1 };
                if line_len > 0 && line_len + needed > chars_per_line {
                    lines += 1;
                    line_len = word_len;
                } else {
                    line_len += needed;
                }
            }
            lines
        })
        .sum::<usize>()
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "Welcome to the show.\n\n(CAM 2)\n\nToday we discuss climate,\nand what it means for you.\n\n\n";

    #[test]
    fn splits_on_blank_lines() {
        assert_eq!(
            split_paragraphs(SCRIPT),
            vec![
                "Welcome to the show.",
                "(CAM 2)",
                "Today we discuss climate,\nand what it means for you."
            ]
        );
    }

    #[test]
    fn nodes_are_laid_out_top_to_bottom() {
        let script = PlainTextScript::from_text(SCRIPT, ScriptLayout::default());
        let nodes = script.nodes().expect("plain text is always ready");
        assert_eq!(nodes.len(), 3);
        for pair in nodes.windows(2) {
            assert!(pair[1].top >= pair[0].top + pair[0].height);
        }
        assert!(nodes[2].height >= 2.0 * script.layout().line_height_px);
    }

    #[test]
    fn synthetic_nodes_do_not_change_the_hash() {
        let mut script = PlainTextScript::from_text(SCRIPT, ScriptLayout::default());
        let before = content_hash(&script.nodes().unwrap_or_default());
        script.insert_jump_anchor(1);
        let after = content_hash(&script.nodes().unwrap_or_default());
        assert_eq!(before, after);

        script.set_text("A different script entirely.");
        let changed = content_hash(&script.nodes().unwrap_or_default());
        assert_ne!(before, changed);
    }

    #[test]
    fn scroll_mapping_is_monotonic_and_clamped() {
        let long_text = (0..40)
            .map(|i| format!("Paragraph number {i} with a handful of words in it."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let script = PlainTextScript::from_text(&long_text, ScriptLayout::default());
        assert_eq!(script.offset_to_scroll_position(0.0), 0.0);
        let mut previous = -1.0f32;
        for offset in (0..4000).step_by(250) {
            let scroll = script.offset_to_scroll_position(offset as f32);
            assert!(scroll >= previous);
            previous = scroll;
        }
    }
}
