//! Document tree model produced by the Markdown converter.
//!
//! This is the structured representation that gets materialized into the
//! shared collaborative document. The enums are closed on purpose: every
//! node type representable here is part of the remote schema, so an
//! unsupported construct can only be rejected (downgraded) during
//! conversion, never smuggled through to the apply step.

/// Formatting marks attached to a text run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mark {
    /// Strong emphasis.
    Bold,
    /// Emphasis.
    Italic,
    /// Strikethrough.
    Strikethrough,
    /// Inline code.
    Code,
    /// Hyperlink with its destination.
    Link {
        /// Link destination URL.
        href: String,
    },
}

impl Mark {
    /// Attribute name this mark is stored under in the shared document.
    pub fn attr_name(&self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Strikethrough => "strike",
            Mark::Code => "code",
            Mark::Link { .. } => "link",
        }
    }
}

/// A contiguous run of text sharing one set of marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    /// The text content.
    pub text: String,
    /// Marks applied to the whole run.
    pub marks: Vec<Mark>,
}

/// Inline-level content inside a paragraph or heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// A text run.
    Run(TextRun),
    /// An explicit line break.
    HardBreak,
    /// An inline image.
    Image {
        /// Image source URL.
        src: String,
        /// Alternative text.
        alt: String,
        /// Optional title.
        title: String,
    },
}

/// Block-level content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A paragraph of inline content.
    Paragraph {
        /// Inline children.
        inlines: Vec<Inline>,
    },
    /// A heading, levels 1 through 6.
    Heading {
        /// Heading level (1-6).
        level: u8,
        /// Inline children.
        inlines: Vec<Inline>,
    },
    /// A fenced or indented code block.
    CodeBlock {
        /// Language hint from the fence info string, if any.
        language: Option<String>,
        /// Literal code content.
        text: String,
    },
    /// A block quote containing nested blocks.
    Blockquote {
        /// Nested block children.
        children: Vec<Block>,
    },
    /// An unordered list; each item is a sequence of blocks.
    BulletList {
        /// List items.
        items: Vec<Vec<Block>>,
    },
    /// An ordered list with a starting number.
    OrderedList {
        /// Number of the first item.
        start: u64,
        /// List items.
        items: Vec<Vec<Block>>,
    },
    /// A thematic break.
    HorizontalRule,
}

impl Block {
    /// Element name this block maps to in the shared document schema.
    pub fn type_name(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { .. } => "heading",
            Block::CodeBlock { .. } => "codeBlock",
            Block::Blockquote { .. } => "blockquote",
            Block::BulletList { .. } => "bulletList",
            Block::OrderedList { .. } => "orderedList",
            Block::HorizontalRule => "horizontalRule",
        }
    }
}

/// The converted document: an ordered sequence of top-level blocks.
///
/// An empty source converts to an empty tree; replacing a page with it
/// clears the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    /// Top-level blocks in document order.
    pub blocks: Vec<Block>,
}

impl DocumentTree {
    /// Whether the tree has no content at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_match_remote_schema() {
        assert_eq!(
            Block::Paragraph { inlines: vec![] }.type_name(),
            "paragraph"
        );
        assert_eq!(
            Block::Heading {
                level: 2,
                inlines: vec![]
            }
            .type_name(),
            "heading"
        );
        assert_eq!(Block::HorizontalRule.type_name(), "horizontalRule");
        assert_eq!(Mark::Link { href: "x".into() }.attr_name(), "link");
        assert_eq!(Mark::Strikethrough.attr_name(), "strike");
    }
}
