//! Markdown to document tree conversion.
//!
//! The remote collaboration server stores page content as a typed node
//! tree. This module turns Markdown source into that tree ahead of the
//! network session, so schema problems surface before a single frame is
//! sent.
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MarkdownConverter`] | Markdown → [`DocumentTree`], pure and total |
//! | [`DocumentTree`] | Ordered sequence of top-level [`Block`]s |
//! | [`Block`] / [`Inline`] / [`Mark`] | Closed node model of the remote schema |
//!
//! # Examples
//!
//! ```
//! use pagesync::convert::{Block, MarkdownConverter};
//!
//! let tree = MarkdownConverter::new().convert("# Title\n\nBody text.");
//! assert!(matches!(tree.blocks[0], Block::Heading { level: 1, .. }));
//! assert!(matches!(tree.blocks[1], Block::Paragraph { .. }));
//! ```

mod markdown;
mod tree;

pub use markdown::MarkdownConverter;
pub use tree::{Block, DocumentTree, Inline, Mark, TextRun};
