//! Markdown to document tree conversion.
//!
//! Walks the pulldown-cmark event stream and folds it into a
//! [`DocumentTree`]. The conversion is deterministic, performs no I/O, and
//! is total: any input, including malformed or empty markup, produces a
//! tree. Constructs without a counterpart in the remote schema (raw HTML,
//! footnotes, math) degrade to plain text runs instead of failing.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::convert::tree::{Block, DocumentTree, Inline, Mark, TextRun};

/// Converts Markdown source into a [`DocumentTree`].
///
/// The parser capability is injected at construction: callers that need
/// non-default Markdown extensions pass their own [`Options`] instead of
/// the converter reaching for process-wide state.
///
/// # Examples
///
/// ```
/// use pagesync::convert::MarkdownConverter;
///
/// let converter = MarkdownConverter::new();
/// let tree = converter.convert("# Title\n\nBody text.");
/// assert_eq!(tree.blocks.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    options: Options,
}

impl MarkdownConverter {
    /// Create a converter with the default extension set (strikethrough
    /// enabled, everything else per CommonMark).
    pub fn new() -> Self {
        Self::with_options(Options::ENABLE_STRIKETHROUGH)
    }

    /// Create a converter with explicit parser options.
    pub fn with_options(options: Options) -> Self {
        MarkdownConverter { options }
    }

    /// Convert Markdown source into a document tree.
    ///
    /// Never fails; an empty or unparseable source yields a best-effort
    /// (possibly empty) tree.
    pub fn convert(&self, source: &str) -> DocumentTree {
        let mut builder = TreeBuilder::default();
        for event in Parser::new_ext(source, self.options) {
            builder.handle(event);
        }
        builder.finish()
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for one open list.
struct ListCtx {
    start: Option<u64>,
    items: Vec<Vec<Block>>,
}

/// Context for one open image (alt text accumulates from nested events).
struct ImageCtx {
    src: String,
    title: String,
    alt: String,
}

/// Folds parser events into blocks.
///
/// `scopes` is a stack of block sequences: index 0 is the document itself,
/// deeper entries are open blockquotes and list items. Inline content
/// buffers in `inlines` until the enclosing block closes; loose inline
/// content at a block boundary (tight list items, stray HTML) is wrapped
/// into a paragraph so nothing is dropped.
#[derive(Default)]
struct TreeBuilder {
    scopes: Vec<Vec<Block>>,
    lists: Vec<ListCtx>,
    inlines: Vec<Inline>,
    marks: Vec<Mark>,
    code: Option<(Option<String>, String)>,
    heading: Option<u8>,
    image: Option<ImageCtx>,
}

impl TreeBuilder {
    fn handle(&mut self, event: Event<'_>) {
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(text) => {
                self.marks.push(Mark::Code);
                self.push_run(&text);
                self.marks.pop();
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                // No raw-HTML node in the remote schema; keep the source
                // text so nothing is silently lost.
                self.text(&html);
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.inlines.push(Inline::HardBreak),
            Event::Rule => {
                self.flush_loose_inlines();
                self.push_block(Block::HorizontalRule);
            }
            // Footnotes, task markers and math are not enabled by the
            // default options; if a caller enables them they degrade to
            // nothing rather than corrupting the tree.
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => self.heading = Some(level as u8),
            Tag::BlockQuote(_) => {
                self.flush_loose_inlines();
                self.scopes.push(Vec::new());
            }
            Tag::List(start) => {
                self.flush_loose_inlines();
                self.lists.push(ListCtx {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.scopes.push(Vec::new()),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let lang = info.split_whitespace().next().unwrap_or("");
                        if lang.is_empty() {
                            None
                        } else {
                            Some(lang.to_string())
                        }
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::Emphasis => self.marks.push(Mark::Italic),
            Tag::Strong => self.marks.push(Mark::Bold),
            Tag::Strikethrough => self.marks.push(Mark::Strikethrough),
            Tag::Link { dest_url, .. } => self.marks.push(Mark::Link {
                href: dest_url.to_string(),
            }),
            Tag::Image {
                dest_url, title, ..
            } => {
                self.image = Some(ImageCtx {
                    src: dest_url.to_string(),
                    title: title.to_string(),
                    alt: String::new(),
                });
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                let inlines = std::mem::take(&mut self.inlines);
                self.push_block(Block::Paragraph { inlines });
            }
            TagEnd::Heading(_) => {
                let level = self.heading.take().unwrap_or(1);
                let inlines = std::mem::take(&mut self.inlines);
                self.push_block(Block::Heading { level, inlines });
            }
            TagEnd::BlockQuote(_) => {
                self.flush_loose_inlines();
                let children = self.scopes.pop().unwrap_or_default();
                self.push_block(Block::Blockquote { children });
            }
            TagEnd::Item => {
                self.flush_loose_inlines();
                let blocks = self.scopes.pop().unwrap_or_default();
                if let Some(list) = self.lists.last_mut() {
                    list.items.push(blocks);
                }
            }
            TagEnd::List(_) => {
                if let Some(list) = self.lists.pop() {
                    let block = match list.start {
                        Some(start) => Block::OrderedList {
                            start,
                            items: list.items,
                        },
                        None => Block::BulletList { items: list.items },
                    };
                    self.push_block(block);
                }
            }
            TagEnd::CodeBlock => {
                if let Some((language, mut text)) = self.code.take() {
                    if text.ends_with('\n') {
                        text.pop();
                    }
                    self.push_block(Block::CodeBlock { language, text });
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link => {
                self.marks.pop();
            }
            TagEnd::Image => {
                if let Some(image) = self.image.take() {
                    self.inlines.push(Inline::Image {
                        src: image.src,
                        alt: image.alt,
                        title: image.title,
                    });
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, code)) = self.code.as_mut() {
            code.push_str(text);
        } else if let Some(image) = self.image.as_mut() {
            image.alt.push_str(text);
        } else {
            self.push_run(text);
        }
    }

    /// Append a text run with the currently active marks, merging with the
    /// previous run when the mark sets are identical.
    fn push_run(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::Run(last)) = self.inlines.last_mut() {
            if last.marks == self.marks {
                last.text.push_str(text);
                return;
            }
        }
        self.inlines.push(Inline::Run(TextRun {
            text: text.to_string(),
            marks: self.marks.clone(),
        }));
    }

    /// Wrap any buffered inline content into a paragraph. Tight list items
    /// and top-level raw HTML produce inline events without an enclosing
    /// paragraph tag.
    fn flush_loose_inlines(&mut self) {
        if !self.inlines.is_empty() {
            let inlines = std::mem::take(&mut self.inlines);
            self.push_block(Block::Paragraph { inlines });
        }
    }

    fn push_block(&mut self, block: Block) {
        if self.scopes.is_empty() {
            self.scopes.push(Vec::new());
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(block);
        }
    }

    fn finish(mut self) -> DocumentTree {
        self.flush_loose_inlines();
        // Unbalanced input may leave scopes open; fold them outward so no
        // content is dropped.
        while self.scopes.len() > 1 {
            let orphan = self.scopes.pop().unwrap_or_default();
            if let Some(parent) = self.scopes.last_mut() {
                parent.extend(orphan);
            }
        }
        DocumentTree {
            blocks: self.scopes.pop().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(source: &str) -> DocumentTree {
        MarkdownConverter::new().convert(source)
    }

    #[test]
    fn test_empty_input() {
        assert!(convert("").is_empty());
        assert!(convert("   \n\n  ").is_empty());
    }

    #[test]
    fn test_heading_and_paragraph() {
        let tree = convert("# Title\n\nBody text.");
        assert_eq!(tree.blocks.len(), 2);
        assert_eq!(
            tree.blocks[0],
            Block::Heading {
                level: 1,
                inlines: vec![Inline::Run(TextRun {
                    text: "Title".to_string(),
                    marks: vec![],
                })],
            }
        );
        assert_eq!(
            tree.blocks[1],
            Block::Paragraph {
                inlines: vec![Inline::Run(TextRun {
                    text: "Body text.".to_string(),
                    marks: vec![],
                })],
            }
        );
    }

    #[test]
    fn test_heading_levels() {
        let tree = convert("### Deep");
        assert_eq!(
            tree.blocks[0],
            Block::Heading {
                level: 3,
                inlines: vec![Inline::Run(TextRun {
                    text: "Deep".to_string(),
                    marks: vec![],
                })],
            }
        );
    }

    #[test]
    fn test_marks() {
        let tree = convert("plain **bold** *italic* ~~gone~~ `code`");
        let Block::Paragraph { inlines } = &tree.blocks[0] else {
            panic!("expected paragraph");
        };
        let marks: Vec<&[Mark]> = inlines
            .iter()
            .map(|i| match i {
                Inline::Run(run) => run.marks.as_slice(),
                other => panic!("unexpected inline: {:?}", other),
            })
            .collect();
        assert_eq!(marks[0], &[] as &[Mark]);
        assert_eq!(marks[1], &[Mark::Bold]);
        assert_eq!(marks[3], &[Mark::Italic]);
        assert_eq!(marks[5], &[Mark::Strikethrough]);
        assert_eq!(marks[7], &[Mark::Code]);
    }

    #[test]
    fn test_link() {
        let tree = convert("see [docs](https://example.com/docs)");
        let Block::Paragraph { inlines } = &tree.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[1],
            Inline::Run(TextRun {
                text: "docs".to_string(),
                marks: vec![Mark::Link {
                    href: "https://example.com/docs".to_string()
                }],
            })
        );
    }

    #[test]
    fn test_image() {
        let tree = convert("![diagram](https://example.com/d.png \"The diagram\")");
        let Block::Paragraph { inlines } = &tree.blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            inlines[0],
            Inline::Image {
                src: "https://example.com/d.png".to_string(),
                alt: "diagram".to_string(),
                title: "The diagram".to_string(),
            }
        );
    }

    #[test]
    fn test_code_block() {
        let tree = convert("```rust\nfn main() {}\n```");
        assert_eq!(
            tree.blocks[0],
            Block::CodeBlock {
                language: Some("rust".to_string()),
                text: "fn main() {}".to_string(),
            }
        );
    }

    #[test]
    fn test_bullet_list() {
        let tree = convert("- one\n- two\n");
        let Block::BulletList { items } = &tree.blocks[0] else {
            panic!("expected bullet list");
        };
        assert_eq!(items.len(), 2);
        // Tight list items still wrap their text into a paragraph.
        assert!(matches!(items[0][0], Block::Paragraph { .. }));
    }

    #[test]
    fn test_ordered_list_start() {
        let tree = convert("3. three\n4. four\n");
        let Block::OrderedList { start, items } = &tree.blocks[0] else {
            panic!("expected ordered list");
        };
        assert_eq!(*start, 3);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_blockquote_nesting() {
        let tree = convert("> quoted\n>\n> more");
        let Block::Blockquote { children } = &tree.blocks[0] else {
            panic!("expected blockquote");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_rule_and_hard_break() {
        let tree = convert("above\n\n---\n\nbelow  \nafter");
        assert_eq!(tree.blocks.len(), 3);
        assert_eq!(tree.blocks[1], Block::HorizontalRule);
        let Block::Paragraph { inlines } = &tree.blocks[2] else {
            panic!("expected paragraph");
        };
        assert!(inlines.contains(&Inline::HardBreak));
    }

    #[test]
    fn test_raw_html_degrades_to_text() {
        let tree = convert("before <span>x</span> after");
        let Block::Paragraph { inlines } = &tree.blocks[0] else {
            panic!("expected paragraph");
        };
        // Adjacent unmarked runs merge, so the HTML survives as text.
        assert_eq!(
            inlines[0],
            Inline::Run(TextRun {
                text: "before <span>x</span> after".to_string(),
                marks: vec![],
            })
        );
    }

    #[test]
    fn test_totality_on_odd_input() {
        // None of these may panic.
        for source in [
            "****",
            "[unclosed](",
            "```\nnever closed",
            "> \n> > \n",
            "#",
            "| not | a | table |",
            "\u{0}\u{1}",
        ] {
            let _ = convert(source);
        }
    }
}
