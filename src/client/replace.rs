//! Atomic replacement of the shared document's root content.
//!
//! The replace runs as one transaction: delete the root fragment's entire
//! range, then apply an update containing the new content. That update is
//! built against a *freshly created, detached* document rather than in
//! place: materializing assigns structural identifiers, and building
//! directly against the live document could collide with identifiers of
//! content being removed in the same transaction. Building in isolation
//! and merging the encoded result keeps the new content's identifiers
//! independent of whatever was just deleted. This detour is a
//! transaction-safety requirement, not an optimization.

use std::sync::Arc;

use yrs::types::Attrs;
use yrs::updates::decoder::Decode;
use yrs::{
    Any, Doc, ReadTxn, StateVector, Text, Transact, TransactionMut, Update, Xml, XmlElementPrelim,
    XmlFragment, XmlTextPrelim,
};

use crate::convert::{Block, DocumentTree, Inline, Mark};
use crate::error::{Error, Result};

/// Replace the entire content of `fragment_name` in `doc` with `tree`.
///
/// Either the whole replacement is observed by concurrent readers or none
/// of it; the underlying transaction commits on return. Prior content,
/// including its collaborative history markers, is evicted. Errors
/// re-raise so the caller can treat them as fatal rather than risk a
/// partially applied document.
pub fn replace_root_content(doc: &Doc, fragment_name: &str, tree: &DocumentTree) -> Result<()> {
    // Build the new content in a detached document first.
    let staged = Doc::new();
    let staged_root = staged.get_or_insert_xml_fragment(fragment_name);
    {
        let mut txn = staged.transact_mut();
        materialize_blocks(&mut txn, &staged_root, &tree.blocks);
    }
    let update = staged
        .transact()
        .encode_state_as_update_v1(&StateVector::default());
    let update =
        Update::decode_v1(&update).map_err(|e| Error::Replace(format!("staging failed: {}", e)))?;

    // One transaction: evict everything, then merge the staged content.
    let root = doc.get_or_insert_xml_fragment(fragment_name);
    let mut txn = doc.transact_mut();
    let len = root.len(&txn);
    if len > 0 {
        root.remove_range(&mut txn, 0, len);
    }
    txn.apply_update(update)
        .map_err(|e| Error::Replace(format!("apply failed: {}", e)))?;
    Ok(())
}

/// Materialize blocks as children of `parent`, starting at index 0.
fn materialize_blocks<P: XmlFragment>(txn: &mut TransactionMut, parent: &P, blocks: &[Block]) {
    for (index, block) in blocks.iter().enumerate() {
        let index = index as u32;
        match block {
            Block::Paragraph { inlines } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("paragraph"));
                materialize_inlines(txn, &elem, inlines);
            }
            Block::Heading { level, inlines } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("heading"));
                elem.insert_attribute(txn, "level", level.to_string());
                materialize_inlines(txn, &elem, inlines);
            }
            Block::CodeBlock { language, text } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("codeBlock"));
                if let Some(language) = language {
                    elem.insert_attribute(txn, "language", language.as_str());
                }
                elem.insert(txn, 0, XmlTextPrelim::new(text.as_str()));
            }
            Block::Blockquote { children } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("blockquote"));
                materialize_blocks(txn, &elem, children);
            }
            Block::BulletList { items } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("bulletList"));
                materialize_items(txn, &elem, items);
            }
            Block::OrderedList { start, items } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("orderedList"));
                if *start != 1 {
                    elem.insert_attribute(txn, "start", start.to_string());
                }
                materialize_items(txn, &elem, items);
            }
            Block::HorizontalRule => {
                parent.insert(txn, index, XmlElementPrelim::empty("horizontalRule"));
            }
        }
    }
}

fn materialize_items(
    txn: &mut TransactionMut,
    parent: &yrs::XmlElementRef,
    items: &[Vec<Block>],
) {
    for (index, item) in items.iter().enumerate() {
        let elem = parent.insert(txn, index as u32, XmlElementPrelim::empty("listItem"));
        materialize_blocks(txn, &elem, item);
    }
}

/// Materialize inline content. Consecutive text runs share one text node
/// (marks become formatting attributes); breaks and images are siblings.
fn materialize_inlines(txn: &mut TransactionMut, parent: &yrs::XmlElementRef, inlines: &[Inline]) {
    let mut index = 0u32;
    let mut i = 0;
    while i < inlines.len() {
        match &inlines[i] {
            Inline::Run(_) => {
                let text = parent.insert(txn, index, XmlTextPrelim::new(""));
                index += 1;
                let mut offset = 0u32;
                while let Some(Inline::Run(run)) = inlines.get(i) {
                    if run.marks.is_empty() {
                        text.insert(txn, offset, &run.text);
                    } else {
                        text.insert_with_attributes(txn, offset, &run.text, mark_attrs(&run.marks));
                    }
                    offset += run.text.len() as u32;
                    i += 1;
                }
            }
            Inline::HardBreak => {
                parent.insert(txn, index, XmlElementPrelim::empty("hardBreak"));
                index += 1;
                i += 1;
            }
            Inline::Image { src, alt, title } => {
                let elem = parent.insert(txn, index, XmlElementPrelim::empty("image"));
                elem.insert_attribute(txn, "src", src.as_str());
                if !alt.is_empty() {
                    elem.insert_attribute(txn, "alt", alt.as_str());
                }
                if !title.is_empty() {
                    elem.insert_attribute(txn, "title", title.as_str());
                }
                index += 1;
                i += 1;
            }
        }
    }
}

fn mark_attrs(marks: &[Mark]) -> Attrs {
    marks
        .iter()
        .map(|mark| {
            let value = match mark {
                Mark::Link { href } => Any::from(href.as_str()),
                _ => Any::Bool(true),
            };
            (Arc::<str>::from(mark.attr_name()), value)
        })
        .collect()
}
