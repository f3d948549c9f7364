/*!
# Edit Queue

Textual rewrites are recorded against byte offsets of the original buffer
and applied in one pass at the end. Nothing touches the buffer while a
translation unit is being scanned, so spans computed from the syntax tree
stay valid for the whole run.

## Ordering

Edits are applied in offset order. At the same offset:

1. `InsertAfter` text (it belongs to whatever ends at the offset)
2. `InsertBefore` text (it belongs to whatever starts at the offset)
3. the `Replace` that starts at the offset

Ties within a class keep creation order. Replacements must not overlap one
another, and no insertion may fall strictly inside a replaced range.

## Nested rendering

A replacement whose text is built from a sub-range that itself contains
edits (`obj.getIn().setV( 5 )` from `obj.in.v = 5`) is rendered by moving
the inner edits into a local queue with [`EditQueue::partition`] and
applying them to the sub-range text only.
*/

use thiserror::Error;

use crate::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Replace,
    InsertBefore,
    InsertAfter,
}

impl EditKind {
    fn order(self) -> u8 {
        match self {
            Self::InsertAfter => 0,
            Self::InsertBefore => 1,
            Self::Replace => 2,
        }
    }
}

/// One queued edit. Insertions carry an empty span at their offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub span: Span,
    pub kind: EditKind,
    pub text: String,
}

impl PendingEdit {
    pub fn offset(&self) -> usize {
        self.span.start
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("edit at {second} overlaps replaced range {first}")]
    Overlap { first: Span, second: Span },

    #[error("edit at {span} is outside the buffer ({base}..{end})")]
    OutOfBounds { span: Span, base: usize, end: usize },
}

/// Ordered collection of pending edits for one buffer
#[derive(Debug, Clone, Default)]
pub struct EditQueue {
    edits: Vec<PendingEdit>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(PendingEdit {
            span,
            kind: EditKind::Replace,
            text: text.into(),
        });
    }

    pub fn insert_before(&mut self, offset: usize, text: impl Into<String>) {
        self.edits.push(PendingEdit {
            span: Span::new(offset, offset),
            kind: EditKind::InsertBefore,
            text: text.into(),
        });
    }

    pub fn insert_after(&mut self, offset: usize, text: impl Into<String>) {
        self.edits.push(PendingEdit {
            span: Span::new(offset, offset),
            kind: EditKind::InsertAfter,
            text: text.into(),
        });
    }

    pub fn extend(&mut self, other: EditQueue) {
        self.edits.extend(other.edits);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingEdit> {
        self.edits.iter()
    }

    /// Split into edits that belong inside `span` and everything else.
    ///
    /// A replacement is inside when its range is contained in `span`; an
    /// insertion only when it falls strictly between the ends, since text
    /// inserted at either boundary attaches to the surrounding code.
    pub fn partition(self, span: Span) -> (EditQueue, EditQueue) {
        let (inner, outer): (Vec<_>, Vec<_>) = self.edits.into_iter().partition(|edit| match edit.kind {
            EditKind::Replace => span.contains(edit.span),
            EditKind::InsertBefore | EditKind::InsertAfter => {
                span.start < edit.offset() && edit.offset() < span.end
            }
        });
        (EditQueue { edits: inner }, EditQueue { edits: outer })
    }

    /// Apply every edit to `source`, whose first byte sits at offset `base`
    /// of the buffer the spans were computed against.
    pub fn apply(&self, source: &str, base: usize) -> Result<String, SpliceError> {
        let end = base + source.len();
        let mut ordered: Vec<&PendingEdit> = self.edits.iter().collect();
        ordered.sort_by_key(|edit| (edit.offset(), edit.kind.order()));

        let mut out = String::with_capacity(source.len() + self.edits.iter().map(|e| e.text.len()).sum::<usize>());
        let mut cursor = base;
        let mut last_replace: Option<Span> = None;

        for edit in ordered {
            if edit.span.start < base
                || edit.span.end > end
                || !source.is_char_boundary(edit.span.start - base)
                || !source.is_char_boundary(edit.span.end - base)
            {
                return Err(SpliceError::OutOfBounds {
                    span: edit.span,
                    base,
                    end,
                });
            }
            if let Some(previous) = last_replace {
                let collides = match edit.kind {
                    EditKind::Replace => edit.span.start < previous.end,
                    EditKind::InsertBefore | EditKind::InsertAfter => edit.offset() < previous.end,
                };
                if collides {
                    return Err(SpliceError::Overlap {
                        first: previous,
                        second: edit.span,
                    });
                }
            }

            out.push_str(&source[cursor - base..edit.span.start - base]);
            out.push_str(&edit.text);
            cursor = edit.span.start;
            if edit.kind == EditKind::Replace {
                cursor = edit.span.end;
                last_replace = Some(edit.span);
            }
        }
        out.push_str(&source[cursor - base..]);
        Ok(out)
    }
}
