//! SCPI command tables.
//!
//! A [`CommandTable`] is an ordered list of (pattern, handler) pairs compiled
//! into a [`HeaderTree`] once, at initialization. The table is immutable
//! after [`TableBuilder::build`] and is meant to be shared (`Arc`) between
//! sessions. The handler type is generic; the engine core binds it to its
//! own handler trait.

#![warn(missing_docs)]

pub mod pattern;
pub mod tree;

pub use pattern::{CommandPattern, MAX_OPTIONAL_SEGMENTS, Segment, SegmentMatch, keyword_matches};
pub use tree::{HeaderMatch, HeaderTree, MatchError, Node};

/// Fatal table construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum InitError {
    /// A registered pattern was empty or whitespace.
    #[error("pattern #{index} is empty")]
    EmptyPattern {
        /// Registration index of the offending entry.
        index: usize,
    },
    /// A pattern could not be parsed.
    #[error("malformed pattern {pattern:?}: {reason}")]
    MalformedPattern {
        /// The pattern as registered.
        pattern: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Two patterns (or two expansions of them) denote the same header.
    #[error("pattern {pattern:?} duplicates {existing:?}")]
    DuplicatePattern {
        /// The later pattern.
        pattern: String,
        /// The earlier pattern it collides with.
        existing: String,
    },
}

/// A compiled table entry.
#[derive(Debug, Clone)]
pub struct Entry<H> {
    /// The parsed pattern.
    pub pattern: CommandPattern,
    /// The bound handler.
    pub handler: H,
}

/// Immutable, compiled command table.
#[derive(Debug, Clone)]
pub struct CommandTable<H> {
    entries: Vec<Entry<H>>,
    tree: HeaderTree,
}

impl<H> CommandTable<H> {
    /// Start an empty builder.
    pub fn builder() -> TableBuilder<H> {
        TableBuilder::default()
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[Entry<H>] {
        &self.entries
    }

    /// The entry at `index`.
    pub fn entry(&self, index: usize) -> Option<&Entry<H>> {
        self.entries.get(index)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match a header, given its mnemonics as received and its query flag.
    pub fn lookup(&self, path: &[&[u8]], query: bool) -> Result<HeaderMatch, MatchError> {
        self.tree.find(path, query)
    }

    /// The compiled header tree.
    pub fn tree(&self) -> &HeaderTree {
        &self.tree
    }
}

/// Collects (pattern, handler) pairs for [`CommandTable`].
#[derive(Debug)]
pub struct TableBuilder<H> {
    pending: Vec<(String, H)>,
}

impl<H> Default for TableBuilder<H> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<H> TableBuilder<H> {
    /// Register a pattern. Earlier registrations win ambiguous matches.
    pub fn command(mut self, pattern: impl Into<String>, handler: H) -> Self {
        self.pending.push((pattern.into(), handler));
        self
    }

    /// Register several patterns at once.
    pub fn commands<P: Into<String>>(mut self, items: impl IntoIterator<Item = (P, H)>) -> Self {
        self.pending
            .extend(items.into_iter().map(|(p, h)| (p.into(), h)));
        self
    }

    /// Number of registered patterns so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Parse and compile every pattern.
    pub fn build(self) -> Result<CommandTable<H>, InitError> {
        let mut entries: Vec<Entry<H>> = Vec::with_capacity(self.pending.len());
        let mut tree = HeaderTree::new();
        for (index, (text, handler)) in self.pending.into_iter().enumerate() {
            if text.trim().is_empty() {
                return Err(InitError::EmptyPattern { index });
            }
            let pattern = CommandPattern::parse(&text)?;
            for path in pattern.expansions() {
                if let Err(existing) = tree.insert(&path, pattern.query, index) {
                    return Err(InitError::DuplicatePattern {
                        pattern: text,
                        existing: entries[existing].pattern.text.clone(),
                    });
                }
            }
            entries.push(Entry { pattern, handler });
        }
        Ok(CommandTable { entries, tree })
    }
}
