//! Compiled header tree.
//!
//! Every expansion of every registered pattern is inserted as a path from
//! the root. Nodes are stored in a flat arena and refer to their children by
//! index; each node may terminate a command entry, a query entry, or both.

use serde::Serialize;

use crate::pattern::Segment;

/// Index of the root node.
const ROOT: usize = 0;

/// One node of the header tree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Segment matched by this node (`None` only for the root).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<Segment>,
    /// Child node indices, in insertion order.
    pub children: Vec<usize>,
    /// Table entry for the command form ending here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<usize>,
    /// Table entry for the query form ending here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<usize>,
}

impl Node {
    fn new(segment: Option<Segment>) -> Self {
        Self {
            segment,
            children: Vec::new(),
            command: None,
            query: None,
        }
    }
}

/// A successful header lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMatch {
    /// Index of the matched table entry.
    pub entry: usize,
    /// One slot per numeric-suffix segment on the matched path, in order.
    /// `None` when the input carried no digits.
    pub suffixes: Vec<Option<u32>>,
}

/// Why a header lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum MatchError {
    /// No registered pattern matches the header.
    #[error("undefined header")]
    Undefined,
    /// The header matched, but a numeric suffix was `0` or too large.
    #[error("header suffix out of range")]
    SuffixOutOfRange {
        /// The entry that would otherwise have matched.
        entry: usize,
    },
}

/// Arena-backed tree of header segments.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderTree {
    nodes: Vec<Node>,
}

impl Default for HeaderTree {
    fn default() -> Self {
        Self {
            nodes: vec![Node::new(None)],
        }
    }
}

impl HeaderTree {
    /// Create a tree holding only the root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one expanded path.
    ///
    /// Returns `Err(existing)` if the path and query flag are already bound
    /// to an entry.
    pub fn insert(&mut self, path: &[&Segment], query: bool, entry: usize) -> Result<(), usize> {
        let mut node = ROOT;
        for segment in path {
            let existing = self.nodes[node].children.iter().copied().find(|&child| {
                self.nodes[child]
                    .segment
                    .as_ref()
                    .is_some_and(|s| s.same_node(segment))
            });
            node = match existing {
                Some(child) => child,
                None => {
                    let id = self.nodes.len();
                    let mut segment = (*segment).clone();
                    segment.optional = false;
                    self.nodes.push(Node::new(Some(segment)));
                    self.nodes[node].children.push(id);
                    id
                }
            };
        }
        let n = &mut self.nodes[node];
        let slot = if query { &mut n.query } else { &mut n.command };
        match *slot {
            Some(existing) => Err(existing),
            None => {
                *slot = Some(entry);
                Ok(())
            }
        }
    }

    /// Look up a header given its mnemonics as received.
    ///
    /// All matching paths are considered; the lowest entry index wins.
    pub fn find(&self, path: &[&[u8]], query: bool) -> Result<HeaderMatch, MatchError> {
        let mut best = None;
        let mut captures = Vec::new();
        self.walk(ROOT, path, query, &mut captures, &mut best);
        let (entry, raw) = best.ok_or(MatchError::Undefined)?;
        let suffixes = raw
            .into_iter()
            .map(|digits| match digits {
                None => Ok(None),
                Some(d) => parse_suffix(d)
                    .map(Some)
                    .ok_or(MatchError::SuffixOutOfRange { entry }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(HeaderMatch { entry, suffixes })
    }

    fn walk<'i>(
        &self,
        node: usize,
        rest: &[&'i [u8]],
        query: bool,
        captures: &mut Vec<Option<&'i [u8]>>,
        best: &mut Option<(usize, Vec<Option<&'i [u8]>>)>,
    ) {
        let Some((head, tail)) = rest.split_first() else {
            let n = &self.nodes[node];
            let slot = if query { n.query } else { n.command };
            if let Some(entry) = slot
                && best.as_ref().is_none_or(|(b, _)| entry < *b)
            {
                *best = Some((entry, captures.clone()));
            }
            return;
        };
        for &child in &self.nodes[node].children {
            let Some(segment) = &self.nodes[child].segment else {
                continue;
            };
            let Some(m) = segment.match_mnemonic(head) else {
                continue;
            };
            if segment.numeric_suffix {
                captures.push(m.suffix);
            }
            self.walk(child, tail, query, captures, best);
            if segment.numeric_suffix {
                captures.pop();
            }
        }
    }

    /// All nodes; index 0 is the root.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Decode a numeric suffix. `0` and values beyond `i32::MAX` are rejected.
fn parse_suffix(digits: &[u8]) -> Option<u32> {
    let mut value: u32 = 0;
    for &d in digits {
        value = value.checked_mul(10)?.checked_add(u32::from(d - b'0'))?;
        if value > i32::MAX as u32 {
            return None;
        }
    }
    (value != 0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::CommandPattern;

    fn tree(patterns: &[&str]) -> HeaderTree {
        let mut t = HeaderTree::new();
        for (i, p) in patterns.iter().enumerate() {
            let p = CommandPattern::parse(p).unwrap();
            for path in p.expansions() {
                t.insert(&path, p.query, i).unwrap();
            }
        }
        t
    }

    fn words(header: &str) -> Vec<&[u8]> {
        header.split(':').map(str::as_bytes).collect()
    }

    #[test]
    fn finds_command_and_query_separately() {
        let t = tree(&["TEST:INT32", "TEST:INT32?"]);
        assert_eq!(t.find(&words("test:int32"), false).unwrap().entry, 0);
        assert_eq!(t.find(&words("TEST:INT32"), true).unwrap().entry, 1);
    }

    #[test]
    fn shared_prefix_nodes() {
        let t = tree(&["SYSTem:ERRor?", "SYSTem:VERSion?"]);
        // root, SYST, ERR, VERS
        assert_eq!(t.nodes().len(), 4);
    }

    #[test]
    fn numeric_suffixes_are_captured() {
        let t = tree(&["TEST#:NUMbers#"]);
        let m = t.find(&words("TEST3:NUMBERS5"), false).unwrap();
        assert_eq!(m.suffixes, vec![Some(3), Some(5)]);
        let m = t.find(&words("test:num12"), false).unwrap();
        assert_eq!(m.suffixes, vec![None, Some(12)]);
    }

    #[test]
    fn zero_or_huge_suffix_is_out_of_range() {
        let t = tree(&["TEST#:NUMbers#"]);
        assert_eq!(
            t.find(&words("TEST0:NUM1"), false),
            Err(MatchError::SuffixOutOfRange { entry: 0 })
        );
        assert_eq!(
            t.find(&words("TEST1:NUM2147483648"), false),
            Err(MatchError::SuffixOutOfRange { entry: 0 })
        );
        assert!(t.find(&words("TEST1:NUM2147483647"), false).is_ok());
    }

    #[test]
    fn undefined_header() {
        let t = tree(&["MEASure:VOLTage?"]);
        assert_eq!(t.find(&words("MEAS:CURR"), true), Err(MatchError::Undefined));
        assert_eq!(t.find(&words("MEAS"), true), Err(MatchError::Undefined));
        assert_eq!(t.find(&words("MEASU:VOLT"), true), Err(MatchError::Undefined));
    }

    #[test]
    fn optional_segments_match_both_ways() {
        let t = tree(&["SYSTem:ERRor[:NEXT]?"]);
        assert_eq!(t.find(&words("SYST:ERR"), true).unwrap().entry, 0);
        assert_eq!(t.find(&words("syst:err:next"), true).unwrap().entry, 0);
    }

    #[test]
    fn first_registered_wins_on_ambiguity() {
        // Both patterns accept "CH1".
        let t = tree(&["CHannel#?", "CH1?"]);
        assert_eq!(t.find(&words("CH1"), true).unwrap().entry, 0);
        let t = tree(&["CH1?", "CHannel#?"]);
        assert_eq!(t.find(&words("CH1"), true).unwrap().entry, 0);
        assert_eq!(t.find(&words("CH2"), true).unwrap().entry, 1);
    }

    #[test]
    fn duplicate_insert_reports_existing_entry() {
        let mut t = HeaderTree::new();
        let a = CommandPattern::parse("A:B").unwrap();
        let b = CommandPattern::parse("A:Bee").unwrap();
        t.insert(&a.expansions()[0], false, 0).unwrap();
        // "A:Bee" has short form "B" but a different long form: distinct node.
        assert!(t.insert(&b.expansions()[0], false, 1).is_ok());
        assert_eq!(t.insert(&a.expansions()[0], false, 2), Err(0));
    }

    #[test]
    fn suffix_parsing() {
        assert_eq!(parse_suffix(b"1"), Some(1));
        assert_eq!(parse_suffix(b"007"), Some(7));
        assert_eq!(parse_suffix(b"0"), None);
        assert_eq!(parse_suffix(b"2147483647"), Some(2_147_483_647));
        assert_eq!(parse_suffix(b"99999999999"), None);
    }
}
