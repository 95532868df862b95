//! Physical memory map.
//!
//! An interval tree mapping physical address ranges to device handlers.
//! Ranges never overlap, insertion happens only during initialisation, and
//! `resolve` is the hot read-only path, so the structure is a classic
//! red-black tree keyed by range start: nodes live in an arena and link by
//! index, lookups are O(log n), and the node count is unbounded.

use crate::common::SimError;
use crate::soc::devices::DeviceId;

/// Sentinel index standing in for the nil leaf.
const NIL: usize = usize::MAX;

/// One mapped range and the device that claims it.
#[derive(Clone, Copy, Debug)]
pub struct Mapping {
    /// First physical address of the range.
    pub start: u32,
    /// Length of the range in bytes.
    pub length: u32,
    /// One past the last physical address of the range.
    pub end: u32,
    /// The device serving this range.
    pub device: DeviceId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
struct Node {
    mapping: Mapping,
    left: usize,
    right: usize,
    parent: usize,
    color: Color,
}

/// The memory map: a red-black interval tree over device ranges.
#[derive(Debug)]
pub struct MemoryMap {
    nodes: Vec<Node>,
    root: usize,
}

impl MemoryMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NIL,
        }
    }

    /// Maps `[start, start + length)` to `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MapOverlap`] when the range intersects an
    /// existing mapping.
    pub fn map(&mut self, start: u32, length: u32, device: DeviceId) -> Result<(), SimError> {
        let end = start + length;
        if self.overlaps(start, end) {
            return Err(SimError::MapOverlap(start));
        }

        let idx = self.nodes.len();
        self.nodes.push(Node {
            mapping: Mapping {
                start,
                length,
                end,
                device,
            },
            left: NIL,
            right: NIL,
            parent: NIL,
            color: Color::Red,
        });

        // Ordinary BST insertion keyed by start.
        let mut parent = NIL;
        let mut cur = self.root;
        while cur != NIL {
            parent = cur;
            cur = if start < self.nodes[cur].mapping.start {
                self.nodes[cur].left
            } else {
                self.nodes[cur].right
            };
        }
        self.nodes[idx].parent = parent;
        if parent == NIL {
            self.root = idx;
        } else if start < self.nodes[parent].mapping.start {
            self.nodes[parent].left = idx;
        } else {
            self.nodes[parent].right = idx;
        }

        self.insert_fixup(idx);
        Ok(())
    }

    /// Finds the unique mapping containing `address`, if any.
    pub fn resolve(&self, address: u32) -> Option<&Mapping> {
        let mut cur = self.root;
        while cur != NIL {
            let m = &self.nodes[cur].mapping;
            if address < m.start {
                cur = self.nodes[cur].left;
            } else if address >= m.end {
                cur = self.nodes[cur].right;
            } else {
                return Some(m);
            }
        }
        None
    }

    /// True when `[start, end)` intersects any existing range. Ranges are
    /// disjoint, so it suffices to examine the mapping with the greatest
    /// start below `end`.
    fn overlaps(&self, start: u32, end: u32) -> bool {
        let mut cur = self.root;
        let mut candidate = None;
        while cur != NIL {
            let m = &self.nodes[cur].mapping;
            if m.start < end {
                candidate = Some(m);
                cur = self.nodes[cur].right;
            } else {
                cur = self.nodes[cur].left;
            }
        }
        candidate.is_some_and(|m| m.end > start)
    }

    fn rotate_left(&mut self, x: usize) {
        let y = self.nodes[x].right;
        self.nodes[x].right = self.nodes[y].left;
        if self.nodes[y].left != NIL {
            let l = self.nodes[y].left;
            self.nodes[l].parent = x;
        }
        self.nodes[y].parent = self.nodes[x].parent;
        let p = self.nodes[x].parent;
        if p == NIL {
            self.root = y;
        } else if self.nodes[p].left == x {
            self.nodes[p].left = y;
        } else {
            self.nodes[p].right = y;
        }
        self.nodes[y].left = x;
        self.nodes[x].parent = y;
    }

    fn rotate_right(&mut self, x: usize) {
        let y = self.nodes[x].left;
        self.nodes[x].left = self.nodes[y].right;
        if self.nodes[y].right != NIL {
            let r = self.nodes[y].right;
            self.nodes[r].parent = x;
        }
        self.nodes[y].parent = self.nodes[x].parent;
        let p = self.nodes[x].parent;
        if p == NIL {
            self.root = y;
        } else if self.nodes[p].right == x {
            self.nodes[p].right = y;
        } else {
            self.nodes[p].left = y;
        }
        self.nodes[y].right = x;
        self.nodes[x].parent = y;
    }

    /// Restores the red-black invariants after inserting `z` as a red node.
    fn insert_fixup(&mut self, mut z: usize) {
        while {
            let p = self.nodes[z].parent;
            p != NIL && self.nodes[p].color == Color::Red
        } {
            let parent = self.nodes[z].parent;
            let grand = self.nodes[parent].parent;
            if self.nodes[grand].left == parent {
                let uncle = self.nodes[grand].right;
                if uncle != NIL && self.nodes[uncle].color == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    z = grand;
                } else {
                    if self.nodes[parent].right == z {
                        z = parent;
                        self.rotate_left(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grand = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    self.rotate_right(grand);
                }
            } else {
                let uncle = self.nodes[grand].left;
                if uncle != NIL && self.nodes[uncle].color == Color::Red {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    z = grand;
                } else {
                    if self.nodes[parent].left == z {
                        z = parent;
                        self.rotate_right(z);
                    }
                    let parent = self.nodes[z].parent;
                    let grand = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grand].color = Color::Red;
                    self.rotate_left(grand);
                }
            }
        }
        let root = self.root;
        self.nodes[root].color = Color::Black;
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}
