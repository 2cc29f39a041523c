//! A dynamic R-tree over axis-aligned bounds.
//!
//! Nodes hold between [`MIN_ENTRIES`] and [`MAX_ENTRIES`] entries (the root
//! may hold fewer). Overflowing nodes are split with Guttman's quadratic
//! split; removal dissolves underfull nodes and reinserts their items, so
//! every leaf stays at the same depth.

use core_types::Bounds;

pub const MAX_ENTRIES: usize = 9;
pub const MIN_ENTRIES: usize = 4;

pub trait Indexed {
    fn bounds(&self) -> Bounds;
}

enum Children<T> {
    Leaf(Vec<T>),
    Inner(Vec<Node<T>>),
}

struct Node<T> {
    bounds: Bounds,
    children: Children<T>,
}

impl<T: Indexed> Node<T> {
    fn empty_leaf() -> Self {
        Self {
            bounds: Bounds::EMPTY,
            children: Children::Leaf(Vec::new()),
        }
    }

    fn entry_count(&self) -> usize {
        match &self.children {
            Children::Leaf(items) => items.len(),
            Children::Inner(nodes) => nodes.len(),
        }
    }

    fn recompute_bounds(&mut self) {
        self.bounds = match &self.children {
            Children::Leaf(items) => items.iter().fold(Bounds::EMPTY, |b, i| b.union(&i.bounds())),
            Children::Inner(nodes) => nodes.iter().fold(Bounds::EMPTY, |b, n| b.union(&n.bounds)),
        };
    }

    fn drain_items(self, out: &mut Vec<T>) {
        match self.children {
            Children::Leaf(items) => out.extend(items),
            Children::Inner(nodes) => {
                for n in nodes {
                    n.drain_items(out);
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match &self.children {
            Children::Leaf(_) => 1,
            Children::Inner(nodes) => 1 + nodes.first().map_or(0, Node::depth),
        }
    }
}

/// Split `entries` (one over capacity) into two groups of at least
/// [`MIN_ENTRIES`].
fn quadratic_split<E>(mut entries: Vec<E>, bounds_of: impl Fn(&E) -> Bounds) -> (Vec<E>, Vec<E>) {
    // seeds: the pair that would waste the most area together
    let mut seeds = (0, 1);
    let mut worst = f32::NEG_INFINITY;
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (bounds_of(&entries[i]), bounds_of(&entries[j]));
            let waste = a.union(&b).area() - a.area() - b.area();
            if waste > worst {
                worst = waste;
                seeds = (i, j);
            }
        }
    }
    // remove the higher index first so the lower stays valid
    let seed_b = entries.swap_remove(seeds.1);
    let seed_a = entries.swap_remove(seeds.0);
    let mut bounds_a = bounds_of(&seed_a);
    let mut bounds_b = bounds_of(&seed_b);
    let mut group_a = vec![seed_a];
    let mut group_b = vec![seed_b];

    while !entries.is_empty() {
        if group_a.len() + entries.len() <= MIN_ENTRIES {
            group_a.append(&mut entries);
            break;
        }
        if group_b.len() + entries.len() <= MIN_ENTRIES {
            group_b.append(&mut entries);
            break;
        }

        let mut pick = 0;
        let mut best_diff = f32::NEG_INFINITY;
        for (k, e) in entries.iter().enumerate() {
            let b = bounds_of(e);
            let diff = (bounds_a.enlargement(&b) - bounds_b.enlargement(&b)).abs();
            if diff > best_diff {
                best_diff = diff;
                pick = k;
            }
        }
        let entry = entries.swap_remove(pick);
        let b = bounds_of(&entry);
        let (grow_a, grow_b) = (bounds_a.enlargement(&b), bounds_b.enlargement(&b));
        let to_a = if grow_a != grow_b {
            grow_a < grow_b
        } else if bounds_a.area() != bounds_b.area() {
            bounds_a.area() < bounds_b.area()
        } else {
            group_a.len() <= group_b.len()
        };
        if to_a {
            bounds_a.extend(&b);
            group_a.push(entry);
        } else {
            bounds_b.extend(&b);
            group_b.push(entry);
        }
    }
    (group_a, group_b)
}

fn split_node<T: Indexed>(node: &mut Node<T>) -> Node<T> {
    let sibling_children = match &mut node.children {
        Children::Leaf(items) => {
            let (a, b) = quadratic_split(std::mem::take(items), T::bounds);
            *items = a;
            Children::Leaf(b)
        }
        Children::Inner(nodes) => {
            let (a, b) = quadratic_split(std::mem::take(nodes), |n: &Node<T>| n.bounds);
            *nodes = a;
            Children::Inner(b)
        }
    };
    node.recompute_bounds();
    let mut sibling = Node {
        bounds: Bounds::EMPTY,
        children: sibling_children,
    };
    sibling.recompute_bounds();
    sibling
}

fn choose_subtree<T>(nodes: &[Node<T>], b: &Bounds) -> usize {
    let mut best = 0;
    let mut best_key = (f32::INFINITY, f32::INFINITY);
    for (i, n) in nodes.iter().enumerate() {
        let key = (n.bounds.enlargement(b), n.bounds.area());
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best_key = key;
            best = i;
        }
    }
    best
}

fn insert_into<T: Indexed>(node: &mut Node<T>, item: T, b: Bounds) -> Option<Node<T>> {
    node.bounds.extend(&b);
    match &mut node.children {
        Children::Leaf(items) => items.push(item),
        Children::Inner(nodes) => {
            let idx = choose_subtree(nodes, &b);
            if let Some(sibling) = insert_into(&mut nodes[idx], item, b) {
                nodes.push(sibling);
            }
        }
    }
    (node.entry_count() > MAX_ENTRIES).then(|| split_node(node))
}

fn remove_from<T: Indexed>(
    node: &mut Node<T>,
    hint: Option<&Bounds>,
    pred: &mut dyn FnMut(&T) -> bool,
    removed: &mut Vec<T>,
    orphans: &mut Vec<T>,
) {
    if let Some(h) = hint
        && !node.bounds.intersects(h)
    {
        return;
    }
    match &mut node.children {
        Children::Leaf(items) => {
            let mut k = 0;
            while k < items.len() {
                if pred(&items[k]) {
                    removed.push(items.swap_remove(k));
                } else {
                    k += 1;
                }
            }
        }
        Children::Inner(nodes) => {
            for child in nodes.iter_mut() {
                remove_from(child, hint, pred, removed, orphans);
            }
            let mut k = 0;
            while k < nodes.len() {
                if nodes[k].entry_count() < MIN_ENTRIES {
                    nodes.swap_remove(k).drain_items(orphans);
                } else {
                    k += 1;
                }
            }
        }
    }
    node.recompute_bounds();
}

fn search_in<'a, T: Indexed>(node: &'a Node<T>, b: &Bounds, out: &mut Vec<&'a T>) {
    if !node.bounds.intersects(b) {
        return;
    }
    match &node.children {
        Children::Leaf(items) => out.extend(items.iter().filter(|i| i.bounds().intersects(b))),
        Children::Inner(nodes) => {
            for n in nodes {
                search_in(n, b, out);
            }
        }
    }
}

fn collect_all<'a, T>(node: &'a Node<T>, out: &mut Vec<&'a T>) {
    match &node.children {
        Children::Leaf(items) => out.extend(items.iter()),
        Children::Inner(nodes) => {
            for n in nodes {
                collect_all(n, out);
            }
        }
    }
}

pub struct RTree<T> {
    root: Node<T>,
    len: usize,
}

impl<T: Indexed> Default for RTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Indexed> RTree<T> {
    pub fn new() -> Self {
        Self {
            root: Node::empty_leaf(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Levels from the root down to the leaves.
    pub fn height(&self) -> usize {
        self.root.depth()
    }

    /// Bounds of everything in the tree.
    pub fn bounds(&self) -> Bounds {
        self.root.bounds
    }

    pub fn clear(&mut self) {
        self.root = Node::empty_leaf();
        self.len = 0;
    }

    pub fn insert(&mut self, item: T) {
        let b = item.bounds();
        if let Some(sibling) = insert_into(&mut self.root, item, b) {
            let old = std::mem::replace(&mut self.root, Node::empty_leaf());
            self.root = Node {
                bounds: old.bounds.union(&sibling.bounds),
                children: Children::Inner(vec![old, sibling]),
            };
        }
        self.len += 1;
    }

    /// Remove every item matching `pred`. `hint`, when given, must cover
    /// the bounds of all items to remove; it prunes the walk.
    pub fn remove_where(
        &mut self,
        hint: Option<Bounds>,
        mut pred: impl FnMut(&T) -> bool,
    ) -> Vec<T> {
        let mut removed = Vec::new();
        let mut orphans = Vec::new();
        remove_from(&mut self.root, hint.as_ref(), &mut pred, &mut removed, &mut orphans);

        // shrink the root while it only forwards to one child
        loop {
            let collapse = match &mut self.root.children {
                Children::Inner(nodes) if nodes.len() == 1 => nodes.pop(),
                Children::Inner(nodes) if nodes.is_empty() => Some(Node::empty_leaf()),
                _ => None,
            };
            match collapse {
                Some(child) => self.root = child,
                None => break,
            }
        }

        self.len -= removed.len() + orphans.len();
        for item in orphans {
            self.insert(item);
        }
        removed
    }

    /// Items whose bounds intersect `b` (touching counts).
    pub fn search(&self, b: &Bounds) -> Vec<&T> {
        let mut out = Vec::new();
        search_in(&self.root, b, &mut out);
        out
    }

    pub fn all(&self) -> Vec<&T> {
        let mut out = Vec::with_capacity(self.len);
        collect_all(&self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(u32, Bounds);

    impl Indexed for Item {
        fn bounds(&self) -> Bounds {
            self.1
        }
    }

    fn grid(n: u32) -> Vec<Item> {
        (0..n)
            .map(|i| {
                let x = (i % 10) as f32 * 10.0;
                let y = (i / 10) as f32 * 10.0;
                Item(i, Bounds::new(x, y, x + 5.0, y + 5.0))
            })
            .collect()
    }

    #[test]
    fn splits_keep_everything_findable() {
        let mut tree = RTree::new();
        for item in grid(100) {
            tree.insert(item);
        }
        assert_eq!(tree.len(), 100);
        assert!(tree.height() > 1);
        let hits = tree.search(&Bounds::new(0.0, 0.0, 25.0, 5.0));
        let mut ids: Vec<u32> = hits.iter().map(|i| i.0).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(tree.all().len(), 100);
    }

    #[test]
    fn removal_condenses_and_reinserts() {
        let mut tree = RTree::new();
        for item in grid(100) {
            tree.insert(item);
        }
        let removed = tree.remove_where(None, |i| i.0 % 3 != 0);
        assert_eq!(removed.len(), 66);
        assert_eq!(tree.len(), 34);
        let mut left: Vec<u32> = tree.all().iter().map(|i| i.0).collect();
        left.sort_unstable();
        assert_eq!(left, (0..100).filter(|i| i % 3 == 0).collect::<Vec<_>>());

        let removed = tree.remove_where(None, |_| true);
        assert_eq!(removed.len(), 34);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert!(tree.bounds().is_empty());
    }

    #[test]
    fn hint_limits_removal() {
        let mut tree = RTree::new();
        for item in grid(20) {
            tree.insert(item);
        }
        let removed = tree.remove_where(Some(Bounds::new(0.0, 0.0, 5.0, 5.0)), |_| true);
        assert_eq!(removed, vec![Item(0, Bounds::new(0.0, 0.0, 5.0, 5.0))]);
        assert_eq!(tree.len(), 19);
    }
}
