use core_types::Bounds;
use proptest::prelude::*;
use spatial::{Indexed, RTree, SpatialIndex};

#[derive(Clone, Debug, PartialEq)]
struct Boxed(usize, Bounds);

impl Indexed for Boxed {
    fn bounds(&self) -> Bounds {
        self.1
    }
}

fn arb_bounds() -> impl Strategy<Value = Bounds> {
    (0.0f32..500.0, 0.0f32..500.0, 1.0f32..60.0, 1.0f32..60.0)
        .prop_map(|(x, y, w, h)| Bounds::new(x, y, x + w, y + h))
}

proptest! {
    #[test]
    fn search_matches_linear_scan(
        boxes in prop::collection::vec(arb_bounds(), 0..120),
        query in arb_bounds(),
        remove_every in 2usize..5,
    ) {
        let mut tree = RTree::new();
        for (i, b) in boxes.iter().enumerate() {
            tree.insert(Boxed(i, *b));
        }
        tree.remove_where(None, |item| item.0 % remove_every == 0);

        let mut got: Vec<usize> = tree.search(&query).iter().map(|b| b.0).collect();
        got.sort_unstable();
        let want: Vec<usize> = boxes
            .iter()
            .enumerate()
            .filter(|(i, b)| i % remove_every != 0 && b.intersects(&query))
            .map(|(i, _)| i)
            .collect();
        prop_assert_eq!(got, want);
        prop_assert_eq!(tree.len(), boxes.len() - boxes.len().div_ceil(remove_every));
    }

    #[test]
    fn index_stays_consistent_after_updates(
        boxes in prop::collection::vec(arb_bounds(), 1..60),
    ) {
        let mut index = SpatialIndex::new();
        for (i, b) in boxes.iter().enumerate() {
            index.insert(&i.to_string(), vec![b.to_rect()]);
        }
        // move every other annotation far away
        for (i, b) in boxes.iter().enumerate().filter(|(i, _)| i % 2 == 1) {
            let moved = b.to_rect().translate(1000.0, 1000.0);
            index.update(&i.to_string(), vec![moved]);
        }
        prop_assert_eq!(index.len(), boxes.len());
        prop_assert_eq!(index.entry_count(), boxes.len());
        for (i, b) in boxes.iter().enumerate() {
            let (cx, cy) = ((b.min_x + b.max_x) / 2.0, (b.min_y + b.max_y) / 2.0);
            let (x, y) = if i % 2 == 1 { (cx + 1000.0, cy + 1000.0) } else { (cx, cy) };
            let id = i.to_string();
            prop_assert!(index.get_at_all(x, y).contains(&id));
        }
    }
}
