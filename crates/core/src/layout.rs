use rand::Rng;

use crate::types::Point;

/// Grid of agent portraits on the selection screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentBoxLayout {
    pub top_left: Point,
    pub box_size: i32,
    pub columns: u32,
    pub x_gap: i32,
    pub y_gap: i32,
    /// Click offsets stay at least this far from the box edges.
    pub inset: i32,
}

impl AgentBoxLayout {
    /// Top-left corner of the box at `index` (row-major).
    pub fn coordinate(&self, index: usize) -> Point {
        let cols = self.columns.max(1) as usize;
        let col = (index % cols) as i32;
        let row = (index / cols) as i32;
        Point::new(
            self.top_left.x + col * (self.box_size + self.x_gap),
            self.top_left.y + row * (self.box_size + self.y_gap),
        )
    }

    /// Random point inside the box at `index`, away from its edges.
    pub fn click_point<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Point {
        let origin = self.coordinate(index);
        let lo = self.inset;
        let hi = (self.box_size - self.inset).max(lo);
        Point::new(origin.x + rng.gen_range(lo..=hi), origin.y + rng.gen_range(lo..=hi))
    }
}

/// Position of `target` within the on-screen agent list.
pub fn agent_index(unlocked: &[String], target: &str) -> Option<usize> {
    unlocked.iter().position(|a| a.eq_ignore_ascii_case(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn layout() -> AgentBoxLayout {
        AgentBoxLayout {
            top_left: Point::new(500, 900),
            box_size: 64,
            columns: 9,
            x_gap: 6,
            y_gap: 8,
            inset: 10,
        }
    }

    #[test]
    fn first_box_is_top_left() {
        assert_eq!(layout().coordinate(0), Point::new(500, 900));
    }

    #[test]
    fn index_equal_to_columns_starts_second_row() {
        let l = layout();
        assert_eq!(l.coordinate(l.columns as usize), Point::new(500, 900 + 64 + 8));
        assert_eq!(l.coordinate(1), Point::new(500 + 64 + 6, 900));
    }

    #[test]
    fn coordinates_increase_in_row_major_order() {
        let l = layout();
        for i in 0..40 {
            let a = l.coordinate(i);
            let b = l.coordinate(i + 1);
            assert!((b.y, b.x) > (a.y, a.x), "{i}: {a:?} -> {b:?}");
        }
    }

    #[test]
    fn click_point_stays_inside_inset() {
        let l = layout();
        let mut rng = StdRng::seed_from_u64(3);
        for i in 0..20 {
            let origin = l.coordinate(i);
            let p = l.click_point(i, &mut rng);
            assert!((origin.x + 10..=origin.x + 54).contains(&p.x));
            assert!((origin.y + 10..=origin.y + 54).contains(&p.y));
        }
    }

    #[test]
    fn index_lookup_ignores_case() {
        let list: Vec<String> = ["Brimstone", "Jett", "Sage"].iter().map(|s| s.to_string()).collect();
        assert_eq!(agent_index(&list, "jett"), Some(1));
        assert_eq!(agent_index(&list, "reyna"), None);
    }
}
