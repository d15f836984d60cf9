use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Unlock and selection data owned by the save file. The engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    /// Unlocked agents in on-screen order.
    pub unlocked: Vec<String>,
    pub random_eligible: BTreeSet<String>,
    /// map name -> agent
    pub map_assignments: BTreeMap<String, String>,
    pub selected: String,
}

impl Roster {
    /// Unlocked agents flagged for random selection, in on-screen order.
    pub fn eligible_random(&self) -> Vec<String> {
        self.unlocked
            .iter()
            .filter(|a| self.random_eligible.iter().any(|e| e.eq_ignore_ascii_case(a)))
            .cloned()
            .collect()
    }

    /// Agent assigned to `map`, falling back to the fixed selection.
    pub fn target_for_map(&self, map: &str) -> &str {
        self.map_assignments
            .iter()
            .find(|(m, _)| m.eq_ignore_ascii_case(map))
            .map(|(_, a)| a.as_str())
            .unwrap_or(&self.selected)
    }

    /// Flag or unflag `agent`. Names compare case-insensitively, so a
    /// hand-edited "Sage" is cleared by toggling "sage".
    pub fn toggle_random_eligible(&mut self, agent: &str) {
        let before = self.random_eligible.len();
        self.random_eligible.retain(|e| !e.eq_ignore_ascii_case(agent));
        if self.random_eligible.len() == before {
            self.random_eligible.insert(agent.to_string());
        }
    }
}

/// Remaining candidates for exclusive random selection.
#[derive(Debug, Default, Clone)]
pub struct RandomPool {
    remaining: Vec<String>,
}

impl RandomPool {
    /// Pick an agent from `eligible`. In exclusive mode the pick leaves the
    /// pool, and an exhausted pool refills from the full eligible set.
    pub fn draw<R: Rng + ?Sized>(&mut self, eligible: &[String], exclusive: bool, rng: &mut R) -> Option<String> {
        if !exclusive {
            return eligible.choose(rng).cloned();
        }

        self.remaining.retain(|a| eligible.contains(a));
        if self.remaining.is_empty() {
            self.remaining = eligible.to_vec();
        }
        if self.remaining.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.remaining.len());
        Some(self.remaining.swap_remove(idx))
    }

    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn roster() -> Roster {
        Roster {
            unlocked: names(&["brimstone", "jett", "phoenix", "sage", "sova"]),
            random_eligible: ["sova", "jett", "viper"].iter().map(|s| s.to_string()).collect(),
            map_assignments: BTreeMap::from([("Ascent".to_string(), "sova".to_string())]),
            selected: "jett".into(),
        }
    }

    #[test]
    fn eligible_is_unlocked_and_flagged() {
        // viper is flagged but locked
        assert_eq!(roster().eligible_random(), names(&["jett", "sova"]));
    }

    #[test]
    fn map_assignment_falls_back_to_selection() {
        let r = roster();
        assert_eq!(r.target_for_map("ascent"), "sova");
        assert_eq!(r.target_for_map("Bind"), "jett");
    }

    #[test]
    fn exclusive_draw_excludes_last_pick_until_refill() {
        let eligible = names(&["a", "b", "c"]);
        let mut pool = RandomPool::default();
        let mut rng = StdRng::seed_from_u64(11);

        let first = pool.draw(&eligible, true, &mut rng).unwrap();
        assert!(!pool.remaining().contains(&first));
        assert_eq!(pool.remaining().len(), 2);

        let second = pool.draw(&eligible, true, &mut rng).unwrap();
        let third = pool.draw(&eligible, true, &mut rng).unwrap();
        let mut seen = vec![first, second, third];
        seen.sort();
        assert_eq!(seen, eligible);
        assert!(pool.remaining().is_empty());

        // exhausted: refilled from the full set before drawing
        pool.draw(&eligible, true, &mut rng).unwrap();
        assert_eq!(pool.remaining().len(), 2);
    }

    #[test]
    fn pool_drops_agents_that_stop_being_eligible() {
        let mut pool = RandomPool::default();
        let mut rng = StdRng::seed_from_u64(5);
        pool.draw(&names(&["a", "b", "c", "d"]), true, &mut rng);
        let pick = pool.draw(&names(&["a"]), true, &mut rng).unwrap();
        assert_eq!(pick, "a");
    }

    #[test]
    fn empty_eligible_set_draws_nothing() {
        let mut pool = RandomPool::default();
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(pool.draw(&[], true, &mut rng), None);
        assert_eq!(pool.draw(&[], false, &mut rng), None);
    }

    #[test]
    fn toggling_eligibility() {
        let mut r = roster();
        r.toggle_random_eligible("sage");
        assert!(r.eligible_random().contains(&"sage".to_string()));
        r.toggle_random_eligible("sage");
        assert!(!r.eligible_random().contains(&"sage".to_string()));
    }

    #[test]
    fn toggling_clears_a_differently_cased_entry() {
        let mut r = roster();
        r.random_eligible.insert("Sage".into());
        assert!(r.eligible_random().contains(&"sage".to_string()));
        r.toggle_random_eligible("sage");
        assert!(r.random_eligible.iter().all(|e| !e.eq_ignore_ascii_case("sage")));
        assert!(!r.eligible_random().contains(&"sage".to_string()));
    }
}
