/// Debounces a noisy boolean signal into a single trusted event.
///
/// Each screen check owns one of these with its own threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationCounter {
    current: u32,
    required: u32,
}

impl ConfirmationCounter {
    pub fn new(required: u32) -> Self {
        Self { current: 0, required: required.max(1) }
    }

    /// Feed one sample. Returns true exactly on the sample that makes the
    /// run of consecutive matches reach `required`.
    pub fn record(&mut self, matched: bool) -> bool {
        if matched {
            self.current = self.current.saturating_add(1);
        } else {
            self.current = 0;
        }
        self.current == self.required
    }

    pub fn reset(&mut self) {
        self.current = 0;
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    /// The run has reached (or passed) the threshold.
    pub fn is_confirmed(&self) -> bool {
        self.current >= self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_on_the_required_sample_only() {
        let mut c = ConfirmationCounter::new(3);
        assert!(!c.record(true));
        assert!(!c.record(true));
        assert!(c.record(true));
        assert!(!c.record(true));
        assert!(c.is_confirmed());
    }

    #[test]
    fn false_resets_immediately() {
        let mut c = ConfirmationCounter::new(2);
        c.record(true);
        assert!(!c.record(false));
        assert_eq!(c.current(), 0);
        assert!(!c.record(true));
        assert!(c.record(true));
    }

    #[test]
    fn matches_reference_over_all_short_sequences() {
        // every boolean sequence up to length 8, thresholds 1..=4
        for required in 1..=4u32 {
            for len in 1..=8u32 {
                for bits in 0..(1u32 << len) {
                    let seq: Vec<bool> = (0..len).map(|i| bits & (1 << i) != 0).collect();
                    let mut c = ConfirmationCounter::new(required);
                    let mut fired = false;
                    for &b in &seq {
                        fired = c.record(b);
                    }
                    let trailing = seq.iter().rev().take_while(|b| **b).count() as u32;
                    assert_eq!(fired, trailing == required, "{seq:?} req={required}");
                    assert_eq!(c.is_confirmed(), trailing >= required);
                    if !seq[seq.len() - 1] {
                        assert_eq!(c.current(), 0);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let mut c = ConfirmationCounter::new(0);
        assert_eq!(c.required(), 1);
        assert!(c.record(true));
    }
}
