/// Vibrational frequencies (cm**-1) in the order the engine printed them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyReport {
    pub frequencies: Vec<f64>,
}

impl FrequencyReport {
    pub fn new(frequencies: Vec<f64>) -> Self {
        Self { frequencies }
    }

    pub fn negatives(&self) -> impl Iterator<Item = f64> + '_ {
        self.frequencies.iter().copied().filter(|f| *f < 0.0)
    }

    pub fn negative_count(&self) -> usize {
        self.negatives().count()
    }

    /// The most negative frequency, if any is negative.
    pub fn minimum_negative(&self) -> Option<f64> {
        self.negatives().reduce(f64::min)
    }

    pub fn has_negative(&self) -> bool {
        self.negatives().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negatives_are_derived_from_frequencies() {
        let report = FrequencyReport::new(vec![-15.3, 200.1, -42.0, 450.0]);
        assert!(report.has_negative());
        assert_eq!(report.negative_count(), 2);
        assert_eq!(report.minimum_negative(), Some(-42.0));
    }

    #[test]
    fn zero_is_not_negative() {
        let report = FrequencyReport::new(vec![0.0, 0.0, 12.0]);
        assert!(!report.has_negative());
        assert_eq!(report.minimum_negative(), None);
    }
}
