use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnergyUnit {
    #[default]
    KcalPerMol,
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KcalPerMol => write!(f, "KCAL/MOL"),
        }
    }
}

/// The energy computed for one conformer frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRecord {
    pub frame: usize,
    pub energy: f64,
    pub unit: EnergyUnit,
}

impl EnergyRecord {
    pub fn new(frame: usize, energy: f64) -> Self {
        Self {
            frame,
            energy,
            unit: EnergyUnit::KcalPerMol,
        }
    }
}

/// Selects the record with the algebraically smallest energy.
///
/// Ties keep the first record encountered; `NaN` energies never win.
pub fn lowest_energy<'a, I>(records: I) -> Option<EnergyRecord>
where
    I: IntoIterator<Item = &'a EnergyRecord>,
{
    records
        .into_iter()
        .filter(|r| !r.energy.is_nan())
        .fold(None, |best: Option<EnergyRecord>, r| match best {
            Some(b) if b.energy <= r.energy => Some(b),
            _ => Some(*r),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowest_energy_selects_algebraically_smallest_value() {
        let records = [
            EnergyRecord::new(1, -40.2),
            EnergyRecord::new(2, -41.5),
            EnergyRecord::new(3, -39.9),
        ];
        let best = lowest_energy(&records).unwrap();
        assert_eq!(best.frame, 2);
        assert_eq!(best.energy, -41.5);
    }

    #[test]
    fn lowest_energy_keeps_first_of_equal_records() {
        let records = [EnergyRecord::new(4, -10.0), EnergyRecord::new(2, -10.0)];
        assert_eq!(lowest_energy(&records).unwrap().frame, 4);
    }

    #[test]
    fn lowest_energy_ignores_nan() {
        let records = [EnergyRecord::new(1, f64::NAN), EnergyRecord::new(2, 5.0)];
        assert_eq!(lowest_energy(&records).unwrap().frame, 2);
    }

    #[test]
    fn lowest_energy_of_nothing_is_none() {
        assert!(lowest_energy(&[]).is_none());
    }

    #[test]
    fn unit_displays_like_mopac() {
        assert_eq!(EnergyUnit::KcalPerMol.to_string(), "KCAL/MOL");
    }
}
