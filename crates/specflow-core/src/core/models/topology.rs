use std::ops::Index;

/// The ordered atom labels of a molecule.
///
/// Atom order is canonical: every frame, job file and coordinate block produced downstream
/// lists atoms in exactly this order. A topology never changes after it has been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    labels: Vec<String>,
}

impl Topology {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn atom_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Index<usize> for Topology {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        &self.labels[index]
    }
}

impl<S: Into<String>> FromIterator<S> for Topology {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_preserves_label_order() {
        let topology: Topology = ["C1", "H1", "O"].into_iter().collect();
        assert_eq!(topology.atom_count(), 3);
        assert_eq!(&topology[0], "C1");
        assert_eq!(&topology[2], "O");
        assert_eq!(topology.iter().collect::<Vec<_>>(), vec!["C1", "H1", "O"]);
    }

    #[test]
    fn empty_topology_reports_zero_atoms() {
        let topology = Topology::default();
        assert!(topology.is_empty());
        assert_eq!(topology.atom_count(), 0);
    }
}
