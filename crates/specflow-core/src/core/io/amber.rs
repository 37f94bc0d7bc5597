use crate::core::io::traits::FormatReader;
use crate::core::models::frame::{Trajectory, TrajectoryError};
use crate::core::models::topology::Topology;
use std::io::{self, BufRead};
use thiserror::Error;

pub const ATOM_NAME_FLAG: &str = "%FLAG ATOM_NAME";
pub const CHARGE_FLAG: &str = "%FLAG CHARGE";
pub const DEFAULT_TITLE_PREFIX: &str = "INT";

#[derive(Debug, Error)]
pub enum AmberError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Missing required section: {0}")]
    MissingSection(&'static str),
    #[error("Section '{end}' (line {end_line}) appears before '{start}' (line {start_line})")]
    SectionOrder {
        start: &'static str,
        start_line: usize,
        end: &'static str,
        end_line: usize,
    },
    #[error("Section '{0}' lists no atoms")]
    EmptySection(&'static str),
    #[error("Invalid coordinate token '{token}' on line {line}")]
    InvalidToken { line: usize, token: String },
    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),
}

/// Reads the atom labels of an AMBER parameter/topology (`.prmtop`) file.
///
/// Labels are the whitespace-separated tokens of every line between the `%FLAG ATOM_NAME`
/// and `%FLAG CHARGE` headers. `%`-prefixed directive lines inside the section, such as
/// the `%FORMAT(20a4)` descriptor, are not labels.
pub struct PrmtopFile;

impl FormatReader for PrmtopFile {
    type Output = Topology;
    type Error = AmberError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;

        let find = |flag: &str| lines.iter().position(|l| l.trim().starts_with(flag));
        let start = find(ATOM_NAME_FLAG).ok_or(AmberError::MissingSection(ATOM_NAME_FLAG))?;
        let end = find(CHARGE_FLAG).ok_or(AmberError::MissingSection(CHARGE_FLAG))?;
        if end <= start {
            return Err(AmberError::SectionOrder {
                start: ATOM_NAME_FLAG,
                start_line: start + 1,
                end: CHARGE_FLAG,
                end_line: end + 1,
            });
        }

        let labels: Vec<String> = lines[start + 1..end]
            .iter()
            .filter(|l| !l.trim_start().starts_with('%'))
            .flat_map(|l| l.split_whitespace())
            .map(str::to_string)
            .collect();

        if labels.is_empty() {
            return Err(AmberError::EmptySection(ATOM_NAME_FLAG));
        }
        Ok(Topology::new(labels))
    }
}

/// Reads an ASCII AMBER trajectory (`.mdcrd`) against a known topology.
///
/// The file is treated as a stream of floating-point tokens regardless of line layout.
/// Title records are recognised by `title_prefix` and skipped wherever they appear.
pub struct MdcrdFile<'a> {
    topology: &'a Topology,
    title_prefix: &'a str,
}

impl<'a> MdcrdFile<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self {
            topology,
            title_prefix: DEFAULT_TITLE_PREFIX,
        }
    }

    pub fn with_title_prefix(mut self, prefix: &'a str) -> Self {
        self.title_prefix = prefix;
        self
    }
}

impl FormatReader for MdcrdFile<'_> {
    type Output = Trajectory;
    type Error = AmberError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut values = Vec::new();
        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if !self.title_prefix.is_empty() && line.starts_with(self.title_prefix) {
                continue;
            }
            for token in line.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| AmberError::InvalidToken {
                    line: line_num + 1,
                    token: token.to_string(),
                })?;
                values.push(value);
            }
        }
        Ok(Trajectory::from_flat(self.topology.clone(), &values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    const PRMTOP: &str = "\
%VERSION  VERSION_STAMP = V0001.000  DATE = 05/22/24  12:00:00
%FLAG TITLE
%FORMAT(20a4)
INT
%FLAG POINTERS
%FORMAT(10I8)
       3       2
%FLAG ATOM_NAME
%FORMAT(20a4)
O1  H1  H2
%FLAG CHARGE
%FORMAT(5E16.8)
 -1.51973982E+01  7.59869910E+00  7.59869910E+00
";

    fn water() -> Topology {
        ["O1", "H1", "H2"].into_iter().collect()
    }

    #[test]
    fn prmtop_labels_are_read_between_headers() {
        let topology = PrmtopFile.read_from_str(PRMTOP).unwrap();
        assert_eq!(topology, water());
    }

    #[test]
    fn prmtop_labels_may_span_several_lines() {
        let text = "%FLAG ATOM_NAME\n%FORMAT(20a4)\nC1  C2\nH1\n%FLAG CHARGE\n";
        let topology = PrmtopFile.read_from_str(text).unwrap();
        assert_eq!(topology.labels(), ["C1", "C2", "H1"]);
    }

    #[test]
    fn prmtop_without_atom_names_fails() {
        let result = PrmtopFile.read_from_str("%FLAG CHARGE\n 0.0\n");
        assert!(matches!(
            result,
            Err(AmberError::MissingSection(ATOM_NAME_FLAG))
        ));
    }

    #[test]
    fn prmtop_without_charge_terminator_fails() {
        let result = PrmtopFile.read_from_str("%FLAG ATOM_NAME\nC1\n");
        assert!(matches!(result, Err(AmberError::MissingSection(CHARGE_FLAG))));
    }

    #[test]
    fn prmtop_with_reversed_sections_fails() {
        let result = PrmtopFile.read_from_str("%FLAG CHARGE\n0.0\n%FLAG ATOM_NAME\nC1\n");
        assert!(matches!(result, Err(AmberError::SectionOrder { .. })));
    }

    #[test]
    fn prmtop_with_empty_section_fails() {
        let result = PrmtopFile.read_from_str("%FLAG ATOM_NAME\n%FORMAT(20a4)\n%FLAG CHARGE\n");
        assert!(matches!(result, Err(AmberError::EmptySection(_))));
    }

    #[test]
    fn mdcrd_tokens_are_partitioned_into_frames() {
        let topology = water();
        let text = "\
INT
   0.000   0.000   0.117   0.000   0.757  -0.469   0.000  -0.757  -0.469   0.010
   0.000   0.117   0.000   0.757  -0.469   0.000  -0.757  -0.469
";
        let trajectory = MdcrdFile::new(&topology).read_from_str(text).unwrap();
        assert_eq!(trajectory.frame_count(), 2);
        assert_eq!(
            trajectory.frames()[1].positions[0],
            Point3::new(0.010, 0.000, 0.117)
        );
    }

    #[test]
    fn mdcrd_frame_count_is_token_count_over_frame_width() {
        let topology = water();
        let body = vec!["1.0"; 9 * 4].join(" ");
        let trajectory = MdcrdFile::new(&topology)
            .read_from_str(&format!("INT title\n{}\n", body))
            .unwrap();
        assert_eq!(trajectory.frame_count(), 4);
    }

    #[test]
    fn mdcrd_with_remainder_is_corrupt() {
        let topology = water();
        let body = vec!["1.0"; 10].join(" ");
        let result = MdcrdFile::new(&topology).read_from_str(&body);
        assert!(matches!(
            result,
            Err(AmberError::Trajectory(TrajectoryError::Remainder {
                values: 10,
                ..
            }))
        ));
    }

    #[test]
    fn mdcrd_title_is_skipped_by_prefix_not_position() {
        let topology: Topology = ["C"].into_iter().collect();
        let result = MdcrdFile::new(&topology).read_from_str("1.0 2.0 3.0\nINT\n4.0 5.0 6.0\n");
        assert_eq!(result.unwrap().frame_count(), 2);

        let result = MdcrdFile::new(&topology).read_from_str("Title line\n1.0 2.0 3.0\n");
        assert!(matches!(
            result,
            Err(AmberError::InvalidToken { line: 1, .. })
        ));
    }

    #[test]
    fn mdcrd_custom_title_prefix_is_honoured() {
        let topology: Topology = ["C"].into_iter().collect();
        let trajectory = MdcrdFile::new(&topology)
            .with_title_prefix("MOL")
            .read_from_str("MOL generated\n1.0 2.0 3.0\n")
            .unwrap();
        assert_eq!(trajectory.frame_count(), 1);
    }
}
