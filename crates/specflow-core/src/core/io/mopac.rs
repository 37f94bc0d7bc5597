use crate::core::io::traits::{FormatReader, FormatWriter};
use crate::core::models::energy::EnergyRecord;
use crate::core::models::frame::{Frame, LabeledFrame};
use crate::core::models::topology::Topology;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;

pub const ENERGY_MARKER: &str = "FINAL HEAT OF FORMATION =";
const HEADER_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum MopacError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Energy marker '{}' not found", ENERGY_MARKER)]
    MissingEnergyMarker,
    #[error("Value after energy marker is not a number: '{0}'")]
    InvalidEnergy(String),
    #[error("Cannot recover a frame index from file name '{0}'")]
    MissingFrameIndex(String),
    #[error("Parse error on line {line}: invalid job record '{content}'")]
    InvalidRecord { line: usize, content: String },
    #[error("Job file has no atom records")]
    EmptyJob,
}

/// The fixed three-line header that opens every MOPAC job file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MopacHeader {
    pub keywords: String,
    pub title: String,
    pub comment: String,
}

impl Default for MopacHeader {
    fn default() -> Self {
        Self {
            keywords: "PM6-DH+ precise".to_string(),
            title: "molecule".to_string(),
            comment: "All coordinates are Cartesian".to_string(),
        }
    }
}

/// Removes the numbering suffix force-field tools append to element symbols (`C12` → `C`).
pub fn element_symbol(label: &str) -> &str {
    label.trim_end_matches(|c: char| c.is_ascii_digit())
}

/// Recovers the frame ordinal from an output file name such as `Frame_12.out`.
pub fn frame_index_from_path(path: &Path) -> Result<usize, MopacError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digits: String = stem
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse()
        .map_err(|_| MopacError::MissingFrameIndex(stem))
}

/// Writes a Cartesian geometry-optimisation job for one frame.
pub struct MopacJob<'a> {
    header: &'a MopacHeader,
}

impl<'a> MopacJob<'a> {
    pub fn new(header: &'a MopacHeader) -> Self {
        Self { header }
    }
}

impl FormatWriter for MopacJob<'_> {
    type Input = LabeledFrame;
    type Error = MopacError;

    fn write_to(&self, input: &Self::Input, writer: &mut impl Write) -> Result<(), Self::Error> {
        if input.atom_count() == 0 {
            return Err(MopacError::EmptyJob);
        }
        writeln!(writer, "{}", self.header.keywords)?;
        writeln!(writer, "{}", self.header.title)?;
        writeln!(writer, "{}", self.header.comment)?;
        for (label, p) in input.atoms() {
            writeln!(
                writer,
                "{:<2} {:>10.8} 1 {:>10.8} 1 {:>10.8} 1",
                element_symbol(label),
                p.x,
                p.y,
                p.z
            )?;
        }
        Ok(())
    }
}

/// Reads a job file written by [`MopacJob`] back into a frame.
pub struct MopacJobFile;

impl FormatReader for MopacJobFile {
    type Output = LabeledFrame;
    type Error = MopacError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        let mut labels = Vec::new();
        let mut positions = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate().skip(HEADER_LINES) {
            let line = line_res?;
            if line.trim().is_empty() {
                continue;
            }
            let invalid = || MopacError::InvalidRecord {
                line: line_num + 1,
                content: line.trim().to_string(),
            };
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 7 {
                return Err(invalid());
            }
            let coord = |s: &str| s.parse::<f64>().map_err(|_| invalid());
            positions.push(Point3::new(
                coord(parts[1])?,
                coord(parts[3])?,
                coord(parts[5])?,
            ));
            labels.push(parts[0].to_string());
        }

        if labels.is_empty() {
            return Err(MopacError::EmptyJob);
        }
        Ok(LabeledFrame::new(
            "",
            Topology::new(labels),
            Frame::new(positions),
        ))
    }
}

/// Extracts the final heat of formation (kcal/mol) from a MOPAC output file.
pub struct MopacOutputFile;

impl MopacOutputFile {
    /// Reads the energy of `path`, taking the frame index from the file's own name.
    pub fn read_record<P: AsRef<Path>>(path: P) -> Result<EnergyRecord, MopacError> {
        let path = path.as_ref();
        let frame = frame_index_from_path(path)?;
        let energy = Self.read_from_path(path)?;
        Ok(EnergyRecord::new(frame, energy))
    }
}

impl FormatReader for MopacOutputFile {
    type Output = f64;
    type Error = MopacError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        for line_res in reader.lines() {
            let line = line_res?;
            let Some(pos) = line.find(ENERGY_MARKER) else {
                continue;
            };
            let token = line[pos + ENERGY_MARKER.len()..]
                .split_whitespace()
                .next()
                .unwrap_or_default();
            return token
                .parse()
                .map_err(|_| MopacError::InvalidEnergy(token.to_string()));
        }
        Err(MopacError::MissingEnergyMarker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn methanol() -> LabeledFrame {
        LabeledFrame::new(
            "generated by specflow,Frame 1",
            ["C1", "O1", "H11"].into_iter().collect(),
            Frame::new(vec![
                Point3::new(-0.748, -0.015, 0.024),
                Point3::new(0.558, 0.4, -0.289),
                Point3::new(-1.4, 0.85, 0.0),
            ]),
        )
    }

    #[test]
    fn element_symbol_strips_trailing_digits_only() {
        assert_eq!(element_symbol("C12"), "C");
        assert_eq!(element_symbol("Cl"), "Cl");
        assert_eq!(element_symbol("H"), "H");
    }

    #[test]
    fn job_writer_emits_header_and_flagged_coordinates() {
        let header = MopacHeader::default();
        let text = MopacJob::new(&header).write_to_string(&methanol()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "PM6-DH+ precise");
        assert_eq!(lines[1], "molecule");
        assert_eq!(lines[2], "All coordinates are Cartesian");
        assert_eq!(lines[3], "C  -0.74800000 1 -0.01500000 1 0.02400000 1");
        assert_eq!(lines[4], "O  0.55800000 1 0.40000000 1 -0.28900000 1");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn job_writer_rejects_empty_frame() {
        let header = MopacHeader::default();
        let result = MopacJob::new(&header).write_to_string(&LabeledFrame::default());
        assert!(matches!(result, Err(MopacError::EmptyJob)));
    }

    #[test]
    fn job_reader_recovers_written_geometry() {
        let header = MopacHeader::default();
        let text = MopacJob::new(&header).write_to_string(&methanol()).unwrap();
        let frame = MopacJobFile.read_from_str(&text).unwrap();

        assert_eq!(frame.topology.labels(), ["C", "O", "H"]);
        assert_eq!(frame.frame.positions[1], Point3::new(0.558, 0.4, -0.289));
    }

    #[test]
    fn job_reader_rejects_short_records() {
        let result = MopacJobFile.read_from_str("PM6\nmolecule\ncomment\nC 0.0 1 0.0 1\n");
        assert!(matches!(
            result,
            Err(MopacError::InvalidRecord { line: 4, .. })
        ));
    }

    #[test]
    fn output_parser_extracts_heat_of_formation() {
        let text = "\
          FINAL HEAT OF FORMATION =        -41.52345 KCAL/MOL =    -173.73411 KJ/MOL
          TOTAL ENERGY            =       -642.30151 EV
";
        assert_eq!(MopacOutputFile.read_from_str(text).unwrap(), -41.52345);
    }

    #[test]
    fn output_without_marker_fails() {
        let result = MopacOutputFile.read_from_str("JOB ENDED NORMALLY\n");
        assert!(matches!(result, Err(MopacError::MissingEnergyMarker)));
    }

    #[test]
    fn output_with_non_numeric_energy_fails() {
        let result = MopacOutputFile.read_from_str("FINAL HEAT OF FORMATION = ******** KCAL/MOL\n");
        assert!(matches!(result, Err(MopacError::InvalidEnergy(v)) if v == "********"));
    }

    #[test]
    fn frame_index_comes_from_file_name() {
        assert_eq!(frame_index_from_path(&PathBuf::from("Frame_12.out")).unwrap(), 12);
        assert!(matches!(
            frame_index_from_path(&PathBuf::from("summary.out")),
            Err(MopacError::MissingFrameIndex(_))
        ));
    }

    #[test]
    fn read_record_combines_file_name_and_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Frame_3.out");
        fs::write(&path, " FINAL HEAT OF FORMATION =  -39.9 KCAL/MOL\n").unwrap();

        let record = MopacOutputFile::read_record(&path).unwrap();
        assert_eq!(record.frame, 3);
        assert_eq!(record.energy, -39.9);
    }
}
