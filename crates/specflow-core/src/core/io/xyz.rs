use crate::core::io::traits::{FormatReader, FormatWriter};
use crate::core::models::frame::{Frame, LabeledFrame, Trajectory};
use crate::core::models::topology::Topology;
use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::Path;
use thiserror::Error;

pub const COMMENT_PREFIX: &str = "generated by specflow";

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Frame {frame} is truncated: expected {expected} atoms, found {found}")]
    TruncatedFrame {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("File contains no frames")]
    Empty,
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("Expected an atom count line, found '{0}'")]
    ExpectedAtomCount(String),
    #[error("Atom record needs 'label x y z' (found '{0}')")]
    InvalidAtomRecord(String),
    #[error("Invalid coordinate '{0}'")]
    InvalidCoordinate(String),
}

/// A lazy, single-pass sequence of frames read from a multi-frame XYZ stream.
///
/// A line holding nothing but an integer starts a frame; nothing else delimits frames.
/// Iteration stops after the first error.
pub struct XyzFrames<R> {
    lines: Lines<R>,
    line_num: usize,
    frames_read: usize,
    failed: bool,
}

impl<R: BufRead> XyzFrames<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_num: 0,
            frames_read: 0,
            failed: false,
        }
    }

    fn next_line(&mut self) -> Option<io::Result<String>> {
        let line = self.lines.next()?;
        self.line_num += 1;
        Some(line)
    }

    fn read_frame(&mut self, atom_count: usize) -> Result<LabeledFrame, XyzError> {
        let frame_no = self.frames_read + 1;
        let truncated = |found| XyzError::TruncatedFrame {
            frame: frame_no,
            expected: atom_count,
            found,
        };

        let comment = match self.next_line() {
            Some(line) => line?,
            None => return Err(truncated(0)),
        };

        let mut labels = Vec::with_capacity(atom_count);
        let mut positions = Vec::with_capacity(atom_count);
        while labels.len() < atom_count {
            let line = match self.next_line() {
                Some(line) => line?,
                None => return Err(truncated(labels.len())),
            };
            if parse_atom_count(&line).is_some() {
                return Err(truncated(labels.len()));
            }
            let (label, position) = parse_atom_record(&line).map_err(|kind| XyzError::Parse {
                line: self.line_num,
                kind,
            })?;
            labels.push(label);
            positions.push(position);
        }

        self.frames_read += 1;
        Ok(LabeledFrame::new(
            comment.trim(),
            Topology::new(labels),
            Frame::new(positions),
        ))
    }
}

impl<R: BufRead> Iterator for XyzFrames<R> {
    type Item = Result<LabeledFrame, XyzError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = loop {
            let line = match self.next_line()? {
                Ok(line) => line,
                Err(e) => break Err(e.into()),
            };
            if line.trim().is_empty() {
                continue;
            }
            break match parse_atom_count(&line) {
                Some(count) => self.read_frame(count),
                None => Err(XyzError::Parse {
                    line: self.line_num,
                    kind: XyzParseErrorKind::ExpectedAtomCount(line.trim().to_string()),
                }),
            };
        };

        self.failed = result.is_err();
        Some(result)
    }
}

fn parse_atom_count(line: &str) -> Option<usize> {
    line.trim().parse().ok()
}

fn parse_atom_record(line: &str) -> Result<(String, Point3<f64>), XyzParseErrorKind> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return Err(XyzParseErrorKind::InvalidAtomRecord(line.trim().to_string()));
    }
    let coord = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| XyzParseErrorKind::InvalidCoordinate(s.to_string()))
    };
    Ok((
        parts[0].to_string(),
        Point3::new(coord(parts[1])?, coord(parts[2])?, coord(parts[3])?),
    ))
}

pub struct XyzFile;

impl XyzFile {
    /// Opens `path` for lazy frame iteration. Calling it again restarts from the first frame.
    pub fn frames_from_path<P: AsRef<Path>>(path: P) -> io::Result<XyzFrames<BufReader<File>>> {
        Ok(XyzFrames::new(BufReader::new(File::open(path)?)))
    }

    /// Reads only the first frame, as for single-structure files written by the engines.
    pub fn read_first_frame<P: AsRef<Path>>(path: P) -> Result<LabeledFrame, XyzError> {
        Self::frames_from_path(path)?.next().unwrap_or(Err(XyzError::Empty))
    }

    pub fn write_frame(frame: &LabeledFrame, writer: &mut impl Write) -> Result<(), XyzError> {
        writeln!(writer, "{}", frame.atom_count())?;
        writeln!(writer, "{}", frame.comment)?;
        for (label, p) in frame.atoms() {
            writeln!(writer, "{} {:.6} {:.6} {:.6}", label, p.x, p.y, p.z)?;
        }
        Ok(())
    }

    pub fn frame_comment(index: usize) -> String {
        format!("{},Frame {}", COMMENT_PREFIX, index)
    }
}

impl FormatReader for XyzFile {
    type Output = Vec<LabeledFrame>;
    type Error = XyzError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Self::Output, Self::Error> {
        XyzFrames::new(reader).collect()
    }
}

impl FormatWriter for XyzFile {
    type Input = Trajectory;
    type Error = XyzError;

    fn write_to(&self, input: &Self::Input, writer: &mut impl Write) -> Result<(), Self::Error> {
        let topology = input.topology();
        for (i, frame) in input.frames().iter().enumerate() {
            writeln!(writer, "{}", topology.atom_count())?;
            writeln!(writer, "{}", Self::frame_comment(i + 1))?;
            for (label, p) in topology.iter().zip(&frame.positions) {
                writeln!(writer, "{} {:.6} {:.6} {:.6}", label, p.x, p.y, p.z)?;
            }
        }
        Ok(())
    }
}
