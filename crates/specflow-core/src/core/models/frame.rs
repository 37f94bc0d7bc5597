use super::topology::Topology;
use nalgebra::Point3;
use thiserror::Error;

/// One geometry snapshot: a position per atom, in topology order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub positions: Vec<Point3<f64>>,
}

impl Frame {
    pub fn new(positions: Vec<Point3<f64>>) -> Self {
        Self { positions }
    }

    pub fn atom_count(&self) -> usize {
        self.positions.len()
    }
}

/// A single frame that carries its own atom labels, as read from a standalone structure file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledFrame {
    pub comment: String,
    pub topology: Topology,
    pub frame: Frame,
}

impl LabeledFrame {
    pub fn new(comment: impl Into<String>, topology: Topology, frame: Frame) -> Self {
        Self {
            comment: comment.into(),
            topology,
            frame,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.frame.atom_count()
    }

    /// Pairs each label with its position, in topology order.
    pub fn atoms(&self) -> impl Iterator<Item = (&str, &Point3<f64>)> {
        self.topology.iter().zip(self.frame.positions.iter())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrajectoryError {
    #[error(
        "Coordinate stream is corrupt: {values} values is not a multiple of {per_frame} ({atoms} atoms x 3)"
    )]
    Remainder {
        values: usize,
        atoms: usize,
        per_frame: usize,
    },
    #[error("Frame {frame} has {found} atoms but the topology has {expected}")]
    AtomCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Topology has no atoms")]
    EmptyTopology,
}

/// An ordered sequence of frames sharing one topology.
///
/// Every frame holds exactly `topology.atom_count()` positions; the constructors reject
/// anything else, so consumers may index frames by topology position without checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    topology: Topology,
    frames: Vec<Frame>,
}

impl Trajectory {
    pub fn new(topology: Topology, frames: Vec<Frame>) -> Result<Self, TrajectoryError> {
        if topology.is_empty() {
            return Err(TrajectoryError::EmptyTopology);
        }
        for (i, frame) in frames.iter().enumerate() {
            if frame.atom_count() != topology.atom_count() {
                return Err(TrajectoryError::AtomCountMismatch {
                    frame: i + 1,
                    expected: topology.atom_count(),
                    found: frame.atom_count(),
                });
            }
        }
        Ok(Self { topology, frames })
    }

    /// Partitions a flat `x y z x y z ...` stream into frames of `atom_count * 3` values.
    pub fn from_flat(topology: Topology, values: &[f64]) -> Result<Self, TrajectoryError> {
        if topology.is_empty() {
            return Err(TrajectoryError::EmptyTopology);
        }
        let per_frame = topology.atom_count() * 3;
        if values.len() % per_frame != 0 {
            return Err(TrajectoryError::Remainder {
                values: values.len(),
                atoms: topology.atom_count(),
                per_frame,
            });
        }

        let frames = values
            .chunks_exact(per_frame)
            .map(|chunk| {
                Frame::new(
                    chunk
                        .chunks_exact(3)
                        .map(|xyz| Point3::new(xyz[0], xyz[1], xyz[2]))
                        .collect(),
                )
            })
            .collect();

        Ok(Self { topology, frames })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn into_parts(self) -> (Topology, Vec<Frame>) {
        (self.topology, self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Topology {
        ["O", "H1", "H2"].into_iter().collect()
    }

    #[test]
    fn from_flat_partitions_values_into_frames() {
        let values: Vec<f64> = (0..18).map(f64::from).collect();
        let trajectory = Trajectory::from_flat(water(), &values).unwrap();

        assert_eq!(trajectory.frame_count(), 2);
        assert_eq!(trajectory.frames()[0].positions[0], Point3::new(0.0, 1.0, 2.0));
        assert_eq!(
            trajectory.frames()[1].positions[2],
            Point3::new(15.0, 16.0, 17.0)
        );
    }

    #[test]
    fn from_flat_rejects_partial_frames() {
        let values = vec![0.0; 20];
        let result = Trajectory::from_flat(water(), &values);
        assert_eq!(
            result,
            Err(TrajectoryError::Remainder {
                values: 20,
                atoms: 3,
                per_frame: 9
            })
        );
    }

    #[test]
    fn from_flat_accepts_empty_stream() {
        let trajectory = Trajectory::from_flat(water(), &[]).unwrap();
        assert_eq!(trajectory.frame_count(), 0);
    }

    #[test]
    fn new_rejects_frames_with_wrong_atom_count() {
        let frames = vec![Frame::new(vec![Point3::origin(); 3]), Frame::new(vec![])];
        let result = Trajectory::new(water(), frames);
        assert_eq!(
            result,
            Err(TrajectoryError::AtomCountMismatch {
                frame: 2,
                expected: 3,
                found: 0
            })
        );
    }

    #[test]
    fn empty_topology_is_rejected() {
        assert_eq!(
            Trajectory::from_flat(Topology::default(), &[1.0, 2.0, 3.0]),
            Err(TrajectoryError::EmptyTopology)
        );
    }
}
