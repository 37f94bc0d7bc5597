use crate::engine::error::PipelineError;
use crate::engine::state::Stage;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Regular files directly inside `dir` that satisfy `predicate`, sorted by name.
pub fn files_matching<F>(dir: &Path, predicate: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && predicate(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Finds the single file in `dir` matching `predicate`.
///
/// Zero matches is a missing artifact and more than one is ambiguous; neither is resolved
/// by picking one.
pub fn find_unique<F>(
    stage: Stage,
    dir: &Path,
    description: &str,
    predicate: F,
) -> Result<PathBuf, PipelineError>
where
    F: Fn(&Path) -> bool,
{
    let mut candidates = files_matching(dir, predicate).map_err(PipelineError::io(stage, dir))?;
    match candidates.len() {
        0 => Err(PipelineError::MissingArtifact {
            stage,
            description: description.to_string(),
            path: dir.to_path_buf(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(PipelineError::AmbiguousArtifact {
            stage,
            description: description.to_string(),
            dir: dir.to_path_buf(),
            candidates,
        }),
    }
}

/// Moves every regular file of `dir` matching `predicate` into `dir/subdir`, replacing
/// files of the same name already there. Returns the new locations.
pub fn move_into<F>(
    stage: Stage,
    dir: &Path,
    subdir: &str,
    predicate: F,
) -> Result<Vec<PathBuf>, PipelineError>
where
    F: Fn(&Path) -> bool,
{
    let target = dir.join(subdir);
    let files = files_matching(dir, predicate).map_err(PipelineError::io(stage, dir))?;
    if files.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(&target).map_err(PipelineError::io(stage, &target))?;

    let mut moved = Vec::with_capacity(files.len());
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let destination = target.join(name);
        move_file(&file, &destination).map_err(PipelineError::io(stage, &file))?;
        moved.push(destination);
    }
    debug!(count = moved.len(), target = %target.display(), "Archived stage files");
    Ok(moved)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

/// The file name of `path` as text, for messages and name-based filters.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The file stem of `path` as text.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        path
    }

    #[test]
    fn unique_candidate_is_returned() {
        let dir = tempdir().unwrap();
        let mol2 = touch(dir.path(), "aspirin.mol2");
        touch(dir.path(), "notes.txt");

        let found = find_unique(Stage::ConformerSearch, dir.path(), "mol2 file", |p| {
            has_extension(p, "mol2")
        })
        .unwrap();
        assert_eq!(found, mol2);
    }

    #[test]
    fn zero_candidates_is_missing() {
        let dir = tempdir().unwrap();
        let result = find_unique(Stage::ConformerSearch, dir.path(), "mol2 file", |p| {
            has_extension(p, "mol2")
        });
        assert!(matches!(result, Err(PipelineError::MissingArtifact { .. })));
    }

    #[test]
    fn several_candidates_are_ambiguous() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a.mol2");
        touch(dir.path(), "b.MOL2");

        match find_unique(Stage::ConformerSearch, dir.path(), "mol2 file", |p| {
            has_extension(p, "mol2")
        }) {
            Err(PipelineError::AmbiguousArtifact { candidates, .. }) => {
                assert_eq!(candidates.len(), 2)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn move_into_archives_matching_files_and_overwrites() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "p.prepin");
        touch(dir.path(), "leap.log");
        fs::create_dir(dir.path().join("p")).unwrap();
        fs::write(dir.path().join("p").join("leap.log"), "old").unwrap();

        let moved = move_into(Stage::ConformerSearch, dir.path(), "p", |p| {
            file_name(p) != "p.prepin"
        })
        .unwrap();

        assert_eq!(moved, [dir.path().join("p").join("leap.log")]);
        assert!(dir.path().join("p.prepin").exists());
        assert!(!dir.path().join("leap.log").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("p").join("leap.log")).unwrap(),
            "leap.log"
        );
    }

    #[test]
    fn move_into_without_matches_creates_nothing() {
        let dir = tempdir().unwrap();
        let moved = move_into(Stage::GroundState, dir.path(), "archive", |_| true).unwrap();
        assert!(moved.is_empty());
        assert!(!dir.path().join("archive").exists());
    }
}
