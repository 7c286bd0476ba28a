use crate::app_error::SetupError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Workspace,
    Project,
}

impl DescriptorKind {
    pub fn extension(self) -> &'static str {
        match self {
            DescriptorKind::Workspace => "xcworkspace",
            DescriptorKind::Project => "xcodeproj",
        }
    }

    /// The xcodebuild selector flag for this kind.
    pub fn flag(self) -> &'static str {
        match self {
            DescriptorKind::Workspace => "-workspace",
            DescriptorKind::Project => "-project",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub kind: DescriptorKind,
    /// Entry name inside the target directory, e.g. `App.xcworkspace`.
    pub name: String,
}

impl BuildDescriptor {
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

/// Finds the single workspace or project at the top level of `dir`.
///
/// Workspaces win over projects. More than one entry of the winning kind is
/// ambiguous.
pub fn discover(dir: &Path) -> Result<BuildDescriptor, SetupError> {
    if !dir.is_dir() {
        return Err(SetupError::TargetDirMissing(dir.to_path_buf()));
    }

    let entries = fs::read_dir(dir).map_err(|_| SetupError::TargetDirMissing(dir.to_path_buf()))?;

    let mut workspaces = Vec::new();
    let mut projects = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext == DescriptorKind::Workspace.extension() => {
                workspaces.push(name.to_string())
            }
            Some(ext) if ext == DescriptorKind::Project.extension() => {
                projects.push(name.to_string())
            }
            _ => {}
        }
    }

    workspaces.sort();
    projects.sort();
    debug!(dir = %dir.display(), ?workspaces, ?projects, "scanned for build descriptors");

    for (kind, mut found) in [
        (DescriptorKind::Workspace, workspaces),
        (DescriptorKind::Project, projects),
    ] {
        match found.len() {
            0 => continue,
            1 => {
                return Ok(BuildDescriptor {
                    kind,
                    name: found.remove(0),
                });
            }
            _ => {
                return Err(SetupError::AmbiguousDescriptor {
                    dir: dir.to_path_buf(),
                    kind: kind.extension(),
                    found,
                });
            }
        }
    }

    Err(SetupError::NoDescriptorFound(dir.to_path_buf()))
}
