//! Mapping project documents
//!
//! A project is a JSON document listing maps, each holding an ordered list of
//! layers that point at datasets on disk.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which project to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectRef {
    /// The project active in the current session
    Current,
    /// A project document at an explicit path
    Path(PathBuf),
}

impl ProjectRef {
    /// Resolve to a document path, given the session's active project
    pub fn resolve(&self, active: Option<&Path>) -> Result<PathBuf> {
        match self {
            ProjectRef::Path(path) => Ok(path.clone()),
            ProjectRef::Current => active
                .map(Path::to_path_buf)
                .ok_or_else(|| Error::Project("no project is active in this session".into())),
        }
    }
}

/// A layer entry within a map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRef {
    pub name: String,
    pub data_source: PathBuf,
}

/// A map and its layers, drawn bottom to top
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDef {
    pub name: String,
    #[serde(default)]
    pub layers: Vec<LayerRef>,
}

impl MapDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    /// Add a dataset as a layer named after its file stem.
    ///
    /// A data source already present in the map is not added twice.
    pub fn add_data_from_path(&mut self, path: &Path) -> &LayerRef {
        let index = match self.layers.iter().position(|l| l.data_source == path) {
            Some(i) => i,
            None => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.layers.push(LayerRef {
                    name,
                    data_source: path.to_path_buf(),
                });
                self.layers.len() - 1
            }
        };
        &self.layers[index]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ProjectDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    maps: Vec<MapDef>,
}

/// An open project document
#[derive(Debug, Clone)]
pub struct Project {
    path: PathBuf,
    doc: ProjectDocument,
}

impl Project {
    /// Open an existing project document
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let doc: ProjectDocument = serde_json::from_str(&text)?;
        debug!("Opened project {} with {} maps", path.display(), doc.maps.len());
        Ok(Self {
            path: path.to_path_buf(),
            doc,
        })
    }

    /// Create an unsaved project with the given maps
    pub fn create(path: impl AsRef<Path>, name: impl Into<String>, maps: Vec<MapDef>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            doc: ProjectDocument {
                name: name.into(),
                maps,
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn maps(&self) -> &[MapDef] {
        &self.doc.maps
    }

    pub fn first_map_mut(&mut self) -> Option<&mut MapDef> {
        self.doc.maps.first_mut()
    }

    /// Persist the document, replacing the file in one rename
    pub fn save(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.doc)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Saved project {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_requires_active_session() {
        let err = ProjectRef::Current.resolve(None).unwrap_err();
        assert!(matches!(err, Error::Project(_)));

        let active = PathBuf::from("/tmp/session.json");
        assert_eq!(ProjectRef::Current.resolve(Some(active.as_path())).unwrap(), active);
    }

    #[test]
    fn test_add_data_is_idempotent() {
        let mut map = MapDef::new("Map");
        let path = Path::new("/data/Fresno_buffer.shp");
        assert_eq!(map.add_data_from_path(path).name, "Fresno_buffer");
        map.add_data_from_path(path);
        assert_eq!(map.layers.len(), 1);
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lesson6.json");
        let mut project = Project::create(&path, "Lesson 6", vec![MapDef::new("Map")]);
        project
            .first_map_mut()
            .unwrap()
            .add_data_from_path(Path::new("/data/out.shp"));
        project.save().unwrap();

        let reopened = Project::open(&path).unwrap();
        assert_eq!(reopened.name(), "Lesson 6");
        assert_eq!(reopened.maps()[0].layers[0].name, "out");
        assert!(!dir.path().join("lesson6.json.tmp").exists());
    }

    #[test]
    fn test_open_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Project::open(dir.path().join("nope.json")).unwrap_err(),
            Error::NotFound(_)
        ));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(Project::open(&bad).unwrap_err(), Error::Json(_)));
    }
}
