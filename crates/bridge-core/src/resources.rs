//! Typed accessors over host-owned entities.
//!
//! Every function here runs strictly inside the Executing window of the
//! task state machine. Handles are name-based, never pointers: host
//! state may mutate between calls, so resolution is always fresh.
//! Snapshots are owned copies and never alias back into host memory.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BridgeError;
use crate::host::{FileData, HostState, ObjectData};

/// Kinds of host entities addressable through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Object,
    Scene,
    File,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Plural form, matching the URI path segment.
        let s = match self {
            ResourceKind::Object => "objects",
            ResourceKind::Scene => "scenes",
            ResourceKind::File => "files",
        };
        f.write_str(s)
    }
}

impl FromStr for ResourceKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" | "objects" => Ok(ResourceKind::Object),
            "scene" | "scenes" => Ok(ResourceKind::Scene),
            "file" | "files" => Ok(ResourceKind::File),
            other => Err(BridgeError::Schema(format!(
                "unknown resource type '{}'",
                other
            ))),
        }
    }
}

/// A name-based reference to a host entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHandle {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub name: String,
    pub uri: String,
}

impl ResourceHandle {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        let name = name.into();
        let uri = format!("host://{}/{}", kind, name);
        Self { kind, name, uri }
    }
}

/// Enumerate handles for every entity of the given kind.
pub fn list(state: &HostState, kind: ResourceKind) -> Vec<ResourceHandle> {
    let names: Vec<&String> = match kind {
        ResourceKind::Object => state.objects.keys().collect(),
        ResourceKind::Scene => state.scenes.keys().collect(),
        ResourceKind::File => state.files.keys().collect(),
    };
    names
        .into_iter()
        .map(|name| ResourceHandle::new(kind, name))
        .collect()
}

/// Snapshot a single entity as JSON.
pub fn get(state: &HostState, kind: ResourceKind, name: &str) -> Result<Value, BridgeError> {
    let not_found = || BridgeError::ResourceNotFound {
        kind,
        name: name.to_string(),
    };

    match kind {
        ResourceKind::Object => {
            let object = state.objects.get(name).ok_or_else(not_found)?;
            Ok(object_snapshot(name, object))
        }
        ResourceKind::Scene => {
            let scene = state.scenes.get(name).ok_or_else(not_found)?;
            Ok(json!({
                "name": name,
                "frame_start": scene.frame_start,
                "frame_end": scene.frame_end,
                "frame_current": scene.frame_current,
            }))
        }
        ResourceKind::File => {
            let file = state.files.get(name).ok_or_else(not_found)?;
            Ok(json!({
                "name": name,
                "path": file.path,
                "format": file.format,
            }))
        }
    }
}

fn object_snapshot(name: &str, object: &ObjectData) -> Value {
    json!({
        "name": name,
        "properties": {
            "location": object.location,
            "rotation_quaternion": object.rotation_quaternion,
            "scale": object.scale,
            "mode": object.mode,
        },
        "modifiers": object.modifiers.iter()
            .map(|m| json!({ "name": m }))
            .collect::<Vec<_>>(),
    })
}

/// Apply a patch to an entity and acknowledge with a fresh snapshot.
///
/// Unknown patch fields are rejected before anything is written.
pub fn set(
    state: &mut HostState,
    kind: ResourceKind,
    name: &str,
    patch: &Value,
) -> Result<Value, BridgeError> {
    let fields = patch
        .as_object()
        .ok_or_else(|| BridgeError::Schema("patch must be an object".into()))?;

    match kind {
        ResourceKind::Object => {
            let allowed = ["location", "scale", "mode"];
            if let Some(bad) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
                return Err(BridgeError::Schema(format!(
                    "object patch does not support field '{}'",
                    bad
                )));
            }
            // Validate fully before mutating.
            let location = fields.get("location").map(|v| triple(v, "location")).transpose()?;
            let scale = fields.get("scale").map(|v| triple(v, "scale")).transpose()?;
            let mode = fields
                .get("mode")
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| BridgeError::Schema("mode must be a string".into()))
                })
                .transpose()?;

            let object = state.objects.get_mut(name).ok_or(BridgeError::ResourceNotFound {
                kind,
                name: name.to_string(),
            })?;
            if let Some(v) = location {
                object.location = v;
            }
            if let Some(v) = scale {
                object.scale = v;
            }
            if let Some(v) = mode {
                object.mode = v;
            }
            let snapshot = object_snapshot(name, object);
            Ok(snapshot)
        }
        ResourceKind::Scene => {
            let allowed = ["frame_start", "frame_end", "frame_current"];
            if let Some(bad) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
                return Err(BridgeError::Schema(format!(
                    "scene patch does not support field '{}'",
                    bad
                )));
            }
            let scene = state.scenes.get_mut(name).ok_or(BridgeError::ResourceNotFound {
                kind,
                name: name.to_string(),
            })?;
            for (key, value) in fields {
                let frame = value
                    .as_i64()
                    .ok_or_else(|| BridgeError::Schema(format!("{} must be an integer", key)))?;
                match key.as_str() {
                    "frame_start" => scene.frame_start = frame,
                    "frame_end" => scene.frame_end = frame,
                    _ => scene.frame_current = frame,
                }
            }
            get(state, kind, name)
        }
        ResourceKind::File => Err(BridgeError::Schema(
            "file resources are read-only".into(),
        )),
    }
}

fn triple(value: &Value, field: &str) -> Result<[f64; 3], BridgeError> {
    let items = value
        .as_array()
        .filter(|a| a.len() == 3)
        .ok_or_else(|| BridgeError::Schema(format!("{} must be an array of three numbers", field)))?;
    let mut out = [0.0; 3];
    for (i, item) in items.iter().enumerate() {
        out[i] = item
            .as_f64()
            .ok_or_else(|| BridgeError::Schema(format!("{} must be an array of three numbers", field)))?;
    }
    Ok(out)
}

/// Formats the host can import, by extension.
const IMPORT_FORMATS: &[(&str, &str)] = &[
    ("glb", "gltf"),
    ("gltf", "gltf"),
    ("obj", "obj"),
    ("fbx", "fbx"),
];

/// Import a 3D file and return handles for everything it created:
/// one file entry plus one object named after the file stem.
pub fn import_file(state: &mut HostState, path: &str) -> Result<Vec<ResourceHandle>, BridgeError> {
    let fs_path = Path::new(path);
    if !fs_path.exists() {
        return Err(BridgeError::Execution(format!("{} not found", path)));
    }

    let extension = fs_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let format = IMPORT_FORMATS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, fmt)| *fmt)
        .ok_or_else(|| {
            BridgeError::Execution(format!("unsupported file format: .{}", extension))
        })?;

    let stem = fs_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("imported")
        .to_string();

    // Imported objects get a numbered suffix when the name is taken,
    // the way the host deduplicates.
    let mut object_name = stem.clone();
    let mut counter = 1;
    while state.objects.contains_key(&object_name) {
        object_name = format!("{}.{:03}", stem, counter);
        counter += 1;
    }

    state.objects.insert(object_name.clone(), ObjectData::default());
    state.files.insert(
        stem.clone(),
        FileData {
            path: path.to_string(),
            format: format.to_string(),
        },
    );

    Ok(vec![
        ResourceHandle::new(ResourceKind::File, stem),
        ResourceHandle::new(ResourceKind::Object, object_name),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn get_missing_object_is_not_found() {
        let state = HostState::new();
        let err = get(&state, ResourceKind::Object, "Ghost").unwrap_err();
        assert!(matches!(err, BridgeError::ResourceNotFound { .. }));
    }

    #[test]
    fn list_objects_is_sorted_and_copied() {
        let mut state = HostState::new();
        state.objects.insert("B".into(), ObjectData::default());
        state.objects.insert("A".into(), ObjectData::default());
        let handles = list(&state, ResourceKind::Object);
        let names: Vec<&str> = handles.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["A", "B"]);
        assert_eq!(handles[0].uri, "host://objects/A");
    }

    #[test]
    fn set_rejects_unknown_fields_without_mutating() {
        let mut state = HostState::new();
        state.objects.insert("Cube".into(), ObjectData::default());
        let patch = json!({ "location": [1, 2, 3], "volume": 9 });
        let err = set(&mut state, ResourceKind::Object, "Cube", &patch).unwrap_err();
        assert!(matches!(err, BridgeError::Schema(_)));
        assert_eq!(state.objects["Cube"].location, [0.0; 3]);
    }

    #[test]
    fn set_location_returns_snapshot() {
        let mut state = HostState::new();
        state.objects.insert("Cube".into(), ObjectData::default());
        let patch = json!({ "location": [1.0, 2.0, 3.0] });
        let ack = set(&mut state, ResourceKind::Object, "Cube", &patch).unwrap();
        assert_eq!(ack["properties"]["location"], json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn import_unsupported_extension_fails() {
        let mut state = HostState::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.stl");
        std::fs::File::create(&path).unwrap().write_all(b"solid").unwrap();
        let err = import_file(&mut state, path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("unsupported file format"));
    }

    #[test]
    fn import_creates_file_and_object_handles() {
        let mut state = HostState::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robot.glb");
        std::fs::File::create(&path).unwrap().write_all(b"glTF").unwrap();

        let handles = import_file(&mut state, path.to_str().unwrap()).unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].kind, ResourceKind::File);
        assert_eq!(handles[1].kind, ResourceKind::Object);
        assert_eq!(handles[1].name, "robot");

        // A second import of the same file dedupes the object name.
        let handles = import_file(&mut state, path.to_str().unwrap()).unwrap();
        assert_eq!(handles[1].name, "robot.001");
    }

    #[test]
    fn import_missing_file_fails() {
        let mut state = HostState::new();
        let err = import_file(&mut state, "/no/such/file.glb").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
