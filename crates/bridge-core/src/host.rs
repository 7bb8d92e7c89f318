//! Host application state and its scripting surface.
//!
//! The host owns all mutable domain state and is single-threaded: only
//! the tick loop may touch a `HostState`. The bridge never hands out
//! references into it; everything crossing the boundary is a copy.
//!
//! `run_script` models the host's "execute arbitrary script" surface: a
//! line-oriented command language evaluated against the state with
//! captured output, the way the original scripting console captures
//! stdout.

use std::collections::BTreeMap;

use crate::error::BridgeError;

/// A domain object in the host scene.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub kind: String,
    pub location: [f64; 3],
    pub rotation_quaternion: [f64; 4],
    pub scale: [f64; 3],
    pub mode: String,
    pub modifiers: Vec<String>,
}

impl Default for ObjectData {
    fn default() -> Self {
        Self {
            kind: "mesh".into(),
            location: [0.0; 3],
            rotation_quaternion: [1.0, 0.0, 0.0, 0.0],
            scale: [1.0; 3],
            mode: "OBJECT".into(),
            modifiers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneData {
    pub frame_start: i64,
    pub frame_end: i64,
    pub frame_current: i64,
}

impl Default for SceneData {
    fn default() -> Self {
        Self {
            frame_start: 1,
            frame_end: 250,
            frame_current: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileData {
    pub path: String,
    pub format: String,
}

/// All mutable host state. Owned exclusively by the tick loop.
///
/// Maps are ordered so enumeration is deterministic.
#[derive(Debug, Default)]
pub struct HostState {
    pub objects: BTreeMap<String, ObjectData>,
    pub scenes: BTreeMap<String, SceneData>,
    pub files: BTreeMap<String, FileData>,
    /// Name of the scene the host is currently editing.
    pub active_scene: String,
}

impl HostState {
    /// A state with the single default scene the host starts with.
    pub fn new() -> Self {
        let mut state = Self::default();
        state.scenes.insert("Scene".into(), SceneData::default());
        state.active_scene = "Scene".into();
        state
    }
}

/// Execute a host script and return its captured output.
///
/// Commands, one per line (`#` starts a comment):
///
/// ```text
/// object.add <name> [kind]
/// object.remove <name>
/// object.move <name> <x> <y> <z>
/// object.scale <name> <x> <y> <z>
/// scene.add <name>
/// scene.use <name>
/// scene.frame <name> <current>
/// print <text...>
/// ```
///
/// The first failing line aborts the script; lines already executed
/// keep their effect, matching exec-style semantics.
pub fn run_script(state: &mut HostState, script: &str) -> Result<String, BridgeError> {
    let mut output = String::new();

    for (lineno, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        eval_line(state, line, &mut output)
            .map_err(|msg| BridgeError::Execution(format!("line {}: {}", lineno + 1, msg)))?;
    }

    Ok(output)
}

fn eval_line(state: &mut HostState, line: &str, output: &mut String) -> Result<(), String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match command {
        "object.add" => {
            let name = arg(&args, 0, "object.add <name> [kind]")?;
            if state.objects.contains_key(name) {
                return Err(format!("object '{}' already exists", name));
            }
            let mut data = ObjectData::default();
            if let Some(kind) = args.get(1) {
                data.kind = (*kind).to_string();
            }
            state.objects.insert(name.to_string(), data);
        }
        "object.remove" => {
            let name = arg(&args, 0, "object.remove <name>")?;
            if state.objects.remove(name).is_none() {
                return Err(format!("object '{}' does not exist", name));
            }
        }
        "object.move" => {
            let name = arg(&args, 0, "object.move <name> <x> <y> <z>")?;
            let xyz = vec3(&args[1..])?;
            let object = state
                .objects
                .get_mut(name)
                .ok_or_else(|| format!("object '{}' does not exist", name))?;
            object.location = xyz;
        }
        "object.scale" => {
            let name = arg(&args, 0, "object.scale <name> <x> <y> <z>")?;
            let xyz = vec3(&args[1..])?;
            let object = state
                .objects
                .get_mut(name)
                .ok_or_else(|| format!("object '{}' does not exist", name))?;
            object.scale = xyz;
        }
        "scene.add" => {
            let name = arg(&args, 0, "scene.add <name>")?;
            if state.scenes.contains_key(name) {
                return Err(format!("scene '{}' already exists", name));
            }
            state.scenes.insert(name.to_string(), SceneData::default());
        }
        "scene.use" => {
            let name = arg(&args, 0, "scene.use <name>")?;
            if !state.scenes.contains_key(name) {
                return Err(format!("scene '{}' does not exist", name));
            }
            state.active_scene = name.to_string();
        }
        "scene.frame" => {
            let name = arg(&args, 0, "scene.frame <name> <current>")?;
            let frame: i64 = arg(&args, 1, "scene.frame <name> <current>")?
                .parse()
                .map_err(|_| "frame must be an integer".to_string())?;
            let scene = state
                .scenes
                .get_mut(name)
                .ok_or_else(|| format!("scene '{}' does not exist", name))?;
            scene.frame_current = frame;
        }
        "print" => {
            output.push_str(&args.join(" "));
            output.push('\n');
        }
        other => return Err(format!("unknown command '{}'", other)),
    }

    Ok(())
}

fn arg<'a>(args: &[&'a str], index: usize, usage: &str) -> Result<&'a str, String> {
    args.get(index)
        .copied()
        .ok_or_else(|| format!("usage: {}", usage))
}

fn vec3(args: &[&str]) -> Result<[f64; 3], String> {
    if args.len() != 3 {
        return Err("expected three numeric components".into());
    }
    let mut out = [0.0; 3];
    for (i, raw) in args.iter().enumerate() {
        out[i] = raw
            .parse()
            .map_err(|_| format!("'{}' is not a number", raw))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_move_object() {
        let mut state = HostState::new();
        run_script(&mut state, "object.add Cube\nobject.move Cube 1 2 3").unwrap();
        assert_eq!(state.objects["Cube"].location, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn print_is_captured() {
        let mut state = HostState::new();
        let out = run_script(&mut state, "print hello world\nprint again").unwrap();
        assert_eq!(out, "hello world\nagain\n");
    }

    #[test]
    fn duplicate_object_fails_with_line_number() {
        let mut state = HostState::new();
        let err = run_script(&mut state, "object.add Cube\nobject.add Cube").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        // The first line still took effect.
        assert!(state.objects.contains_key("Cube"));
    }

    #[test]
    fn unknown_command_is_an_execution_error() {
        let mut state = HostState::new();
        let err = run_script(&mut state, "frobnicate").unwrap_err();
        assert!(matches!(err, BridgeError::Execution(_)));
    }

    #[test]
    fn scene_use_switches_the_active_scene() {
        let mut state = HostState::new();
        run_script(&mut state, "scene.add Staging\nscene.use Staging").unwrap();
        assert_eq!(state.active_scene, "Staging");

        let err = run_script(&mut state, "scene.use Nowhere").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert_eq!(state.active_scene, "Staging");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut state = HostState::new();
        run_script(&mut state, "# setup\n\nobject.add Light lamp").unwrap();
        assert_eq!(state.objects["Light"].kind, "lamp");
    }
}
