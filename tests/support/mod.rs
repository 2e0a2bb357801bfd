#![allow(dead_code)]

use depforge::deobfuscation::RuntimeDefinition;
use depforge::dependency::{Coordinates, DependencyNode};
use depforge::mappings::{RenamerTool, Side};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const OBFUSCATED_MANIFEST: &str =
    "Manifest-Version: 1.0\nObfuscated: true\nObfuscated-By: ForgeGradle\n";
pub const PLAIN_MANIFEST: &str = "Manifest-Version: 1.0\n";

pub fn write_jar(path: &Path, manifest: Option<&str>) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    if let Some(manifest) = manifest {
        writer
            .start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(manifest.as_bytes()).unwrap();
    }
    writer
        .start_file("com/example/Thing.class", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
    writer.finish().unwrap();
}

/// A node whose single artifact is a jar under `dir`, named as in a Maven layout
pub fn jar_node(dir: &Path, coordinates: &str, obfuscated: bool) -> DependencyNode {
    let coordinates: Coordinates = coordinates.parse().unwrap();
    let path = dir.join(coordinates.file_name());
    let manifest = if obfuscated {
        OBFUSCATED_MANIFEST
    } else {
        PLAIN_MANIFEST
    };
    write_jar(&path, Some(manifest));
    DependencyNode::new(coordinates).with_artifact(path)
}

/// A sources node for `coordinates` with a plain text payload
pub fn sources_node(dir: &Path, coordinates: &str) -> DependencyNode {
    let coordinates: Coordinates = coordinates.parse::<Coordinates>().unwrap().sources();
    let path = dir.join(coordinates.file_name());
    fs::write(&path, b"class Thing {}").unwrap();
    DependencyNode::new(coordinates).with_artifact(path)
}

pub fn joined_runtime(version: &str) -> RuntimeDefinition {
    RuntimeDefinition {
        configuration: "implementation".to_string(),
        minecraft_version: version.to_string(),
        side: Side::Joined,
        mapping_version_data: BTreeMap::from([("mcVersion".to_string(), version.to_string())]),
    }
}

/// Populates `<root>/<version>/` with every reference artifact
pub fn version_cache(root: &Path, version: &str) {
    let dir = root.join(version);
    fs::create_dir_all(&dir).unwrap();
    for name in [
        "client.jar",
        "server.jar",
        "client_mappings.txt",
        "server_mappings.txt",
    ] {
        fs::write(dir.join(name), name).unwrap();
    }
}

#[cfg(unix)]
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A renamer that copies its input to its output through `/bin/sh`
pub fn copying_renamer() -> RenamerTool {
    RenamerTool {
        executable: PathBuf::from("/bin/sh"),
        jar: None,
        main_class: None,
        jvm_args: Vec::new(),
        args: [
            "-c",
            "echo \"renaming with $3\"; cp \"$1\" \"$2\"",
            "renamer",
            "{input}",
            "{output}",
            "{mappings}",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect(),
    }
}
