//! Shape geometry descriptor
//!
//! One JSON file per shape describes the faces of the solid, the LEDs
//! per face, the proximity sensors and how faces stack into layers. The
//! descriptor is loaded and validated once at boot, then shared
//! immutably (`Arc<Geometry>`) with every consumer. Validation failures
//! are fatal: no animation runs on a malformed shape.

use log::debug;
use serde::Deserialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type FaceId = usize;
pub type SensorId = usize;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("failed to read shape file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid shape JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("shape `{0}` declares no faces")]
    NoFaces(String),
    #[error("shape `{0}` declares led_per_face = 0")]
    NoLeds(String),
    #[error("face {face} references sensor {sensor}, but only {declared} sensors are declared")]
    SensorOutOfRange {
        face: FaceId,
        sensor: SensorId,
        declared: usize,
    },
}

/// On-disk face entry. `layer`/`index` order the face within the layer
/// stack; `face_id` defaults to the position in the `faces` array.
#[derive(Debug, Deserialize)]
struct FaceEntry {
    sensors: Vec<SensorId>,
    pos: [f32; 3],
    #[serde(default)]
    layer: usize,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    face_id: Option<FaceId>,
}

/// On-disk shape file.
#[derive(Debug, Deserialize)]
struct ShapeFile {
    led_per_face: usize,
    sensors: usize,
    faces: Vec<FaceEntry>,
}

/// Immutable structural description of one sculpture shape.
#[derive(Debug)]
pub struct Geometry {
    pub name: String,
    pub leds_per_face: usize,
    pub num_faces: usize,
    pub sensor_count: usize,
    /// Face ids grouped by layer, bottom to top, ordered within each
    /// layer by the face's `index`.
    pub layers: Vec<Vec<FaceId>>,
    /// For each sensor, the faces it influences.
    pub sensor_to_faces: Vec<Vec<FaceId>>,
    /// For each face, the sensors that influence it. Mutual inverse of
    /// `sensor_to_faces` by construction.
    pub face_to_sensors: Vec<Vec<SensorId>>,
    /// 3D position of each face centre.
    pub face_positions: Vec<[f32; 3]>,
}

impl Geometry {
    /// Load and validate a shape descriptor from `path`. The shape name
    /// is the file stem.
    pub fn load(path: &Path) -> Result<Self, GeometryError> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(path).map_err(|source| GeometryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ShapeFile =
            serde_json::from_str(&content).map_err(|source| GeometryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(name, file)
    }

    /// Parse and validate a shape descriptor from a JSON string.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self, GeometryError> {
        let name = name.into();
        let file: ShapeFile =
            serde_json::from_str(json).map_err(|source| GeometryError::Parse {
                path: PathBuf::from(format!("{name}.json")),
                source,
            })?;
        Self::from_file(name, file)
    }

    fn from_file(name: String, file: ShapeFile) -> Result<Self, GeometryError> {
        if file.faces.is_empty() {
            return Err(GeometryError::NoFaces(name));
        }
        if file.led_per_face == 0 {
            return Err(GeometryError::NoLeds(name));
        }

        for (face, entry) in file.faces.iter().enumerate() {
            for &sensor in &entry.sensors {
                if sensor >= file.sensors {
                    return Err(GeometryError::SensorOutOfRange {
                        face,
                        sensor,
                        declared: file.sensors,
                    });
                }
            }
        }

        let num_faces = file.faces.len();
        let layers = derive_layers(&file.faces);
        let face_to_sensors: Vec<Vec<SensorId>> =
            file.faces.iter().map(|f| f.sensors.clone()).collect();
        let sensor_to_faces: Vec<Vec<FaceId>> = (0..file.sensors)
            .map(|sensor| {
                (0..num_faces)
                    .filter(|&face| face_to_sensors[face].contains(&sensor))
                    .collect()
            })
            .collect();
        let face_positions = file.faces.iter().map(|f| f.pos).collect();

        debug!(
            "loaded shape `{}`: {} faces x {} LEDs, {} sensors, {} layers",
            name,
            num_faces,
            file.led_per_face,
            file.sensors,
            layers.len()
        );

        Ok(Self {
            name,
            leds_per_face: file.led_per_face,
            num_faces,
            sensor_count: file.sensors,
            layers,
            sensor_to_faces,
            face_to_sensors,
            face_positions,
        })
    }

    /// Total number of addressable LEDs on the shape.
    pub fn led_count(&self) -> usize {
        self.leds_per_face * self.num_faces
    }

    /// Pixel index range covering one face.
    pub fn face_leds(&self, face: FaceId) -> Range<usize> {
        let start = self.leds_per_face * face;
        start..start + self.leds_per_face
    }
}

/// Group faces by `layer`, ordering each layer by `index`.
fn derive_layers(faces: &[FaceEntry]) -> Vec<Vec<FaceId>> {
    let max_layer = faces.iter().map(|f| f.layer).max().unwrap_or(0);
    let mut layers: Vec<Vec<(usize, FaceId)>> = vec![Vec::new(); max_layer + 1];
    for (position, face) in faces.iter().enumerate() {
        let id = face.face_id.unwrap_or(position);
        layers[face.layer].push((face.index, id));
    }
    layers
        .into_iter()
        .map(|mut layer| {
            layer.sort_by_key(|&(index, _)| index);
            layer.into_iter().map(|(_, id)| id).collect()
        })
        .collect()
}
