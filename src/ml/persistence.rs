use crate::error::{AppError, Result};
use crate::ml::codec::LabelCodec;
use crate::ml::pipeline::FittedPipeline;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the serialized pipeline blob
pub const PIPELINE_FILE: &str = "pipeline.bin";

/// File name of the label mapping table
pub const ENCODER_FILE: &str = "encoder.json";

/// Bumped whenever the pipeline layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Binary wrapper around the pipeline payload
#[derive(Debug, Serialize, Deserialize)]
struct PipelineEnvelope {
    format_version: u32,
    checksum: String,
    payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ClassEntry {
    index: usize,
    label: String,
}

/// On-disk form of the label codec: an explicit index → label table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct EncoderDocument {
    format_version: u32,
    classes: Vec<ClassEntry>,
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Reads and writes the two model artifacts under one directory.
///
/// The pipeline and the codec are independent files; both must be present
/// for a load to succeed.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pipeline_path(&self) -> PathBuf {
        self.dir.join(PIPELINE_FILE)
    }

    pub fn encoder_path(&self) -> PathBuf {
        self.dir.join(ENCODER_FILE)
    }

    /// Check whether both artifacts exist
    pub fn exists(&self) -> bool {
        self.pipeline_path().is_file() && self.encoder_path().is_file()
    }

    /// Write both artifacts, creating the directory if needed.
    ///
    /// Both files are staged next to their targets and only renamed into
    /// place once every write succeeded.
    pub fn save(&self, pipeline: &FittedPipeline, codec: &LabelCodec) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let payload = bincode::serialize(pipeline)?;
        let envelope = PipelineEnvelope {
            format_version: ARTIFACT_FORMAT_VERSION,
            checksum: checksum(&payload),
            payload,
        };
        let document = EncoderDocument {
            format_version: ARTIFACT_FORMAT_VERSION,
            classes: codec
                .classes()
                .iter()
                .enumerate()
                .map(|(index, label)| ClassEntry {
                    index,
                    label: label.clone(),
                })
                .collect(),
        };

        let targets = [
            (self.pipeline_path(), bincode::serialize(&envelope)?),
            (self.encoder_path(), serde_json::to_vec_pretty(&document)?),
        ];

        let mut staged = Vec::with_capacity(targets.len());
        for (target, bytes) in &targets {
            let tmp = staging_path(target);
            if let Err(e) = fs::write(&tmp, bytes) {
                for path in &staged {
                    let _ = fs::remove_file(path);
                }
                return Err(e.into());
            }
            staged.push(tmp);
        }
        for ((target, _), tmp) in targets.iter().zip(&staged) {
            fs::rename(tmp, target)?;
        }

        info!("💾 Saved model artifacts to {}", self.dir.display());
        Ok(())
    }

    /// Read both artifacts back
    pub fn load(&self) -> Result<(FittedPipeline, LabelCodec)> {
        let missing: Vec<String> = [self.pipeline_path(), self.encoder_path()]
            .iter()
            .filter(|p| !p.is_file())
            .map(|p| p.display().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ArtifactMissing(missing.join(", ")));
        }

        let pipeline = self.load_pipeline()?;
        let codec = self.load_codec()?;

        if codec.n_classes() != pipeline.n_classes() {
            return Err(AppError::Serialization(format!(
                "label codec has {} classes but pipeline predicts {}",
                codec.n_classes(),
                pipeline.n_classes()
            )));
        }

        info!("📦 Loaded model artifacts from {}", self.dir.display());
        Ok((pipeline, codec))
    }

    fn load_pipeline(&self) -> Result<FittedPipeline> {
        let bytes = fs::read(self.pipeline_path())?;
        let envelope: PipelineEnvelope = bincode::deserialize(&bytes)?;

        if envelope.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "unsupported pipeline format version {} (expected {})",
                envelope.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        let actual = checksum(&envelope.payload);
        if actual != envelope.checksum {
            return Err(AppError::Serialization(format!(
                "pipeline checksum mismatch: expected {}, got {}",
                envelope.checksum, actual
            )));
        }
        debug!("Pipeline checksum verified: {}", actual);

        Ok(bincode::deserialize(&envelope.payload)?)
    }

    fn load_codec(&self) -> Result<LabelCodec> {
        let bytes = fs::read(self.encoder_path())?;
        let mut document: EncoderDocument = serde_json::from_slice(&bytes)?;

        if document.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "unsupported encoder format version {}",
                document.format_version
            )));
        }

        document.classes.sort_by_key(|entry| entry.index);
        if document
            .classes
            .iter()
            .enumerate()
            .any(|(i, entry)| entry.index != i)
        {
            return Err(AppError::Serialization(
                "encoder indices must be contiguous from 0".to_string(),
            ));
        }

        LabelCodec::from_classes(document.classes.into_iter().map(|e| e.label).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::ForestParams;
    use ndarray::array;
    use tempfile::TempDir;

    fn fitted() -> (FittedPipeline, LabelCodec) {
        let x = array![[0.0], [0.1], [0.2], [5.0], [5.1], [5.2]];
        let mut codec = LabelCodec::new();
        let y = codec
            .fit_transform(&["low", "low", "low", "high", "high", "high"])
            .unwrap();
        let params = ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        };
        let pipeline = FittedPipeline::fit(&["f".to_string()], &x, &y, 2, params, 7).unwrap();
        (pipeline, codec)
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));
        let (pipeline, codec) = fitted();

        assert!(!store.exists());
        store.save(&pipeline, &codec).unwrap();
        assert!(store.exists());

        let (loaded_pipeline, loaded_codec) = store.load().unwrap();
        assert_eq!(loaded_pipeline, pipeline);
        assert_eq!(loaded_codec, codec);
    }

    #[test]
    fn test_encoder_file_is_explicit_table() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (pipeline, codec) = fitted();
        store.save(&pipeline, &codec).unwrap();

        let text = fs::read_to_string(store.encoder_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["classes"][0]["index"], 0);
        assert_eq!(value["classes"][0]["label"], "high");
        assert_eq!(value["classes"][1]["label"], "low");
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(matches!(store.load(), Err(AppError::ArtifactMissing(_))));

        let (pipeline, codec) = fitted();
        store.save(&pipeline, &codec).unwrap();
        fs::remove_file(store.encoder_path()).unwrap();
        assert!(matches!(store.load(), Err(AppError::ArtifactMissing(_))));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (pipeline, codec) = fitted();
        store.save(&pipeline, &codec).unwrap();

        let bytes = fs::read(store.pipeline_path()).unwrap();
        let mut envelope: PipelineEnvelope = bincode::deserialize(&bytes).unwrap();
        let last = envelope.payload.len() - 1;
        envelope.payload[last] ^= 0xff;
        fs::write(store.pipeline_path(), bincode::serialize(&envelope).unwrap()).unwrap();

        assert!(matches!(store.load(), Err(AppError::Serialization(_))));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (pipeline, codec) = fitted();
        store.save(&pipeline, &codec).unwrap();

        let bytes = fs::read(store.pipeline_path()).unwrap();
        let mut envelope: PipelineEnvelope = bincode::deserialize(&bytes).unwrap();
        envelope.format_version = ARTIFACT_FORMAT_VERSION + 1;
        fs::write(store.pipeline_path(), bincode::serialize(&envelope).unwrap()).unwrap();

        assert!(matches!(store.load(), Err(AppError::Serialization(_))));
    }

    #[test]
    fn test_failed_save_keeps_previous_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let (pipeline, codec) = fitted();
        store.save(&pipeline, &codec).unwrap();
        let pipeline_before = fs::read(store.pipeline_path()).unwrap();

        // A directory squatting on the encoder staging path makes that write fail.
        fs::create_dir(staging_path(&store.encoder_path())).unwrap();
        let retrained = pipeline.clone().with_cv_score(0.5);
        assert!(matches!(store.save(&retrained, &codec), Err(AppError::Io(_))));

        assert_eq!(fs::read(store.pipeline_path()).unwrap(), pipeline_before);
        assert!(!staging_path(&store.pipeline_path()).exists());
        let (loaded, _) = store.load().unwrap();
        assert_eq!(loaded, pipeline);
    }
}
