use std::fs;
use std::path::Path;

use buoy_reader::{
    BuoyReader, Compression, CsvReader, DelimitedFormat, DelimitedOptions, InstrumentReader,
    StaReader, TextEncoding, TimeSpec, VariantSet,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hooks::hooks_descriptor;

/// One ingest pipeline: which readers handle which input files, and where the
/// standardized output goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub pipeline: PipelineInfo,
    pub retriever: RetrieverConfig,
    pub storage: StorageConfig,
    #[serde(default = "default_hooks")]
    pub hooks: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineInfo {
    pub name: String,
    pub location_id: String,
    /// e.g. `morro.buoy_z06-lidar-10m.a1`
    pub datastream: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrieverConfig {
    pub readers: Vec<ReaderRule>,
}

/// Files whose name matches `pattern` are read with `reader`. Rules are tried in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderRule {
    pub pattern: String,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub root: String,
}

fn default_hooks() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReaderConfig {
    Csv(CsvReaderConfig),
    Sta(StaReaderConfig),
    Buoy(BuoyReaderConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsvReaderConfig {
    pub time: TimeSpec,
    #[serde(default)]
    pub format: DelimitedFormat,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub encoding: TextEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaReaderConfig {
    #[serde(default = "default_sta_time")]
    pub time: TimeSpec,
    #[serde(default = "default_sta_compression")]
    pub compression: Compression,
    #[serde(default = "TextEncoding::windows_1252")]
    pub encoding: TextEncoding,
    #[serde(default = "default_sta_header_line")]
    pub header_line: usize,
}

impl Default for StaReaderConfig {
    fn default() -> Self {
        Self {
            time: default_sta_time(),
            compression: default_sta_compression(),
            encoding: TextEncoding::windows_1252(),
            header_line: default_sta_header_line(),
        }
    }
}

fn default_sta_time() -> TimeSpec {
    TimeSpec::new(buoy_reader::formats::STA_TIME_COLUMN)
        .with_format(buoy_reader::formats::STA_TIME_FORMAT)
}

fn default_sta_compression() -> Compression {
    Compression::Auto
}

fn default_sta_header_line() -> usize {
    buoy_reader::formats::schema::STA_HEADER_LINE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuoyReaderConfig {
    pub time: TimeSpec,
    /// Explicit variant tags. Without them each file's name selects the variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<VariantSet>,
    #[serde(default)]
    pub format: DelimitedFormat,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub encoding: TextEncoding,
}

impl ReaderConfig {
    pub fn code(&self) -> &'static str {
        match self {
            ReaderConfig::Csv(_) => CsvReader::NAME,
            ReaderConfig::Sta(_) => StaReader::NAME,
            ReaderConfig::Buoy(_) => BuoyReader::NAME,
        }
    }

    pub fn build(&self) -> Box<dyn InstrumentReader> {
        match self {
            ReaderConfig::Csv(config) => Box::new(CsvReader::with_options(DelimitedOptions {
                format: config.format.clone(),
                compression: config.compression,
                encoding: config.encoding,
                time: config.time.clone(),
            })),
            ReaderConfig::Sta(config) => Box::new(
                StaReader::new(config.time.clone())
                    .with_compression(config.compression)
                    .with_encoding(config.encoding)
                    .with_header_line(config.header_line),
            ),
            ReaderConfig::Buoy(config) => {
                let reader = BuoyReader::new(config.time.clone())
                    .with_format(config.format.clone())
                    .with_compression(config.compression)
                    .with_encoding(config.encoding);
                match &config.variants {
                    Some(variants) => Box::new(reader.with_variants(variants.clone())),
                    None => Box::new(reader),
                }
            }
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, &path.display().to_string())
    }

    /// `origin` names the document in errors.
    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                origin: origin.to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.datastream.trim().is_empty() {
            return Err(ConfigError::Invalid("pipeline.datastream is empty".into()));
        }
        if self.pipeline.datastream.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.datastream '{}' must not contain path separators",
                self.pipeline.datastream
            )));
        }
        if self.retriever.readers.is_empty() {
            return Err(ConfigError::Invalid(
                "retriever.readers must list at least one reader".into(),
            ));
        }
        for rule in &self.retriever.readers {
            rule.compiled_pattern()?;
        }
        if hooks_descriptor(&self.hooks).is_none() {
            return Err(ConfigError::UnknownHooks(self.hooks.clone()));
        }
        Ok(())
    }
}

impl ReaderRule {
    pub fn compiled_pattern(&self) -> Result<glob::Pattern, ConfigError> {
        glob::Pattern::new(&self.pattern).map_err(|source| ConfigError::Pattern {
            pattern: self.pattern.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buoy_reader::Variant;

    const METOCEAN: &str = r#"
pipeline:
  name: metocean
  location_id: morro
  datastream: morro.buoy_z06.a1
retriever:
  readers:
    - pattern: "*currents*.csv"
      reader:
        type: buoy
        time: { column: time }
        variants: [currents]
    - pattern: "*.sta.7z"
      reader:
        type: sta
storage:
  root: storage/root
"#;

    #[test]
    fn parses_reader_rules_in_order() {
        let config = PipelineConfig::from_yaml_str(METOCEAN, "inline").expect("valid config");

        assert_eq!(config.hooks, "default");
        assert_eq!(config.retriever.readers.len(), 2);
        match &config.retriever.readers[0].reader {
            ReaderConfig::Buoy(buoy) => {
                let variants = buoy.variants.as_ref().expect("explicit variants");
                assert!(variants.contains(Variant::Currents));
                assert_eq!(buoy.format, DelimitedFormat::comma());
            }
            other => panic!("unexpected reader {other:?}"),
        }
        assert_eq!(
            config.retriever.readers[1].reader,
            ReaderConfig::Sta(StaReaderConfig::default())
        );
        assert_eq!(config.retriever.readers[1].reader.code(), "sta");
    }

    #[test]
    fn rejects_unknown_fields() {
        let text = METOCEAN.replace("location_id: morro", "location_id: morro\n  site: z06");
        let err = PipelineConfig::from_yaml_str(&text, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn rejects_unknown_reader_type() {
        let text = METOCEAN.replace("type: sta", "type: imu");
        assert!(PipelineConfig::from_yaml_str(&text, "inline").is_err());
    }

    #[test]
    fn rejects_unknown_hooks() {
        let text = format!("{METOCEAN}hooks: plotting\n");
        let err = PipelineConfig::from_yaml_str(&text, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownHooks(ref name) if name == "plotting"));
    }

    #[test]
    fn rejects_bad_glob() {
        let text = METOCEAN.replace("\"*.sta.7z\"", "\"[.sta\"");
        let err = PipelineConfig::from_yaml_str(&text, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn builds_configured_reader() {
        let config = PipelineConfig::from_yaml_str(METOCEAN, "inline").expect("valid config");
        let reader = config.retriever.readers[0].reader.build();
        assert_eq!(reader.name(), "buoy");
    }
}
