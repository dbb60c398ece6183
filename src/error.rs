use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Aggregate,
    Detect,
    Forecast,
    Insight,
    Report,
    Drivers,
    Store,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Aggregate => "aggregate",
            Stage::Detect => "detect",
            Stage::Forecast => "forecast",
            Stage::Insight => "insight",
            Stage::Report => "report",
            Stage::Drivers => "drivers",
            Stage::Store => "store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[{stage}] data quality: {detail}")]
    DataQuality { stage: Stage, detail: String },

    #[error("[{stage}] insufficient history: need {required} rows, have {available}")]
    InsufficientHistory {
        stage: Stage,
        required: usize,
        available: usize,
    },

    #[error("[{stage}] computation error: {detail}")]
    Computation { stage: Stage, detail: String },

    #[error("[report] cannot write {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn data_quality(stage: Stage, detail: impl Into<String>) -> Self {
        PipelineError::DataQuality {
            stage,
            detail: detail.into(),
        }
    }

    pub fn computation(stage: Stage, detail: impl Into<String>) -> Self {
        PipelineError::Computation {
            stage,
            detail: detail.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
