use thiserror::Error;

/// Invalid or inconsistent network data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("bus indices must form the dense range 0..{n}, found index {index}")]
    NonDenseBusIndex { index: i64, n: usize },

    #[error("duplicate bus index {0}")]
    DuplicateBus(i64),

    #[error("{element} {id} references unknown bus {bus}")]
    UnknownBus {
        element: &'static str,
        id: usize,
        bus: i64,
    },

    #[error("trafo {id}: vkr_percent {vkr_percent} exceeds vk_percent {vk_percent} or rating is invalid")]
    InvalidTrafoImpedance {
        id: usize,
        vk_percent: f64,
        vkr_percent: f64,
    },

    #[error("line {id}: series reactance {x_pu} p.u. is not usable")]
    InvalidLineImpedance { id: usize, x_pu: f64 },

    #[error("expected {expected} load scaling factors, got {got}")]
    LoadFactorCount { expected: usize, got: usize },

    #[error("network has no in-service external grid")]
    NoSlack,

    #[error("network table {table} is missing or malformed: {what}")]
    Table { table: String, what: String },
}

/// Failures of a power-flow solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PowerFlowError {
    #[error("power flow did not converge after {iterations} iterations (mismatch {mismatch:e})")]
    NotConverged { iterations: usize, mismatch: f64 },

    #[error("linear solve failed: {0}")]
    LinearSolve(&'static str),

    #[error("singular DC susceptance matrix")]
    SingularDc,

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Measurement selection or generation problems.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasError {
    #[error("unsupported measurement {meas_type} on {element_type} {element} (side {side})")]
    Unsupported {
        meas_type: String,
        element_type: String,
        element: usize,
        side: String,
    },

    #[error("template row for {element_type} {element} lists buses {side_idx}->{other_side_idx}, network has {expected:?}")]
    TemplateMismatch {
        element_type: String,
        element: usize,
        side_idx: i64,
        other_side_idx: i64,
        expected: (i64, i64),
    },

    #[error("{element_type} {element} does not exist in the network")]
    UnknownElement {
        element_type: String,
        element: usize,
    },

    #[error("sensitivity matrix has no row {0}")]
    MissingRow(String),

    #[error("network has no power-flow results")]
    NoResults,

    #[error("measurement {name} has a non-finite standard deviation {std_dev}")]
    InvalidStdDev { name: String, std_dev: f64 },
}

/// Invalid run configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("noise imposed on clean scenarios shall be either gaussian or uniform, got {0:?}")]
    UnknownNoiseMode(String),

    #[error("invalid configuration value for {field}: {what}")]
    Invalid { field: &'static str, what: String },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    PowerFlow(#[from] PowerFlowError),

    #[error(transparent)]
    Meas(#[from] MeasError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, Error>;
