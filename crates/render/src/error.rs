/// Errors raised by the render core and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("configuration value out of range: {field} = {value} (allowed {min}..={max})")]
    ConfigurationOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("degenerate frustum: viewport holds {columns}x{rows} pixel blocks")]
    DegenerateFrustum { columns: u32, rows: u32 },
    #[error("render target {width}x{height} exceeds the device limit of {max}")]
    TargetTooLarge { width: u32, height: u32, max: u32 },
    #[error("frame loop is not running: presentation surface not ready")]
    NotRunning,
    #[error("surface error: {0}")]
    Surface(String),
    #[error("present failed: {0}")]
    Present(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
