use std::net::IpAddr;

/// Errors produced by the analysis engine.
///
/// Numeric edge effects (undefined smoothed or differenced buckets at
/// series boundaries) are not errors; they are absorbed as absent
/// values. Zero detected candidates is likewise a valid outcome.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    /// An endpoint appears in attribution traffic but has no metadata
    /// row at all. Surfaced instead of null-filling the ASN context.
    #[error("no metadata for endpoint {ip} present in attribution traffic")]
    MissingMetadata { ip: IpAddr },
}
