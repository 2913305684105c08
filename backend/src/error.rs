use thiserror::Error;

use crate::geocode::GeocodeError;
use crate::network::NetworkError;
use crate::routing::RouteFetchError;

/// Failure of one pipeline run. Points without a network match and
/// all-untagged segment sets are not failures; they degrade to empty
/// results upstream.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error(transparent)]
    Route(#[from] RouteFetchError),
    #[error("street network unavailable: {0}")]
    Network(#[from] NetworkError),
}
