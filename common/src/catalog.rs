use serde::{Deserialize, Serialize};

/// One entry of the video catalog as served by the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub stream_url: String,
}
