pub mod episode;
pub mod formats;
pub mod media_info;
pub mod quality;
pub mod stream_info;

pub use episode::EpisodeId;
pub use formats::StreamFormat;
pub use media_info::{EpisodeStreams, ProviderFailure, ProviderResult, ResolutionStatus};
pub use quality::{
    Quality, QualityHints, QualityLabel, extract_quality, filter_by_min_quality,
    group_by_quality, sort_by_quality,
};
pub use stream_info::{Confidence, StreamCandidate};
