mod image;
mod version;
mod zone;

pub use image::{Candidate, Generation, RankedSelection, RawImageRecord};
pub use version::{VersionKey, VersionToken};
pub use zone::{ResolutionRequest, ResolutionResponse, ZoneQuery, ZoneResult};
