//! Terrace long-profile analysis: CSV loading, size filtering, tread
//! envelopes, plane-fit strike/dip, ENVI raster input.
pub mod area;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod plane;
pub mod profile;
pub mod raster;
pub mod table;

pub use error::{Result, TerraceError};
pub use filter::{filter_by_size, SizeBounds};
pub use pipeline::AnalysisConfig;
pub use plane::{estimate_dip, estimate_dips, DipEstimate, DipReport};
pub use profile::{extract_profiles, ChannelProfile, ProfileFilter, ProfileSet, TerraceProfile};
pub use raster::EnviRaster;
pub use table::{read_channel_csv, read_terrace_csv, ChannelTable, TerraceTable};
