pub mod analysis;
pub mod database;
pub mod image;
pub mod parser;
pub mod reconciler; // merges the two models' answers
pub mod stats;
pub mod vision; // OpenAI-compatible vision chat client

pub use analysis::AnalysisService;
pub use database::Database;
pub use image::ImageFetcher;
pub use stats::StatsService;
pub use vision::{VisionClient, VisionModel};
