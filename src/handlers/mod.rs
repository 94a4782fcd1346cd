pub mod analyse;

pub use analyse::AnalyseHandler;
