pub mod analysis;
pub mod history;

pub use analysis::{AnalysisSummary, Averages, ReadingRow};
pub use history::{HistoryEntry, HistoryRecord};
