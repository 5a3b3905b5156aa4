pub mod dataset;
pub mod history;
pub mod metrics;
pub mod run;

pub use dataset::{LabeledImage, discover};
pub use history::TrainingHistory;
pub use metrics::{ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use run::{Evaluation, evaluate};
