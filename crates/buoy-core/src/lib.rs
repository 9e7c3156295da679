pub mod config;
pub mod error;
pub mod export;
pub mod filenames;
pub mod hooks;
pub mod pipeline;
pub mod plots;
pub mod storage;

pub use config::{PipelineConfig, ReaderConfig, ReaderRule};
pub use error::{ConfigError, PipelineError, Result};
pub use export::dataset_to_dataframe;
pub use filenames::{output_filename, start_date_and_time};
pub use hooks::{all_hooks_descriptors, resolve_hooks, PipelineHooks, PlotContext};
pub use pipeline::{IngestPipeline, PipelineOutput};
pub use plots::{plot_profile_heatmap, plot_time_series};
pub use storage::{SavedDataset, Storage};
