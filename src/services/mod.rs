pub mod candidates;
pub mod maintenance;
pub mod pipeline;
pub mod providers;
pub mod reconciler;
pub mod recommendations;
pub mod refresher;
pub mod title_search;

pub use candidates::CandidateSetBuilder;
pub use maintenance::{unmonitor_present, DuplicateCleaner};
pub use pipeline::{run_pipeline, PipelineSummary, RunContext};
pub use reconciler::{CollectionReconciler, ReconcileReport, ReorderReport};
pub use refresher::{MembershipSource, OffPeakRefresher, RefreshSummary};
