use job_registry::BackfillReport;

use crate::config::{ConfigArgs, ServerConfig};
use crate::error::ServerError;

/// One-shot maintenance pass: backfill coordinates, print a summary.
pub fn run(args: ConfigArgs) -> Result<BackfillReport, ServerError> {
    let config = ServerConfig::load(&args.config)?;
    tracing::info!(config = %args.config, "loaded config");

    let registry = super::build_registry(&config)?;
    let table = super::coordinate_table(&config);
    let report = registry.assign_coordinates(&table);

    if !report.unavailable.is_empty() {
        tracing::warn!(partitions = ?report.unavailable, "some partitions were skipped");
    }
    println!(
        "Completed! Updated {} jobs across {} files.",
        report.jobs_updated, report.files_updated
    );
    Ok(report)
}
