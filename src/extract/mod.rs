mod strategy;


pub use strategy::ExtractionStrategy;

use crate::table::Record;
use tracing::info;

/// Clean every record with `strategy` and drop the ones left blank.
///
/// Blank texts cannot be encoded, so they never reach the pipeline.
pub fn prepare(records: Vec<Record>, strategy: &ExtractionStrategy) -> Vec<Record> {
    let before = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .map(|record| Record {
            text: strategy.extract(&record.text),
            external_id: record.external_id,
        })
        .filter(|record| !record.is_blank())
        .collect();

    info!(
        strategy = strategy.name(),
        kept = kept.len(),
        dropped = before - kept.len(),
        "prepared records"
    );
    kept
}
