//! Linkages Service

use epic_core::Question;
use epic_storage::EpicStore;

use crate::error::ApiResult;

/// Drop every linkages question and create one per existing program.
///
/// Answers to the dropped questions go with them.
pub async fn generate_linkages(store: &dyn EpicStore) -> ApiResult<Vec<Question>> {
    let created = store.regenerate_linkages().await?;
    tracing::info!(created = created.len(), "Generated one linkages question per program");
    Ok(created)
}
