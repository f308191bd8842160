//! Progress Service

use epic_core::{compute_progress, EntityType, EpicUser, ProgramId, Progress, StorageError};
use epic_storage::EpicStore;

use crate::error::ApiResult;

/// How far `user` got through the questions of a program.
pub async fn program_progress(
    store: &dyn EpicStore,
    program_id: ProgramId,
    user: &EpicUser,
) -> ApiResult<Progress> {
    if store.program_get(program_id).await?.is_none() {
        return Err(StorageError::NotFound {
            entity_type: EntityType::Program,
            id: program_id,
        }
        .into());
    }
    let questions = store.question_list_by_program(program_id).await?;
    let answers = store.answer_list_by_user(user.id).await?;
    Ok(compute_progress(&questions, &answers))
}
