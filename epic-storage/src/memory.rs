//! In-memory store
//!
//! All state sits behind one lock, so each call is atomic. Single-record
//! writes check everything before changing anything and run in place; bulk
//! replacements and batches run against a copy that replaces the original
//! only when the whole operation succeeds.

use crate::{AgencySet, DomainTree, EpicStore, UserUpdate};
use async_trait::async_trait;
use epic_core::{
    check_compatibility, Agency, AgencyId, Answer, AnswerId, Area, AreaId, EntityType,
    EpicError, EpicOrganization, EpicResult, EpicUser, Group, GroupId, OrganizationId, Program,
    ProgramId, Question, QuestionId, QuestionKind, StorageError, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

fn not_found(entity_type: EntityType, id: uuid::Uuid) -> EpicError {
    StorageError::NotFound { entity_type, id }.into()
}

fn duplicate(entity_type: EntityType, reason: impl Into<String>) -> EpicError {
    StorageError::Duplicate {
        entity_type,
        reason: reason.into(),
    }
    .into()
}

fn sorted_by_key<T: Clone, K: Ord>(values: impl Iterator<Item = T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut out: Vec<T> = values.collect();
    out.sort_by_key(|v| key(v));
    out
}

#[derive(Debug, Clone, Default)]
struct State {
    areas: HashMap<AreaId, Area>,
    groups: HashMap<GroupId, Group>,
    programs: HashMap<ProgramId, Program>,
    agencies: HashMap<AgencyId, Agency>,
    questions: HashMap<QuestionId, Question>,
    answers: HashMap<AnswerId, Answer>,
    organizations: HashMap<OrganizationId, EpicOrganization>,
    users: HashMap<UserId, EpicUser>,
}

impl State {
    // === inserts ===

    fn insert_area(&mut self, area: &Area) -> EpicResult<()> {
        if self.areas.contains_key(&area.id) {
            return Err(duplicate(EntityType::Area, "already exists"));
        }
        self.areas.insert(area.id, area.clone());
        Ok(())
    }

    fn insert_group(&mut self, group: &Group) -> EpicResult<()> {
        if !self.areas.contains_key(&group.area_id) {
            return Err(not_found(EntityType::Area, group.area_id));
        }
        if self.groups.contains_key(&group.id) {
            return Err(duplicate(EntityType::Group, "already exists"));
        }
        self.groups.insert(group.id, group.clone());
        Ok(())
    }

    fn insert_program(&mut self, program: &Program) -> EpicResult<()> {
        if !self.groups.contains_key(&program.group_id) {
            return Err(not_found(EntityType::Group, program.group_id));
        }
        if self.programs.contains_key(&program.id) {
            return Err(duplicate(EntityType::Program, "already exists"));
        }
        if self.programs.values().any(|p| p.name_matches(&program.name)) {
            return Err(duplicate(
                EntityType::Program,
                format!("name '{}' is already taken", program.name),
            ));
        }
        if let Some(missing) = program.agency_ids.iter().find(|a| !self.agencies.contains_key(a)) {
            return Err(not_found(EntityType::Agency, *missing));
        }
        let mut program = program.clone();
        program.name = program.name.trim().to_string();
        self.programs.insert(program.id, program);
        Ok(())
    }

    fn insert_agency(&mut self, agency: &Agency) -> EpicResult<()> {
        if self.agencies.contains_key(&agency.id) {
            return Err(duplicate(EntityType::Agency, "already exists"));
        }
        self.agencies.insert(agency.id, agency.clone());
        Ok(())
    }

    fn link_agency(&mut self, agency_id: AgencyId, program_id: ProgramId) -> EpicResult<()> {
        if !self.agencies.contains_key(&agency_id) {
            return Err(not_found(EntityType::Agency, agency_id));
        }
        let program = self
            .programs
            .get_mut(&program_id)
            .ok_or_else(|| not_found(EntityType::Program, program_id))?;
        program.agency_ids.insert(agency_id);
        Ok(())
    }

    fn insert_question(&mut self, question: &Question) -> EpicResult<()> {
        if !self.programs.contains_key(&question.program_id) {
            return Err(not_found(EntityType::Program, question.program_id));
        }
        if self.questions.contains_key(&question.id) {
            return Err(duplicate(EntityType::Question, "already exists"));
        }
        if let Some(existing) = self.questions.values().find(|q| q.conflicts_with(question)) {
            return Err(duplicate(
                EntityType::Question,
                format!(
                    "'{}' clashes with {} question '{}' of the same program",
                    question.title,
                    existing.kind(),
                    existing.title
                ),
            ));
        }
        self.questions.insert(question.id, question.clone());
        Ok(())
    }

    fn check_answer(&self, answer: &Answer) -> EpicResult<()> {
        let question = self
            .questions
            .get(&answer.question_id)
            .ok_or_else(|| not_found(EntityType::Question, answer.question_id))?;
        check_compatibility(answer.kind(), question.kind())?;
        if let Some(selected) = answer.body.selected_programs() {
            if let Some(missing) = selected.iter().find(|p| !self.programs.contains_key(p)) {
                return Err(not_found(EntityType::Program, *missing));
            }
        }
        Ok(())
    }

    fn insert_answer(&mut self, answer: &Answer) -> EpicResult<()> {
        if !self.users.contains_key(&answer.user_id) {
            return Err(not_found(EntityType::User, answer.user_id));
        }
        self.check_answer(answer)?;
        if self.answers.contains_key(&answer.id)
            || self
                .answers
                .values()
                .any(|a| a.user_id == answer.user_id && a.question_id == answer.question_id)
        {
            return Err(duplicate(
                EntityType::Answer,
                format!(
                    "user {} already answered question {}",
                    answer.user_id, answer.question_id
                ),
            ));
        }
        self.answers.insert(answer.id, answer.clone());
        Ok(())
    }

    fn update_answer(&mut self, answer: &Answer) -> EpicResult<()> {
        let stored = self
            .answers
            .get(&answer.id)
            .ok_or_else(|| not_found(EntityType::Answer, answer.id))?;
        if stored.user_id != answer.user_id || stored.question_id != answer.question_id {
            return Err(StorageError::UpdateFailed {
                entity_type: EntityType::Answer,
                id: answer.id,
                reason: "user and question of an answer cannot change".to_string(),
            }
            .into());
        }
        self.check_answer(answer)?;
        self.answers.insert(answer.id, answer.clone());
        Ok(())
    }

    fn insert_organization(&mut self, organization: &EpicOrganization) -> EpicResult<()> {
        if self.organizations.contains_key(&organization.id) {
            return Err(duplicate(EntityType::Organization, "already exists"));
        }
        self.organizations.insert(organization.id, organization.clone());
        Ok(())
    }

    fn insert_user(&mut self, user: &EpicUser) -> EpicResult<()> {
        if let Some(org) = user.organization_id {
            if !self.organizations.contains_key(&org) {
                return Err(not_found(EntityType::Organization, org));
            }
        }
        if self.users.contains_key(&user.id) {
            return Err(duplicate(EntityType::User, "already exists"));
        }
        if self.users.values().any(|u| u.username == user.username) {
            return Err(duplicate(
                EntityType::User,
                format!("username '{}' is already taken", user.username),
            ));
        }
        self.users.insert(user.id, user.clone());
        Ok(())
    }

    // === cascading deletes ===

    fn delete_question(&mut self, id: QuestionId) -> EpicResult<()> {
        self.questions
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Question, id))?;
        self.answers.retain(|_, a| a.question_id != id);
        Ok(())
    }

    fn delete_program(&mut self, id: ProgramId) -> EpicResult<()> {
        self.programs
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Program, id))?;
        let questions: Vec<QuestionId> = self
            .questions
            .values()
            .filter(|q| q.program_id == id)
            .map(|q| q.id)
            .collect();
        for question_id in questions {
            self.delete_question(question_id)?;
        }
        for answer in self.answers.values_mut() {
            if let epic_core::AnswerBody::MultipleChoice { selected_programs } = &mut answer.body {
                selected_programs.remove(&id);
            }
        }
        for user in self.users.values_mut() {
            user.selected_programs.remove(&id);
        }
        Ok(())
    }

    fn delete_group(&mut self, id: GroupId) -> EpicResult<()> {
        self.groups
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Group, id))?;
        let programs: Vec<ProgramId> = self
            .programs
            .values()
            .filter(|p| p.group_id == id)
            .map(|p| p.id)
            .collect();
        for program_id in programs {
            self.delete_program(program_id)?;
        }
        Ok(())
    }

    fn delete_area(&mut self, id: AreaId) -> EpicResult<()> {
        self.areas
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Area, id))?;
        let groups: Vec<GroupId> = self
            .groups
            .values()
            .filter(|g| g.area_id == id)
            .map(|g| g.id)
            .collect();
        for group_id in groups {
            self.delete_group(group_id)?;
        }
        Ok(())
    }

    fn delete_agency(&mut self, id: AgencyId) -> EpicResult<()> {
        self.agencies
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Agency, id))?;
        for program in self.programs.values_mut() {
            program.agency_ids.remove(&id);
        }
        Ok(())
    }

    fn delete_user(&mut self, id: UserId) -> EpicResult<()> {
        self.users
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::User, id))?;
        self.answers.retain(|_, a| a.user_id != id);
        Ok(())
    }

    fn delete_organization(&mut self, id: OrganizationId) -> EpicResult<()> {
        self.organizations
            .remove(&id)
            .ok_or_else(|| not_found(EntityType::Organization, id))?;
        let members: Vec<UserId> = self
            .users
            .values()
            .filter(|u| u.organization_id == Some(id))
            .map(|u| u.id)
            .collect();
        for user_id in members {
            self.delete_user(user_id)?;
        }
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory store used for development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> EpicResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    /// Mutate the state in place. `f` must finish its checks before its first
    /// change, so an error leaves the state as it was.
    fn write<T>(&self, f: impl FnOnce(&mut State) -> EpicResult<T>) -> EpicResult<T> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| EpicError::from(StorageError::LockPoisoned))?;
        f(&mut guard)
    }

    /// Run `f` against a copy of the state and publish it only on success.
    /// Only multi-record writes that may fail halfway pay for the copy.
    fn transaction<T>(&self, f: impl FnOnce(&mut State) -> EpicResult<T>) -> EpicResult<T> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| EpicError::from(StorageError::LockPoisoned))?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        *guard = next;
        Ok(out)
    }

    /// Remove everything.
    pub fn clear(&self) -> EpicResult<()> {
        self.write(|state| {
            *state = State::default();
            Ok(())
        })
    }

    pub fn answer_count(&self) -> EpicResult<usize> {
        Ok(self.read()?.answers.len())
    }

    pub fn question_count(&self) -> EpicResult<usize> {
        Ok(self.read()?.questions.len())
    }

    pub fn program_count(&self) -> EpicResult<usize> {
        Ok(self.read()?.programs.len())
    }
}

#[async_trait]
impl EpicStore for InMemoryStore {
    // === Areas ===

    async fn area_insert(&self, area: &Area) -> EpicResult<()> {
        self.write(|s| s.insert_area(area))
    }

    async fn area_get(&self, id: AreaId) -> EpicResult<Option<Area>> {
        Ok(self.read()?.areas.get(&id).cloned())
    }

    async fn area_list(&self) -> EpicResult<Vec<Area>> {
        Ok(sorted_by_key(self.read()?.areas.values().cloned(), |a| a.name.clone()))
    }

    async fn area_delete(&self, id: AreaId) -> EpicResult<()> {
        self.write(|s| s.delete_area(id))
    }

    // === Groups ===

    async fn group_insert(&self, group: &Group) -> EpicResult<()> {
        self.write(|s| s.insert_group(group))
    }

    async fn group_get(&self, id: GroupId) -> EpicResult<Option<Group>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    async fn group_list(&self) -> EpicResult<Vec<Group>> {
        Ok(sorted_by_key(self.read()?.groups.values().cloned(), |g| g.name.clone()))
    }

    async fn group_list_by_area(&self, area_id: AreaId) -> EpicResult<Vec<Group>> {
        let state = self.read()?;
        let groups = state.groups.values().filter(|g| g.area_id == area_id).cloned();
        Ok(sorted_by_key(groups, |g| g.name.clone()))
    }

    async fn group_delete(&self, id: GroupId) -> EpicResult<()> {
        self.write(|s| s.delete_group(id))
    }

    // === Programs ===

    async fn program_insert(&self, program: &Program) -> EpicResult<()> {
        self.write(|s| s.insert_program(program))
    }

    async fn program_get(&self, id: ProgramId) -> EpicResult<Option<Program>> {
        Ok(self.read()?.programs.get(&id).cloned())
    }

    async fn program_find_by_name(&self, name: &str) -> EpicResult<Option<Program>> {
        Ok(self
            .read()?
            .programs
            .values()
            .find(|p| p.name_matches(name))
            .cloned())
    }

    async fn program_list(&self) -> EpicResult<Vec<Program>> {
        Ok(sorted_by_key(self.read()?.programs.values().cloned(), |p| p.name.clone()))
    }

    async fn program_list_by_group(&self, group_id: GroupId) -> EpicResult<Vec<Program>> {
        let state = self.read()?;
        let programs = state.programs.values().filter(|p| p.group_id == group_id).cloned();
        Ok(sorted_by_key(programs, |p| p.name.clone()))
    }

    async fn program_delete(&self, id: ProgramId) -> EpicResult<()> {
        self.write(|s| s.delete_program(id))
    }

    // === Agencies ===

    async fn agency_insert(&self, agency: &Agency) -> EpicResult<()> {
        self.write(|s| s.insert_agency(agency))
    }

    async fn agency_get(&self, id: AgencyId) -> EpicResult<Option<Agency>> {
        Ok(self.read()?.agencies.get(&id).cloned())
    }

    async fn agency_list(&self) -> EpicResult<Vec<Agency>> {
        Ok(sorted_by_key(self.read()?.agencies.values().cloned(), |a| a.name.clone()))
    }

    async fn agency_link_program(&self, agency_id: AgencyId, program_id: ProgramId) -> EpicResult<()> {
        self.write(|s| s.link_agency(agency_id, program_id))
    }

    async fn agency_delete(&self, id: AgencyId) -> EpicResult<()> {
        self.write(|s| s.delete_agency(id))
    }

    // === Questions ===

    async fn question_insert(&self, question: &Question) -> EpicResult<()> {
        self.write(|s| s.insert_question(question))
    }

    async fn question_get(&self, id: QuestionId) -> EpicResult<Option<Question>> {
        Ok(self.read()?.questions.get(&id).cloned())
    }

    async fn question_list(&self) -> EpicResult<Vec<Question>> {
        Ok(sorted_by_key(self.read()?.questions.values().cloned(), |q| q.id))
    }

    async fn question_list_by_program(&self, program_id: ProgramId) -> EpicResult<Vec<Question>> {
        let state = self.read()?;
        let questions = state
            .questions
            .values()
            .filter(|q| q.program_id == program_id)
            .cloned();
        Ok(sorted_by_key(questions, |q| q.id))
    }

    async fn question_list_by_kind(&self, kind: QuestionKind) -> EpicResult<Vec<Question>> {
        let state = self.read()?;
        let questions = state.questions.values().filter(|q| q.kind() == kind).cloned();
        Ok(sorted_by_key(questions, |q| q.id))
    }

    async fn question_delete(&self, id: QuestionId) -> EpicResult<()> {
        self.write(|s| s.delete_question(id))
    }

    // === Answers ===

    async fn answer_insert(&self, answer: &Answer) -> EpicResult<()> {
        self.write(|s| s.insert_answer(answer))
    }

    async fn answer_get(&self, id: AnswerId) -> EpicResult<Option<Answer>> {
        Ok(self.read()?.answers.get(&id).cloned())
    }

    async fn answer_find(&self, user_id: UserId, question_id: QuestionId) -> EpicResult<Option<Answer>> {
        Ok(self
            .read()?
            .answers
            .values()
            .find(|a| a.user_id == user_id && a.question_id == question_id)
            .cloned())
    }

    async fn answer_list(&self) -> EpicResult<Vec<Answer>> {
        Ok(sorted_by_key(self.read()?.answers.values().cloned(), |a| a.id))
    }

    async fn answer_list_by_question(&self, question_id: QuestionId) -> EpicResult<Vec<Answer>> {
        let state = self.read()?;
        let answers = state
            .answers
            .values()
            .filter(|a| a.question_id == question_id)
            .cloned();
        Ok(sorted_by_key(answers, |a| a.id))
    }

    async fn answer_list_by_user(&self, user_id: UserId) -> EpicResult<Vec<Answer>> {
        let state = self.read()?;
        let answers = state.answers.values().filter(|a| a.user_id == user_id).cloned();
        Ok(sorted_by_key(answers, |a| a.id))
    }

    async fn answer_update(&self, answer: &Answer) -> EpicResult<()> {
        self.write(|s| s.update_answer(answer))
    }

    async fn answer_delete(&self, id: AnswerId) -> EpicResult<()> {
        self.write(|s| {
            s.answers
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| not_found(EntityType::Answer, id))
        })
    }

    // === Organizations ===

    async fn organization_insert(&self, organization: &EpicOrganization) -> EpicResult<()> {
        self.write(|s| s.insert_organization(organization))
    }

    async fn organization_get(&self, id: OrganizationId) -> EpicResult<Option<EpicOrganization>> {
        Ok(self.read()?.organizations.get(&id).cloned())
    }

    async fn organization_list(&self) -> EpicResult<Vec<EpicOrganization>> {
        Ok(sorted_by_key(self.read()?.organizations.values().cloned(), |o| o.name.clone()))
    }

    async fn organization_delete(&self, id: OrganizationId) -> EpicResult<()> {
        self.write(|s| s.delete_organization(id))
    }

    // === Users ===

    async fn user_insert(&self, user: &EpicUser) -> EpicResult<()> {
        self.write(|s| s.insert_user(user))
    }

    async fn users_insert_batch(&self, users: &[EpicUser]) -> EpicResult<()> {
        self.transaction(|s| users.iter().try_for_each(|u| s.insert_user(u)))
    }

    async fn user_get(&self, id: UserId) -> EpicResult<Option<EpicUser>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn user_find_by_username(&self, username: &str) -> EpicResult<Option<EpicUser>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn user_list(&self) -> EpicResult<Vec<EpicUser>> {
        Ok(sorted_by_key(self.read()?.users.values().cloned(), |u| u.username.clone()))
    }

    async fn user_list_by_organization(&self, organization_id: OrganizationId) -> EpicResult<Vec<EpicUser>> {
        let state = self.read()?;
        let users = state
            .users
            .values()
            .filter(|u| u.organization_id == Some(organization_id))
            .cloned();
        Ok(sorted_by_key(users, |u| u.username.clone()))
    }

    async fn user_update(&self, id: UserId, update: UserUpdate) -> EpicResult<EpicUser> {
        self.write(|s| {
            if let Some(selected) = &update.selected_programs {
                if let Some(missing) = selected.iter().find(|p| !s.programs.contains_key(p)) {
                    return Err(not_found(EntityType::Program, *missing));
                }
            }
            let user = s
                .users
                .get_mut(&id)
                .ok_or_else(|| not_found(EntityType::User, id))?;
            if let Some(selected) = update.selected_programs {
                user.selected_programs = selected;
            }
            if let Some(hash) = update.password_hash {
                user.password_hash = hash;
            }
            if let Some(is_advisor) = update.is_advisor {
                user.is_advisor = is_advisor;
            }
            Ok(user.clone())
        })
    }

    async fn user_delete(&self, id: UserId) -> EpicResult<()> {
        self.write(|s| s.delete_user(id))
    }

    // === Bulk replacement ===

    async fn replace_domain(&self, tree: &DomainTree) -> EpicResult<()> {
        self.transaction(|s| {
            let areas: Vec<AreaId> = s.areas.keys().copied().collect();
            for area_id in areas {
                s.delete_area(area_id)?;
            }
            // Orphaned groups or programs would survive the area cascade.
            let groups: Vec<GroupId> = s.groups.keys().copied().collect();
            for group_id in groups {
                s.delete_group(group_id)?;
            }
            tree.areas.iter().try_for_each(|a| s.insert_area(a))?;
            tree.groups.iter().try_for_each(|g| s.insert_group(g))?;
            tree.programs.iter().try_for_each(|p| s.insert_program(p))
        })
    }

    async fn replace_agencies(&self, set: &AgencySet) -> EpicResult<()> {
        self.transaction(|s| {
            let agencies: Vec<AgencyId> = s.agencies.keys().copied().collect();
            for agency_id in agencies {
                s.delete_agency(agency_id)?;
            }
            set.agencies.iter().try_for_each(|a| s.insert_agency(a))?;
            set.links
                .iter()
                .try_for_each(|(agency_id, program_id)| s.link_agency(*agency_id, *program_id))
        })
    }

    async fn replace_questions(&self, kind: QuestionKind, questions: &[Question]) -> EpicResult<()> {
        self.transaction(|s| {
            let existing: Vec<QuestionId> = s
                .questions
                .values()
                .filter(|q| q.kind() == kind)
                .map(|q| q.id)
                .collect();
            for question_id in existing {
                s.delete_question(question_id)?;
            }
            for question in questions {
                if question.kind() != kind {
                    return Err(StorageError::InsertFailed {
                        entity_type: EntityType::Question,
                        reason: format!("expected {} question, got {}", kind, question.kind()),
                    }
                    .into());
                }
                s.insert_question(question)?;
            }
            Ok(())
        })
    }

    async fn regenerate_linkages(&self) -> EpicResult<Vec<Question>> {
        self.transaction(|s| {
            let existing: Vec<QuestionId> = s
                .questions
                .values()
                .filter(|q| q.kind() == QuestionKind::Linkages)
                .map(|q| q.id)
                .collect();
            for question_id in existing {
                s.delete_question(question_id)?;
            }
            let mut program_ids: Vec<(String, ProgramId)> =
                s.programs.values().map(|p| (p.name.clone(), p.id)).collect();
            program_ids.sort();
            let mut created = Vec::with_capacity(program_ids.len());
            for (_, program_id) in program_ids {
                let question = Question::linkages(program_id);
                s.insert_question(&question)?;
                created.push(question);
            }
            Ok(created)
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use epic_core::{AnswerBody, QuestionBody, YesNoChoice};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    struct Fixture {
        store: InMemoryStore,
        area: Area,
        group: Group,
        program: Program,
        question: Question,
        user: EpicUser,
    }

    async fn make_test_fixture() -> Fixture {
        let store = InMemoryStore::new();
        let area = Area::new("Water");
        let group = Group::new("Flooding", area.id);
        let program = Program::new("Dikes", "Coastal defence", group.id);
        let question = Question::new(
            "Is there a national framework?",
            program.id,
            QuestionBody::NationalFramework {
                description: "Framework".to_string(),
            },
        );
        let user = EpicUser::new("zelda", None);
        store.area_insert(&area).await.unwrap();
        store.group_insert(&group).await.unwrap();
        store.program_insert(&program).await.unwrap();
        store.question_insert(&question).await.unwrap();
        store.user_insert(&user).await.unwrap();
        Fixture {
            store,
            area,
            group,
            program,
            question,
            user,
        }
    }

    fn yes_answer(user: &EpicUser, question: &Question) -> Answer {
        Answer::new(
            user.id,
            question,
            AnswerBody::YesNo {
                short_answer: Some(YesNoChoice::Yes),
                justify_answer: "because".to_string(),
            },
        )
        .unwrap()
    }

    // ========================================================================
    // Cascades
    // ========================================================================

    #[tokio::test]
    async fn test_area_delete_cascades_to_answers() {
        let f = make_test_fixture().await;
        f.store
            .answer_insert(&yes_answer(&f.user, &f.question))
            .await
            .unwrap();

        f.store.area_delete(f.area.id).await.unwrap();

        assert!(f.store.group_get(f.group.id).await.unwrap().is_none());
        assert!(f.store.program_get(f.program.id).await.unwrap().is_none());
        assert!(f.store.question_get(f.question.id).await.unwrap().is_none());
        assert_eq!(f.store.answer_count().unwrap(), 0);
        assert!(f.store.user_get(f.user.id).await.unwrap().is_some());
    }

    /// Adds a yes/no question under `program` and answers it as `user`.
    async fn answered_question(store: &InMemoryStore, program: &Program, user: &EpicUser) -> Question {
        let question = Question::new(
            format!("Framework for {}", program.name),
            program.id,
            QuestionBody::NationalFramework {
                description: String::new(),
            },
        );
        store.question_insert(&question).await.unwrap();
        store.answer_insert(&yes_answer(user, &question)).await.unwrap();
        question
    }

    #[tokio::test]
    async fn test_area_delete_removes_whole_subtree_only() {
        let f = make_test_fixture().await;
        f.store
            .answer_insert(&yes_answer(&f.user, &f.question))
            .await
            .unwrap();

        let area = Area::new("Energy");
        let g1 = Group::new("Grid", area.id);
        let g2 = Group::new("Storage", area.id);
        let p1 = Program::new("Cables", "", g1.id);
        let p2 = Program::new("Substations", "", g1.id);
        let p3 = Program::new("Batteries", "", g2.id);
        f.store.area_insert(&area).await.unwrap();
        f.store.group_insert(&g1).await.unwrap();
        f.store.group_insert(&g2).await.unwrap();
        let mut questions = Vec::new();
        for program in [&p1, &p2, &p3] {
            f.store.program_insert(program).await.unwrap();
            questions.push(answered_question(&f.store, program, &f.user).await);
        }
        assert_eq!(f.store.answer_count().unwrap(), 4);

        f.store.area_delete(area.id).await.unwrap();

        assert!(f.store.area_get(area.id).await.unwrap().is_none());
        for group in [&g1, &g2] {
            assert!(f.store.group_get(group.id).await.unwrap().is_none());
        }
        for program in [&p1, &p2, &p3] {
            assert!(f.store.program_get(program.id).await.unwrap().is_none());
        }
        for question in &questions {
            assert!(f.store.question_get(question.id).await.unwrap().is_none());
            let answers = f.store.answer_list_by_question(question.id).await.unwrap();
            assert!(answers.is_empty());
        }

        assert!(f.store.area_get(f.area.id).await.unwrap().is_some());
        assert!(f.store.group_get(f.group.id).await.unwrap().is_some());
        assert!(f.store.program_get(f.program.id).await.unwrap().is_some());
        assert!(f.store.question_get(f.question.id).await.unwrap().is_some());
        assert_eq!(f.store.answer_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_program_delete_clears_selections() {
        let f = make_test_fixture().await;
        let other = Program::new("Pumps", "", f.group.id);
        f.store.program_insert(&other).await.unwrap();
        let linkages = Question::linkages(other.id);
        f.store.question_insert(&linkages).await.unwrap();
        let answer = Answer::new(
            f.user.id,
            &linkages,
            AnswerBody::MultipleChoice {
                selected_programs: BTreeSet::from([f.program.id]),
            },
        )
        .unwrap();
        f.store.answer_insert(&answer).await.unwrap();
        f.store
            .user_update(
                f.user.id,
                UserUpdate {
                    selected_programs: Some(BTreeSet::from([f.program.id, other.id])),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        f.store.program_delete(f.program.id).await.unwrap();

        let stored = f.store.answer_get(answer.id).await.unwrap().unwrap();
        assert_eq!(stored.body.selected_programs(), Some(&BTreeSet::new()));
        let user = f.store.user_get(f.user.id).await.unwrap().unwrap();
        assert_eq!(user.selected_programs, BTreeSet::from([other.id]));
    }

    #[tokio::test]
    async fn test_agency_delete_keeps_programs() {
        let f = make_test_fixture().await;
        let agency = Agency::new("Rijkswaterstaat");
        f.store.agency_insert(&agency).await.unwrap();
        f.store
            .agency_link_program(agency.id, f.program.id)
            .await
            .unwrap();

        f.store.agency_delete(agency.id).await.unwrap();

        let program = f.store.program_get(f.program.id).await.unwrap().unwrap();
        assert!(program.agency_ids.is_empty());
    }

    #[tokio::test]
    async fn test_organization_delete_cascades_to_users() {
        let store = InMemoryStore::new();
        let org = EpicOrganization::new("Deltares");
        store.organization_insert(&org).await.unwrap();
        let user = EpicUser::new("ganon", Some(org.id));
        store.user_insert(&user).await.unwrap();

        store.organization_delete(org.id).await.unwrap();

        assert!(store.user_get(user.id).await.unwrap().is_none());
    }

    // ========================================================================
    // Uniqueness and integrity
    // ========================================================================

    #[tokio::test]
    async fn test_duplicate_answer_rejected() {
        let f = make_test_fixture().await;
        f.store
            .answer_insert(&yes_answer(&f.user, &f.question))
            .await
            .unwrap();

        let err = f
            .store
            .answer_insert(&yes_answer(&f.user, &f.question))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EpicError::Storage(StorageError::Duplicate { .. })
        ));
        assert_eq!(f.store.answer_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incompatible_answer_rejected() {
        let f = make_test_fixture().await;
        let mut answer = yes_answer(&f.user, &f.question);
        answer.body = AnswerBody::MultipleChoice {
            selected_programs: BTreeSet::new(),
        };

        let err = f.store.answer_insert(&answer).await.unwrap_err();

        assert!(matches!(
            err,
            EpicError::Integrity(epic_core::IntegrityError::UnsupportedQuestionType { .. })
        ));
    }

    #[tokio::test]
    async fn test_program_name_unique_ignoring_case() {
        let f = make_test_fixture().await;
        let clash = Program::new("  DIKES ", "", f.group.id);
        let err = f.store.program_insert(&clash).await.unwrap_err();
        assert!(matches!(err, EpicError::Storage(StorageError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_program_names_are_stored_and_matched_trimmed() {
        let f = make_test_fixture().await;
        let mut padded = Program::new("Pumps", "", f.group.id);
        padded.name = "Pumps  ".to_string();
        f.store.program_insert(&padded).await.unwrap();

        let stored = f.store.program_get(padded.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Pumps");
        let found = f.store.program_find_by_name(" pumps").await.unwrap().unwrap();
        assert_eq!(found.id, padded.id);
    }

    #[tokio::test]
    async fn test_question_title_unique_per_program() {
        let f = make_test_fixture().await;
        let clash = Question::new(
            f.question.title.clone(),
            f.program.id,
            QuestionBody::KeyAgencyActions {
                description: String::new(),
            },
        );
        assert!(f.store.question_insert(&clash).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_users() {
        let store = InMemoryStore::new();
        let users = vec![EpicUser::new("luke", None), EpicUser::new("luke", None)];

        assert!(store.users_insert_batch(&users).await.is_err());
        assert!(store.user_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_writes_change_nothing() {
        let f = make_test_fixture().await;
        let answer = yes_answer(&f.user, &f.question);
        f.store.answer_insert(&answer).await.unwrap();

        // Second answer to the same question by the same user.
        let again = yes_answer(&f.user, &f.question);
        assert!(f.store.answer_insert(&again).await.is_err());

        // Body of the wrong kind for a yes/no question.
        let mut mismatched = answer.clone();
        mismatched.body = AnswerBody::MultipleChoice {
            selected_programs: BTreeSet::from([f.program.id]),
        };
        assert!(f.store.answer_update(&mismatched).await.is_err());

        let mut pumps = Program::new("Pumps", "", f.group.id);
        pumps.agency_ids.insert(Agency::new("Ghost").id);
        assert!(f.store.program_insert(&pumps).await.is_err());

        let update = UserUpdate {
            selected_programs: Some(BTreeSet::from([f.program.id, pumps.id])),
            is_advisor: Some(true),
            ..Default::default()
        };
        assert!(f.store.user_update(f.user.id, update).await.is_err());

        assert_eq!(f.store.answer_list().await.unwrap(), vec![answer.clone()]);
        assert_eq!(f.store.program_list().await.unwrap(), vec![f.program.clone()]);
        let user = f.store.user_get(f.user.id).await.unwrap().unwrap();
        assert_eq!(user, f.user);

        let mut changed = answer.clone();
        changed.body = AnswerBody::YesNo {
            short_answer: Some(YesNoChoice::No),
            justify_answer: "changed my mind".to_string(),
        };
        f.store.answer_update(&changed).await.unwrap();
        let stored = f.store.answer_get(answer.id).await.unwrap().unwrap();
        assert_eq!(stored, changed);
    }

    // ========================================================================
    // Bulk replacement
    // ========================================================================

    #[tokio::test]
    async fn test_replace_questions_only_touches_kind() {
        let f = make_test_fixture().await;
        let linkages = Question::linkages(f.program.id);
        f.store.question_insert(&linkages).await.unwrap();

        let fresh = Question::new(
            "New framework",
            f.program.id,
            QuestionBody::NationalFramework {
                description: String::new(),
            },
        );
        f.store
            .replace_questions(QuestionKind::NationalFramework, std::slice::from_ref(&fresh))
            .await
            .unwrap();

        let all = f.store.question_list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|q| q.id == linkages.id));
        assert!(all.iter().any(|q| q.id == fresh.id));
    }

    #[tokio::test]
    async fn test_replace_domain_is_all_or_nothing() {
        let f = make_test_fixture().await;
        let area = Area::new("Soil");
        let group = Group::new("Erosion", area.id);
        let tree = DomainTree {
            areas: vec![area],
            groups: vec![group.clone()],
            programs: vec![
                Program::new("Same", "", group.id),
                Program::new("same", "", group.id),
            ],
        };

        assert!(f.store.replace_domain(&tree).await.is_err());
        assert!(f.store.area_get(f.area.id).await.unwrap().is_some());
        assert_eq!(f.store.program_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_linkages_one_per_program() {
        let f = make_test_fixture().await;
        f.store
            .program_insert(&Program::new("Pumps", "", f.group.id))
            .await
            .unwrap();

        let first = f.store.regenerate_linkages().await.unwrap();
        let second = f.store.regenerate_linkages().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        let linkages = f
            .store
            .question_list_by_kind(QuestionKind::Linkages)
            .await
            .unwrap();
        assert_eq!(linkages.len(), 2);
    }

    // ========================================================================
    // Property-Based Tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Property: deleting a program leaves no question or answer pointing at it
        #[test]
        fn prop_program_delete_leaves_no_orphans(question_count in 1usize..6, answered in 0usize..6) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let f = make_test_fixture().await;
                let mut questions = vec![f.question.clone()];
                for i in 1..question_count {
                    let q = Question::new(
                        format!("Question {i}"),
                        f.program.id,
                        QuestionBody::NationalFramework { description: String::new() },
                    );
                    f.store.question_insert(&q).await.unwrap();
                    questions.push(q);
                }
                for q in questions.iter().take(answered) {
                    f.store.answer_insert(&yes_answer(&f.user, q)).await.unwrap();
                }

                f.store.program_delete(f.program.id).await.unwrap();

                prop_assert_eq!(f.store.question_count().unwrap(), 0);
                prop_assert_eq!(f.store.answer_count().unwrap(), 0);
                Ok(())
            })?;
        }

        /// Property: deleting an area removes every group, program, question and
        /// answer beneath it and nothing beneath a sibling area
        #[test]
        fn prop_area_delete_removes_exactly_its_subtree(
            programs_per_group in prop::collection::vec(0usize..4, 1..5),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let f = make_test_fixture().await;
                f.store.answer_insert(&yes_answer(&f.user, &f.question)).await.unwrap();

                let area = Area::new("Energy");
                f.store.area_insert(&area).await.unwrap();
                for (g, count) in programs_per_group.iter().enumerate() {
                    let group = Group::new(format!("Group {g}"), area.id);
                    f.store.group_insert(&group).await.unwrap();
                    for p in 0..*count {
                        let program = Program::new(format!("Program {g}.{p}"), "", group.id);
                        f.store.program_insert(&program).await.unwrap();
                        answered_question(&f.store, &program, &f.user).await;
                    }
                }

                f.store.area_delete(area.id).await.unwrap();

                let groups = f.store.group_list().await.unwrap();
                prop_assert_eq!(groups, vec![f.group.clone()]);
                let programs = f.store.program_list().await.unwrap();
                prop_assert_eq!(programs, vec![f.program.clone()]);
                let questions = f.store.question_list().await.unwrap();
                prop_assert_eq!(questions, vec![f.question.clone()]);
                let answers = f.store.answer_list().await.unwrap();
                prop_assert_eq!(answers.len(), 1);
                prop_assert_eq!(answers[0].question_id, f.question.id);
                Ok(())
            })?;
        }
    }
}
