//! EPIC Test Utilities
//!
//! Shared test infrastructure for the EPIC workspace:
//! - Proptest generators for answer bodies and users
//! - A seeded catalog with one question of every kind
//! - Organizations with members for visibility scenarios

pub use epic_storage::InMemoryStore;

pub use epic_core::{
    Agency, Answer, AnswerBody, Area, EpicOrganization, EpicResult, EpicUser, EvolutionChoice,
    Group, Program, ProgramId, Question, QuestionBody, QuestionKind, UserId, YesNoChoice,
};

use epic_storage::EpicStore;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for EPIC answers and users.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    pub fn arb_yes_no_choice() -> impl Strategy<Value = YesNoChoice> {
        prop_oneof![Just(YesNoChoice::Yes), Just(YesNoChoice::No)]
    }

    pub fn arb_evolution_choice() -> impl Strategy<Value = EvolutionChoice> {
        prop_oneof![
            Just(EvolutionChoice::Nascent),
            Just(EvolutionChoice::Engaged),
            Just(EvolutionChoice::Capable),
            Just(EvolutionChoice::Effective),
        ]
    }

    /// Justification text, blank about a third of the time.
    pub fn arb_justification() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[A-Za-z][A-Za-z ]{0,40}"]
    }

    /// A yes/no body, unanswered about a quarter of the time.
    pub fn arb_yes_no_body() -> impl Strategy<Value = AnswerBody> {
        (prop::option::weighted(0.75, arb_yes_no_choice()), arb_justification()).prop_map(
            |(short_answer, justify_answer)| AnswerBody::YesNo {
                short_answer,
                justify_answer,
            },
        )
    }

    /// A single choice body, unanswered about a quarter of the time.
    pub fn arb_single_choice_body() -> impl Strategy<Value = AnswerBody> {
        (prop::option::weighted(0.75, arb_evolution_choice()), arb_justification()).prop_map(
            |(selected_choice, justify_answer)| AnswerBody::SingleChoice {
                selected_choice,
                justify_answer,
            },
        )
    }

    /// A multiple choice body picking up to three of `programs`.
    pub fn arb_multiple_choice_body(programs: Vec<ProgramId>) -> impl Strategy<Value = AnswerBody> {
        proptest::sample::subsequence(programs.clone(), 0..=programs.len().min(3)).prop_map(
            |picked| AnswerBody::MultipleChoice {
                selected_programs: picked.into_iter().collect::<BTreeSet<_>>(),
            },
        )
    }

    /// A body that fits a question of `kind`.
    pub fn arb_answer_body_for(
        kind: QuestionKind,
        programs: Vec<ProgramId>,
    ) -> BoxedStrategy<AnswerBody> {
        match kind {
            QuestionKind::NationalFramework | QuestionKind::KeyAgencyActions => {
                arb_yes_no_body().boxed()
            }
            QuestionKind::Evolution => arb_single_choice_body().boxed(),
            QuestionKind::Linkages => arb_multiple_choice_body(programs).boxed(),
        }
    }

    pub fn arb_username() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{2,15}"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built EPIC records for common test scenarios.

    use super::*;

    /// One area, one group, two programs and a question of every kind on
    /// the first program. The agency runs the first program.
    #[derive(Debug, Clone)]
    pub struct DomainFixture {
        pub area: Area,
        pub group: Group,
        pub programs: Vec<Program>,
        pub agency: Agency,
        pub national_framework: Question,
        pub key_agency_actions: Question,
        pub evolution: Question,
        pub linkages: Question,
    }

    impl DomainFixture {
        pub fn new() -> Self {
            let area = Area::new("Water");
            let group = Group::new("Flooding", area.id);
            let dikes = Program::new("Dikes", "Keep the sea out", group.id);
            let pumps = Program::new("Pumps", "Keep the polders dry", group.id);
            let agency = Agency::new("Rijkswaterstaat");

            let national_framework = Question::new(
                "Is there a national dike standard?",
                dikes.id,
                QuestionBody::NationalFramework {
                    description: "Standards set by law".to_string(),
                },
            );
            let key_agency_actions = Question::new(
                "Are dikes inspected yearly?",
                dikes.id,
                QuestionBody::KeyAgencyActions {
                    description: "Inspection rounds".to_string(),
                },
            );
            let evolution = Question::new(
                "Maintenance planning",
                dikes.id,
                QuestionBody::Evolution {
                    nascent_description: "Ad hoc repairs".to_string(),
                    engaged_description: "Yearly plan".to_string(),
                    capable_description: "Risk based plan".to_string(),
                    effective_description: "Predictive maintenance".to_string(),
                },
            );
            let linkages = Question::linkages(dikes.id);

            Self {
                area,
                group,
                programs: vec![dikes, pumps],
                agency,
                national_framework,
                key_agency_actions,
                evolution,
                linkages,
            }
        }

        pub fn program(&self) -> &Program {
            &self.programs[0]
        }

        pub fn program_ids(&self) -> Vec<ProgramId> {
            self.programs.iter().map(|p| p.id).collect()
        }

        pub fn questions(&self) -> Vec<&Question> {
            vec![
                &self.national_framework,
                &self.key_agency_actions,
                &self.evolution,
                &self.linkages,
            ]
        }

        /// Insert every record into `store`.
        pub async fn load(&self, store: &dyn EpicStore) -> EpicResult<()> {
            store.area_insert(&self.area).await?;
            store.group_insert(&self.group).await?;
            for program in &self.programs {
                store.program_insert(program).await?;
            }
            store.agency_insert(&self.agency).await?;
            store.agency_link_program(self.agency.id, self.program().id).await?;
            for question in self.questions() {
                store.question_insert(question).await?;
            }
            Ok(())
        }
    }

    impl Default for DomainFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    /// An organization and plain members with the given usernames.
    pub fn organization_with_members(
        name: &str,
        usernames: &[&str],
    ) -> (EpicOrganization, Vec<EpicUser>) {
        let organization = EpicOrganization::new(name);
        let members = usernames
            .iter()
            .map(|username| EpicUser::new(*username, Some(organization.id)))
            .collect();
        (organization, members)
    }

    /// A staff user outside any organization.
    pub fn admin_user() -> EpicUser {
        let mut admin = EpicUser::new("admin", None);
        admin.is_staff = true;
        admin.is_superuser = true;
        admin
    }

    /// Insert an organization with its members.
    pub async fn load_organization(
        store: &dyn EpicStore,
        organization: &EpicOrganization,
        members: &[EpicUser],
    ) -> EpicResult<()> {
        store.organization_insert(organization).await?;
        for member in members {
            store.user_insert(member).await?;
        }
        Ok(())
    }
}
