//! Import Service
//!
//! Bulk imports of the domain hierarchy, agencies and questions from a
//! tabular row source. Every import validates all rows and references
//! before writing, then replaces the previous data in one transaction.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use epic_core::{
    Agency, AgencyId, Area, EntityType, EpicResult, Group, ImportError, Program, ProgramId,
    Question, QuestionBody, QuestionKind, ValidationError, DEFAULT_EVOLUTION_TITLE,
};
use epic_storage::{AgencySet, DomainTree, EpicStore};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::types::ImportSummary;

// ============================================================================
// ROW SOURCES
// ============================================================================

/// One row with its cells keyed by column header. Cells are trimmed.
pub type Row = BTreeMap<String, String>;

/// Anything that yields header-keyed rows, in file order.
pub trait RowSource: Send + Sync {
    fn rows(&self) -> Vec<Row>;
}

/// Rows posted as JSON: `{"rows": [{"area": "...", ...}]}`.
///
/// Non-string cells are taken by their JSON text; `null` is blank.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JsonRows {
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<Object>))]
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl RowSource for JsonRows {
    fn rows(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(header, value)| {
                        let cell = match value {
                            serde_json::Value::String(s) => s.trim().to_string(),
                            serde_json::Value::Null => String::new(),
                            other => other.to_string(),
                        };
                        (header.trim().to_lowercase(), cell)
                    })
                    .collect()
            })
            .collect()
    }
}

// ============================================================================
// ROW RECORDS
// ============================================================================

/// A typed record read from a row. `line` is 1-based and counts data rows.
trait ImportRecord: Sized {
    fn from_row(line: usize, row: &Row) -> Result<Self, ImportError>;
}

fn required(line: usize, row: &Row, column: &str) -> Result<String, ImportError> {
    match row.get(column) {
        Some(cell) if !cell.is_empty() => Ok(cell.clone()),
        Some(_) => Err(ImportError::InvalidRow {
            row: line,
            reason: format!("`{column}` is blank"),
        }),
        None => Err(ImportError::InvalidRow {
            row: line,
            reason: format!("missing column `{column}`"),
        }),
    }
}

fn optional(row: &Row, column: &str) -> String {
    row.get(column).cloned().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRow {
    pub area: String,
    pub group: String,
    pub program: String,
    pub description: String,
}

impl ImportRecord for DomainRow {
    fn from_row(line: usize, row: &Row) -> Result<Self, ImportError> {
        Ok(Self {
            area: required(line, row, "area")?,
            group: required(line, row, "group")?,
            program: required(line, row, "program")?,
            description: optional(row, "description"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyRow {
    pub agency: String,
    pub program: String,
}

impl ImportRecord for AgencyRow {
    fn from_row(line: usize, row: &Row) -> Result<Self, ImportError> {
        Ok(Self {
            agency: required(line, row, "agency")?,
            program: required(line, row, "program")?,
        })
    }
}

/// National framework and key agency actions questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkQuestionRow {
    pub program: String,
    pub question: String,
    pub description: String,
}

impl ImportRecord for FrameworkQuestionRow {
    fn from_row(line: usize, row: &Row) -> Result<Self, ImportError> {
        let program = required(line, row, "program")?;
        // A blank question is titled after its program.
        let question = match optional(row, "question") {
            q if q.is_empty() => program.clone(),
            q => q,
        };
        Ok(Self {
            program,
            question,
            description: optional(row, "description"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionQuestionRow {
    pub program: String,
    pub question: String,
    pub nascent: String,
    pub engaged: String,
    pub capable: String,
    pub effective: String,
}

impl ImportRecord for EvolutionQuestionRow {
    fn from_row(line: usize, row: &Row) -> Result<Self, ImportError> {
        let question = match optional(row, "question") {
            q if q.is_empty() => DEFAULT_EVOLUTION_TITLE.to_string(),
            q => q,
        };
        Ok(Self {
            program: required(line, row, "program")?,
            question,
            nascent: optional(row, "nascent"),
            engaged: optional(row, "engaged"),
            capable: optional(row, "capable"),
            effective: optional(row, "effective"),
        })
    }
}

/// Parse every non-blank row, counting the blank ones.
fn read_records<R: ImportRecord>(source: &dyn RowSource) -> Result<(Vec<R>, usize), ImportError> {
    let mut records = Vec::new();
    let mut blank = 0;
    for (index, row) in source.rows().iter().enumerate() {
        if row.values().all(|cell| cell.is_empty()) {
            blank += 1;
            continue;
        }
        records.push(R::from_row(index + 1, row)?);
    }
    Ok((records, blank))
}

/// Map every referenced program name to its id, or report all missing
/// names at once, sorted and without repeats.
async fn resolve_programs<'a>(
    store: &dyn EpicStore,
    names: impl IntoIterator<Item = &'a str>,
) -> EpicResult<HashMap<String, ProgramId>> {
    let mut resolved = HashMap::new();
    let mut missing = BTreeSet::new();
    for name in names {
        if resolved.contains_key(name) || missing.contains(name) {
            continue;
        }
        match store.program_find_by_name(name).await? {
            Some(program) => {
                resolved.insert(name.to_string(), program.id);
            }
            None => {
                missing.insert(name.to_string());
            }
        }
    }
    if !missing.is_empty() {
        tracing::warn!(missing = ?missing, "Import references unknown programs");
        return Err(ImportError::MissingReferencedEntities {
            entity_type: EntityType::Program,
            names: missing.into_iter().collect(),
        }
        .into());
    }
    Ok(resolved)
}

// ============================================================================
// IMPORTERS
// ============================================================================

/// Replace the whole area/group/program hierarchy.
///
/// Areas and groups are created once per distinct name, in order of first
/// appearance. Every previous area is deleted with its full cascade.
pub async fn import_domain(store: &dyn EpicStore, source: &dyn RowSource) -> ApiResult<ImportSummary> {
    let (rows, skipped_blank) = read_records::<DomainRow>(source)?;

    let mut tree = DomainTree::default();
    let mut areas: HashMap<String, usize> = HashMap::new();
    let mut groups: HashMap<(String, String), usize> = HashMap::new();
    for row in &rows {
        let area_index = *areas.entry(row.area.clone()).or_insert_with(|| {
            tree.areas.push(Area::new(row.area.clone()));
            tree.areas.len() - 1
        });
        let area_id = tree.areas[area_index].id;
        let group_index = *groups
            .entry((row.area.clone(), row.group.clone()))
            .or_insert_with(|| {
                tree.groups.push(Group::new(row.group.clone(), area_id));
                tree.groups.len() - 1
            });
        let group_id = tree.groups[group_index].id;
        tree.programs
            .push(Program::new(row.program.clone(), row.description.clone(), group_id));
    }

    store.replace_domain(&tree).await?;
    tracing::info!(
        areas = tree.areas.len(),
        groups = tree.groups.len(),
        programs = tree.programs.len(),
        skipped_blank,
        "Imported domain"
    );
    Ok(ImportSummary {
        imported: rows.len(),
        skipped_blank,
    })
}

/// Replace every agency and its program links. Programs survive.
pub async fn import_agencies(store: &dyn EpicStore, source: &dyn RowSource) -> ApiResult<ImportSummary> {
    let (rows, skipped_blank) = read_records::<AgencyRow>(source)?;
    let programs = resolve_programs(store, rows.iter().map(|r| r.program.as_str()).collect::<Vec<_>>()).await?;

    let mut set = AgencySet::default();
    let mut agencies: HashMap<String, AgencyId> = HashMap::new();
    let mut links = BTreeSet::new();
    for row in &rows {
        let agency_id = *agencies.entry(row.agency.clone()).or_insert_with(|| {
            let agency = Agency::new(row.agency.clone());
            let id = agency.id;
            set.agencies.push(agency);
            id
        });
        if let Some(program_id) = programs.get(&row.program) {
            links.insert((agency_id, *program_id));
        }
    }
    set.links = links.into_iter().collect();

    store.replace_agencies(&set).await?;
    tracing::info!(
        agencies = set.agencies.len(),
        links = set.links.len(),
        skipped_blank,
        "Imported agencies"
    );
    Ok(ImportSummary {
        imported: rows.len(),
        skipped_blank,
    })
}

/// Replace every question of a framework kind.
pub async fn import_framework_questions(
    store: &dyn EpicStore,
    kind: QuestionKind,
    source: &dyn RowSource,
) -> ApiResult<ImportSummary> {
    let (rows, skipped_blank) = read_records::<FrameworkQuestionRow>(source)?;
    let programs = resolve_programs(store, rows.iter().map(|r| r.program.as_str()).collect::<Vec<_>>()).await?;

    let questions = rows
        .iter()
        .map(|row| {
            let description = row.description.clone();
            let body = match kind {
                QuestionKind::NationalFramework => QuestionBody::NationalFramework { description },
                QuestionKind::KeyAgencyActions => QuestionBody::KeyAgencyActions { description },
                other => {
                    return Err(ValidationError::InvalidValue {
                        field: "kind".to_string(),
                        reason: format!(
                            "{} questions are not imported as framework questions",
                            other.type_name()
                        ),
                    })
                }
            };
            Ok(Question::new(row.question.clone(), programs[&row.program], body))
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    store.replace_questions(kind, &questions).await?;
    tracing::info!(kind = %kind, questions = questions.len(), skipped_blank, "Imported questions");
    Ok(ImportSummary {
        imported: questions.len(),
        skipped_blank,
    })
}

/// Replace every evolution question.
pub async fn import_evolution_questions(
    store: &dyn EpicStore,
    source: &dyn RowSource,
) -> ApiResult<ImportSummary> {
    let (rows, skipped_blank) = read_records::<EvolutionQuestionRow>(source)?;
    let programs = resolve_programs(store, rows.iter().map(|r| r.program.as_str()).collect::<Vec<_>>()).await?;

    let questions: Vec<Question> = rows
        .iter()
        .map(|row| {
            Question::new(
                row.question.clone(),
                programs[&row.program],
                QuestionBody::Evolution {
                    nascent_description: row.nascent.clone(),
                    engaged_description: row.engaged.clone(),
                    capable_description: row.capable.clone(),
                    effective_description: row.effective.clone(),
                },
            )
        })
        .collect();

    store
        .replace_questions(QuestionKind::Evolution, &questions)
        .await?;
    tracing::info!(questions = questions.len(), skipped_blank, "Imported evolution questions");
    Ok(ImportSummary {
        imported: questions.len(),
        skipped_blank,
    })
}
