//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres and the
//! PostgreSQL implementation of `EpicStore`.
//!
//! Deletes cascade through foreign keys declared `ON DELETE CASCADE`;
//! selections of a deleted program disappear with their link rows. Every
//! multi-statement write runs inside one transaction.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use epic_core::{
    check_compatibility, program_name_key, Agency, AgencyId, Answer, AnswerBody, AnswerId, AnswerKind, Area, AreaId,
    EntityType, EpicError, EpicOrganization, EpicResult, EpicUser, EvolutionChoice, Group,
    GroupId, IntegrityError, OrganizationId, Program, ProgramId, Question, QuestionBody,
    QuestionId, QuestionKind, StorageError, UserId, YesNoChoice,
};
use epic_storage::{AgencySet, DomainTree, EpicStore, UserUpdate};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Transaction};
use uuid::Uuid;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "epic".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("EPIC_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("EPIC_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("EPIC_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("EPIC_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("EPIC_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("EPIC_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("EPIC_DB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(self.max_size));

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS epic_area (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS epic_group (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    area_id UUID NOT NULL REFERENCES epic_area(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS epic_program (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    group_id UUID NOT NULL REFERENCES epic_group(id) ON DELETE CASCADE
);
DROP INDEX IF EXISTS epic_program_name_ci;
CREATE UNIQUE INDEX IF NOT EXISTS epic_program_name_key ON epic_program (lower(btrim(name)));

CREATE TABLE IF NOT EXISTS epic_agency (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS epic_agency_program (
    agency_id UUID NOT NULL REFERENCES epic_agency(id) ON DELETE CASCADE,
    program_id UUID NOT NULL REFERENCES epic_program(id) ON DELETE CASCADE,
    PRIMARY KEY (agency_id, program_id)
);

CREATE TABLE IF NOT EXISTS epic_question (
    id UUID PRIMARY KEY,
    title TEXT NOT NULL,
    program_id UUID NOT NULL REFERENCES epic_program(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    description TEXT,
    nascent_description TEXT,
    engaged_description TEXT,
    capable_description TEXT,
    effective_description TEXT,
    UNIQUE (program_id, title)
);
CREATE UNIQUE INDEX IF NOT EXISTS epic_question_one_linkages
    ON epic_question (program_id) WHERE kind = 'Linkages';

CREATE TABLE IF NOT EXISTS epic_organization (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS epic_user (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL DEFAULT '',
    is_staff BOOLEAN NOT NULL DEFAULT FALSE,
    is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
    is_advisor BOOLEAN NOT NULL DEFAULT FALSE,
    organization_id UUID REFERENCES epic_organization(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS epic_user_program (
    user_id UUID NOT NULL REFERENCES epic_user(id) ON DELETE CASCADE,
    program_id UUID NOT NULL REFERENCES epic_program(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, program_id)
);

CREATE TABLE IF NOT EXISTS epic_answer (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL REFERENCES epic_user(id) ON DELETE CASCADE,
    question_id UUID NOT NULL REFERENCES epic_question(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    short_answer TEXT,
    selected_choice TEXT,
    justify_answer TEXT NOT NULL DEFAULT '',
    UNIQUE (user_id, question_id)
);

CREATE TABLE IF NOT EXISTS epic_answer_program (
    answer_id UUID NOT NULL REFERENCES epic_answer(id) ON DELETE CASCADE,
    program_id UUID NOT NULL REFERENCES epic_program(id) ON DELETE CASCADE,
    PRIMARY KEY (answer_id, program_id)
);
"#;

const PROGRAM_SELECT: &str = "SELECT p.id, p.name, p.description, p.group_id, \
     COALESCE(array_agg(ap.agency_id) FILTER (WHERE ap.agency_id IS NOT NULL), '{}') AS agency_ids \
     FROM epic_program p LEFT JOIN epic_agency_program ap ON ap.program_id = p.id";

const QUESTION_SELECT: &str = "SELECT id, title, program_id, kind, description, \
     nascent_description, engaged_description, capable_description, effective_description \
     FROM epic_question";

const ANSWER_SELECT: &str = "SELECT a.id, a.user_id, a.question_id, a.kind, a.short_answer, \
     a.selected_choice, a.justify_answer, \
     COALESCE(array_agg(sp.program_id) FILTER (WHERE sp.program_id IS NOT NULL), '{}') AS selected_programs \
     FROM epic_answer a LEFT JOIN epic_answer_program sp ON sp.answer_id = a.id";

const USER_SELECT: &str = "SELECT u.id, u.username, u.password_hash, u.is_staff, u.is_superuser, \
     u.is_advisor, u.organization_id, \
     COALESCE(array_agg(up.program_id) FILTER (WHERE up.program_id IS NOT NULL), '{}') AS selected_programs \
     FROM epic_user u LEFT JOIN epic_user_program up ON up.user_id = u.id";

// ============================================================================
// ERROR MAPPING
// ============================================================================

fn pg_error(entity_type: EntityType) -> impl Fn(tokio_postgres::Error) -> EpicError {
    move |err| {
        let reason = err
            .as_db_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| err.to_string());
        match err.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
                StorageError::Duplicate { entity_type, reason }.into()
            }
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                let (entity_type, id) = err
                    .as_db_error()
                    .and_then(|db| db.detail())
                    .and_then(missing_reference)
                    .unwrap_or((entity_type, Uuid::nil()));
                StorageError::NotFound { entity_type, id }.into()
            }
            _ => StorageError::TransactionFailed { reason }.into(),
        }
    }
}

/// Read the referenced record out of a foreign key violation detail such as
/// `Key (group_id)=(<uuid>) is not present in table "epic_group".`
fn missing_reference(detail: &str) -> Option<(EntityType, Uuid)> {
    let value = detail.split_once("=(")?.1.split_once(')')?.0;
    let id = Uuid::parse_str(value).ok()?;
    let table = detail.rsplit_once("table \"")?.1.trim_end_matches(['"', '.']);
    let entity_type = match table {
        "epic_area" => EntityType::Area,
        "epic_group" => EntityType::Group,
        "epic_program" => EntityType::Program,
        "epic_agency" => EntityType::Agency,
        "epic_question" => EntityType::Question,
        "epic_answer" => EntityType::Answer,
        "epic_user" => EntityType::User,
        "epic_organization" => EntityType::Organization,
        _ => return None,
    };
    Some((entity_type, id))
}

fn not_found(entity_type: EntityType, id: Uuid) -> EpicError {
    StorageError::NotFound { entity_type, id }.into()
}

fn ensure_affected(affected: u64, entity_type: EntityType, id: Uuid) -> EpicResult<()> {
    if affected == 0 {
        Err(not_found(entity_type, id))
    } else {
        Ok(())
    }
}

fn resolution_failed(entity_type: EntityType, id: Uuid, reason: impl Into<String>) -> EpicError {
    IntegrityError::ResolutionFailed {
        entity_type,
        id,
        reason: reason.into(),
    }
    .into()
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn row_to_program(row: &Row) -> Program {
    let agency_ids: Vec<Uuid> = row.get("agency_ids");
    Program {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        group_id: row.get("group_id"),
        agency_ids: agency_ids.into_iter().collect(),
    }
}

fn row_to_question(row: &Row) -> EpicResult<Question> {
    let id: Uuid = row.get("id");
    let kind_str: String = row.get("kind");
    let kind = QuestionKind::from_db_str(&kind_str)
        .map_err(|e| resolution_failed(EntityType::Question, id, e.to_string()))?;
    let text = |column: &str| -> String {
        row.get::<_, Option<String>>(column).unwrap_or_default()
    };
    let body = match kind {
        QuestionKind::NationalFramework => QuestionBody::NationalFramework {
            description: text("description"),
        },
        QuestionKind::KeyAgencyActions => QuestionBody::KeyAgencyActions {
            description: text("description"),
        },
        QuestionKind::Evolution => QuestionBody::Evolution {
            nascent_description: text("nascent_description"),
            engaged_description: text("engaged_description"),
            capable_description: text("capable_description"),
            effective_description: text("effective_description"),
        },
        QuestionKind::Linkages => QuestionBody::Linkages,
    };
    Ok(Question {
        id,
        title: row.get("title"),
        program_id: row.get("program_id"),
        body,
    })
}

fn row_to_answer(row: &Row) -> EpicResult<Answer> {
    let id: Uuid = row.get("id");
    let kind_str: String = row.get("kind");
    let kind = AnswerKind::from_db_str(&kind_str)
        .map_err(|e| resolution_failed(EntityType::Answer, id, e.to_string()))?;
    let justify_answer: String = row.get("justify_answer");
    let body = match kind {
        AnswerKind::YesNo => AnswerBody::YesNo {
            short_answer: row
                .get::<_, Option<String>>("short_answer")
                .map(|s| YesNoChoice::from_db_str(&s))
                .transpose()
                .map_err(|e| resolution_failed(EntityType::Answer, id, e.to_string()))?,
            justify_answer,
        },
        AnswerKind::SingleChoice => AnswerBody::SingleChoice {
            selected_choice: row
                .get::<_, Option<String>>("selected_choice")
                .map(|s| EvolutionChoice::from_db_str(&s))
                .transpose()
                .map_err(|e| resolution_failed(EntityType::Answer, id, e.to_string()))?,
            justify_answer,
        },
        AnswerKind::MultipleChoice => {
            let selected: Vec<Uuid> = row.get("selected_programs");
            AnswerBody::MultipleChoice {
                selected_programs: selected.into_iter().collect(),
            }
        }
    };
    Ok(Answer {
        id,
        user_id: row.get("user_id"),
        question_id: row.get("question_id"),
        body,
    })
}

fn row_to_user(row: &Row) -> EpicUser {
    let selected: Vec<Uuid> = row.get("selected_programs");
    EpicUser {
        id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
        is_advisor: row.get("is_advisor"),
        organization_id: row.get("organization_id"),
        selected_programs: selected.into_iter().collect(),
    }
}

/// Columns of a question body in table order, `None` where unused.
struct QuestionColumns<'a> {
    description: Option<&'a str>,
    stages: [Option<&'a str>; 4],
}

impl<'a> QuestionColumns<'a> {
    fn of(body: &'a QuestionBody) -> Self {
        match body {
            QuestionBody::NationalFramework { description }
            | QuestionBody::KeyAgencyActions { description } => Self {
                description: Some(description.as_str()),
                stages: [None; 4],
            },
            QuestionBody::Evolution {
                nascent_description,
                engaged_description,
                capable_description,
                effective_description,
            } => Self {
                description: None,
                stages: [
                    Some(nascent_description.as_str()),
                    Some(engaged_description.as_str()),
                    Some(capable_description.as_str()),
                    Some(effective_description.as_str()),
                ],
            },
            QuestionBody::Linkages => Self {
                description: None,
                stages: [None; 4],
            },
        }
    }
}

// ============================================================================
// TRANSACTION HELPERS
// ============================================================================

async fn insert_area(tx: &Transaction<'_>, area: &Area) -> EpicResult<()> {
    tx.execute(
        "INSERT INTO epic_area (id, name) VALUES ($1, $2)",
        &[&area.id, &area.name],
    )
    .await
    .map_err(pg_error(EntityType::Area))?;
    Ok(())
}

async fn insert_group(tx: &Transaction<'_>, group: &Group) -> EpicResult<()> {
    tx.execute(
        "INSERT INTO epic_group (id, name, area_id) VALUES ($1, $2, $3)",
        &[&group.id, &group.name, &group.area_id],
    )
    .await
    .map_err(pg_error(EntityType::Group))?;
    Ok(())
}

async fn insert_program(tx: &Transaction<'_>, program: &Program) -> EpicResult<()> {
    tx.execute(
        "INSERT INTO epic_program (id, name, description, group_id) VALUES ($1, $2, $3, $4)",
        &[&program.id, &program.name.trim(), &program.description, &program.group_id],
    )
    .await
    .map_err(pg_error(EntityType::Program))?;
    for agency_id in &program.agency_ids {
        link_agency(tx, *agency_id, program.id).await?;
    }
    Ok(())
}

async fn link_agency(tx: &Transaction<'_>, agency_id: AgencyId, program_id: ProgramId) -> EpicResult<()> {
    tx.execute(
        "INSERT INTO epic_agency_program (agency_id, program_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
        &[&agency_id, &program_id],
    )
    .await
    .map_err(pg_error(EntityType::Agency))?;
    Ok(())
}

async fn insert_question(tx: &Transaction<'_>, question: &Question) -> EpicResult<()> {
    let columns = QuestionColumns::of(&question.body);
    tx.execute(
        "INSERT INTO epic_question (id, title, program_id, kind, description, \
         nascent_description, engaged_description, capable_description, effective_description) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        &[
            &question.id,
            &question.title,
            &question.program_id,
            &question.kind().as_db_str(),
            &columns.description,
            &columns.stages[0],
            &columns.stages[1],
            &columns.stages[2],
            &columns.stages[3],
        ],
    )
    .await
    .map_err(pg_error(EntityType::Question))?;
    Ok(())
}

async fn insert_user(tx: &Transaction<'_>, user: &EpicUser) -> EpicResult<()> {
    tx.execute(
        "INSERT INTO epic_user (id, username, password_hash, is_staff, is_superuser, is_advisor, \
         organization_id) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        &[
            &user.id,
            &user.username,
            &user.password_hash,
            &user.is_staff,
            &user.is_superuser,
            &user.is_advisor,
            &user.organization_id,
        ],
    )
    .await
    .map_err(pg_error(EntityType::User))?;
    replace_user_programs(tx, user.id, &user.selected_programs).await
}

async fn replace_user_programs(
    tx: &Transaction<'_>,
    user_id: UserId,
    programs: &BTreeSet<ProgramId>,
) -> EpicResult<()> {
    ensure_programs_exist(tx, programs).await?;
    tx.execute("DELETE FROM epic_user_program WHERE user_id = $1", &[&user_id])
        .await
        .map_err(pg_error(EntityType::User))?;
    for program_id in programs {
        tx.execute(
            "INSERT INTO epic_user_program (user_id, program_id) VALUES ($1, $2)",
            &[&user_id, program_id],
        )
        .await
        .map_err(pg_error(EntityType::User))?;
    }
    Ok(())
}

async fn ensure_programs_exist(tx: &Transaction<'_>, programs: &BTreeSet<ProgramId>) -> EpicResult<()> {
    if programs.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = programs.iter().copied().collect();
    let rows = tx
        .query("SELECT id FROM epic_program WHERE id = ANY($1)", &[&ids])
        .await
        .map_err(pg_error(EntityType::Program))?;
    let found: BTreeSet<Uuid> = rows.iter().map(|r| r.get(0)).collect();
    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(not_found(EntityType::Program, *missing)),
        None => Ok(()),
    }
}

/// Check the referenced question and selected programs of `answer`.
async fn check_answer(tx: &Transaction<'_>, answer: &Answer) -> EpicResult<()> {
    let row = tx
        .query_opt("SELECT kind FROM epic_question WHERE id = $1", &[&answer.question_id])
        .await
        .map_err(pg_error(EntityType::Question))?
        .ok_or_else(|| not_found(EntityType::Question, answer.question_id))?;
    let kind_str: String = row.get(0);
    let question_kind = QuestionKind::from_db_str(&kind_str)
        .map_err(|e| resolution_failed(EntityType::Question, answer.question_id, e.to_string()))?;
    check_compatibility(answer.kind(), question_kind)?;
    if let Some(selected) = answer.body.selected_programs() {
        ensure_programs_exist(tx, selected).await?;
    }
    Ok(())
}

async fn write_answer_fields(tx: &Transaction<'_>, answer: &Answer) -> EpicResult<()> {
    let (short_answer, selected_choice) = match &answer.body {
        AnswerBody::YesNo { short_answer, .. } => (short_answer.map(|c| c.as_db_str()), None),
        AnswerBody::SingleChoice { selected_choice, .. } => {
            (None, selected_choice.map(|c| c.as_db_str()))
        }
        AnswerBody::MultipleChoice { .. } => (None, None),
    };
    let justify = answer.body.justify_answer().unwrap_or_default();
    tx.execute(
        "UPDATE epic_answer SET short_answer = $2, selected_choice = $3, justify_answer = $4 \
         WHERE id = $1",
        &[&answer.id, &short_answer, &selected_choice, &justify],
    )
    .await
    .map_err(pg_error(EntityType::Answer))?;

    tx.execute("DELETE FROM epic_answer_program WHERE answer_id = $1", &[&answer.id])
        .await
        .map_err(pg_error(EntityType::Answer))?;
    if let Some(selected) = answer.body.selected_programs() {
        for program_id in selected {
            tx.execute(
                "INSERT INTO epic_answer_program (answer_id, program_id) VALUES ($1, $2)",
                &[&answer.id, program_id],
            )
            .await
            .map_err(pg_error(EntityType::Answer))?;
        }
    }
    Ok(())
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// `EpicStore` backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    /// Create a new store with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new store from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create missing tables and indexes.
    pub async fn migrate(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA).await?;
        tracing::info!("Database schema is up to date");
        Ok(())
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.query_one("SELECT 1", &[]).await?;
        Ok(())
    }

    async fn get_conn(&self) -> EpicResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            StorageError::TransactionFailed {
                reason: format!("Failed to acquire database connection: {}", e),
            }
            .into()
        })
    }

    async fn query_programs(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EpicResult<Vec<Program>> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let sql = format!("{PROGRAM_SELECT} {filter} GROUP BY p.id ORDER BY p.name");
        let rows = client
            .query(sql.as_str(), params)
            .await
            .map_err(pg_error(EntityType::Program))?;
        Ok(rows.iter().map(row_to_program).collect())
    }

    async fn query_questions(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EpicResult<Vec<Question>> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let sql = format!("{QUESTION_SELECT} {filter} ORDER BY id");
        let rows = client
            .query(sql.as_str(), params)
            .await
            .map_err(pg_error(EntityType::Question))?;
        rows.iter().map(row_to_question).collect()
    }

    async fn query_answers(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EpicResult<Vec<Answer>> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let sql = format!("{ANSWER_SELECT} {filter} GROUP BY a.id ORDER BY a.id");
        let rows = client
            .query(sql.as_str(), params)
            .await
            .map_err(pg_error(EntityType::Answer))?;
        rows.iter().map(row_to_answer).collect()
    }

    async fn query_users(
        &self,
        filter: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> EpicResult<Vec<EpicUser>> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let sql = format!("{USER_SELECT} {filter} GROUP BY u.id ORDER BY u.username");
        let rows = client
            .query(sql.as_str(), params)
            .await
            .map_err(pg_error(EntityType::User))?;
        Ok(rows.iter().map(row_to_user).collect())
    }

    async fn query_named<T>(
        &self,
        entity_type: EntityType,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        map: impl Fn(&Row) -> T,
    ) -> EpicResult<Vec<T>> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let rows = client
            .query(sql, params)
            .await
            .map_err(pg_error(entity_type))?;
        Ok(rows.iter().map(map).collect())
    }

    async fn delete_by_id(&self, entity_type: EntityType, table: &str, id: Uuid) -> EpicResult<()> {
        let conn = self.get_conn().await?;
        let client: &Client = &conn;
        let affected = client
            .execute(format!("DELETE FROM {table} WHERE id = $1").as_str(), &[&id])
            .await
            .map_err(pg_error(entity_type))?;
        ensure_affected(affected, entity_type, id)
    }
}

fn row_to_area(row: &Row) -> Area {
    Area {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn row_to_group(row: &Row) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        area_id: row.get("area_id"),
    }
}

fn row_to_agency(row: &Row) -> Agency {
    Agency {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn row_to_organization(row: &Row) -> EpicOrganization {
    EpicOrganization {
        id: row.get("id"),
        name: row.get("name"),
    }
}

/// Run `$body` inside a transaction bound to `$tx`. An early return or `?`
/// drops the transaction, which rolls it back.
macro_rules! in_transaction {
    ($self:ident, |$tx:ident| $body:block) => {{
        let mut conn = $self.get_conn().await?;
        let $tx = conn.transaction().await.map_err(|e| {
            EpicError::from(StorageError::TransactionFailed {
                reason: format!("begin failed: {}", e),
            })
        })?;
        let out = $body;
        $tx.commit().await.map_err(|e| {
            EpicError::from(StorageError::TransactionFailed {
                reason: format!("commit failed: {}", e),
            })
        })?;
        out
    }};
}

#[async_trait]
impl EpicStore for PgStore {
    // === Areas ===

    async fn area_insert(&self, area: &Area) -> EpicResult<()> {
        in_transaction!(self, |tx| { insert_area(&tx, area).await? });
        Ok(())
    }

    async fn area_get(&self, id: AreaId) -> EpicResult<Option<Area>> {
        let areas = self
            .query_named(EntityType::Area, "SELECT id, name FROM epic_area WHERE id = $1", &[&id], row_to_area)
            .await?;
        Ok(areas.into_iter().next())
    }

    async fn area_list(&self) -> EpicResult<Vec<Area>> {
        self.query_named(EntityType::Area, "SELECT id, name FROM epic_area ORDER BY name", &[], row_to_area)
            .await
    }

    async fn area_delete(&self, id: AreaId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Area, "epic_area", id).await
    }

    // === Groups ===

    async fn group_insert(&self, group: &Group) -> EpicResult<()> {
        in_transaction!(self, |tx| { insert_group(&tx, group).await? });
        Ok(())
    }

    async fn group_get(&self, id: GroupId) -> EpicResult<Option<Group>> {
        let groups = self
            .query_named(
                EntityType::Group,
                "SELECT id, name, area_id FROM epic_group WHERE id = $1",
                &[&id],
                row_to_group,
            )
            .await?;
        Ok(groups.into_iter().next())
    }

    async fn group_list(&self) -> EpicResult<Vec<Group>> {
        self.query_named(
            EntityType::Group,
            "SELECT id, name, area_id FROM epic_group ORDER BY name",
            &[],
            row_to_group,
        )
        .await
    }

    async fn group_list_by_area(&self, area_id: AreaId) -> EpicResult<Vec<Group>> {
        self.query_named(
            EntityType::Group,
            "SELECT id, name, area_id FROM epic_group WHERE area_id = $1 ORDER BY name",
            &[&area_id],
            row_to_group,
        )
        .await
    }

    async fn group_delete(&self, id: GroupId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Group, "epic_group", id).await
    }

    // === Programs ===

    async fn program_insert(&self, program: &Program) -> EpicResult<()> {
        in_transaction!(self, |tx| { insert_program(&tx, program).await? });
        Ok(())
    }

    async fn program_get(&self, id: ProgramId) -> EpicResult<Option<Program>> {
        let programs = self.query_programs("WHERE p.id = $1", &[&id]).await?;
        Ok(programs.into_iter().next())
    }

    async fn program_find_by_name(&self, name: &str) -> EpicResult<Option<Program>> {
        let key = program_name_key(name);
        let programs = self
            .query_programs("WHERE lower(btrim(p.name)) = $1", &[&key])
            .await?;
        Ok(programs.into_iter().next())
    }

    async fn program_list(&self) -> EpicResult<Vec<Program>> {
        self.query_programs("", &[]).await
    }

    async fn program_list_by_group(&self, group_id: GroupId) -> EpicResult<Vec<Program>> {
        self.query_programs("WHERE p.group_id = $1", &[&group_id]).await
    }

    async fn program_delete(&self, id: ProgramId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Program, "epic_program", id).await
    }

    // === Agencies ===

    async fn agency_insert(&self, agency: &Agency) -> EpicResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO epic_agency (id, name) VALUES ($1, $2)",
            &[&agency.id, &agency.name],
        )
        .await
        .map_err(pg_error(EntityType::Agency))?;
        Ok(())
    }

    async fn agency_get(&self, id: AgencyId) -> EpicResult<Option<Agency>> {
        let agencies = self
            .query_named(
                EntityType::Agency,
                "SELECT id, name FROM epic_agency WHERE id = $1",
                &[&id],
                row_to_agency,
            )
            .await?;
        Ok(agencies.into_iter().next())
    }

    async fn agency_list(&self) -> EpicResult<Vec<Agency>> {
        self.query_named(
            EntityType::Agency,
            "SELECT id, name FROM epic_agency ORDER BY name",
            &[],
            row_to_agency,
        )
        .await
    }

    async fn agency_link_program(&self, agency_id: AgencyId, program_id: ProgramId) -> EpicResult<()> {
        if self.agency_get(agency_id).await?.is_none() {
            return Err(not_found(EntityType::Agency, agency_id));
        }
        if self.program_get(program_id).await?.is_none() {
            return Err(not_found(EntityType::Program, program_id));
        }
        in_transaction!(self, |tx| { link_agency(&tx, agency_id, program_id).await? });
        Ok(())
    }

    async fn agency_delete(&self, id: AgencyId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Agency, "epic_agency", id).await
    }

    // === Questions ===

    async fn question_insert(&self, question: &Question) -> EpicResult<()> {
        in_transaction!(self, |tx| { insert_question(&tx, question).await? });
        Ok(())
    }

    async fn question_get(&self, id: QuestionId) -> EpicResult<Option<Question>> {
        let questions = self.query_questions("WHERE id = $1", &[&id]).await?;
        Ok(questions.into_iter().next())
    }

    async fn question_list(&self) -> EpicResult<Vec<Question>> {
        self.query_questions("", &[]).await
    }

    async fn question_list_by_program(&self, program_id: ProgramId) -> EpicResult<Vec<Question>> {
        self.query_questions("WHERE program_id = $1", &[&program_id]).await
    }

    async fn question_list_by_kind(&self, kind: QuestionKind) -> EpicResult<Vec<Question>> {
        let kind_str = kind.as_db_str();
        self.query_questions("WHERE kind = $1", &[&kind_str]).await
    }

    async fn question_delete(&self, id: QuestionId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Question, "epic_question", id).await
    }

    // === Answers ===

    async fn answer_insert(&self, answer: &Answer) -> EpicResult<()> {
        in_transaction!(self, |tx| {
            let user = tx
                .query_opt("SELECT 1 FROM epic_user WHERE id = $1", &[&answer.user_id])
                .await
                .map_err(pg_error(EntityType::User))?;
            if user.is_none() {
                return Err(not_found(EntityType::User, answer.user_id));
            }
            check_answer(&tx, answer).await?;
            tx.execute(
                "INSERT INTO epic_answer (id, user_id, question_id, kind) VALUES ($1, $2, $3, $4)",
                &[&answer.id, &answer.user_id, &answer.question_id, &answer.kind().as_db_str()],
            )
            .await
            .map_err(pg_error(EntityType::Answer))?;
            write_answer_fields(&tx, answer).await?
        });
        Ok(())
    }

    async fn answer_get(&self, id: AnswerId) -> EpicResult<Option<Answer>> {
        let answers = self.query_answers("WHERE a.id = $1", &[&id]).await?;
        Ok(answers.into_iter().next())
    }

    async fn answer_find(&self, user_id: UserId, question_id: QuestionId) -> EpicResult<Option<Answer>> {
        let answers = self
            .query_answers("WHERE a.user_id = $1 AND a.question_id = $2", &[&user_id, &question_id])
            .await?;
        Ok(answers.into_iter().next())
    }

    async fn answer_list(&self) -> EpicResult<Vec<Answer>> {
        self.query_answers("", &[]).await
    }

    async fn answer_list_by_question(&self, question_id: QuestionId) -> EpicResult<Vec<Answer>> {
        self.query_answers("WHERE a.question_id = $1", &[&question_id]).await
    }

    async fn answer_list_by_user(&self, user_id: UserId) -> EpicResult<Vec<Answer>> {
        self.query_answers("WHERE a.user_id = $1", &[&user_id]).await
    }

    async fn answer_update(&self, answer: &Answer) -> EpicResult<()> {
        in_transaction!(self, |tx| {
            let stored = tx
                .query_opt(
                    "SELECT user_id, question_id, kind FROM epic_answer WHERE id = $1 FOR UPDATE",
                    &[&answer.id],
                )
                .await
                .map_err(pg_error(EntityType::Answer))?
                .ok_or_else(|| not_found(EntityType::Answer, answer.id))?;
            let user_id: Uuid = stored.get("user_id");
            let question_id: Uuid = stored.get("question_id");
            if user_id != answer.user_id || question_id != answer.question_id {
                return Err(StorageError::UpdateFailed {
                    entity_type: EntityType::Answer,
                    id: answer.id,
                    reason: "user and question of an answer cannot change".to_string(),
                }
                .into());
            }
            check_answer(&tx, answer).await?;
            tx.execute(
                "UPDATE epic_answer SET kind = $2 WHERE id = $1",
                &[&answer.id, &answer.kind().as_db_str()],
            )
            .await
            .map_err(pg_error(EntityType::Answer))?;
            write_answer_fields(&tx, answer).await?
        });
        Ok(())
    }

    async fn answer_delete(&self, id: AnswerId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Answer, "epic_answer", id).await
    }

    // === Organizations ===

    async fn organization_insert(&self, organization: &EpicOrganization) -> EpicResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO epic_organization (id, name) VALUES ($1, $2)",
            &[&organization.id, &organization.name],
        )
        .await
        .map_err(pg_error(EntityType::Organization))?;
        Ok(())
    }

    async fn organization_get(&self, id: OrganizationId) -> EpicResult<Option<EpicOrganization>> {
        let organizations = self
            .query_named(
                EntityType::Organization,
                "SELECT id, name FROM epic_organization WHERE id = $1",
                &[&id],
                row_to_organization,
            )
            .await?;
        Ok(organizations.into_iter().next())
    }

    async fn organization_list(&self) -> EpicResult<Vec<EpicOrganization>> {
        self.query_named(
            EntityType::Organization,
            "SELECT id, name FROM epic_organization ORDER BY name",
            &[],
            row_to_organization,
        )
        .await
    }

    async fn organization_delete(&self, id: OrganizationId) -> EpicResult<()> {
        self.delete_by_id(EntityType::Organization, "epic_organization", id).await
    }

    // === Users ===

    async fn user_insert(&self, user: &EpicUser) -> EpicResult<()> {
        in_transaction!(self, |tx| { insert_user(&tx, user).await? });
        Ok(())
    }

    async fn users_insert_batch(&self, users: &[EpicUser]) -> EpicResult<()> {
        in_transaction!(self, |tx| {
            for user in users {
                insert_user(&tx, user).await?;
            }
        });
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> EpicResult<Option<EpicUser>> {
        let users = self.query_users("WHERE u.id = $1", &[&id]).await?;
        Ok(users.into_iter().next())
    }

    async fn user_find_by_username(&self, username: &str) -> EpicResult<Option<EpicUser>> {
        let users = self.query_users("WHERE u.username = $1", &[&username]).await?;
        Ok(users.into_iter().next())
    }

    async fn user_list(&self) -> EpicResult<Vec<EpicUser>> {
        self.query_users("", &[]).await
    }

    async fn user_list_by_organization(&self, organization_id: OrganizationId) -> EpicResult<Vec<EpicUser>> {
        self.query_users("WHERE u.organization_id = $1", &[&organization_id])
            .await
    }

    async fn user_update(&self, id: UserId, update: UserUpdate) -> EpicResult<EpicUser> {
        in_transaction!(self, |tx| {
            let affected = tx
                .execute(
                    "UPDATE epic_user SET password_hash = COALESCE($2, password_hash), \
                     is_advisor = COALESCE($3, is_advisor) WHERE id = $1",
                    &[&id, &update.password_hash, &update.is_advisor],
                )
                .await
                .map_err(pg_error(EntityType::User))?;
            ensure_affected(affected, EntityType::User, id)?;
            if let Some(selected) = &update.selected_programs {
                replace_user_programs(&tx, id, selected).await?;
            }
        });
        self.user_get(id)
            .await?
            .ok_or_else(|| not_found(EntityType::User, id))
    }

    async fn user_delete(&self, id: UserId) -> EpicResult<()> {
        self.delete_by_id(EntityType::User, "epic_user", id).await
    }

    // === Bulk replacement ===

    async fn replace_domain(&self, tree: &DomainTree) -> EpicResult<()> {
        in_transaction!(self, |tx| {
            tx.execute("DELETE FROM epic_area", &[])
                .await
                .map_err(pg_error(EntityType::Area))?;
            for area in &tree.areas {
                insert_area(&tx, area).await?;
            }
            for group in &tree.groups {
                insert_group(&tx, group).await?;
            }
            for program in &tree.programs {
                insert_program(&tx, program).await?;
            }
        });
        Ok(())
    }

    async fn replace_agencies(&self, set: &AgencySet) -> EpicResult<()> {
        in_transaction!(self, |tx| {
            tx.execute("DELETE FROM epic_agency", &[])
                .await
                .map_err(pg_error(EntityType::Agency))?;
            for agency in &set.agencies {
                tx.execute(
                    "INSERT INTO epic_agency (id, name) VALUES ($1, $2)",
                    &[&agency.id, &agency.name],
                )
                .await
                .map_err(pg_error(EntityType::Agency))?;
            }
            for (agency_id, program_id) in &set.links {
                link_agency(&tx, *agency_id, *program_id).await?;
            }
        });
        Ok(())
    }

    async fn replace_questions(&self, kind: QuestionKind, questions: &[Question]) -> EpicResult<()> {
        if let Some(other) = questions.iter().find(|q| q.kind() != kind) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Question,
                reason: format!("expected {} question, got {}", kind, other.kind()),
            }
            .into());
        }
        in_transaction!(self, |tx| {
            tx.execute("DELETE FROM epic_question WHERE kind = $1", &[&kind.as_db_str()])
                .await
                .map_err(pg_error(EntityType::Question))?;
            for question in questions {
                insert_question(&tx, question).await?;
            }
        });
        Ok(())
    }

    async fn regenerate_linkages(&self) -> EpicResult<Vec<Question>> {
        let programs = self.program_list().await?;
        let created: Vec<Question> = programs.iter().map(|p| Question::linkages(p.id)).collect();
        in_transaction!(self, |tx| {
            tx.execute(
                "DELETE FROM epic_question WHERE kind = $1",
                &[&QuestionKind::Linkages.as_db_str()],
            )
            .await
            .map_err(pg_error(EntityType::Question))?;
            for question in &created {
                insert_question(&tx, question).await?;
            }
        });
        Ok(created)
    }
}
