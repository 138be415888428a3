//! SQLite-backed store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use tracing::{debug, info};

use nhanes_model::{
    Cycle, Dataset, Group, Observation, Rule, RuleId, RuleVariable, SystemConfig, Variable,
    VariableRole, VariableType, WorkProcess, WorkProcessRule, WorkStatus,
};

use crate::error::{Result, StoreError};
use crate::store::{DataStore, ObservationFilter};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cycles (
      name TEXT PRIMARY KEY,
      year_code TEXT,
      base_url TEXT NOT NULL,
      dataset_url_pattern TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS dataset_groups (
      name TEXT PRIMARY KEY,
      description TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS datasets (
      name TEXT PRIMARY KEY,
      description TEXT NOT NULL DEFAULT '',
      group_name TEXT
    );

    CREATE TABLE IF NOT EXISTS variables (
      name TEXT PRIMARY KEY,
      description TEXT NOT NULL DEFAULT '',
      variable_type TEXT NOT NULL DEFAULT 'oth'
    );

    CREATE TABLE IF NOT EXISTS rules (
      id INTEGER PRIMARY KEY,
      name TEXT NOT NULL,
      version TEXT NOT NULL,
      description TEXT NOT NULL DEFAULT '',
      module TEXT NOT NULL,
      is_active INTEGER NOT NULL DEFAULT 1,
      UNIQUE(name, version)
    );

    CREATE TABLE IF NOT EXISTS rule_variables (
      rule_id INTEGER NOT NULL,
      variable TEXT NOT NULL,
      dataset TEXT,
      role TEXT NOT NULL,
      UNIQUE(rule_id, variable, dataset, role)
    );

    CREATE TABLE IF NOT EXISTS work_process_rules (
      rule_id INTEGER PRIMARY KEY,
      status TEXT NOT NULL,
      last_synced_at TEXT,
      attempt_count INTEGER NOT NULL DEFAULT 0,
      execution_logs TEXT NOT NULL DEFAULT '',
      execution_time_ms INTEGER
    );

    CREATE TABLE IF NOT EXISTS work_processes (
      dataset TEXT NOT NULL,
      cycle TEXT NOT NULL,
      status TEXT NOT NULL,
      is_download INTEGER NOT NULL DEFAULT 0,
      last_synced_at TEXT,
      source_file_version TEXT NOT NULL DEFAULT '',
      source_file_size INTEGER NOT NULL DEFAULT 0,
      chk_raw INTEGER NOT NULL DEFAULT 0,
      chk_normalization INTEGER NOT NULL DEFAULT 0,
      system_version TEXT NOT NULL DEFAULT '',
      time_download REAL NOT NULL DEFAULT 0,
      time_raw REAL NOT NULL DEFAULT 0,
      time_normalization REAL NOT NULL DEFAULT 0,
      records_raw INTEGER NOT NULL DEFAULT 0,
      records_normalization INTEGER NOT NULL DEFAULT 0,
      n_samples INTEGER NOT NULL DEFAULT 0,
      n_variables INTEGER NOT NULL DEFAULT 0,
      PRIMARY KEY(dataset, cycle)
    );

    CREATE TABLE IF NOT EXISTS system_config (
      config_key TEXT PRIMARY KEY,
      config_check INTEGER NOT NULL DEFAULT 0,
      config_value TEXT NOT NULL DEFAULT ''
    );

    CREATE TABLE IF NOT EXISTS observations (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      version TEXT NOT NULL,
      cycle TEXT NOT NULL,
      dataset TEXT NOT NULL,
      variable TEXT NOT NULL,
      sample INTEGER NOT NULL,
      sequence INTEGER NOT NULL,
      value TEXT NOT NULL,
      rule_id INTEGER
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_observations_key
      ON observations(version, cycle, dataset, variable, sample, sequence);
    CREATE INDEX IF NOT EXISTS idx_observations_variable ON observations(variable, dataset);
    CREATE INDEX IF NOT EXISTS idx_observations_rule ON observations(rule_id);
    CREATE INDEX IF NOT EXISTS idx_observations_pair ON observations(dataset, cycle);
";

/// A [`DataStore`] persisted in a single SQLite file.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        info!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().map_err(StoreError::sqlite("open"))?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .map_err(StoreError::sqlite("set journal_mode=WAL"))?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .map_err(StoreError::sqlite("set synchronous=NORMAL"))?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(SCHEMA)
        .map_err(StoreError::sqlite("create schema"))?;
    debug!("sqlite schema ready");
    Ok(())
}

fn is_constraint(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

fn insert_error(entity: &'static str, key: String) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| {
        if is_constraint(&source) {
            StoreError::Duplicate { entity, key }
        } else {
            StoreError::Sqlite {
                operation: "insert",
                source,
            }
        }
    }
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<Observation> {
    Ok(Observation {
        version: row.get(0)?,
        cycle: row.get(1)?,
        dataset: row.get(2)?,
        variable: row.get(3)?,
        sample: row.get(4)?,
        sequence: row.get(5)?,
        value: row.get(6)?,
        rule_id: row.get::<_, Option<i64>>(7)?.map(RuleId::new),
    })
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    Ok(Rule {
        id: RuleId::new(row.get(0)?),
        name: row.get(1)?,
        version: row.get(2)?,
        description: row.get(3)?,
        module: row.get(4)?,
        is_active: row.get(5)?,
    })
}

type RawWorkProcessRule = (i64, String, Option<DateTime<Utc>>, u32, String, Option<u64>);

fn decode_work_process_rule(raw: RawWorkProcessRule) -> Result<WorkProcessRule> {
    let (rule_id, status, last_synced_at, attempt_count, execution_logs, execution_time_ms) = raw;
    Ok(WorkProcessRule {
        rule_id: RuleId::new(rule_id),
        status: status.parse::<WorkStatus>()?,
        last_synced_at,
        attempt_count,
        execution_logs,
        execution_time_ms,
    })
}

const WORK_PROCESS_COLUMNS: &str = "dataset, cycle, status, is_download, last_synced_at, \
     source_file_version, source_file_size, chk_raw, chk_normalization, system_version, \
     time_download, time_raw, time_normalization, records_raw, records_normalization, \
     n_samples, n_variables";

/// Reads a work-process row, keeping the status as its raw code.
fn work_process_from_row(row: &Row<'_>) -> rusqlite::Result<(WorkProcess, String)> {
    let status: String = row.get(2)?;
    let process = WorkProcess {
        dataset: row.get(0)?,
        cycle: row.get(1)?,
        status: WorkStatus::Pending,
        is_download: row.get(3)?,
        last_synced_at: row.get(4)?,
        source_file_version: row.get(5)?,
        source_file_size: row.get(6)?,
        chk_raw: row.get(7)?,
        chk_normalization: row.get(8)?,
        system_version: row.get(9)?,
        time_download: row.get(10)?,
        time_raw: row.get(11)?,
        time_normalization: row.get(12)?,
        records_raw: row.get(13)?,
        records_normalization: row.get(14)?,
        n_samples: row.get(15)?,
        n_variables: row.get(16)?,
    };
    Ok((process, status))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn decode_work_process((mut process, status): (WorkProcess, String)) -> Result<WorkProcess> {
    process.status = status.parse::<WorkStatus>()?;
    Ok(process)
}

impl DataStore for SqliteStore {
    fn fetch_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        let names = filter.variable_names();
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut clauses = vec![format!("variable IN ({})", placeholders(names.len()))];
        let mut bound: Vec<&str> = names;
        if let Some(datasets) = filter.dataset_names() {
            if datasets.is_empty() {
                return Ok(Vec::new());
            }
            clauses.push(format!("dataset IN ({})", placeholders(datasets.len())));
            bound.extend(datasets);
        }
        if let Some(version) = filter.exclude_version.as_deref() {
            clauses.push("version <> ?".to_string());
            bound.push(version);
        }
        let sql = format!(
            "SELECT version, cycle, dataset, variable, sample, sequence, value, rule_id \
             FROM observations WHERE {} \
             ORDER BY version, cycle, dataset, sample, sequence, id",
            clauses.join(" AND ")
        );
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&sql)
            .map_err(StoreError::sqlite("prepare observation query"))?;
        let rows = statement
            .query_map(params_from_iter(bound.iter()), observation_from_row)
            .map_err(StoreError::sqlite("query observations"))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::sqlite("read observation"))
    }

    fn insert_observations(&self, rows: &[Observation]) -> Result<usize> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .map_err(StoreError::sqlite("begin transaction"))?;
        {
            let mut statement = tx
                .prepare_cached(
                    "INSERT INTO observations \
                     (version, cycle, dataset, variable, sample, sequence, value, rule_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(StoreError::sqlite("prepare observation insert"))?;
            for row in rows {
                statement
                    .execute(params![
                        row.version,
                        row.cycle,
                        row.dataset,
                        row.variable,
                        row.sample,
                        row.sequence,
                        row.value,
                        row.rule_id.map(RuleId::get),
                    ])
                    .map_err(insert_error(
                        "observation",
                        format!(
                            "{}/{}/{}/{}/{}/{}",
                            row.version,
                            row.cycle,
                            row.dataset,
                            row.variable,
                            row.sample,
                            row.sequence
                        ),
                    ))?;
            }
        }
        tx.commit().map_err(StoreError::sqlite("commit observations"))?;
        Ok(rows.len())
    }

    fn has_rule_output(&self, rule_id: RuleId) -> Result<bool> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM observations WHERE rule_id = ?1)",
                params![rule_id.get()],
                |row| row.get(0),
            )
            .map_err(StoreError::sqlite("check rule output"))
    }

    fn delete_rule_output(&self, rule_id: RuleId) -> Result<usize> {
        let connection = self.lock()?;
        connection
            .execute(
                "DELETE FROM observations WHERE rule_id = ?1",
                params![rule_id.get()],
            )
            .map_err(StoreError::sqlite("delete rule output"))
    }

    fn delete_observations(
        &self,
        dataset: &str,
        cycle: &str,
        keep_version: &str,
    ) -> Result<usize> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .map_err(StoreError::sqlite("begin transaction"))?;
        let removed = tx
            .execute(
                "DELETE FROM observations WHERE dataset = ?1 AND cycle = ?2 AND version <> ?3",
                params![dataset, cycle, keep_version],
            )
            .map_err(StoreError::sqlite("delete observations"))?;
        tx.commit().map_err(StoreError::sqlite("commit delete"))?;
        Ok(removed)
    }

    fn count_observations(&self, dataset: &str, cycle: &str, version: &str) -> Result<usize> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT COUNT(*) FROM observations WHERE dataset = ?1 AND cycle = ?2 AND version = ?3",
                params![dataset, cycle, version],
                |row| row.get(0),
            )
            .map_err(StoreError::sqlite("count observations"))
    }

    fn variables(&self) -> Result<Vec<Variable>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT name, description, variable_type FROM variables ORDER BY name")
            .map_err(StoreError::sqlite("prepare variable query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(StoreError::sqlite("query variables"))?;
        let mut out = Vec::new();
        for row in rows {
            let (name, description, code) = row.map_err(StoreError::sqlite("read variable"))?;
            out.push(Variable {
                name,
                description,
                variable_type: code.parse()?,
            });
        }
        Ok(out)
    }

    fn variable(&self, name: &str) -> Result<Option<Variable>> {
        let connection = self.lock()?;
        let raw = connection
            .query_row(
                "SELECT name, description, variable_type FROM variables WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::sqlite("query variable"))?;
        raw.map(|(name, description, code)| {
            Ok(Variable {
                name,
                description,
                variable_type: code.parse()?,
            })
        })
        .transpose()
    }

    fn insert_variable(&self, variable: &Variable) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO variables (name, description, variable_type) VALUES (?1, ?2, ?3)",
                params![
                    variable.name,
                    variable.description,
                    variable.variable_type.as_code()
                ],
            )
            .map_err(insert_error("variable", variable.name.clone()))?;
        Ok(())
    }

    fn compare_and_set_variable_type(
        &self,
        name: &str,
        from: VariableType,
        to: VariableType,
    ) -> Result<bool> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .map_err(StoreError::sqlite("begin transaction"))?;
        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM variables WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )
            .map_err(StoreError::sqlite("lookup variable"))?;
        if !exists {
            return Err(StoreError::NotFound {
                entity: "variable",
                key: name.to_string(),
            });
        }
        let changed = tx
            .execute(
                "UPDATE variables SET variable_type = ?1 WHERE name = ?2 AND variable_type = ?3",
                params![to.as_code(), name, from.as_code()],
            )
            .map_err(StoreError::sqlite("update variable type"))?;
        tx.commit()
            .map_err(StoreError::sqlite("commit variable type"))?;
        Ok(changed == 1)
    }

    fn cycles(&self) -> Result<Vec<Cycle>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT name, year_code, base_url, dataset_url_pattern FROM cycles ORDER BY name",
            )
            .map_err(StoreError::sqlite("prepare cycle query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(Cycle {
                    name: row.get(0)?,
                    year_code: row.get(1)?,
                    base_url: row.get(2)?,
                    dataset_url_pattern: row.get(3)?,
                })
            })
            .map_err(StoreError::sqlite("query cycles"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::sqlite("read cycle"))
    }

    fn insert_cycle(&self, cycle: &Cycle) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO cycles (name, year_code, base_url, dataset_url_pattern) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    cycle.name,
                    cycle.year_code,
                    cycle.base_url,
                    cycle.dataset_url_pattern
                ],
            )
            .map_err(insert_error("cycle", cycle.name.clone()))?;
        Ok(())
    }

    fn groups(&self) -> Result<Vec<Group>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT name, description FROM dataset_groups ORDER BY name")
            .map_err(StoreError::sqlite("prepare group query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(Group {
                    name: row.get(0)?,
                    description: row.get(1)?,
                })
            })
            .map_err(StoreError::sqlite("query groups"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::sqlite("read group"))
    }

    fn insert_group(&self, group: &Group) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO dataset_groups (name, description) VALUES (?1, ?2)",
                params![group.name, group.description],
            )
            .map_err(insert_error("group", group.name.clone()))?;
        Ok(())
    }

    fn datasets(&self) -> Result<Vec<Dataset>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT name, description, group_name FROM datasets ORDER BY name")
            .map_err(StoreError::sqlite("prepare dataset query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok(Dataset {
                    name: row.get(0)?,
                    description: row.get(1)?,
                    group: row.get(2)?,
                })
            })
            .map_err(StoreError::sqlite("query datasets"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::sqlite("read dataset"))
    }

    fn insert_dataset(&self, dataset: &Dataset) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO datasets (name, description, group_name) VALUES (?1, ?2, ?3)",
                params![dataset.name, dataset.description, dataset.group],
            )
            .map_err(insert_error("dataset", dataset.name.clone()))?;
        Ok(())
    }

    fn rules(&self) -> Result<Vec<Rule>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT id, name, version, description, module, is_active FROM rules ORDER BY id",
            )
            .map_err(StoreError::sqlite("prepare rule query"))?;
        let rows = statement
            .query_map([], rule_from_row)
            .map_err(StoreError::sqlite("query rules"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::sqlite("read rule"))
    }

    fn rule(&self, id: RuleId) -> Result<Option<Rule>> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT id, name, version, description, module, is_active FROM rules WHERE id = ?1",
                params![id.get()],
                rule_from_row,
            )
            .optional()
            .map_err(StoreError::sqlite("query rule"))
    }

    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO rules (id, name, version, description, module, is_active) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rule.id.get(),
                    rule.name,
                    rule.version,
                    rule.description,
                    rule.module,
                    rule.is_active
                ],
            )
            .map_err(insert_error(
                "rule",
                format!("{} ({} v{})", rule.id, rule.name, rule.version),
            ))?;
        Ok(())
    }

    fn rule_variables(&self, rule_id: RuleId) -> Result<Vec<RuleVariable>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT variable, dataset, role FROM rule_variables \
                 WHERE rule_id = ?1 ORDER BY rowid",
            )
            .map_err(StoreError::sqlite("prepare rule variable query"))?;
        let rows = statement
            .query_map(params![rule_id.get()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(StoreError::sqlite("query rule variables"))?;
        let mut out = Vec::new();
        for row in rows {
            let (variable, dataset, role) =
                row.map_err(StoreError::sqlite("read rule variable"))?;
            out.push(RuleVariable {
                rule_id,
                variable,
                dataset,
                role: role.parse::<VariableRole>()?,
            });
        }
        Ok(out)
    }

    fn insert_rule_variable(&self, row: &RuleVariable) -> Result<()> {
        let connection = self.lock()?;
        let rule_exists: bool = connection
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM rules WHERE id = ?1)",
                params![row.rule_id.get()],
                |r| r.get(0),
            )
            .map_err(StoreError::sqlite("lookup rule"))?;
        if !rule_exists {
            return Err(StoreError::NotFound {
                entity: "rule",
                key: row.rule_id.to_string(),
            });
        }
        connection
            .execute(
                "INSERT INTO rule_variables (rule_id, variable, dataset, role) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.rule_id.get(),
                    row.variable,
                    row.dataset,
                    row.role.as_code()
                ],
            )
            .map_err(insert_error(
                "rule variable",
                format!("{}:{}:{}", row.rule_id, row.variable, row.role),
            ))?;
        Ok(())
    }

    fn work_process_rules(&self) -> Result<Vec<WorkProcessRule>> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare(
                "SELECT rule_id, status, last_synced_at, attempt_count, execution_logs, \
                 execution_time_ms FROM work_process_rules ORDER BY rule_id",
            )
            .map_err(StoreError::sqlite("prepare work process rule query"))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(StoreError::sqlite("query work process rules"))?;
        let mut out = Vec::new();
        for row in rows {
            let raw: RawWorkProcessRule =
                row.map_err(StoreError::sqlite("read work process rule"))?;
            out.push(decode_work_process_rule(raw)?);
        }
        Ok(out)
    }

    fn work_process_rule(&self, rule_id: RuleId) -> Result<Option<WorkProcessRule>> {
        let connection = self.lock()?;
        let raw: Option<RawWorkProcessRule> = connection
            .query_row(
                "SELECT rule_id, status, last_synced_at, attempt_count, execution_logs, \
                 execution_time_ms FROM work_process_rules WHERE rule_id = ?1",
                params![rule_id.get()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()
            .map_err(StoreError::sqlite("query work process rule"))?;
        raw.map(decode_work_process_rule).transpose()
    }

    fn save_work_process_rule(&self, process: &WorkProcessRule) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO work_process_rules \
                 (rule_id, status, last_synced_at, attempt_count, execution_logs, execution_time_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    process.rule_id.get(),
                    process.status.as_code(),
                    process.last_synced_at,
                    process.attempt_count,
                    process.execution_logs,
                    process.execution_time_ms,
                ],
            )
            .map_err(StoreError::sqlite("save work process rule"))?;
        Ok(())
    }

    fn work_processes(&self) -> Result<Vec<WorkProcess>> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {WORK_PROCESS_COLUMNS} FROM work_processes ORDER BY dataset, cycle"
        );
        let mut statement = connection
            .prepare(&sql)
            .map_err(StoreError::sqlite("prepare work process query"))?;
        let rows = statement
            .query_map([], work_process_from_row)
            .map_err(StoreError::sqlite("query work processes"))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(decode_work_process(
                row.map_err(StoreError::sqlite("read work process"))?,
            )?);
        }
        Ok(out)
    }

    fn work_process(&self, dataset: &str, cycle: &str) -> Result<Option<WorkProcess>> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {WORK_PROCESS_COLUMNS} FROM work_processes WHERE dataset = ?1 AND cycle = ?2"
        );
        let raw = connection
            .query_row(&sql, params![dataset, cycle], work_process_from_row)
            .optional()
            .map_err(StoreError::sqlite("query work process"))?;
        raw.map(decode_work_process).transpose()
    }

    fn save_work_process(&self, process: &WorkProcess) -> Result<()> {
        let connection = self.lock()?;
        let sql = format!(
            "INSERT OR REPLACE INTO work_processes ({WORK_PROCESS_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        );
        connection
            .execute(
                &sql,
                params![
                    process.dataset,
                    process.cycle,
                    process.status.as_code(),
                    process.is_download,
                    process.last_synced_at,
                    process.source_file_version,
                    process.source_file_size,
                    process.chk_raw,
                    process.chk_normalization,
                    process.system_version,
                    process.time_download,
                    process.time_raw,
                    process.time_normalization,
                    process.records_raw,
                    process.records_normalization,
                    process.n_samples,
                    process.n_variables,
                ],
            )
            .map_err(StoreError::sqlite("save work process"))?;
        Ok(())
    }

    fn system_config(&self, key: &str) -> Result<Option<SystemConfig>> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT config_key, config_check, config_value FROM system_config \
                 WHERE config_key = ?1",
                params![key],
                |row| {
                    Ok(SystemConfig {
                        config_key: row.get(0)?,
                        config_check: row.get(1)?,
                        config_value: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::sqlite("query system config"))
    }

    fn set_system_config(&self, config: &SystemConfig) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT OR REPLACE INTO system_config (config_key, config_check, config_value) \
                 VALUES (?1, ?2, ?3)",
                params![config.config_key, config.config_check, config.config_value],
            )
            .map_err(StoreError::sqlite("save system config"))?;
        Ok(())
    }
}
