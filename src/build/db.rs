//! The per-build file-deps database.
//!
//! One row per output file: the command that produced it and the
//! command's captured output, plus a child table of inputs with the
//! mtime observed when the record was written. Staleness is "any input
//! whose current mtime differs from the recorded one (or which no
//! longer exists)". All records accumulated during a compile phase are
//! written in a single transaction.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use rusqlite::{params, Connection, OptionalExtension};

use crate::build::deps::FileDepsInfo;
use crate::error::Result;

/// Handle to the `.drover-deps.db` file in a build's output directory.
pub struct FileDepsDb {
    db: Connection,
}

/// What [`FileDepsDb::get_rebuild_info`] knows about a prior
/// production of an output file.
#[derive(Debug, Default)]
pub struct RebuildInfo {
    pub previous_command: String,
    pub previous_output: String,
    /// Inputs whose mtime differs from the recorded one.
    pub newer_inputs: Vec<PathBuf>,
}

/// The mtime of `path` in integer nanoseconds since the epoch, or
/// `None` if the file cannot be statted.
pub fn mtime_nanos(path: &Path) -> Option<i64> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime = meta.modified().ok()?;
    let since = mtime.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since.as_nanos()).ok()
}

impl FileDepsDb {
    /// Open (creating if necessary) the database at `path`.
    pub fn open(path: &Path) -> Result<FileDepsDb> {
        let db = Connection::open(path)?;
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS drover_file_commands (
                file TEXT PRIMARY KEY,
                command TEXT NOT NULL,
                output TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS drover_file_inputs (
                out_file TEXT NOT NULL,
                input_file TEXT NOT NULL,
                input_mtime INTEGER NOT NULL,
                UNIQUE(out_file, input_file)
            );
            "#,
        )?;
        Ok(FileDepsDb { db })
    }

    /// Read the stored record for `output` and re-stat its inputs.
    /// `None` means no record exists (the output has never been
    /// produced, or its toolchain records no deps).
    pub fn get_rebuild_info(&self, output: &Path) -> Result<Option<RebuildInfo>> {
        let key = output.display().to_string();
        let row = self
            .db
            .query_row(
                "SELECT command, output FROM drover_file_commands WHERE file = ?1",
                params![key],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some((previous_command, previous_output)) = row else {
            return Ok(None);
        };

        let mut stmt = self.db.prepare(
            "SELECT input_file, input_mtime FROM drover_file_inputs WHERE out_file = ?1",
        )?;
        let rows = stmt.query_map(params![key], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })?;

        let mut newer_inputs = Vec::new();
        for row in rows {
            let (input, recorded) = row?;
            let input = PathBuf::from(input);
            match mtime_nanos(&input) {
                Some(current) if current == recorded => {}
                _ => newer_inputs.push(input),
            }
        }

        Ok(Some(RebuildInfo {
            previous_command,
            previous_output,
            newer_inputs,
        }))
    }

    /// Replace the records for every entry of `infos` in one
    /// transaction. Input mtimes are observed now, after the commands
    /// have finished writing their outputs.
    pub fn update_deps_batch(&mut self, infos: &[FileDepsInfo]) -> Result<()> {
        let tx = self.db.transaction()?;
        for info in infos {
            let key = info.output.display().to_string();
            tx.execute(
                r#"
                INSERT INTO drover_file_commands (file, command, output)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(file) DO UPDATE SET
                    command = excluded.command,
                    output = excluded.output
                "#,
                params![key, info.command, info.command_output],
            )?;
            tx.execute(
                "DELETE FROM drover_file_inputs WHERE out_file = ?1",
                params![key],
            )?;
            for input in &info.inputs {
                let mtime = mtime_nanos(input).unwrap_or(0);
                tx.execute(
                    r#"
                    INSERT OR REPLACE INTO drover_file_inputs
                        (out_file, input_file, input_mtime)
                    VALUES (?1, ?2, ?3)
                    "#,
                    params![key, input.display().to_string(), mtime],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
