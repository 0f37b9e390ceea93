//! # Package Catalog
//!
//! The catalog is a durable index of packages known to exist: for each
//! `name@version`, where to obtain its sources (currently a git remote)
//! and which dependencies it declares. It is stored in a single SQLite
//! database file, schema-versioned through a JSON meta blob so that an
//! older drover refuses a newer database instead of misreading it.
//!
//! All mutating operations run inside transactions; a bulk
//! [`Catalog::import_json`] either ingests the entire document or
//! nothing.

use std::fmt;
use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use semver::Version;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ident::{Dependency, PackageId};
use crate::suggestions::did_you_mean;
use crate::version::{parse_version, VersionRange};

const CURRENT_VERSION: i64 = 1;

/// The `namespace/name` hint used to synthesize a manifest for remotes
/// that do not carry one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoLib {
    pub namespace: String,
    pub name: String,
}

impl AutoLib {
    /// Parse the `namespace/name` textual form.
    pub fn parse(s: &str) -> Option<AutoLib> {
        let (namespace, name) = s.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(AutoLib {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for AutoLib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Where a package's sources can be obtained.
///
/// A tagged union so that future remote kinds can be added without a
/// schema break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteListing {
    Git {
        url: String,
        gitref: String,
        auto_lib: Option<AutoLib>,
    },
}

/// One catalog row: a package, its dependencies, and its remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub ident: PackageId,
    pub deps: Vec<Dependency>,
    pub description: String,
    pub remote: RemoteListing,
}

/// A handle to an open catalog database.
#[derive(Debug)]
pub struct Catalog {
    db: Connection,
}

fn corrupted(message: impl Into<String>) -> Error {
    Error::CorruptedCatalogDb {
        message: message.into(),
    }
}

fn migrate_1(db: &Connection) -> rusqlite::Result<()> {
    db.execute_batch(
        r#"
        CREATE TABLE drover_cat_pkgs (
            pkg_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            git_url TEXT,
            git_ref TEXT,
            auto_lib_name TEXT,
            auto_lib_namespace TEXT,
            description TEXT NOT NULL,
            UNIQUE(name, version),
            CONSTRAINT has_source_info CHECK(
                (git_url NOT NULL AND git_ref NOT NULL) = 1
            ),
            CONSTRAINT valid_auto_lib_info CHECK(
                (auto_lib_name NOT NULL AND auto_lib_namespace NOT NULL)
                + (auto_lib_name ISNULL AND auto_lib_namespace ISNULL)
                = 1
            )
        );

        CREATE TABLE drover_cat_pkg_deps (
            dep_id INTEGER PRIMARY KEY AUTOINCREMENT,
            pkg_id INTEGER NOT NULL REFERENCES drover_cat_pkgs(pkg_id),
            dep_name TEXT NOT NULL,
            low TEXT NOT NULL,
            high TEXT NOT NULL,
            UNIQUE(pkg_id, dep_name)
        );
        "#,
    )
}

fn ensure_migrated(db: &mut Connection) -> Result<()> {
    db.execute_batch("PRAGMA foreign_keys = 1;")?;
    let tx = db.transaction()?;
    tx.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS drover_cat_meta AS
            WITH init(meta) AS (VALUES ('{"version": 0}'))
            SELECT * FROM init;
        "#,
    )?;
    let meta_json: String = tx.query_row("SELECT meta FROM drover_cat_meta", [], |r| r.get(0))?;

    let meta: Value = serde_json::from_str(&meta_json)
        .map_err(|_| corrupted("The catalog database metadata is not valid JSON"))?;
    if !meta.is_object() {
        return Err(corrupted("The catalog database metadata is invalid"));
    }
    let version = meta
        .get("version")
        .and_then(Value::as_i64)
        .ok_or_else(|| corrupted("The catalog database metadata is invalid [bad meta.version]"))?;

    if version > CURRENT_VERSION {
        return Err(Error::CatalogTooNew);
    }
    if version < 1 {
        migrate_1(&tx)?;
    }
    let new_meta = serde_json::json!({ "version": CURRENT_VERSION });
    tx.execute(
        "UPDATE drover_cat_meta SET meta = ?1",
        params![new_meta.to_string()],
    )?;
    tx.commit()?;
    Ok(())
}

impl Catalog {
    /// Open (creating and migrating as needed) the catalog at `db_path`.
    ///
    /// The special path `:memory:` opens a transient in-memory catalog.
    pub fn open(db_path: &Path) -> Result<Catalog> {
        if db_path.to_str() != Some(":memory:") {
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        let mut db = Connection::open(db_path)?;
        match ensure_migrated(&mut db) {
            Ok(()) => {}
            Err(Error::Sqlite(e)) => {
                log::error!(
                    "Failed to load the catalog database. It appears to be invalid/corrupted: {e}"
                );
                return Err(corrupted(e.to_string()));
            }
            Err(other) => return Err(other),
        }
        Ok(Catalog { db })
    }

    /// Upsert a package row and its dependency list.
    pub fn store(&mut self, pkg: &PackageInfo) -> Result<()> {
        let tx = self.db.transaction()?;
        store_with(&tx, pkg)?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch one package, or `None` if it has no catalog row. Use
    /// [`Catalog::suggest`] to obtain a "did you mean" hint for misses.
    pub fn get(&self, pk_id: &PackageId) -> Result<Option<PackageInfo>> {
        let row = self
            .db
            .query_row(
                r#"
                SELECT git_url, git_ref, auto_lib_name, auto_lib_namespace, description
                  FROM drover_cat_pkgs
                 WHERE name = ?1 AND version = ?2
                "#,
                params![pk_id.name, pk_id.version.to_string()],
                |r| {
                    Ok((
                        r.get::<_, Option<String>>(0)?,
                        r.get::<_, Option<String>>(1)?,
                        r.get::<_, Option<String>>(2)?,
                        r.get::<_, Option<String>>(3)?,
                        r.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((git_url, git_ref, auto_name, auto_ns, description)) = row else {
            return Ok(None);
        };

        let url = git_url.ok_or_else(|| corrupted("package row is missing its git URL"))?;
        let gitref = git_ref.ok_or_else(|| corrupted("package row is missing its git ref"))?;
        let auto_lib = match (auto_ns, auto_name) {
            (Some(namespace), Some(name)) => Some(AutoLib { namespace, name }),
            (None, None) => None,
            _ => return Err(corrupted("package row has partial auto-lib info")),
        };

        let deps = self.dependencies_of(pk_id)?;
        Ok(Some(PackageInfo {
            ident: pk_id.clone(),
            deps,
            description,
            remote: RemoteListing::Git {
                url,
                gitref,
                auto_lib,
            },
        }))
    }

    /// A "did you mean" suggestion for an ID that was not found.
    pub fn suggest(&self, pk_id: &PackageId) -> Option<String> {
        let all = self.all().ok()?;
        did_you_mean(
            &pk_id.to_string(),
            all.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        )
    }

    /// Every package ID in the catalog, sorted.
    pub fn all(&self) -> Result<Vec<PackageId>> {
        self.ids_from_query("SELECT name, version FROM drover_cat_pkgs", params![])
    }

    /// Every version of a single package, sorted.
    pub fn by_name(&self, name: &str) -> Result<Vec<PackageId>> {
        self.ids_from_query(
            "SELECT name, version FROM drover_cat_pkgs WHERE name = ?1",
            params![name],
        )
    }

    fn ids_from_query(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<PackageId>> {
        let mut stmt = self.db.prepare(sql)?;
        let rows = stmt.query_map(args, |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (name, version) = row?;
            let version = Version::parse(&version)
                .map_err(|_| corrupted(format!("unparseable version '{version}' for '{name}'")))?;
            ids.push(PackageId { name, version });
        }
        ids.sort();
        Ok(ids)
    }

    /// The declared dependencies of a package, ordered by name.
    pub fn dependencies_of(&self, pkg: &PackageId) -> Result<Vec<Dependency>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT dep_name, low, high
              FROM drover_cat_pkg_deps
             WHERE pkg_id = (
                SELECT pkg_id FROM drover_cat_pkgs WHERE name = ?1 AND version = ?2
             )
          ORDER BY dep_name
            "#,
        )?;
        let rows = stmt.query_map(params![pkg.name, pkg.version.to_string()], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;
        let mut deps = Vec::new();
        for row in rows {
            let (name, low, high) = row?;
            let low = parse_version(&low)?;
            let high = parse_version(&high)?;
            deps.push(Dependency::new(name, VersionRange::interval(low, high)));
        }
        Ok(deps)
    }

    /// Bulk-import entries from a schema-versioned JSON document.
    ///
    /// The whole document is ingested in a single transaction: any
    /// record error leaves the catalog untouched.
    pub fn import_json(&mut self, content: &str) -> Result<()> {
        let root: Value = serde_json::from_str(content).map_err(|e| Error::InvalidCatalogJson {
            message: format!("not valid JSON: {e}"),
        })?;

        let bad = |message: String| Error::InvalidCatalogJson { message };

        let root_obj = root
            .as_object()
            .ok_or_else(|| bad("Root of JSON must be an object (key-value mapping)".into()))?;

        let version = root_obj
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| bad("/version must be an integral value".into()))?;
        if version > CURRENT_VERSION {
            return Err(bad(
                "/version is too new. We don't know how to parse this.".into(),
            ));
        }

        let packages = root_obj
            .get("packages")
            .and_then(Value::as_object)
            .ok_or_else(|| bad("/packages must be an object".into()))?;

        let tx = self.db.transaction()?;
        for (pkg_name, versions_map) in packages {
            let versions_map = versions_map
                .as_object()
                .ok_or_else(|| bad(format!("/packages/{pkg_name} must be an object")))?;
            for (version_str, pkg_val) in versions_map {
                let version = parse_version(version_str)?;
                let pkg_obj = pkg_val.as_object().ok_or_else(|| {
                    bad(format!("/packages/{pkg_name}/{version_str} must be an object"))
                })?;

                let mut deps = Vec::new();
                match pkg_obj.get("depends") {
                    None | Some(Value::Null) => {}
                    Some(Value::Object(map)) => {
                        for (dep_name, range_val) in map {
                            let range_str = range_val.as_str().ok_or_else(|| {
                                bad(format!(
                                    "/packages/{pkg_name}/{version_str}/depends/{dep_name} \
                                     must be a string"
                                ))
                            })?;
                            deps.push(Dependency::new(
                                dep_name.clone(),
                                VersionRange::parse(range_str)?,
                            ));
                        }
                    }
                    Some(_) => {
                        return Err(bad(format!(
                            "/packages/{pkg_name}/{version_str}/depends must be an object"
                        )))
                    }
                }

                let remote = match pkg_obj.get("git") {
                    None | Some(Value::Null) => {
                        return Err(Error::NoCatalogRemoteInfo {
                            what: format!("/packages/{pkg_name}/{version_str}"),
                        })
                    }
                    Some(Value::Object(git)) => {
                        let url = git
                            .get("url")
                            .and_then(Value::as_str)
                            .ok_or_else(|| bad("`git.url` must be a string".into()))?;
                        let gitref = git
                            .get("ref")
                            .and_then(Value::as_str)
                            .ok_or_else(|| bad("`git.ref` must be a string".into()))?;
                        let auto_lib = match git.get("auto-lib") {
                            None | Some(Value::Null) => None,
                            Some(Value::String(s)) => Some(AutoLib::parse(s).ok_or_else(|| {
                                bad(format!("`auto-lib` must be a 'namespace/name' pair, got '{s}'"))
                            })?),
                            Some(_) => return Err(bad("`auto-lib` must be a string".into())),
                        };
                        RemoteListing::Git {
                            url: url.to_string(),
                            gitref: gitref.to_string(),
                            auto_lib,
                        }
                    }
                    Some(_) => return Err(bad("`git` must be an object".into())),
                };

                let description = match pkg_obj.get("description") {
                    None | Some(Value::Null) => String::new(),
                    Some(Value::String(s)) => s.clone(),
                    Some(_) => return Err(bad("`description` must be a string".into())),
                };

                store_with(
                    &tx,
                    &PackageInfo {
                        ident: PackageId::new(pkg_name.clone(), version),
                        deps,
                        description,
                        remote,
                    },
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Perform the store inside an already-open transaction (or bare
/// connection); used by both [`Catalog::store`] and the bulk importer.
fn store_with(db: &Connection, pkg: &PackageInfo) -> Result<()> {
    let RemoteListing::Git {
        url,
        gitref,
        auto_lib,
    } = &pkg.remote;

    db.execute(
        r#"
        INSERT INTO drover_cat_pkgs (
            name, version, git_url, git_ref,
            auto_lib_name, auto_lib_namespace, description
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(name, version) DO UPDATE SET
            git_url = excluded.git_url,
            git_ref = excluded.git_ref,
            auto_lib_name = excluded.auto_lib_name,
            auto_lib_namespace = excluded.auto_lib_namespace,
            description = excluded.description
        "#,
        params![
            pkg.ident.name,
            pkg.ident.version.to_string(),
            url,
            gitref,
            auto_lib.as_ref().map(|a| a.name.clone()),
            auto_lib.as_ref().map(|a| a.namespace.clone()),
            pkg.description,
        ],
    )?;

    let pkg_row_id: i64 = db.query_row(
        "SELECT pkg_id FROM drover_cat_pkgs WHERE name = ?1 AND version = ?2",
        params![pkg.ident.name, pkg.ident.version.to_string()],
        |r| r.get(0),
    )?;

    db.execute(
        "DELETE FROM drover_cat_pkg_deps WHERE pkg_id = ?1",
        params![pkg_row_id],
    )?;
    for dep in &pkg.deps {
        let iv = dep.versions.iter_intervals().next().ok_or_else(|| {
            Error::InvalidVersionRangeString {
                string: dep.to_string(),
            }
        })?;
        db.execute(
            r#"
            INSERT INTO drover_cat_pkg_deps (pkg_id, dep_name, low, high)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                pkg_row_id,
                dep.name,
                iv.low.to_string(),
                iv.high.to_string()
            ],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_catalog() -> Catalog {
        Catalog::open(Path::new(":memory:")).unwrap()
    }

    fn git_remote(url: &str) -> RemoteListing {
        RemoteListing::Git {
            url: url.to_string(),
            gitref: "v1".to_string(),
            auto_lib: None,
        }
    }

    fn pkg(id: &str, deps: &[&str]) -> PackageInfo {
        PackageInfo {
            ident: PackageId::parse(id).unwrap(),
            deps: deps
                .iter()
                .map(|d| Dependency::parse_depends_string(d).unwrap())
                .collect(),
            description: "a test package".to_string(),
            remote: git_remote("https://example.com/repo.git"),
        }
    }

    #[test]
    fn test_store_get_roundtrip() {
        let mut cat = memory_catalog();
        let info = pkg("foo@1.2.3", &["zeta@^1.0.0", "alpha@^2.0.0"]);
        cat.store(&info).unwrap();

        let got = cat.get(&info.ident).unwrap().unwrap();
        assert_eq!(got.ident, info.ident);
        assert_eq!(got.description, info.description);
        assert_eq!(got.remote, info.remote);
        // Dependencies come back sorted by name.
        assert_eq!(got.deps[0].name, "alpha");
        assert_eq!(got.deps[1].name, "zeta");
        assert_eq!(got.deps.len(), 2);
    }

    #[test]
    fn test_store_is_upsert() {
        let mut cat = memory_catalog();
        cat.store(&pkg("foo@1.0.0", &["a@^1.0.0"])).unwrap();
        let mut updated = pkg("foo@1.0.0", &["b@^2.0.0"]);
        updated.description = "updated".to_string();
        cat.store(&updated).unwrap();

        assert_eq!(cat.all().unwrap().len(), 1);
        let got = cat.get(&updated.ident).unwrap().unwrap();
        assert_eq!(got.description, "updated");
        assert_eq!(got.deps.len(), 1);
        assert_eq!(got.deps[0].name, "b");
    }

    #[test]
    fn test_get_absent_and_suggest() {
        let mut cat = memory_catalog();
        cat.store(&pkg("neo-fun@0.4.0", &[])).unwrap();
        let miss = PackageId::parse("neo-fun@0.4.1").unwrap();
        assert!(cat.get(&miss).unwrap().is_none());
        assert_eq!(cat.suggest(&miss), Some("neo-fun@0.4.0".to_string()));
    }

    #[test]
    fn test_all_and_by_name_sorted() {
        let mut cat = memory_catalog();
        cat.store(&pkg("b@1.0.0", &[])).unwrap();
        cat.store(&pkg("a@2.0.0", &[])).unwrap();
        cat.store(&pkg("a@1.0.0", &[])).unwrap();

        let all: Vec<String> = cat.all().unwrap().iter().map(|i| i.to_string()).collect();
        assert_eq!(all, ["a@1.0.0", "a@2.0.0", "b@1.0.0"]);

        let a_only: Vec<String> = cat
            .by_name("a")
            .unwrap()
            .iter()
            .map(|i| i.to_string())
            .collect();
        assert_eq!(a_only, ["a@1.0.0", "a@2.0.0"]);
    }

    #[test]
    fn test_import_json() {
        let mut cat = memory_catalog();
        cat.import_json(
            r#"{
                "version": 1,
                "packages": {
                    "foo": {
                        "1.2.3": {
                            "depends": { "bar": "^2.0.0" },
                            "git": {
                                "url": "https://example.com/foo.git",
                                "ref": "v1.2.3",
                                "auto-lib": "acme/foo"
                            },
                            "description": "A package"
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let id = PackageId::parse("foo@1.2.3").unwrap();
        let got = cat.get(&id).unwrap().unwrap();
        assert_eq!(got.deps.len(), 1);
        let RemoteListing::Git { url, auto_lib, .. } = got.remote;
        assert_eq!(url, "https://example.com/foo.git");
        assert_eq!(auto_lib.unwrap().to_string(), "acme/foo");
    }

    #[test]
    fn test_import_too_new_version_refused() {
        let mut cat = memory_catalog();
        let err = cat
            .import_json(r#"{ "version": 2, "packages": {} }"#)
            .unwrap_err();
        assert_eq!(err.id(), "invalid_catalog_json");
    }

    #[test]
    fn test_import_without_remote_fails_atomically() {
        let mut cat = memory_catalog();
        let err = cat
            .import_json(
                r#"{
                    "version": 1,
                    "packages": {
                        "ok": { "1.0.0": { "git": { "url": "u", "ref": "r" } } },
                        "zz-bad": { "1.0.0": { "description": "no remote" } }
                    }
                }"#,
            )
            .unwrap_err();
        assert_eq!(err.id(), "no_catalog_remote_info");
        // The batch aborted: not even the valid entry was stored.
        assert!(cat.all().unwrap().is_empty());
    }

    #[test]
    fn test_catalog_too_new() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        {
            let cat = Catalog::open(&db_path).unwrap();
            cat.db
                .execute(
                    "UPDATE drover_cat_meta SET meta = ?1",
                    params![r#"{"version": 99}"#],
                )
                .unwrap();
        }
        let err = Catalog::open(&db_path).unwrap_err();
        assert_eq!(err.id(), "catalog_too_new");
    }

    #[test]
    fn test_corrupted_meta() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        {
            let cat = Catalog::open(&db_path).unwrap();
            cat.db
                .execute("UPDATE drover_cat_meta SET meta = 'not json'", [])
                .unwrap();
        }
        let err = Catalog::open(&db_path).unwrap_err();
        assert_eq!(err.id(), "corrupted_catalog_db");
    }

    #[test]
    fn test_auto_lib_parse() {
        let a = AutoLib::parse("acme/widgets").unwrap();
        assert_eq!(a.namespace, "acme");
        assert_eq!(a.name, "widgets");
        assert!(AutoLib::parse("no-slash").is_none());
        assert!(AutoLib::parse("/name").is_none());
        assert!(AutoLib::parse("a/b/c").is_none());
    }
}
