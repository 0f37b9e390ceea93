//! The error taxonomy shared by every drover subsystem.
//!
//! Every user-visible failure carries a stable identifier (see
//! [`Error::id`]) that is printed as a `refer:` line so that error
//! messages can be looked up in documentation and bug reports. The
//! CLI layer maps errors onto exit codes: `UserCancelled` exits 2,
//! every other [`Error`] exits 1, and anything unexpected exits 2.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for drover operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid package name '{name}': {message}")]
    InvalidPkgName { name: String, message: String },

    #[error("Invalid version string '{string}'")]
    InvalidVersionString { string: String },

    #[error("Invalid version range string '{string}'")]
    InvalidVersionRangeString { string: String },

    #[error("Invalid package manifest [{path}]: {message}")]
    InvalidPkgManifest { path: String, message: String },

    #[error("Unknown test driver '{driver}' (did you mean '{hint}'?)")]
    UnknownTestDriver { driver: String, hint: String },

    #[error("Catalog JSON is invalid: {message}")]
    InvalidCatalogJson { message: String },

    #[error("No remote info for {what}")]
    NoCatalogRemoteInfo { what: String },

    #[error("The catalog database is too new for this version of drover")]
    CatalogTooNew,

    #[error("The catalog database appears to be invalid/corrupted: {message}")]
    CorruptedCatalogDb { message: String },

    #[error("No package in the catalog matched the ID '{ident}'.{hint}")]
    NoSuchCatalogPackage { ident: String, hint: String },

    #[error("--git-url and --git-ref must always be specified together")]
    GitUrlRefMutualReq,

    #[error("git {action} failed for {url}@{gitref}: {message}")]
    GitFetch {
        action: String,
        url: String,
        gitref: String,
        message: String,
    },

    #[error("Source distribution already exists at {}", path.display())]
    SdistExists { path: PathBuf },

    #[error(
        "Source distribution at {} declares '{actual}', but '{expected}' was expected",
        path.display()
    )]
    SdistIdentMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Repository at {} was opened read-only", path.display())]
    RepoNotWritable { path: PathBuf },

    #[error("Unable to find a default toolchain for the build")]
    NoDefaultToolchain,

    #[error("Invalid built-in toolchain name '{name}'")]
    InvalidBuiltinToolchain { name: String },

    #[error("Invalid toolchain file [{path}]: {message}")]
    InvalidToolchainFile { path: String, message: String },

    #[error("Failed to resolve dependencies: {message}")]
    DependencyResolveFailure { message: String },

    #[error("Dependency cycle detected: {cycle}")]
    DependencyCycle { cycle: String },

    #[error("Compilation failed [{what}]")]
    CompileFailure { what: String },

    #[error("Creating static library archive [{what}] failed")]
    ArchiveFailure { what: String },

    #[error("Linking executable [{what}] failed")]
    LinkFailure { what: String },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// The stable identifier for this error kind, used in `refer:` lines.
    pub fn id(&self) -> &'static str {
        match self {
            Error::InvalidPkgName { .. } => "invalid_pkg_name",
            Error::InvalidVersionString { .. } => "invalid_version_string",
            Error::InvalidVersionRangeString { .. } => "invalid_version_range_string",
            Error::InvalidPkgManifest { .. } => "invalid_pkg_manifest",
            Error::UnknownTestDriver { .. } => "unknown_test_driver",
            Error::InvalidCatalogJson { .. } => "invalid_catalog_json",
            Error::NoCatalogRemoteInfo { .. } => "no_catalog_remote_info",
            Error::CatalogTooNew => "catalog_too_new",
            Error::CorruptedCatalogDb { .. } => "corrupted_catalog_db",
            Error::NoSuchCatalogPackage { .. } => "no_such_catalog_package",
            Error::GitUrlRefMutualReq => "git_url_ref_mutual_req",
            Error::GitFetch { .. } => "git_fetch_failure",
            Error::SdistExists { .. } => "sdist_exists",
            Error::SdistIdentMismatch { .. } => "sdist_ident_mismatch",
            Error::RepoNotWritable { .. } => "repo_not_writable",
            Error::NoDefaultToolchain => "no_default_toolchain",
            Error::InvalidBuiltinToolchain { .. } => "invalid_builtin_toolchain",
            Error::InvalidToolchainFile { .. } => "invalid_toolchain_file",
            Error::DependencyResolveFailure { .. } => "dependency_resolve_failure",
            Error::DependencyCycle { .. } => "dependency_cycle",
            Error::CompileFailure { .. } => "compile_failure",
            Error::ArchiveFailure { .. } => "archive_failure",
            Error::LinkFailure { .. } => "link_failure",
            Error::UserCancelled => "user_cancelled",
            Error::Io(_) => "io_failure",
            Error::Sqlite(_) => "db_failure",
        }
    }

    /// A paragraph explaining the error kind, printed after the summary.
    pub fn explanation(&self) -> &'static str {
        match self {
            Error::InvalidPkgName { .. } => {
                "Package names must be non-empty and may not contain the '@' symbol, \
                 which separates the name from the version in a package ID."
            }
            Error::InvalidVersionString { .. } => {
                "Version numbers must follow Semantic Versioning 2.0: a \
                 MAJOR.MINOR.PATCH triple with optional pre-release and build \
                 metadata suffixes (e.g. '1.4.0' or '2.0.0-beta.1')."
            }
            Error::InvalidVersionRangeString { .. } => {
                "Version ranges are written either as an explicit half-open \
                 interval '[low, high)', a caret range '^X.Y.Z', or a bare \
                 version 'X.Y.Z' which accepts everything up to the next major \
                 release. An empty range string is not allowed."
            }
            Error::InvalidPkgManifest { .. } => {
                "The package manifest (package.json5, package.jsonc, or \
                 package.json) could not be understood. The manifest must be a \
                 JSON5 object with at least 'name' and 'version' keys."
            }
            Error::UnknownTestDriver { .. } => {
                "The 'test_driver' manifest key selects how test executables \
                 obtain their main() entry point. Supported drivers are \
                 'Catch-Main' (drover provides a Catch main) and 'Catch' (each \
                 test provides its own)."
            }
            Error::InvalidCatalogJson { .. } => {
                "The document passed to 'catalog import' does not match the \
                 expected schema. See the error message for the JSON path that \
                 failed validation. No entries from the document were imported."
            }
            Error::NoCatalogRemoteInfo { .. } => {
                "Every package in a catalog import document must carry remote \
                 acquisition information (currently a 'git' object with 'url' \
                 and 'ref' keys), otherwise drover would have no way to obtain \
                 its sources."
            }
            Error::CatalogTooNew => {
                "The catalog database was created by a newer version of drover \
                 and uses a schema this version does not understand. Upgrade \
                 drover, or re-create the catalog with 'catalog create'."
            }
            Error::CorruptedCatalogDb { .. } => {
                "The catalog database file exists but its contents are not \
                 valid. It may have been truncated or overwritten. Re-create it \
                 with 'catalog create' and re-import your package entries."
            }
            Error::NoSuchCatalogPackage { .. } => {
                "The requested package ID has no entry in the catalog. Check \
                 the spelling and version, or add the package with 'catalog \
                 add' or 'catalog import'."
            }
            Error::GitUrlRefMutualReq => {
                "A git remote listing is only meaningful with both a URL to \
                 clone and a ref (tag or branch) to check out, so the \
                 --git-url and --git-ref flags must be passed together."
            }
            Error::GitFetch { .. } => {
                "An underlying 'git' invocation failed. The captured git error \
                 output is included in the message above. Check that the URL is \
                 reachable and the ref exists."
            }
            Error::SdistExists { .. } => {
                "The destination for the source distribution already exists. \
                 Pass '--replace' to overwrite it."
            }
            Error::SdistIdentMismatch { .. } => {
                "The manifest inside a source distribution names a different \
                 package or version than the one requested. The repository \
                 refuses to store entries whose directory name would disagree \
                 with their manifest."
            }
            Error::RepoNotWritable { .. } => {
                "The repository was opened without the write lock, so mutating \
                 operations are not permitted in this scope."
            }
            Error::NoDefaultToolchain => {
                "No toolchain was specified with '--toolchain' and no default \
                 toolchain file was found. Pass a built-in like ':gcc', \
                 ':clang', or ':msvc', or the path to a toolchain JSON5 file."
            }
            Error::InvalidBuiltinToolchain { .. } => {
                "Toolchain names beginning with ':' select a built-in. Known \
                 built-ins are ':gcc', ':clang' (optionally version-suffixed, \
                 e.g. ':gcc-9'), and ':msvc'."
            }
            Error::InvalidToolchainFile { .. } => {
                "The toolchain file could not be understood. A toolchain file \
                 is a JSON5 object that may set 'base' to a built-in name and \
                 override template and flag fields; see the error message for \
                 the failing key."
            }
            Error::DependencyResolveFailure { .. } => {
                "No assignment of package versions satisfies every declared \
                 dependency range. The message above names the dependency that \
                 could not be satisfied. You may need to relax a version range \
                 or import newer package versions into the catalog."
            }
            Error::DependencyCycle { .. } => {
                "Package dependencies must form an acyclic graph. The cycle in \
                 the message must be broken before the build can proceed."
            }
            Error::CompileFailure { .. } => {
                "A compiler subprocess exited with an error. The compiler's own \
                 diagnostics appear above; the build stops after the in-flight \
                 tasks finish."
            }
            Error::ArchiveFailure { .. } => {
                "The archiving tool failed while creating a static library \
                 from its object files. Its output appears above."
            }
            Error::LinkFailure { .. } => {
                "The linker failed while producing an executable. Its output \
                 appears above."
            }
            Error::UserCancelled => "The operation was interrupted by a signal.",
            Error::Io(_) => "An operating system I/O operation failed unexpectedly.",
            Error::Sqlite(_) => "An embedded database operation failed unexpectedly.",
        }
    }
}

/// Result type alias for drover operations
pub type Result<T> = std::result::Result<T, Error>;
