//! Archive registry and dependency resolution
//!
//! The registry owns every archive of a run. Building an archive walks its
//! directives in file order; a `requires` directive builds the referenced
//! archive first if it has not started yet, so the recursion itself yields a
//! depth-first topological order. An archive that is `BeingBuilt` is on the
//! current path, which makes re-entering it a cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use super::archive::{Archive, ArchiveState, SourceFile};
use super::select::select;
use super::tag::{self, ArityError, Directive, DirectiveKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("Archive description for archive '{archive}' is invalid: no version found")]
    MissingVersion { archive: String },

    #[error(
        "Archive description for archive '{}' is invalid: unknown directive '{}' on line {}",
        .archive,
        .directive,
        .line + 1
    )]
    UnknownDirective {
        archive: String,
        directive: String,
        line: usize,
    },

    #[error("Archive '{archive}' requires non-existent archive '{required}'")]
    DependencyNotFound { archive: String, required: String },

    #[error("Archive '{archive}' is self-referencing: requiring '{required}' forms a cycle")]
    CyclicDependency { archive: String, required: String },

    #[error("Archive '{archive}': {source}")]
    ArgumentArity {
        archive: String,
        #[source]
        source: ArityError,
    },

    #[error(
        "Archive '{}': directive '{}' on line {} expects a name, found {} '{}'",
        .archive,
        .directive,
        .line + 1,
        .found,
        .token
    )]
    ArgumentType {
        archive: String,
        directive: String,
        line: usize,
        found: &'static str,
        token: String,
    },

    #[error("Archive not found: {0}")]
    ArchiveNotFound(String),

    #[error("Archive '{archive}' has already been started (state: {state})")]
    AlreadyStarted { archive: String, state: ArchiveState },

    #[error("Archive '{archive}' cannot move from {from} to {to}")]
    InvalidTransition {
        archive: String,
        from: ArchiveState,
        to: ArchiveState,
    },

    #[error("Duplicate archive name '{name}' ({first} and {second})")]
    DuplicateArchive {
        name: String,
        first: String,
        second: String,
    },
}

impl BuildError {
    /// True for errors caused by a malformed descriptor
    pub fn is_descriptor_invalid(&self) -> bool {
        matches!(
            self,
            BuildError::MissingVersion { .. }
                | BuildError::UnknownDirective { .. }
                | BuildError::ArgumentType { .. }
        )
    }
}

/// All archives of a run, keyed by name
#[derive(Debug, Default)]
pub struct Registry {
    /// Archives in registration order
    archives: Vec<Archive>,

    /// Map from archive name to position in `archives`
    index: HashMap<String, usize>,

    /// Names in the order their builds finished
    finished: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from archives, rejecting duplicate names
    pub fn from_archives(archives: impl IntoIterator<Item = Archive>) -> Result<Self, BuildError> {
        let mut registry = Self::new();
        for archive in archives {
            registry.insert(archive)?;
        }
        Ok(registry)
    }

    /// Registers an unstarted archive
    pub fn insert(&mut self, archive: Archive) -> Result<(), BuildError> {
        if let Some(&existing) = self.index.get(archive.name()) {
            return Err(BuildError::DuplicateArchive {
                name: archive.name().to_string(),
                first: self.archives[existing].source_path().display().to_string(),
                second: archive.source_path().display().to_string(),
            });
        }

        self.index.insert(archive.name().to_string(), self.archives.len());
        self.archives.push(archive);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Archive> {
        self.index.get(name).map(|&i| &self.archives[i])
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Archive> {
        self.index.get(name).map(|&i| &mut self.archives[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Iterates archives in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Archive> {
        self.archives.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.archives.iter().map(Archive::name)
    }

    /// Names of finished archives, in the order they finished
    pub fn finish_order(&self) -> &[String] {
        &self.finished
    }

    /// Builds every archive that has not been started yet
    ///
    /// Returns the names in the order they finished, dependencies first.
    pub fn build_all(&mut self, all_files: &[Arc<SourceFile>]) -> Result<Vec<String>, BuildError> {
        let start = self.finished.len();
        let names: Vec<String> = self.names().map(str::to_string).collect();

        for name in names {
            let unstarted = self
                .get(&name)
                .is_some_and(|a| a.state() == ArchiveState::Unstarted);
            if unstarted {
                self.build(&name, all_files)?;
            }
        }

        Ok(self.finished[start..].to_vec())
    }

    /// Builds one archive, building its unstarted dependencies first
    pub fn build(&mut self, name: &str, all_files: &[Arc<SourceFile>]) -> Result<(), BuildError> {
        let archive = self
            .get_mut(name)
            .ok_or_else(|| BuildError::ArchiveNotFound(name.to_string()))?;

        info!(archive = name, "building archive");
        archive.begin_build()?;
        let started = Instant::now();

        let parsed = tag::parse(archive.text());
        let mut description = parsed.body;

        let mut version = None;
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        let mut requires = Vec::new();
        let mut required_files = Vec::new();

        let arity = |source: ArityError| BuildError::ArgumentArity {
            archive: name.to_string(),
            source,
        };

        for directive in &parsed.directives {
            let kind = directive
                .kind()
                .map_err(|unknown| BuildError::UnknownDirective {
                    archive: name.to_string(),
                    directive: unknown.0,
                    line: directive.line(),
                })?;

            match kind {
                DirectiveKind::Version => {
                    version = Some(directive.text(0).map_err(arity)?.to_string());
                }
                DirectiveKind::Include => {
                    includes.push(directive.text(0).map_err(arity)?.to_string());
                }
                DirectiveKind::Exclude => {
                    excludes.push(directive.text(0).map_err(arity)?.to_string());
                }
                DirectiveKind::External => {
                    let library = name_argument(name, directive)?;
                    description.push_str(&external_note(library));
                }
                DirectiveKind::Requires => {
                    let required = name_argument(name, directive)?.to_string();
                    description.push_str(&requires_note(&required));

                    self.resolve(name, &required, all_files)?;
                    if let Some(dependency) = self.get(&required) {
                        required_files.extend(dependency.files().iter().cloned());
                    }
                    requires.push(required);
                }
            }
        }

        let version = version.ok_or_else(|| BuildError::MissingVersion {
            archive: name.to_string(),
        })?;

        let mut files = select(all_files, &includes, &excludes);
        debug!(
            archive = name,
            selected = files.len(),
            required = required_files.len(),
            "resolved files"
        );
        files.extend(required_files);

        let archive = self
            .get_mut(name)
            .ok_or_else(|| BuildError::ArchiveNotFound(name.to_string()))?;
        archive.set_rules(includes, excludes, requires);
        archive.finish(version, files, description)?;

        info!(
            archive = name,
            version = archive.version().unwrap_or_default(),
            files = archive.files().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished archive"
        );
        self.finished.push(name.to_string());
        Ok(())
    }

    /// Makes sure `required` is finished before `archive` uses it
    fn resolve(
        &mut self,
        archive: &str,
        required: &str,
        all_files: &[Arc<SourceFile>],
    ) -> Result<(), BuildError> {
        let state = self
            .get(required)
            .map(Archive::state)
            .ok_or_else(|| BuildError::DependencyNotFound {
                archive: archive.to_string(),
                required: required.to_string(),
            })?;

        match state {
            ArchiveState::BeingBuilt => Err(BuildError::CyclicDependency {
                archive: archive.to_string(),
                required: required.to_string(),
            }),
            ArchiveState::Unstarted => {
                debug!(archive, required, "building dependency first");
                self.build(required, all_files)
            }
            ArchiveState::Finished => {
                debug!(archive, required, "reusing finished dependency");
                Ok(())
            }
        }
    }
}

/// Reads the first argument of a directive that names a library or archive
///
/// Names must be text; `@requires 2024` is rejected rather than looked up.
fn name_argument<'d>(archive: &str, directive: &'d Directive) -> Result<&'d str, BuildError> {
    let argument = directive
        .arg(0)
        .map_err(|source| BuildError::ArgumentArity {
            archive: archive.to_string(),
            source,
        })?;

    argument.as_text().ok_or_else(|| BuildError::ArgumentType {
        archive: archive.to_string(),
        directive: directive.name().to_string(),
        line: directive.line(),
        found: argument.type_name(),
        token: directive.text(0).unwrap_or_default().to_string(),
    })
}

fn external_note(library: &str) -> String {
    format!(
        "\n**NOTE**: This archive needs the external library '{}' installed in order to work.\n",
        library
    )
}

fn requires_note(archive: &str) -> String {
    format!(
        "\n**NOTE**: This archive needs the archive '{0}' installed in order to work.\n\
         A copy of '{0}' is bundled in this package; skip it if '{0}' is already installed.\n",
        archive
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<Arc<SourceFile>> {
        paths
            .iter()
            .map(|p| Arc::new(SourceFile::new(format!("/project/src/{}", p), *p)))
            .collect()
    }

    fn registry(descriptors: &[(&str, &str)]) -> Registry {
        Registry::from_archives(
            descriptors
                .iter()
                .map(|(name, text)| Archive::new(format!("tools/{}.archive.md", name), *text)),
        )
        .unwrap()
    }

    fn rel(archive: &Archive) -> Vec<&str> {
        archive.files().iter().map(|f| f.relative_path()).collect()
    }

    #[test]
    fn end_to_end_scenario() {
        let all = files(&["core/A.java", "full/B.java"]);
        let mut reg = registry(&[
            ("core", "@ver 1.0\n@include core/\n"),
            ("full", "@ver 1.0\n@include full/\n@requires core\n"),
        ]);

        reg.build_all(&all).unwrap();

        assert_eq!(rel(reg.get("core").unwrap()), vec!["core/A.java"]);
        assert_eq!(
            rel(reg.get("full").unwrap()),
            vec!["full/B.java", "core/A.java"]
        );
    }

    #[test]
    fn dependencies_finish_first() {
        let all = files(&["core/A.java", "full/B.java"]);
        let mut reg = registry(&[
            ("full", "@ver 1.0\n@include full/\n@requires core\n"),
            ("core", "@ver 1.0\n@include core/\n"),
        ]);

        let order = reg.build_all(&all).unwrap();
        assert_eq!(order, vec!["core", "full"]);
        assert!(reg.iter().all(Archive::is_finished));
    }

    #[test]
    fn shared_dependency_is_built_once() {
        let all = files(&["a/1", "b/1", "c/1", "c/2"]);
        let mut reg = registry(&[
            ("a", "@ver 1\n@include a/\n@requires c\n"),
            ("b", "@ver 1\n@include b/\n@requires c\n"),
            ("c", "@ver 1\n@include c/\n"),
        ]);

        let order = reg.build_all(&all).unwrap();
        assert_eq!(order.iter().filter(|n| *n == "c").count(), 1);
        assert_eq!(order, vec!["c", "a", "b"]);

        assert_eq!(rel(reg.get("a").unwrap()), vec!["a/1", "c/1", "c/2"]);
        assert_eq!(rel(reg.get("b").unwrap()), vec!["b/1", "c/1", "c/2"]);

        let c_first = &reg.get("c").unwrap().files()[0];
        let a_copy = &reg.get("a").unwrap().files()[1];
        assert!(Arc::ptr_eq(c_first, a_copy));
    }

    #[test]
    fn two_archive_cycle_fails() {
        let mut reg = registry(&[
            ("a", "@ver 1\n@requires b\n"),
            ("b", "@ver 1\n@requires a\n"),
        ]);

        let err = reg.build_all(&[]).unwrap_err();
        assert_eq!(
            err,
            BuildError::CyclicDependency {
                archive: "b".to_string(),
                required: "a".to_string(),
            }
        );
        assert!(!reg.get("a").unwrap().is_finished());
        assert!(!reg.get("b").unwrap().is_finished());
    }

    #[test]
    fn self_reference_fails() {
        let mut reg = registry(&[("a", "@ver 1\n@requires a\n")]);

        let err = reg.build("a", &[]).unwrap_err();
        assert!(matches!(err, BuildError::CyclicDependency { .. }));
        assert!(!reg.get("a").unwrap().is_finished());
    }

    #[test]
    fn longer_cycle_fails() {
        let mut reg = registry(&[
            ("a", "@ver 1\n@requires b\n"),
            ("b", "@ver 1\n@requires c\n"),
            ("c", "@ver 1\n@requires a\n"),
        ]);

        let err = reg.build("a", &[]).unwrap_err();
        assert!(matches!(err, BuildError::CyclicDependency { ref archive, .. } if archive == "c"));
    }

    #[test]
    fn missing_dependency_fails() {
        let mut reg = registry(&[("a", "@ver 1\n@requires ghost\n")]);

        let err = reg.build("a", &[]).unwrap_err();
        assert_eq!(
            err,
            BuildError::DependencyNotFound {
                archive: "a".to_string(),
                required: "ghost".to_string(),
            }
        );
        assert!(err.to_string().contains("non-existent archive 'ghost'"));
    }

    #[test]
    fn missing_version_fails() {
        let all = files(&["a/x"]);
        let mut reg = registry(&[("a", "@include a/\n@exclude a/y\n")]);

        let err = reg.build("a", &all).unwrap_err();
        assert_eq!(
            err,
            BuildError::MissingVersion {
                archive: "a".to_string()
            }
        );
        assert!(err.is_descriptor_invalid());
    }

    #[test]
    fn unknown_directive_fails_after_valid_version() {
        let mut reg = registry(&[("a", "@ver 1.0\n@frobnicate now\n")]);

        let err = reg.build("a", &[]).unwrap_err();
        assert!(err.is_descriptor_invalid());
        assert!(matches!(
            err,
            BuildError::UnknownDirective { ref directive, line: 1, .. } if directive == "frobnicate"
        ));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn directive_without_argument_fails() {
        let mut reg = registry(&[("a", "@ver 1.0\n@include\n")]);

        let err = reg.build("a", &[]).unwrap_err();
        match err {
            BuildError::ArgumentArity { archive, source } => {
                assert_eq!(archive, "a");
                assert_eq!(source.directive, "include");
                assert_eq!(source.count, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn numeric_names_are_rejected() {
        let mut reg = registry(&[("2024", "@ver 1\n"), ("a", "@ver 1\n@requires 2024\n")]);

        let err = reg.build("a", &[]).unwrap_err();
        assert!(err.is_descriptor_invalid());
        assert_eq!(
            err,
            BuildError::ArgumentType {
                archive: "a".to_string(),
                directive: "requires".to_string(),
                line: 1,
                found: "integer",
                token: "2024".to_string(),
            }
        );
        assert!(err.to_string().contains("on line 2 expects a name, found integer '2024'"));

        let mut reg = registry(&[("b", "@ver 1\n@external 3.5\n")]);
        let err = reg.build("b", &[]).unwrap_err();
        assert!(matches!(err, BuildError::ArgumentType { found: "float", .. }));
    }

    #[test]
    fn versions_and_prefixes_keep_numeric_tokens() {
        let all = files(&["2024/x", "1999/y"]);
        let mut reg = registry(&[("a", "@ver 2\n@include 2024\n")]);

        reg.build("a", &all).unwrap();
        let archive = reg.get("a").unwrap();
        assert_eq!(archive.version(), Some("2"));
        assert_eq!(rel(archive), vec!["2024/x"]);
    }

    #[test]
    fn directive_names_are_case_insensitive() {
        let all = files(&["a/x"]);
        let mut reg = registry(&[("a", "@VER 3\n@Include a/\n")]);

        reg.build("a", &all).unwrap();
        let archive = reg.get("a").unwrap();
        assert_eq!(archive.version(), Some("3"));
        assert_eq!(rel(archive), vec!["a/x"]);
    }

    #[test]
    fn last_version_wins() {
        let mut reg = registry(&[("a", "@ver 1.0\n@ver 1.10\n")]);

        reg.build("a", &[]).unwrap();
        assert_eq!(reg.get("a").unwrap().version(), Some("1.10"));
    }

    #[test]
    fn description_gets_notes() {
        let mut reg = registry(&[
            ("core", "@ver 1\n"),
            (
                "leds",
                "# LEDs\n@: hidden\n@ver 1\n@external wpilib\n@requires core\n@@team owns this\nMail @@team\n",
            ),
        ]);

        reg.build("leds", &[]).unwrap();
        let description = reg.get("leds").unwrap().description();

        assert!(description.starts_with("# LEDs\n@team owns this\nMail @@team\n"));
        assert!(!description.contains("hidden"));
        assert!(description.contains("external library 'wpilib'"));
        assert!(description.contains("the archive 'core'"));
        assert!(
            description.find("wpilib").unwrap() < description.find("'core'").unwrap(),
            "notes follow directive order"
        );
    }

    #[test]
    fn build_records_rules() {
        let mut reg = registry(&[
            ("core", "@ver 1\n"),
            ("a", "@ver 1\n@include x/\n@include y/\n@exclude x/tmp\n@requires core\n"),
        ]);

        reg.build("a", &[]).unwrap();
        let archive = reg.get("a").unwrap();
        assert_eq!(archive.include_prefixes(), ["x/", "y/"]);
        assert_eq!(archive.exclude_prefixes(), ["x/tmp"]);
        assert_eq!(archive.required_archives(), ["core"]);
    }

    #[test]
    fn duplicate_requirements_keep_duplicate_files() {
        let all = files(&["core/A.java"]);
        let mut reg = registry(&[
            ("core", "@ver 1\n@include core/\n"),
            ("a", "@ver 1\n@include core/\n@requires core\n@requires core\n"),
        ]);

        reg.build_all(&all).unwrap();
        assert_eq!(
            rel(reg.get("a").unwrap()),
            vec!["core/A.java", "core/A.java", "core/A.java"]
        );
    }

    #[test]
    fn rebuilding_is_rejected() {
        let mut reg = registry(&[("a", "@ver 1\n")]);

        reg.build("a", &[]).unwrap();
        assert!(matches!(
            reg.build("a", &[]),
            Err(BuildError::AlreadyStarted { .. })
        ));
        assert_eq!(reg.finish_order(), ["a"]);
    }

    #[test]
    fn unknown_archive_is_rejected() {
        let mut reg = Registry::new();
        assert_eq!(
            reg.build("nope", &[]),
            Err(BuildError::ArchiveNotFound("nope".to_string()))
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Registry::from_archives([
            Archive::new("one/core.archive.md", "@ver 1\n"),
            Archive::new("two/core.archive.md", "@ver 2\n"),
        ]);

        assert!(matches!(result, Err(BuildError::DuplicateArchive { ref name, .. }) if name == "core"));
    }
}
