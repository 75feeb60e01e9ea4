//! Individual deployment checks.
//!
//! Each check returns [`Finding`]s instead of failing, so one run reports
//! every problem. Variable resolution is the exception: the caller stops on
//! missing variables because later checks would read unresolved values.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::manifest::Manifest;
use super::recipe::{self, Instruction};

/// Schema version the manifest must declare.
pub const MANIFEST_VERSION: &str = "3.8";

const CONNECTION_SCHEMES: &[&str] = &["postgres", "postgresql", "mongodb", "mysql", "redis"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub check: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl Finding {
    fn pass(check: &'static str, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(check: &'static str, detail: impl Into<String>) -> Self {
        Self {
            check,
            passed: false,
            detail: detail.into(),
        }
    }
}

pub fn check_version(manifest: &Manifest) -> Finding {
    match manifest.version_str() {
        Some(version) if version == MANIFEST_VERSION => {
            Finding::pass("version", format!("schema version {}", version))
        }
        Some(version) => Finding::fail(
            "version",
            format!("expected version {}, found {}", MANIFEST_VERSION, version),
        ),
        None => Finding::fail("version", "no schema version declared"),
    }
}

pub fn check_project_name(manifest: &Manifest) -> Finding {
    match manifest.name.as_deref().filter(|n| !n.is_empty()) {
        Some(name) => Finding::pass("project-name", format!("project '{}'", name)),
        None => Finding::fail("project-name", "no fixed project name"),
    }
}

/// Every service names an image or a build context holding its recipe.
pub fn check_build_sources(manifest: &Manifest, base_dir: &Path) -> Vec<Finding> {
    manifest
        .services
        .iter()
        .map(|(name, service)| match (&service.build, &service.image) {
            (Some(build), _) => {
                let context = base_dir.join(build.context());
                let recipe = context.join(build.dockerfile());
                if !context.is_dir() {
                    Finding::fail(
                        "build-source",
                        format!("{}: build context {} does not exist", name, context.display()),
                    )
                } else if !recipe.is_file() {
                    Finding::fail(
                        "build-source",
                        format!("{}: build recipe {} not found", name, recipe.display()),
                    )
                } else {
                    Finding::pass(
                        "build-source",
                        format!("{}: builds from {}", name, recipe.display()),
                    )
                }
            }
            (None, Some(image)) if !image.trim().is_empty() => {
                Finding::pass("build-source", format!("{}: image {}", name, image))
            }
            _ => Finding::fail("build-source", format!("{}: neither image nor build", name)),
        })
        .collect()
}

/// Every `depends_on` entry names a service of the same manifest.
pub fn check_dependencies(manifest: &Manifest) -> Vec<Finding> {
    manifest
        .services
        .iter()
        .flat_map(|(name, service)| {
            service.depends_on.iter().map(move |dependency| {
                if manifest.services.contains_key(dependency) {
                    Finding::pass("depends-on", format!("{} -> {}", name, dependency))
                } else {
                    Finding::fail(
                        "depends-on",
                        format!("{} depends on unknown service '{}'", name, dependency),
                    )
                }
            })
        })
        .collect()
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"\$(?:(?P<escape>\$)|\{(?P<braced>[A-Za-z_][A-Za-z0-9_]*)(?P<modifier>[^}]*)\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*))",
        )
        .expect("variable pattern is valid")
    })
}

/// Variables a manifest needs from its environment. `$$` escapes and
/// references with a `-` default are not required.
pub fn required_variables(text: &str) -> BTreeSet<String> {
    variable_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(braced) = caps.name("braced") {
                let modifier = caps.name("modifier").map_or("", |m| m.as_str());
                let has_default = modifier.starts_with(":-") || modifier.starts_with('-');
                (!has_default).then(|| braced.as_str().to_string())
            } else {
                caps.name("bare").map(|m| m.as_str().to_string())
            }
        })
        .collect()
}

/// Required variables that are unset or empty under `lookup`.
pub fn missing_variables(text: &str, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
    required_variables(text)
        .into_iter()
        .filter(|name| lookup(name).map_or(true, |value| value.is_empty()))
        .collect()
}

/// Substitute variable references with values from `lookup`. `$$` becomes `$`.
pub fn interpolate(text: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    variable_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            if caps.name("escape").is_some() {
                return "$".to_string();
            }
            let name = caps
                .name("braced")
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            match lookup(name).filter(|v| !v.is_empty()) {
                Some(value) => value,
                None => caps
                    .name("modifier")
                    .and_then(|m| m.as_str().strip_prefix(":-").or_else(|| m.as_str().strip_prefix('-')))
                    .unwrap_or("")
                    .to_string(),
            }
        })
        .into_owned()
}

/// Connection strings must point at a service the owner depends on.
pub fn check_connection_hosts(manifest: &Manifest) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (name, service) in &manifest.services {
        let Some(environment) = &service.environment else {
            continue;
        };
        for (key, value) in environment.entries() {
            let Ok(uri) = url::Url::parse(&value) else {
                continue;
            };
            if !CONNECTION_SCHEMES.contains(&uri.scheme()) {
                continue;
            }
            let host = uri.host_str().unwrap_or_default();
            let finding = if service.depends_on.iter().any(|d| d == host)
                && manifest.services.contains_key(host)
            {
                Finding::pass(
                    "connection-host",
                    format!("{}: {} points at service '{}'", name, key, host),
                )
            } else {
                Finding::fail(
                    "connection-host",
                    format!(
                        "{}: {} host '{}' is not a database service it depends on",
                        name, key, host
                    ),
                )
            };
            findings.push(finding);
        }
    }

    if findings.is_empty() {
        findings.push(Finding::fail(
            "connection-host",
            "no database connection string found",
        ));
    }
    findings
}

fn is_dependency_manifest(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    matches!(file.trim_end_matches('*'), "Cargo.toml" | "Cargo.lock")
}

fn is_wildcard(source: &str) -> bool {
    source.contains(['*', '?', '['])
}

/// `*` and `?` within one path segment, anything else literal.
fn wildcard_matches(pattern: &str, name: &str) -> bool {
    let mut regex = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    Regex::new(&regex).is_ok_and(|re| re.is_match(name))
}

/// Paths under `context` a `COPY` source names, with `*` and `?` expanded
/// in any segment.
fn resolve_copy_source(context: &Path, source: &str) -> Vec<PathBuf> {
    let mut candidates = vec![context.to_path_buf()];
    for segment in source.split('/').filter(|s| !s.is_empty() && *s != ".") {
        candidates = candidates
            .into_iter()
            .flat_map(|dir| -> Vec<PathBuf> {
                if !is_wildcard(segment) {
                    return vec![dir.join(segment)];
                }
                match std::fs::read_dir(&dir) {
                    Ok(entries) => entries
                        .filter_map(Result::ok)
                        .filter(|e| wildcard_matches(segment, &e.file_name().to_string_lossy()))
                        .map(|e| e.path())
                        .collect(),
                    Err(_) => Vec::new(),
                }
            })
            .filter(|path| path.exists())
            .collect();
    }
    candidates
}

fn escapes_context(source: &str) -> bool {
    Path::new(source.trim_start_matches('/'))
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Every local `COPY` source exists in the build context. A wildcard may
/// match nothing as long as another source of the same instruction exists.
pub fn check_copy_sources(instructions: &[Instruction], context: &Path) -> Vec<Finding> {
    let mut findings = Vec::new();

    for instruction in instructions
        .iter()
        .filter(|i| matches!(i.keyword.as_str(), "COPY" | "ADD") && !recipe::is_stage_copy(i))
    {
        let sources = recipe::copy_sources(instruction);
        let mut matched_any = false;
        let mut problems = Vec::new();

        for source in &sources {
            if source.contains("://") {
                matched_any = true;
                continue;
            }
            if escapes_context(source) {
                problems.push(format!("'{}' is outside the build context", source));
                continue;
            }
            let found = resolve_copy_source(context, source);
            matched_any |= !found.is_empty();
            if found.is_empty() && !is_wildcard(source) {
                problems.push(format!("'{}' not found in {}", source, context.display()));
            }
        }
        if problems.is_empty() && !matched_any {
            problems.push(format!("no file matches {}", sources.join(" ")));
        }

        findings.push(if problems.is_empty() {
            Finding::pass(
                "recipe-copy",
                format!("line {}: {} present", instruction.line, sources.join(" ")),
            )
        } else {
            Finding::fail(
                "recipe-copy",
                format!("line {}: {}", instruction.line, problems.join(", ")),
            )
        });
    }
    findings
}

/// The recipe installs dependencies from the manifest alone, with a locked
/// dependency set, before copying the source.
pub fn check_recipe(instructions: &[Instruction]) -> Vec<Finding> {
    let local_copies: Vec<&Instruction> = instructions
        .iter()
        .filter(|i| i.keyword == "COPY" && !recipe::is_stage_copy(i))
        .collect();

    let manifest_copy = local_copies.iter().find(|i| {
        let sources = recipe::copy_sources(i);
        !sources.is_empty() && sources.iter().all(|s| is_dependency_manifest(s))
    });
    let source_copy = local_copies
        .iter()
        .find(|i| recipe::copy_sources(i).iter().any(|s| !is_dependency_manifest(s)));

    let mut findings = vec![match (manifest_copy, source_copy) {
        (Some(manifest), Some(source)) if manifest.line < source.line => {
            let fetches_between = instructions.iter().any(|i| {
                i.keyword == "RUN" && i.line > manifest.line && i.line < source.line
            });
            if fetches_between {
                Finding::pass(
                    "recipe-order",
                    format!(
                        "dependency manifest copied at line {}, dependencies fetched before source at line {}",
                        manifest.line, source.line
                    ),
                )
            } else {
                Finding::fail(
                    "recipe-order",
                    "no dependency install between manifest copy and source copy",
                )
            }
        }
        (Some(_), Some(source)) => Finding::fail(
            "recipe-order",
            format!("source copied at line {} before the dependency manifest", source.line),
        ),
        (None, _) => Finding::fail("recipe-order", "dependency manifest is never copied alone"),
        (Some(_), None) => Finding::fail("recipe-order", "source is never copied"),
    }];

    let locked = instructions.iter().any(|i| {
        i.keyword == "RUN"
            && i.args.contains("cargo")
            && (i.args.contains("--locked") || i.args.contains("--frozen"))
    });
    findings.push(if locked {
        Finding::pass("recipe-locked", "build held to the resolved dependency set")
    } else {
        Finding::fail("recipe-locked", "no cargo step uses --locked or --frozen")
    });

    let workdir = instructions
        .iter()
        .any(|i| i.keyword == "WORKDIR" && i.args == "/app");
    findings.push(if workdir {
        Finding::pass("recipe-workdir", "working directory /app")
    } else {
        Finding::fail("recipe-workdir", "working directory is not /app")
    });

    let startup = instructions
        .iter()
        .any(|i| i.keyword == "CMD" || i.keyword == "ENTRYPOINT");
    findings.push(if startup {
        Finding::pass("recipe-startup", "fixed startup command")
    } else {
        Finding::fail("recipe-startup", "no CMD or ENTRYPOINT")
    });

    findings
}
