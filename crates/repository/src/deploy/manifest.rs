//! Compose manifest model, covering the keys the checks read.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Schema version; YAML may give it as a number or a string.
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,

    /// Project name
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

impl Manifest {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Declared version as text (`3.8` and `"3.8"` both give "3.8").
    pub fn version_str(&self) -> Option<String> {
        match self.version.as_ref()? {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub build: Option<Build>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub env_file: Option<OneOrMany>,

    #[serde(default)]
    pub environment: Option<Environment>,

    #[serde(default)]
    pub ports: Vec<String>,

    #[serde(default)]
    pub volumes: Vec<String>,
}

/// `build: .` or `build: {context: ., dockerfile: Dockerfile}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Build {
    Context(String),
    Detailed {
        context: String,
        #[serde(default)]
        dockerfile: Option<String>,
    },
}

impl Build {
    pub fn context(&self) -> &str {
        match self {
            Build::Context(context) => context,
            Build::Detailed { context, .. } => context,
        }
    }

    pub fn dockerfile(&self) -> &str {
        match self {
            Build::Detailed {
                dockerfile: Some(dockerfile),
                ..
            } => dockerfile,
            _ => "Dockerfile",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn items(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(item) => vec![item.as_str()],
            OneOrMany::Many(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// `environment` as a `KEY=value` list or a mapping.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    List(Vec<String>),
    Map(BTreeMap<String, Option<serde_yaml::Value>>),
}

impl Environment {
    /// Entries as `(key, value)` pairs; keys without a value give "".
    pub fn entries(&self) -> Vec<(String, String)> {
        match self {
            Environment::List(items) => items
                .iter()
                .map(|item| match item.split_once('=') {
                    Some((key, value)) => (key.to_string(), value.to_string()),
                    None => (item.clone(), String::new()),
                })
                .collect(),
            Environment::Map(map) => map
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        Some(serde_yaml::Value::String(s)) => s.clone(),
                        Some(serde_yaml::Value::Number(n)) => n.to_string(),
                        Some(serde_yaml::Value::Bool(b)) => b.to_string(),
                        _ => String::new(),
                    };
                    (key.clone(), value)
                })
                .collect(),
        }
    }
}
