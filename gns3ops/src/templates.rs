//! Configuration templates: a few built-ins plus `.txt` files in a directory.

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::driver::CommandSequence;
use crate::error::{DriverError, Result, StoreError};
use crate::inventory::write_atomic;

const EXTENSION: &str = "txt";

const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "ospf",
        "Configure OSPF routing protocol",
        "router ospf 1\n\
         network 192.168.1.0 0.0.0.255 area 0\n\
         exit\n",
    ),
    (
        "dhcp",
        "Configure DHCP server settings",
        "ip dhcp pool LAN\n\
         network 192.168.1.0 255.255.255.0\n\
         default-router 192.168.1.1\n\
         dns-server 8.8.8.8\n\
         exit\n",
    ),
    (
        "security",
        "Apply basic security settings",
        "line vty 0 4\n\
         login local\n\
         transport input ssh\n\
         exec-timeout 5 0\n\
         exit\n\
         ip ssh time-out 60\n\
         ip ssh authentication-retries 3\n",
    ),
];

/// A named block of configuration lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub content: String,
    pub builtin: bool,
}

impl Template {
    /// The lines to send in configuration mode.
    pub fn sequence(&self) -> CommandSequence {
        CommandSequence::from_text(&self.content)
    }
}

/// Built-in templates.
pub fn builtins() -> Vec<Template> {
    BUILTIN
        .iter()
        .map(|(name, description, content)| Template {
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            builtin: true,
        })
        .collect()
}

fn validate_name(name: &str) -> std::result::Result<(), StoreError> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Custom templates directory, with the built-ins layered underneath.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", name, EXTENSION))
    }

    /// Save `lines` as custom template `name`, replacing any previous one.
    pub async fn create<I, S>(&self, name: &str, lines: I) -> Result<Template>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_name(name)?;

        let content = lines
            .into_iter()
            .map(|line| line.as_ref().trim_end().to_string())
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if content.is_empty() {
            return Err(DriverError::InvalidConfig {
                message: format!("template '{}' has no commands", name),
            }
            .into());
        }

        let path = self.path_for(name);
        write_atomic(&path, content.as_bytes()).await?;
        info!("Template saved: {}", path.display());

        Ok(Template {
            name: name.to_string(),
            description: "Custom template".to_string(),
            content,
            builtin: false,
        })
    }

    /// Custom templates, by name.
    pub async fn custom(&self) -> Result<Vec<Template>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.dir, e).into()),
        };

        let mut templates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            templates.push(Template {
                name: name.to_string(),
                description: "Custom template".to_string(),
                content,
                builtin: false,
            });
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("{} custom templates in {}", templates.len(), self.dir.display());
        Ok(templates)
    }

    /// Built-ins first, then custom templates.
    pub async fn list(&self) -> Result<Vec<Template>> {
        let mut templates = builtins();
        templates.extend(self.custom().await?);
        Ok(templates)
    }

    /// Look a template up by name. A custom template shadows a built-in.
    pub async fn load(&self, name: &str) -> Result<Template> {
        validate_name(name)?;

        let path = self.path_for(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                return Ok(Template {
                    name: name.to_string(),
                    description: "Custom template".to_string(),
                    content,
                    builtin: false,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&path, e).into()),
        }

        builtins()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| {
                StoreError::NotFound {
                    what: "template",
                    name: name.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sequences() {
        let ospf = builtins().into_iter().find(|t| t.name == "ospf").unwrap();
        let commands: Vec<_> = ospf.sequence().iter().map(|s| s.command.clone()).collect();
        assert_eq!(
            commands,
            ["router ospf 1", "network 192.168.1.0 0.0.0.255 area 0", "exit"]
        );
        assert_eq!(builtins().len(), 3);
    }

    #[tokio::test]
    async fn test_create_list_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path().join("templates"));

        assert_eq!(store.list().await.unwrap().len(), 3);

        store
            .create("loopback", ["interface Loopback0", " ip address 10.0.0.1 255.255.255.255", ""])
            .await
            .unwrap();

        let templates = store.list().await.unwrap();
        assert_eq!(templates.len(), 4);
        assert!(!templates[3].builtin);

        let loaded = store.load("loopback").await.unwrap();
        assert_eq!(
            loaded.content,
            "interface Loopback0\n ip address 10.0.0.1 255.255.255.255"
        );
        assert_eq!(loaded.sequence().len(), 2);

        assert!(store.load("dhcp").await.unwrap().builtin);
    }

    #[tokio::test]
    async fn test_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::new(dir.path());

        assert!(store.create("../evil", ["hostname X"]).await.is_err());
        assert!(store.create("empty", Vec::<String>::new()).await.is_err());
        assert!(store.load("missing").await.is_err());
    }
}
