//! Desktop entry (.desktop file) generation.
//!
//! Renders XDG desktop entries, `Actions=` launcher shortcut groups
//! included, for bundles whose archives ship no entry of their own.

use std::fs;
use std::path::Path;

use crate::error::{Result, StagehandError};
use crate::manifest::DesktopEntrySpec;
use tracing::debug;

/// One `[Desktop Action …]` group: a launcher context-menu shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopAction {
    /// Identifier listed in `Actions=` and repeated in the group header.
    pub id: String,
    /// Label the launcher shows for this shortcut.
    pub name: String,
    /// Command line the shortcut runs.
    pub exec: String,
}

/// An XDG desktop entry about to be rendered.
///
/// `Type=Application` is implied; the engine integrates application
/// bundles and nothing else.
#[derive(Debug, Clone, Default)]
pub struct DesktopEntry {
    /// Menu label.
    pub name: String,
    /// Generic label ("Web Browser").
    pub generic_name: Option<String>,
    /// Tooltip text.
    pub comment: Option<String>,
    /// Launch command, `%U`-style field codes included.
    pub exec: String,
    /// Icon name for theme lookup, or an absolute path.
    pub icon: String,
    /// True for terminal applications.
    pub terminal: bool,
    /// True when the application supports launch feedback.
    pub startup_notify: bool,
    /// `Categories=` values.
    pub categories: Vec<String>,
    /// `MimeType=` values.
    pub mime_types: Vec<String>,
    /// Launcher shortcuts rendered as trailing action groups.
    pub actions: Vec<DesktopAction>,
}

fn compose_exec(base: &str, args: Option<&str>) -> String {
    match args {
        Some(args) if !args.is_empty() => format!("{base} {args}"),
        _ => base.to_string(),
    }
}

impl DesktopEntry {
    pub fn builder() -> DesktopEntryBuilder {
        DesktopEntryBuilder::new()
    }

    /// Build an entry from manifest fields.
    ///
    /// `exec_base` is the installed binary path; the entry and each of
    /// its actions append their own arguments to it.
    pub fn from_spec(spec: &DesktopEntrySpec, exec_base: &str) -> Self {
        Self {
            name: spec.name.clone(),
            generic_name: spec.generic_name.clone(),
            comment: spec.comment.clone(),
            exec: compose_exec(exec_base, spec.exec_args.as_deref()),
            icon: spec.icon.clone(),
            terminal: spec.terminal.unwrap_or(false),
            startup_notify: spec.startup_notify.unwrap_or(false),
            categories: spec.categories.clone(),
            mime_types: spec.mime_types.clone(),
            actions: spec
                .actions
                .iter()
                .map(|action| DesktopAction {
                    id: action.id.clone(),
                    name: action.name.clone(),
                    exec: compose_exec(exec_base, action.exec_args.as_deref()),
                })
                .collect(),
        }
    }

    /// Render the full `.desktop` text.
    ///
    /// Key order follows the entries the supported vendors ship, so a
    /// generated file diffs cleanly against a packaged one.
    pub fn render(&self) -> String {
        let mut lines = vec![
            "[Desktop Entry]".to_string(),
            "Version=1.0".to_string(),
            format!("Name={}", self.name),
        ];
        if let Some(generic) = &self.generic_name {
            lines.push(format!("GenericName={generic}"));
        }
        if let Some(comment) = &self.comment {
            lines.push(format!("Comment={comment}"));
        }
        lines.push(format!("Exec={}", self.exec));
        lines.push(format!("StartupNotify={}", self.startup_notify));
        lines.push(format!("Terminal={}", self.terminal));
        lines.push(format!("Icon={}", self.icon));
        lines.push("Type=Application".to_string());
        if !self.categories.is_empty() {
            lines.push(format!("Categories={};", self.categories.join(";")));
        }
        if !self.mime_types.is_empty() {
            lines.push(format!("MimeType={};", self.mime_types.join(";")));
        }
        if !self.actions.is_empty() {
            let ids: Vec<&str> = self.actions.iter().map(|a| a.id.as_str()).collect();
            lines.push(format!("Actions={};", ids.join(";")));
        }

        let mut content = lines.join("\n");
        content.push('\n');
        for action in &self.actions {
            content.push('\n');
            content.push_str(&format!(
                "[Desktop Action {}]\nName={}\nExec={}\n",
                action.id, action.name, action.exec
            ));
        }
        content
    }

    /// Render and write, creating parent directories as needed.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StagehandError::io_with_path(e, parent))?;
        }
        fs::write(path, self.render()).map_err(|e| StagehandError::io_with_path(e, path))?;

        // Executable bit marks the entry as trusted in several desktops
        crate::platform::permissions::set_executable(path)?;

        debug!("Wrote desktop entry {}", path.display());
        Ok(())
    }
}

/// Chained construction for hand-assembled entries; manifest-driven
/// callers go through [`DesktopEntry::from_spec`] instead.
pub struct DesktopEntryBuilder {
    inner: DesktopEntry,
}

impl DesktopEntryBuilder {
    pub fn new() -> Self {
        Self {
            inner: DesktopEntry::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    pub fn generic_name(mut self, generic: impl Into<String>) -> Self {
        self.inner.generic_name = Some(generic.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.inner.comment = Some(comment.into());
        self
    }

    pub fn exec(mut self, exec: impl Into<String>) -> Self {
        self.inner.exec = exec.into();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.inner.icon = icon.into();
        self
    }

    pub fn terminal(mut self, terminal: bool) -> Self {
        self.inner.terminal = terminal;
        self
    }

    /// Launch feedback (busy cursor) support.
    pub fn startup_notify(mut self, startup_notify: bool) -> Self {
        self.inner.startup_notify = startup_notify;
        self
    }

    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.inner.categories = categories;
        self
    }

    pub fn add_category(mut self, category: impl Into<String>) -> Self {
        self.inner.categories.push(category.into());
        self
    }

    /// Append a `[Desktop Action …]` shortcut.
    pub fn action(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        exec: impl Into<String>,
    ) -> Self {
        self.inner.actions.push(DesktopAction {
            id: id.into(),
            name: name.into(),
            exec: exec.into(),
        });
        self
    }

    pub fn build(self) -> DesktopEntry {
        self.inner
    }
}

impl Default for DesktopEntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
