use serde::{Deserialize, Serialize};

/// Kind of file-store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFileRequest<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEntryRequest<'a> {
    pub path: &'a str,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteEntryRequest<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecuteStreamRequest<'a> {
    pub language: &'a str,
    pub stdin: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveRequest<'a> {
    pub language: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct ReadFileResponse {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct TreeResponse {
    #[serde(default)]
    pub tree: Vec<FileTreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct InteractiveResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
}

/// Handle for a freshly created interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveSession {
    pub session_id: String,
    /// Absolute `ws://` / `wss://` endpoint for the session channel.
    pub ws_url: String,
}

/// One node of the remote file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    /// Depth-first list of file paths below and including this node.
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_file_paths("", &mut out);
        out
    }

    fn collect_file_paths(&self, parent: &str, out: &mut Vec<String>) {
        let own = self.path.clone().unwrap_or_else(|| {
            if parent.is_empty() {
                self.name.clone()
            } else {
                format!("{parent}/{}", self.name)
            }
        });
        match self.kind {
            EntryKind::File => out.push(own),
            EntryKind::Directory => {
                for child in &self.children {
                    child.collect_file_paths(&own, out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionType {
    Compiled,
    Interpreted,
    Both,
}

/// A runnable language as advertised by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub id: u64,
    pub language_name: String,
    pub file_extension: String,
    /// Entry file for this language.
    pub file_name: String,
    pub execution_type: ExecutionType,
    /// Starter content for the entry file.
    #[serde(default)]
    pub code_preview: String,
}
