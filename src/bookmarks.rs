/// Bookmark tree access and the folder listing used by the folder selector
use crate::errors::NovaTabError;
use serde::{Deserialize, Serialize};

/// Ids of the browser's built-in top-level folders
const ROOT_FOLDER_IDS: [&str; 3] = ["0", "1", "2"];

/// One node of the browser bookmark tree
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkNode {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    pub fn folder(id: &str, title: &str, children: Vec<BookmarkNode>) -> Self {
        BookmarkNode {
            id: id.to_string(),
            title: title.to_string(),
            url: None,
            children: Some(children),
        }
    }

    pub fn bookmark(id: &str, title: &str, url: &str) -> Self {
        BookmarkNode {
            id: id.to_string(),
            title: title.to_string(),
            url: Some(url.to_string()),
            children: None,
        }
    }

    /// A node without a url is a folder
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// Read access to the bookmark tree
#[allow(async_fn_in_trait)]
pub trait BookmarkProvider {
    /// Direct children of a folder
    async fn get_children(&self, id: &str) -> Result<Vec<BookmarkNode>, NovaTabError>;

    /// The whole tree; the first node is the invisible root
    async fn get_tree(&self) -> Result<Vec<BookmarkNode>, NovaTabError>;
}

/// An entry in the bookmark folder selector
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FolderOption {
    pub id: String,
    pub label: String,
    pub depth: usize,
}

/// Selectable folders in tree order, indented by depth
pub fn folder_options(root: &BookmarkNode) -> Vec<FolderOption> {
    let mut options = Vec::new();
    collect_folder_options(root, 0, &mut options);
    options
}

fn collect_folder_options(node: &BookmarkNode, depth: usize, options: &mut Vec<FolderOption>) {
    let Some(children) = &node.children else {
        return;
    };

    let listed = (!node.title.is_empty() || depth == 0)
        && (depth > 0 || ROOT_FOLDER_IDS.contains(&node.id.as_str()));
    if listed {
        let title = if !node.title.is_empty() {
            node.title.as_str()
        } else if node.id == "0" {
            "All Bookmarks (Root)"
        } else {
            "Unnamed Folder"
        };
        options.push(FolderOption {
            id: node.id.clone(),
            label: format!("{}{}", "— ".repeat(depth), title),
            depth,
        });
    }

    for child in children.iter().filter(|c| c.is_folder()) {
        collect_folder_options(child, depth + 1, options);
    }
}

/// Whether the bookmark tree can be read at all
pub async fn has_bookmark_access<B: BookmarkProvider>(provider: &B) -> bool {
    provider.get_tree().await.is_ok()
}
