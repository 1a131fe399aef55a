/// In-memory fakes shared by the unit tests
use crate::bookmarks::{BookmarkNode, BookmarkProvider};
use crate::debounce::Timer;
use crate::errors::{ErrorReporter, NovaTabError};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Duration;

/// Collects reported errors instead of persisting them
#[derive(Default)]
pub struct RecordingReporter {
    reports: RefCell<Vec<(String, NovaTabError)>>,
}

impl RecordingReporter {
    pub fn contexts(&self) -> Vec<String> {
        self.reports.borrow().iter().map(|(context, _)| context.clone()).collect()
    }

    pub fn errors(&self) -> Vec<NovaTabError> {
        self.reports.borrow().iter().map(|(_, error)| error.clone()).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    async fn log_error(&self, error: &NovaTabError, context: &str, _details: Value) {
        self.reports.borrow_mut().push((context.to_string(), error.clone()));
    }
}

/// A mutable bookmark tree with per-folder failure injection
pub struct FakeBookmarks {
    root: RefCell<BookmarkNode>,
    failing: RefCell<HashSet<String>>,
    tree_failing: Cell<bool>,
    calls: Cell<usize>,
}

impl FakeBookmarks {
    pub fn new(root: BookmarkNode) -> Self {
        FakeBookmarks {
            root: RefCell::new(root),
            failing: RefCell::new(HashSet::new()),
            tree_failing: Cell::new(false),
            calls: Cell::new(0),
        }
    }

    /// Root "0" holding a bookmarks bar "1" with the given children
    pub fn with_bar(children: Vec<BookmarkNode>) -> Self {
        Self::new(BookmarkNode::folder(
            "0",
            "",
            vec![BookmarkNode::folder("1", "Bookmarks Bar", children)],
        ))
    }

    pub fn fail_folder(&self, id: &str) {
        self.failing.borrow_mut().insert(id.to_string());
    }

    pub fn fail_tree(&self, failing: bool) {
        self.tree_failing.set(failing);
    }

    /// Number of `get_children` calls so far
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn remove(&self, id: &str) {
        remove_node(&mut self.root.borrow_mut(), id);
    }

    pub fn insert(&self, parent_id: &str, node: BookmarkNode) {
        if let Some(parent) = find_node_mut(&mut self.root.borrow_mut(), parent_id) {
            parent.children.get_or_insert_with(Vec::new).push(node);
        }
    }

    pub fn rename(&self, id: &str, title: &str) {
        if let Some(node) = find_node_mut(&mut self.root.borrow_mut(), id) {
            node.title = title.to_string();
        }
    }
}

fn find_node<'a>(node: &'a BookmarkNode, id: &str) -> Option<&'a BookmarkNode> {
    if node.id == id {
        return Some(node);
    }
    node.children
        .iter()
        .flatten()
        .find_map(|child| find_node(child, id))
}

fn find_node_mut<'a>(node: &'a mut BookmarkNode, id: &str) -> Option<&'a mut BookmarkNode> {
    if node.id == id {
        return Some(node);
    }
    node.children
        .iter_mut()
        .flatten()
        .find_map(|child| find_node_mut(child, id))
}

fn remove_node(node: &mut BookmarkNode, id: &str) {
    if let Some(children) = node.children.as_mut() {
        children.retain(|child| child.id != id);
        for child in children.iter_mut() {
            remove_node(child, id);
        }
    }
}

impl BookmarkProvider for FakeBookmarks {
    async fn get_children(&self, id: &str) -> Result<Vec<BookmarkNode>, NovaTabError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.borrow().contains(id) {
            return Err(NovaTabError::Bookmarks(format!("failed to read folder {}", id)));
        }
        let root = self.root.borrow();
        find_node(&root, id)
            .map(|node| node.children.clone().unwrap_or_default())
            .ok_or_else(|| NovaTabError::Bookmarks("Can't find bookmark for id.".to_string()))
    }

    async fn get_tree(&self) -> Result<Vec<BookmarkNode>, NovaTabError> {
        if self.tree_failing.get() {
            return Err(NovaTabError::Bookmarks("bookmarks unavailable".to_string()));
        }
        Ok(vec![self.root.borrow().clone()])
    }
}

/// Tokio-driven timer, used with a paused clock
pub struct TokioTimer;

impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
