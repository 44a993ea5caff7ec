//! Document state management
//!
//! Every edit bumps the document's generation. A reconcile takes a snapshot
//! of the text together with its generation and may only install its result
//! if no edit arrived in the meantime.

/// Where a document is in its reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// Problems published for the current text
    Clean,
    /// Edited since the last published result
    Dirty,
    /// A reconcile of the current generation is running
    Reconciling,
}

/// Text taken for a reconcile run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub generation: u64,
    pub version: i32,
    pub text: String,
}

/// Represents the state of a text document
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    version: i32,
    generation: u64,
    state: ReconcileState,
}

impl Document {
    /// A freshly opened document, waiting for its first reconcile
    pub fn new(text: String, version: i32) -> Self {
        Self {
            text,
            version,
            generation: 1,
            state: ReconcileState::Dirty,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    /// Replaces the full text. A reconcile still running for the old text
    /// becomes stale.
    pub fn update(&mut self, text: String, version: i32) {
        self.text = text;
        self.version = version;
        self.generation += 1;
        self.state = ReconcileState::Dirty;
    }

    /// Marks the current text for another reconcile, e.g. after the schema
    /// data it was checked against changed.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.state = ReconcileState::Dirty;
    }

    /// Starts a reconcile of the current text. Returns `None` when the
    /// document is clean or already being reconciled at this generation.
    pub fn begin_reconcile(&mut self) -> Option<Snapshot> {
        if self.state != ReconcileState::Dirty {
            return None;
        }
        self.state = ReconcileState::Reconciling;
        Some(Snapshot {
            generation: self.generation,
            version: self.version,
            text: self.text.clone(),
        })
    }

    /// Completes the reconcile of `generation`. Returns whether its result
    /// is current and may be published; a stale result leaves the document
    /// dirty.
    pub fn finish_reconcile(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.state = ReconcileState::Clean;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_dirty() {
        let doc = Document::new("a: 1\n".to_string(), 1);
        assert_eq!(doc.state(), ReconcileState::Dirty);
        assert_eq!(doc.generation(), 1);
        assert_eq!(doc.text(), "a: 1\n");
    }

    #[test]
    fn test_reconcile_cycle() {
        let mut doc = Document::new("a: 1\n".to_string(), 1);
        let snapshot = doc.begin_reconcile().unwrap();
        assert_eq!(doc.state(), ReconcileState::Reconciling);
        assert!(doc.begin_reconcile().is_none());

        assert!(doc.finish_reconcile(snapshot.generation));
        assert_eq!(doc.state(), ReconcileState::Clean);
        assert!(doc.begin_reconcile().is_none());
    }

    #[test]
    fn test_edit_during_reconcile_discards_result() {
        let mut doc = Document::new("a: 1\n".to_string(), 1);
        let stale = doc.begin_reconcile().unwrap();
        doc.update("a: 2\n".to_string(), 2);
        assert_eq!(doc.state(), ReconcileState::Dirty);

        assert!(!doc.finish_reconcile(stale.generation));
        assert_eq!(doc.state(), ReconcileState::Dirty);

        let fresh = doc.begin_reconcile().unwrap();
        assert_eq!(fresh.text, "a: 2\n");
        assert_eq!(fresh.version, 2);
        assert!(doc.finish_reconcile(fresh.generation));
        assert_eq!(doc.state(), ReconcileState::Clean);
    }

    #[test]
    fn test_invalidate_requests_another_reconcile() {
        let mut doc = Document::new("a: 1\n".to_string(), 1);
        let first = doc.begin_reconcile().unwrap();
        doc.invalidate();
        assert!(!doc.finish_reconcile(first.generation));

        let second = doc.begin_reconcile().unwrap();
        assert_eq!(second.text, "a: 1\n");
        assert_eq!(second.version, 1);
        assert!(doc.finish_reconcile(second.generation));
        assert_eq!(doc.state(), ReconcileState::Clean);
    }
}
