//! The in-memory catalog index.
//!
//! A [`StepCatalog`] always serves one immutable [`CatalogSnapshot`]. A build
//! collects steps into a private staging map through a [`CatalogBuild`] session
//! and publishes them as a new snapshot in a single swap, so readers see either
//! the previous snapshot or the complete new one. Readiness is signalled over a
//! `watch` channel that releases every waiter at once.

use conduit_model::{kinds, Step};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::{CatalogError, CatalogResult};

/// Lifecycle of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogState {
    /// No build has started yet
    Empty,
    /// A build is running; reads see the previous snapshot
    Building,
    /// The latest build has been published
    Ready,
    /// The latest build failed; reads see the previous snapshot
    Failed,
}

impl fmt::Display for CatalogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CatalogState::Empty => "empty",
            CatalogState::Building => "building",
            CatalogState::Ready => "ready",
            CatalogState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An immutable, fully built catalog
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    by_id: BTreeMap<String, Step>,
    by_name: HashMap<String, Vec<String>>,
    by_kind: HashMap<String, Vec<String>>,
    generation: u64,
}

impl CatalogSnapshot {
    fn build(by_id: BTreeMap<String, Step>, generation: u64) -> Self {
        let mut by_name: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_kind: HashMap<String, Vec<String>> = HashMap::new();
        for (id, step) in &by_id {
            by_name.entry(step.name.clone()).or_default().push(id.clone());
            by_kind
                .entry(kinds::normalize(&step.kind))
                .or_default()
                .push(id.clone());
        }
        Self {
            by_id,
            by_name,
            by_kind,
            generation,
        }
    }

    /// Exact, case-sensitive id lookup
    pub fn search_by_id(&self, id: &str) -> Option<&Step> {
        self.by_id.get(id)
    }

    /// Every variant sharing `name` (case-sensitive), in id order
    pub fn search_by_name(&self, name: &str) -> Vec<&Step> {
        self.lookup(self.by_name.get(name))
    }

    /// Every step of `kind`, compared case-insensitively, in id order
    pub fn search_by_kind(&self, kind: &str) -> Vec<&Step> {
        self.lookup(self.by_kind.get(&kinds::normalize(kind)))
    }

    fn lookup(&self, ids: Option<&Vec<String>>) -> Vec<&Step> {
        ids.map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default()
    }

    /// All steps in id order
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of the build that produced this snapshot; 0 for the initial empty one
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct CatalogInner {
    current: RwLock<Arc<CatalogSnapshot>>,
    state: watch::Sender<CatalogState>,
    generation: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Shared handle to the live catalog. Cloning is cheap; all clones see the
/// same snapshots.
#[derive(Clone)]
pub struct StepCatalog {
    inner: Arc<CatalogInner>,
}

impl StepCatalog {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CatalogState::Empty);
        Self {
            inner: Arc::new(CatalogInner {
                current: RwLock::new(Arc::new(CatalogSnapshot::default())),
                state,
                generation: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Build a ready catalog directly from a set of steps
    pub fn from_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let catalog = Self::new();
        let build = catalog.begin_build();
        build.store(steps);
        build.finish();
        catalog
    }

    /// Start a build. Reads keep returning the current snapshot until the
    /// session is finished.
    pub fn begin_build(&self) -> CatalogBuild {
        self.inner.state.send_replace(CatalogState::Building);
        debug!("Catalog build started");
        CatalogBuild {
            catalog: self.clone(),
            staged: Mutex::new(BTreeMap::new()),
            completed: false,
        }
    }

    pub fn state(&self) -> CatalogState {
        *self.inner.state.borrow()
    }

    /// The snapshot currently being served
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.inner.current.read().clone()
    }

    /// Reason of the last failed build, if the latest build failed
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().clone()
    }

    /// Wait until the running build completes.
    ///
    /// Resolves with the published snapshot. When the build fails the previous
    /// snapshot is returned if there is one; a failure before any successful
    /// build is an error.
    pub async fn await_ready(&self) -> CatalogResult<Arc<CatalogSnapshot>> {
        let mut state = self.inner.state.subscribe();
        loop {
            let current = *state.borrow_and_update();
            match current {
                CatalogState::Ready => return Ok(self.snapshot()),
                CatalogState::Failed => {
                    let snapshot = self.snapshot();
                    if snapshot.generation() > 0 {
                        return Ok(snapshot);
                    }
                    let reason = self
                        .last_error()
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(CatalogError::BuildFailed(reason));
                }
                CatalogState::Empty | CatalogState::Building => {}
            }

            // The sender lives as long as `self`, so this only fails on teardown
            if state.changed().await.is_err() {
                return Err(CatalogError::NotReady("catalog was dropped".to_string()));
            }
        }
    }

    /// [`Self::await_ready`] bounded by `timeout`. Giving up does not affect
    /// the build itself.
    pub async fn await_ready_timeout(&self, timeout: Duration) -> CatalogResult<Arc<CatalogSnapshot>> {
        match tokio::time::timeout(timeout, self.await_ready()).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::NotReady(format!(
                "no build completed within {:?} (state: {})",
                timeout,
                self.state()
            ))),
        }
    }

    pub fn search_by_id(&self, id: &str) -> Option<Step> {
        self.snapshot().search_by_id(id).cloned()
    }

    pub fn search_by_name(&self, name: &str) -> Vec<Step> {
        self.snapshot()
            .search_by_name(name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn search_by_kind(&self, kind: &str) -> Vec<Step> {
        self.snapshot()
            .search_by_kind(kind)
            .into_iter()
            .cloned()
            .collect()
    }

    fn publish(&self, staged: BTreeMap<String, Step>) -> Arc<CatalogSnapshot> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(CatalogSnapshot::build(staged, generation));
        *self.inner.current.write() = snapshot.clone();
        *self.inner.last_error.lock() = None;
        self.inner.state.send_replace(CatalogState::Ready);
        info!(
            steps = snapshot.len(),
            generation, "Catalog snapshot published"
        );
        snapshot
    }

    fn fail(&self, reason: String) {
        error!(error = %reason, "Catalog build failed, keeping previous snapshot");
        *self.inner.last_error.lock() = Some(reason);
        self.inner.state.send_replace(CatalogState::Failed);
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StepCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("StepCatalog")
            .field("state", &self.state())
            .field("generation", &snapshot.generation())
            .field("steps", &snapshot.len())
            .finish()
    }
}

/// One running build. Dropping a session without finishing it counts as a
/// failed build.
pub struct CatalogBuild {
    catalog: StepCatalog,
    staged: Mutex<BTreeMap<String, Step>>,
    completed: bool,
}

impl CatalogBuild {
    /// Merge a batch of steps. A duplicate id replaces the earlier step.
    pub fn store(&self, steps: impl IntoIterator<Item = Step>) {
        let mut staged = self.staged.lock();
        for step in steps {
            if let Some(previous) = staged.insert(step.id.clone(), step) {
                warn!(id = %previous.id, "Duplicate step id, keeping the later definition");
            }
        }
    }

    /// Number of distinct step ids staged so far
    pub fn staged(&self) -> usize {
        self.staged.lock().len()
    }

    /// Publish the staged steps as the new snapshot
    pub fn finish(mut self) -> Arc<CatalogSnapshot> {
        self.completed = true;
        let staged = std::mem::take(&mut *self.staged.lock());
        self.catalog.publish(staged)
    }

    /// Discard the staged steps; the previous snapshot keeps serving
    pub fn abort(mut self, err: &CatalogError) {
        self.completed = true;
        self.catalog.fail(err.to_string());
    }
}

impl Drop for CatalogBuild {
    fn drop(&mut self) {
        if !self.completed {
            self.catalog.fail("build abandoned before completion".to_string());
        }
    }
}
