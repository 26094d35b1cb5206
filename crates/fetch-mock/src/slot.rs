//! The fetch slot and the chain of installed mocks.
//!
//! A [`FetchSlot`] is the indirection cell every fetch call goes through. It
//! holds the real fetch and the head of a singly linked chain of mocks; each
//! installed mock records the entry it replaced as its predecessor. The links
//! live in a map keyed by [`MockId`], so finding a mock in the chain and
//! splicing it out are plain id comparisons.
//!
//! Install and destroy run under a `std::sync::Mutex` that is never held
//! across an `.await`: a fetch already in flight may observe the chain either
//! before or after a concurrent install/destroy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::error::{Error, Result};
use crate::fetch::{HttpFetch, RealFetch};
use crate::lock;
use crate::mock::MockCore;
use crate::request::{FetchTarget, RequestInit};
use crate::response::{self, Response};

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a mock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MockId(u64);

impl MockId {
    pub(crate) fn next() -> Self {
        MockId(NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for MockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mock-{}", self.0)
    }
}

/// One entry of the chain: the real fetch or an installed mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The real fetch at the root of the chain.
    Real,
    /// An installed mock.
    Mock(MockId),
}

struct ChainEntry {
    predecessor: Link,
    mock: Arc<MockCore>,
}

struct ChainState {
    head: Link,
    entries: HashMap<MockId, ChainEntry>,
}

impl ChainState {
    /// Mock ids from the head down to the real fetch.
    fn walk(&self) -> impl Iterator<Item = MockId> + '_ {
        let start = match self.head {
            Link::Mock(id) => Some(id),
            Link::Real => None,
        };
        std::iter::successors(start, |id| match self.entries.get(id)?.predecessor {
            Link::Mock(next) => Some(next),
            Link::Real => None,
        })
    }

    fn depth(&self) -> usize {
        self.walk().count()
    }
}

/// The indirection cell all fetch calls are dispatched through.
pub struct FetchSlot {
    real: Arc<dyn RealFetch>,
    state: Mutex<ChainState>,
}

impl FetchSlot {
    /// Create a slot whose chain is rooted at `real`.
    pub fn new(real: impl RealFetch + 'static) -> Arc<Self> {
        Self::with_real(Arc::new(real))
    }

    /// Create a slot from a shared real fetch.
    pub fn with_real(real: Arc<dyn RealFetch>) -> Arc<Self> {
        Arc::new(Self {
            real,
            state: Mutex::new(ChainState {
                head: Link::Real,
                entries: HashMap::new(),
            }),
        })
    }

    /// The process-wide slot, rooted at an HTTP fetch.
    pub fn global() -> &'static Arc<FetchSlot> {
        static GLOBAL: OnceLock<Arc<FetchSlot>> = OnceLock::new();
        GLOBAL.get_or_init(|| FetchSlot::new(HttpFetch::new()))
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        lock(&self.state)
    }

    /// The real fetch at the root of the chain.
    pub fn real(&self) -> &Arc<dyn RealFetch> {
        &self.real
    }

    /// The mock currently occupying the slot, `None` for the real fetch.
    pub fn head(&self) -> Option<MockId> {
        match self.state().head {
            Link::Mock(id) => Some(id),
            Link::Real => None,
        }
    }

    /// Whether any mock is installed.
    pub fn is_mocked(&self) -> bool {
        self.head().is_some()
    }

    /// Number of installed mocks.
    pub fn depth(&self) -> usize {
        self.state().depth()
    }

    /// Installed mock ids, head first.
    pub fn chain(&self) -> Vec<MockId> {
        self.state().walk().collect()
    }

    /// Whether `id` is anywhere in the chain.
    pub fn contains(&self, id: MockId) -> bool {
        self.state().walk().any(|current| current == id)
    }

    /// A forward handle that bypasses every mock.
    pub fn forward_to_real(self: &Arc<Self>) -> Forward {
        Forward {
            slot: Arc::clone(self),
            link: Link::Real,
        }
    }

    /// Fetch through the chain.
    pub async fn fetch(self: &Arc<Self>, target: impl Into<FetchTarget>) -> Result<Response> {
        self.fetch_with(target, RequestInit::default()).await
    }

    /// Fetch through the chain with request options.
    pub async fn fetch_with(
        self: &Arc<Self>,
        target: impl Into<FetchTarget>,
        init: RequestInit,
    ) -> Result<Response> {
        let head = self.state().head;
        self.dispatch_link(head, target.into(), init).await
    }

    /// Make `mock` the head, capturing the current head as its predecessor.
    pub(crate) fn install(&self, mock: &Arc<MockCore>) -> Result<()> {
        let id = mock.id();
        let mut state = self.state();

        if state.head == Link::Mock(id) {
            return Ok(());
        }
        if state.walk().any(|current| current == id) {
            return Err(Error::ChainConflict);
        }

        let predecessor = state.head;
        state.entries.insert(
            id,
            ChainEntry {
                predecessor,
                mock: Arc::clone(mock),
            },
        );
        state.head = Link::Mock(id);

        tracing::debug!(mock = %id, depth = state.depth(), "Installed fetch mock");
        Ok(())
    }

    /// Unlink `id` from the chain; a no-op when it is not installed.
    pub(crate) fn destroy(&self, id: MockId) {
        // Drop the removed entry after the lock is released.
        let _removed = {
            let mut state = self.state();
            let Some(predecessor) = state.entries.get(&id).map(|e| e.predecessor) else {
                return;
            };

            let mut successor = None;
            for current in state.walk() {
                if current == id {
                    break;
                }
                successor = Some(current);
            }

            match successor {
                None => state.head = predecessor,
                Some(successor) => {
                    if let Some(entry) = state.entries.get_mut(&successor) {
                        entry.predecessor = predecessor;
                    }
                }
            }

            let removed = state.entries.remove(&id);
            tracing::debug!(mock = %id, depth = state.depth(), "Destroyed fetch mock");
            removed
        };
    }

    fn entry(&self, id: MockId) -> Option<(Arc<MockCore>, Link)> {
        self.state()
            .entries
            .get(&id)
            .map(|entry| (Arc::clone(&entry.mock), entry.predecessor))
    }

    pub(crate) fn predecessor(&self, id: MockId) -> Option<Link> {
        self.state().entries.get(&id).map(|entry| entry.predecessor)
    }

    pub(crate) async fn dispatch_link(
        self: &Arc<Self>,
        link: Link,
        target: FetchTarget,
        init: RequestInit,
    ) -> Result<Response> {
        match link {
            Link::Real => {
                let request = target.resolve_absolute(&init)?;
                self.real.fetch(request).await
            }
            Link::Mock(id) => self.dispatch(id, target, init).await,
        }
    }

    /// Run the pipeline of `id`, falling through the chain until a mock
    /// answers. Falling off the last mock answers 404.
    pub(crate) async fn dispatch(
        self: &Arc<Self>,
        id: MockId,
        target: FetchTarget,
        init: RequestInit,
    ) -> Result<Response> {
        let mut current = id;
        loop {
            let (mock, predecessor) = self.entry(current).ok_or(Error::NotInstalled)?;
            let request = target.resolve(mock.base_url(), &init)?;
            tracing::trace!(
                mock = %current,
                method = %request.method(),
                url = %request.url(),
                "Dispatching request"
            );

            let forward = Forward {
                slot: Arc::clone(self),
                link: predecessor,
            };
            if let Some(response) = mock.pipeline().run(&request, &forward).await? {
                return Ok(response);
            }

            match self.predecessor(current) {
                Some(Link::Mock(next)) => current = next,
                Some(Link::Real) => {
                    tracing::trace!(url = %request.url(), "No mock answered, responding 404");
                    return response::status(404);
                }
                None => return Err(Error::NotInstalled),
            }
        }
    }
}

impl std::fmt::Debug for FetchSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSlot")
            .field("real", &self.real.name())
            .field("chain", &self.chain())
            .finish()
    }
}

/// Fetches through whatever a mock wrapped when it was installed.
///
/// Handed to every handler, and kept by every deferred request. When the
/// wrapped entry is the real fetch, requests go to the network.
#[derive(Clone)]
pub struct Forward {
    slot: Arc<FetchSlot>,
    link: Link,
}

impl Forward {
    /// The chain entry this forward reaches.
    pub fn link(&self) -> Link {
        self.link
    }

    /// Fetch through the wrapped entry.
    pub async fn fetch(&self, target: impl Into<FetchTarget>) -> Result<Response> {
        self.fetch_with(target, RequestInit::default()).await
    }

    /// Fetch through the wrapped entry with request options.
    pub async fn fetch_with(
        &self,
        target: impl Into<FetchTarget>,
        init: RequestInit,
    ) -> Result<Response> {
        self.slot
            .dispatch_link(self.link, target.into(), init)
            .await
    }
}

impl std::fmt::Debug for Forward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forward").field("link", &self.link).finish()
    }
}
