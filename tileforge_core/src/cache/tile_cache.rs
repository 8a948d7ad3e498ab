//! Single-flight LRU cache for computed tiles.
//!
//! [`TileCache::get_or_compute`] guarantees that at most one computation per key runs at
//! any time. The first caller that misses registers an in-flight marker and computes
//! outside of any lock; later callers for the same key block on that marker and receive
//! the same outcome.
//!
//! ```text
//! caller A ─┐  miss, registers marker ──► compute ──► store ──► wake waiters
//! caller B ─┤  marker found ──► wait ─────────────────────────► same value
//! caller C ─┘  marker found ──► wait ─────────────────────────► same value
//! ```
//!
//! Values are retained in an LRU store. A cache built with
//! [`TileCache::single_flight_only`] keeps nothing once the computation has finished and
//! only coalesces concurrent requests.

use anyhow::{Result, anyhow};
use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use std::{
	collections::HashMap,
	error::Error,
	fmt::{self, Debug},
	hash::Hash,
	num::NonZeroUsize,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

/// Counters describing how requests were served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
	/// Requests answered from the LRU store.
	pub hits: u64,
	/// Requests that ran the computation.
	pub misses: u64,
	/// Requests that waited for a computation started by another caller.
	pub coalesced: u64,
}

/// Outcome published to waiters.
type Outcome<V> = Result<V, Arc<anyhow::Error>>;

/// Error returned to callers that waited for a failed computation of another caller.
///
/// Its source is the leader's error, so the original error chain, including typed
/// errors, stays reachable through [`anyhow::Error::chain`].
#[derive(Debug, Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
	/// The error the computation failed with.
	pub fn inner(&self) -> &anyhow::Error {
		&self.0
	}
}

impl fmt::Display for SharedError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("shared computation failed")
	}
}

impl Error for SharedError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		let source: &(dyn Error + Send + Sync + 'static) = &**self.0;
		Some(source)
	}
}

/// A marker for a running computation that waiters block on.
struct InFlight<V> {
	outcome: Mutex<Option<Outcome<V>>>,
	done: Condvar,
}

impl<V: Clone> InFlight<V> {
	fn new() -> Self {
		Self {
			outcome: Mutex::new(None),
			done: Condvar::new(),
		}
	}

	fn publish(&self, outcome: Outcome<V>) {
		*self.outcome.lock() = Some(outcome);
		self.done.notify_all();
	}

	fn wait(&self) -> Result<V> {
		let mut outcome = self.outcome.lock();
		loop {
			if let Some(outcome) = outcome.as_ref() {
				return match outcome {
					Ok(value) => Ok(value.clone()),
					Err(err) => Err(SharedError(Arc::clone(err)).into()),
				};
			}
			self.done.wait(&mut outcome);
		}
	}
}

struct CacheState<K: Hash + Eq, V> {
	store: Option<LruCache<K, V>>,
	in_flight: HashMap<K, Arc<InFlight<V>>>,
}

enum Role<V> {
	Leader(Arc<InFlight<V>>),
	Waiter(Arc<InFlight<V>>),
}

/// A thread-safe cache from tile keys to computed values with single-flight computation.
///
/// The LRU store and the in-flight markers share one lock, which is only held for
/// registration and lookup. Evicting an entry never affects a computation in flight
/// for the same key, since the marker and not the store is authoritative while
/// computing.
pub struct TileCache<K: Hash + Eq, V> {
	state: Mutex<CacheState<K, V>>,
	hits: AtomicU64,
	misses: AtomicU64,
	coalesced: AtomicU64,
}

impl<K, V> TileCache<K, V>
where
	K: Hash + Eq + Clone + Debug,
	V: Clone,
{
	/// Creates a cache retaining up to `capacity` values.
	///
	/// A capacity of zero retains nothing, see [`TileCache::single_flight_only`].
	pub fn new(capacity: usize) -> Self {
		Self {
			state: Mutex::new(CacheState {
				store: NonZeroUsize::new(capacity).map(LruCache::new),
				in_flight: HashMap::new(),
			}),
			hits: AtomicU64::new(0),
			misses: AtomicU64::new(0),
			coalesced: AtomicU64::new(0),
		}
	}

	/// Creates a cache that only coalesces concurrent computations of the same key.
	pub fn single_flight_only() -> Self {
		Self::new(0)
	}

	/// Returns the cached value for `key`, or computes it with `compute`.
	///
	/// Concurrent calls for the same key run `compute` once. Every caller receives the
	/// value or the error of that computation. If callers waited for a failed computation,
	/// all of them get the error wrapped in a [`SharedError`].
	/// A failed or panicking computation always releases its waiters and leaves nothing
	/// cached.
	pub fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V>
	where
		F: FnOnce() -> Result<V>,
	{
		let role = {
			let mut state = self.state.lock();
			if let Some(value) = state.store.as_mut().and_then(|store| store.get(&key)) {
				self.hits.fetch_add(1, Ordering::Relaxed);
				log::trace!("cache hit for {key:?}");
				return Ok(value.clone());
			}
			match state.in_flight.get(&key) {
				Some(marker) => Role::Waiter(Arc::clone(marker)),
				None => {
					let marker = Arc::new(InFlight::new());
					state.in_flight.insert(key.clone(), Arc::clone(&marker));
					Role::Leader(marker)
				}
			}
		};

		match role {
			Role::Waiter(marker) => {
				self.coalesced.fetch_add(1, Ordering::Relaxed);
				log::debug!("waiting for in-flight computation of {key:?}");
				marker.wait()
			}
			Role::Leader(marker) => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				log::trace!("cache miss for {key:?}, computing");
				let mut guard = LeaderGuard {
					cache: self,
					key,
					marker,
					finished: false,
				};
				guard.finish(compute())
			}
		}
	}

	/// Returns `true` if a value for `key` is retained, without touching its recency.
	pub fn contains(&self, key: &K) -> bool {
		self.state.lock().store.as_ref().is_some_and(|store| store.contains(key))
	}

	/// Returns `true` if a computation for `key` is currently running.
	pub fn is_in_flight(&self, key: &K) -> bool {
		self.state.lock().in_flight.contains_key(key)
	}

	/// Number of retained values.
	pub fn len(&self) -> usize {
		self.state.lock().store.as_ref().map_or(0, LruCache::len)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Maximum number of retained values.
	pub fn capacity(&self) -> usize {
		self.state.lock().store.as_ref().map_or(0, |store| store.cap().get())
	}

	pub fn stats(&self) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			coalesced: self.coalesced.load(Ordering::Relaxed),
		}
	}

	/// Drops all retained values and forgets in-flight markers.
	///
	/// Callers already waiting on a marker are still released when its computation ends.
	pub fn clear(&self) {
		let mut state = self.state.lock();
		if let Some(store) = state.store.as_mut() {
			store.clear();
		}
		state.in_flight.clear();
	}

	/// Stores and publishes the outcome of a computation and releases its marker.
	///
	/// If other callers wait on the marker, an error is shared with them and every caller,
	/// including the leader, receives it as a [`SharedError`].
	fn complete(&self, key: &K, marker: &Arc<InFlight<V>>, result: Result<V>) -> Result<V> {
		let has_waiters = {
			let mut state = self.state.lock();
			if let (Ok(value), Some(store)) = (&result, state.store.as_mut()) {
				store.put(key.clone(), value.clone());
			}
			// after clear() the key may belong to a newer computation
			if state.in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, marker)) {
				state.in_flight.remove(key);
			}
			// waiters clone the marker under this lock, so the count cannot grow anymore
			Arc::strong_count(marker) > 1
		};
		match result {
			Ok(value) => {
				marker.publish(Ok(value.clone()));
				Ok(value)
			}
			Err(err) if !has_waiters => Err(err),
			Err(err) => {
				let shared = Arc::new(err);
				marker.publish(Err(Arc::clone(&shared)));
				Err(SharedError(shared).into())
			}
		}
	}
}

impl<K: Hash + Eq, V> Debug for TileCache<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("TileCache")
			.field("len", &state.store.as_ref().map_or(0, LruCache::len))
			.field("in_flight", &state.in_flight.len())
			.finish()
	}
}

/// Clears the in-flight marker when the leader's computation ends, including by panic.
struct LeaderGuard<'a, K, V>
where
	K: Hash + Eq + Clone + Debug,
	V: Clone,
{
	cache: &'a TileCache<K, V>,
	key: K,
	marker: Arc<InFlight<V>>,
	finished: bool,
}

impl<K, V> LeaderGuard<'_, K, V>
where
	K: Hash + Eq + Clone + Debug,
	V: Clone,
{
	fn finish(&mut self, result: Result<V>) -> Result<V> {
		self.finished = true;
		self.cache.complete(&self.key, &self.marker, result)
	}
}

impl<K, V> Drop for LeaderGuard<'_, K, V>
where
	K: Hash + Eq + Clone + Debug,
	V: Clone,
{
	fn drop(&mut self) {
		if !self.finished {
			log::warn!("computation of {:?} aborted", self.key);
			let aborted = anyhow!("computation of {:?} aborted", self.key);
			let _ = self.cache.complete(&self.key, &self.marker, Err(aborted));
		}
	}
}
