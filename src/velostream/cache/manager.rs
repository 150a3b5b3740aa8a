//! Serializer Cache Manager
//!
//! Top-level facade: one [`SerializerPair`] per entity type, built on first
//! use and shared by every caller afterwards.
//!
//! ## Concurrency
//!
//! - **Hit path**: a read lock on the type map, a read lock on the entry's
//!   pair cell and two atomic increments. It never touches a lock the miss
//!   path holds across I/O.
//! - **Miss path**: the first caller spawns the pipeline and installs a
//!   shared handle to it in the entry's in-flight slot; later callers clone
//!   and await the same handle. The pipeline runs under the resolution
//!   timeout, measured from the spawn, and every waiter receives the same
//!   pair or a clone of the same error. Waiters that give up do not affect
//!   the task.
//! - **Upgrade**: serialized per type by an async mutex; the new pair is
//!   swapped in whole, so readers see either the old pair or the new one.
//! - Failures never leave a pair behind; the next call starts over.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use super::pair::SerializerPair;
use super::statistics::{CacheStatistics, Statistics};
use crate::velostream::observability::{LogSink, TelemetrySink};
use crate::velostream::schema::client::RegistryClient;
use crate::velostream::schema::metadata::Entity;
use crate::velostream::schema::model_resolver::EntityModelResolver;
use crate::velostream::schema::types::{
    Projection, SubjectNameStrategy, TypeIdentity, UpgradeResult, ValidationMode,
};
use crate::velostream::schema::version_resolver::SchemaVersionResolver;
use crate::velostream::schema::{SchemaError, SchemaResult};

/// Default bound on one single-flight resolution
pub const DEFAULT_RESOLUTION_TIMEOUT: Duration = Duration::from_secs(30);

type PairFuture = Shared<BoxFuture<'static, SchemaResult<Arc<SerializerPair>>>>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-type cache entry
struct TypeSlot {
    type_identity: TypeIdentity,
    stats: Arc<CacheStatistics>,
    pair: RwLock<Option<Arc<SerializerPair>>>,
    /// Never held across an await
    in_flight: Mutex<Option<PairFuture>>,
    /// Bumped by invalidation and upgrade so stale resolutions do not install
    generation: AtomicU64,
    upgrade_lock: tokio::sync::Mutex<()>,
}

impl TypeSlot {
    fn new(type_identity: TypeIdentity) -> Self {
        Self {
            type_identity,
            stats: Arc::new(CacheStatistics::new()),
            pair: RwLock::new(None),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            upgrade_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn current(&self) -> Option<Arc<SerializerPair>> {
        read(&self.pair).clone()
    }

    /// Swap in a new pair, superseding any resolution still in flight
    fn replace(&self, pair: Arc<SerializerPair>) {
        // Held across bump and write so `complete` cannot interleave
        let mut in_flight = lock(&self.in_flight);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *write(&self.pair) = Some(pair);
        *in_flight = None;
    }

    /// Finish a resolution started at `generation`. A superseded resolution
    /// neither installs its pair nor touches the in-flight slot.
    fn complete(&self, generation: u64, result: &SchemaResult<Arc<SerializerPair>>) -> bool {
        let mut in_flight = lock(&self.in_flight);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        if let Ok(pair) = result {
            *write(&self.pair) = Some(pair.clone());
        }
        *in_flight = None;
        true
    }

    fn evict(&self) {
        let mut in_flight = lock(&self.in_flight);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *write(&self.pair) = None;
        *in_flight = None;
    }
}

/// Outcome of upgrading both projections of an entity type
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaUpgrade {
    /// `None` for keyless entities
    pub key: Option<UpgradeResult>,
    pub value: UpgradeResult,
}

impl SchemaUpgrade {
    pub fn changed(&self) -> bool {
        self.value.changed() || self.key.as_ref().is_some_and(UpgradeResult::changed)
    }
}

struct Inner {
    model_resolver: EntityModelResolver,
    version_resolver: SchemaVersionResolver,
    sink: Arc<dyn TelemetrySink>,
    resolution_timeout: Duration,
    slots: RwLock<HashMap<TypeId, Arc<TypeSlot>>>,
}

/// Builder for [`SerializerCacheManager`]
pub struct CacheManagerBuilder {
    client: Arc<dyn RegistryClient>,
    validation_mode: ValidationMode,
    subject_strategy: SubjectNameStrategy,
    resolution_timeout: Duration,
    sink: Arc<dyn TelemetrySink>,
}

impl CacheManagerBuilder {
    pub fn validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn subject_strategy(mut self, strategy: SubjectNameStrategy) -> Self {
        self.subject_strategy = strategy;
        self
    }

    pub fn resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> SerializerCacheManager {
        SerializerCacheManager {
            inner: Arc::new(Inner {
                model_resolver: EntityModelResolver::new(self.validation_mode, self.sink.clone()),
                version_resolver: SchemaVersionResolver::new(self.client, self.subject_strategy),
                sink: self.sink,
                resolution_timeout: self.resolution_timeout,
                slots: RwLock::new(HashMap::new()),
            }),
        }
    }
}

/// Per-type serializer cache with single-flight resolution
#[derive(Clone)]
pub struct SerializerCacheManager {
    inner: Arc<Inner>,
}

impl SerializerCacheManager {
    /// Strict validation, topic-name subjects, warnings to the `log` facade
    pub fn new(client: Arc<dyn RegistryClient>) -> Self {
        Self::builder(client).build()
    }

    pub fn builder(client: Arc<dyn RegistryClient>) -> CacheManagerBuilder {
        CacheManagerBuilder {
            client,
            validation_mode: ValidationMode::Strict,
            subject_strategy: SubjectNameStrategy::TopicName,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT,
            sink: Arc::new(LogSink),
        }
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.inner.model_resolver.mode()
    }

    pub fn model_resolver(&self) -> &EntityModelResolver {
        &self.inner.model_resolver
    }

    pub fn version_resolver(&self) -> &SchemaVersionResolver {
        &self.inner.version_resolver
    }

    /// Serializer pair for `T`, resolving it on first use
    pub async fn get_serializers<T: Entity>(&self) -> SchemaResult<Arc<SerializerPair>> {
        let slot = self.slot::<T>();

        if let Some(pair) = slot.current() {
            slot.stats.record_hit();
            return Ok(pair);
        }

        let flight = {
            let mut in_flight = lock(&slot.in_flight);
            // A resolution may have finished between the fast path and here
            if let Some(pair) = slot.current() {
                slot.stats.record_hit();
                return Ok(pair);
            }
            slot.stats.record_miss();
            in_flight
                .get_or_insert_with(|| self.start_resolution::<T>(slot.clone()))
                .clone()
        };

        flight.await
    }

    /// Same pair as [`get_serializers`](Self::get_serializers); encoder and
    /// decoder are always bound to the same schema identities
    pub async fn get_deserializers<T: Entity>(&self) -> SchemaResult<Arc<SerializerPair>> {
        self.get_serializers::<T>().await
    }

    /// Encode then decode `entity` with the current pair and compare.
    ///
    /// Resolution failures are errors; codec failures mean the entity does
    /// not survive the trip and yield `Ok(false)`.
    pub async fn validate_round_trip<T>(&self, entity: &T) -> SchemaResult<bool>
    where
        T: Entity + PartialEq,
    {
        let pair = self.get_serializers::<T>().await?;
        let type_name = std::any::type_name::<T>();

        let encoded = match pair.encoder.encode(entity) {
            Ok(encoded) => encoded,
            Err(e) => {
                log::warn!("Round trip of {} failed to encode: {}", type_name, e);
                return Ok(false);
            }
        };

        if let Some(key) = &encoded.key {
            if let Err(e) = pair.decoder.decode_key(key) {
                log::warn!("Round trip of {} failed to decode key: {}", type_name, e);
                return Ok(false);
            }
        }

        match pair.decoder.decode::<T>(&encoded.value) {
            Ok(decoded) => Ok(decoded == *entity),
            Err(e) => {
                log::warn!("Round trip of {} failed to decode value: {}", type_name, e);
                Ok(false)
            }
        }
    }

    /// Move `T`'s subjects forward to its current model and swap in a pair
    /// bound to the new identities.
    ///
    /// The key subject is upgraded before the value subject. If the value
    /// upgrade fails the cached pair is left untouched, even though the key
    /// subject may already have moved.
    pub async fn upgrade_schema<T: Entity>(&self) -> SchemaResult<SchemaUpgrade> {
        let slot = self.slot::<T>();
        let _guard = slot.upgrade_lock.lock().await;

        let model = self.inner.model_resolver.resolve::<T>()?;
        let resolver = &self.inner.version_resolver;

        let key = if model.is_keyless() {
            None
        } else {
            Some(resolver.upgrade_bound(&model, Projection::Key).await?)
        };
        let (value_result, value_bound) = resolver.upgrade_bound(&model, Projection::Value).await?;

        let pair = SerializerPair::build(
            &model,
            key.as_ref().map(|(_, bound)| bound),
            &value_bound,
            slot.stats.clone(),
        )?;
        slot.replace(Arc::new(pair));

        let upgrade = SchemaUpgrade {
            key: key.map(|(result, _)| result),
            value: value_result,
        };
        log::info!(
            "Upgraded serializers for {} (value subject now {})",
            slot.type_identity,
            upgrade.value.new_identity
        );
        Ok(upgrade)
    }

    /// Snapshot of `T`'s counters; zeroed if `T` was never requested
    pub fn get_statistics<T: Entity>(&self) -> Statistics {
        read(&self.inner.slots)
            .get(&TypeId::of::<T>())
            .map(|slot| slot.stats.snapshot())
            .unwrap_or_default()
    }

    /// Drop `T`'s cached pair; the next request resolves again.
    /// Statistics are kept.
    pub fn invalidate<T: Entity>(&self) -> bool {
        match read(&self.inner.slots).get(&TypeId::of::<T>()) {
            Some(slot) => {
                let had_pair = slot.current().is_some();
                slot.evict();
                had_pair
            }
            None => false,
        }
    }

    /// Drop every cached pair and all statistics
    pub fn clear(&self) {
        let mut slots = write(&self.inner.slots);
        for slot in slots.values() {
            slot.evict();
        }
        slots.clear();
    }

    /// Names of the types that currently have a cached pair
    pub fn cached_types(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = read(&self.inner.slots)
            .values()
            .filter(|slot| slot.current().is_some())
            .map(|slot| slot.type_identity.name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Push a statistics snapshot for every known type to the telemetry sink
    pub fn publish_statistics(&self) {
        let slots: Vec<Arc<TypeSlot>> = read(&self.inner.slots).values().cloned().collect();
        for slot in slots {
            self.inner
                .sink
                .statistics(slot.type_identity.name, &slot.stats.snapshot());
        }
    }

    fn slot<T: Entity>(&self) -> Arc<TypeSlot> {
        let id = TypeId::of::<T>();
        if let Some(slot) = read(&self.inner.slots).get(&id) {
            return slot.clone();
        }
        write(&self.inner.slots)
            .entry(id)
            .or_insert_with(|| Arc::new(TypeSlot::new(TypeIdentity::of::<T>())))
            .clone()
    }

    /// Spawn the pipeline as its own task. Waiters only await the task, so
    /// abandoning every waiter neither stalls nor cancels the resolution.
    fn start_resolution<T: Entity>(&self, slot: Arc<TypeSlot>) -> PairFuture {
        let inner = self.inner.clone();
        let generation = slot.generation.load(Ordering::SeqCst);

        let task = tokio::spawn({
            let slot = slot.clone();
            async move {
                let timeout = inner.resolution_timeout;
                let result =
                    match tokio::time::timeout(timeout, resolve_pair::<T>(&inner, &slot)).await {
                        Ok(result) => result,
                        Err(_) => Err(SchemaError::ResolutionTimedOut {
                            type_name: slot.type_identity.name.to_string(),
                            timeout,
                        }),
                    };

                let current = slot.complete(generation, &result);
                match &result {
                    Ok(_) if current => {
                        log::debug!("Cached serializers for {}", slot.type_identity)
                    }
                    Ok(_) => {
                        log::debug!("Discarded superseded resolution of {}", slot.type_identity)
                    }
                    Err(e) => log::warn!("Resolution of {} failed: {}", slot.type_identity, e),
                }
                result
            }
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    let result = Err(SchemaError::unavailable(
                        format!("resolve {}", slot.type_identity),
                        format!("resolution task failed: {}", e),
                    ));
                    slot.complete(generation, &result);
                    result
                }
            }
        }
        .boxed()
        .shared()
    }
}

async fn resolve_pair<T: Entity>(
    inner: &Inner,
    slot: &TypeSlot,
) -> SchemaResult<Arc<SerializerPair>> {
    let model = inner.model_resolver.resolve::<T>()?;
    let resolver = &inner.version_resolver;

    let key = if model.is_keyless() {
        None
    } else {
        Some(resolver.resolve_bound(&model, Projection::Key).await?)
    };
    let value = resolver.resolve_bound(&model, Projection::Value).await?;

    let pair = SerializerPair::build(&model, key.as_ref(), &value, slot.stats.clone())?;
    Ok(Arc::new(pair))
}
