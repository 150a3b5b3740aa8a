// Shared fixtures for the unit test suite

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use velostream_schema::velostream::cache::{SerializerCacheManager, Statistics};
pub use velostream_schema::velostream::observability::{ResolutionWarning, TelemetrySink};
pub use velostream_schema::velostream::schema::{
    CompatibilityVerdict, Entity, EntityDescriptor, FieldDescriptor, InMemoryRegistryClient,
    RegisteredSchema, RegistryClient, Schema, SchemaError, SchemaIdentity, SchemaResult,
    SemanticType, SubjectNameStrategy, ValidationMode,
};
pub use velostream_schema::velostream::serialization::{
    take_field, FieldValue, Record, SerializationResult,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The canonical keyed entity: `id` is the key, `note` never leaves the process
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub amount: Decimal,
    pub note: String,
}

impl Order {
    pub fn sample(id: i64) -> Self {
        Self {
            id,
            amount: Decimal::new(1999, 2),
            note: String::new(),
        }
    }
}

impl Entity for Order {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("Order")
            .namespace("com.example.orders")
            .topic("orders")
            .field(FieldDescriptor::new("id", SemanticType::Int64).key())
            .field(FieldDescriptor::new("amount", SemanticType::Decimal).precision(10, 2))
            .field(FieldDescriptor::new("note", SemanticType::String).ignore())
            .build()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), self.id.into());
        record.insert("amount".to_string(), self.amount.into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            id: take_field(&mut record, "id")?.into_i64("id")?,
            amount: take_field(&mut record, "amount")?.into_decimal("amount")?,
            note: String::new(),
        })
    }
}

/// Same record and topic as [`Order`] with an added optional field
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithCoupon {
    pub id: i64,
    pub amount: Decimal,
    pub coupon: Option<String>,
}

impl Entity for OrderWithCoupon {
    fn descriptor() -> EntityDescriptor {
        let mut descriptor = Order::descriptor();
        descriptor
            .fields
            .push(FieldDescriptor::new("coupon", SemanticType::String).nullable());
        descriptor
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), self.id.into());
        record.insert("amount".to_string(), self.amount.into());
        record.insert("coupon".to_string(), self.coupon.clone().into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            id: take_field(&mut record, "id")?.into_i64("id")?,
            amount: take_field(&mut record, "amount")?.into_decimal("amount")?,
            coupon: take_field(&mut record, "coupon")?.into_option(|v| v.into_string("coupon"))?,
        })
    }
}

/// Same record and topic as [`Order`] with a required field old data lacks
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWithRegion {
    pub id: i64,
    pub amount: Decimal,
    pub region: String,
}

impl Entity for OrderWithRegion {
    fn descriptor() -> EntityDescriptor {
        let mut descriptor = Order::descriptor();
        descriptor
            .fields
            .push(FieldDescriptor::new("region", SemanticType::String));
        descriptor
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), self.id.into());
        record.insert("amount".to_string(), self.amount.into());
        record.insert("region".to_string(), self.region.as_str().into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            id: take_field(&mut record, "id")?.into_i64("id")?,
            amount: take_field(&mut record, "amount")?.into_decimal("amount")?,
            region: take_field(&mut record, "region")?.into_string("region")?,
        })
    }
}

/// Keyless telemetry entity
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub host: String,
    pub sequence: u32,
}

impl Entity for Heartbeat {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("Heartbeat")
            .topic("heartbeats")
            .keyless()
            .field(FieldDescriptor::new("host", SemanticType::String).max_length(64))
            .field(FieldDescriptor::new("sequence", SemanticType::UInt32))
            .build()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("host".to_string(), self.host.as_str().into());
        record.insert("sequence".to_string(), self.sequence.into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            host: take_field(&mut record, "host")?.into_string("host")?,
            sequence: take_field(&mut record, "sequence")?.into_int("sequence")?,
        })
    }
}

/// Entity with no key designation, no topic and an unqualified decimal
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTrade {
    pub symbol: String,
    pub price: Decimal,
}

impl Entity for LegacyTrade {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("LegacyTrade")
            .field(FieldDescriptor::new("symbol", SemanticType::String))
            .field(FieldDescriptor::new("price", SemanticType::Decimal))
            .build()
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("symbol".to_string(), self.symbol.as_str().into());
        record.insert("price".to_string(), self.price.into());
        record
    }

    fn from_record(mut record: Record) -> SerializationResult<Self> {
        Ok(Self {
            symbol: take_field(&mut record, "symbol")?.into_string("symbol")?,
            price: take_field(&mut record, "price")?.into_decimal("price")?,
        })
    }
}

/// Telemetry sink that keeps every warning and statistics snapshot
#[derive(Default)]
pub struct RecordingSink {
    pub warnings: Mutex<Vec<ResolutionWarning>>,
    pub statistics: Mutex<Vec<(String, Statistics)>>,
}

impl RecordingSink {
    pub fn warnings(&self) -> Vec<ResolutionWarning> {
        self.warnings.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn warning(&self, warning: &ResolutionWarning) {
        self.warnings.lock().unwrap().push(warning.clone());
    }

    fn statistics(&self, type_name: &str, statistics: &Statistics) {
        self.statistics
            .lock()
            .unwrap()
            .push((type_name.to_string(), statistics.clone()));
    }
}

/// In-memory registry wrapper that counts calls and can delay them
pub struct CountingRegistry {
    pub inner: InMemoryRegistryClient,
    registers: AtomicUsize,
    fetches: AtomicUsize,
    delay_ms: AtomicU64,
}

impl CountingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryRegistryClient::new(),
            registers: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
        })
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn register_calls(&self) -> usize {
        self.registers.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl RegistryClient for CountingRegistry {
    async fn register(&self, subject: &str, schema: &Schema) -> SchemaResult<SchemaIdentity> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.inner.register(subject, schema).await
    }

    async fn fetch_latest(&self, subject: &str) -> SchemaResult<RegisteredSchema> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.inner.fetch_latest(subject).await
    }

    async fn check_compatibility(
        &self,
        subject: &str,
        schema: &Schema,
    ) -> SchemaResult<CompatibilityVerdict> {
        self.pause().await;
        self.inner.check_compatibility(subject, schema).await
    }

    async fn list_subjects(&self) -> SchemaResult<Vec<String>> {
        self.inner.list_subjects().await
    }
}

pub fn manager_with(registry: Arc<CountingRegistry>) -> SerializerCacheManager {
    SerializerCacheManager::builder(registry)
        .sink(Arc::new(velostream_schema::velostream::observability::NullSink))
        .build()
}
