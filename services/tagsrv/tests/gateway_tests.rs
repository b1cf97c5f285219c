//! End-to-end gateway tests over an in-memory register bank
//!
//! The mock connector stands in for the Modbus TCP transport so the
//! scanner, registry, cache and write service can be exercised without a
//! network. Timing tests run on the paused tokio clock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tagcodec::{ScalingType, Value};
use tagsrv::{
    DataKind, GatewayConfig, LinkConnector, PollConfig, RegisterLink, RegisterSpace, SlaveConfig,
    Tag, TagGateway, TagSrvError, WriteError,
};
use tempfile::TempDir;

// ============================================================================
// In-memory register bank
// ============================================================================

#[derive(Default)]
struct Bank {
    coils: Mutex<HashMap<u16, bool>>,
    discrete: Mutex<HashMap<u16, bool>>,
    input: Mutex<HashMap<u16, u16>>,
    holding: Mutex<HashMap<u16, u16>>,
    /// Every register read issued: (space, start, count)
    word_reads: Mutex<Vec<(RegisterSpace, u16, u16)>>,
    bit_reads: Mutex<Vec<(RegisterSpace, u16, u16)>>,
}

impl Bank {
    fn set_holding_f32(&self, offset: u16, value: f32) {
        let bytes = value.to_be_bytes();
        let mut holding = self.holding.lock().unwrap();
        holding.insert(offset, u16::from_be_bytes([bytes[0], bytes[1]]));
        holding.insert(offset + 1, u16::from_be_bytes([bytes[2], bytes[3]]));
    }

    fn holding_at(&self, offset: u16) -> u16 {
        *self.holding.lock().unwrap().get(&offset).unwrap_or(&0)
    }
}

struct BankLink {
    bank: Arc<Bank>,
    down: Arc<AtomicBool>,
}

impl BankLink {
    fn check_up(&self) -> tagsrv::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(TagSrvError::protocol("link dropped"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RegisterLink for BankLink {
    async fn read_bits(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> tagsrv::Result<Vec<bool>> {
        self.check_up()?;
        self.bank.bit_reads.lock().unwrap().push((space, start, count));
        let map = match space {
            RegisterSpace::Coil => self.bank.coils.lock().unwrap(),
            RegisterSpace::DiscreteInput => self.bank.discrete.lock().unwrap(),
            _ => return Err(TagSrvError::protocol("not a bit space")),
        };
        Ok((start..start + count)
            .map(|addr| *map.get(&addr).unwrap_or(&false))
            .collect())
    }

    async fn read_words(
        &mut self,
        space: RegisterSpace,
        start: u16,
        count: u16,
    ) -> tagsrv::Result<Vec<u16>> {
        self.check_up()?;
        self.bank
            .word_reads
            .lock()
            .unwrap()
            .push((space, start, count));
        let map = match space {
            RegisterSpace::InputRegister => self.bank.input.lock().unwrap(),
            RegisterSpace::HoldingRegister => self.bank.holding.lock().unwrap(),
            _ => return Err(TagSrvError::protocol("not a register space")),
        };
        Ok((start..start + count)
            .map(|addr| *map.get(&addr).unwrap_or(&0))
            .collect())
    }

    async fn write_bit(&mut self, start: u16, value: bool) -> tagsrv::Result<()> {
        self.check_up()?;
        self.bank.coils.lock().unwrap().insert(start, value);
        Ok(())
    }

    async fn write_word(&mut self, start: u16, value: u16) -> tagsrv::Result<()> {
        self.check_up()?;
        self.bank.holding.lock().unwrap().insert(start, value);
        Ok(())
    }

    async fn write_words(&mut self, start: u16, values: &[u16]) -> tagsrv::Result<()> {
        self.check_up()?;
        let mut holding = self.bank.holding.lock().unwrap();
        for (i, value) in values.iter().enumerate() {
            holding.insert(start + i as u16, *value);
        }
        Ok(())
    }
}

/// Per-slave banks; a slave can be marked unreachable.
struct BankConnector {
    banks: HashMap<String, Arc<Bank>>,
    down: HashMap<String, Arc<AtomicBool>>,
    connects: AtomicUsize,
}

#[async_trait]
impl LinkConnector for BankConnector {
    async fn connect(&self, config: &SlaveConfig) -> tagsrv::Result<Box<dyn RegisterLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(down) = self.down.get(&config.name) {
            if down.load(Ordering::SeqCst) {
                return Err(TagSrvError::connection(format!(
                    "{} unreachable",
                    config.name
                )));
            }
        }
        let bank = self
            .banks
            .get(&config.name)
            .ok_or_else(|| TagSrvError::connection("no bank for slave"))?;
        let down = self
            .down
            .get(&config.name)
            .cloned()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        Ok(Box::new(BankLink {
            bank: Arc::clone(bank),
            down,
        }))
    }
}

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    gateway: TagGateway,
    banks: HashMap<String, Arc<Bank>>,
    down: HashMap<String, Arc<AtomicBool>>,
    connects: Arc<BankConnector>,
    _dir: TempDir,
}

fn fixture(slave_names: &[&str]) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut banks = HashMap::new();
    let mut down = HashMap::new();
    for name in slave_names {
        banks.insert(name.to_string(), Arc::new(Bank::default()));
        down.insert(name.to_string(), Arc::new(AtomicBool::new(false)));
    }
    let connector = Arc::new(BankConnector {
        banks: banks.clone(),
        down: down.clone(),
        connects: AtomicUsize::new(0),
    });

    let config = GatewayConfig {
        tag_table: dir.path().join("tags.csv"),
        poll: PollConfig {
            base_tick_ms: 1000,
            stop_timeout_ms: 2000,
        },
        slaves: slave_names
            .iter()
            .map(|name| SlaveConfig {
                name: name.to_string(),
                host: "127.0.0.1".to_string(),
                port: 502,
                unit_id: 1,
                timeout_ms: 100,
            })
            .collect(),
    };

    let gateway = TagGateway::with_connector(config, Arc::clone(&connector) as Arc<dyn LinkConnector>);
    Fixture {
        gateway,
        banks,
        down,
        connects: connector,
        _dir: dir,
    }
}

fn float_tag(name: &str, slave: &str, address: u16) -> Tag {
    let mut tag = Tag::new(name, slave, address);
    tag.conversion = "FLOAT, Big Endian (ABCD)".to_string();
    tag
}

// ============================================================================
// Scanner behavior
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scan_pipeline_decodes_and_scales() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    // Raw float32 50.0 at holding 43913, scaled 0-100% onto a 0..1000 span
    let mut tag = float_tag("flow", "plc1", 43913);
    tag.scaling.scaling_type = ScalingType::PercentToSpan;
    tag.scaling.span_low = 0.0;
    tag.scaling.span_high = 1000.0;
    fx.gateway.add_or_update_tag(tag).await.expect("add");

    fx.banks["plc1"].set_holding_f32(3912, 50.0);

    fx.gateway.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.gateway.stop().await;

    let cached = fx.gateway.get_cached_value("flow").expect("cached value");
    assert_eq!(cached.value, Value::Float(500.0));

    // The read window is sized by the conversion: 2 registers at the
    // zero-based offset 3912
    let reads = fx.banks["plc1"].word_reads.lock().unwrap();
    assert!(reads.contains(&(RegisterSpace::HoldingRegister, 3912, 2)));
}

#[tokio::test(start_paused = true)]
async fn test_scan_rate_grouping() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let fast = float_tag("fast", "plc1", 40001);
    let mut slow = float_tag("slow", "plc1", 40101);
    slow.scan_rate = 5;
    fx.gateway.add_or_update_tag(fast).await.expect("add fast");
    fx.gateway.add_or_update_tag(slow).await.expect("add slow");

    let reads_at = |offset: u16| {
        fx.banks["plc1"]
            .word_reads
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, start, _)| *start == offset)
            .count()
    };

    fx.gateway.start().await;

    // Tick 0: both groups are due on the first sweep
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(reads_at(0), 1);
    assert_eq!(reads_at(100), 1);

    // Ticks 1-4: only the rate-1 group
    tokio::time::sleep(Duration::from_millis(4400)).await;
    assert_eq!(reads_at(0), 5);
    assert_eq!(reads_at(100), 1);

    // Tick 5: both groups again
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(reads_at(0), 6);
    assert_eq!(reads_at(100), 2);

    fx.gateway.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_slave_failure_isolated() {
    let fx = fixture(&["plc1", "plc2"]);
    fx.gateway.load_tags().await.expect("load");

    fx.gateway
        .add_or_update_tag(float_tag("good", "plc1", 40001))
        .await
        .expect("add");
    fx.gateway
        .add_or_update_tag(float_tag("bad", "plc2", 40001))
        .await
        .expect("add");

    fx.down["plc2"].store(true, Ordering::SeqCst);
    fx.banks["plc1"].set_holding_f32(0, 7.0);

    fx.gateway.start().await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    fx.gateway.stop().await;

    // plc1's tag updates; plc2's tag never produces a value but does not
    // take the scanner down
    assert_eq!(
        fx.gateway.get_cached_value("good").expect("good").value,
        Value::Float(7.0)
    );
    assert!(fx.gateway.get_cached_value("bad").is_none());

    let status = fx.gateway.status().await;
    assert!(!status.running);
    assert_eq!(status.tag_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_digital_bit_extraction_from_register() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let mut tag = Tag::new("alarm", "plc1", 40005);
    tag.data_kind = DataKind::Digital;
    tag.start_bit = 3;
    fx.gateway.add_or_update_tag(tag).await.expect("add");

    fx.banks["plc1"]
        .holding
        .lock()
        .unwrap()
        .insert(4, 0b0000_1000);

    fx.gateway.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.gateway.stop().await;

    assert_eq!(
        fx.gateway.get_cached_value("alarm").expect("alarm").value,
        Value::Bool(true)
    );
}

#[tokio::test(start_paused = true)]
async fn test_coil_tag_reads_bits() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let mut tag = Tag::new("pump_on", "plc1", 9);
    tag.data_kind = DataKind::Digital;
    fx.gateway.add_or_update_tag(tag).await.expect("add");

    fx.banks["plc1"].coils.lock().unwrap().insert(8, true);

    fx.gateway.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    fx.gateway.stop().await;

    assert_eq!(
        fx.gateway.get_cached_value("pump_on").expect("pump").value,
        Value::Bool(true)
    );
    let reads = fx.banks["plc1"].bit_reads.lock().unwrap();
    assert!(reads.contains(&(RegisterSpace::Coil, 8, 1)));
}

#[tokio::test(start_paused = true)]
async fn test_start_idempotent_stop_from_idle() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    // stop() while idle is a no-op
    fx.gateway.stop().await;
    assert!(!fx.gateway.status().await.running);

    fx.gateway.start().await;
    fx.gateway.start().await; // second start is a no-op
    assert!(fx.gateway.status().await.running);

    fx.gateway.stop().await;
    assert!(!fx.gateway.status().await.running);

    // The scanner restarts cleanly after a stop
    fx.gateway.start().await;
    assert!(fx.gateway.status().await.running);
    fx.gateway.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_value_keeps_old_timestamp() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");
    fx.gateway
        .add_or_update_tag(float_tag("t", "plc1", 40001))
        .await
        .expect("add");
    fx.banks["plc1"].set_holding_f32(0, 1.0);

    fx.gateway.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let first = fx.gateway.get_cached_value("t").expect("first");

    // Slave goes down: the open handle starts failing, the reconnects are
    // refused, and the cached value stops updating. Its timestamp stays
    // put, which is how consumers observe staleness.
    fx.down["plc1"].store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(3000)).await;
    fx.gateway.stop().await;

    let second = fx.gateway.get_cached_value("t").expect("second");
    assert_eq!(second.timestamp, first.timestamp);
}

// ============================================================================
// Write service
// ============================================================================

#[tokio::test]
async fn test_write_multi_register_float() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");
    fx.gateway
        .add_or_update_tag(float_tag("setpoint", "plc1", 40011))
        .await
        .expect("add");

    fx.gateway
        .write_value("setpoint", Value::Float(25.0))
        .await
        .expect("write");

    // 25.0f32 = 0x41C80000, ABCD layout
    assert_eq!(fx.banks["plc1"].holding_at(10), 0x41C8);
    assert_eq!(fx.banks["plc1"].holding_at(11), 0x0000);

    // The cache reflects the commanded value immediately
    assert_eq!(
        fx.gateway.get_cached_value("setpoint").expect("cached").value,
        Value::Float(25.0)
    );
}

#[tokio::test]
async fn test_write_single_register_scalar() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let mut tag = Tag::new("mode", "plc1", 40021);
    tag.conversion = "UINT16".to_string();
    fx.gateway.add_or_update_tag(tag).await.expect("add");

    fx.gateway
        .write_value("mode", Value::Integer(3))
        .await
        .expect("write");
    assert_eq!(fx.banks["plc1"].holding_at(20), 3);
}

#[tokio::test]
async fn test_write_digital_coil() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let mut tag = Tag::new("start_cmd", "plc1", 42);
    tag.data_kind = DataKind::Digital;
    fx.gateway.add_or_update_tag(tag).await.expect("add");

    fx.gateway
        .write_value("start_cmd", Value::Bool(true))
        .await
        .expect("write");
    assert!(*fx.banks["plc1"].coils.lock().unwrap().get(&41).expect("coil"));
}

#[tokio::test]
async fn test_write_rejections() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    let mut readonly = float_tag("ro", "plc1", 40031);
    readonly.read_write = tagsrv::AccessMode::ReadOnly;
    fx.gateway.add_or_update_tag(readonly).await.expect("add");

    // Input registers are never writable
    let mut input = float_tag("ir", "plc1", 30001);
    input.read_write = tagsrv::AccessMode::ReadWrite;
    fx.gateway.add_or_update_tag(input).await.expect("add");

    assert!(matches!(
        fx.gateway.write_value("nope", Value::Float(1.0)).await,
        Err(WriteError::UnknownTag(_))
    ));
    assert!(matches!(
        fx.gateway.write_value("ro", Value::Float(1.0)).await,
        Err(WriteError::NotWritable(_))
    ));
    assert!(matches!(
        fx.gateway.write_value("ir", Value::Float(1.0)).await,
        Err(WriteError::NotWritable(_))
    ));

    // None of the rejected writes opened a connection
    assert_eq!(fx.connects.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_write_connection_failure() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");
    fx.gateway
        .add_or_update_tag(float_tag("t", "plc1", 40001))
        .await
        .expect("add");

    fx.down["plc1"].store(true, Ordering::SeqCst);
    assert!(matches!(
        fx.gateway.write_value("t", Value::Float(1.0)).await,
        Err(WriteError::Connection(_))
    ));
}

// ============================================================================
// On-demand reads and registry surface
// ============================================================================

#[tokio::test]
async fn test_read_tag_now_bypasses_cache() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");
    fx.gateway
        .add_or_update_tag(float_tag("live", "plc1", 40001))
        .await
        .expect("add");
    fx.banks["plc1"].set_holding_f32(0, 3.5);

    let value = fx.gateway.read_tag_now("live").await.expect("read");
    assert_eq!(value, Value::Float(3.5));
    // Explicit reads do not populate the cache
    assert!(fx.gateway.get_cached_value("live").is_none());

    assert!(matches!(
        fx.gateway.read_tag_now("ghost").await,
        Err(TagSrvError::TagNotFound(_))
    ));
}

#[tokio::test]
async fn test_remove_tag_evicts_cache() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");
    fx.gateway
        .add_or_update_tag(float_tag("t", "plc1", 40001))
        .await
        .expect("add");
    fx.gateway
        .write_value("t", Value::Float(9.0))
        .await
        .expect("write");
    assert!(fx.gateway.get_cached_value("t").is_some());

    assert!(fx.gateway.remove_tag("t").await.expect("remove"));
    assert!(fx.gateway.get_cached_value("t").is_none());
    assert!(!fx.gateway.remove_tag("t").await.expect("remove again"));
}

#[tokio::test]
async fn test_unknown_slave_tag_does_not_update() {
    let fx = fixture(&["plc1"]);
    fx.gateway.load_tags().await.expect("load");

    // The tag references a slave the configuration does not define
    fx.gateway
        .add_or_update_tag(float_tag("orphan", "ghost", 40001))
        .await
        .expect("add");

    assert!(matches!(
        fx.gateway.read_tag_now("orphan").await,
        Err(TagSrvError::SlaveNotFound(_))
    ));
}
