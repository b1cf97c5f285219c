//! Background polling loop
//!
//! One task sweeps the tag table on a fixed base tick, grouping tags by
//! scan rate. Scheduling tracks a next-due tick per rate group instead of
//! a modulo check, so a slow sweep can never skip or double-fire a group.
//! Tags are polled strictly sequentially; one tag's failure never aborts
//! the sweep.

use crate::cache::ValueCache;
use crate::config::PollConfig;
use crate::error::{Result, TagSrvError};
use crate::link::SlaveLinkManager;
use crate::registry::TagRegistry;
use crate::tag::{DataKind, Tag};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tagcodec::{scaling, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum LoopState {
    Idle,
    Running {
        token: CancellationToken,
        handle: JoinHandle<()>,
    },
}

/// The polling scheduler: Idle → Running → Stopping → Idle
pub struct Scanner {
    registry: Arc<RwLock<TagRegistry>>,
    links: Arc<SlaveLinkManager>,
    cache: Arc<ValueCache>,
    poll: PollConfig,
    state: Mutex<LoopState>,
}

impl Scanner {
    pub fn new(
        registry: Arc<RwLock<TagRegistry>>,
        links: Arc<SlaveLinkManager>,
        cache: Arc<ValueCache>,
        poll: PollConfig,
    ) -> Self {
        Self {
            registry,
            links,
            cache,
            poll,
            state: Mutex::new(LoopState::Idle),
        }
    }

    pub async fn running(&self) -> bool {
        matches!(*self.state.lock().await, LoopState::Running { .. })
    }

    /// Launch the polling loop. A no-op while already running.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, LoopState::Running { .. }) {
            debug!("scanner already running");
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.links),
            Arc::clone(&self.cache),
            self.poll.clone(),
            token.clone(),
        ));
        *state = LoopState::Running { token, handle };
        info!("scanner started");
    }

    /// Request cancellation at the next tick boundary and wait (bounded)
    /// for the loop to exit. A no-op while idle.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let LoopState::Running { token, handle } = std::mem::replace(&mut *state, LoopState::Idle)
        else {
            debug!("scanner already idle");
            return;
        };

        token.cancel();
        let mut handle = handle;
        match tokio::time::timeout(Duration::from_millis(self.poll.stop_timeout_ms), &mut handle)
            .await
        {
            Ok(Ok(())) => info!("scanner stopped"),
            Ok(Err(e)) => warn!(error = %e, "scanner task ended abnormally"),
            Err(_) => {
                warn!(
                    timeout_ms = self.poll.stop_timeout_ms,
                    "scanner did not stop in time, aborting"
                );
                handle.abort();
            },
        }
    }
}

async fn poll_loop(
    registry: Arc<RwLock<TagRegistry>>,
    links: Arc<SlaveLinkManager>,
    cache: Arc<ValueCache>,
    poll: PollConfig,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(poll.base_tick_ms));
    let mut tick: u64 = 0;
    // Next-due tick per scan-rate group; a newly seen rate is due at once
    let mut next_due: HashMap<u32, u64> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = interval.tick() => {},
        }

        // Rebuild the groups every sweep so runtime tag edits take effect
        let mut groups: BTreeMap<u32, Vec<Tag>> = BTreeMap::new();
        {
            let registry = registry.read().await;
            for tag in registry.list() {
                groups.entry(tag.scan_rate).or_default().push(tag.clone());
            }
        }

        for (rate, tags) in &groups {
            let due = next_due.entry(*rate).or_insert(tick);
            if tick < *due {
                continue;
            }
            *due = tick + u64::from(*rate);

            for tag in tags {
                match read_tag(&links, tag).await {
                    Ok(value) => cache.insert(&tag.name, value),
                    Err(e) => {
                        // Degrade to "no update this cycle" for this tag only
                        warn!(tag = %tag.name, slave = %tag.slave, error = %e, "read failed");
                    },
                }
            }
        }

        next_due.retain(|rate, _| groups.contains_key(rate));
        tick += 1;
    }

    debug!("poll loop exited");
}

/// Read one tag: connect, read the sized register window, decode, scale.
pub(crate) async fn read_tag(links: &SlaveLinkManager, tag: &Tag) -> Result<Value> {
    let space = tag.space()?;
    let offset = space.offset(tag.address);
    let mut link = links.acquire(&tag.slave).await?;

    match tag.data_kind {
        DataKind::Digital if space.is_bit_space() => {
            let bits = link.read_bits(space, offset, 1).await?;
            let bit = bits
                .first()
                .copied()
                .ok_or_else(|| TagSrvError::protocol("empty bit response"))?;
            Ok(Value::Bool(bit))
        },
        DataKind::Digital => {
            let words = link.read_words(space, offset, 1).await?;
            let word = words
                .first()
                .copied()
                .ok_or_else(|| TagSrvError::protocol("empty register response"))?;
            Ok(Value::Bool((word >> tag.start_bit) & 1 == 1))
        },
        DataKind::Analog => {
            let spec = tag.resolved_conversion();
            let words = link
                .read_words(space, offset, spec.register_count() as u16)
                .await?;
            let raw = tagcodec::decode(&words, &spec)?;
            Ok(Value::Float(scaling::apply(raw.as_f64(), &tag.scaling)))
        },
    }
}
