//! Background price simulator.
//!
//! Once per tick every product's latest price is fed through a
//! [`PriceModel`] and the result appended to its history. The simulator moves
//! through `Idle -> Running -> Stopped`; once stopped it cannot be restarted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::adapter::outbound::sqlite::SqliteStore;
use crate::domain::{Product, ProductId};
use crate::error::{ConfigError, Error, Result};
use crate::port::PriceModel;

/// Tick timing and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorSettings {
    pub tick_interval: Duration,
    /// Extra attempts per product when the store reports a retryable error.
    pub max_retries: u32,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_retries: 3,
        }
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Products that received a new price record.
    pub updated: usize,
    /// Products skipped after their attempts ran out.
    pub failed: usize,
}

/// Lifecycle of a [`PriceSimulator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    Idle,
    Running,
    Stopped,
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// Everything a tick needs; cloned into the background task.
#[derive(Clone)]
struct Ticker {
    store: SqliteStore,
    model: Arc<Mutex<Box<dyn PriceModel>>>,
    max_retries: u32,
}

impl Ticker {
    fn tick(&self) -> Result<TickReport> {
        let products = self.store.list_products()?;
        let mut report = TickReport::default();

        for product in &products {
            match self.advance(product) {
                Ok(price) => {
                    report.updated += 1;
                    debug!(product = %product.id, price, "Price updated");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(product = %product.id, name = %product.name, error = %e, "Skipped price update");
                }
            }
        }
        Ok(report)
    }

    fn advance(&self, product: &Product) -> Result<i64> {
        retrying(self.max_retries, || self.advance_once(product.id))
    }

    fn advance_once(&self, product: ProductId) -> Result<i64> {
        self.store.transaction(|l| {
            let current = l.latest_price(product)?;
            let next = self.model.lock().next_price(current);
            l.append_price(product, Utc::now(), next)?;
            Ok(next)
        })
    }
}

/// Run `op`, repeating it up to `max_retries` more times while it fails with
/// a retryable error.
fn retrying<T>(max_retries: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                debug!(attempt, error = %e, "Retrying");
            }
            result => return result,
        }
    }
}

/// Periodically advances every product's price on a background task.
pub struct PriceSimulator {
    ticker: Ticker,
    settings: SimulatorSettings,
    lifecycle: Lifecycle,
}

impl std::fmt::Debug for PriceSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceSimulator")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PriceSimulator {
    pub fn new(store: SqliteStore, model: Box<dyn PriceModel>, settings: SimulatorSettings) -> Self {
        Self {
            ticker: Ticker {
                store,
                model: Arc::new(Mutex::new(model)),
                max_retries: settings.max_retries,
            },
            settings,
            lifecycle: Lifecycle::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> SimulatorState {
        match self.lifecycle {
            Lifecycle::Idle => SimulatorState::Idle,
            Lifecycle::Running { .. } => SimulatorState::Running,
            Lifecycle::Stopped => SimulatorState::Stopped,
        }
    }

    /// Advance every product once, on the calling thread.
    ///
    /// One product's failure does not stop the others; it is counted in
    /// [`TickReport::failed`].
    ///
    /// # Errors
    /// Returns an error only if the product list cannot be read.
    pub fn tick(&self) -> Result<TickReport> {
        self.ticker.tick()
    }

    /// Begin ticking in the background. Must be called within a tokio runtime.
    ///
    /// The first tick fires one interval after `start`.
    ///
    /// # Errors
    /// - `InvalidState` if the simulator is not idle or no runtime is active
    /// - `ConfigError::InvalidValue` for a zero tick interval
    pub fn start(&mut self) -> Result<()> {
        if !matches!(self.lifecycle, Lifecycle::Idle) {
            return Err(Error::InvalidState(format!(
                "simulator cannot start from {:?}",
                self.state()
            )));
        }
        if self.settings.tick_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::InvalidState(e.to_string()))?;

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let ticker = self.ticker.clone();
        let interval = self.settings.tick_interval;

        let task = runtime.spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            timer.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        info!("Price simulator shutting down");
                        break;
                    }
                    _ = timer.tick() => {
                        let ticker = ticker.clone();
                        match tokio::task::spawn_blocking(move || ticker.tick()).await {
                            Ok(Ok(report)) => debug!(updated = report.updated, failed = report.failed, "Tick complete"),
                            Ok(Err(e)) => warn!(error = %e, "Tick failed"),
                            Err(e) => warn!(error = %e, "Tick task panicked"),
                        }
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "Price simulator started");
        self.lifecycle = Lifecycle::Running { shutdown, task };
        Ok(())
    }

    /// Stop ticking and wait for an in-flight tick to finish.
    ///
    /// No price is written by this simulator after `stop` returns. Dropping
    /// a running simulator does not wait, so only `stop` guarantees that.
    /// Stopping an idle or stopped simulator just marks it stopped.
    pub async fn stop(&mut self) {
        if let Lifecycle::Running { shutdown, task } =
            std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped)
        {
            let _ = shutdown.send(true);
            if let Err(e) = task.await {
                warn!(error = %e, "Price simulator task ended abnormally");
            }
            info!("Price simulator stopped");
        }
    }
}

/// Signals shutdown and aborts the loop without waiting. A tick already
/// running on the blocking pool cannot be cancelled and may still append one
/// more round of prices; call [`PriceSimulator::stop`] for a clean shutdown.
impl Drop for PriceSimulator {
    fn drop(&mut self) {
        if let Lifecycle::Running { shutdown, task } = &self.lifecycle {
            let _ = shutdown.send(true);
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::adapter::outbound::sqlite::StoreOptions;
    use crate::error::{ErrorKind, ExchangeError};

    /// Adds one per tick; maps 13 to an unstorable price.
    struct Step;

    impl PriceModel for Step {
        fn next_price(&mut self, current: i64) -> i64 {
            if current == 13 {
                0
            } else {
                current + 1
            }
        }
    }

    fn store() -> SqliteStore {
        SqliteStore::in_memory(StoreOptions::default()).unwrap()
    }

    fn fast() -> SimulatorSettings {
        SimulatorSettings {
            tick_interval: Duration::from_millis(20),
            max_retries: 1,
        }
    }

    #[test]
    fn tick_appends_one_record_per_product() {
        let store = store();
        let banana = store.add_product_with_price("Banana", 10, 1).unwrap();
        let apple = store.add_product_with_price("Apple", 10, 50).unwrap();
        let sim = PriceSimulator::new(store.clone(), Box::new(Step), fast());

        let report = sim.tick().unwrap();
        assert_eq!(report, TickReport { updated: 2, failed: 0 });
        assert_eq!(store.latest_price(banana.id).unwrap(), 2);
        assert_eq!(store.latest_price(apple.id).unwrap(), 51);
        assert_eq!(store.price_record_count(banana.id).unwrap(), 2);
    }

    #[test]
    fn one_failing_product_does_not_stop_the_rest() {
        let store = store();
        let cursed = store.add_product_with_price("Cursed", 10, 13).unwrap();
        let fine = store.add_product_with_price("Fine", 10, 20).unwrap();
        let sim = PriceSimulator::new(store.clone(), Box::new(Step), fast());

        let report = sim.tick().unwrap();
        assert_eq!(report, TickReport { updated: 1, failed: 1 });
        assert_eq!(store.latest_price(cursed.id).unwrap(), 13);
        assert_eq!(store.latest_price(fine.id).unwrap(), 21);
    }

    #[test]
    fn tick_on_empty_catalog_is_a_no_op() {
        let sim = PriceSimulator::new(store(), Box::new(Step), fast());
        assert_eq!(sim.tick().unwrap(), TickReport::default());
    }

    #[test]
    fn retrying_repeats_only_retryable_errors() {
        let calls = AtomicU32::new(0);
        let result = retrying(3, || {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Busy("locked".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let result: Result<()> = retrying(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExchangeError::InvalidAmount { amount: 0 }.into())
        });
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidAmount);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retrying_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retrying(2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Busy("locked".into()))
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn start_outside_a_runtime_fails() {
        let mut sim = PriceSimulator::new(store(), Box::new(Step), fast());
        let err = sim.start().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(sim.state(), SimulatorState::Idle);
    }

    #[tokio::test]
    async fn runs_until_stopped_then_writes_nothing() {
        let store = store();
        let banana = store.add_product_with_price("Banana", 10, 100).unwrap();
        let mut sim = PriceSimulator::new(store.clone(), Box::new(Step), fast());

        sim.start().unwrap();
        assert_eq!(sim.state(), SimulatorState::Running);
        tokio::time::sleep(Duration::from_millis(150)).await;
        sim.stop().await;
        assert_eq!(sim.state(), SimulatorState::Stopped);

        let after_stop = store.price_record_count(banana.id).unwrap();
        assert!(after_stop > 1, "expected ticks, got {after_stop} records");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.price_record_count(banana.id).unwrap(), after_stop);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected_before_spawning() {
        let settings = SimulatorSettings {
            tick_interval: Duration::ZERO,
            max_retries: 0,
        };
        let mut sim = PriceSimulator::new(store(), Box::new(Step), settings);

        let err = sim.start().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "tick_interval",
                ..
            })
        ));
        assert_eq!(sim.state(), SimulatorState::Idle);
    }

    #[tokio::test]
    async fn cannot_restart_after_stop() {
        let mut sim = PriceSimulator::new(store(), Box::new(Step), fast());
        sim.start().unwrap();
        assert!(sim.start().is_err());

        sim.stop().await;
        assert!(matches!(sim.start(), Err(Error::InvalidState(_))));
        assert_eq!(sim.state(), SimulatorState::Stopped);
    }

    #[tokio::test]
    async fn stopping_an_idle_simulator_is_allowed() {
        let mut sim = PriceSimulator::new(store(), Box::new(Step), fast());
        sim.stop().await;
        sim.stop().await;
        assert_eq!(sim.state(), SimulatorState::Stopped);
    }
}
