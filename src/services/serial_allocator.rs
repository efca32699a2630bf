//! Serial number allocation
//!
//! Reservation is a single atomic increment on the scope's counter row, so
//! concurrent callers always receive distinct, increasing sequences. Peeking
//! reads the same row without writing and is advisory only: a later
//! reservation may return a higher value if someone else reserved in between.

use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::domain::{ScopeClock, SerialNumber, SerialScope};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::SerialCounterRepository;

pub struct SerialAllocator {
    counters: Arc<dyn SerialCounterRepository>,
    clock: Arc<dyn ScopeClock>,
    metrics: MetricsRecorder,
}

impl SerialAllocator {
    pub fn new(counters: Arc<dyn SerialCounterRepository>, clock: Arc<dyn ScopeClock>) -> Self {
        Self { counters, clock, metrics: MetricsRecorder::new() }
    }

    /// Scope that applies right now.
    pub fn current_scope(&self) -> SerialScope {
        self.clock.current_scope()
    }

    /// Consume the next sequence of `scope`.
    ///
    /// A reserved serial is never handed out again, even if the certificate
    /// it was meant for is never stored.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn reserve_next(&self, scope: SerialScope) -> Result<SerialNumber> {
        let result = self.counters.increment(scope.year()).await;
        self.metrics.record_serial_reserved(scope.year(), result.is_ok());

        let sequence = result.map_err(|e| {
            error!(error = %e, "Serial counter increment failed");
            Error::allocation_unavailable(scope.year(), e.to_string())
        })?;

        let serial = SerialNumber::new(scope, to_sequence(scope, sequence)?);
        info!(serial = %serial, "Serial reserved");
        Ok(serial)
    }

    /// The serial the next reservation of `scope` would return if nothing
    /// else reserves first. Does not mutate anything.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn peek_next(&self, scope: SerialScope) -> Result<SerialNumber> {
        let current = self.counters.current(scope.year()).await.map_err(|e| {
            error!(error = %e, "Serial counter read failed");
            Error::allocation_unavailable(scope.year(), e.to_string())
        })?;
        self.metrics.record_serial_peeked();

        let next = to_sequence(scope, current.unwrap_or(0))? + 1;
        let serial = SerialNumber::new(scope, next);
        debug!(serial = %serial, "Serial peeked");
        Ok(serial)
    }

    pub async fn reserve_current(&self) -> Result<SerialNumber> {
        self.reserve_next(self.current_scope()).await
    }

    pub async fn peek_current(&self) -> Result<SerialNumber> {
        self.peek_next(self.current_scope()).await
    }
}

fn to_sequence(scope: SerialScope, raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| {
        Error::allocation_unavailable(scope.year(), format!("counter holds negative value {}", raw))
    })
}
