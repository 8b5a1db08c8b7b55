//! # Pool Context
//!
//! Owns a fixed set of execution units for one deployment scope.
//!
//! ## Key Concepts
//! - Creation: one unit thread and one proxy per slot, all sharing a materializer
//! - Deployment: `register` goes to every unit concurrently and all attempts
//!   settle before the deployment result set is computed
//! - Teardown: `destroy` terminates every unit concurrently; afterwards every
//!   pool operation fails with `AlreadyDestroyed`

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;
use tokio::runtime::Handle;
use tracing::{Instrument, debug, error, info, warn};

use weft_api::{
    Deployable, FunctionDefinition, FunctionId, Materializer, PoolId, UnitId, WeftError,
    WeftResult,
};

use crate::config::PoolConfig;
use crate::handle::ThreadedFunction;
use crate::pool_span;
use crate::proxy::UnitProxy;

enum PoolState {
    Active(Vec<Arc<UnitProxy>>),
    Destroyed,
}

/// A pool of execution units functions can be deployed onto.
pub struct PoolContext {
    id: PoolId,
    config: PoolConfig,
    state: RwLock<PoolState>,
}

impl PoolContext {
    /// Spawn `config.size` execution units.
    ///
    /// Must be awaited inside a tokio runtime; each unit's reply pump runs on
    /// it. If any unit fails to start, the ones already started are torn down
    /// and the error is returned.
    pub async fn create<M: Materializer>(config: PoolConfig, materializer: M) -> WeftResult<Self> {
        config.validate()?;
        Handle::try_current().map_err(|e| {
            WeftError::Spawn(format!("a pool must be created inside a tokio runtime: {}", e))
        })?;

        let id = PoolId::generate();
        let materializer: Arc<dyn Materializer> = Arc::new(materializer);

        let mut units = Vec::with_capacity(config.size);
        for _ in 0..config.size {
            match UnitProxy::spawn(Arc::clone(&materializer), config.unit_config()) {
                Ok(unit) => units.push(Arc::new(unit)),
                Err(e) => {
                    error!(pool = %id, started = units.len(), error = %e, "pool creation failed");
                    join_all(units.iter().map(|unit| unit.terminate())).await;
                    return Err(e);
                }
            }
        }

        info!(pool = %id, size = units.len(), "pool created");
        Ok(Self {
            id,
            config,
            state: RwLock::new(PoolState::Active(units)),
        })
    }

    /// A pool with one unit per available CPU and default settings.
    pub async fn with_defaults<M: Materializer>(materializer: M) -> WeftResult<Self> {
        Self::create(PoolConfig::default(), materializer).await
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.config.size
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(*self.read_state(), PoolState::Destroyed)
    }

    /// Identities of the pool's units, in creation order.
    pub fn units(&self) -> WeftResult<Vec<UnitId>> {
        Ok(self.active_units()?.iter().map(|unit| unit.id().clone()).collect())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PoolState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn active_units(&self) -> WeftResult<Vec<Arc<UnitProxy>>> {
        match &*self.read_state() {
            PoolState::Active(units) => Ok(units.clone()),
            PoolState::Destroyed => Err(self.destroyed()),
        }
    }

    fn destroyed(&self) -> WeftError {
        WeftError::AlreadyDestroyed(format!("pool {}", self.id))
    }

    /// Deploy a function onto every unit of the pool.
    ///
    /// Every unit's registration attempt settles before this returns; a
    /// failure on one unit never cuts the others short. The returned handle
    /// routes calls only to units that accepted the function.
    ///
    /// # Errors
    /// * `DeploymentFailed` - no unit accepted the function
    /// * `AlreadyDestroyed` - the pool has been destroyed
    pub async fn deploy_function(
        &self,
        definition: FunctionDefinition,
    ) -> WeftResult<ThreadedFunction> {
        let units = self.active_units()?;
        let function_id = FunctionId::generate();
        let span = pool_span!(self.id, operation = "deploy", function = %function_id);

        let outcomes = join_all(units.iter().map(|unit| {
            let function_id = function_id.clone();
            let definition = definition.clone();
            async move { (unit, unit.register(function_id, definition).await) }
        }))
        .instrument(span.clone())
        .await;

        let _entered = span.enter();
        let mut accepted = Vec::with_capacity(units.len());
        for (unit, outcome) in outcomes {
            match outcome {
                Ok(()) => accepted.push(Arc::clone(unit)),
                Err(e) => warn!(unit = %unit.id(), name = %definition.name, error = %e, "unit rejected function"),
            }
        }

        if accepted.is_empty() {
            error!(name = %definition.name, attempts = units.len(), "function rejected by every unit");
            return Err(WeftError::DeploymentFailed {
                function_id,
                attempts: units.len(),
            });
        }

        info!(
            name = %definition.name,
            accepted = accepted.len(),
            attempts = units.len(),
            "function deployed"
        );
        Ok(ThreadedFunction::new(
            function_id,
            definition.name,
            definition.arity,
            accepted,
        ))
    }

    /// Deploy a [`Deployable`] by its definition.
    pub async fn deploy<D: Deployable>(&self) -> WeftResult<ThreadedFunction> {
        self.deploy_function(D::definition()).await
    }

    /// Terminate every unit and mark the pool destroyed.
    ///
    /// Units are terminated concurrently and all are waited for. The pool is
    /// destroyed even if some units fail to stop cleanly; those failures are
    /// reported together as `Shutdown`.
    pub async fn destroy(&self) -> WeftResult<()> {
        let units = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, PoolState::Destroyed) {
                PoolState::Active(units) => units,
                PoolState::Destroyed => return Err(self.destroyed()),
            }
        };

        let span = pool_span!(self.id, operation = "destroy");
        let outcomes = join_all(units.iter().map(|unit| unit.terminate()))
            .instrument(span)
            .await;

        let failures: Vec<String> = units
            .iter()
            .zip(outcomes)
            .filter_map(|(unit, outcome)| outcome.err().map(|e| format!("unit {}: {}", unit.id(), e)))
            .collect();

        if failures.is_empty() {
            info!(pool = %self.id, "pool destroyed");
            Ok(())
        } else {
            error!(pool = %self.id, failed = failures.len(), "pool destroyed with errors");
            Err(WeftError::Shutdown(failures.join("; ")))
        }
    }
}

impl fmt::Debug for PoolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolContext")
            .field("id", &self.id)
            .field("size", &self.config.size)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl Drop for PoolContext {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let PoolState::Active(units) = state {
            debug!(pool = %self.id, "pool dropped without destroy, stopping units");
            for unit in units.iter() {
                unit.abandon();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FunctionCatalog;
    use serde_json::json;

    fn catalog() -> FunctionCatalog {
        FunctionCatalog::new().with_fn("one", 0, |_| Ok(json!(1)))
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = PoolContext::create(PoolConfig::with_size(0), catalog()).await;
        assert!(matches!(result, Err(WeftError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_units_are_listed_until_destroyed() {
        let pool = PoolContext::create(PoolConfig::with_size(3), catalog()).await.unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.units().unwrap().len(), 3);
        assert!(!pool.is_destroyed());

        pool.destroy().await.unwrap();
        assert!(pool.is_destroyed());
        assert!(matches!(pool.units(), Err(WeftError::AlreadyDestroyed(_))));
    }

    #[tokio::test]
    async fn test_dropped_pool_stops_its_units() {
        let pool = PoolContext::create(PoolConfig::with_size(1), catalog()).await.unwrap();
        let one = pool.deploy_function(FunctionDefinition::named("one", 0)).await.unwrap();
        assert_eq!(one.call(vec![]).await.unwrap(), json!(1));

        drop(pool);
        assert!(one.call(vec![]).await.is_err());
    }
}
