use once_cell::sync::OnceCell;
use tracing::debug;

use crate::pool::{PoolStats, RuntimePool};
use crate::runtime::ScriptRuntime;
use crate::{AssetError, AssetProvider, EvaluatorConfig, FilterError, Parameters};

static GLOBAL: OnceCell<Evaluator> = OnceCell::new();

/// Evaluates filter expressions against pooled JavaScript runtimes.
///
/// Runtimes are cached per asset key: the first evaluation for a key builds a
/// runtime and runs that key's helper scripts in it, later evaluations reuse
/// idle runtimes that already have them loaded. Each runtime is used by one
/// evaluation at a time, so an `Evaluator` can be shared freely across threads.
///
/// # Example
///
/// ```
/// use jsfilter::{Evaluator, EvaluatorConfig, Parameters};
///
/// let evaluator = Evaluator::new(EvaluatorConfig::default());
/// let params = Parameters::new().set("severity", 2_i64).set("threshold", 2_i64);
/// assert!(evaluator.evaluate("severity == threshold", &params, None).unwrap());
/// ```
#[derive(Debug)]
pub struct Evaluator {
    config: EvaluatorConfig,
    pool: RuntimePool<ScriptRuntime>,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            pool: RuntimePool::with_max_idle(config.max_idle_per_key),
            config,
        }
    }

    /// The process-wide evaluator, built with default limits on first use
    /// unless [`init_global`](Self::init_global) ran first.
    pub fn global() -> &'static Evaluator {
        GLOBAL.get_or_init(|| Evaluator::new(EvaluatorConfig::default()))
    }

    /// Configure the process-wide evaluator.
    ///
    /// Returns `false` if it was already initialized, in which case `config`
    /// is ignored.
    pub fn init_global(config: EvaluatorConfig) -> bool {
        GLOBAL.set(Evaluator::new(config)).is_ok()
    }

    #[must_use]
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Pool statistics for an asset key (`""` when evaluating without assets).
    #[must_use]
    pub fn pool_stats(&self, key: &str) -> Option<PoolStats> {
        self.pool.stats(key)
    }

    /// Evaluate `expression` with `parameters` bound, coercing the result to a
    /// boolean.
    ///
    /// When `assets` is given, its scripts run once in every new runtime for
    /// its key before any expression does.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the assets cannot be loaded (a provider with
    /// an empty key is refused), a parameter
    /// cannot be bound, or the expression fails to parse or run. Parameters
    /// are unbound and the runtime is returned to the pool on every path,
    /// except after a timeout or an engine failure such as running out of
    /// memory, when the runtime is dropped.
    pub fn evaluate(
        &self,
        expression: &str,
        parameters: &Parameters,
        assets: Option<&dyn AssetProvider>,
    ) -> Result<bool, FilterError> {
        let key = assets.map_or("", |assets| assets.key());
        if assets.is_some() && key.is_empty() {
            return Err(FilterError::AssetLoad {
                key: String::new(),
                source: AssetError::new("the empty key is reserved for evaluations without assets"),
            });
        }
        let mut lease = self.pool.checkout(key, || self.build(key, assets))?;
        let outcome = lease.evaluate(expression, parameters);
        if !outcome.reusable {
            lease.poison();
        }
        outcome.result
    }

    fn build(
        &self,
        key: &str,
        assets: Option<&dyn AssetProvider>,
    ) -> Result<ScriptRuntime, FilterError> {
        let mut runtime = ScriptRuntime::new(&self.config)?;
        if let Some(assets) = assets {
            let scripts = assets.scripts().map_err(|source| FilterError::AssetLoad {
                key: key.to_owned(),
                source,
            })?;
            debug!(key, scripts = scripts.len(), "loading helper scripts");
            runtime.load_scripts(key, scripts)?;
        }
        Ok(runtime)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluatorConfig::default())
    }
}
