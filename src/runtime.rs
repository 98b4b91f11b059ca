//! A single QuickJS runtime prepared for filter evaluation.
//!
//! Expressions run inside `with (scope) { ... }` where `scope` is a proxy over
//! the global object that claims every name, so identifiers nobody bound read
//! as `undefined` instead of throwing.

use std::collections::HashSet;
use std::ffi::CString;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rquickjs::context::EvalOptions;
use rquickjs::convert::Coerced;
use rquickjs::{
    qjs, Array, CatchResultExt, CaughtError, Context, Ctx, Filter, IntoJs, Object, Runtime, Type,
};
use tracing::{debug, warn};

use crate::parse::{is_bindable_name, SyntaxError};
use crate::{AssetError, EvaluatorConfig, FilterError, Parameters, Scripts, Value};

const SCOPE: &str = "__jsfilter_scope__";

const INSTALL_SCOPE: &str = "Object.defineProperty(globalThis, '__jsfilter_scope__', { \
     value: new Proxy(globalThis, { has: function () { return true; } }), \
     writable: false, enumerable: false, configurable: false });";

const STACK_OVERFLOW: &str = "Maximum call stack size exceeded";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The script evaluation actually runs for `expression`.
pub(crate) fn scoped_source(expression: &str) -> String {
    format!("with ({SCOPE}) {{\n{expression}\n}}")
}

/// Compile `source` as a sloppy-mode global script without running it.
pub(crate) fn compile_only(ctx: &Ctx<'_>, source: &str) -> rquickjs::Result<()> {
    let source = CString::new(source)?;
    let flags = (qjs::JS_EVAL_TYPE_GLOBAL | qjs::JS_EVAL_FLAG_COMPILE_ONLY) as i32;
    // SAFETY: `source` is nul-terminated and outlives the call. The returned
    // value is owned and freed when `compiled` drops.
    let compiled = unsafe {
        let raw = qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            source.as_ptr(),
            source.as_bytes().len() as _,
            c"expression".as_ptr(),
            flags,
        );
        rquickjs::Value::from_raw(ctx.clone(), raw)
    };
    if compiled.is_exception() {
        Err(rquickjs::Error::Exception)
    } else {
        Ok(())
    }
}

fn sloppy() -> EvalOptions {
    let mut options = EvalOptions::default();
    options.strict = false;
    options
}

/// Wall-clock deadline polled by the runtime's interrupt handler.
#[derive(Debug)]
struct Watchdog {
    epoch: Instant,
    /// Microseconds since `epoch`; `u64::MAX` when disarmed.
    deadline: AtomicU64,
    tripped: AtomicBool,
}

impl Watchdog {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            deadline: AtomicU64::new(u64::MAX),
            tripped: AtomicBool::new(false),
        }
    }

    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn arm(&self, budget: Option<Duration>) {
        self.tripped.store(false, Ordering::Relaxed);
        if let Some(budget) = budget {
            let budget = u64::try_from(budget.as_micros()).unwrap_or(u64::MAX);
            self.deadline
                .store(self.now().saturating_add(budget), Ordering::Relaxed);
        }
    }

    fn disarm(&self) {
        self.deadline.store(u64::MAX, Ordering::Relaxed);
    }

    fn expired(&self) -> bool {
        let deadline = self.deadline.load(Ordering::Relaxed);
        if deadline != u64::MAX && self.now() >= deadline {
            self.tripped.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    fn tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }
}

/// Result of one evaluation plus whether the runtime may be pooled again.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) result: Result<bool, FilterError>,
    pub(crate) reusable: bool,
}

/// One isolated JavaScript environment. Owned by a single caller at a time.
pub(crate) struct ScriptRuntime {
    id: u64,
    context: Context,
    watchdog: Arc<Watchdog>,
    budget: Option<Duration>,
    /// Global names (own and inherited) that exist once the runtime is set
    /// up. Parameters may not shadow them and nothing else survives an
    /// evaluation.
    baseline: HashSet<String>,
}

impl ScriptRuntime {
    pub(crate) fn new(config: &EvaluatorConfig) -> Result<Self, FilterError> {
        let runtime = Runtime::new().map_err(|e| FilterError::Runtime {
            message: e.to_string(),
        })?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }

        let watchdog = Arc::new(Watchdog::new());
        if config.execution_budget.is_some() {
            let handler = Arc::clone(&watchdog);
            runtime.set_interrupt_handler(Some(Box::new(move || handler.expired())));
        }

        let context = Context::full(&runtime).map_err(|e| FilterError::Runtime {
            message: e.to_string(),
        })?;
        let baseline = context.with(|ctx| {
            ctx.eval::<(), _>(INSTALL_SCOPE)
                .and_then(|()| global_names(&ctx.globals()))
                .catch(&ctx)
                .map_err(|e| FilterError::Runtime {
                    message: e.to_string(),
                })
        })?;

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(runtime = id, "created script runtime");
        Ok(Self {
            id,
            context,
            watchdog,
            budget: config.execution_budget,
            baseline,
        })
    }

    /// Run every helper script once, in name order. Consumes (and so closes)
    /// all readers whether or not loading succeeds.
    pub(crate) fn load_scripts(&mut self, key: &str, scripts: Scripts) -> Result<(), FilterError> {
        for (name, mut reader) in scripts {
            let mut source = String::new();
            reader
                .read_to_string(&mut source)
                .map_err(|e| FilterError::AssetLoad {
                    key: key.to_owned(),
                    source: AssetError::with_source(format!("could not read script {name}"), e),
                })?;
            drop(reader);

            let watchdog = &self.watchdog;
            let budget = self.budget;
            self.context.with(|ctx| {
                watchdog.arm(budget);
                let loaded = ctx.eval_with_options::<(), _>(source, sloppy()).catch(&ctx);
                watchdog.disarm();
                loaded.map_err(|e| FilterError::ScriptEvaluation {
                    message: if watchdog.tripped() {
                        format!("execution exceeded its budget of {:?}", budget.unwrap_or_default())
                    } else {
                        e.to_string()
                    },
                    name: name.clone(),
                })
            })?;
            debug!(runtime = self.id, key, script = %name, "loaded helper script");
        }

        // Helpers are part of the baseline from now on.
        let baseline = self
            .context
            .with(|ctx| global_names(&ctx.globals()).catch(&ctx).map_err(|e| e.to_string()));
        self.baseline = baseline.map_err(|message| FilterError::Runtime { message })?;
        Ok(())
    }

    /// Bind `parameters`, run `expression`, and restore the global object to
    /// its baseline on every path.
    pub(crate) fn evaluate(&mut self, expression: &str, parameters: &Parameters) -> Outcome {
        let Self {
            id,
            context,
            watchdog,
            budget,
            baseline,
        } = self;

        context.with(|ctx| {
            let globals = ctx.globals();
            let mut bound: Vec<&str> = Vec::with_capacity(parameters.len());

            let run = match bind_all(&ctx, &globals, parameters, baseline, &mut bound) {
                Ok(()) => run_expression(&ctx, expression, watchdog, *budget),
                Err(e) => Outcome {
                    result: Err(e),
                    reusable: true,
                },
            };
            let clean = unbind_all(&ctx, &globals, &bound) && sweep(&ctx, &globals, baseline);

            if !run.reusable {
                warn!(runtime = *id, "runtime state is unsafe after evaluation");
            }
            if !clean {
                warn!(runtime = *id, "failed to restore globals");
            }
            Outcome {
                result: run.result,
                reusable: run.reusable && clean,
            }
        })
    }
}

/// Own and inherited string-keyed property names of `globals`.
fn global_names<'js>(globals: &Object<'js>) -> rquickjs::Result<HashSet<String>> {
    let mut names = HashSet::new();
    let mut object = Some(globals.clone());
    while let Some(current) = object {
        for name in current.own_keys::<String>(Filter::new().string()) {
            names.insert(name?);
        }
        object = current.get_prototype();
    }
    Ok(names)
}

fn bind_all<'p, 'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    parameters: &'p Parameters,
    baseline: &HashSet<String>,
    bound: &mut Vec<&'p str>,
) -> Result<(), FilterError> {
    for (name, value) in parameters.iter() {
        let binding_error = |reason: String| FilterError::Binding {
            name: name.to_owned(),
            reason,
        };
        if !is_bindable_name(name) {
            return Err(binding_error("not a valid identifier".to_owned()));
        }
        if baseline.contains(name) {
            return Err(binding_error("would shadow an existing global".to_owned()));
        }
        let js = to_js(ctx, value).map_err(&binding_error)?;
        globals
            .set(name, js)
            .catch(ctx)
            .map_err(|e| binding_error(e.to_string()))?;
        bound.push(name);
    }
    Ok(())
}

fn unbind_all<'js>(ctx: &Ctx<'js>, globals: &Object<'js>, bound: &[&str]) -> bool {
    let mut clean = true;
    for &name in bound {
        let undefined = rquickjs::Value::new_undefined(ctx.clone());
        if let Err(e) = globals.set(name, undefined).catch(ctx) {
            warn!(parameter = name, error = %e, "could not unbind parameter");
            clean = false;
        }
    }
    clean
}

/// Remove every global the evaluation left behind. Names that cannot be
/// deleted (`var` declarations) are reset to `undefined` instead.
fn sweep<'js>(ctx: &Ctx<'js>, globals: &Object<'js>, baseline: &HashSet<String>) -> bool {
    let names: rquickjs::Result<Vec<String>> = globals
        .own_keys::<String>(Filter::new().string())
        .filter(|name| name.as_ref().map_or(true, |name| !baseline.contains(name)))
        .collect();
    let names = match names.catch(ctx) {
        Ok(names) => names,
        Err(e) => {
            warn!(error = %e, "could not list globals");
            return false;
        }
    };

    let mut clean = true;
    for name in names {
        if globals.remove(name.as_str()).catch(ctx).is_ok() {
            continue;
        }
        let undefined = rquickjs::Value::new_undefined(ctx.clone());
        if let Err(e) = globals.set(name.as_str(), undefined).catch(ctx) {
            warn!(global = %name, error = %e, "could not reset global");
            clean = false;
        }
    }
    clean
}

fn run_expression(
    ctx: &Ctx<'_>,
    expression: &str,
    watchdog: &Watchdog,
    budget: Option<Duration>,
) -> Outcome {
    watchdog.arm(budget);
    let value = ctx
        .eval_with_options::<rquickjs::Value, _>(scoped_source(expression), sloppy())
        .catch(ctx);
    watchdog.disarm();

    let (result, reusable) = match value {
        Ok(value) => (
            to_boolean(&value)
                .catch(ctx)
                .map_err(|e| FilterError::Execution {
                    message: e.to_string(),
                }),
            true,
        ),
        Err(_) if watchdog.tripped() => {
            let budget = budget.unwrap_or_default();
            warn!(?budget, "expression exceeded its execution budget");
            (Err(FilterError::Timeout { budget }), false)
        }
        Err(e) if is_syntax_error(&e) => (Err(SyntaxError::new(None, e.to_string()).into()), true),
        Err(e) => {
            let reusable = !is_fatal(&e);
            (
                Err(FilterError::Execution {
                    message: e.to_string(),
                }),
                reusable,
            )
        }
    };
    Outcome { result, reusable }
}

fn is_syntax_error(err: &CaughtError<'_>) -> bool {
    match err {
        CaughtError::Exception(exception) => exception
            .as_object()
            .get::<_, String>("name")
            .is_ok_and(|name| name == "SyntaxError"),
        _ => false,
    }
}

/// Failures after which the runtime's heap or stack can no longer be trusted:
/// engine-internal errors (out of memory among them), stack overflow, and
/// errors that never became a JavaScript exception.
fn is_fatal(err: &CaughtError<'_>) -> bool {
    match err {
        CaughtError::Exception(exception) => {
            match exception.as_object().get::<_, String>("name") {
                Ok(name) => {
                    name == "InternalError"
                        || exception.message().is_some_and(|m| m == STACK_OVERFLOW)
                }
                Err(_) => true,
            }
        }
        CaughtError::Value(_) | CaughtError::Error(rquickjs::Error::InvalidString(_)) => false,
        CaughtError::Error(_) => true,
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_js<'js>(ctx: &Ctx<'js>, value: &Value) -> Result<rquickjs::Value<'js>, String> {
    let js = match value {
        Value::Null => rquickjs::Value::new_null(ctx.clone()),
        Value::Bool(b) => rquickjs::Value::new_bool(ctx.clone(), *b),
        Value::Int(n) => match i32::try_from(*n) {
            Ok(small) => rquickjs::Value::new_int(ctx.clone(), small),
            Err(_) if value.is_representable() => rquickjs::Value::new_float(ctx.clone(), *n as f64),
            Err(_) => return Err(format!("integer {n} is outside the safe integer range")),
        },
        Value::Float(f) => rquickjs::Value::new_float(ctx.clone(), *f),
        Value::String(s) => s.as_str().into_js(ctx).catch(ctx).map_err(|e| e.to_string())?,
        Value::List(items) => {
            let array = Array::new(ctx.clone()).catch(ctx).map_err(|e| e.to_string())?;
            for (i, item) in items.iter().enumerate() {
                array
                    .set(i, to_js(ctx, item)?)
                    .catch(ctx)
                    .map_err(|e| e.to_string())?;
            }
            array.into_value()
        }
        Value::Map(entries) => {
            let object = Object::new(ctx.clone()).catch(ctx).map_err(|e| e.to_string())?;
            for (key, item) in entries {
                object
                    .set(key.as_str(), to_js(ctx, item)?)
                    .catch(ctx)
                    .map_err(|e| e.to_string())?;
            }
            object.into_value()
        }
    };
    Ok(js)
}

/// Boolean coercion applied to an expression's result.
///
/// | result                         | boolean            |
/// |--------------------------------|--------------------|
/// | bool                           | itself             |
/// | number                         | non-zero, not NaN  |
/// | string                         | non-empty          |
/// | null, undefined                | false              |
/// | object, array, function, symbol| true               |
/// | anything else                  | runtime ToBoolean  |
pub(crate) fn to_boolean(value: &rquickjs::Value<'_>) -> rquickjs::Result<bool> {
    let truthy = match value.type_of() {
        Type::Bool => value.as_bool().unwrap_or(false),
        Type::Int => value.as_int().is_some_and(|n| n != 0),
        Type::Float => value.as_float().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Type::String => match value.as_string() {
            Some(s) => !s.to_string()?.is_empty(),
            None => false,
        },
        Type::Null | Type::Undefined => false,
        Type::Object | Type::Array | Type::Function | Type::Symbol => true,
        _ => value.get::<Coerced<bool>>()?.0,
    };
    Ok(truthy)
}
