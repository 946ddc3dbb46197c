//! The evaluator contract and backend selection.
//!
//! A [`NodeEvaluator`] is whatever executes one AST node: a tree-walking
//! interpreter node or compiled code. The call stack only ever calls
//! `eval_node` and reads the three metadata accessors.
//!
//! Evaluators are built by a [`NodeEvaluatorFactory`]. [`EvaluatorFactories`]
//! pairs an optional compiler backend with the interpreter backend; when the
//! compiler fails or declines a node, that one node is interpreted instead.

use std::rc::Rc;

use osc_ir::{MemberIndexTable, PermissionTier, Symbol};

use crate::call_stack::CallStack;
use crate::config::RuntimeConfig;
use crate::errors::EvalResult;
use crate::scope::ScopeRef;

/// Executes one node.
pub trait NodeEvaluator {
    fn eval_node(&self, stack: &mut CallStack, scope: &ScopeRef) -> EvalResult;

    /// Name shown in backtraces.
    fn id(&self) -> Symbol;

    /// Source file the node came from.
    fn file(&self) -> &str;

    /// Symbol-to-slot table for scopes running this node, filtered to `tier`.
    fn member_index_table(&self, tier: PermissionTier) -> Rc<MemberIndexTable>;
}

/// Failure to build an evaluator. Never surfaces as a script error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("generated code too large: {name}")]
    CodeTooLarge { name: String },

    #[error("{backend} backend cannot handle {construct}")]
    Unsupported { backend: String, construct: String },
}

/// Builds evaluators for nodes of type `N`.
pub trait NodeEvaluatorFactory<N: ?Sized> {
    /// `Ok(None)` declines the node without it being an error.
    fn create(&self, node: &N) -> Result<Option<Rc<dyn NodeEvaluator>>, BackendError>;
}

impl<N, F> NodeEvaluatorFactory<N> for F
where
    N: ?Sized,
    F: Fn(&N) -> Result<Option<Rc<dyn NodeEvaluator>>, BackendError>,
{
    fn create(&self, node: &N) -> Result<Option<Rc<dyn NodeEvaluator>>, BackendError> {
        self(node)
    }
}

/// Compiler and interpreter backends, tried in that order.
pub struct EvaluatorFactories<N: ?Sized> {
    compiler: Option<Box<dyn NodeEvaluatorFactory<N>>>,
    interpreter: Box<dyn NodeEvaluatorFactory<N>>,
}

impl<N: ?Sized> EvaluatorFactories<N> {
    pub fn new(interpreter: impl NodeEvaluatorFactory<N> + 'static) -> Self {
        EvaluatorFactories {
            compiler: None,
            interpreter: Box::new(interpreter),
        }
    }

    #[must_use]
    pub fn with_compiler(mut self, compiler: impl NodeEvaluatorFactory<N> + 'static) -> Self {
        self.compiler = Some(Box::new(compiler));
        self
    }

    pub fn has_compiler(&self) -> bool {
        self.compiler.is_some()
    }

    /// Build the evaluator for `node`.
    ///
    /// Uses the compiler when `config.use_compiler` is set and one is
    /// installed. A compiler failure is logged and the node is interpreted.
    pub fn create(
        &self,
        node: &N,
        config: &RuntimeConfig,
    ) -> Result<Rc<dyn NodeEvaluator>, BackendError> {
        if let (true, Some(compiler)) = (config.use_compiler, &self.compiler) {
            match compiler.create(node) {
                Ok(Some(evaluator)) => return Ok(evaluator),
                Ok(None) => tracing::debug!("compiler declined node, interpreting"),
                Err(err) => {
                    tracing::warn!(error = %err, "compiler backend failed, falling back to interpreter");
                }
            }
        }
        self.interpreter
            .create(node)?
            .ok_or_else(|| BackendError::Unsupported {
                backend: "interpreter".to_owned(),
                construct: "node".to_owned(),
            })
    }
}
