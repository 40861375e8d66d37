// crates/linkpack-core/src/tracer.rs
// ============================================================================
// Module: Linkpack Tracing Shim
// Description: Tracer capability with an active and a null-object variant.
// Purpose: Wrap pipeline phases in named spans without branching at call sites.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! The pipeline wraps each phase with [`trace_async_fn`] or [`trace_fn`]. The
//! tracer is chosen once at pipeline entry: the caller's tracer when supplied,
//! otherwise [`NoopTracer`], whose spans are disabled and whose children are
//! further no-op tracers.
//! Invariants:
//! - Tracing never changes control flow or return values.
//! - [`NoopTracer`] has no observable side effect.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use tracing::Instrument;
use tracing::Span;
use tracing::info_span;

// ============================================================================
// SECTION: Tracer Trait
// ============================================================================

/// Span factory used to instrument pipeline phases.
pub trait Tracer: Send + Sync {
    /// Returns a child tracer for a named phase.
    fn trace_child(&self, name: &str) -> Arc<dyn Tracer>;

    /// Returns the span phases run inside while this tracer is current.
    fn span(&self) -> Span;
}

/// Tracer that records nothing.
///
/// # Invariants
/// - Children are no-op tracers and spans are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn trace_child(&self, _name: &str) -> Arc<dyn Tracer> {
        Arc::new(Self)
    }

    fn span(&self) -> Span {
        Span::none()
    }
}

/// Tracer backed by `tracing` spans.
///
/// # Invariants
/// - Child spans are parented to this tracer's span.
#[derive(Debug, Clone)]
pub struct TracingTracer {
    /// Span owned by this tracer.
    span: Span,
}

impl TracingTracer {
    /// Creates a root tracer with a named root span.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self {
            span: info_span!("linkpack", name = %name),
        }
    }

    /// Creates a tracer from an existing span.
    #[must_use]
    pub const fn from_span(span: Span) -> Self {
        Self {
            span,
        }
    }
}

impl Tracer for TracingTracer {
    fn trace_child(&self, name: &str) -> Arc<dyn Tracer> {
        Arc::new(Self {
            span: info_span!(parent: &self.span, "phase", name = %name),
        })
    }

    fn span(&self) -> Span {
        self.span.clone()
    }
}

// ============================================================================
// SECTION: Phase Helpers
// ============================================================================

/// Runs an async phase inside a named child span.
///
/// The child tracer is passed to `phase` so nested phases can derive their own
/// children.
pub async fn trace_async_fn<F, Fut, T>(tracer: &Arc<dyn Tracer>, name: &str, phase: F) -> T
where
    F: FnOnce(Arc<dyn Tracer>) -> Fut,
    Fut: Future<Output = T>,
{
    let child = tracer.trace_child(name);
    let span = child.span();
    phase(child).instrument(span).await
}

/// Runs a synchronous phase inside a named child span.
pub fn trace_fn<F, T>(tracer: &Arc<dyn Tracer>, name: &str, phase: F) -> T
where
    F: FnOnce(Arc<dyn Tracer>) -> T,
{
    let child = tracer.trace_child(name);
    let span = child.span();
    let _entered = span.enter();
    phase(child)
}
