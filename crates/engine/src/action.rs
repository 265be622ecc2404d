// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actions: the units of work a command composes

use rampart_core::ActionError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What an action produces: a value, nothing, or an error
pub type ActionResult<T> = Result<Option<T>, ActionError>;

type SupplierFn<T> = Arc<dyn Fn() -> ActionResult<T> + Send + Sync>;
type RunnableFn = Arc<dyn Fn() -> Result<(), ActionError> + Send + Sync>;
type Hook = Arc<dyn Fn() + Send + Sync>;

pub enum Action<T> {
    /// Produces an optional value
    Supplier(SupplierFn<T>),
    /// Runs for effect; an absent value is never a failure
    Runnable(RunnableFn),
    /// Runs `before` and `after` around the inner action
    Hooked {
        before: Option<Hook>,
        inner: Box<Action<T>>,
        after: Option<Hook>,
    },
    /// Runs only once ordinary actions are exhausted
    Fallback(Box<Action<T>>),
}

impl<T> Clone for Action<T> {
    fn clone(&self) -> Self {
        match self {
            Action::Supplier(f) => Action::Supplier(Arc::clone(f)),
            Action::Runnable(f) => Action::Runnable(Arc::clone(f)),
            Action::Hooked {
                before,
                inner,
                after,
            } => Action::Hooked {
                before: before.clone(),
                inner: inner.clone(),
                after: after.clone(),
            },
            Action::Fallback(inner) => Action::Fallback(inner.clone()),
        }
    }
}

impl<T> std::fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Supplier(_) => write!(f, "Supplier"),
            Action::Runnable(_) => write!(f, "Runnable"),
            Action::Hooked { inner, .. } => write!(f, "Hooked({:?})", inner),
            Action::Fallback(inner) => write!(f, "Fallback({:?})", inner),
        }
    }
}

impl<T> Action<T> {
    pub fn supplier(f: impl Fn() -> ActionResult<T> + Send + Sync + 'static) -> Self {
        Action::Supplier(Arc::new(f))
    }

    pub fn runnable(f: impl Fn() -> Result<(), ActionError> + Send + Sync + 'static) -> Self {
        Action::Runnable(Arc::new(f))
    }

    /// Shorthand for a fallback supplier
    pub fn fallback(f: impl Fn() -> ActionResult<T> + Send + Sync + 'static) -> Self {
        Action::Fallback(Box::new(Action::supplier(f)))
    }

    pub fn into_fallback(self) -> Self {
        match self {
            Action::Fallback(_) => self,
            other => Action::Fallback(Box::new(other)),
        }
    }

    pub fn with_before(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        match self {
            Action::Hooked { inner, after, .. } => Action::Hooked {
                before: Some(Arc::new(hook)),
                inner,
                after,
            },
            other => Action::Hooked {
                before: Some(Arc::new(hook)),
                inner: Box::new(other),
                after: None,
            },
        }
    }

    pub fn with_after(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        match self {
            Action::Hooked { before, inner, .. } => Action::Hooked {
                before,
                inner,
                after: Some(Arc::new(hook)),
            },
            other => Action::Hooked {
                before: None,
                inner: Box::new(other),
                after: Some(Arc::new(hook)),
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        match self {
            Action::Fallback(_) => true,
            Action::Hooked { inner, .. } => inner.is_fallback(),
            _ => false,
        }
    }

    /// Void actions are exempt from error-on-null
    pub fn is_void(&self) -> bool {
        match self {
            Action::Runnable(_) => true,
            Action::Hooked { inner, .. } | Action::Fallback(inner) => inner.is_void(),
            Action::Supplier(_) => false,
        }
    }

    /// Run the action; a panic is reported as an ordinary failure
    pub fn invoke(&self) -> ActionResult<T> {
        match catch_unwind(AssertUnwindSafe(|| self.invoke_inner())) {
            Ok(result) => result,
            Err(_) => Err(ActionError::failed("action panicked")),
        }
    }

    fn invoke_inner(&self) -> ActionResult<T> {
        match self {
            Action::Supplier(f) => f(),
            Action::Runnable(f) => f().map(|()| None),
            Action::Hooked {
                before,
                inner,
                after,
            } => {
                if let Some(before) = before {
                    before();
                }
                let result = inner.invoke_inner();
                if let Some(after) = after {
                    after();
                }
                result
            }
            Action::Fallback(inner) => inner.invoke_inner(),
        }
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
