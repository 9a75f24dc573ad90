use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{ContextItem, ItemOutcome, Meta};
use crate::context::Context;

/// When a [`Bail`] item halts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BailMode {
    #[default]
    Always,
    /// Halt only instances that already have recorded errors.
    OnErrors,
    /// Halt every instance once any instance of the chain has an error.
    OnContextErrors,
}

/// Halts instances so later items on the stack skip them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bail {
    mode: BailMode,
}

impl Bail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_errors() -> Self {
        Self { mode: BailMode::OnErrors }
    }

    pub fn on_context_errors() -> Self {
        Self {
            mode: BailMode::OnContextErrors,
        }
    }

    pub fn mode(&self) -> BailMode {
        self.mode
    }
}

#[async_trait]
impl ContextItem for Bail {
    async fn run(&self, context: &Context, _value: Option<&Value>, meta: &Meta<'_>) -> Result<ItemOutcome> {
        let halt = match self.mode {
            BailMode::Always => true,
            BailMode::OnErrors => context.has_errors_for(&meta.key()),
            BailMode::OnContextErrors => context.has_errors(),
        };
        Ok(if halt { ItemOutcome::Halt } else { ItemOutcome::Continue })
    }
}
