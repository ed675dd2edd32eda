use thiserror::Error;

use crate::binding::BindingError;
use crate::expression::ExprError;
use crate::hierarchy::HierarchyError;
use crate::layout::LayoutError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),
    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),
    #[error("Config error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}
