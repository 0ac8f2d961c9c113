//! Ошибки ретранслятора epher.
//!
//! Доменные типы (`types`) несут [`StatusCode`], по которому вызывающий код
//! решает, повторять ли операцию. [`StackError`] склеивает доменную ошибку с
//! цепочкой контекстов для ошибок запуска.

pub mod ext;
pub mod stack;
pub mod status_code;
pub mod types;

pub use ext::*;
pub use stack::*;
pub use status_code::*;
pub use types::*;

pub type EpherResult<T> = Result<T, StackError>;
