//! Operation validation

pub mod validator;

pub use validator::OperationValidator;
