use thiserror::Error;

/// Process exit codes.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INTERNAL: i32 = 1;
    pub const NOT_FOUND: i32 = 3;
}

#[derive(Error, Debug)]
pub enum ProcleaseError {
    #[error("Cannot find the shared executable. Looked in: {0}")]
    SharedExecutableNotFound(String),

    #[error("Failed to connect to coordinator: {0}")]
    CoordinatorConnection(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcleaseError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcleaseError::SharedExecutableNotFound(_) => exit_codes::NOT_FOUND,

            ProcleaseError::CoordinatorConnection(_) | ProcleaseError::Io(_) => {
                exit_codes::INTERNAL
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcleaseError>;
