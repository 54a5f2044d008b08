pub mod errors;
pub mod hasher;
pub mod policy;

pub use errors::PasswordError;
pub use errors::PolicyViolation;
pub use hasher::PasswordHasher;
pub use policy::PasswordPolicy;
