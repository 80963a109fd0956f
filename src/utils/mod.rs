pub mod logging;
pub mod random_helper;
pub mod retry;

pub use random_helper::RandomHelper;
pub use retry::RetryPolicy;
