pub mod normalize;
pub mod paths;
pub mod reconciler;
pub mod retry;
pub mod roots;
pub mod scheduler;
pub mod transfer;
