pub mod job_queue;
pub mod provider;

pub use job_queue::JobQueue;
pub use provider::ProvisionProvider;
