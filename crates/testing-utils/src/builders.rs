//! Test data builders for creating provisioning jobs

use chrono::{DateTime, Utc};
use serde_json::Value;

use provisioner_core::{JobStatus, ProvisionJob, ProvisionOs, ProvisionTemplate};

use crate::helpers::fixed_time;

/// Builder for creating test ProvisionJob entities
pub struct ProvisionJobBuilder {
    job: ProvisionJob,
}

impl ProvisionJobBuilder {
    pub fn new() -> Self {
        let now = fixed_time();
        Self {
            job: ProvisionJob {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: "user-1".to_string(),
                plan_id: "starter".to_string(),
                template: ProvisionTemplate::VpsBase,
                os: ProvisionOs::Ubuntu,
                status: JobStatus::Running,
                region: "ap-singapore".to_string(),
                instance_id: None,
                ip: None,
                retry_count: 0,
                max_retries: 3,
                next_retry_at: now,
                last_error: None,
                ssh_public_key: None,
                logs: Value::Array(Vec::new()),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.job.id = id.to_string();
        self
    }

    pub fn with_user_id(mut self, user_id: &str) -> Self {
        self.job.user_id = user_id.to_string();
        self
    }

    pub fn with_plan_id(mut self, plan_id: &str) -> Self {
        self.job.plan_id = plan_id.to_string();
        self
    }

    pub fn with_template(mut self, template: ProvisionTemplate) -> Self {
        self.job.template = template;
        self
    }

    pub fn with_os(mut self, os: ProvisionOs) -> Self {
        self.job.os = os;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.job.region = region.to_string();
        self
    }

    pub fn with_retry_count(mut self, retry_count: i32) -> Self {
        self.job.retry_count = retry_count;
        self
    }

    pub fn with_max_retries(mut self, max_retries: i32) -> Self {
        self.job.max_retries = max_retries;
        self
    }

    pub fn with_next_retry_at(mut self, next_retry_at: DateTime<Utc>) -> Self {
        self.job.next_retry_at = next_retry_at;
        self
    }

    pub fn with_last_error(mut self, last_error: &str) -> Self {
        self.job.last_error = Some(last_error.to_string());
        self
    }

    pub fn with_ssh_public_key(mut self, key: &str) -> Self {
        self.job.ssh_public_key = Some(key.to_string());
        self
    }

    pub fn with_instance(mut self, instance_id: &str, ip: Option<&str>) -> Self {
        self.job.instance_id = Some(instance_id.to_string());
        self.job.ip = ip.map(str::to_string);
        self
    }

    pub fn build(self) -> ProvisionJob {
        self.job
    }
}

impl Default for ProvisionJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}
