//! 腾讯云API接入：TC3签名与签名请求客户端

pub mod client;
pub mod signing;

pub use client::{ApiRequest, TencentCloudClient};
