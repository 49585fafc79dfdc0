//! Client for a hosted decision-optimization platform.
//!
//! A [`connector::CloudConnector`] resolves the working deployment space and
//! gets or creates the models and deployments a job runs on. Jobs are tracked
//! through [`job::Job`] handles, and large files go through the object-storage
//! bucket via [`cos::CosConnector`].

pub mod auth;
pub mod config;
pub mod connector;
pub mod cos;
pub mod credentials;
pub mod job;
pub mod logging;
pub mod platform;
pub mod retry;
pub mod storage;
#[cfg(test)]
mod test_utils;
