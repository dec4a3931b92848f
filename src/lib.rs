//! elasticache-sg - idempotent ElastiCache cache security group management
//!
//! This crate reconciles a single cache security group against a desired
//! state: ensure it exists (or not) and that its ingress authorizations
//! cover a set of peer EC2 security groups. All remote mutation goes through
//! the [`aws::CacheOperations`] trait so reconciliation logic can be tested
//! without hitting AWS.

pub mod aws;
pub mod config;
pub mod reconciler;
pub mod report;
pub mod wait;
