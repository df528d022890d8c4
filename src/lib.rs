//! # pipeline-desk
//!
//! Operator desk for the content-generation pipeline of a news publishing
//! platform. Reconciles the generation queue with the articles it works on,
//! flags stuck jobs, and dispatches remediation (cancel, clear, bulk cancel,
//! approve, reset) against the hosted backend.
//!
//! The backend does the real work. This crate reads snapshots, labels them,
//! and asks for changes through the [`gateway::Gateway`] trait.

pub mod classify;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod model;
pub mod notice;
pub mod panel;
pub mod poll;
pub mod reconcile;
pub mod selection;
pub mod telemetry;
