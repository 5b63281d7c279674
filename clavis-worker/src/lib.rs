//! # Clavis Worker
//!
//! Background job execution for Clavis. The worker polls the durable job
//! queue in Postgres, claims batches with `FOR UPDATE SKIP LOCKED`, and
//! dispatches each job by its typed payload.
//!
//! The only job kind today is organization bootstrap: building a new org's
//! Owner role, attaching the platform permission catalog, and granting the
//! role to the creator. Bootstrap is idempotent against redelivery.

pub mod bootstrap;
pub mod consumer;
