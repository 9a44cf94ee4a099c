//! Auth services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `coordinator` owns the user state and every action that changes it,
//! `registry` holds its listeners, and `guard` turns a state into a
//! navigation decision. Route handlers only translate protocol.

pub mod coordinator;
pub mod guard;
pub mod registry;
