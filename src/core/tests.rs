//! Behavioural tests for the send-link handler, driven by the in-memory engine.
