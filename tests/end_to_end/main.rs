//! End-to-end tests: sender, broker and receiver wired through one context.

mod delivery;
