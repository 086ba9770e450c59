//! Integration test modules

mod extensions;
mod invocation_loop;
