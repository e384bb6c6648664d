//! Streaming research-assistant backend.
//!
//! A query is answered by driving an LLM through a bounded sequence of
//! reasoning/tool rounds. Tool calls (web search, page retrieval, video
//! search) go through a TTL result cache and a resilient HTTP fetcher.
//! Partial answers are published on an event channel as they arrive;
//! the binary's console is just one subscriber.

pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod llm;
pub mod tools;
pub mod ui;
