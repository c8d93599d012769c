//! Core of docbridge, a provider-agnostic document store client layer.
//!
//! This crate provides:
//!
//! - **Values and documents** ([`value`], [`document`]) - tagged field values, ordered documents, keys and revision tokens
//! - **Collections** ([`collection`]) - collection descriptors and collection handles
//! - **Queries** ([`query`]) - filter construction and compilation into backend-neutral descriptors
//! - **Result iteration** ([`iterator`], [`page`]) - lazy iteration over paginated driver results
//! - **Actions and batches** ([`action`], [`batch`]) - ordered, partially-failing batches of document operations
//! - **Retries** ([`retry`]) - exponential and fixed backoff around every driver call
//! - **Errors** ([`error`]) - the abstract error taxonomy and per-driver code tables
//! - **Drivers** ([`driver`], [`registry`], [`config`]) - the provider contract, an explicit registry and configuration
//! - **Document store** ([`store`]) - the entry point tying a driver to retry and batch settings
//!
//! # Example
//!
//! ```ignore
//! use docbridge::prelude::*;
//!
//! let books = CollectionDescriptor::builder("books", "title")
//!     .sort_key("price")
//!     .allow_scans(true)
//!     .build()?;
//!
//! let store = DocumentStore::new(driver);
//! let collection = store.collection(books);
//!
//! let mut book = Document::new().with("title", "YellowBook").with("price", 1);
//! collection.put(&mut book).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docbridge_core;

pub mod action;
pub mod batch;
pub mod collection;
pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod iterator;
pub mod page;
pub mod query;
pub mod registry;
pub mod retry;
pub mod store;
pub mod value;
