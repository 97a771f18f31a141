//! GitHub issue tracker transport.

pub mod api_types;
pub mod client;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod paging;
pub mod transport;

pub use api_types::{ApiComment, ApiIssue, ApiLabel, IssueState, NewIssue};
pub use client::GithubClient;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryTransport;
pub use transport::{IssueQuery, IssueTransport, Page, PageRequest, StateFilter};
