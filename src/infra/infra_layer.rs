// The infra module contains implementations of core traits.

#[path = "google_docs/docs_client.rs"]
pub mod google_docs;
